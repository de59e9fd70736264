//! Search, sort and grouping for skill listings. Pure functions over cards
//! already loaded for the caller.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Skill;
use crate::services::vote_service::VoteDirection;

pub const GENERAL_CATEGORY: &str = "General";

/// A skill as shown to one caller.
#[derive(Debug, Clone, Serialize)]
pub struct SkillCard {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub category: String,
    pub votes: i32,
    pub created_at: DateTime<Utc>,
    pub share_path: String,
    pub user_vote: Option<VoteDirection>,
    pub favorited: bool,
}

impl SkillCard {
    pub fn new(skill: Skill, user_vote: Option<VoteDirection>, favorited: bool) -> Self {
        let category = skill
            .category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| GENERAL_CATEGORY.to_string());

        Self {
            id: skill.id,
            share_path: share_path(&skill.slug),
            title: skill.title,
            slug: skill.slug,
            category,
            votes: skill.votes,
            created_at: skill.created_at,
            user_vote,
            favorited,
        }
    }
}

pub fn to_cards(
    skills: Vec<Skill>,
    votes: &HashMap<i32, VoteDirection>,
    favorites: &HashSet<i32>,
) -> Vec<SkillCard> {
    skills
        .into_iter()
        .map(|skill| {
            let vote = votes.get(&skill.id).copied();
            let favorited = favorites.contains(&skill.id);
            SkillCard::new(skill, vote, favorited)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Top,
    New,
    Saved,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "new" => Ok(Self::New),
            "saved" => Ok(Self::Saved),
            other => Err(format!("unknown sort: {other}")),
        }
    }
}

pub fn matches_search(title: &str, query: &str) -> bool {
    let query = query.trim();
    query.is_empty() || title.to_lowercase().contains(&query.to_lowercase())
}

fn sort_cards(cards: &mut [SkillCard], sort: SortMode) {
    match sort {
        SortMode::New => cards.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortMode::Top | SortMode::Saved => cards.sort_by(|a, b| b.votes.cmp(&a.votes)),
    }
}

/// Search filter, then the saved filter, then ordering.
pub fn process(cards: Vec<SkillCard>, query: &str, sort: SortMode) -> Vec<SkillCard> {
    let mut cards: Vec<SkillCard> = cards
        .into_iter()
        .filter(|c| matches_search(&c.title, query))
        .filter(|c| sort != SortMode::Saved || c.favorited)
        .collect();
    sort_cards(&mut cards, sort);
    cards
}

/// Groups in first-seen order, so a vote-ordered input puts busier categories first.
pub fn group_by_category(cards: Vec<SkillCard>) -> Vec<(String, Vec<SkillCard>)> {
    let mut groups: Vec<(String, Vec<SkillCard>)> = Vec::new();
    for card in cards {
        match groups.iter_mut().find(|(name, _)| *name == card.category) {
            Some((_, members)) => members.push(card),
            None => groups.push((card.category.clone(), vec![card])),
        }
    }
    groups
}

#[derive(Debug, Serialize)]
pub struct CategorySection {
    pub name: String,
    pub slug: String,
    pub icon: &'static str,
    pub sort: SortMode,
    pub skills: Vec<SkillCard>,
}

/// Home page sections. A category with no search hits is dropped; one emptied
/// only by the saved filter is kept so the client can say so.
pub fn home_sections(
    cards: Vec<SkillCard>,
    query: &str,
    default_sort: SortMode,
    overrides: &HashMap<String, SortMode>,
) -> Vec<CategorySection> {
    group_by_category(cards)
        .into_iter()
        .filter_map(|(name, members)| {
            let hits: Vec<SkillCard> = members
                .into_iter()
                .filter(|c| matches_search(&c.title, query))
                .collect();
            if hits.is_empty() {
                return None;
            }

            let slug = category_slug(&name);
            let sort = overrides.get(&slug).copied().unwrap_or(default_sort);
            Some(CategorySection {
                icon: category_icon(&name),
                skills: process(hits, "", sort),
                name,
                slug,
                sort,
            })
        })
        .collect()
}

/// Parses `security:new,grammar:saved`. Malformed entries are ignored.
pub fn parse_sort_overrides(raw: &str) -> HashMap<String, SortMode> {
    raw.split(',')
        .filter_map(|entry| entry.split_once(':'))
        .filter_map(|(slug, mode)| {
            let slug = category_slug(slug);
            let mode = mode.parse().ok()?;
            (!slug.is_empty()).then_some((slug, mode))
        })
        .collect()
}

pub fn category_icon(category: &str) -> &'static str {
    match category.trim().to_lowercase().as_str() {
        "security" => "shield",
        "grammar" => "graduation-cap",
        "ai literacy" => "brain",
        _ => "zap",
    }
}

/// `AI Literacy` -> `ai-literacy`
pub fn category_slug(name: &str) -> String {
    name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}

/// `ai-literacy` -> `Ai Literacy`. Matched case-insensitively against stored categories.
pub fn category_title(slug: &str) -> String {
    let spaced = slug.replace('-', " ");
    let mut title = String::with_capacity(spaced.len());
    let mut at_word_start = true;

    for ch in spaced.chars() {
        if at_word_start && ch.is_alphanumeric() {
            title.extend(ch.to_uppercase());
        } else {
            title.push(ch);
        }
        at_word_start = !(ch.is_alphanumeric() || ch == '_');
    }
    title
}

/// `scam-sensor` -> `SCAM SENSOR`
pub fn drill_title(slug: &str) -> String {
    let title = slug.replace(['-', '_'], " ").trim().to_uppercase();
    if title.is_empty() {
        "SKILL DRILL".to_string()
    } else {
        title
    }
}

pub fn share_path(slug: &str) -> String {
    format!("/drills/{slug}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn skill(id: i32, title: &str, category: Option<&str>, votes: i32, age_days: i64) -> Skill {
        Skill {
            id,
            title: title.to_string(),
            slug: title.to_lowercase().replace(' ', "-"),
            category: category.map(str::to_string),
            votes,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    fn cards(favorites: &[i32]) -> Vec<SkillCard> {
        let skills = vec![
            skill(1, "Scam Sensor", Some("Security"), 30, 10),
            skill(2, "Fake Login Pages", Some("Security"), 12, 1),
            skill(3, "Its vs It's", Some("Grammar"), 20, 5),
            skill(4, "Spotting SCAM texts", Some("Security"), 5, 0),
            skill(5, "Prompting 101", None, 8, 3),
        ];
        let favorites: HashSet<i32> = favorites.iter().copied().collect();
        to_cards(skills, &HashMap::new(), &favorites)
    }

    fn ids(cards: &[SkillCard]) -> Vec<i32> {
        cards.iter().map(|c| c.id).collect()
    }

    #[test]
    fn missing_category_becomes_general() {
        let cards = cards(&[]);
        assert_eq!(cards[4].category, GENERAL_CATEGORY);
        assert_eq!(cards[0].share_path, "/drills/scam-sensor");
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let result = process(cards(&[]), "scam", SortMode::Top);
        assert_eq!(ids(&result), vec![1, 4]);
        assert!(result.iter().all(|c| c.title.to_lowercase().contains("scam")));
    }

    #[test]
    fn top_orders_by_votes_and_new_by_recency() {
        assert_eq!(ids(&process(cards(&[]), "", SortMode::Top)), vec![1, 3, 2, 5, 4]);
        assert_eq!(ids(&process(cards(&[]), "", SortMode::New)), vec![4, 2, 5, 3, 1]);
    }

    #[test]
    fn saved_keeps_only_favorites() {
        let result = process(cards(&[2, 3]), "", SortMode::Saved);
        assert_eq!(ids(&result), vec![3, 2]);
    }

    #[test]
    fn unhearting_removes_from_saved_view() {
        let before = process(cards(&[1]), "", SortMode::Saved);
        assert_eq!(ids(&before), vec![1]);

        let after = process(cards(&[]), "", SortMode::Saved);
        assert!(after.is_empty());
    }

    #[test]
    fn grouping_preserves_first_appearance() {
        let groups = group_by_category(process(cards(&[]), "", SortMode::Top));
        let names: Vec<&str> = groups.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Security", "Grammar", GENERAL_CATEGORY]);
        assert_eq!(ids(&groups[0].1), vec![1, 2, 4]);
    }

    #[test]
    fn home_hides_categories_without_search_hits() {
        let sections = home_sections(cards(&[]), "scam", SortMode::Top, &HashMap::new());
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name, "Security");
        assert_eq!(sections[0].icon, "shield");
        assert_eq!(ids(&sections[0].skills), vec![1, 4]);
    }

    #[test]
    fn home_keeps_category_emptied_by_saved_filter() {
        let overrides = parse_sort_overrides("grammar:saved");
        let sections = home_sections(cards(&[]), "", SortMode::Top, &overrides);

        let grammar = sections.iter().find(|s| s.slug == "grammar").unwrap();
        assert_eq!(grammar.sort, SortMode::Saved);
        assert!(grammar.skills.is_empty());

        let security = sections.iter().find(|s| s.slug == "security").unwrap();
        assert_eq!(security.sort, SortMode::Top);
        assert_eq!(security.skills.len(), 3);
    }

    #[test]
    fn overrides_ignore_garbage() {
        let overrides = parse_sort_overrides("Security:new, ai literacy:SAVED,grammar,bogus:sideways,:top");
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides["security"], SortMode::New);
        assert_eq!(overrides["ai-literacy"], SortMode::Saved);
    }

    #[test]
    fn category_slug_and_title() {
        assert_eq!(category_slug("AI Literacy"), "ai-literacy");
        assert_eq!(category_slug("  Money   Basics "), "money-basics");
        assert_eq!(category_title("ai-literacy"), "Ai Literacy");
        assert_eq!(category_title("security"), "Security");
    }

    #[test]
    fn icons_fall_back_to_zap() {
        assert_eq!(category_icon("Grammar"), "graduation-cap");
        assert_eq!(category_icon("AI Literacy"), "brain");
        assert_eq!(category_icon("Cooking"), "zap");
    }

    #[test]
    fn drill_titles() {
        assert_eq!(drill_title("scam-sensor"), "SCAM SENSOR");
        assert_eq!(drill_title("its_vs-its"), "ITS VS ITS");
        assert_eq!(drill_title(""), "SKILL DRILL");
    }

    #[test]
    fn sort_mode_parsing() {
        assert_eq!("NEW".parse::<SortMode>().unwrap(), SortMode::New);
        assert!("hot".parse::<SortMode>().is_err());
        assert_eq!(SortMode::default(), SortMode::Top);
    }
}
