use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use skealed_shared::errors::{AppError, AppResult, ErrorCode};
use skealed_shared::types::auth::AuthUser;

use crate::models::{Idea, NewIdea};
use crate::schema::ideas;
use crate::services::account_service;
use crate::services::vote_service::VoteDirection;

pub const TITLE_MAX_CHARS: u64 = 60;
pub const DESCRIPTION_MAX_CHARS: u64 = 2000;

#[derive(Debug, Validate)]
struct IdeaInput {
    #[validate(length(min = 1, max = 60))]
    title: String,
    #[validate(length(max = 2000))]
    description: Option<String>,
}

/// Trims the submission and checks the title rules.
pub fn prepare(user_id: Uuid, title: &str, description: Option<&str>) -> AppResult<NewIdea> {
    let input = IdeaInput {
        title: title.trim().to_string(),
        description: description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
    };

    if input.title.is_empty() {
        return Err(AppError::new(ErrorCode::IdeaTitleInvalid, "Title is required!"));
    }

    input.validate().map_err(|errors| {
        let (field, limit) = if errors.field_errors().contains_key("title") {
            ("title", TITLE_MAX_CHARS)
        } else {
            ("description", DESCRIPTION_MAX_CHARS)
        };
        AppError::with_details(
            ErrorCode::IdeaTitleInvalid,
            format!("{field} must be at most {limit} characters"),
            serde_json::json!({ "field": field, "max": limit }),
        )
    })?;

    Ok(NewIdea { user_id, title: input.title, description: input.description })
}

/// Authors may delete their own ideas; the admin may delete any.
pub fn can_delete(user: Option<&AuthUser>, author_id: Uuid, admin_email: &str) -> bool {
    match user {
        Some(user) => {
            user.id == author_id
                || user.is_admin()
                || (!admin_email.is_empty() && user.email.eq_ignore_ascii_case(admin_email.trim()))
        }
        None => false,
    }
}

#[derive(Debug, Serialize)]
pub struct IdeaCard {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub votes: i32,
    pub created_at: DateTime<Utc>,
    pub author_id: Uuid,
    pub user_vote: Option<VoteDirection>,
    pub can_delete: bool,
}

pub fn to_cards(
    ideas: Vec<Idea>,
    user: Option<&AuthUser>,
    votes: &HashMap<i32, VoteDirection>,
    admin_email: &str,
) -> Vec<IdeaCard> {
    ideas
        .into_iter()
        .map(|idea| IdeaCard {
            can_delete: can_delete(user, idea.user_id, admin_email),
            user_vote: votes.get(&idea.id).copied(),
            id: idea.id,
            title: idea.title,
            description: idea.description,
            votes: idea.votes,
            created_at: idea.created_at,
            author_id: idea.user_id,
        })
        .collect()
}

/// Most votes first; ties go to the older idea.
pub fn list(conn: &mut PgConnection) -> AppResult<Vec<Idea>> {
    Ok(ideas::table
        .order((ideas::votes.desc(), ideas::created_at.asc()))
        .load::<Idea>(conn)?)
}

pub fn create(conn: &mut PgConnection, new_idea: &NewIdea) -> AppResult<Idea> {
    conn.transaction(|conn| {
        account_service::ensure_active(conn, new_idea.user_id)?;
        Ok(diesel::insert_into(ideas::table)
            .values(new_idea)
            .get_result::<Idea>(conn)?)
    })
}

/// Deletes the idea if `user` may. Returns it so the caller can report who removed what.
pub fn delete(conn: &mut PgConnection, user: &AuthUser, idea_id: i32, admin_email: &str) -> AppResult<Idea> {
    conn.transaction(|conn| {
        let idea = ideas::table
            .find(idea_id)
            .for_update()
            .first::<Idea>(conn)
            .optional()?
            .ok_or_else(|| AppError::new(ErrorCode::IdeaNotFound, "idea not found"))?;

        if !can_delete(Some(user), idea.user_id, admin_email) {
            return Err(AppError::new(ErrorCode::NotIdeaAuthor, "only the author can delete this idea"));
        }

        diesel::delete(ideas::table.find(idea.id)).execute(conn)?;
        Ok(idea)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use skealed_shared::types::auth::UserRole;

    const ADMIN: &str = "admin@skealed.app";

    fn user(email: &str, role: UserRole) -> AuthUser {
        AuthUser { id: Uuid::new_v4(), email: email.into(), role, token_id: Uuid::new_v4() }
    }

    #[test]
    fn title_is_trimmed_and_blank_description_dropped() {
        let idea = prepare(Uuid::nil(), "  Budgeting basics  ", Some("   ")).unwrap();
        assert_eq!(idea.title, "Budgeting basics");
        assert_eq!(idea.description, None);
    }

    #[test]
    fn blank_title_is_rejected() {
        let err = prepare(Uuid::nil(), "   ", Some("details")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IdeaTitleInvalid);
    }

    #[test]
    fn title_limit_counts_characters() {
        let exactly = "é".repeat(60);
        assert!(prepare(Uuid::nil(), &exactly, None).is_ok());

        let too_long = "a".repeat(61);
        assert_eq!(prepare(Uuid::nil(), &too_long, None).unwrap_err().code(), ErrorCode::IdeaTitleInvalid);
    }

    #[test]
    fn long_description_names_its_own_field() {
        let err = prepare(Uuid::nil(), "Budgeting", Some(&"d".repeat(2001))).unwrap_err();
        assert_eq!(err.to_string(), "description must be at most 2000 characters");

        let err = prepare(Uuid::nil(), &"t".repeat(61), None).unwrap_err();
        assert_eq!(err.to_string(), "title must be at most 60 characters");
    }

    #[test]
    fn only_author_or_admin_may_delete() {
        let author = user("author@example.com", UserRole::User);
        let stranger = user("stranger@example.com", UserRole::User);
        let admin_by_email = user("Admin@Skealed.app", UserRole::User);
        let admin_by_role = user("ops@example.com", UserRole::Admin);

        assert!(can_delete(Some(&author), author.id, ADMIN));
        assert!(!can_delete(Some(&stranger), author.id, ADMIN));
        assert!(can_delete(Some(&admin_by_email), author.id, ADMIN));
        assert!(can_delete(Some(&admin_by_role), author.id, ADMIN));
        assert!(!can_delete(None, author.id, ADMIN));
    }

    #[test]
    fn empty_admin_email_grants_nothing() {
        let stranger = user("", UserRole::User);
        assert!(!can_delete(Some(&stranger), Uuid::new_v4(), ""));
    }

    #[test]
    fn cards_carry_vote_and_delete_flag() {
        let author = user("author@example.com", UserRole::User);
        let ideas = vec![
            Idea { id: 1, user_id: author.id, title: "Mine".into(), description: None, votes: 3, created_at: Utc::now() },
            Idea { id: 2, user_id: Uuid::new_v4(), title: "Theirs".into(), description: None, votes: 1, created_at: Utc::now() },
        ];
        let votes = HashMap::from([(2, VoteDirection::Down)]);

        let cards = to_cards(ideas, Some(&author), &votes, ADMIN);
        assert!(cards[0].can_delete);
        assert_eq!(cards[0].user_vote, None);
        assert!(!cards[1].can_delete);
        assert_eq!(cards[1].user_vote, Some(VoteDirection::Down));
    }
}
