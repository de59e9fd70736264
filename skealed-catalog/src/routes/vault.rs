use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use skealed_shared::errors::{AppError, AppResult};
use skealed_shared::types::auth::AuthUser;
use skealed_shared::types::ApiResponse;

use crate::events::publisher;
use crate::routes::skills::{cards_for, load_skills};
use crate::services::account_service::{self, WipeSummary};
use crate::services::listing::{self, SkillCard, SortMode};
use crate::services::vote_service::VoteDirection;
use crate::services::{favorite_service, profile_service};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VaultQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct VaultView {
    pub avatar_url: Option<String>,
    pub favorites: Vec<SkillCard>,
    pub upvoted: Vec<SkillCard>,
}

/// Splits the caller's cards into saved and up-voted lists. A skill can be in both.
pub fn vault_lists(cards: Vec<SkillCard>, query: &str) -> (Vec<SkillCard>, Vec<SkillCard>) {
    let upvoted = cards
        .iter()
        .filter(|c| c.user_vote == Some(VoteDirection::Up))
        .cloned()
        .collect();
    let favorites = cards.into_iter().filter(|c| c.favorited).collect();

    (
        listing::process(favorites, query, SortMode::Top),
        listing::process(upvoted, query, SortMode::Top),
    )
}

/// GET /vault?q=
pub async fn get_vault(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<VaultQuery>,
) -> AppResult<Json<ApiResponse<VaultView>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let profile = profile_service::get_profile(&mut conn, user.id)?;
    let all = load_skills(&mut conn)?;
    let cards = cards_for(&mut conn, Some(&user), all)?;
    let (favorites, upvoted) = vault_lists(cards, &query.q);

    Ok(Json(ApiResponse::ok(VaultView {
        avatar_url: profile.avatar_url,
        favorites,
        upvoted,
    })))
}

/// DELETE /vault/favorites/:skill_id
pub async fn remove_saved_skill(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(skill_id): Path<i32>,
) -> AppResult<Json<ApiResponse<()>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    if favorite_service::remove(&mut conn, user.id, skill_id)? {
        publisher::publish_favorite_toggled(&state.rabbitmq, user.id, skill_id, false).await;
    }

    Ok(Json(ApiResponse::ok_with_message((), "Removed from your vault")))
}

/// DELETE /vault/activity
pub async fn wipe_activity(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<WipeSummary>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;
    let summary = account_service::wipe_activity(&mut conn, user.id)?;

    tracing::info!(
        user_id = %user.id,
        votes = summary.votes_cleared,
        favorites = summary.favorites_cleared,
        "activity wiped"
    );

    Ok(Json(ApiResponse::ok_with_message(summary, "Your activity has been cleared")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn card(id: i32, title: &str, votes: i32, user_vote: Option<VoteDirection>, favorited: bool) -> SkillCard {
        SkillCard {
            id,
            title: title.to_string(),
            slug: title.to_lowercase(),
            category: "Security".into(),
            votes,
            created_at: Utc::now(),
            share_path: listing::share_path(&title.to_lowercase()),
            user_vote,
            favorited,
        }
    }

    #[test]
    fn only_up_votes_count_as_upvoted() {
        let cards = vec![
            card(1, "Scam Sensor", 10, Some(VoteDirection::Up), true),
            card(2, "Fake Login", 8, Some(VoteDirection::Down), true),
            card(3, "Passwords", 5, Some(VoteDirection::Up), false),
            card(4, "Prompting", 1, None, false),
        ];

        let (favorites, upvoted) = vault_lists(cards, "");
        assert_eq!(favorites.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(upvoted.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn search_filters_both_lists() {
        let cards = vec![
            card(1, "Scam Sensor", 10, Some(VoteDirection::Up), true),
            card(2, "Passwords", 5, Some(VoteDirection::Up), true),
        ];

        let (favorites, upvoted) = vault_lists(cards, "scam");
        assert_eq!(favorites.len(), 1);
        assert_eq!(upvoted.len(), 1);
        assert_eq!(favorites[0].title, "Scam Sensor");
    }
}
