use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use skealed_shared::errors::{AppError, AppResult, ErrorCode};
use skealed_shared::middleware::OptionalAuthUser;
use skealed_shared::types::auth::AuthUser;
use skealed_shared::types::ApiResponse;

use crate::events::publisher;
use crate::models::Skill;
use crate::schema::skills;
use crate::services::inflight::{Action, InFlightGuard};
use crate::services::listing::{self, SkillCard, SortMode};
use crate::services::vote_service::{VoteDirection, VoteOutcome};
use crate::services::{favorite_service, vote_store};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: String,
    pub sort: Option<String>,
}

impl ListQuery {
    pub fn sort_mode(&self) -> AppResult<SortMode> {
        parse_sort(self.sort.as_deref())
    }
}

pub(crate) fn parse_sort(raw: Option<&str>) -> AppResult<SortMode> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw.parse().map_err(AppError::bad_request),
        None => Ok(SortMode::default()),
    }
}

/// Mutations need a session. A missing token gets a friendlier message;
/// expired or invalid tokens keep their own codes so clients can refresh.
pub(crate) fn signed_in(user: Result<AuthUser, AppError>, action: &str) -> AppResult<AuthUser> {
    user.map_err(|e| match e.code() {
        ErrorCode::Unauthorized => AppError::unauthorized(format!("sign in to {action}")),
        _ => e,
    })
}

/// The caller's votes and favorites; empty for anonymous callers.
pub(crate) fn viewer_state(
    conn: &mut PgConnection,
    user: Option<&AuthUser>,
) -> AppResult<(HashMap<i32, VoteDirection>, HashSet<i32>)> {
    match user {
        Some(user) => Ok((
            vote_store::skill_votes_by_user(conn, user.id)?,
            favorite_service::favorite_ids(conn, user.id)?,
        )),
        None => Ok((HashMap::new(), HashSet::new())),
    }
}

pub(crate) fn cards_for(
    conn: &mut PgConnection,
    user: Option<&AuthUser>,
    skills: Vec<Skill>,
) -> AppResult<Vec<SkillCard>> {
    let (votes, favorites) = viewer_state(conn, user)?;
    Ok(listing::to_cards(skills, &votes, &favorites))
}

/// Every skill, most voted first.
pub(crate) fn load_skills(conn: &mut PgConnection) -> AppResult<Vec<Skill>> {
    Ok(skills::table
        .order((skills::votes.desc(), skills::id.asc()))
        .load::<Skill>(conn)?)
}

/// GET /skills?q=&sort=
pub async fn list_skills(
    OptionalAuthUser(user): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<SkillCard>>>> {
    let sort = query.sort_mode()?;
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let all = load_skills(&mut conn)?;
    let cards = cards_for(&mut conn, user.as_ref(), all)?;

    Ok(Json(ApiResponse::ok(listing::process(cards, &query.q, sort))))
}

/// GET /skills/:slug
pub async fn get_skill(
    OptionalAuthUser(user): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<SkillCard>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let skill = skills::table
        .filter(skills::slug.eq(&slug))
        .first::<Skill>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::SkillNotFound, "skill not found"))?;

    let card = cards_for(&mut conn, user.as_ref(), vec![skill])?
        .pop()
        .ok_or_else(|| AppError::internal("skill card missing"))?;

    Ok(Json(ApiResponse::ok(card)))
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

/// POST /skills/:id/vote
pub async fn vote_skill(
    user: Result<AuthUser, AppError>,
    State(state): State<Arc<AppState>>,
    Path(skill_id): Path<i32>,
    Json(req): Json<VoteRequest>,
) -> AppResult<Json<ApiResponse<VoteOutcome>>> {
    let user = signed_in(user, "vote")?;

    let guard = InFlightGuard::acquire(
        &state.redis,
        Action::SkillVote,
        user.id,
        skill_id,
        state.config.inflight_ttl_secs,
    )
    .await?;

    let result = state
        .db
        .get()
        .map_err(|e| AppError::internal(e.to_string()))
        .and_then(|mut conn| vote_store::vote_on_skill(&mut conn, user.id, skill_id, req.direction));
    guard.release(&state.redis).await;
    let outcome = result?;

    if let Some(step) = &outcome.transition {
        metrics::counter!("skealed_votes_total", "target" => "skill", "transition" => step.kind()).increment(1);
    }
    tracing::info!(skill_id, user_id = %user.id, votes = outcome.votes, "skill vote recorded");

    publisher::publish_skill_voted(&state.rabbitmq, user.id, skill_id, outcome.vote_value(), outcome.votes).await;

    Ok(Json(ApiResponse::ok(outcome)))
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub skill_id: i32,
    pub favorited: bool,
}

/// POST /skills/:id/favorite
pub async fn toggle_favorite(
    user: Result<AuthUser, AppError>,
    State(state): State<Arc<AppState>>,
    Path(skill_id): Path<i32>,
) -> AppResult<Json<ApiResponse<FavoriteResponse>>> {
    let user = signed_in(user, "save skills")?;

    let guard = InFlightGuard::acquire(
        &state.redis,
        Action::Favorite,
        user.id,
        skill_id,
        state.config.inflight_ttl_secs,
    )
    .await?;

    let result = state
        .db
        .get()
        .map_err(|e| AppError::internal(e.to_string()))
        .and_then(|mut conn| favorite_service::toggle(&mut conn, user.id, skill_id));
    guard.release(&state.redis).await;
    let favorited = result?;

    publisher::publish_favorite_toggled(&state.rabbitmq, user.id, skill_id, favorited).await;

    Ok(Json(ApiResponse::ok(FavoriteResponse { skill_id, favorited })))
}

/// DELETE /skills/:id/favorite
pub async fn remove_favorite(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(skill_id): Path<i32>,
) -> AppResult<Json<ApiResponse<FavoriteResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    if favorite_service::remove(&mut conn, user.id, skill_id)? {
        publisher::publish_favorite_toggled(&state.rabbitmq, user.id, skill_id, false).await;
    }

    Ok(Json(ApiResponse::ok(FavoriteResponse { skill_id, favorited: false })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sort_defaults_to_top() {
        assert_eq!(parse_sort(None).unwrap(), SortMode::Top);
        assert_eq!(parse_sort(Some("  ")).unwrap(), SortMode::Top);
        assert_eq!(parse_sort(Some("NEW")).unwrap(), SortMode::New);
    }

    #[test]
    fn unknown_sort_is_a_bad_request() {
        assert_eq!(parse_sort(Some("random")).unwrap_err().code(), ErrorCode::BadRequest);
    }

    #[test]
    fn missing_session_asks_caller_to_sign_in() {
        let err = signed_in(Err(AppError::unauthorized("sign in required")), "vote").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
        assert_eq!(err.to_string(), "sign in to vote");
    }

    #[test]
    fn expired_session_keeps_its_code() {
        let expired = AppError::new(ErrorCode::TokenExpired, "token has expired");
        assert_eq!(signed_in(Err(expired), "vote").unwrap_err().code(), ErrorCode::TokenExpired);
    }

    #[test]
    fn vote_request_accepts_lowercase_directions() {
        let req: VoteRequest = serde_json::from_str(r#"{"direction":"down"}"#).unwrap();
        assert_eq!(req.direction, VoteDirection::Down);
    }
}
