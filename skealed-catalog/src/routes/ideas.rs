use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use skealed_shared::errors::{AppError, AppResult};
use skealed_shared::middleware::OptionalAuthUser;
use skealed_shared::types::auth::AuthUser;
use skealed_shared::types::ApiResponse;

use crate::events::publisher;
use crate::routes::skills::{signed_in, VoteRequest};
use crate::services::idea_service::{self, IdeaCard};
use crate::services::inflight::{Action, InFlightGuard};
use crate::services::vote_service::VoteOutcome;
use crate::services::vote_store;
use crate::AppState;

/// GET /ideas
pub async fn list_ideas(
    OptionalAuthUser(user): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<IdeaCard>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let ideas = idea_service::list(&mut conn)?;
    let votes = match &user {
        Some(user) => vote_store::idea_votes_by_user(&mut conn, user.id)?,
        None => HashMap::new(),
    };

    let cards = idea_service::to_cards(ideas, user.as_ref(), &votes, &state.config.admin_email);
    Ok(Json(ApiResponse::ok(cards)))
}

#[derive(Debug, Deserialize)]
pub struct CreateIdeaRequest {
    pub title: String,
    pub description: Option<String>,
}

/// POST /ideas
pub async fn create_idea(
    user: Result<AuthUser, AppError>,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateIdeaRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<IdeaCard>>)> {
    let user = signed_in(user, "post ideas")?;
    let new_idea = idea_service::prepare(user.id, &req.title, req.description.as_deref())?;

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;
    let idea = idea_service::create(&mut conn, &new_idea)?;

    tracing::info!(idea_id = idea.id, author_id = %user.id, "idea created");
    publisher::publish_idea_created(&state.rabbitmq, user.id, idea.id, &idea.title).await;

    let card = idea_service::to_cards(vec![idea], Some(&user), &HashMap::new(), &state.config.admin_email)
        .pop()
        .ok_or_else(|| AppError::internal("idea card missing"))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok_with_message(card, "Idea posted"))))
}

/// DELETE /ideas/:id
pub async fn delete_idea(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(idea_id): Path<i32>,
) -> AppResult<Json<ApiResponse<()>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;
    let idea = idea_service::delete(&mut conn, &user, idea_id, &state.config.admin_email)?;

    let by_admin = idea.user_id != user.id;
    tracing::info!(idea_id, deleted_by = %user.id, by_admin, "idea deleted");
    publisher::publish_idea_deleted(&state.rabbitmq, user.id, idea_id, by_admin).await;

    Ok(Json(ApiResponse::ok_with_message((), "Idea deleted")))
}

/// POST /ideas/:id/vote
pub async fn vote_idea(
    user: Result<AuthUser, AppError>,
    State(state): State<Arc<AppState>>,
    Path(idea_id): Path<i32>,
    Json(req): Json<VoteRequest>,
) -> AppResult<Json<ApiResponse<VoteOutcome>>> {
    let user = signed_in(user, "vote")?;

    let guard = InFlightGuard::acquire(
        &state.redis,
        Action::IdeaVote,
        user.id,
        idea_id,
        state.config.inflight_ttl_secs,
    )
    .await?;

    let result = state
        .db
        .get()
        .map_err(|e| AppError::internal(e.to_string()))
        .and_then(|mut conn| vote_store::vote_on_idea(&mut conn, user.id, idea_id, req.direction));
    guard.release(&state.redis).await;
    let outcome = result?;

    if let Some(step) = &outcome.transition {
        metrics::counter!("skealed_votes_total", "target" => "idea", "transition" => step.kind()).increment(1);
    }

    publisher::publish_idea_voted(&state.rabbitmq, user.id, idea_id, outcome.vote_value(), outcome.votes).await;

    Ok(Json(ApiResponse::ok(outcome)))
}
