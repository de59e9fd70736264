use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use skealed_shared::errors::{AppError, AppResult, ErrorCode};
use skealed_shared::middleware::OptionalAuthUser;
use skealed_shared::types::ApiResponse;

use crate::events::publisher;
use crate::models::Skill;
use crate::routes::skills::cards_for;
use crate::schema::skills;
use crate::services::drill_service::{self, AttemptResult, DrillContent};
use crate::services::listing::SkillCard;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DrillPage {
    pub slug: String,
    pub title: String,
    pub content: DrillContent,
    /// The catalog entry for this drill, when one exists.
    pub skill: Option<SkillCard>,
}

/// GET /drills/:slug
pub async fn get_drill(
    OptionalAuthUser(user): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<DrillPage>>> {
    drill_service::validate_slug(&slug)?;
    let (title, content) = drill_service::describe(&slug);

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;
    let skill = skills::table
        .filter(skills::slug.eq(&slug))
        .first::<Skill>(&mut conn)
        .optional()?;
    let skill = match skill {
        Some(skill) => cards_for(&mut conn, user.as_ref(), vec![skill])?.pop(),
        None => None,
    };

    Ok(Json(ApiResponse::ok(DrillPage { slug, title, content, skill })))
}

#[derive(Debug, Deserialize)]
pub struct AttemptRequest {
    /// One "this is a scam" verdict per scenario, in order.
    pub answers: Vec<bool>,
}

/// POST /drills/:slug/attempts
pub async fn submit_attempt(
    OptionalAuthUser(user): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(req): Json<AttemptRequest>,
) -> AppResult<Json<ApiResponse<AttemptResult>>> {
    drill_service::validate_slug(&slug)?;
    let drill = drill_service::find_interactive(&slug)
        .ok_or_else(|| AppError::new(ErrorCode::DrillNotFound, "this drill is not scored here"))?;

    let result = drill_service::score_attempt(drill, &req.answers)?;

    metrics::counter!("skealed_drill_attempts_total", "drill" => drill.slug).increment(1);
    let user_id = user.as_ref().map(|u| u.id);
    publisher::publish_drill_completed(&state.rabbitmq, user_id, drill.slug, result.score, result.total).await;

    Ok(Json(ApiResponse::ok(result)))
}
