use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use skealed_shared::errors::{AppError, AppResult};
use skealed_shared::middleware::OptionalAuthUser;
use skealed_shared::types::ApiResponse;

use crate::routes::skills::{cards_for, load_skills, parse_sort};
use crate::services::listing::{self, CategorySection};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    #[serde(default)]
    pub q: String,
    pub sort: Option<String>,
    /// Per-category overrides, `security:new,grammar:saved`.
    #[serde(default)]
    pub sorts: String,
}

/// GET /home?q=&sort=&sorts=
pub async fn home(
    OptionalAuthUser(user): OptionalAuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<HomeQuery>,
) -> AppResult<Json<ApiResponse<Vec<CategorySection>>>> {
    let default_sort = parse_sort(query.sort.as_deref())?;
    let overrides = listing::parse_sort_overrides(&query.sorts);

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;
    let all = load_skills(&mut conn)?;
    let cards = cards_for(&mut conn, user.as_ref(), all)?;

    let sections = listing::home_sections(cards, &query.q, default_sort, &overrides);
    Ok(Json(ApiResponse::ok(sections)))
}
