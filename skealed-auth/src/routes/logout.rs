use axum::extract::State;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;

use skealed_shared::errors::{AppError, AppResult};
use skealed_shared::types::ApiResponse;

use crate::schema::refresh_tokens;
use crate::services::session_bus::SessionChange;
use crate::services::token_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
    /// Revoke every session of the account, not just this one.
    #[serde(default)]
    pub everywhere: bool,
}

/// POST /logout - sign out. Unknown tokens are treated as already signed out.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogoutRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    let token_hash = token_service::hash_token(&req.refresh_token);
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let credential_id = refresh_tokens::table
        .filter(refresh_tokens::token_hash.eq(&token_hash))
        .select(refresh_tokens::credential_id)
        .first::<uuid::Uuid>(&mut conn)
        .optional()?;

    let Some(credential_id) = credential_id else {
        return Ok(Json(ApiResponse::ok("signed out")));
    };

    let active = refresh_tokens::table
        .filter(refresh_tokens::credential_id.eq(credential_id))
        .filter(refresh_tokens::revoked_at.is_null());

    let revoked = if req.everywhere {
        diesel::update(active)
            .set(refresh_tokens::revoked_at.eq(Some(Utc::now())))
            .execute(&mut conn)?
    } else {
        diesel::update(active.filter(refresh_tokens::token_hash.eq(&token_hash)))
            .set(refresh_tokens::revoked_at.eq(Some(Utc::now())))
            .execute(&mut conn)?
    };

    state.sessions.publish(credential_id, SessionChange::SignedOut);
    tracing::info!(user_id = %credential_id, revoked, everywhere = req.everywhere, "signed out");

    Ok(Json(ApiResponse::ok("signed out")))
}
