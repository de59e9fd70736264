use axum::extract::State;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;

use skealed_shared::errors::{AppError, AppResult, ErrorCode};
use skealed_shared::types::auth::TokenPair;
use skealed_shared::types::ApiResponse;

use crate::models::{Credential, RefreshToken};
use crate::schema::{credentials, refresh_tokens};
use crate::services::session_bus::SessionChange;
use crate::services::token_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /refresh - rotate the refresh token
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let token_hash = token_service::hash_token(&req.refresh_token);
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let (credential_id, pair) = conn.transaction::<_, AppError, _>(|conn| {
        let stored = refresh_tokens::table
            .filter(refresh_tokens::token_hash.eq(&token_hash))
            .for_update()
            .first::<RefreshToken>(conn)
            .optional()?
            .ok_or_else(|| AppError::new(ErrorCode::TokenInvalid, "invalid refresh token"))?;

        if stored.revoked_at.is_some() {
            return Err(AppError::new(ErrorCode::RefreshTokenRevoked, "refresh token revoked"));
        }
        if stored.expires_at < Utc::now() {
            return Err(AppError::new(ErrorCode::TokenExpired, "refresh token expired"));
        }

        diesel::update(refresh_tokens::table.find(stored.id))
            .set(refresh_tokens::revoked_at.eq(Some(Utc::now())))
            .execute(conn)?;

        let credential = credentials::table
            .find(stored.credential_id)
            .first::<Credential>(conn)
            .optional()?
            .ok_or_else(|| AppError::new(ErrorCode::CredentialNotFound, "user not found"))?;

        let pair = token_service::issue_session(conn, &credential, &state.config)?;
        Ok((credential.id, pair))
    })?;

    state.sessions.publish(credential_id, SessionChange::TokenRefreshed);

    Ok(Json(ApiResponse::ok(pair)))
}
