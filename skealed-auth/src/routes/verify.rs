use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use skealed_shared::errors::{AppError, AppResult};
use skealed_shared::types::auth::TokenPair;
use skealed_shared::types::ApiResponse;

use crate::events::publisher;
use crate::routes::me::SessionUser;
use crate::services::session_bus::SessionChange;
use crate::services::{magic_link_service, token_service};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: SessionUser,
    pub tokens: TokenPair,
    pub redirect_to: String,
    pub first_sign_in: bool,
}

/// POST /verify - exchange a magic-link token for a session
pub async fn verify_magic_link(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> AppResult<Json<ApiResponse<SessionResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let (credential, created, redirect_to, tokens) = conn.transaction::<_, AppError, _>(|conn| {
        let link = magic_link_service::consume(conn, req.token.trim())?;
        let (credential, created) =
            magic_link_service::find_or_create_credential(conn, &link.email, &state.config.admin_email)?;
        let tokens = token_service::issue_session(conn, &credential, &state.config)?;
        Ok((credential, created, link.redirect_to, tokens))
    })?;

    if created {
        publisher::publish_user_registered(&state.rabbitmq, credential.id, &credential.email).await;
    }
    state.sessions.publish(credential.id, SessionChange::SignedIn);

    tracing::info!(user_id = %credential.id, first_sign_in = created, "signed in with magic link");

    Ok(Json(ApiResponse::ok(SessionResponse {
        user: SessionUser::from(credential),
        tokens,
        redirect_to,
        first_sign_in: created,
    })))
}
