use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use std::sync::Arc;

use skealed_shared::errors::{AppError, AppResult, ErrorCode};
use skealed_shared::types::auth::AuthUser;
use skealed_shared::types::ApiResponse;

use crate::events::publisher;
use crate::models::Credential;
use crate::schema::{credentials, magic_links, refresh_tokens};
use crate::services::session_bus::SessionChange;
use crate::AppState;

/// DELETE /account - permanently delete the signed-in account.
/// Catalog data is purged asynchronously from the `user.deleted` event.
pub async fn delete_account(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let credential = conn.transaction::<_, AppError, _>(|conn| {
        let credential = credentials::table
            .find(user.id)
            .first::<Credential>(conn)
            .optional()?
            .ok_or_else(|| AppError::new(ErrorCode::CredentialNotFound, "user not found"))?;

        diesel::delete(refresh_tokens::table.filter(refresh_tokens::credential_id.eq(credential.id)))
            .execute(conn)?;
        diesel::delete(magic_links::table.filter(magic_links::email.eq(&credential.email)))
            .execute(conn)?;
        diesel::delete(credentials::table.find(credential.id)).execute(conn)?;

        Ok(credential)
    })?;

    publisher::publish_user_deleted(&state.rabbitmq, credential.id, &credential.email).await;
    state.sessions.publish(credential.id, SessionChange::SignedOut);
    state.sessions.publish(credential.id, SessionChange::UserDeleted);

    tracing::info!(user_id = %credential.id, "account deleted");

    Ok(Json(ApiResponse::ok("account deleted")))
}
