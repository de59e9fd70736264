use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use skealed_shared::errors::{AppError, AppResult, ErrorCode};
use skealed_shared::types::auth::{AuthUser, UserRole};
use skealed_shared::types::ApiResponse;

use crate::models::Credential;
use crate::schema::credentials;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

impl From<Credential> for SessionUser {
    fn from(credential: Credential) -> Self {
        Self {
            id: credential.id,
            role: credential.user_role(),
            email: credential.email,
            created_at: credential.created_at,
            last_sign_in_at: credential.last_sign_in_at,
        }
    }
}

/// GET /me - the signed-in user behind the access token
pub async fn me(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<SessionUser>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let credential = credentials::table
        .find(user.id)
        .first::<Credential>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::CredentialNotFound, "user not found"))?;

    Ok(Json(ApiResponse::ok(SessionUser::from(credential))))
}
