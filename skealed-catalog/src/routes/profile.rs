use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use skealed_shared::errors::{AppError, AppResult, ErrorCode};
use skealed_shared::types::auth::AuthUser;
use skealed_shared::types::ApiResponse;

use crate::events::publisher;
use crate::services::profile_service::{self, ProfileView};
use crate::AppState;

/// GET /profile
pub async fn get_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<ProfileView>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;
    let profile = profile_service::get_profile(&mut conn, user.id)?;

    Ok(Json(ApiResponse::ok(profile)))
}

#[derive(Debug, Serialize)]
pub struct AvatarUploadResponse {
    pub avatar_url: String,
}

/// POST /profile/avatar
pub async fn upload_avatar(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<AvatarUploadResponse>>> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(ErrorCode::AvatarUploadFailed, format!("failed to read multipart: {e}")))?
        .ok_or_else(|| AppError::new(ErrorCode::AvatarUploadFailed, "no file provided"))?;

    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let ext = profile_service::extension_for(&content_type).ok_or_else(|| {
        AppError::new(
            ErrorCode::AvatarUploadFailed,
            "unsupported image format, accepted: jpeg, png, webp, gif",
        )
    })?;

    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::new(ErrorCode::AvatarUploadFailed, format!("failed to read file data: {e}")))?;

    if data.is_empty() {
        return Err(AppError::new(ErrorCode::AvatarUploadFailed, "file is empty"));
    }
    if data.len() > state.config.avatar_max_bytes {
        let limit_mb = state.config.avatar_max_bytes / (1024 * 1024);
        return Err(AppError::new(
            ErrorCode::PayloadTooLarge,
            format!("avatar must be {limit_mb} MB or smaller"),
        ));
    }

    let key = profile_service::avatar_object_key(user.id, ext);
    let stored = state
        .avatars
        .put(&key, data.to_vec(), &content_type)
        .await
        .map_err(|e| AppError::new(ErrorCode::AvatarUploadFailed, e))?;

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;
    let previous = match profile_service::set_avatar(&mut conn, user.id, &stored.url, &stored.key) {
        Ok(previous) => previous,
        Err(e) => {
            if let Err(cleanup) = state.avatars.remove(&stored.key).await {
                tracing::warn!(error = %cleanup, key = %stored.key, "failed to delete rejected avatar");
            }
            return Err(e);
        }
    };

    if let Some(old_key) = previous {
        if let Err(e) = state.avatars.remove(&old_key).await {
            tracing::warn!(error = %e, key = %old_key, "failed to delete previous avatar");
        }
    }

    tracing::info!(user_id = %user.id, avatar_url = %stored.url, "avatar uploaded");
    publisher::publish_avatar_updated(&state.rabbitmq, user.id, &stored.url).await;

    Ok(Json(ApiResponse::ok(AvatarUploadResponse { avatar_url: stored.url })))
}
