use axum::extract::State;
use axum::Json;
use metrics::counter;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use skealed_shared::errors::{AppError, AppResult, ErrorCode};
use skealed_shared::types::ApiResponse;

use crate::services::{magic_link_service, token_service};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct MagicLinkRequest {
    #[validate(email)]
    pub email: String,
    pub redirect_to: Option<String>,
}

/// POST /magic-link - e-mail a one-time sign-in link
pub async fn request_magic_link(
    State(state): State<Arc<AppState>>,
    Json(mut req): Json<MagicLinkRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    req.email = magic_link_service::normalize_email(&req.email);
    req.validate()
        .map_err(|_| AppError::new(ErrorCode::InvalidEmail, "please enter a valid email address"))?;
    let email = req.email;

    let cooldown_key = cooldown_key(&email);
    let cooldown = Duration::from_secs(state.config.magic_link_cooldown_secs);
    let claimed = match state.redis.claim(&cooldown_key, cooldown).await {
        Ok(true) => true,
        Ok(false) => {
            let retry_after = state.redis.remaining(&cooldown_key).await.ok().flatten();
            return Err(AppError::with_details(
                ErrorCode::EmailRateLimited,
                "please wait before requesting another link",
                serde_json::json!({ "retry_after_secs": retry_after }),
            ));
        }
        Err(e) => {
            tracing::warn!(error = %e, "magic-link cooldown unavailable");
            false
        }
    };

    let sent = send_link(&state, &email, req.redirect_to.as_deref()).await;
    if releases_cooldown(claimed, &sent) {
        if let Err(e) = state.redis.release(&cooldown_key).await {
            tracing::warn!(error = %e, "failed to release magic-link cooldown");
        }
    }
    sent?;

    counter!("skealed_magic_links_sent_total").increment(1);
    tracing::info!("magic link sent");

    Ok(Json(ApiResponse::ok_with_message((), "Check your email for the magic link!")))
}

fn cooldown_key(email: &str) -> String {
    format!("magic:cooldown:{}", token_service::hash_token(email))
}

/// A request that sent nothing does not hold the address's cooldown.
fn releases_cooldown(claimed: bool, sent: &AppResult<()>) -> bool {
    claimed && sent.is_err()
}

async fn send_link(state: &AppState, email: &str, requested_redirect: Option<&str>) -> AppResult<()> {
    let redirect_to = magic_link_service::sanitize_redirect(&state.config.site_url, requested_redirect);

    let token = {
        let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;
        magic_link_service::issue(&mut conn, email, redirect_to, state.config.magic_link_ttl_minutes)?
    };

    let link = magic_link_service::callback_url(&state.config.site_url, &token);
    state
        .email
        .send_magic_link(email, &link, state.config.magic_link_ttl_minutes)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to send magic link");
            AppError::new(ErrorCode::EmailDeliveryFailed, "could not send the sign-in email, try again")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_delivery_frees_the_cooldown() {
        let failed: AppResult<()> = Err(AppError::new(ErrorCode::EmailDeliveryFailed, "down"));
        assert!(releases_cooldown(true, &failed));
        assert!(!releases_cooldown(true, &Ok(())));
        assert!(!releases_cooldown(false, &failed));
    }

    #[test]
    fn cooldown_key_does_not_expose_the_address() {
        let key = cooldown_key("learner@example.com");
        assert!(key.starts_with("magic:cooldown:"));
        assert!(!key.contains("learner"));
        assert_eq!(key, cooldown_key("learner@example.com"));
    }
}
