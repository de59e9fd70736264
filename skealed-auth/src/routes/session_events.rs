use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use skealed_shared::types::auth::AuthUser;

use crate::services::session_bus::{SessionChange, SessionEvent};
use crate::AppState;

fn concerns(event: &SessionEvent, user_id: Uuid) -> bool {
    event.user_id == user_id
}

/// Account deletion ends the subscription once the frame is sent.
fn is_terminal(change: SessionChange) -> bool {
    change == SessionChange::UserDeleted
}

/// GET /session/events - stream of the caller's session changes.
pub async fn session_events(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let mut rx = state.sessions.subscribe();
    let user_id = user.id;

    tracing::info!(user_id = %user_id, "session subscriber connected");

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !concerns(&event, user_id) {
                        continue;
                    }

                    let json = match serde_json::to_string(&event) {
                        Ok(j) => j,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to serialize session event");
                            continue;
                        }
                    };

                    yield Ok(SseEvent::default()
                        .event(event.change.as_str())
                        .id(event.id.to_string())
                        .data(json));

                    if is_terminal(event.change) {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(user_id = %user_id, skipped = n, "session subscriber lagged");
                    yield Ok(SseEvent::default()
                        .event("_warning")
                        .data(format!("{{\"message\":\"lagged, skipped {n} events\"}}")));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(user_id: Uuid, change: SessionChange) -> SessionEvent {
        SessionEvent { id: Uuid::now_v7(), user_id, change, at: Utc::now() }
    }

    #[test]
    fn only_own_events_are_streamed() {
        let me = Uuid::new_v4();
        assert!(concerns(&event(me, SessionChange::SignedIn), me));
        assert!(!concerns(&event(Uuid::new_v4(), SessionChange::SignedIn), me));
    }

    #[test]
    fn only_deletion_closes_the_stream() {
        assert!(is_terminal(SessionChange::UserDeleted));
        assert!(!is_terminal(SessionChange::SignedOut));
        assert!(!is_terminal(SessionChange::TokenRefreshed));
        assert!(!is_terminal(SessionChange::SignedIn));
    }
}
