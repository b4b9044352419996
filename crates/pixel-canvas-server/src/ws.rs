//! WebSocket transport loop (Component E, transport half)
//!
//! `pixel_canvas_core::session` owns the `Session` state machine and the
//! live-session registry; this module drives the actual axum
//! `WebSocketUpgrade` and the per-connection read/write loop, grounded on
//! the teacher's split-sink-behind-a-task pattern in
//! `src/websocket/gateway/connection.rs`: one task reads frames and drives
//! persistence/broadcast, a paired outbound channel is drained to forward
//! bytes to the real sink, so sends stay serialized per session without
//! holding the sink across awaits on the read side.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use pixel_canvas_core::{Color, Error};
use pixel_canvas_core::{ClientMessage, Session, ServerMessage, SessionState};

use crate::cookie::read_session_cookie;
use crate::state::{AppState, ANONYMOUS_USER_ID};

/// `GET /ws` upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let cookie_user_id = read_session_cookie(&headers);
    ws.on_upgrade(move |socket| handle_socket(socket, state, cookie_user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, cookie_user_id: Option<String>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
    let (session, session_id) = Session::new(outbound_tx);
    session.set_state(SessionState::Open).await;
    state.sessions.register(session.clone()).await;

    info!(session_id = %session_id, "session opened");

    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            () = session.closed() => {
                // Reaped by the keepalive sweep (or explicitly unregistered):
                // actually terminate the transport rather than leaving the
                // socket open with a session no longer tracked anywhere.
                let _ = ws_tx.send(Message::Close(None)).await;
                debug!(session_id = %session_id, "session reaped, closing transport");
                break;
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(bytes) => {
                        let Ok(text) = String::from_utf8(bytes) else { continue };
                        if ws_tx.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        session.mark_alive();
                        handle_frame(&text, &session, &state, cookie_user_id.as_deref()).await;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        session.mark_alive();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(session_id = %session_id, "peer closed connection");
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let _ = send_error(&session, "binary frames are not supported").await;
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, error = %e, "websocket transport error");
                        break;
                    }
                }
            }
        }
    }

    session.set_state(SessionState::Closed).await;
    state.sessions.unregister(session_id).await;
    info!(session_id = %session_id, "session closed");
}

async fn handle_frame(text: &str, session: &Session, state: &AppState, cookie_user_id: Option<&str>) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            let _ = send_error(session, &format!("malformed frame: {e}")).await;
            return;
        }
    };

    match message {
        ClientMessage::KeepalivePong => {
            session.mark_alive();
        }
        ClientMessage::DrawPixel { x, y, color } => {
            if let Err(e) = handle_draw_pixel(session, state, cookie_user_id, x, y, &color).await {
                let _ = send_error(session, &e.to_string()).await;
            }
        }
    }
}

async fn handle_draw_pixel(
    session: &Session,
    state: &AppState,
    cookie_user_id: Option<&str>,
    x: i64,
    y: i64,
    color: &str,
) -> Result<(), Error> {
    let color = Color::parse(color)?;
    let user_id = attribute_user(session, state, cookie_user_id).await?;

    state
        .repository
        .record(x, y, color, &user_id, chrono::Utc::now())
        .await?;
    Ok(())
}

/// Resolve and cache this session's `userId`, per spec §4.E "Attribute":
/// once a `userId` is cached it is never recomputed.
async fn attribute_user(
    session: &Session,
    state: &AppState,
    cookie_user_id: Option<&str>,
) -> Result<String, Error> {
    if let Some(existing) = session.user_id().await {
        return Ok(existing);
    }

    let user_id = match cookie_user_id {
        Some(id) if state.users.get_user(id).await?.is_some() => id.to_string(),
        _ => ANONYMOUS_USER_ID.to_string(),
    };
    session.set_user_id(user_id.clone()).await;
    Ok(user_id)
}

async fn send_error(session: &Session, message: &str) -> bool {
    let frame = ServerMessage::error(message);
    match serde_json::to_vec(&frame) {
        Ok(bytes) => session.try_send(bytes).await,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixel_canvas_core::{BroadcastEngine, CanvasCache, EventStore, PixelRepository, SessionManager, UserDirectory};
    use std::sync::Arc;

    async fn test_state() -> AppState {
        let store = Arc::new(EventStore::in_memory().await.unwrap());
        let cache = Arc::new(CanvasCache::new(store.clone()));
        let sessions = Arc::new(SessionManager::new());
        let broadcast = Arc::new(BroadcastEngine::new(sessions.clone()));
        let repository = Arc::new(PixelRepository::new(store.clone(), cache.clone(), broadcast.clone()));
        let users = Arc::new(UserDirectory::new(store.pool().clone()));
        users.run_migrations().await.unwrap();
        AppState {
            cache,
            repository,
            sessions,
            broadcast,
            users,
            config: Arc::new(crate::config::load_test_config()),
            shutdown: tokio_util::sync::CancellationToken::new(),
        }
    }

    fn test_session() -> (Arc<Session>, tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let (session, _id) = Session::new(tx);
        (session, rx)
    }

    #[tokio::test]
    async fn test_draw_pixel_persists_and_attributes_anonymous() {
        let state = test_state().await;
        let (session, _rx) = test_session();
        session.set_state(SessionState::Open).await;

        handle_draw_pixel(&session, &state, None, 1, 1, "#FF0000")
            .await
            .unwrap();

        let cell = state.cache.get(1, 1).await.unwrap();
        assert_eq!(cell.user_id, ANONYMOUS_USER_ID);
    }

    #[tokio::test]
    async fn test_draw_pixel_rejects_out_of_range() {
        let state = test_state().await;
        let (session, _rx) = test_session();
        session.set_state(SessionState::Open).await;

        let err = handle_draw_pixel(&session, &state, None, -1, 0, "#FF0000")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[tokio::test]
    async fn test_draw_pixel_rejects_malformed_color() {
        let state = test_state().await;
        let (session, _rx) = test_session();
        session.set_state(SessionState::Open).await;

        let err = handle_draw_pixel(&session, &state, None, 0, 0, "blue")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[tokio::test]
    async fn test_attribute_user_caches_across_calls() {
        let state = test_state().await;
        let (session, _rx) = test_session();

        let first = attribute_user(&session, &state, None).await.unwrap();
        let second = attribute_user(&session, &state, Some("someone-else")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_attribute_user_uses_known_cookie() {
        let state = test_state().await;
        let created = state.users.create_user().await.unwrap();
        let (session, _rx) = test_session();

        let user_id = attribute_user(&session, &state, Some(&created.user_id))
            .await
            .unwrap();
        assert_eq!(user_id, created.user_id);
    }

    #[tokio::test]
    async fn test_handle_frame_malformed_json_sends_error() {
        let state = test_state().await;
        let (session, mut rx) = test_session();
        session.set_state(SessionState::Open).await;

        handle_frame("not json", &session, &state, None).await;

        let bytes = rx.recv().await.unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"type\":\"ERROR\""));
    }
}
