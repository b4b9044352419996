//! Shared application state, wired once at startup and cloned (as `Arc`s)
//! into every axum handler and background task.

use std::sync::Arc;

use pixel_canvas_core::{BroadcastEngine, CanvasCache, PixelRepository, SessionManager, UserDirectory};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

/// The literal anonymous user id attributed to writes from a session with
/// no cookie, per spec §9's "strict parity" open-question decision: the
/// observable wire behavior (a non-empty `userId` string) is unchanged
/// whether or not a production deployment later swaps this for a per-cookie
/// identity, so this server keeps the shared literal rather than guessing.
pub const ANONYMOUS_USER_ID: &str = "anonymous";

/// Name of the HTTP-only session cookie set by `POST /api/users`.
pub const SESSION_COOKIE_NAME: &str = "pixel_session";

/// Cookie lifetime in seconds (30 days), per spec §6.
pub const SESSION_COOKIE_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

/// Everything an axum handler or background task needs.
#[derive(Clone)]
pub struct AppState {
    /// Canvas Cache (Component B) — read path for the Snapshot API.
    pub cache: Arc<CanvasCache>,
    /// Pixel Repository (Component C) — write path for draws.
    pub repository: Arc<PixelRepository>,
    /// Session Manager (Component E) — live-session registry.
    pub sessions: Arc<SessionManager>,
    /// Broadcast Engine (Component D) — batched fan-out.
    pub broadcast: Arc<BroadcastEngine>,
    /// User Directory (Component G).
    pub users: Arc<UserDirectory>,
    /// Loaded configuration.
    pub config: Arc<AppConfig>,
    /// Cancelled when the server begins graceful shutdown; the WebSocket
    /// transport loop selects on this to send a close frame and stop
    /// rather than wait indefinitely for a peer-initiated close.
    pub shutdown: CancellationToken,
}
