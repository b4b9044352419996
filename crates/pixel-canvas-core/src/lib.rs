//! Pixel Canvas Core
//!
//! The real-time engine behind a collaborative pixel canvas: a durable,
//! append-only event log; a double-buffered in-memory materialized view of
//! the canvas; a thin write coordinator that keeps the two in lockstep; a
//! rate-limited broadcast fan-out; and the session state machine that a
//! transport layer drives.
//!
//! - [`model`]: canvas data model (color, pixel event, user record, pending
//!   update) and the `[0, 4999]` coordinate bounds.
//! - [`error`]: the shared error taxonomy.
//! - [`event_store`]: append-only SQLite persistence and last-write-wins
//!   aggregation.
//! - [`cache`]: the double-buffered canvas cache.
//! - [`repository`]: the write coordinator (append, mirror, enqueue).
//! - [`broadcast`]: the 10 Hz batched fan-out engine.
//! - [`session`]: per-connection state machine and the live-session registry.
//! - [`users`]: the user directory (nickname/color stamped on writes).
//! - [`protocol`]: the WebSocket wire messages.
//! - [`binary`]: the compact binary snapshot encoding for `/api/pixels/binary`.
//!
//! This crate owns no network listener; the transport loop (axum WebSocket
//! upgrade, HTTP handlers) lives in the `pixel-canvas-server` binary crate.
//!
//! ## Usage
//!
//! ```ignore
//! use pixel_canvas_core::{CanvasCache, EventStore, PixelRepository, BroadcastEngine, SessionManager};
//! use std::sync::Arc;
//!
//! # async fn wire() -> pixel_canvas_core::error::Result<()> {
//! let event_store = Arc::new(EventStore::in_memory().await?);
//! let cache = Arc::new(CanvasCache::new(event_store.clone()));
//! cache.reload().await?;
//! let sessions = Arc::new(SessionManager::new());
//! let broadcast = Arc::new(BroadcastEngine::new(sessions));
//! let repo = PixelRepository::new(event_store, cache, broadcast);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod binary;
pub mod broadcast;
pub mod cache;
pub mod error;
pub mod event_store;
pub mod model;
pub mod protocol;
pub mod repository;
pub mod session;
pub mod users;

pub use broadcast::BroadcastEngine;
pub use cache::CanvasCache;
pub use error::{Error, Result};
pub use event_store::EventStore;
pub use model::{Color, PendingUpdate, PixelEvent, UserRecord, CANVAS_HEIGHT, CANVAS_WIDTH};
pub use protocol::{ClientMessage, ServerMessage};
pub use repository::PixelRepository;
pub use session::{Session, SessionManager, SessionState};
pub use users::UserDirectory;
