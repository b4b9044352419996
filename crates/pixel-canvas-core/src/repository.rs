//! Pixel Repository — the write coordinator
//!
//! A thin façade that sequences a draw through the Event Store, the Canvas
//! Cache, and the Broadcast Engine's pending queue. It owns no state of its
//! own beyond `Arc` handles to the three.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::broadcast::BroadcastEngine;
use crate::cache::CanvasCache;
use crate::error::Result;
use crate::event_store::EventStore;
use crate::model::{Color, PendingUpdate, PixelEvent};

/// Coordinates a pixel write across the Event Store, Canvas Cache, and
/// Broadcast Engine.
pub struct PixelRepository {
    event_store: Arc<EventStore>,
    cache: Arc<CanvasCache>,
    broadcast: Arc<BroadcastEngine>,
}

impl PixelRepository {
    /// Construct a repository over the three collaborating components.
    #[must_use]
    pub fn new(
        event_store: Arc<EventStore>,
        cache: Arc<CanvasCache>,
        broadcast: Arc<BroadcastEngine>,
    ) -> Self {
        Self {
            event_store,
            cache,
            broadcast,
        }
    }

    /// Record a pixel draw: append to the Event Store, mirror into the
    /// Canvas Cache, then enqueue for broadcast.
    ///
    /// If the append fails, neither the cache nor the broadcast queue is
    /// touched and the error is returned. A failure to enqueue for
    /// broadcast after a successful append+cache write is logged and
    /// swallowed: the write is already durable and will surface on the
    /// next reload or snapshot fetch, so the batched stream is allowed to
    /// be best-effort.
    pub async fn record(
        &self,
        x: i64,
        y: i64,
        color: Color,
        user_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<PixelEvent> {
        let event = self
            .event_store
            .append(x, y, color, user_id, timestamp)
            .await?;

        self.cache.apply_update(event.clone()).await;
        self.broadcast.enqueue(PendingUpdate::from(&event)).await;

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionManager;

    async fn repository() -> PixelRepository {
        let store = Arc::new(EventStore::in_memory().await.unwrap());
        let cache = Arc::new(CanvasCache::new(store.clone()));
        let sessions = Arc::new(SessionManager::new());
        let broadcast = Arc::new(BroadcastEngine::new(sessions));
        PixelRepository::new(store, cache, broadcast)
    }

    #[tokio::test]
    async fn test_record_persists_and_mirrors_to_cache() {
        let repo = repository().await;
        let event = repo
            .record(10, 10, Color::from_rgb(1, 2, 3), "u1", Utc::now())
            .await
            .unwrap();
        assert_eq!(event.x, 10);

        let cached = repo.cache.get(10, 10).await.unwrap();
        assert_eq!(cached.color, Color::from_rgb(1, 2, 3));
    }

    #[tokio::test]
    async fn test_record_rejects_invalid_coordinate() {
        let repo = repository().await;
        let err = repo
            .record(-1, 0, Color::from_rgb(0, 0, 0), "u1", Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");

        assert!(repo.cache.get_all().await.is_empty());
    }
}
