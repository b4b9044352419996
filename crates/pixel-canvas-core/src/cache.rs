//! Canvas Cache — double-buffered in-memory view of the current canvas
//!
//! Two buffers hold the materialized "current pixel per coordinate" view.
//! One is active and serves reads; the other is rebuilt from the Event
//! Store in the background during `reload()`, then swapped in. Updates that
//! arrive mid-reload are captured and replayed onto the fresh buffer before
//! the swap, so no write is ever lost.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::event_store::EventStore;
use crate::model::PixelEvent;

type Buffer = HashMap<(u16, u16), PixelEvent>;

/// Soft deadline for a single reload's Event Store query. A reload that
/// cannot complete within this window is abandoned rather than left to
/// hold `is_loading` forever.
const RELOAD_DEADLINE: Duration = Duration::from_secs(60);

struct CacheInner {
    buffers: [Buffer; 2],
    active_index: usize,
    is_loading: bool,
    pending_since_reload: Vec<PixelEvent>,
}

/// Double-buffered canvas cache.
pub struct CanvasCache {
    inner: RwLock<CacheInner>,
    event_store: Arc<EventStore>,
}

impl CanvasCache {
    /// Construct an empty cache backed by the given event store. Callers
    /// should invoke [`CanvasCache::reload`] once at startup to populate it.
    #[must_use]
    pub fn new(event_store: Arc<EventStore>) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                buffers: [HashMap::new(), HashMap::new()],
                active_index: 0,
                is_loading: false,
                pending_since_reload: Vec::new(),
            }),
            event_store,
        }
    }

    /// Write `rec` into the active buffer, replacing any prior entry for
    /// that coordinate. If a reload is in progress, also captures `rec` so
    /// it survives the upcoming swap.
    pub async fn apply_update(&self, rec: PixelEvent) {
        let mut inner = self.inner.write().await;
        let idx = inner.active_index;
        let key = (rec.x, rec.y);
        if inner.is_loading {
            inner.pending_since_reload.push(rec.clone());
        }
        inner.buffers[idx].insert(key, rec);
    }

    /// Read the current value at a coordinate from the active buffer.
    pub async fn get(&self, x: u16, y: u16) -> Option<PixelEvent> {
        let inner = self.inner.read().await;
        inner.buffers[inner.active_index].get(&(x, y)).cloned()
    }

    /// Snapshot of every entry in the active buffer, in canonical ascending
    /// `(x, y)` order.
    pub async fn get_all(&self) -> Vec<PixelEvent> {
        let inner = self.inner.read().await;
        let mut out: Vec<_> = inner.buffers[inner.active_index].values().cloned().collect();
        out.sort_by_key(|e| (e.x, e.y));
        out
    }

    /// Snapshot of every entry in the active buffer whose coordinate falls
    /// in the inclusive bounding box, in canonical ascending `(x, y)` order.
    pub async fn get_region(&self, min_x: u16, min_y: u16, max_x: u16, max_y: u16) -> Vec<PixelEvent> {
        let inner = self.inner.read().await;
        let mut out: Vec<_> = inner.buffers[inner.active_index]
            .values()
            .filter(|e| e.x >= min_x && e.x <= max_x && e.y >= min_y && e.y <= max_y)
            .cloned()
            .collect();
        out.sort_by_key(|e| (e.x, e.y));
        out
    }

    /// Rebuild the standby buffer from the Event Store and swap it in. At
    /// most one reload runs concurrently; a call that arrives while one is
    /// already in progress is a no-op. Bounded by [`RELOAD_DEADLINE`]: a
    /// reload that doesn't complete in time is abandoned, leaving the
    /// active buffer untouched, so a stuck Event Store query can never wedge
    /// `is_loading` or leave `pending_since_reload` growing unbounded.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> crate::error::Result<()> {
        self.reload_with_deadline(RELOAD_DEADLINE).await
    }

    async fn reload_with_deadline(&self, deadline: Duration) -> crate::error::Result<()> {
        {
            let mut inner = self.inner.write().await;
            if inner.is_loading {
                debug!("reload already in progress, skipping");
                return Ok(());
            }
            inner.is_loading = true;
        }

        let latest = match timeout(deadline, self.event_store.snapshot_latest()).await {
            Ok(result) => result?,
            Err(_) => {
                let mut inner = self.inner.write().await;
                inner.is_loading = false;
                inner.pending_since_reload.clear();
                warn!(?deadline, "canvas cache reload timed out, keeping stale active buffer");
                return Ok(());
            }
        };
        let mut fresh: Buffer = latest.into_iter().map(|e| ((e.x, e.y), e)).collect();

        let mut inner = self.inner.write().await;
        for rec in std::mem::take(&mut inner.pending_since_reload) {
            fresh.insert((rec.x, rec.y), rec);
        }

        let standby = inner.active_index ^ 1;
        inner.buffers[standby] = fresh;
        inner.active_index = standby;
        inner.is_loading = false;

        debug!(entries = inner.buffers[standby].len(), "canvas cache reloaded");
        Ok(())
    }
}
