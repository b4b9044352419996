//! Broadcast Engine — batched 10 Hz fan-out of pixel updates
//!
//! A single-consumer tick drains a FIFO queue of pending updates and fans
//! the batch out to every registered, `Open` session. Sends are
//! best-effort: a failed or non-open session is dropped from the registry
//! with no retry, matching the teacher's broadcast-forwarding task in
//! `cratos-canvas::websocket`.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time;
use tracing::debug;

use crate::model::PendingUpdate;
use crate::protocol::ServerMessage;
use crate::session::SessionManager;

/// Tick interval: 10 Hz.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Batches pending pixel updates and fans them out to registered sessions.
pub struct BroadcastEngine {
    sessions: Arc<SessionManager>,
    pending: Mutex<Vec<PendingUpdate>>,
}

impl BroadcastEngine {
    /// Construct an engine over the given session registry.
    #[must_use]
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Append a record to the pending queue. Constant-time.
    pub async fn enqueue(&self, update: PendingUpdate) {
        self.pending.lock().await.push(update);
    }

    /// Run one tick immediately: drain the pending queue, build a single
    /// `PIXEL_UPDATE` batch preserving enqueue order, and attempt delivery
    /// to every `Open` session. Returns the number of updates in the batch
    /// (0 if the queue was empty — no message is sent in that case).
    pub async fn flush_now(&self) -> usize {
        let batch = {
            let mut pending = self.pending.lock().await;
            if pending.is_empty() {
                return 0;
            }
            std::mem::take(&mut *pending)
        };

        let count = batch.len();
        let message = ServerMessage::pixel_update(batch);
        let bytes = match serde_json::to_vec(&message) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize pixel_update batch");
                return 0;
            }
        };

        // Every registered session, not just `Open` ones: `try_send` already
        // refuses non-`Open` sessions, so routing them through this loop is
        // what gets them unregistered instead of silently skipped forever.
        let sessions = self.sessions.all().await;
        let mut delivered = 0usize;
        for session in sessions {
            if session.try_send(bytes.clone()).await {
                delivered += 1;
            } else {
                self.sessions.unregister(session.id()).await;
            }
        }

        debug!(batch_size = count, delivered, "broadcast tick");
        count
    }

    /// Run the tick loop at [`TICK_INTERVAL`] until `shutdown` resolves.
    /// On shutdown, drains the queue exactly once more before returning.
    pub async fn run(&self, shutdown: tokio::sync::watch::Receiver<bool>) {
        self.run_with_interval(TICK_INTERVAL, shutdown).await;
    }

    /// As [`BroadcastEngine::run`], but with an explicit tick interval
    /// (the server wires this to the configured `canvas.broadcast_tick_ms`).
    pub async fn run_with_interval(&self, tick: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = time::interval(tick);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.flush_now().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.flush_now().await;
                        break;
                    }
                }
            }
        }
    }
}
