//! Graceful shutdown coordination
//!
//! A `tokio_util::sync::CancellationToken`-based controller, grounded on the
//! teacher's `cratos_core::shutdown::ShutdownController`, scaled down to
//! this server's needs: stop accepting new WebSocket upgrades, let the
//! broadcast/reload/keepalive tasks observe cancellation and exit, then run
//! one last broadcast tick before the process halts.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Coordinates shutdown across the accept loop and the background tickers.
pub struct ShutdownController {
    token: CancellationToken,
}

impl ShutdownController {
    /// Construct a fresh, not-yet-cancelled controller.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            token: CancellationToken::new(),
        })
    }

    /// A child token for a long-running task to select on.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger shutdown. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }
}

/// Resolves when the process receives `Ctrl+C` or, on Unix, `SIGTERM`.
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("received SIGTERM, starting graceful shutdown"),
    }
}

/// Wait for the OS signal, then cancel the controller so every task wired
/// to its token unwinds.
pub async fn shutdown_signal_with_controller(controller: Arc<ShutdownController>) {
    wait_for_shutdown_signal().await;
    controller.cancel();
}
