//! Pixel canvas server entry point
//!
//! Wires the Event Store, Canvas Cache, Pixel Repository, Broadcast Engine,
//! Session Manager, and User Directory over one shared SQLite pool, then
//! serves the HTTP Snapshot API and the `/ws` upgrade route behind a single
//! `axum::serve` with graceful shutdown, grounded on the teacher's
//! `server.rs` bootstrap tail.

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixel_canvas_core::{
    BroadcastEngine, CanvasCache, EventStore, PixelRepository, SessionManager, UserDirectory,
};

mod config;
mod cookie;
mod error_response;
mod http;
mod shutdown;
mod state;
mod ws;

use config::AppConfig;
use shutdown::ShutdownController;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        environment = %config.server.environment,
        host = %config.server.host,
        port = config.server.port,
        "starting pixel canvas server"
    );

    let controller = ShutdownController::new();
    let app_state = bootstrap(&config, controller.token()).await?;
    spawn_background_tasks(&app_state, &config, controller.clone());

    let app = build_router(app_state);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server bind address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal_with_controller(controller))
        .await
        .context("server error")?;

    info!("pixel canvas server shut down cleanly");
    Ok(())
}

fn init_tracing() {
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());
    std::mem::forget(guard);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixel_canvas_server=info,pixel_canvas_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
        .init();
}

/// Connect one SQLite pool and stand up every component over it. Failure
/// here is fatal: the process cannot serve without durable storage.
async fn bootstrap(config: &AppConfig, shutdown: tokio_util::sync::CancellationToken) -> Result<AppState> {
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&config.database_uri)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_uri))?;

    let event_store = Arc::new(EventStore::new(pool.clone()));
    event_store
        .run_migrations()
        .await
        .context("event store migration failed")?;

    let users = Arc::new(UserDirectory::new(pool));
    users
        .run_migrations()
        .await
        .context("user directory migration failed")?;

    let cache = Arc::new(CanvasCache::new(event_store.clone()));
    cache
        .reload()
        .await
        .context("initial canvas cache load failed")?;

    let sessions = Arc::new(SessionManager::new());
    let broadcast = Arc::new(BroadcastEngine::new(sessions.clone()));
    let repository = Arc::new(PixelRepository::new(
        event_store.clone(),
        cache.clone(),
        broadcast.clone(),
    ));

    info!(pixels = cache.get_all().await.len(), "canvas cache primed");

    Ok(AppState {
        cache,
        repository,
        sessions,
        broadcast,
        users,
        config: Arc::new(config.clone()),
        shutdown,
    })
}

fn build_router(state: AppState) -> Router {
    http::router()
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Spawn the three periodic background loops: the broadcast ticker (10 Hz,
/// owned by [`BroadcastEngine::run`]), the canvas cache reload timer, and
/// the keepalive sweep that pings (or evicts) every open session.
fn spawn_background_tasks(state: &AppState, config: &AppConfig, controller: Arc<ShutdownController>) {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let broadcast_watch_token = controller.token();
    tokio::spawn(async move {
        broadcast_watch_token.cancelled().await;
        let _ = shutdown_tx.send(true);
    });

    let broadcast = state.broadcast.clone();
    let broadcast_tick = Duration::from_millis(config.canvas.broadcast_tick_ms);
    tokio::spawn(async move {
        broadcast.run_with_interval(broadcast_tick, shutdown_rx).await;
    });

    let cache = state.cache.clone();
    let reload_interval = Duration::from_secs(config.canvas.reload_interval_secs);
    let reload_token = controller.token();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(reload_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = cache.reload().await {
                        warn!(error = %e, "canvas cache reload failed");
                    }
                }
                _ = reload_token.cancelled() => break,
            }
        }
    });

    let sessions = state.sessions.clone();
    let ping_interval = Duration::from_secs(config.canvas.ping_interval_secs);
    let ping_token = controller.token();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let needs_ping = sessions.sweep_keepalive().await;
                    for session in needs_ping {
                        let frame = pixel_canvas_core::ServerMessage::keepalive_ping();
                        if let Ok(bytes) = serde_json::to_vec(&frame) {
                            session.try_send(bytes).await;
                        }
                    }
                }
                _ = ping_token.cancelled() => break,
            }
        }
    });
}
