//! Configuration loading
//!
//! Layered the way the teacher's `load_config()` does it: embedded
//! defaults, optional file overrides, then environment variables with a
//! `PIXELCANVAS_` prefix, deserialized into a typed [`AppConfig`].
//! `database_uri` has no default — startup fails (§7 Fatal) if it is absent
//! or unreachable.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

/// Embedded default configuration, compiled into the binary.
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP/WebSocket bind settings and environment label.
    pub server: ServerConfig,
    /// SQLite connection string. Mandatory: no default is provided, so
    /// startup fails if it is missing (matching the Fatal error kind for
    /// "database connectivity loss during startup").
    pub database_uri: String,
    /// Canvas bounds and timing knobs.
    #[serde(default)]
    pub canvas: CanvasConfig,
}

/// Server bind configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Environment label surfaced on `GET /health`.
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3001
}
fn default_environment() -> String {
    "development".to_string()
}

/// Scheduling knobs for the canvas's periodic background tasks. Canvas
/// bounds themselves are not configurable here: they are the fixed
/// `CANVAS_WIDTH`/`CANVAS_HEIGHT` constants in `pixel_canvas_core::model`,
/// matching the specification's "bounded 5000x5000 grid" invariant rather
/// than a per-deployment tunable.
#[derive(Debug, Clone, Deserialize)]
pub struct CanvasConfig {
    /// Full canvas cache reload interval, in seconds. Default 900 (15 min).
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,
    /// Broadcast tick interval, in milliseconds. Default 100 (10 Hz).
    #[serde(default = "default_broadcast_tick_ms")]
    pub broadcast_tick_ms: u64,
    /// Keepalive ping interval, in seconds. Default 30.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

fn default_reload_interval_secs() -> u64 {
    900
}
fn default_broadcast_tick_ms() -> u64 {
    100
}
fn default_ping_interval_secs() -> u64 {
    30
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            reload_interval_secs: default_reload_interval_secs(),
            broadcast_tick_ms: default_broadcast_tick_ms(),
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

/// Load configuration from embedded defaults, optional override files, and
/// `PIXELCANVAS_`-prefixed environment variables (highest priority).
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name("config/local").required(false))
        .add_source(
            Environment::with_prefix("PIXELCANVAS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to build configuration")?;

    config
        .try_deserialize()
        .context("failed to deserialize configuration (is PIXELCANVAS_DATABASE_URI set?)")
}

/// Build a minimal config for unit tests elsewhere in this crate, bypassing
/// file/env layering.
#[cfg(test)]
pub(crate) fn load_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: default_host(),
            port: default_port(),
            environment: "test".to_string(),
        },
        database_uri: "sqlite::memory:".to_string(),
        canvas: CanvasConfig::default(),
    }
}
