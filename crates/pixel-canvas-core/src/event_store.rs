//! Event Store — append-only persistence of pixel draws
//!
//! This module provides SQLite-backed storage for pixel events. Events are
//! never mutated or deleted; `snapshot_latest`/`snapshot_region` materialize
//! the last-write-wins view by aggregating over the raw log.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::model::{validate_coord, Color, PixelEvent};

/// Event store for persisting pixel draws to SQLite.
#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    /// Create a new event store with the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new event store from a database path, creating the file and
    /// running migrations if needed.
    pub async fn from_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::persistence(format!("failed to create directory: {e}")))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| Error::persistence(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        info!("event store initialized at {}", db_path.display());
        Ok(store)
    }

    /// Create a new in-memory event store (for testing).
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::persistence(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        debug!("in-memory event store initialized");
        Ok(store)
    }

    /// Create the `pixel_events` table and its coordinate index if they do
    /// not already exist. Exposed so callers sharing one pool across the
    /// Event Store and the User Directory (see `main`) can run both
    /// migrations against a pool they built themselves.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pixel_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                x INTEGER NOT NULL,
                y INTEGER NOT NULL,
                color_r INTEGER NOT NULL,
                color_g INTEGER NOT NULL,
                color_b INTEGER NOT NULL,
                user_id TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::persistence(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_pixel_events_coord
            ON pixel_events(x, y, timestamp DESC, id DESC)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::persistence(e.to_string()))?;

        debug!("event store migrations completed");
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append a pixel event. Validates coordinates and returns
    /// `Error::Validation` before touching storage; any SQLite failure
    /// surfaces as `Error::Persistence`. On success the event is durable and
    /// carries the assigned `seq`.
    #[instrument(skip(self, color))]
    pub async fn append(
        &self,
        x: i64,
        y: i64,
        color: Color,
        user_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<PixelEvent> {
        let (x, y) = validate_coord(x, y)?;
        if user_id.is_empty() {
            return Err(Error::validation("user_id must not be empty"));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO pixel_events (x, y, color_r, color_g, color_b, user_id, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(i64::from(x))
        .bind(i64::from(y))
        .bind(i64::from(color.r))
        .bind(i64::from(color.g))
        .bind(i64::from(color.b))
        .bind(user_id)
        .bind(timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::persistence(e.to_string()))?;

        Ok(PixelEvent {
            x,
            y,
            color,
            user_id: user_id.to_string(),
            timestamp,
            seq: result.last_insert_rowid(),
        })
    }

    /// For each coordinate that has ever been written, yield the event with
    /// the greatest `(timestamp, id)`. Returned in canonical ascending
    /// `(x, y)` order.
    #[instrument(skip(self))]
    pub async fn snapshot_latest(&self) -> Result<Vec<PixelEvent>> {
        self.snapshot_query(None).await
    }

    /// As `snapshot_latest`, restricted to the inclusive bounding box.
    #[instrument(skip(self))]
    pub async fn snapshot_region(
        &self,
        min_x: u16,
        min_y: u16,
        max_x: u16,
        max_y: u16,
    ) -> Result<Vec<PixelEvent>> {
        self.snapshot_query(Some((min_x, min_y, max_x, max_y))).await
    }

    async fn snapshot_query(&self, bounds: Option<(u16, u16, u16, u16)>) -> Result<Vec<PixelEvent>> {
        let where_clause = if bounds.is_some() {
            "WHERE x BETWEEN ?1 AND ?2 AND y BETWEEN ?3 AND ?4"
        } else {
            ""
        };

        let sql = format!(
            r#"
            SELECT x, y, color_r, color_g, color_b, user_id, timestamp, id
            FROM pixel_events p
            {where_clause}
            {and_clause}
            id = (
                SELECT id FROM pixel_events q
                WHERE q.x = p.x AND q.y = p.y
                ORDER BY q.timestamp DESC, q.id DESC
                LIMIT 1
            )
            ORDER BY x ASC, y ASC
            "#,
            and_clause = if bounds.is_some() { "AND" } else { "WHERE" },
        );

        let mut query = sqlx::query(&sql);
        if let Some((min_x, min_y, max_x, max_y)) = bounds {
            query = query
                .bind(i64::from(min_x))
                .bind(i64::from(max_x))
                .bind(i64::from(min_y))
                .bind(i64::from(max_y));
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::persistence(e.to_string()))?;

        rows.into_iter().map(row_to_event).collect()
    }
}

fn row_to_event(row: sqlx::sqlite::SqliteRow) -> Result<PixelEvent> {
    let x: i64 = row.try_get("x").map_err(|e| Error::persistence(e.to_string()))?;
    let y: i64 = row.try_get("y").map_err(|e| Error::persistence(e.to_string()))?;
    let r: i64 = row
        .try_get("color_r")
        .map_err(|e| Error::persistence(e.to_string()))?;
    let g: i64 = row
        .try_get("color_g")
        .map_err(|e| Error::persistence(e.to_string()))?;
    let b: i64 = row
        .try_get("color_b")
        .map_err(|e| Error::persistence(e.to_string()))?;
    let user_id: String = row
        .try_get("user_id")
        .map_err(|e| Error::persistence(e.to_string()))?;
    let timestamp: String = row
        .try_get("timestamp")
        .map_err(|e| Error::persistence(e.to_string()))?;
    let seq: i64 = row.try_get("id").map_err(|e| Error::persistence(e.to_string()))?;

    Ok(PixelEvent {
        x: x as u16,
        y: y as u16,
        color: Color::from_rgb(r as u8, g as u8, b as u8),
        user_id,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::persistence(e.to_string()))?,
        seq,
    })
}
