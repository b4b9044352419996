//! User Directory — minimal `{ userId → nickname, color }` store
//!
//! Used only to stamp writes with a nickname and color; it carries no
//! authentication of its own beyond the opaque `userId` the caller already
//! holds (session cookie or anonymous fallback, decided by the transport
//! layer). SQLite-backed, grounded on the same init/save/load shape the
//! rest of this crate uses for the Event Store.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Color, UserRecord};

const ADJECTIVES: &[&str] = &[
    "Swift", "Quiet", "Bold", "Lucky", "Clever", "Gentle", "Fierce", "Calm", "Bright", "Wild",
];
const NOUNS: &[&str] = &[
    "Otter", "Falcon", "Maple", "Comet", "Ember", "Lagoon", "Pixel", "Harbor", "Cinder", "Willow",
];

/// Directory of registered users, keyed by opaque `userId`.
#[derive(Clone)]
pub struct UserDirectory {
    pool: SqlitePool,
}

impl UserDirectory {
    /// Construct a directory over an existing connection pool. Callers are
    /// expected to share the pool with [`crate::event_store::EventStore`]
    /// when both are backed by the same database.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the `users` table if it does not already exist.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                nickname TEXT NOT NULL,
                color_r INTEGER NOT NULL,
                color_g INTEGER NOT NULL,
                color_b INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::persistence(e.to_string()))?;

        debug!("user directory migrations completed");
        Ok(())
    }

    /// Generate a random nickname and color, insert a new user record.
    /// Fails with `Error::Conflict` on a `userId` collision (extremely rare:
    /// the id is a fresh UUIDv4).
    #[instrument(skip(self))]
    pub async fn create_user(&self) -> Result<UserRecord> {
        let user_id = Uuid::new_v4().to_string();
        let record = UserRecord {
            user_id,
            nickname: random_nickname(),
            color: random_color(),
            created_at: Utc::now(),
        };
        record.validate()?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (user_id, nickname, color_r, color_g, color_b, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.nickname)
        .bind(i64::from(record.color.r))
        .bind(i64::from(record.color.g))
        .bind(i64::from(record.color.b))
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(record),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(Error::conflict(format!(
                    "user_id collision: {}",
                    record.user_id
                )))
            }
            Err(e) => Err(Error::persistence(e.to_string())),
        }
    }

    /// Look up a user record by id. Returns `None` if absent.
    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, nickname, color_r, color_g, color_b, created_at
            FROM users WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::persistence(e.to_string()))?;

        row.map(row_to_user).transpose()
    }
}

fn row_to_user(row: sqlx::sqlite::SqliteRow) -> Result<UserRecord> {
    let user_id: String = row
        .try_get("user_id")
        .map_err(|e| Error::persistence(e.to_string()))?;
    let nickname: String = row
        .try_get("nickname")
        .map_err(|e| Error::persistence(e.to_string()))?;
    let r: i64 = row
        .try_get("color_r")
        .map_err(|e| Error::persistence(e.to_string()))?;
    let g: i64 = row
        .try_get("color_g")
        .map_err(|e| Error::persistence(e.to_string()))?;
    let b: i64 = row
        .try_get("color_b")
        .map_err(|e| Error::persistence(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| Error::persistence(e.to_string()))?;

    Ok(UserRecord {
        user_id,
        nickname,
        color: Color::from_rgb(r as u8, g as u8, b as u8),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::persistence(e.to_string()))?,
    })
}

fn random_nickname() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).unwrap_or(&"Swift");
    let noun = NOUNS.choose(&mut rng).unwrap_or(&"Otter");
    let suffix: u16 = rng.gen_range(0..1000);
    format!("{adjective}{noun}{suffix}")
}

fn random_color() -> Color {
    let mut rng = rand::thread_rng();
    Color::from_rgb(rng.gen(), rng.gen(), rng.gen())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn directory() -> UserDirectory {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let dir = UserDirectory::new(pool);
        dir.run_migrations().await.unwrap();
        dir
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let dir = directory().await;
        let created = dir.create_user().await.unwrap();
        assert!(created.nickname.chars().count() <= 50);

        let fetched = dir.get_user(&created.user_id).await.unwrap().unwrap();
        assert_eq!(fetched.user_id, created.user_id);
        assert_eq!(fetched.color, created.color);
    }

    #[tokio::test]
    async fn test_get_unknown_user_is_none() {
        let dir = directory().await;
        assert!(dir.get_user("no-such-user").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_created_users_have_distinct_ids() {
        let dir = directory().await;
        let a = dir.create_user().await.unwrap();
        let b = dir.create_user().await.unwrap();
        assert_ne!(a.user_id, b.user_id);
    }

    #[tokio::test]
    async fn test_random_nickname_and_color_are_well_formed() {
        for _ in 0..20 {
            let nickname = random_nickname();
            assert!(nickname.chars().count() <= 50);
            assert!(!nickname.is_empty());
        }
    }
}
