use crate::core::platform::RequestContext;
use crate::core::scores::{ScoreError, ScoreRecord, ScoreStore};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

/// One row per (subreddit, username). `increment` is a single UPSERT, so
/// concurrent submissions never lose a count.
pub struct SqliteScoreStore {
    pool: Pool<Sqlite>,
}

fn storage_error(e: sqlx::Error) -> ScoreError {
    ScoreError::Storage(e.to_string())
}

impl SqliteScoreStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new().connect(&conn_str).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS submission_scores (
                subreddit TEXT NOT NULL,
                username TEXT NOT NULL,
                total INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (subreddit, username)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ScoreStore for SqliteScoreStore {
    async fn load(
        &self,
        subreddit: &str,
        _ctx: &RequestContext,
    ) -> Result<ScoreRecord, ScoreError> {
        let rows = sqlx::query("SELECT username, total FROM submission_scores WHERE subreddit = ?")
            .bind(subreddit)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.get::<String, _>("username"),
                    row.get::<i64, _>("total") as u64,
                )
            })
            .collect())
    }

    async fn save(
        &self,
        subreddit: &str,
        record: &ScoreRecord,
        _ctx: &RequestContext,
    ) -> Result<(), ScoreError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query("DELETE FROM submission_scores WHERE subreddit = ?")
            .bind(subreddit)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        for (username, count) in record.iter() {
            sqlx::query(
                "INSERT INTO submission_scores (subreddit, username, total) VALUES (?, ?, ?)",
            )
            .bind(subreddit)
            .bind(username)
            .bind(count as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }

    async fn increment(
        &self,
        subreddit: &str,
        username: &str,
        _ctx: &RequestContext,
    ) -> Result<u64, ScoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO submission_scores (subreddit, username, total)
            VALUES (?, ?, 1)
            ON CONFLICT(subreddit, username) DO UPDATE SET
            total = total + 1
            RETURNING total
            "#,
        )
        .bind(subreddit)
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(row.get::<i64, _>("total") as u64)
    }
}
