use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tokio::sync::Mutex;
use tracing::info;

use crate::article::Article;

pub const BOOKMARKS_KEY: &str = "bookmarkedArticles";
pub const SELECTED_CITY_KEY: &str = "selectedCity";

/// String key-value storage backed by SQLite.
pub struct Database {
    pool: SqlitePool,
    // serializes read-modify-write cycles on stored lists
    write_lock: Mutex<()>,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn bookmarks(&self) -> anyhow::Result<Vec<Article>> {
        match self.get(BOOKMARKS_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Appends `article` to the saved list and persists it.
    pub async fn add_bookmark(&self, article: &Article) -> anyhow::Result<Vec<Article>> {
        let _guard = self.write_lock.lock().await;
        let mut bookmarks = self.bookmarks().await?;
        bookmarks.push(article.clone());
        self.set(BOOKMARKS_KEY, &serde_json::to_string(&bookmarks)?)
            .await?;
        info!("Bookmarked {} ({} saved)", article.id, bookmarks.len());
        Ok(bookmarks)
    }

    /// Removes every saved article with `id`. Returns whether any was removed.
    pub async fn remove_bookmark(&self, id: &str) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut bookmarks = self.bookmarks().await?;
        let before = bookmarks.len();
        bookmarks.retain(|a| a.id != id);
        if bookmarks.len() == before {
            return Ok(false);
        }
        self.set(BOOKMARKS_KEY, &serde_json::to_string(&bookmarks)?)
            .await?;
        info!("Removed bookmark {}", id);
        Ok(true)
    }

    pub async fn selected_city(&self) -> anyhow::Result<Option<String>> {
        self.get(SELECTED_CITY_KEY).await
    }

    pub async fn set_selected_city(&self, city: &str) -> anyhow::Result<()> {
        self.set(SELECTED_CITY_KEY, city).await
    }
}
