//! SQLite implementation of the chat log.
//!
//! `sqlx::migrate!("./migrations")` resolves the path at compile time
//! relative to `CARGO_MANIFEST_DIR`, so the migrations are embedded into the
//! binary.  The database location comes from `CHATRELAY_DATABASE_URL` at
//! runtime.
//!
//! The runtime-checked `sqlx::query` form is used so no `DATABASE_URL` is
//! needed at compile time.

use async_trait::async_trait;
use chatrelay_core::{ChatLogEntry, ChatLogSink, SinkError};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct SqliteChatLog {
    pool: SqlitePool,
}

impl SqliteChatLog {
    /// Open (or create) the database at `url` and run pending migrations.
    ///
    /// `url` is a sqlx SQLite URL, e.g. `"sqlite://chatrelay.db?mode=rwc"` or
    /// `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        // Every connection to `:memory:` gets its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    async fn insert_turn(&self, entry: &ChatLogEntry) -> Result<(), sqlx::Error> {
        let created_at = entry.created_at.to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for (role, content, model) in [
            ("user", &entry.message, None),
            ("assistant", &entry.reply, entry.model.as_deref()),
        ] {
            sqlx::query(
                "INSERT INTO chat_messages (id, session_id, role, content, model, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&entry.session_id)
            .bind(role)
            .bind(content)
            .bind(model)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}

#[async_trait]
impl ChatLogSink for SqliteChatLog {
    async fn record(&self, entry: ChatLogEntry) -> Result<(), SinkError> {
        self.insert_turn(&entry)
            .await
            .map_err(|e| SinkError::Write(e.to_string()))
    }
}

#[cfg(test)]
impl SqliteChatLog {
    /// `(role, content, model)` for every row of `session_id`, oldest first.
    pub async fn list_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<(String, String, Option<String>)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT role, content, model FROM chat_messages \
             WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
    }
}
