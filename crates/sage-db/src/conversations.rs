//! Conversation ledger repository.
//!
//! Every query is owner-scoped. A conversation id paired with the wrong
//! owner is indistinguishable from a missing conversation, so ownership
//! never leaks through error messages or timing of separate checks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use sage_core::models::{ConversationSummary, Message, MessageRole};
use sage_core::router::Mode;
use sage_core::traits::ConversationStore;
use sage_core::{Error, Result};

/// SQLite-backed implementation of [`ConversationStore`].
#[derive(Debug, Clone)]
pub struct SqliteConversationStore {
    pool: SqlitePool,
}

/// Ids are stored as TEXT, so rows carry them as strings and parse on
/// the way out.
#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: String,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    message_count: i64,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    conversation_id: String,
    role: MessageRole,
    content: String,
    mode: Mode,
    metadata: Option<String>,
    created_at: DateTime<Utc>,
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Serialization(format!("invalid stored id: {e}")))
}

impl SqliteConversationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn create(&self, owner_id: Uuid, title: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO conversations (id, owner_id, title, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(owner_id.to_string())
        .bind(title)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(
            subsystem = "ledger",
            component = "conversations",
            op = "create",
            conversation_id = %id,
            owner_id = %owner_id,
            "Created conversation"
        );
        Ok(id)
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        owner_id: Uuid,
        role: MessageRole,
        content: &str,
        mode: Mode,
        metadata: Option<&str>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        // The message insert and the updated_at bump commit together so a
        // conversation's recency always reflects its newest message.
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query(
            "UPDATE conversations SET updated_at = ? WHERE id = ? AND owner_id = ?",
        )
        .bind(now)
        .bind(conversation_id.to_string())
        .bind(owner_id.to_string())
        .execute(&mut *tx)
        .await?;

        if owned.rows_affected() == 0 {
            return Err(Error::ConversationNotFound(conversation_id));
        }

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, mode, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(conversation_id.to_string())
        .bind(role)
        .bind(content)
        .bind(mode)
        .bind(metadata)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            subsystem = "ledger",
            component = "conversations",
            op = "append_message",
            conversation_id = %conversation_id,
            message_id = %id,
            mode = mode.as_str(),
            "Appended message"
        );
        Ok(id)
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<ConversationSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            "SELECT c.id, c.title, c.created_at, c.updated_at,
                    COUNT(m.id) AS message_count
             FROM conversations c
             LEFT JOIN messages m ON m.conversation_id = c.id
             WHERE c.owner_id = ?
             GROUP BY c.id
             ORDER BY c.updated_at DESC",
        )
        .bind(owner_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(ConversationSummary {
                    id: parse_id(&r.id)?,
                    title: r.title,
                    created_at: r.created_at,
                    updated_at: r.updated_at,
                    message_count: r.message_count,
                })
            })
            .collect()
    }

    async fn messages(&self, conversation_id: Uuid, owner_id: Uuid) -> Result<Vec<Message>> {
        if !self.exists(conversation_id, owner_id).await? {
            return Err(Error::ConversationNotFound(conversation_id));
        }

        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, conversation_id, role, content, mode, metadata, created_at
             FROM messages
             WHERE conversation_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(Message {
                    id: parse_id(&r.id)?,
                    conversation_id: parse_id(&r.conversation_id)?,
                    role: r.role,
                    content: r.content,
                    mode: r.mode,
                    metadata: r.metadata,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    async fn delete(&self, conversation_id: Uuid, owner_id: Uuid) -> Result<()> {
        // Messages go first so the delete is total even if the pool were
        // ever opened without the foreign_keys pragma.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM messages WHERE conversation_id IN
               (SELECT id FROM conversations WHERE id = ? AND owner_id = ?)",
        )
        .bind(conversation_id.to_string())
        .bind(owner_id.to_string())
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM conversations WHERE id = ? AND owner_id = ?")
            .bind(conversation_id.to_string())
            .bind(owner_id.to_string())
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(Error::ConversationNotFound(conversation_id));
        }

        tx.commit().await?;

        info!(
            subsystem = "ledger",
            component = "conversations",
            op = "delete",
            conversation_id = %conversation_id,
            owner_id = %owner_id,
            "Deleted conversation"
        );
        Ok(())
    }

    async fn exists(&self, conversation_id: Uuid, owner_id: Uuid) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM conversations WHERE id = ? AND owner_id = ?")
                .bind(conversation_id.to_string())
                .bind(owner_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}

impl SqliteConversationStore {
    /// Rename a conversation. Owner-scoped like every other operation.
    pub async fn rename(
        &self,
        conversation_id: Uuid,
        owner_id: Uuid,
        title: &str,
    ) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE conversations SET title = ?, updated_at = ? WHERE id = ? AND owner_id = ?",
        )
        .bind(title)
        .bind(Utc::now())
        .bind(conversation_id.to_string())
        .bind(owner_id.to_string())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Error::ConversationNotFound(conversation_id));
        }
        Ok(())
    }
}
