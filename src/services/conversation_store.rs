use crate::error::{ConsolidationError, ConsolidationResult};
use crate::models::Conversation;
use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::future::Future;
use std::time::Duration;
use tokio_postgres::Row;
use uuid::Uuid;

/// Storage seam for the consolidation job.
///
/// `PgConversationStore` is the production implementation; tests use
/// in-memory or mocked stores.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// All conversations with `is_group = false` and `is_dispute_chat = false`,
    /// each with its ordered member ids and live message count, most recently
    /// active first.
    async fn load_direct_conversations(&self) -> ConsolidationResult<Vec<Conversation>>;

    /// Delete one conversation. Messages and memberships go with it through
    /// `ON DELETE CASCADE`.
    async fn delete_conversation(&self, conversation_id: Uuid) -> ConsolidationResult<()>;
}

const LOAD_DIRECT_CONVERSATIONS: &str = r#"
    SELECT
        c.id,
        c.is_group,
        c.is_dispute_chat,
        c.last_activity_at,
        ARRAY(
            SELECT cm.user_id
            FROM conversation_members cm
            WHERE cm.conversation_id = c.id
            ORDER BY cm.user_id
        ) AS member_ids,
        (
            SELECT COUNT(*)
            FROM messages m
            WHERE m.conversation_id = c.id AND m.deleted_at IS NULL
        ) AS message_count
    FROM conversations c
    WHERE c.is_group = FALSE
      AND c.is_dispute_chat = FALSE
    ORDER BY c.last_activity_at DESC
"#;

pub struct PgConversationStore {
    pool: Pool,
    call_timeout: Duration,
}

impl PgConversationStore {
    pub fn new(pool: Pool, call_timeout: Duration) -> Self {
        Self { pool, call_timeout }
    }

    async fn bounded<F, T>(&self, operation: &'static str, fut: F) -> ConsolidationResult<T>
    where
        F: Future<Output = ConsolidationResult<T>>,
    {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| ConsolidationError::Timeout {
                operation,
                secs: self.call_timeout.as_secs(),
            })?
    }

    fn row_to_conversation(row: &Row) -> Result<Conversation, tokio_postgres::Error> {
        Ok(Conversation {
            id: row.try_get("id")?,
            member_ids: row.try_get("member_ids")?,
            is_group: row.try_get("is_group")?,
            is_dispute_chat: row.try_get("is_dispute_chat")?,
            message_count: row.try_get("message_count")?,
            last_activity: row.try_get("last_activity_at")?,
        })
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn load_direct_conversations(&self) -> ConsolidationResult<Vec<Conversation>> {
        self.bounded("load conversations", async {
            let client = self.pool.get().await?;
            let rows = client
                .query(LOAD_DIRECT_CONVERSATIONS, &[])
                .await
                .map_err(|e| ConsolidationError::Load(e.to_string()))?;

            rows.iter()
                .map(Self::row_to_conversation)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ConsolidationError::Load(format!("decode conversation row: {e}")))
        })
        .await
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> ConsolidationResult<()> {
        self.bounded("delete conversation", async {
            let client = self.pool.get().await?;
            let affected = client
                .execute("DELETE FROM conversations WHERE id = $1", &[&conversation_id])
                .await?;

            if affected == 0 {
                return Err(ConsolidationError::NotFound(conversation_id));
            }
            Ok(())
        })
        .await
    }
}
