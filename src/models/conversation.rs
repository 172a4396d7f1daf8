//! Conversation records as seen by the consolidation job
//!
//! A `Conversation` is a typed view over one `conversations` row joined with
//! its member ids and live message count. `PairKey` is the order-independent
//! identity of a two-party conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    /// Member user ids in storage order
    pub member_ids: Vec<Uuid>,
    pub is_group: bool,
    pub is_dispute_chat: bool,
    /// Count of messages with `deleted_at IS NULL`
    pub message_count: i64,
    pub last_activity: DateTime<Utc>,
}

impl Conversation {
    /// Group and dispute/support chats never take part in consolidation
    pub fn is_eligible(&self) -> bool {
        !self.is_group && !self.is_dispute_chat
    }

    /// Canonical participant pair, only for exactly two members
    pub fn pair_key(&self) -> Option<PairKey> {
        match self.member_ids.as_slice() {
            [a, b] => Some(PairKey::new(*a, *b)),
            _ => None,
        }
    }
}

/// Unordered pair of participant ids, stored sorted.
///
/// Renders as `"<lower>,<higher>"`. Uuid ordering is byte ordering, which
/// matches lexical ordering of the lowercase hyphenated form, so the rendered
/// key equals sorting the string ids and joining with a comma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    low: Uuid,
    high: Uuid,
}

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn members(&self) -> (Uuid, Uuid) {
        (self.low, self.high)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.low, self.high)
    }
}

/// In-memory bucket of conversations sharing a participant pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationGroup {
    pub key: PairKey,
    pub conversations: Vec<Conversation>,
}

impl ConversationGroup {
    pub fn new(key: PairKey) -> Self {
        Self {
            key,
            conversations: Vec::new(),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.conversations.len() > 1
    }
}
