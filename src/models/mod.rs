pub mod conversation;

pub use conversation::{Conversation, ConversationGroup, PairKey};
