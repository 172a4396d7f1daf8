pub mod consolidation;
pub mod conversation_store;

// Re-export key types for convenience
pub use consolidation::{
    ConsolidationOptions, ConsolidationReport, Consolidator, DeletionFailure, DeletionOutcome,
};
pub use conversation_store::{ConversationStore, PgConversationStore};
