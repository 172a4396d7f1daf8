//! Duplicate direct-conversation consolidation
//!
//! Load every eligible conversation, bucket by participant pair, keep one
//! survivor per pair and delete the rest. The run is a single sequential
//! pass; re-running it after a clean pass deletes nothing.

use crate::error::{ConsolidationError, ConsolidationResult};
use crate::models::{Conversation, ConversationGroup, PairKey};
use crate::services::conversation_store::ConversationStore;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ConsolidationOptions {
    /// Plan deletions without issuing them
    pub dry_run: bool,
    /// Reload after deleting and count pairs that still have duplicates
    pub verify: bool,
}

impl Default for ConsolidationOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            verify: true,
        }
    }
}

/// Eligible conversations bucketed by pair, plus how many were skipped
/// for not having exactly two members.
#[derive(Debug, Default)]
pub struct GroupingOutcome {
    pub groups: BTreeMap<PairKey, ConversationGroup>,
    pub ignored: usize,
}

pub fn group_by_pair(conversations: Vec<Conversation>) -> GroupingOutcome {
    let mut outcome = GroupingOutcome::default();

    for conversation in conversations.into_iter().filter(Conversation::is_eligible) {
        match conversation.pair_key() {
            Some(key) => outcome
                .groups
                .entry(key)
                .or_insert_with(|| ConversationGroup::new(key))
                .conversations
                .push(conversation),
            None => outcome.ignored += 1,
        }
    }

    outcome
}

/// Ranking used to pick the survivor: more live messages, then later
/// activity, then the lowest id. `Greater` means `a` should be kept over `b`.
fn survivor_order(a: &Conversation, b: &Conversation) -> Ordering {
    a.message_count
        .cmp(&b.message_count)
        .then_with(|| a.last_activity.cmp(&b.last_activity))
        .then_with(|| b.id.cmp(&a.id))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub retained: Conversation,
    /// Non-retained conversations in group order
    pub discarded: Vec<Conversation>,
}

/// Choose the conversation to keep. Returns `None` only for an empty group.
pub fn select_survivor(group: ConversationGroup) -> Option<Resolution> {
    let mut conversations = group.conversations;
    let winner = conversations
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| survivor_order(a, b))
        .map(|(idx, _)| idx)?;

    let retained = conversations.remove(winner);
    Some(Resolution {
        retained,
        discarded: conversations,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletionOutcome {
    pub conversation_id: Uuid,
    pub pair: PairKey,
    pub result: ConsolidationResult<()>,
}

impl DeletionOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletionFailure {
    pub conversation_id: Uuid,
    pub pair: PairKey,
    pub error: ConsolidationError,
}

#[derive(Debug, Clone, Default)]
pub struct ConsolidationReport {
    /// Eligible conversations loaded
    pub scanned: usize,
    /// Eligible conversations without exactly two members
    pub ignored: usize,
    /// One survivor per distinct pair
    pub retained_count: usize,
    /// Pairs that had more than one conversation
    pub duplicate_groups: usize,
    /// Successful deletions, or planned deletions in dry-run mode
    pub deleted_count: usize,
    pub deletion_errors: Vec<DeletionFailure>,
    pub outcomes: Vec<DeletionOutcome>,
    pub dry_run: bool,
    /// Pairs still duplicated after the run, when verification ran
    pub remaining_duplicate_pairs: Option<usize>,
}

impl ConsolidationReport {
    fn record(&mut self, outcome: DeletionOutcome) {
        match &outcome.result {
            Ok(()) => self.deleted_count += 1,
            Err(e) => self.deletion_errors.push(DeletionFailure {
                conversation_id: outcome.conversation_id,
                pair: outcome.pair,
                error: e.clone(),
            }),
        }
        self.outcomes.push(outcome);
    }

    pub fn log_summary(&self) {
        let mode = if self.dry_run { "[DRY RUN] " } else { "" };
        info!("=== {}Conversation Consolidation Summary ===", mode);
        info!("Conversations scanned: {}", self.scanned);
        info!("Skipped (not two members): {}", self.ignored);
        info!("Duplicate groups found: {}", self.duplicate_groups);
        if self.dry_run {
            info!("Conversations that would be deleted: {}", self.deleted_count);
        } else {
            info!("Conversations deleted: {}", self.deleted_count);
        }
        info!("Conversations remaining: {}", self.retained_count);
        info!("Deletion errors: {}", self.deletion_errors.len());

        for failure in &self.deletion_errors {
            error!(
                conversation_id = %failure.conversation_id,
                pair = %failure.pair,
                error = %failure.error,
                "Failed to delete duplicate conversation"
            );
        }

        match self.remaining_duplicate_pairs {
            Some(0) => info!("Verification: no duplicate pairs remain"),
            Some(n) => warn!("Verification: {} pair(s) still have duplicate conversations", n),
            None => {}
        }
    }
}

fn count_duplicate_pairs(conversations: Vec<Conversation>) -> usize {
    group_by_pair(conversations)
        .groups
        .values()
        .filter(|g| g.is_duplicate())
        .count()
}

pub struct Consolidator {
    store: Arc<dyn ConversationStore>,
    options: ConsolidationOptions,
}

impl Consolidator {
    pub fn new(store: Arc<dyn ConversationStore>, options: ConsolidationOptions) -> Self {
        Self { store, options }
    }

    /// Run one consolidation pass.
    ///
    /// Only a failed load is returned as an error. Individual delete failures
    /// are collected into the report and the pass carries on.
    pub async fn consolidate(&self) -> ConsolidationResult<ConsolidationReport> {
        let conversations = self.store.load_direct_conversations().await.map_err(|e| match e {
            ConsolidationError::Database(msg) => ConsolidationError::Load(msg),
            e @ (ConsolidationError::Timeout { .. } | ConsolidationError::NotFound(_)) => {
                ConsolidationError::Load(e.to_string())
            }
            other => other,
        })?;

        let mut report = ConsolidationReport {
            dry_run: self.options.dry_run,
            ..Default::default()
        };

        let grouping = group_by_pair(conversations);
        report.ignored = grouping.ignored;
        report.scanned =
            grouping.ignored + grouping.groups.values().map(|g| g.conversations.len()).sum::<usize>();

        info!(
            scanned = report.scanned,
            pairs = grouping.groups.len(),
            ignored = report.ignored,
            "Loaded direct conversations"
        );

        for (key, group) in grouping.groups {
            let size = group.conversations.len();
            let Some(resolution) = select_survivor(group) else {
                continue;
            };
            report.retained_count += 1;

            if resolution.discarded.is_empty() {
                continue;
            }
            report.duplicate_groups += 1;

            info!(
                pair = %key,
                group_size = size,
                retained = %resolution.retained.id,
                retained_messages = resolution.retained.message_count,
                "Resolved duplicate group"
            );

            for duplicate in resolution.discarded {
                let outcome = self.delete_duplicate(key, &duplicate).await;
                report.record(outcome);
            }
        }

        if self.options.verify && !self.options.dry_run {
            report.remaining_duplicate_pairs = match self.store.load_direct_conversations().await {
                Ok(after) => Some(count_duplicate_pairs(after)),
                Err(e) => {
                    warn!(error = %e, "Verification reload failed");
                    None
                }
            };
        }

        Ok(report)
    }

    async fn delete_duplicate(&self, pair: PairKey, duplicate: &Conversation) -> DeletionOutcome {
        if self.options.dry_run {
            info!(
                "[DRY RUN] Would delete conversation {} ({} messages) for pair {}",
                duplicate.id, duplicate.message_count, pair
            );
            return DeletionOutcome {
                conversation_id: duplicate.id,
                pair,
                result: Ok(()),
            };
        }

        let result = self.store.delete_conversation(duplicate.id).await;
        match &result {
            Ok(()) => info!(
                conversation_id = %duplicate.id,
                pair = %pair,
                messages = duplicate.message_count,
                "Deleted duplicate conversation"
            ),
            Err(e) => error!(
                conversation_id = %duplicate.id,
                pair = %pair,
                error = %e,
                "Failed to delete duplicate conversation, continuing"
            ),
        }

        DeletionOutcome {
            conversation_id: duplicate.id,
            pair,
            result,
        }
    }
}
