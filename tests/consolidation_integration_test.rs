//! Consolidation against a real PostgreSQL
//!
//! NOTE: These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run these tests. Tables are
//! created from `migrations/` and truncated before each test.

use chat_consolidation::models::PairKey;
use chat_consolidation::services::{
    ConsolidationOptions, Consolidator, ConversationStore, PgConversationStore,
};
use chrono::{Duration as ChronoDuration, Utc};
use db_pool::{create_pool, DbConfig, PgPool};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../migrations/0001_conversations.sql");

async fn setup_test_db() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = create_pool(DbConfig::for_maintenance("consolidation-test", &url))
        .await
        .expect("database should be reachable");

    let client = pool.get().await.unwrap();
    client.batch_execute(SCHEMA).await.unwrap();
    client
        .batch_execute("TRUNCATE messages, conversation_members, conversations")
        .await
        .unwrap();
    drop(client);
    pool
}

struct Seed<'a> {
    members: &'a [Uuid],
    messages: usize,
    deleted_messages: usize,
    minutes_ago: i64,
    is_group: bool,
    is_dispute_chat: bool,
}

impl<'a> Seed<'a> {
    fn direct(members: &'a [Uuid], messages: usize, minutes_ago: i64) -> Self {
        Self {
            members,
            messages,
            deleted_messages: 0,
            minutes_ago,
            is_group: false,
            is_dispute_chat: false,
        }
    }
}

async fn insert(pool: &PgPool, seed: Seed<'_>) -> Uuid {
    let client = pool.get().await.unwrap();
    let id = Uuid::new_v4();
    let last_activity = Utc::now() - ChronoDuration::minutes(seed.minutes_ago);

    client
        .execute(
            "INSERT INTO conversations (id, is_group, is_dispute_chat, last_activity_at) VALUES ($1, $2, $3, $4)",
            &[&id, &seed.is_group, &seed.is_dispute_chat, &last_activity],
        )
        .await
        .unwrap();

    for member in seed.members {
        client
            .execute(
                "INSERT INTO conversation_members (conversation_id, user_id) VALUES ($1, $2)",
                &[&id, member],
            )
            .await
            .unwrap();
    }

    for n in 0..(seed.messages + seed.deleted_messages) {
        let deleted = n >= seed.messages;
        client
            .execute(
                "INSERT INTO messages (id, conversation_id, sender_id, deleted_at) \
                 VALUES ($1, $2, $3, CASE WHEN $4 THEN NOW() ELSE NULL END)",
                &[&Uuid::new_v4(), &id, &seed.members[0], &deleted],
            )
            .await
            .unwrap();
    }

    id
}

async fn count(pool: &PgPool, sql: &str, id: Uuid) -> i64 {
    let client = pool.get().await.unwrap();
    client.query_one(sql, &[&id]).await.unwrap().get(0)
}

fn store(pool: &PgPool) -> Arc<PgConversationStore> {
    Arc::new(PgConversationStore::new(pool.clone(), Duration::from_secs(10)))
}

#[tokio::test]
#[serial]
#[ignore] // Requires DATABASE_URL
async fn test_load_returns_members_and_live_message_counts() {
    let pool = setup_test_db().await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    let older = insert(&pool, Seed::direct(&[a, b], 2, 60)).await;
    let newer = insert(
        &pool,
        Seed {
            deleted_messages: 4,
            ..Seed::direct(&[b, a], 1, 1)
        },
    )
    .await;
    insert(
        &pool,
        Seed {
            is_group: true,
            ..Seed::direct(&[a, b], 9, 0)
        },
    )
    .await;

    let loaded = store(&pool).load_direct_conversations().await.unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].id, newer);
    assert_eq!(loaded[0].message_count, 1);
    assert_eq!(loaded[1].id, older);
    assert_eq!(loaded[1].message_count, 2);
    assert_eq!(loaded[0].pair_key(), Some(PairKey::new(a, b)));
    assert_eq!(loaded[1].pair_key(), Some(PairKey::new(a, b)));
}

#[tokio::test]
#[serial]
#[ignore] // Requires DATABASE_URL
async fn test_consolidation_cascades_and_is_idempotent() {
    let pool = setup_test_db().await;
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let c1 = insert(&pool, Seed::direct(&[a, b], 5, 1)).await;
    let c2 = insert(&pool, Seed::direct(&[b, a], 12, 30)).await;
    let c3 = insert(&pool, Seed::direct(&[a, c], 0, 5)).await;
    let dispute = insert(
        &pool,
        Seed {
            is_dispute_chat: true,
            ..Seed::direct(&[a, b], 0, 0)
        },
    )
    .await;

    let consolidator = Consolidator::new(store(&pool), ConsolidationOptions::default());
    let report = consolidator.consolidate().await.unwrap();

    assert_eq!(report.duplicate_groups, 1);
    assert_eq!(report.deleted_count, 1);
    assert_eq!(report.retained_count, 2);
    assert_eq!(report.remaining_duplicate_pairs, Some(0));
    assert_eq!(report.outcomes[0].conversation_id, c1);

    let exists = "SELECT COUNT(*) FROM conversations WHERE id = $1";
    assert_eq!(count(&pool, exists, c1).await, 0);
    assert_eq!(count(&pool, exists, c2).await, 1);
    assert_eq!(count(&pool, exists, c3).await, 1);
    assert_eq!(count(&pool, exists, dispute).await, 1);

    let messages = "SELECT COUNT(*) FROM messages WHERE conversation_id = $1";
    let members = "SELECT COUNT(*) FROM conversation_members WHERE conversation_id = $1";
    assert_eq!(count(&pool, messages, c1).await, 0);
    assert_eq!(count(&pool, members, c1).await, 0);
    assert_eq!(count(&pool, messages, c2).await, 12);

    let second = consolidator.consolidate().await.unwrap();
    assert_eq!(second.deleted_count, 0);
    assert!(second.outcomes.is_empty());
}

#[tokio::test]
#[serial]
#[ignore] // Requires DATABASE_URL
async fn test_delete_missing_conversation_reports_not_found() {
    let pool = setup_test_db().await;
    let missing = Uuid::new_v4();

    let err = store(&pool).delete_conversation(missing).await.unwrap_err();
    assert_eq!(
        err,
        chat_consolidation::error::ConsolidationError::NotFound(missing)
    );
    assert!(!err.is_fatal());
}
