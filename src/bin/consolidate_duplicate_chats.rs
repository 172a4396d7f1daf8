/// Consolidate duplicate direct conversations
///
/// Finds pairs of users that have more than one direct conversation (not
/// group, not dispute) and keeps only one per pair: the one with the most
/// live messages, then the most recent activity. The others are deleted and
/// their messages and memberships cascade.
///
/// Usage:
/// ```bash
/// cargo run --bin consolidate-duplicate-chats -- [OPTIONS]
/// ```
///
/// Options:
/// - `--dry-run`: Log what would be deleted without deleting
/// - `--no-verify`: Skip the post-run duplicate check
use anyhow::{Context, Result};
use chat_consolidation::config::Config;
use chat_consolidation::db::init_pool;
use chat_consolidation::logging::init_tracing;
use chat_consolidation::services::{ConsolidationOptions, Consolidator, PgConversationStore};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before tracing so RUST_LOG from the file applies
    dotenvy::dotenv().ok();
    init_tracing();

    let options = parse_args()?;
    let config = Config::from_env().context("Failed to load configuration")?;

    info!(
        environment = %config.environment,
        dry_run = options.dry_run,
        verify = options.verify,
        "Starting duplicate conversation consolidation"
    );

    let pool = init_pool(&config)
        .await
        .context("Failed to connect to chat database")?;
    let store = Arc::new(PgConversationStore::new(pool, config.call_timeout()));

    let report = Consolidator::new(store, options)
        .consolidate()
        .await
        .context("Consolidation aborted")?;

    report.log_summary();

    info!("✅ Consolidation finished");
    Ok(())
}

fn parse_args() -> Result<ConsolidationOptions> {
    let mut options = ConsolidationOptions::default();

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" => options.dry_run = true,
            "--no-verify" => options.verify = false,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => anyhow::bail!("Unknown argument: {}", arg),
        }
    }

    Ok(options)
}

fn print_help() {
    println!("Duplicate Conversation Consolidation");
    println!();
    println!("Usage: consolidate-duplicate-chats [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --dry-run      Log what would be deleted without making changes");
    println!("  --no-verify    Skip reloading afterwards to check for remaining duplicates");
    println!("  --help, -h     Show this help message");
    println!();
    println!("Environment Variables:");
    println!("  APP_ENV                          Environment name (default: development)");
    println!("  DATABASE_URL_<APP_ENV>           Database URL for that environment");
    println!("  DATABASE_URL                     Fallback database URL");
    println!("  CONSOLIDATE_CALL_TIMEOUT_SECS    Per database call timeout (default: 30)");
    println!("  DB_CONNECT_TIMEOUT_SECS          Connection timeout (default: 5)");
    println!("  DB_ACQUIRE_TIMEOUT_SECS          Pool acquire timeout (default: 10)");
}
