use crate::config::Config;
use crate::error::ConsolidationError;
use db_pool::{create_pool as create_pg_pool, DbConfig as DbPoolConfig, PgPool};

pub const JOB_NAME: &str = "chat-consolidation";

pub async fn init_pool(config: &Config) -> Result<PgPool, ConsolidationError> {
    let cfg = DbPoolConfig::for_maintenance(JOB_NAME, &config.database_url);
    cfg.log_config();
    let pool = create_pg_pool(cfg).await?;
    Ok(pool)
}
