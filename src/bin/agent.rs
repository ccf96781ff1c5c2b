//! Agent daemon: opens a connection pool to the local database instance and
//! serves the mTLS control plane until it's asked to stop.

use anyhow::{Context, Result};
use sqlha::agent::MysqlAgent;
use sqlha::config::Config;
use sqlha::db::{connect, MySqlDatabaseClient};
use sqlha::jumpstart::AgentJumpstart;
use sqlha::{logging, server};
use std::env;
use std::sync::Arc;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config_path = args.get(1).map(String::as_str).unwrap_or("config.yaml");

    let config = match Config::from_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e}");
            std::process::exit(1);
        }
    };

    let _reload_handle = logging::init_reloadable(&config.log_level);

    if let Err(e) = run(config).await {
        error!("agent runtime error: {e}");
        return Err(e);
    }
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let dsn = format!(
        "mysql://{}:{}@localhost/mysql",
        config.replication_admin_user, config.replication_admin_password,
    );
    let pool = connect(&dsn).await.context("failed to connect to local mysql instance")?;
    let db = Arc::new(MySqlDatabaseClient::new(pool, config.clone()));
    let jumpstart = Arc::new(AgentJumpstart::new(config.clone(), db.clone()));
    let agent = Arc::new(MysqlAgent::new(config.clone(), db, jumpstart));

    server::run(config, agent).await
}
