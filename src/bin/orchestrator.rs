//! Orchestrator CLI: `inspect`, `make-leader`, `make-read-only`,
//! `configure-leader-follower`. Configuration path comes from `CONFIG_PATH`.

use anyhow::{Context, Result, bail};
use sqlha::client::{PeerClient, PeerOps};
use sqlha::config::Config;
use sqlha::drain;
use sqlha::elect::configure_leader_follower;
use sqlha::logging;
use std::env;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::from_file(&config_path)
        .map_err(|e| anyhow::anyhow!("failed to load configuration from \"{config_path}\": {e}"))?;

    logging::init_simple(&config.log_level);

    let command = env::args().nth(1).unwrap_or_default();

    if let Err(e) = dispatch(&command, config).await {
        error!("orchestrator command '{command}' failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn dispatch(command: &str, config: Config) -> Result<()> {
    let local = PeerClient::new(&config.host_address, &config)
        .context("failed to build local peer client")?;
    let remote = PeerClient::new(&config.peer_address, &config)
        .context("failed to build remote peer client")?;

    match command {
        "inspect" => {
            let local_status = local.status().await?;
            let remote_status = remote.status().await?;
            println!("local:  {local_status:?}");
            println!("remote: {remote_status:?}");
        }
        "make-leader" => {
            // Manual promotion of an already-isolated node: failover=true.
            local.make_leader(true).await?;
        }
        "make-read-only" => {
            drain::make_read_only(&local, &remote).await?;
        }
        "configure-leader-follower" => {
            let local_status = local.status().await?;
            let remote_status = remote.status().await?;
            configure_leader_follower(&[local, remote], [local_status, remote_status]).await?;
        }
        other => bail!("unknown command '{other}'"),
    }
    Ok(())
}
