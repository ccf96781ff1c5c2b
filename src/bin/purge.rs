//! Periodic log purger: deletes files under a directory whose modification
//! time is older than a configured age, once an hour, forever.

use anyhow::{Context, Result};
use sqlha::logging;
use std::env;
use std::time::Duration;
use tracing::{info, warn};

struct Args {
    gra_log_dir: String,
    gra_log_days_to_keep: u64,
    pidfile: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut gra_log_dir = None;
    let mut gra_log_days_to_keep = None;
    let mut pidfile = None;

    for arg in env::args().skip(1) {
        if let Some(v) = arg.strip_prefix("--graLogDir=") {
            gra_log_dir = Some(v.to_string());
        } else if let Some(v) = arg.strip_prefix("--graLogDaysToKeep=") {
            gra_log_days_to_keep = Some(v.parse::<u64>().context("invalid --graLogDaysToKeep")?);
        } else if let Some(v) = arg.strip_prefix("--pidfile=") {
            pidfile = Some(v.to_string());
        }
    }

    Ok(Args {
        gra_log_dir: gra_log_dir.context("--graLogDir is required")?,
        gra_log_days_to_keep: gra_log_days_to_keep.context("--graLogDaysToKeep is required")?,
        pidfile,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_simple("info");
    let args = parse_args()?;

    if let Some(pidfile) = &args.pidfile {
        std::fs::write(pidfile, std::process::id().to_string())
            .with_context(|| format!("failed to write pidfile '{pidfile}'"))?;
    }

    let max_age = Duration::from_secs(args.gra_log_days_to_keep * 24 * 60 * 60);
    loop {
        match sqlha::purge::purge_once(&args.gra_log_dir, max_age) {
            Ok(count) => info!(deleted = count, dir = %args.gra_log_dir, "purge pass complete"),
            Err(e) => warn!("purge pass failed: {e}"),
        }
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}
