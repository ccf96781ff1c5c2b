//! Shared `tracing` setup. The agent daemon gets a reloadable filter so an
//! operator can bump verbosity without a restart; the short-lived CLIs just
//! need a one-shot subscriber.

use std::sync::Arc;
use tracing_subscriber::{filter::EnvFilter, prelude::*, reload};

pub type ReloadHandle = Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>;

pub fn init_reloadable(log_level: &str) -> ReloadHandle {
    let initial = std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(initial));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_ansi(true))
        .init();

    Arc::new(reload_handle)
}

pub fn init_simple(log_level: &str) {
    let initial = std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(initial))
        .compact()
        .with_ansi(true)
        .init();
}
