//! # Strata CLI
//!
//! Demo binary driving the six end-to-end scenarios of spec.md §8 against
//! a real on-disk store: scalars in a root, interning, listed structures,
//! a skip list of integers, a graph walk, and a safe-close proxy check.
//!
//! This binary is not part of the engine itself — it exists to exercise
//! `storage-api::Storage` the way an embedding application would.

mod config;
mod scenarios;

use config::CliConfig;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    init_logging();

    let cfg = match CliConfig::load_from_file("strata.toml") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = std::fs::create_dir_all(&cfg.storage.data_dir) {
        tracing::error!("failed to create {}: {e}", cfg.storage.data_dir.display());
        std::process::exit(2);
    }

    if let Err(e) = scenarios::run(&cfg) {
        tracing::error!("scenario run failed: {e}");
        std::process::exit(1);
    }

    tracing::info!("all scenarios passed");
}

fn init_logging() {
    let filter = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();
    let console_layer = fmt::layer().with_writer(std::io::stdout).with_target(false).with_level(true).compact();
    tracing_subscriber::registry().with(filter).with(console_layer).init();
}
