pub mod cli;
mod commands;
pub mod config;
pub mod db;
pub mod overlay;
pub mod sensing;
pub mod settings;
pub mod stats;
pub mod tracking;
pub mod utils;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use clap::Parser;

pub fn run() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    let level = if args.verbose || config::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    // RUST_LOG still wins over the default level.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    log::debug!("BeAware starting: {:?}", args.command);

    let paths = config::AppPaths::resolve()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(commands::dispatch(args.command, &paths))
}
