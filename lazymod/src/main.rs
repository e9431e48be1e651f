// lazymod/src/main.rs
use std::process;

use clap::Parser;
use colored::Colorize;
use tokio::task::LocalSet;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod cli;
mod manifest;

use cli::CliArgs;

fn init_logging(verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("LAZYMOD_LOG")
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .without_time()
        .try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli_args = CliArgs::parse();
    init_logging(cli_args.verbose);

    // Module factories and continuations are !Send; everything runs on one LocalSet.
    let local = LocalSet::new();
    if let Err(e) = local.run_until(cli_args.command.run()).await {
        error!("Command failed: {:#}", e);
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        process::exit(1);
    }

    debug!("Command completed successfully.");
}
