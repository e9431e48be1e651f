// lazymod/src/cli.rs
//! Defines the command-line argument structure using clap.
use clap::{ArgAction, Parser, Subcommand};
use lazymod_common::error::Result;

pub mod resolve;
pub mod stat;

use crate::cli::resolve::Resolve;
use crate::cli::stat::Stat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "lazymod", bin_name = "lazymod")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Require modules from a manifest and print their values
    Resolve(Resolve),
    /// Show the modules a manifest declares
    Stat(Stat),
}

impl Command {
    /// Must be awaited inside a tokio `LocalSet`.
    pub async fn run(&self) -> Result<()> {
        match self {
            Self::Resolve(command) => command.run().await,
            Self::Stat(command) => command.run().await,
        }
    }
}
