//! CLI for shortcast.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shortcast_core::config;
use std::path::PathBuf;

use commands::{run_forget, run_plan, run_status, run_step};

/// Top-level CLI: every invocation does one bounded piece of work.
#[derive(Debug, Parser)]
#[command(name = "shortcast")]
#[command(about = "shortcast: publish a backlog of clips as short videos, one part per run", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/shortcast/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Upload the next pending part, or archive the next finished item.
    Run,

    /// Show backlog order, upload progress and skipped items.
    Status,

    /// Print how a video would be split, without transcoding or uploading.
    Plan {
        /// Path to the source video.
        video: PathBuf,
    },

    /// Drop the ledger entry of an item (its recorded parts are forgotten).
    Forget {
        /// Item id (backlog folder name).
        item: String,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        cfg.validate()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run => run_step(&cfg)?,
            CliCommand::Status => run_status(&cfg)?,
            CliCommand::Plan { video } => run_plan(&cfg, &video)?,
            CliCommand::Forget { item } => run_forget(&cfg, &item)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
