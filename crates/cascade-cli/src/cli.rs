//! Command line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "cascade", version, about = "Task dependency and status cascade engine")]
pub struct Cli {
    /// Log level; falls back to `CASCADE_LOG`, then `info`.
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a plan: create tasks, link them, apply status steps.
    Run {
        plan: PathBuf,

        /// Engine configuration (TOML).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Link the plan's dependencies and print each task's prerequisites.
    Check {
        plan: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
