//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for seminar
#[derive(Parser, Debug)]
#[command(name = "seminar")]
#[command(author, version, about = "Moderated multi-role AI seminars")]
#[command(long_about = r#"
Seminar runs a moderated discussion between AI roles on a topic.

The moderator opens the discussion and designates each next speaker with
`@Name`; the designated participant answers and hands the floor back.
Every token is streamed to the console while it is generated.

Configuration files are loaded from (in priority order):
1. SEMINAR_* environment variables (e.g. SEMINAR_RUN__MAX_TURNS=6)
2. --config <path>     Explicit config file
3. ./seminar.toml      Project-level config
4. ~/.config/seminar/config.toml   Global config

Example:
  seminar run --topic free-will
  seminar run --topic free-will --max-turns 4 -v
  seminar topics
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long, value_name = "DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run (or resume) a topic until it is paused or reaches the turn limit
    Run {
        /// Topic id from the configuration
        #[arg(short, long, value_name = "ID")]
        topic: String,

        /// Who starts the run; defaults to the topic's configured owner
        #[arg(long, value_name = "NAME")]
        owner: Option<String>,

        /// Override `run.max_turns` for this run
        #[arg(long, value_name = "N")]
        max_turns: Option<usize>,

        /// Identity of this process among replicas sharing a broker
        #[arg(long, value_name = "ID")]
        replica_id: Option<String>,

        /// Do not print reasoning fragments
        #[arg(long)]
        hide_reasoning: bool,
    },

    /// List configured topics
    Topics,

    /// Show configuration sources, validation issues and the merged result
    Config,
}
