//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Serialist - stateful chapter generation for serialized fiction
#[derive(Parser, Debug)]
#[command(name = "serialist")]
#[command(about = "Stateful chapter generation for serialized fiction", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan tension curves for a run of chapters
    Arc {
        /// First chapter
        #[arg(long, default_value = "1")]
        start: u32,

        /// Last chapter
        #[arg(long)]
        end: u32,

        /// Number of volumes to split the run into
        #[arg(long, default_value = "1")]
        volumes: u32,

        /// Print the arc as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the rule-based quality checks on a chapter file
    Check {
        /// Path to the chapter text
        file: PathBuf,

        /// Chapter index, for reporting
        #[arg(long, default_value = "1")]
        chapter: u32,

        /// Treat the chapter as the last one (allows an ending)
        #[arg(long = "final")]
        is_final: bool,

        /// Override the minimum body length
        #[arg(long)]
        min_chars: Option<usize>,
    },

    /// Report continuity problems in a saved project
    Inspect {
        /// Directory of the file project store
        #[arg(long)]
        store: PathBuf,

        /// Project id
        #[arg(long)]
        project: String,

        /// Chapter to inspect from (defaults to the next unwritten chapter)
        #[arg(long)]
        chapter: Option<u32>,
    },

    /// Print the effective configuration as TOML
    Config,
}
