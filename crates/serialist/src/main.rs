//! Serialist CLI binary.
//!
//! This binary provides command-line access to the offline parts of the
//! pipeline:
//! - Plan tension curves for a run of chapters
//! - Run the rule-based quality checks on a chapter file
//! - Report continuity problems in a saved project
//! - Print the effective configuration

use clap::Parser;
use serialist::cli::{Cli, Commands, handle_arc, handle_check, handle_config, handle_inspect};
use serialist::{LoggingConfig, SerialistConfig, init_logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    init_logging(
        LoggingConfig::default()
            .with_log_level(log_level)
            .with_json_logs(cli.json_logs),
    )?;

    let mut stdout = std::io::stdout().lock();

    // Execute the requested command
    match cli.command {
        Commands::Arc {
            start,
            end,
            volumes,
            json,
        } => {
            handle_arc(start, end, volumes, json, &mut stdout)?;
        }

        Commands::Check {
            file,
            chapter,
            is_final,
            min_chars,
        } => {
            let config = SerialistConfig::load()?;
            let passed = handle_check(&file, chapter, is_final, min_chars, &config, &mut stdout)?;
            if !passed {
                std::process::exit(1);
            }
        }

        Commands::Inspect {
            store,
            project,
            chapter,
        } => {
            let config = SerialistConfig::load()?;
            let mut out = Vec::new();
            handle_inspect(&store, &project, chapter, config.plot(), &mut out).await?;
            std::io::Write::write_all(&mut stdout, &out)?;
        }

        Commands::Config => {
            let config = SerialistConfig::load()?;
            handle_config(&config, &mut stdout)?;
        }
    }

    Ok(())
}
