//! Configuration command handler.

use super::CliResult;
use serialist_pipeline::SerialistConfig;
use std::io::Write;

/// Print `config` as TOML.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn handle_config(config: &SerialistConfig, out: &mut impl Write) -> CliResult<()> {
    let rendered = toml::to_string_pretty(config)?;
    write!(out, "{}", rendered)?;
    Ok(())
}
