//! Chapter check command handler.

use super::CliResult;
use serialist_error::SerialistResult;
use serialist_pipeline::SerialistConfig;
use serialist_quality::{QcContext, QcResult, QualityConfig, QualityControlEngine};
use std::io::Write;
use std::path::Path;

/// Run quick QC on `text`.
///
/// # Errors
///
/// Returns an error if the quality configuration is invalid.
pub fn check_chapter(
    text: &str,
    chapter: u32,
    is_final: bool,
    quality: QualityConfig,
) -> SerialistResult<QcResult> {
    let engine = QualityControlEngine::new(quality)?;
    let total = if is_final { chapter } else { chapter + 1 };
    let context = QcContext::builder()
        .chapter_index(chapter)
        .total_chapters(total)
        .is_final(is_final)
        .build()?;
    Ok(engine.run_quick_qc(text, &context))
}

/// Check a chapter file and print the result as JSON.
///
/// Returns whether the chapter passed.
///
/// # Errors
///
/// Returns an error if the file or configuration cannot be read, or
/// writing fails.
#[tracing::instrument(skip(file, config, out), fields(file = %file.display()))]
pub fn handle_check(
    file: &Path,
    chapter: u32,
    is_final: bool,
    min_chars: Option<usize>,
    config: &SerialistConfig,
    out: &mut impl Write,
) -> CliResult<bool> {
    let text = std::fs::read_to_string(file)?;

    let mut quality = config.quality().clone();
    if let Some(min_chars) = min_chars {
        quality = quality.with_min_body_chars(min_chars);
    }

    let result = check_chapter(&text, chapter, is_final, quality)?;
    tracing::info!(passed = result.passed, score = result.score, issues = result.issues.len(), "Checked chapter");

    serde_json::to_writer_pretty(&mut *out, &result)?;
    writeln!(out)?;
    Ok(result.passed)
}
