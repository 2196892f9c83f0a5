//! Project inspection command handler.

use super::CliResult;
use serde::Serialize;
use serialist_pipeline::{FileProjectStore, ProjectState, ProjectStore};
use serialist_story::{ConsistencyIssue, PendingForeshadowing, PlotContextConfig};
use std::io::Write;
use std::path::Path;

/// Continuity report for a saved project.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    /// Story title
    pub title: String,
    /// Chapter the report was computed for
    pub chapter: u32,
    /// Planned length of the story
    pub total_chapters: u32,
    /// Tracked characters
    pub characters: usize,
    /// Character state problems
    pub consistency_issues: Vec<ConsistencyIssue>,
    /// All active foreshadowing, oldest first
    pub pending: Vec<PendingForeshadowing>,
    /// Foreshadowing that must be surfaced at `chapter`
    pub due: Vec<PendingForeshadowing>,
}

/// Build the continuity report for `state`.
///
/// Without an explicit chapter, the report is for the chapter after the
/// last one the plot graph saw.
pub fn inspect_project(
    state: &ProjectState,
    chapter: Option<u32>,
    plot_config: &PlotContextConfig,
) -> InspectReport {
    let total = *state.bible.total_chapters();
    let chapter = chapter
        .unwrap_or_else(|| state.plot_graph.last_updated_chapter() + 1)
        .clamp(1, total.max(1));

    InspectReport {
        title: state.bible.title().clone(),
        chapter,
        total_chapters: total,
        characters: state.characters.len(),
        consistency_issues: state.characters.validate_consistency().issues,
        pending: state.plot_graph.pending_at(chapter, total),
        due: state.plot_graph.due_foreshadowing(chapter, total, plot_config),
    }
}

/// Load a project from a file store and print its continuity report.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, the project cannot be
/// loaded, or writing fails.
#[tracing::instrument(skip(store, plot_config, out), fields(store = %store.display()))]
pub async fn handle_inspect(
    store: &Path,
    project: &str,
    chapter: Option<u32>,
    plot_config: &PlotContextConfig,
    out: &mut (impl Write + Send),
) -> CliResult<()> {
    let store = FileProjectStore::new(store)?;
    let state = store.load(project).await?;
    let report = inspect_project(&state, chapter, plot_config);

    writeln!(out, "{} (chapter {} of {})", report.title, report.chapter, report.total_chapters)?;
    writeln!(out, "Characters tracked: {}", report.characters)?;

    if report.consistency_issues.is_empty() {
        writeln!(out, "Character state: consistent")?;
    } else {
        writeln!(out, "Character state issues:")?;
        for issue in &report.consistency_issues {
            match &issue.field {
                Some(field) => writeln!(out, "  - {} ({}): {}", issue.character_id, field, issue.description)?,
                None => writeln!(out, "  - {}: {}", issue.character_id, issue.description)?,
            }
        }
    }

    writeln!(out, "Pending foreshadowing: {}", report.pending.len())?;
    for item in &report.pending {
        let marker = if report.due.iter().any(|d| d.node_id == item.node_id) {
            "  <- due"
        } else {
            ""
        };
        writeln!(
            out,
            "  - [{}] {} (planted ch {}, {} chapters ago){}",
            item.node_id, item.content, item.introduced_at, item.age_in_chapters, marker
        )?;
    }

    tracing::info!(
        pending = report.pending.len(),
        due = report.due.len(),
        issues = report.consistency_issues.len(),
        "Inspected project"
    );
    Ok(())
}
