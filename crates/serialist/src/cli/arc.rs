//! Arc planning command handler.

use super::CliResult;
use serialist_story::{NarrativeArc, PacingType};
use std::io::Write;

/// Render an arc as one line per chapter, grouped by volume.
pub fn render_arc(arc: &NarrativeArc) -> String {
    let mut out = String::new();
    for volume in &arc.volumes {
        out.push_str(&format!(
            "Volume {}: chapters {}-{}, climax at chapter {}\n",
            volume.volume_index + 1,
            volume.start_chapter,
            volume.end_chapter,
            volume.climax_chapter()
        ));
        for (offset, tension) in volume.pacing_curve.iter().enumerate() {
            let chapter = volume.start_chapter + offset as u32;
            let marker = if arc.is_climax(chapter) {
                "  <- climax"
            } else if arc.transition_chapters.contains(&chapter) {
                "  <- transition"
            } else {
                ""
            };
            out.push_str(&format!(
                "  {:>4}  {:>4.1}  {:<10} {}{}\n",
                chapter,
                tension,
                PacingType::from_tension(*tension).to_string(),
                "#".repeat(tension.round() as usize),
                marker
            ));
        }
    }
    out
}

/// Plan chapters `start..=end` in `volumes` volumes and print the curves.
///
/// # Errors
///
/// Returns an error if the range or volume count is invalid, or writing
/// fails.
#[tracing::instrument(skip(out))]
pub fn handle_arc(
    start: u32,
    end: u32,
    volumes: u32,
    json: bool,
    out: &mut impl Write,
) -> CliResult<()> {
    let arc = NarrativeArc::plan_range(start, end, volumes)?;
    tracing::debug!(climaxes = ?arc.climax_chapters, "Planned arc");

    if json {
        serde_json::to_writer_pretty(&mut *out, &arc)?;
        writeln!(out)?;
    } else {
        write!(out, "{}", render_arc(&arc))?;
    }
    Ok(())
}
