//! Prompt templates for every pipeline stage.
//!
//! Each stage has its own system prompt; user prompts are assembled from
//! the chapter context and stage-specific material.

/// Scene planning.
pub const PLAN_SYSTEM: &str = "You are the plotting partner of a serialized novelist. \
Plan the next chapter as a short numbered list of scenes. Each scene names who is present, \
what changes, and how it ends. Do not write prose.";

/// Drafting.
pub const DRAFT_SYSTEM: &str = "You are a serialized fiction author writing one chapter of an \
ongoing novel. Stay consistent with the established state of characters, plot and time. \
Start with a title line such as \"Chapter 12: The Flooded Archive\". Write in scenes with \
dialogue and concrete sensory detail. Never end the story unless told this is the final chapter.";

/// Self-review.
pub const REVIEW_SYSTEM: &str = "You are the author rereading your own chapter draft before \
publication. Look for continuity errors, repeated events, characters acting against their \
established state, and missed chapter goals. Respond with JSON only.";

/// Rewrites, including repairs.
pub const REWRITE_SYSTEM: &str = "You are a serialized fiction author revising a chapter draft. \
Fix every listed problem while keeping what works. Return the complete revised chapter, \
title line included, and nothing else.";

/// Character state extraction.
pub const CHARACTER_EXTRACTION_SYSTEM: &str = "You track character continuity for a serialized \
novel. List every change the chapter makes to a character's location, condition, equipment, \
abilities, mood, motivation, knowledge, identity, reputation, alliances or enemies. \
Respond with JSON only.";

/// Plot graph extraction.
pub const PLOT_EXTRACTION_SYSTEM: &str = "You maintain the causal plot graph of a serialized \
novel. Record new events, foreshadowing, secrets, conflicts, revelations and resolutions, \
how they connect, and which earlier threads changed status. Respond with JSON only.";

/// Timeline extraction.
pub const TIMELINE_EXTRACTION_SYSTEM: &str = "You keep the in-story calendar of a serialized \
novel. Report how much story time the chapter covers and the dated events in it. \
Respond with JSON only.";

/// Rolling summary update.
pub const SUMMARY_SYSTEM: &str = "You maintain the running recap of a serialized novel in three \
bands: the whole story compressed, the current arc, and the latest chapters in detail. \
Respond with JSON only.";

/// Scene plan request.
pub fn plan_prompt(context: &str, chapter: u32, total: u32) -> String {
    format!(
        "{}\n\nPlan chapter {} of {}. List 3 to 6 scenes.",
        context, chapter, total
    )
}

/// Draft request, with the plan when one was made.
pub fn draft_prompt(context: &str, plan: Option<&str>, chapter: u32, total: u32) -> String {
    let mut out = format!("{}\n\n", context);
    if let Some(plan) = plan {
        out.push_str(&format!("## Scene plan\n{}\n\n", plan.trim()));
    }
    if chapter >= total {
        out.push_str(&format!(
            "Write chapter {} of {}. This is the final chapter: resolve the story.",
            chapter, total
        ));
    } else {
        out.push_str(&format!(
            "Write chapter {} of {}. End on an open hook; the story continues.",
            chapter, total
        ));
    }
    out
}

/// Self-review request, listing events the draft may repeat.
pub fn review_prompt(context: &str, draft: &str, duplicate_warnings: &[String]) -> String {
    let mut out = format!("{}\n\n## Draft\n{}\n\n", context, draft);
    if !duplicate_warnings.is_empty() {
        out.push_str("## Possible repeated events\n");
        for warning in duplicate_warnings {
            out.push_str(warning);
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str(
        r#"Review the draft. Respond with JSON:
{"action": "keep|rewrite", "issues": ["..."], "guidance": "..."}
Choose "rewrite" only for problems a reader would notice."#,
    );
    out
}

/// Rewrite request for a draft and a list of problems.
pub fn rewrite_prompt(context: &str, draft: &str, problems: &str) -> String {
    format!(
        "{}\n\n## Current draft\n{}\n\n## Problems to fix\n{}\n\nRewrite the chapter.",
        context, draft, problems
    )
}

/// Character delta extraction request.
pub fn character_extraction_prompt(chapter_text: &str, chapter: u32, known_state: &str) -> String {
    format!(
        r#"## Character state before chapter {chapter}
{known_state}

## Chapter {chapter}
{chapter_text}

Respond with JSON:
{{"changes": [{{"character_id": "<id>", "name": "<display name>", "field": "location|condition|equipment|abilities|power_level|mood|motivation|known_secrets|beliefs|inner_conflict|public_identity|hidden_identity|reputation|active_alliances|active_enemies", "new_value": "..."}}]}}
Use a leading "-" in new_value to remove an item from equipment, abilities, known_secrets, beliefs, alliances or enemies. Use an empty list when nothing changed."#
    )
}

/// Plot analysis request.
pub fn plot_extraction_prompt(chapter_text: &str, chapter: u32, active_nodes: &str) -> String {
    format!(
        r#"## Active plot threads
{active_nodes}

## Chapter {chapter}
{chapter_text}

Respond with JSON:
{{"new_nodes": [{{"type": "event|foreshadowing|secret|conflict|resolution|revelation|turning_point", "content": "...", "characters": ["<id>"], "importance": 1-10}}],
 "new_edges": [{{"from": "<node id or exact content>", "to": "<node id or exact content>", "relation": "causes|enables|blocks|foreshadows|resolves|contradicts|parallels"}}],
 "status_updates": [{{"node": "<node id>", "status": "resolved|abandoned|transformed"}}],
 "resolved_foreshadowing": ["<node id>"]}}"#
    )
}

/// Timeline extraction request.
pub fn timeline_extraction_prompt(chapter_text: &str, chapter: u32, current_marker: &str) -> String {
    let current = if current_marker.is_empty() {
        "not yet established"
    } else {
        current_marker
    };
    format!(
        r#"Story time before this chapter: {current}

## Chapter {chapter}
{chapter_text}

Respond with JSON:
{{"current_marker": "<story time at the end of the chapter>", "events": [{{"marker": "<when>", "description": "..."}}]}}"#
    )
}

/// Summary update request.
pub fn summary_prompt(
    previous_summary: &str,
    open_loops: &[String],
    chapter_text: &str,
    chapter: u32,
    max_open_loops: usize,
) -> String {
    let previous = if previous_summary.is_empty() {
        "(nothing yet)".to_string()
    } else {
        previous_summary.to_string()
    };
    let loops = if open_loops.is_empty() {
        "(none)".to_string()
    } else {
        open_loops
            .iter()
            .map(|l| format!("- {}", l))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        r#"## Recap so far
{previous}

## Open loops
{loops}

## Chapter {chapter}
{chapter_text}

Fold chapter {chapter} into the recap. Respond with JSON:
{{"long_term": "...", "mid_term": "...", "recent": "...", "open_loops": ["..."]}}
Keep at most {max_open_loops} open loops, dropping any the chapter resolved."#
    )
}
