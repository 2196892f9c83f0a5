//! Test utilities for the chapter pipeline.

#![allow(dead_code)]

mod scripted;

pub use scripted::{Reply, ScriptedGenerator};

use serialist_core::{Bible, ChapterOutline, CharacterProfile, CharacterRole};
use serialist_pipeline::ProjectState;

const NARRATION: &str = "Lin pressed her palm to the cold stone and listened to the water hum \
beneath the floor. The lantern light shook across the shelves, and the smell of wet paper filled the aisle.";

const EXCHANGE: &str =
    "\"We have an hour before the tide turns,\" Ossa said, pulling the ledger from its case.";

/// A chapter that passes every rule check.
pub fn good_chapter(chapter: u32) -> String {
    let mut text = format!("Chapter {}: The Flooded Archive\n", chapter);
    for _ in 0..12 {
        text.push('\n');
        text.push_str(NARRATION);
        text.push_str("\n\n");
        text.push_str(EXCHANGE);
        text.push('\n');
    }
    text
}

/// A chapter that fails quick QC on length and paragraph count.
pub fn short_chapter(chapter: u32) -> String {
    format!("Chapter {}\n\nLin ran.", chapter)
}

/// Forty chapters, two characters, outline for the first three.
pub fn bible() -> Bible {
    Bible::new("Harbor Lights", 40)
        .with_genre("Fantasy mystery")
        .with_premise("An archivist uncovers a conspiracy beneath a drowning city.")
        .with_world("Saltmere, a canal city sinking a finger's width each year.")
        .with_characters(vec![
            CharacterProfile::new("lin", "Lin", CharacterRole::Protagonist)
                .with_motivation("Find out who flooded the archive"),
            CharacterProfile::new("ossa", "Ossa", CharacterRole::Main)
                .with_motivation("Keep the ledger out of guild hands"),
        ])
        .with_outline(vec![
            ChapterOutline::new(1, "The Flooded Archive", "Lin finds the ledger", "A name is torn out"),
            ChapterOutline::new(2, "Tide Tables", "Ossa decodes the first entry", "Someone follows them"),
            ChapterOutline::new(3, "The Guildhall", "Lin confronts the guild", "The ledger is stolen"),
        ])
}

/// Fresh state for [`bible`] split into two volumes.
pub fn fresh_state() -> ProjectState {
    ProjectState::from_bible(bible(), 2).unwrap()
}

pub const CHARACTER_RESPONSE: &str = r#"{"changes": [
    {"character_id": "lin", "field": "location", "new_value": "the flooded archive"},
    {"character_id": "ossa", "field": "equipment", "new_value": "guild ledger"}
]}"#;

pub const PLOT_RESPONSE: &str = r#"{"new_nodes": [
    {"type": "event", "content": "Lin recovers the guild ledger from the archive", "characters": ["lin"], "importance": 7},
    {"type": "foreshadowing", "content": "A page bearing a family name has been torn out", "characters": ["lin"], "importance": 8}
], "new_edges": [], "status_updates": [], "resolved_foreshadowing": []}"#;

pub const TIMELINE_RESPONSE: &str =
    r#"{"current_marker": "Day 1, high tide", "events": [{"marker": "Day 1", "description": "The archive floods"}]}"#;

pub const SUMMARY_RESPONSE: &str = r#"{"long_term": "Lin hunts the people who drowned the archive.",
"mid_term": "The ledger points at the guild.", "recent": "Lin and Ossa pull the ledger from the flood.",
"open_loops": ["Who tore out the missing page?"]}"#;

pub const KEEP_REVIEW: &str = r#"{"action": "keep", "issues": [], "guidance": ""}"#;
