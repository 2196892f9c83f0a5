//! Tests for context assembly, caching and budget fitting.

mod test_utils;

use serialist_cache::{ContextCache, ContextCacheConfig};
use serialist_core::Bible;
use serialist_error::{PipelineErrorKind, SerialistErrorKind};
use serialist_pipeline::{ContextAssembler, PipelineConfig, ProjectState, state_version};
use serialist_story::{CharacterDelta, PacingType, PlotContextConfig};
use test_utils::fresh_state;

fn assembler(config: &PipelineConfig) -> ContextAssembler {
    ContextAssembler::new(config, PlotContextConfig::default())
}

fn cache() -> ContextCache {
    ContextCache::new(ContextCacheConfig::default())
}

#[test]
fn test_context_contains_every_section_in_order() {
    let state = fresh_state();
    let context = assembler(&PipelineConfig::default())
        .assemble(&mut cache(), "harbor-lights", &state, 2, None, &[])
        .unwrap();

    let bible = context.text.find("## Story bible").unwrap();
    let characters = context.text.find("## Characters").unwrap();
    let pacing = context.text.find("## Pacing").unwrap();
    let chapter = context.text.find("## This chapter").unwrap();
    assert!(bible < characters && characters < pacing && pacing < chapter);

    assert!(context.text.contains("Chapter 2 of 40"));
    assert!(context.text.contains("Tide Tables"));
    assert!(context.character_context.contains("Lin"));
    assert_eq!(context.outline.as_ref().map(|o| o.index), Some(2));
    assert_eq!(context.guide.chapter_index, 2);
    assert_eq!(context.state_version, state_version(&state));
    assert!(context.dropped_sections.is_empty());
}

#[test]
fn test_open_loops_are_listed_with_summary() {
    let mut state = fresh_state();
    state.open_loops = vec!["Who tore out the missing page?".to_string()];

    let context = assembler(&PipelineConfig::default())
        .assemble(&mut cache(), "harbor-lights", &state, 2, None, &[])
        .unwrap();

    assert!(context.text.contains("## Story so far"));
    assert!(context.text.contains("Open loops:\n- Who tore out the missing page?"));
}

#[test]
fn test_second_assembly_is_served_from_cache() {
    let state = fresh_state();
    let assembler = assembler(&PipelineConfig::default());
    let mut cache = cache();

    let first = assembler
        .assemble(&mut cache, "harbor-lights", &state, 2, None, &[])
        .unwrap();
    assert_eq!(*cache.stats().hits(), 0);

    let second = assembler
        .assemble(&mut cache, "harbor-lights", &state, 2, None, &[])
        .unwrap();
    assert_eq!(*cache.stats().hits(), 4);
    assert_eq!(first.text, second.text);
}

#[test]
fn test_state_change_invalidates_cached_sections() {
    let state = fresh_state();
    let assembler = assembler(&PipelineConfig::default());
    let mut cache = cache();

    assembler
        .assemble(&mut cache, "harbor-lights", &state, 2, None, &[])
        .unwrap();

    let moved = ProjectState {
        characters: state
            .characters
            .apply_deltas(&[CharacterDelta::new("lin", "location", "the salt docks")], 1),
        ..state.clone()
    };
    assert_ne!(state_version(&moved), state_version(&state));

    let context = assembler
        .assemble(&mut cache, "harbor-lights", &moved, 2, None, &[])
        .unwrap();
    assert!(context.character_context.contains("the salt docks"));
    assert!(*cache.stats().stale_reads() > 0);
}

#[test]
fn test_low_priority_sections_are_dropped_first() {
    let state = fresh_state();
    let config = PipelineConfig::default().with_max_context_chars(200_usize);

    let context = assembler(&config)
        .assemble(&mut cache(), "harbor-lights", &state, 2, None, &[])
        .unwrap();

    assert_eq!(context.dropped_sections.last().map(String::as_str), Some("Story bible"));
    assert!(!context.text.contains("## Story bible"));
    assert!(!context.text.contains("## Characters"));
    assert!(context.text.contains("## Pacing"));
    assert!(context.text.contains("## This chapter"));
}

#[test]
fn test_monotonous_pacing_adds_advisory() {
    let state = fresh_state();
    let assembler = assembler(&PipelineConfig::default());

    let balanced = assembler
        .assemble(&mut cache(), "harbor-lights", &state, 2, None, &[])
        .unwrap();
    assert!(!balanced.text.contains("## Pacing balance"));

    let recent = [balanced.guide.pacing_type; 3];
    let context = assembler
        .assemble(&mut cache(), "harbor-lights", &state, 2, None, &recent)
        .unwrap();
    assert!(context.text.contains("## Pacing balance"));
    assert!(context.text.contains("vary the rhythm"));
}

#[test]
fn test_chapter_outside_story_is_rejected() {
    let state = fresh_state();
    let assembler = assembler(&PipelineConfig::default());

    for chapter in [0, 41] {
        let err = assembler
            .assemble(&mut cache(), "harbor-lights", &state, chapter, None, &[])
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            SerialistErrorKind::Pipeline(e) if matches!(e.kind, PipelineErrorKind::InvalidInput(_))
        ));
    }
}

#[test]
fn test_gap_in_outline_is_rejected() {
    let err = assembler(&PipelineConfig::default())
        .assemble(&mut cache(), "harbor-lights", &fresh_state(), 5, None, &[])
        .unwrap_err();

    assert!(matches!(
        err.kind(),
        SerialistErrorKind::Pipeline(e) if e.kind == PipelineErrorKind::MissingOutline(5)
    ));
}

#[test]
fn test_bible_without_outline_still_assembles() {
    let state = ProjectState::from_bible(Bible::new("Untitled", 12), 1).unwrap();

    let context = assembler(&PipelineConfig::default())
        .assemble(&mut cache(), "untitled", &state, 5, None, &[])
        .unwrap();

    assert!(context.outline.is_none());
    assert!(context.text.contains("Chapter 5 of 12"));
}
