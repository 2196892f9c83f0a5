//! Tests for the command-line handlers.

use clap::Parser;
use serialist::cli::{
    Cli, Commands, check_chapter, handle_arc, handle_check, handle_config, handle_inspect,
    inspect_project, render_arc,
};
use serialist::{
    Bible, CharacterProfile, CharacterRole, FileProjectStore, NarrativeArc, NewPlotNode,
    PlotAnalysis, PlotContextConfig, PlotNodeType, ProjectState, ProjectStore, QualityConfig,
    SerialistConfig,
};
use std::io::Write;

const NARRATION: &str = "Lin pressed her palm to the cold stone and listened to the water hum \
beneath the floor. The lantern light shook across the shelves, and the smell of wet paper filled the aisle.";

const EXCHANGE: &str =
    "\"We have an hour before the tide turns,\" Ossa said, pulling the ledger from its case.";

fn good_chapter() -> String {
    let mut text = "Chapter 2: Tide Tables\n".to_string();
    for _ in 0..12 {
        text.push('\n');
        text.push_str(NARRATION);
        text.push_str("\n\n");
        text.push_str(EXCHANGE);
        text.push('\n');
    }
    text
}

fn project_with_foreshadowing() -> ProjectState {
    let bible = Bible::new("Harbor Lights", 40).with_characters(vec![
        CharacterProfile::new("lin", "Lin", CharacterRole::Protagonist),
    ]);
    let mut state = ProjectState::from_bible(bible, 1).unwrap();
    let analysis = PlotAnalysis {
        new_nodes: vec![NewPlotNode::new(
            PlotNodeType::Foreshadowing,
            "The bell rings at low tide",
            8,
        )],
        ..PlotAnalysis::default()
    };
    state.plot_graph = state.plot_graph.apply_analysis(&analysis, 1, 40);
    state
}

#[test]
fn test_parse_arc_command() {
    let cli = Cli::try_parse_from(["serialist", "arc", "--end", "40", "--volumes", "2"]).unwrap();
    match cli.command {
        Commands::Arc {
            start,
            end,
            volumes,
            json,
        } => {
            assert_eq!((start, end, volumes), (1, 40, 2));
            assert!(!json);
        }
        other => panic!("Expected arc command, got {:?}", other),
    }
    assert!(!cli.verbose);
}

#[test]
fn test_parse_check_command_with_global_flags() {
    let cli = Cli::try_parse_from([
        "serialist",
        "check",
        "chapter.txt",
        "--final",
        "--min-chars",
        "100",
        "--verbose",
        "--json-logs",
    ])
    .unwrap();
    assert!(cli.verbose);
    assert!(cli.json_logs);
    match cli.command {
        Commands::Check {
            file,
            chapter,
            is_final,
            min_chars,
        } => {
            assert_eq!(file.to_str(), Some("chapter.txt"));
            assert_eq!(chapter, 1);
            assert!(is_final);
            assert_eq!(min_chars, Some(100));
        }
        other => panic!("Expected check command, got {:?}", other),
    }
}

#[test]
fn test_parse_rejects_missing_arguments() {
    assert!(Cli::try_parse_from(["serialist", "arc"]).is_err());
    assert!(Cli::try_parse_from(["serialist", "inspect", "--store", "projects"]).is_err());
}

#[test]
fn test_render_arc_marks_climax() {
    let arc = NarrativeArc::plan_range(1, 12, 1).unwrap();
    let rendered = render_arc(&arc);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines.len(), 13);
    assert_eq!(
        lines[0],
        format!("Volume 1: chapters 1-12, climax at chapter {}", arc.climax_chapters[0])
    );
    assert_eq!(rendered.matches("<- climax").count(), 1);
}

#[test]
fn test_handle_arc_json() {
    let mut out = Vec::new();
    handle_arc(41, 80, 2, true, &mut out).unwrap();

    let arc: NarrativeArc = serde_json::from_slice(&out).unwrap();
    assert_eq!(arc.volumes.len(), 2);
    assert_eq!(arc.volumes[0].start_chapter, 41);
    assert_eq!(arc.volumes[1].end_chapter, 80);
}

#[test]
fn test_handle_arc_rejects_bad_range() {
    let mut out = Vec::new();
    let err = handle_arc(10, 5, 1, false, &mut out).unwrap_err();
    assert!(err.to_string().contains("Cannot split chapters 10..=5"));
    assert!(out.is_empty());
}

#[test]
fn test_check_chapter_passes_good_text() {
    let result = check_chapter(&good_chapter(), 2, false, QualityConfig::default()).unwrap();
    assert!(result.passed, "{}", result.render_failures());
}

#[test]
fn test_check_chapter_premature_ending() {
    let text = format!("{}\nThe End.", good_chapter());

    let result = check_chapter(&text, 2, false, QualityConfig::default()).unwrap();
    assert!(!result.passed);

    let result = check_chapter(&text, 2, true, QualityConfig::default()).unwrap();
    assert!(result.passed, "{}", result.render_failures());
}

#[test]
fn test_handle_check_reports_json() {
    let config = SerialistConfig::default();

    let mut good = tempfile::NamedTempFile::new().unwrap();
    good.write_all(good_chapter().as_bytes()).unwrap();
    let mut out = Vec::new();
    let passed = handle_check(good.path(), 2, false, None, &config, &mut out).unwrap();
    assert!(passed);
    let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(report["passed"], serde_json::Value::Bool(true));

    let mut short = tempfile::NamedTempFile::new().unwrap();
    short.write_all(b"Chapter 2\n\nLin ran.").unwrap();
    let mut out = Vec::new();
    let passed = handle_check(short.path(), 2, false, None, &config, &mut out).unwrap();
    assert!(!passed);
    let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(report["passed"], serde_json::Value::Bool(false));
    assert!(report["issues"].as_array().is_some_and(|issues| !issues.is_empty()));
}

#[test]
fn test_handle_check_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut out = Vec::new();
    let result = handle_check(
        &dir.path().join("missing.txt"),
        1,
        false,
        None,
        &SerialistConfig::default(),
        &mut out,
    );
    assert!(result.is_err());
}

#[test]
fn test_inspect_defaults_to_next_chapter() {
    let state = project_with_foreshadowing();
    let report = inspect_project(&state, None, &PlotContextConfig::default());

    assert_eq!(report.title, "Harbor Lights");
    assert_eq!(report.chapter, 2);
    assert_eq!(report.total_chapters, 40);
    assert_eq!(report.characters, 1);
    assert_eq!(report.pending.len(), 1);
    assert!(report.due.is_empty());
}

#[test]
fn test_inspect_flags_overdue_foreshadowing() {
    let state = project_with_foreshadowing();
    let report = inspect_project(&state, Some(30), &PlotContextConfig::default());

    assert_eq!(report.due.len(), 1);
    assert_eq!(report.due[0].age_in_chapters, 29);

    let clamped = inspect_project(&state, Some(500), &PlotContextConfig::default());
    assert_eq!(clamped.chapter, 40);
}

#[tokio::test]
async fn test_handle_inspect_reads_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileProjectStore::new(dir.path()).unwrap();
    store
        .save("harbor-lights", &project_with_foreshadowing())
        .await
        .unwrap();

    let mut out = Vec::new();
    handle_inspect(
        dir.path(),
        "harbor-lights",
        Some(30),
        &PlotContextConfig::default(),
        &mut out,
    )
    .await
    .unwrap();

    let rendered = String::from_utf8(out).unwrap();
    assert!(rendered.starts_with("Harbor Lights (chapter 30 of 40)"));
    assert!(rendered.contains("Pending foreshadowing: 1"));
    assert!(rendered.contains("The bell rings at low tide"));
    assert!(rendered.contains("<- due"));
}

#[tokio::test]
async fn test_handle_inspect_missing_project() {
    let dir = tempfile::tempdir().unwrap();
    let mut out = Vec::new();
    let result = handle_inspect(
        dir.path(),
        "nothing-here",
        None,
        &PlotContextConfig::default(),
        &mut out,
    )
    .await;
    assert!(result.is_err());
}

#[test]
fn test_handle_config_round_trips() {
    let config = SerialistConfig::default();
    let mut out = Vec::new();
    handle_config(&config, &mut out).unwrap();

    let rendered = String::from_utf8(out).unwrap();
    assert!(rendered.contains("[pipeline]"));
    let parsed: SerialistConfig = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed, config);
}
