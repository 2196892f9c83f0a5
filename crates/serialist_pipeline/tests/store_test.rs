//! Tests for project persistence.

mod test_utils;

use serialist_error::{JsonErrorKind, SerialistErrorKind, StorageErrorKind};
use serialist_pipeline::{FileProjectStore, InMemoryProjectStore, ProjectStore};
use serialist_story::CharacterDelta;
use test_utils::fresh_state;

fn storage_kind(err: &serialist_error::SerialistError) -> &StorageErrorKind {
    match err.kind() {
        SerialistErrorKind::Storage(e) => &e.kind,
        other => panic!("expected a storage error, got {}", other),
    }
}

#[tokio::test]
async fn test_file_store_persists_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileProjectStore::new(dir.path().join("projects")).unwrap();

    let mut state = fresh_state();
    state.open_loops = vec!["Who tore out the missing page?".to_string()];
    state.characters = state
        .characters
        .apply_deltas(&[CharacterDelta::new("lin", "location", "the salt docks")], 1);

    assert!(!store.exists("harbor-lights").await.unwrap());
    store.save("harbor-lights", &state).await.unwrap();
    assert!(store.exists("harbor-lights").await.unwrap());
    assert!(dir.path().join("projects/harbor-lights.json").exists());
    assert!(!dir.path().join("projects/harbor-lights.json.tmp").exists());

    let loaded = store.load("harbor-lights").await.unwrap();
    assert_eq!(loaded, state);
}

#[tokio::test]
async fn test_file_store_overwrites_previous_save() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileProjectStore::new(dir.path()).unwrap();
    let state = fresh_state();

    store.save("harbor-lights", &state).await.unwrap();
    let mut next = state.clone();
    next.open_loops.push("Who follows them?".to_string());
    store.save("harbor-lights", &next).await.unwrap();

    assert_eq!(store.load("harbor-lights").await.unwrap().open_loops.len(), 1);
}

#[tokio::test]
async fn test_missing_project_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileProjectStore::new(dir.path()).unwrap();

    let err = store.load("nowhere").await.unwrap_err();
    assert!(matches!(storage_kind(&err), StorageErrorKind::NotFound(id) if id == "nowhere"));
}

#[tokio::test]
async fn test_corrupt_project_file_is_a_json_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileProjectStore::new(dir.path()).unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

    let err = store.load("broken").await.unwrap_err();
    match err.kind() {
        SerialistErrorKind::Json(e) => assert!(matches!(e.kind(), JsonErrorKind::Parse(_))),
        other => panic!("expected a JSON error, got {}", other),
    }
}

#[tokio::test]
async fn test_path_traversal_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileProjectStore::new(dir.path()).unwrap();

    for id in ["../escape", "a/b", "", ".hidden"] {
        let err = store.save(id, &fresh_state()).await.unwrap_err();
        assert!(
            matches!(storage_kind(&err), StorageErrorKind::InvalidProjectId(_)),
            "accepted {:?}",
            id
        );
    }
}

#[tokio::test]
async fn test_in_memory_store() {
    let store = InMemoryProjectStore::new();
    assert!(store.is_empty().await);

    let err = store.load("harbor-lights").await.unwrap_err();
    assert!(matches!(storage_kind(&err), StorageErrorKind::NotFound(_)));

    store.save("harbor-lights", &fresh_state()).await.unwrap();
    assert_eq!(store.len().await, 1);
    assert!(store.exists("harbor-lights").await.unwrap());
    assert_eq!(store.load("harbor-lights").await.unwrap(), fresh_state());
}
