//! Project state persistence.
//!
//! A project is everything the pipeline needs to write the next chapter:
//! the static bible plus the long-lived narrative state. Stores load the
//! whole bundle before a chapter and save the whole bundle after it; there
//! are no partial updates.

use crate::ChapterOutcome;
use async_trait::async_trait;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use serialist_core::Bible;
use serialist_error::{JsonError, JsonErrorKind, SerialistResult, StorageError, StorageErrorKind};
use serialist_story::{CharacterStateRegistry, NarrativeArc, PlotGraph, RollingSummary, TimelineState};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Persisted bundle for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    /// Static story setup
    pub bible: Bible,
    /// Three-band recap
    #[serde(default)]
    pub rolling_summary: RollingSummary,
    /// Unresolved threads
    #[serde(default)]
    pub open_loops: Vec<String>,
    /// Character state
    #[serde(default)]
    pub characters: CharacterStateRegistry,
    /// Causal plot graph
    #[serde(default)]
    pub plot_graph: PlotGraph,
    /// Tension curves
    pub narrative_arc: NarrativeArc,
    /// In-story chronology
    #[serde(default)]
    pub timeline: TimelineState,
}

impl ProjectState {
    /// Fresh state for a new project: main characters from the bible and
    /// an arc split into `volume_count` volumes.
    ///
    /// # Errors
    ///
    /// Returns an error if the arc cannot be planned (no chapters, or more
    /// volumes than chapters).
    pub fn from_bible(bible: Bible, volume_count: u32) -> SerialistResult<Self> {
        let narrative_arc = NarrativeArc::plan(*bible.total_chapters(), volume_count)?;
        let characters = CharacterStateRegistry::initialize_from_profiles(bible.characters());
        Ok(Self {
            bible,
            rolling_summary: RollingSummary::default(),
            open_loops: Vec::new(),
            characters,
            plot_graph: PlotGraph::default(),
            narrative_arc,
            timeline: TimelineState::default(),
        })
    }

    /// Fold a finished chapter's state into the project.
    pub fn with_outcome(self, outcome: &ChapterOutcome) -> Self {
        Self {
            rolling_summary: outcome.updated_summary.clone(),
            open_loops: outcome.updated_open_loops.clone(),
            characters: outcome.updated_characters.clone(),
            plot_graph: outcome.updated_plot.clone(),
            timeline: outcome.updated_timeline.clone(),
            ..self
        }
    }
}

/// Load-before, save-after persistence of [`ProjectState`].
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Load a project.
    ///
    /// # Errors
    ///
    /// Returns [`StorageErrorKind::NotFound`] if nothing was saved under
    /// `project_id`.
    async fn load(&self, project_id: &str) -> SerialistResult<ProjectState>;

    /// Replace a project's persisted state.
    async fn save(&self, project_id: &str, state: &ProjectState) -> SerialistResult<()>;

    /// Whether a project has been saved.
    async fn exists(&self, project_id: &str) -> SerialistResult<bool>;
}

/// In-memory project store.
///
/// Stores projects in a HashMap protected by an RwLock. All data is lost
/// when the store is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProjectStore {
    projects: Arc<RwLock<HashMap<String, ProjectState>>>,
}

impl InMemoryProjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored projects.
    pub async fn len(&self) -> usize {
        self.projects.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.projects.read().await.is_empty()
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn load(&self, project_id: &str) -> SerialistResult<ProjectState> {
        self.projects
            .read()
            .await
            .get(project_id)
            .cloned()
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(project_id.to_string())).into())
    }

    async fn save(&self, project_id: &str, state: &ProjectState) -> SerialistResult<()> {
        self.projects
            .write()
            .await
            .insert(project_id.to_string(), state.clone());
        debug!(project_id, "Saved project in memory");
        Ok(())
    }

    async fn exists(&self, project_id: &str) -> SerialistResult<bool> {
        Ok(self.projects.read().await.contains_key(project_id))
    }
}

/// One pretty-printed JSON file per project.
///
/// Saves go through a temporary file and a rename, so a crash mid-write
/// leaves the previous state intact.
#[derive(Debug, Clone, Getters)]
pub struct FileProjectStore {
    /// Directory holding the project files
    root: PathBuf,
}

impl FileProjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(root: impl AsRef<Path>) -> SerialistResult<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    root.display(),
                    e
                )))
            })?;
        }

        debug!(path = %root.display(), "Initialized project store");
        Ok(Self { root })
    }

    /// Path of a project's file.
    ///
    /// # Errors
    ///
    /// Returns an error if `project_id` is empty, starts with a dot, or
    /// contains anything other than ASCII letters, digits, `-`, `_` and `.`.
    pub fn project_path(&self, project_id: &str) -> SerialistResult<PathBuf> {
        let valid = !project_id.is_empty()
            && !project_id.starts_with('.')
            && project_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(
                StorageError::new(StorageErrorKind::InvalidProjectId(project_id.to_string())).into(),
            );
        }
        Ok(self.root.join(format!("{}.json", project_id)))
    }
}

#[async_trait]
impl ProjectStore for FileProjectStore {
    #[tracing::instrument(skip(self), fields(root = %self.root.display()))]
    async fn load(&self, project_id: &str) -> SerialistResult<ProjectState> {
        let path = self.project_path(project_id)?;

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::new(StorageErrorKind::NotFound(project_id.to_string())).into());
            }
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
                .into());
            }
        };

        let state: ProjectState = serde_json::from_str(&contents).map_err(|e| {
            JsonError::new(JsonErrorKind::Parse(format!("{}: {}", path.display(), e)))
        })?;

        debug!(
            chapters = state.bible.total_chapters(),
            characters = state.characters.len(),
            plot_nodes = state.plot_graph.nodes().len(),
            "Loaded project"
        );
        Ok(state)
    }

    #[tracing::instrument(skip(self, state), fields(root = %self.root.display()))]
    async fn save(&self, project_id: &str, state: &ProjectState) -> SerialistResult<()> {
        let path = self.project_path(project_id)?;
        let staging = path.with_extension("json.tmp");

        let contents = serde_json::to_string_pretty(state)
            .map_err(|e| JsonError::new(JsonErrorKind::Serialize(e.to_string())))?;

        tokio::fs::write(&staging, contents).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!("{}: {}", staging.display(), e)))
        })?;
        tokio::fs::rename(&staging, &path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!("{}: {}", path.display(), e)))
        })?;

        debug!(path = %path.display(), "Saved project");
        Ok(())
    }

    async fn exists(&self, project_id: &str) -> SerialistResult<bool> {
        let path = self.project_path(project_id)?;
        tokio::fs::try_exists(&path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", path.display(), e))).into()
        })
    }
}
