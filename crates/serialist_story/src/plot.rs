//! Causal plot graph with foreshadowing tracking.

use crate::extraction::{parse_lenient_list, parse_model_payload};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serialist_error::SerialistResult;

/// Importance at or above which a node counts as a main plotline.
const MAIN_PLOT_IMPORTANCE: u8 = 7;

/// Plotlines listed per index in the prompt context.
const MAX_LISTED_PLOTLINES: usize = 5;

/// Kind of plot node.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlotNodeType {
    /// Something that happened
    Event,
    /// Planted hint awaiting payoff
    Foreshadowing,
    /// Hidden truth
    Secret,
    /// Opposition between parties
    Conflict,
    /// Closure of an earlier thread
    Resolution,
    /// Disclosure of a secret
    Revelation,
    /// Change of direction
    TurningPoint,
}

/// Lifecycle state of a plot node.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlotStatus {
    /// Still in play
    #[default]
    Active,
    /// Paid off
    Resolved,
    /// Dropped
    Abandoned,
    /// Turned into something else
    Transformed,
}

impl PlotStatus {
    /// Only active nodes may change status, and never back to active.
    pub fn can_transition_to(&self, next: PlotStatus) -> bool {
        *self == PlotStatus::Active && next != PlotStatus::Active
    }
}

/// Relation carried by a plot edge.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlotRelation {
    /// Source makes target happen
    Causes,
    /// Source makes target possible
    Enables,
    /// Source prevents target
    Blocks,
    /// Source hints at target
    Foreshadows,
    /// Source closes target
    Resolves,
    /// Source contradicts target
    Contradicts,
    /// Source mirrors target
    Parallels,
}

/// A node in the plot graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotNode {
    /// `{type}_{chapter}_{n}`
    pub id: String,
    /// Node kind
    pub node_type: PlotNodeType,
    /// What the node says
    pub content: String,
    /// Character ids involved
    #[serde(default)]
    pub characters: Vec<String>,
    /// Chapter the node was introduced in
    pub introduced_at: u32,
    /// 1 to 10
    pub importance: u8,
    /// Lifecycle state
    pub status: PlotStatus,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A directed edge between two existing nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotEdge {
    /// Edge id
    pub id: String,
    /// Source node id
    pub from: String,
    /// Target node id
    pub to: String,
    /// Relation
    pub relation: PlotRelation,
    /// Optional explanation
    #[serde(default)]
    pub description: String,
    /// Chapter the edge was established in
    pub established_at: u32,
}

/// Active foreshadowing annotated with its age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingForeshadowing {
    /// Node id
    pub node_id: String,
    /// Node content
    pub content: String,
    /// Chapter planted
    pub introduced_at: u32,
    /// Chapters since it was planted
    pub age_in_chapters: u32,
    /// Node importance
    pub importance: u8,
    /// Chapters left in the story when computed
    pub chapters_remaining: u32,
}

/// Node proposed by a plot analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlotNode {
    /// Node kind
    #[serde(rename = "type", alias = "node_type")]
    pub node_type: PlotNodeType,
    /// What the node says
    pub content: String,
    /// Character ids involved
    #[serde(default)]
    pub characters: Vec<String>,
    /// 1 to 10, clamped on ingestion
    #[serde(default = "default_importance")]
    pub importance: u8,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_importance() -> u8 {
    5
}

impl NewPlotNode {
    /// Create a node proposal.
    pub fn new(node_type: PlotNodeType, content: impl Into<String>, importance: u8) -> Self {
        Self {
            node_type,
            content: content.into(),
            characters: Vec::new(),
            importance,
            tags: Vec::new(),
        }
    }
}

/// Edge proposed by a plot analysis. Endpoints are node ids or exact node
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlotEdge {
    /// Source reference
    pub from: String,
    /// Target reference
    pub to: String,
    /// Relation
    pub relation: PlotRelation,
    /// Optional explanation
    #[serde(default)]
    pub description: String,
}

impl NewPlotEdge {
    /// Create an edge proposal.
    pub fn new(from: impl Into<String>, to: impl Into<String>, relation: PlotRelation) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation,
            description: String::new(),
        }
    }
}

/// Status change proposed by a plot analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Node id or exact content
    #[serde(alias = "id", alias = "node_id")]
    pub node: String,
    /// Requested status
    pub status: PlotStatus,
}

/// Structured result of analysing one chapter's plot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlotAnalysis {
    /// Nodes to add
    #[serde(default)]
    pub new_nodes: Vec<NewPlotNode>,
    /// Edges to add
    #[serde(default)]
    pub new_edges: Vec<NewPlotEdge>,
    /// Status changes
    #[serde(default)]
    pub status_updates: Vec<StatusUpdate>,
    /// Foreshadowing paid off in this chapter (ids or content)
    #[serde(default)]
    pub resolved_foreshadowing: Vec<String>,
}

impl PlotAnalysis {
    /// Build an analysis from a loose JSON payload, dropping malformed items
    /// one by one.
    pub fn from_value(payload: &Value) -> Self {
        let field = |names: &[&str]| names.iter().find_map(|n| payload.get(*n));
        Self {
            new_nodes: parse_lenient_list(field(&["new_nodes", "nodes"]), "new_nodes"),
            new_edges: parse_lenient_list(field(&["new_edges", "edges"]), "new_edges"),
            status_updates: parse_lenient_list(field(&["status_updates"]), "status_updates"),
            resolved_foreshadowing: parse_lenient_list(
                field(&["resolved_foreshadowing"]),
                "resolved_foreshadowing",
            ),
        }
    }

    /// Parse a plot-extraction response.
    ///
    /// # Errors
    ///
    /// Returns an error if the response contains no JSON at all.
    pub fn parse_response(response: &str) -> SerialistResult<Self> {
        Ok(Self::from_value(&parse_model_payload(response)?))
    }

    /// True when the analysis proposes nothing.
    pub fn is_empty(&self) -> bool {
        self.new_nodes.is_empty()
            && self.new_edges.is_empty()
            && self.status_updates.is_empty()
            && self.resolved_foreshadowing.is_empty()
    }
}

/// Limits for the plot section of the prompt context.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct PlotContextConfig {
    /// Age in chapters after which pending foreshadowing is overdue
    #[serde(default = "default_overdue_threshold")]
    overdue_threshold: u32,
    /// Overdue reminders listed
    #[serde(default = "default_max_overdue_reminders")]
    max_overdue_reminders: usize,
    /// Recent events listed
    #[serde(default = "default_max_recent_events")]
    max_recent_events: usize,
    /// Chapters counted as recent
    #[serde(default = "default_recent_event_window")]
    recent_event_window: u32,
    /// Chapters a causal edge stays in the reminder
    #[serde(default = "default_causal_window")]
    causal_window: u32,
}

fn default_overdue_threshold() -> u32 {
    25
}

fn default_max_overdue_reminders() -> usize {
    3
}

fn default_max_recent_events() -> usize {
    5
}

fn default_recent_event_window() -> u32 {
    10
}

fn default_causal_window() -> u32 {
    20
}

impl Default for PlotContextConfig {
    fn default() -> Self {
        Self {
            overdue_threshold: default_overdue_threshold(),
            max_overdue_reminders: default_max_overdue_reminders(),
            max_recent_events: default_max_recent_events(),
            recent_event_window: default_recent_event_window(),
            causal_window: default_causal_window(),
        }
    }
}

/// Append-only causal plot graph.
///
/// # Examples
///
/// ```
/// use serialist_story::{NewPlotNode, PlotAnalysis, PlotGraph, PlotNodeType};
///
/// let analysis = PlotAnalysis {
///     new_nodes: vec![NewPlotNode::new(PlotNodeType::Foreshadowing, "The bell rings at low tide", 8)],
///     ..PlotAnalysis::default()
/// };
/// let graph = PlotGraph::default().apply_analysis(&analysis, 3, 40);
///
/// assert_eq!(graph.nodes()[0].id, "foreshadowing_3_1");
/// assert_eq!(graph.pending_foreshadowing().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Getters)]
pub struct PlotGraph {
    nodes: Vec<PlotNode>,
    edges: Vec<PlotEdge>,
    #[serde(default)]
    pending_foreshadowing: Vec<PendingForeshadowing>,
    #[serde(default)]
    main_plots: Vec<String>,
    #[serde(default)]
    sub_plots: Vec<String>,
    #[serde(default)]
    last_updated_chapter: u32,
}

impl PlotGraph {
    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&PlotNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Resolve a reference by node id, then by exact content.
    fn resolve(&self, reference: &str) -> Option<usize> {
        let reference = reference.trim();
        self.nodes
            .iter()
            .position(|n| n.id == reference)
            .or_else(|| self.nodes.iter().rposition(|n| n.content == reference))
    }

    /// Apply a chapter's analysis, returning the next graph.
    ///
    /// Items that cannot be applied (empty content, unresolved endpoints,
    /// unknown nodes, illegal status transitions) are dropped individually.
    #[tracing::instrument(
        skip(self, analysis),
        fields(
            new_nodes = analysis.new_nodes.len(),
            new_edges = analysis.new_edges.len(),
            status_updates = analysis.status_updates.len()
        )
    )]
    pub fn apply_analysis(&self, analysis: &PlotAnalysis, chapter: u32, total_chapters: u32) -> Self {
        let mut next = self.clone();

        for proposal in &analysis.new_nodes {
            let content = proposal.content.trim();
            if content.is_empty() {
                tracing::debug!("Dropping plot node with empty content");
                continue;
            }
            let sequence = next
                .nodes
                .iter()
                .filter(|n| n.node_type == proposal.node_type && n.introduced_at == chapter)
                .count()
                + 1;
            next.nodes.push(PlotNode {
                id: format!("{}_{}_{}", proposal.node_type, chapter, sequence),
                node_type: proposal.node_type,
                content: content.to_string(),
                characters: proposal.characters.clone(),
                introduced_at: chapter,
                importance: proposal.importance.clamp(1, 10),
                status: PlotStatus::Active,
                tags: proposal.tags.clone(),
            });
        }

        for proposal in &analysis.new_edges {
            let (Some(from), Some(to)) = (next.resolve(&proposal.from), next.resolve(&proposal.to))
            else {
                tracing::debug!(from = %proposal.from, to = %proposal.to, "Dropping edge with unresolved endpoint");
                continue;
            };
            if from == to {
                tracing::debug!(node = %proposal.from, "Dropping self-referencing edge");
                continue;
            }
            let edge = PlotEdge {
                id: format!("edge_{}_{}", chapter, next.edges.len() + 1),
                from: next.nodes[from].id.clone(),
                to: next.nodes[to].id.clone(),
                relation: proposal.relation,
                description: proposal.description.clone(),
                established_at: chapter,
            };
            next.edges.push(edge);
        }

        for update in &analysis.status_updates {
            let Some(index) = next.resolve(&update.node) else {
                tracing::debug!(node = %update.node, "Ignoring status update for unknown node");
                continue;
            };
            let node = &mut next.nodes[index];
            if node.status.can_transition_to(update.status) {
                node.status = update.status;
            } else {
                tracing::debug!(
                    node = %node.id,
                    from = %node.status,
                    to = %update.status,
                    "Rejecting status transition"
                );
            }
        }

        for reference in &analysis.resolved_foreshadowing {
            let Some(index) = next.resolve(reference) else {
                tracing::debug!(node = %reference, "Ignoring resolution of unknown foreshadowing");
                continue;
            };
            let node = &mut next.nodes[index];
            if node.node_type == PlotNodeType::Foreshadowing && node.status == PlotStatus::Active {
                node.status = PlotStatus::Resolved;
            }
        }

        next.rebuild_indexes();
        next.pending_foreshadowing = next.pending_at(chapter, total_chapters);
        next.last_updated_chapter = next.last_updated_chapter.max(chapter);
        next
    }

    /// Recompute the advisory main/sub plotline indexes from active nodes.
    fn rebuild_indexes(&mut self) {
        self.main_plots = self
            .nodes
            .iter()
            .filter(|n| n.status == PlotStatus::Active && n.importance >= MAIN_PLOT_IMPORTANCE)
            .map(|n| n.id.clone())
            .collect();
        self.sub_plots = self
            .nodes
            .iter()
            .filter(|n| {
                n.status == PlotStatus::Active
                    && n.importance < MAIN_PLOT_IMPORTANCE
                    && n.node_type != PlotNodeType::Foreshadowing
            })
            .map(|n| n.id.clone())
            .collect();
    }

    /// Active foreshadowing at `chapter`, oldest first.
    pub fn pending_at(&self, chapter: u32, total_chapters: u32) -> Vec<PendingForeshadowing> {
        let mut pending: Vec<PendingForeshadowing> = self
            .nodes
            .iter()
            .filter(|n| n.node_type == PlotNodeType::Foreshadowing && n.status == PlotStatus::Active)
            .map(|n| PendingForeshadowing {
                node_id: n.id.clone(),
                content: n.content.clone(),
                introduced_at: n.introduced_at,
                age_in_chapters: chapter.saturating_sub(n.introduced_at),
                importance: n.importance,
                chapters_remaining: total_chapters.saturating_sub(chapter),
            })
            .collect();
        pending.sort_by(|a, b| b.age_in_chapters.cmp(&a.age_in_chapters));
        pending
    }

    /// Pending foreshadowing that must be surfaced at `chapter`: older than
    /// the threshold, or anything pending once the final tenth of the story
    /// is reached.
    pub fn due_foreshadowing(
        &self,
        chapter: u32,
        total_chapters: u32,
        config: &PlotContextConfig,
    ) -> Vec<PendingForeshadowing> {
        let ending_near = total_chapters > 0
            && f64::from(total_chapters.saturating_sub(chapter)) <= f64::from(total_chapters) * 0.1;
        self.pending_at(chapter, total_chapters)
            .into_iter()
            .filter(|p| ending_near || p.age_in_chapters > config.overdue_threshold)
            .collect()
    }

    /// Active non-foreshadowing nodes introduced within `window` chapters
    /// before `chapter`, newest first.
    pub fn recent_events(&self, chapter: u32, window: u32) -> Vec<&PlotNode> {
        let mut events: Vec<&PlotNode> = self
            .nodes
            .iter()
            .filter(|n| {
                n.status == PlotStatus::Active
                    && n.node_type != PlotNodeType::Foreshadowing
                    && n.introduced_at <= chapter
                    && chapter - n.introduced_at <= window
            })
            .collect();
        events.sort_by(|a, b| b.introduced_at.cmp(&a.introduced_at));
        events
    }

    /// Render the plot section of the prompt context.
    ///
    /// Sections in order: overdue foreshadowing, active plotlines, recent
    /// events, causal obligations. Empty sections are left out.
    pub fn build_context(&self, chapter: u32, total_chapters: u32, config: &PlotContextConfig) -> String {
        let mut sections = Vec::new();

        let due = self.due_foreshadowing(chapter, total_chapters, config);
        if !due.is_empty() {
            let lines: Vec<String> = due
                .iter()
                .take(config.max_overdue_reminders)
                .map(|p| {
                    format!(
                        "- {} (planted in chapter {}, {} chapters ago)",
                        p.content, p.introduced_at, p.age_in_chapters
                    )
                })
                .collect();
            sections.push(format!(
                "Foreshadowing awaiting payoff:\n{}",
                lines.join("\n")
            ));
        }

        let plotlines = self.render_plotlines();
        if !plotlines.is_empty() {
            sections.push(plotlines);
        }

        let recent: Vec<String> = self
            .recent_events(chapter, config.recent_event_window)
            .into_iter()
            .take(config.max_recent_events)
            .map(|n| format!("- Chapter {}: {}", n.introduced_at, n.content))
            .collect();
        if !recent.is_empty() {
            sections.push(format!("Recent events:\n{}", recent.join("\n")));
        }

        let causal: Vec<String> = self
            .edges
            .iter()
            .filter(|e| {
                matches!(e.relation, PlotRelation::Causes | PlotRelation::Enables)
                    && e.established_at <= chapter
                    && chapter - e.established_at <= config.causal_window
            })
            .filter_map(|e| {
                let from = self.node(&e.from)?;
                let to = self.node(&e.to)?;
                if to.status != PlotStatus::Active {
                    return None;
                }
                let verb = match e.relation {
                    PlotRelation::Causes => "will cause",
                    _ => "will enable",
                };
                Some(format!("- {} {} {}", from.content, verb, to.content))
            })
            .collect();
        if !causal.is_empty() {
            sections.push(format!("Causal threads to honour:\n{}", causal.join("\n")));
        }

        sections.join("\n\n")
    }

    fn render_plotlines(&self) -> String {
        let render = |ids: &[String]| -> Vec<String> {
            ids.iter()
                .filter_map(|id| self.node(id))
                .filter(|n| n.status == PlotStatus::Active)
                .take(MAX_LISTED_PLOTLINES)
                .map(|n| format!("- {}", n.content))
                .collect()
        };

        let mut out = Vec::new();
        let main = render(&self.main_plots);
        if !main.is_empty() {
            out.push(format!("Main plotlines:\n{}", main.join("\n")));
        }
        let sub = render(&self.sub_plots);
        if !sub.is_empty() {
            out.push(format!("Subplots:\n{}", sub.join("\n")));
        }
        out.join("\n\n")
    }
}
