//! Bounded prompt context assembly.

use crate::{PipelineConfig, ProjectState};
use serialist_cache::{CacheKey, ContextCache, ContextType, StateVersion};
use serialist_core::ChapterOutline;
use serialist_error::{PipelineError, PipelineErrorKind, SerialistResult};
use serialist_story::{CharacterStateRegistry, NarrativeArc, NarrativeGuide, PacingType, PlotContextConfig};
use tracing::{debug, warn};

/// Sections that are never dropped to fit the budget.
const REQUIRED: u8 = u8::MAX;

#[derive(Debug)]
struct Section {
    title: &'static str,
    body: String,
    /// Lower priorities are dropped first when over budget
    priority: u8,
}

impl Section {
    fn rendered_len(&self) -> usize {
        self.title.chars().count() + self.body.chars().count() + 5
    }
}

/// Everything the stages need from one assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    /// Prompt context, within the configured budget
    pub text: String,
    /// Pacing projection for the chapter
    pub guide: NarrativeGuide,
    /// Rendered active characters, also used by the character check
    pub character_context: String,
    /// Outline entry for the chapter, if the bible has one
    pub outline: Option<ChapterOutline>,
    /// Composite version of the state the context was built from
    pub state_version: StateVersion,
    /// Titles of sections left out to fit the budget
    pub dropped_sections: Vec<String>,
}

/// Builds the per-chapter context from project state.
///
/// Sections derived from versioned state (bible, summary, characters, plot)
/// go through the [`ContextCache`]; pacing, timeline and outline are cheap and
/// always rebuilt.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_context_chars: usize,
    active_character_limit: usize,
    plot: PlotContextConfig,
}

/// Composite version of the versioned parts of a project.
pub fn state_version(state: &ProjectState) -> StateVersion {
    StateVersion::compose(
        *state.characters.last_updated_chapter(),
        *state.plot_graph.last_updated_chapter(),
        state.rolling_summary.last_updated_chapter,
    )
}

impl ContextAssembler {
    /// Create an assembler from pipeline and plot settings.
    pub fn new(pipeline: &PipelineConfig, plot: PlotContextConfig) -> Self {
        Self {
            max_context_chars: *pipeline.max_context_chars(),
            active_character_limit: *pipeline.active_character_limit(),
            plot,
        }
    }

    /// Assemble the context for `chapter`.
    ///
    /// `previous_target` is the last chapter's smoothed tension and
    /// `recent_pacing` the pacing types of the chapters before this one,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the chapter is outside the story, or the bible
    /// has an outline that skips this chapter.
    #[tracing::instrument(skip(self, cache, state, recent_pacing))]
    pub fn assemble(
        &self,
        cache: &mut ContextCache,
        project_id: &str,
        state: &ProjectState,
        chapter: u32,
        previous_target: Option<f64>,
        recent_pacing: &[PacingType],
    ) -> SerialistResult<AssembledContext> {
        let bible = &state.bible;
        let total = *bible.total_chapters();
        if chapter == 0 || chapter > total {
            return Err(PipelineError::new(PipelineErrorKind::InvalidInput(format!(
                "chapter {} is outside 1..={}",
                chapter, total
            )))
            .into());
        }

        let outline = bible.outline_for(chapter).cloned();
        if outline.is_none() && !bible.outline().is_empty() {
            return Err(PipelineError::new(PipelineErrorKind::MissingOutline(chapter)).into());
        }

        let version = state_version(state);

        let bible_text = cached_section(cache, project_id, ContextType::BibleContext, chapter, version, || {
            bible.render()
        });
        let summary_text = cached_section(cache, project_id, ContextType::SummaryContext, chapter, version, || {
            render_summary(state)
        });
        let character_context =
            cached_section(cache, project_id, ContextType::CharacterContext, chapter, version, || {
                let snapshots = state
                    .characters
                    .derive_active_snapshots(chapter, self.active_character_limit);
                CharacterStateRegistry::render_context(&snapshots)
            });
        let plot_text = cached_section(cache, project_id, ContextType::PlotContext, chapter, version, || {
            state.plot_graph.build_context(chapter, total, &self.plot)
        });

        let guide = state.narrative_arc.build_guide(chapter, previous_target);
        let balance = NarrativeArc::check_balance(recent_pacing, guide.pacing_type);

        let chapter_text = match &outline {
            Some(o) => format!("Chapter {} of {}\n{}", chapter, total, o.render()),
            None => format!("Chapter {} of {}", chapter, total),
        };

        let mut sections = vec![
            Section { title: "Story bible", body: bible_text, priority: 90 },
            Section { title: "Story so far", body: summary_text, priority: 60 },
            Section { title: "Characters", body: character_context.clone(), priority: 80 },
            Section { title: "Plot threads", body: plot_text, priority: 70 },
            Section { title: "Timeline", body: state.timeline.render(), priority: 30 },
            Section { title: "Pacing", body: guide.render(), priority: REQUIRED },
        ];
        if let Some(suggestion) = balance.suggestion.filter(|_| !balance.balanced) {
            debug!(%suggestion, "Pacing balance advisory");
            sections.push(Section { title: "Pacing balance", body: suggestion, priority: 20 });
        }
        sections.push(Section { title: "This chapter", body: chapter_text, priority: REQUIRED });
        sections.retain(|s| !s.body.trim().is_empty());

        let dropped_sections = self.fit_to_budget(&mut sections);

        let text = sections
            .iter()
            .map(|s| format!("## {}\n{}", s.title, s.body.trim()))
            .collect::<Vec<_>>()
            .join("\n\n");

        debug!(
            chars = text.chars().count(),
            sections = sections.len(),
            dropped = dropped_sections.len(),
            %version,
            "Assembled context"
        );

        Ok(AssembledContext {
            text,
            guide,
            character_context,
            outline,
            state_version: version,
            dropped_sections,
        })
    }

    /// Drop whole sections, lowest priority first, until the total fits.
    fn fit_to_budget(&self, sections: &mut Vec<Section>) -> Vec<String> {
        let mut dropped = Vec::new();
        let mut total: usize = sections.iter().map(Section::rendered_len).sum();

        while total > self.max_context_chars {
            let Some((index, _)) = sections
                .iter()
                .enumerate()
                .filter(|(_, s)| s.priority != REQUIRED)
                .min_by_key(|(_, s)| s.priority)
            else {
                warn!(
                    chars = total,
                    budget = self.max_context_chars,
                    "Required context sections exceed the budget"
                );
                break;
            };
            let section = sections.remove(index);
            total -= section.rendered_len();
            dropped.push(section.title.to_string());
        }

        dropped
    }
}

fn render_summary(state: &ProjectState) -> String {
    let mut out = state.rolling_summary.render();
    if !state.open_loops.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str("Open loops:\n");
        out.push_str(
            &state
                .open_loops
                .iter()
                .map(|l| format!("- {}", l))
                .collect::<Vec<_>>()
                .join("\n"),
        );
    }
    out
}

fn cached_section(
    cache: &mut ContextCache,
    project_id: &str,
    context_type: ContextType,
    chapter: u32,
    version: StateVersion,
    build: impl FnOnce() -> String,
) -> String {
    let key = CacheKey::new(project_id, context_type, chapter);
    if let Some(entry) = cache.get(&key, version) {
        return entry.content().clone();
    }
    let content = build();
    cache.set(key, content.clone(), version);
    content
}
