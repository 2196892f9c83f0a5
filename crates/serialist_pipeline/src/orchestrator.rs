//! Chapter generation state machine.
//!
//! One call to [`GenerationOrchestrator::generate_chapter`] runs the stages
//! in order:
//!
//! 1. Plan (optional): a scene list prepended to the draft prompt
//! 2. Draft
//! 3. Self-review rounds, each possibly followed by one rewrite
//! 4. Quick QC rounds, each failure followed by one rewrite
//! 5. Terminal quick QC: failure here is fatal and no chapter is produced
//! 6. Full QC and at most one repair (optional)
//! 7. Character, plot and timeline extraction, concurrently
//! 8. Summary update through an ordered list of summarizers
//!
//! Only the draft and the terminal gate can fail the chapter. Every other
//! stage degrades: its failure is logged and the previous value is kept.

use crate::assembler::AssembledContext;
use crate::duplicates::{DuplicateWarning, detect_duplicate_events};
use crate::prompts::{
    CHARACTER_EXTRACTION_SYSTEM, DRAFT_SYSTEM, PLAN_SYSTEM, PLOT_EXTRACTION_SYSTEM,
    REVIEW_SYSTEM, REWRITE_SYSTEM, SUMMARY_SYSTEM, TIMELINE_EXTRACTION_SYSTEM,
    character_extraction_prompt, draft_prompt, plan_prompt, plot_extraction_prompt,
    review_prompt, rewrite_prompt, summary_prompt, timeline_extraction_prompt,
};
use crate::{
    ContextAssembler, Phase, PipelineConfig, PipelineDiagnostics, ProjectState, SelfReview,
    SerialistConfig, StageSettings,
};
use serde::{Deserialize, Serialize};
use serialist_cache::ContextCache;
use serialist_core::GenerateRequest;
use serialist_error::{BuilderError, PipelineError, PipelineErrorKind, SerialistResult};
use serialist_interface::TextGenerator;
use serialist_quality::{QcContext, QcResult, QualityControlEngine};
use serialist_retry::FallbackGenerator;
use serialist_story::{
    CharacterDelta, CharacterStateRegistry, PacingType, PlotAnalysis, PlotGraph, PlotStatus,
    RollingSummary, SummaryUpdate, TimelineState, TimelineUpdate,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Active plot nodes listed in the plot extraction prompt.
const LISTED_ACTIVE_NODES: usize = 30;

/// Inputs for one chapter.
///
/// The project state is taken by value; the updated pieces come back in
/// the [`ChapterOutcome`].
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into), build_fn(private, name = "build_internal"))]
pub struct ChapterRequest {
    /// Project the chapter belongs to, used for cache keys
    pub project_id: String,
    /// Chapter to write, 1-based
    pub chapter_index: u32,
    /// State after the previous chapter
    pub state: ProjectState,
    /// Smoothed tension of the previous chapter
    #[builder(default, setter(strip_option))]
    pub previous_pacing_target: Option<f64>,
    /// Pacing types of the preceding chapters, oldest first
    #[builder(default)]
    pub recent_pacing_types: Vec<PacingType>,
}

impl ChapterRequest {
    /// Create a builder.
    pub fn builder() -> ChapterRequestBuilder {
        ChapterRequestBuilder::default()
    }

    /// Request without pacing history.
    pub fn new(project_id: impl Into<String>, chapter_index: u32, state: ProjectState) -> Self {
        Self {
            project_id: project_id.into(),
            chapter_index,
            state,
            previous_pacing_target: None,
            recent_pacing_types: Vec::new(),
        }
    }
}

impl ChapterRequestBuilder {
    /// Build the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the project id, chapter index or state is missing.
    pub fn build(&self) -> Result<ChapterRequest, BuilderError> {
        self.build_internal()
            .map_err(|e| BuilderError::missing_field(e))
    }
}

/// A finished chapter and the state to persist for the next one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterOutcome {
    /// Chapter written
    pub chapter_index: u32,
    /// Final chapter text
    pub chapter_text: String,
    /// Summary after this chapter
    pub updated_summary: RollingSummary,
    /// Open loops after this chapter
    pub updated_open_loops: Vec<String>,
    /// Character state after this chapter
    pub updated_characters: CharacterStateRegistry,
    /// Plot graph after this chapter
    pub updated_plot: PlotGraph,
    /// Timeline after this chapter
    pub updated_timeline: TimelineState,
    /// Last quality verdict on the final text
    pub qc_result: QcResult,
    /// Whether the text differs from the first draft
    pub was_rewritten: bool,
    /// Rewrites and repairs applied
    pub rewrite_count: usize,
    /// Smoothed tension target used
    pub pacing_target: f64,
    /// Category of the target
    pub pacing_type: PacingType,
    /// Time and calls per stage
    pub diagnostics: PipelineDiagnostics,
}

/// The chapter text in flight and how often it was replaced.
#[derive(Debug)]
struct Draft {
    text: String,
    rewrites: usize,
}

impl Draft {
    fn replace(&mut self, text: String) {
        self.text = text;
        self.rewrites += 1;
    }
}

/// Drives a model through the chapter stages.
///
/// # Example
///
/// ```no_run
/// use serialist_cache::ContextCache;
/// use serialist_interface::TextGenerator;
/// use serialist_pipeline::{ChapterRequest, GenerationOrchestrator, ProjectState, SerialistConfig};
/// use std::sync::Arc;
///
/// # async fn demo(model: Arc<dyn TextGenerator>, state: ProjectState) -> serialist_error::SerialistResult<()> {
/// let config = SerialistConfig::load()?;
/// let orchestrator = GenerationOrchestrator::from_providers(vec![model], &config)?;
/// let mut cache = ContextCache::new(config.cache().clone());
///
/// let outcome = orchestrator
///     .generate_chapter(&mut cache, ChapterRequest::new("saga", 1, state.clone()))
///     .await?;
/// let next = state.with_outcome(&outcome);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GenerationOrchestrator {
    writer: Arc<dyn TextGenerator>,
    analyst: Arc<dyn TextGenerator>,
    summarizers: Vec<Arc<dyn TextGenerator>>,
    quality: QualityControlEngine,
    assembler: ContextAssembler,
    config: PipelineConfig,
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("writer", &self.writer.model_name())
            .field("analyst", &self.analyst.model_name())
            .field(
                "summarizers",
                &self.summarizers.iter().map(|s| s.model_name()).collect::<Vec<_>>(),
            )
            .field("quality", &self.quality)
            .field("config", &self.config)
            .finish()
    }
}

impl GenerationOrchestrator {
    /// Create an orchestrator that uses `writer` for every stage.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured quality pattern is invalid.
    pub fn new(writer: Arc<dyn TextGenerator>, config: &SerialistConfig) -> SerialistResult<Self> {
        let quality = QualityControlEngine::new(config.quality().clone())?.with_checker(writer.clone());
        Ok(Self {
            analyst: writer.clone(),
            summarizers: vec![writer.clone()],
            writer,
            quality,
            assembler: ContextAssembler::new(config.pipeline(), config.plot().clone()),
            config: config.pipeline().clone(),
        })
    }

    /// Create an orchestrator over a fallback chain of providers, first one
    /// primary, sharing the configured retry policy.
    ///
    /// # Errors
    ///
    /// Returns an error if `providers` is empty or the configuration is
    /// invalid.
    pub fn from_providers(
        providers: Vec<Arc<dyn TextGenerator>>,
        config: &SerialistConfig,
    ) -> SerialistResult<Self> {
        config.validate()?;
        let chain = FallbackGenerator::new(providers, config.retry().clone())?;
        Self::new(Arc::new(chain), config)
    }

    /// Use a separate model for review, extraction and model-based QC.
    pub fn with_analyst(mut self, analyst: Arc<dyn TextGenerator>) -> Self {
        self.quality = self.quality.with_checker(analyst.clone());
        self.analyst = analyst;
        self
    }

    /// Summary models, tried in order until one succeeds.
    pub fn with_summarizers(mut self, summarizers: Vec<Arc<dyn TextGenerator>>) -> Self {
        self.summarizers = summarizers;
        self
    }

    /// Stage budgets in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Write one chapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is inconsistent with the project, the
    /// draft call fails after every provider, or the chapter still fails
    /// quick QC after every rewrite.
    #[tracing::instrument(
        skip(self, cache, request),
        fields(project_id = %request.project_id, chapter = request.chapter_index)
    )]
    pub async fn generate_chapter(
        &self,
        cache: &mut ContextCache,
        request: ChapterRequest,
    ) -> SerialistResult<ChapterOutcome> {
        let ChapterRequest {
            project_id,
            chapter_index: chapter,
            state,
            previous_pacing_target,
            recent_pacing_types,
        } = request;
        let total = *state.bible.total_chapters();
        let mut diagnostics = PipelineDiagnostics::new();

        let context = self.assembler.assemble(
            cache,
            &project_id,
            &state,
            chapter,
            previous_pacing_target,
            &recent_pacing_types,
        )?;

        let plan = if *self.config.enable_planning() {
            self.plan(&context, chapter, total, &mut diagnostics).await
        } else {
            None
        };

        let mut draft = self
            .draft(&context, plan.as_deref(), chapter, total, &mut diagnostics)
            .await?;

        self.self_review(&context, &state, chapter, &mut draft, &mut diagnostics)
            .await;

        let qc_context = self.qc_context(&context, chapter, total)?;
        self.quick_qc_rounds(&context, &qc_context, &mut draft, &mut diagnostics)
            .await;

        let started = Instant::now();
        let gate = self.quality.run_quick_qc(&draft.text, &qc_context);
        diagnostics.record(Phase::QuickQc, started.elapsed(), 0);
        if !gate.passed {
            let reason = gate
                .first_failure()
                .map(|issue| issue.description.clone())
                .unwrap_or_else(|| "quality gate failed".to_string());
            error!(%reason, score = gate.score, rewrites = draft.rewrites, "Chapter failed quick QC after all rewrites");
            return Err(PipelineError::new(PipelineErrorKind::QualityGate { chapter, reason }).into());
        }
        info!(score = gate.score, rewrites = draft.rewrites, "Chapter passed quick QC");

        let qc_result = if *self.config.enable_full_qc() {
            self.full_qc(&context, &qc_context, &mut draft, &mut diagnostics)
                .await
        } else {
            gate
        };

        let (updated_characters, updated_plot, updated_timeline) = self
            .extract_state(&state, &draft.text, chapter, total, &mut diagnostics)
            .await;

        let (updated_summary, updated_open_loops) = self
            .update_summary(&state, &draft.text, chapter, &mut diagnostics)
            .await;

        info!(
            chars = draft.text.chars().count(),
            rewrites = draft.rewrites,
            calls = diagnostics.total_calls(),
            elapsed_ms = diagnostics.total_elapsed_ms(),
            "Chapter complete"
        );

        Ok(ChapterOutcome {
            chapter_index: chapter,
            was_rewritten: draft.rewrites > 0,
            rewrite_count: draft.rewrites,
            chapter_text: draft.text,
            updated_summary,
            updated_open_loops,
            updated_characters,
            updated_plot,
            updated_timeline,
            qc_result,
            pacing_target: context.guide.pacing_target,
            pacing_type: context.guide.pacing_type,
            diagnostics,
        })
    }

    /// One model call with a stage's sampling settings. Returns trimmed text.
    async fn call(
        &self,
        model: &dyn TextGenerator,
        system: &str,
        prompt: String,
        stage: &StageSettings,
    ) -> SerialistResult<String> {
        let request = GenerateRequest::builder()
            .system(system)
            .prompt(prompt)
            .temperature(*stage.temperature())
            .max_tokens(*stage.max_tokens())
            .build()?;
        let text = model.generate(&request).await?;
        Ok(text.trim().to_string())
    }

    async fn plan(
        &self,
        context: &AssembledContext,
        chapter: u32,
        total: u32,
        diagnostics: &mut PipelineDiagnostics,
    ) -> Option<String> {
        let started = Instant::now();
        let result = self
            .call(
                self.writer.as_ref(),
                PLAN_SYSTEM,
                plan_prompt(&context.text, chapter, total),
                self.config.plan(),
            )
            .await;
        diagnostics.record(Phase::Plan, started.elapsed(), 1);

        match result {
            Ok(plan) if !plan.is_empty() => {
                debug!(chars = plan.len(), "Scene plan ready");
                Some(plan)
            }
            Ok(_) => {
                warn!("Planner returned nothing, drafting without a plan");
                None
            }
            Err(e) => {
                warn!(error = %e, "Planning failed, drafting without a plan");
                None
            }
        }
    }

    async fn draft(
        &self,
        context: &AssembledContext,
        plan: Option<&str>,
        chapter: u32,
        total: u32,
        diagnostics: &mut PipelineDiagnostics,
    ) -> SerialistResult<Draft> {
        let started = Instant::now();
        let result = self
            .call(
                self.writer.as_ref(),
                DRAFT_SYSTEM,
                draft_prompt(&context.text, plan, chapter, total),
                self.config.draft(),
            )
            .await;
        diagnostics.record(Phase::Draft, started.elapsed(), 1);

        let text = result.inspect_err(|e| error!(error = %e, "Draft failed, no chapter produced"))?;
        if text.is_empty() {
            error!("Draft came back empty, no chapter produced");
            return Err(PipelineError::new(PipelineErrorKind::EmptyResponse("draft".to_string())).into());
        }
        info!(chars = text.chars().count(), planned = plan.is_some(), "Draft complete");
        Ok(Draft { text, rewrites: 0 })
    }

    /// Ask for a revision of `text`. An empty revision is an error.
    async fn rewrite(&self, context: &AssembledContext, text: &str, problems: &str) -> SerialistResult<String> {
        let revised = self
            .call(
                self.writer.as_ref(),
                REWRITE_SYSTEM,
                rewrite_prompt(&context.text, text, problems),
                self.config.rewrite(),
            )
            .await?;
        if revised.is_empty() {
            return Err(PipelineError::new(PipelineErrorKind::EmptyResponse("rewrite".to_string())).into());
        }
        Ok(revised)
    }

    async fn self_review(
        &self,
        context: &AssembledContext,
        state: &ProjectState,
        chapter: u32,
        draft: &mut Draft,
        diagnostics: &mut PipelineDiagnostics,
    ) {
        for attempt in 1..=*self.config.max_self_review_attempts() {
            let started = Instant::now();
            let warnings: Vec<String> = detect_duplicate_events(&draft.text, &state.plot_graph, chapter)
                .iter()
                .map(DuplicateWarning::render)
                .collect();
            if !warnings.is_empty() {
                debug!(attempt, count = warnings.len(), "Draft may repeat recent events");
            }

            let response = self
                .call(
                    self.analyst.as_ref(),
                    REVIEW_SYSTEM,
                    review_prompt(&context.text, &draft.text, &warnings),
                    self.config.review(),
                )
                .await;
            let review = match response {
                Ok(response) => SelfReview::parse_response(&response),
                Err(e) => {
                    diagnostics.record(Phase::SelfReview, started.elapsed(), 1);
                    warn!(attempt, error = %e, "Self-review failed, keeping draft");
                    return;
                }
            };

            if !review.wants_rewrite() {
                diagnostics.record(Phase::SelfReview, started.elapsed(), 1);
                debug!(attempt, "Self-review kept the draft");
                return;
            }

            let revised = self.rewrite(context, &draft.text, &review.render_brief()).await;
            diagnostics.record(Phase::SelfReview, started.elapsed(), 2);
            match revised {
                Ok(text) => {
                    draft.replace(text);
                    info!(attempt, issues = review.issues.len(), "Draft rewritten after self-review");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Self-review rewrite failed, keeping draft");
                    return;
                }
            }
        }
    }

    async fn quick_qc_rounds(
        &self,
        context: &AssembledContext,
        qc_context: &QcContext,
        draft: &mut Draft,
        diagnostics: &mut PipelineDiagnostics,
    ) {
        for attempt in 1..=*self.config.max_rewrite_attempts() {
            let started = Instant::now();
            let result = self.quality.run_quick_qc(&draft.text, qc_context);
            if result.passed {
                diagnostics.record(Phase::QuickQc, started.elapsed(), 0);
                return;
            }

            warn!(
                attempt,
                failures = result.failures().count(),
                reason = result.first_failure().map(|i| i.issue_type.as_str()).unwrap_or_default(),
                "Quick QC failed, rewriting"
            );
            let revised = self.rewrite(context, &draft.text, &result.render_failures()).await;
            diagnostics.record(Phase::QuickQc, started.elapsed(), 1);
            match revised {
                Ok(text) => draft.replace(text),
                Err(e) => {
                    warn!(attempt, error = %e, "QC rewrite failed");
                    return;
                }
            }
        }
    }

    /// Full QC, then one repair if it failed. A repair is kept only if it
    /// still passes quick QC, whose result is then reported.
    async fn full_qc(
        &self,
        context: &AssembledContext,
        qc_context: &QcContext,
        draft: &mut Draft,
        diagnostics: &mut PipelineDiagnostics,
    ) -> QcResult {
        let started = Instant::now();
        let full = self.quality.run_full_qc(&draft.text, qc_context).await;
        let completed_checks = 3 - full.skipped.len().min(3);
        diagnostics.record(Phase::FullQc, started.elapsed(), completed_checks as u32);

        if full.passed || !*self.config.enable_repair() {
            return full;
        }

        let started = Instant::now();
        let repaired = self.rewrite(context, &draft.text, &full.render_failures()).await;
        diagnostics.record(Phase::Repair, started.elapsed(), 1);

        match repaired {
            Ok(text) => {
                let check = self.quality.run_quick_qc(&text, qc_context);
                if check.passed {
                    draft.replace(text);
                    info!(score = check.score, "Repair accepted");
                    check
                } else {
                    warn!(
                        reason = check.first_failure().map(|i| i.issue_type.as_str()).unwrap_or_default(),
                        "Repair failed quick QC, keeping previous text"
                    );
                    full
                }
            }
            Err(e) => {
                warn!(error = %e, "Repair failed, keeping previous text");
                full
            }
        }
    }

    fn qc_context(&self, context: &AssembledContext, chapter: u32, total: u32) -> SerialistResult<QcContext> {
        let mut builder = QcContext::builder();
        builder
            .chapter_index(chapter)
            .total_chapters(total)
            .is_final(chapter >= total)
            .pacing_target(context.guide.pacing_target)
            .pacing_type(context.guide.pacing_type)
            .character_context(context.character_context.clone());
        if let Some(outline) = &context.outline
            && !outline.goal.trim().is_empty()
        {
            builder.goal(outline.goal.clone());
        }
        Ok(builder.build()?)
    }

    /// Run the three extractions concurrently and fold in whichever succeed.
    async fn extract_state(
        &self,
        state: &ProjectState,
        text: &str,
        chapter: u32,
        total: u32,
        diagnostics: &mut PipelineDiagnostics,
    ) -> (CharacterStateRegistry, PlotGraph, TimelineState) {
        let started = Instant::now();
        let (characters, plot, timeline) = tokio::join!(
            self.extract_characters(state, text, chapter),
            self.extract_plot(state, text, chapter),
            self.extract_timeline(state, text, chapter),
        );
        diagnostics.record(Phase::StateExtraction, started.elapsed(), 3);

        let characters = match characters {
            Ok(deltas) => {
                debug!(deltas = deltas.len(), "Character deltas extracted");
                state.characters.apply_deltas(&deltas, chapter)
            }
            Err(e) => {
                warn!(error = %e, "Character extraction failed, keeping previous state");
                state.characters.clone()
            }
        };
        let plot = match plot {
            Ok(analysis) => {
                debug!(
                    nodes = analysis.new_nodes.len(),
                    edges = analysis.new_edges.len(),
                    "Plot analysis extracted"
                );
                state.plot_graph.apply_analysis(&analysis, chapter, total)
            }
            Err(e) => {
                warn!(error = %e, "Plot extraction failed, keeping previous graph");
                state.plot_graph.clone()
            }
        };
        let timeline = match timeline {
            Ok(update) => state.timeline.apply(&update, chapter),
            Err(e) => {
                warn!(error = %e, "Timeline extraction failed, keeping previous timeline");
                state.timeline.clone()
            }
        };

        let report = characters.validate_consistency();
        for issue in &report.issues {
            warn!(character = %issue.character_id, field = ?issue.field, "{}", issue.description);
        }

        (characters, plot, timeline)
    }

    async fn extract_characters(
        &self,
        state: &ProjectState,
        text: &str,
        chapter: u32,
    ) -> SerialistResult<Vec<CharacterDelta>> {
        let snapshots = state.characters.derive_active_snapshots(chapter, usize::MAX);
        let known = CharacterStateRegistry::render_context(&snapshots);
        let response = self
            .call(
                self.analyst.as_ref(),
                CHARACTER_EXTRACTION_SYSTEM,
                character_extraction_prompt(text, chapter, &known),
                self.config.extraction(),
            )
            .await?;
        CharacterDelta::parse_response(&response)
    }

    async fn extract_plot(&self, state: &ProjectState, text: &str, chapter: u32) -> SerialistResult<PlotAnalysis> {
        let active: Vec<String> = state
            .plot_graph
            .nodes()
            .iter()
            .rev()
            .filter(|n| n.status == PlotStatus::Active)
            .take(LISTED_ACTIVE_NODES)
            .map(|n| format!("- [{}] {}", n.id, n.content))
            .collect();
        let active = if active.is_empty() {
            "(none yet)".to_string()
        } else {
            active.join("\n")
        };
        let response = self
            .call(
                self.analyst.as_ref(),
                PLOT_EXTRACTION_SYSTEM,
                plot_extraction_prompt(text, chapter, &active),
                self.config.extraction(),
            )
            .await?;
        PlotAnalysis::parse_response(&response)
    }

    async fn extract_timeline(
        &self,
        state: &ProjectState,
        text: &str,
        chapter: u32,
    ) -> SerialistResult<TimelineUpdate> {
        let response = self
            .call(
                self.analyst.as_ref(),
                TIMELINE_EXTRACTION_SYSTEM,
                timeline_extraction_prompt(text, chapter, &state.timeline.current_marker),
                self.config.extraction(),
            )
            .await?;
        TimelineUpdate::parse_response(&response)
    }

    /// Try each summarizer in order; if all fail, keep the previous summary
    /// and open loops.
    async fn update_summary(
        &self,
        state: &ProjectState,
        text: &str,
        chapter: u32,
        diagnostics: &mut PipelineDiagnostics,
    ) -> (RollingSummary, Vec<String>) {
        let started = Instant::now();
        let max_open_loops = *self.config.max_open_loops();
        let prompt = summary_prompt(
            &state.rolling_summary.render(),
            &state.open_loops,
            text,
            chapter,
            max_open_loops,
        );

        let mut calls = 0;
        let mut updated = None;
        for (position, summarizer) in self.summarizers.iter().enumerate() {
            calls += 1;
            let result = self
                .call(summarizer.as_ref(), SUMMARY_SYSTEM, prompt.clone(), self.config.summary())
                .await
                .and_then(|response| SummaryUpdate::parse_response(&response));
            match result {
                Ok(update) => {
                    debug!(position, open_loops = update.open_loops.len(), "Summary updated");
                    updated = Some(state.rolling_summary.apply(&update, chapter, max_open_loops));
                    break;
                }
                Err(e) => {
                    warn!(
                        position,
                        summarizer = summarizer.model_name(),
                        error = %e,
                        "Summary update failed, trying next summarizer"
                    );
                }
            }
        }
        diagnostics.record(Phase::SummaryUpdate, started.elapsed(), calls);

        updated.unwrap_or_else(|| {
            warn!("Every summarizer failed, keeping previous summary and open loops");
            (state.rolling_summary.clone(), state.open_loops.clone())
        })
    }
}
