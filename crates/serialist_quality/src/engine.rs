//! Quality control engine.

use crate::{QcContext, QcDimension, QcIssue, QcResult, QualityConfig, RuleSet, Severity};
use serde::Deserialize;
use serialist_core::GenerateRequest;
use serialist_error::SerialistResult;
use serialist_interface::TextGenerator;
use serialist_story::{parse_lenient_list, parse_model_payload};
use std::collections::BTreeMap;
use std::sync::Arc;

const CHECK_SYSTEM_PROMPT: &str = "You are a meticulous fiction editor reviewing one chapter of a \
serialized novel. Judge only what you are asked about. Respond with JSON only.";

const CHECK_RESPONSE_FORMAT: &str = r#"Respond with JSON:
{"score": <0-100>, "issues": [{"type": "<short_label>", "severity": "critical|major|minor", "description": "...", "suggestion": "..."}]}
Use "critical" only for problems that make the chapter unusable."#;

const CHECK_TEMPERATURE: f32 = 0.2;
const CHECK_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Deserialize)]
struct ModelIssue {
    #[serde(default = "default_issue_type", alias = "type")]
    issue_type: String,
    severity: Severity,
    description: String,
    #[serde(default)]
    suggestion: Option<String>,
}

fn default_issue_type() -> String {
    "model_finding".to_string()
}

/// Score and findings from one model-based dimension.
#[derive(Debug)]
struct Verdict {
    score: f64,
    issues: Vec<QcIssue>,
}

/// Runs rule checks and, when a checker model is attached, model checks.
///
/// # Example
///
/// ```
/// use serialist_quality::{QcContext, QualityConfig, QualityControlEngine};
///
/// let engine = QualityControlEngine::new(QualityConfig::default()).unwrap();
/// let result = engine.run_quick_qc("Chapter 1\n\nToo short.", &QcContext::for_chapter(1, 40));
///
/// assert!(!result.passed);
/// assert_eq!(result.first_failure().unwrap().issue_type, "too_short");
/// ```
#[derive(Clone)]
pub struct QualityControlEngine {
    rules: RuleSet,
    checker: Option<Arc<dyn TextGenerator>>,
}

impl std::fmt::Debug for QualityControlEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityControlEngine")
            .field("rules", &self.rules)
            .field("checker", &self.checker.as_ref().map(|c| c.model_name().to_string()))
            .finish()
    }
}

impl QualityControlEngine {
    /// Create a rule-only engine.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured pattern is not a valid regex.
    pub fn new(config: QualityConfig) -> SerialistResult<Self> {
        Ok(Self {
            rules: RuleSet::new(config)?,
            checker: None,
        })
    }

    /// Attach the model used for the character, pacing and goal checks.
    pub fn with_checker(mut self, checker: Arc<dyn TextGenerator>) -> Self {
        self.checker = Some(checker);
        self
    }

    /// Compiled rules.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    fn rule_issues(&self, text: &str, ctx: &QcContext) -> Vec<QcIssue> {
        let mut issues = self.rules.check_ending(text, *ctx.is_final());
        issues.extend(self.rules.check_structure(text));
        issues.extend(self.rules.check_literary(text));
        issues
    }

    /// Rule-only check used inside rewrite loops. Gates at major.
    #[tracing::instrument(skip(self, text, ctx), fields(chapter = ctx.chapter_index(), chars = text.len()))]
    pub fn run_quick_qc(&self, text: &str, ctx: &QcContext) -> QcResult {
        let issues = self.rule_issues(text, ctx);
        let result = QcResult::evaluate(
            issues,
            Severity::Major,
            BTreeMap::new(),
            model_dimensions().collect(),
        );
        tracing::debug!(passed = result.passed, score = result.score, issues = result.issues.len(), "Quick QC finished");
        result
    }

    /// Rule checks plus the three model checks, run concurrently. Gates at
    /// critical.
    ///
    /// A model check that fails or does not apply is skipped and its
    /// dimension scores 100.
    #[tracing::instrument(skip(self, text, ctx), fields(chapter = ctx.chapter_index(), chars = text.len()))]
    pub async fn run_full_qc(&self, text: &str, ctx: &QcContext) -> QcResult {
        let mut issues = self.rule_issues(text, ctx);
        let mut overrides = BTreeMap::new();
        let mut skipped = Vec::new();

        match &self.checker {
            None => {
                tracing::debug!("No checker model attached, skipping model checks");
                skipped.extend(model_dimensions());
            }
            Some(checker) => {
                let (character, pacing, goal) = tokio::join!(
                    self.model_check(checker.as_ref(), QcDimension::Character, text, ctx),
                    self.model_check(checker.as_ref(), QcDimension::Pacing, text, ctx),
                    self.model_check(checker.as_ref(), QcDimension::Goal, text, ctx),
                );

                for (dimension, outcome) in [
                    (QcDimension::Character, character),
                    (QcDimension::Pacing, pacing),
                    (QcDimension::Goal, goal),
                ] {
                    match outcome {
                        Ok(Some(verdict)) => {
                            tracing::debug!(%dimension, score = verdict.score, issues = verdict.issues.len(), "Model check finished");
                            overrides.insert(dimension, verdict.score);
                            issues.extend(verdict.issues);
                        }
                        Ok(None) => {
                            tracing::debug!(%dimension, "Model check not applicable");
                            skipped.push(dimension);
                        }
                        Err(e) => {
                            tracing::warn!(%dimension, error = %e, "Model check failed, skipping dimension");
                            skipped.push(dimension);
                        }
                    }
                }
            }
        }

        let result = QcResult::evaluate(issues, Severity::Critical, overrides, skipped);
        tracing::info!(
            passed = result.passed,
            score = result.score,
            issues = result.issues.len(),
            skipped = result.skipped.len(),
            "Full QC finished"
        );
        result
    }

    async fn model_check(
        &self,
        checker: &dyn TextGenerator,
        dimension: QcDimension,
        text: &str,
        ctx: &QcContext,
    ) -> SerialistResult<Option<Verdict>> {
        let Some(question) = check_question(dimension, ctx) else {
            return Ok(None);
        };

        let request = GenerateRequest::builder()
            .system(CHECK_SYSTEM_PROMPT)
            .prompt(format!(
                "Chapter {} of {}:\n\n{}\n\n{}\n\n{}",
                ctx.chapter_index(),
                ctx.total_chapters(),
                text,
                question,
                CHECK_RESPONSE_FORMAT
            ))
            .temperature(CHECK_TEMPERATURE)
            .max_tokens(CHECK_MAX_TOKENS)
            .build()?;

        let response = checker.generate(&request).await?;
        let payload = parse_model_payload(&response)?;

        let issues: Vec<QcIssue> = parse_lenient_list::<ModelIssue>(payload.get("issues"), "issues")
            .into_iter()
            .map(|i| QcIssue {
                issue_type: i.issue_type,
                dimension,
                severity: i.severity,
                description: i.description,
                suggestion: i.suggestion,
            })
            .collect();

        let score = payload
            .get("score")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or_else(|| 100.0 - issues.iter().map(|i| i.severity.deduction()).sum::<f64>())
            .clamp(0.0, 100.0);

        Ok(Some(Verdict { score, issues }))
    }
}

fn model_dimensions() -> impl Iterator<Item = QcDimension> {
    [QcDimension::Character, QcDimension::Pacing, QcDimension::Goal].into_iter()
}

/// The question for a model dimension, or None when the context lacks what
/// the check needs.
fn check_question(dimension: QcDimension, ctx: &QcContext) -> Option<String> {
    match dimension {
        QcDimension::Character if !ctx.character_context().trim().is_empty() => Some(format!(
            "Character state before this chapter:\n{}\n\nDo the characters act consistently with this state (location, condition, knowledge, relationships)?",
            ctx.character_context()
        )),
        QcDimension::Pacing => ctx.pacing_target().map(|target| {
            let kind = ctx
                .pacing_type()
                .map(|t| format!(" ({})", t))
                .unwrap_or_default();
            format!(
                "The planned tension for this chapter is {:.1}/10{}. Does the chapter's pacing match it?",
                target, kind
            )
        }),
        QcDimension::Goal => ctx.goal().as_ref().map(|goal| {
            format!("The chapter's outline goal is: {}\nDoes the chapter achieve it?", goal)
        }),
        _ => None,
    }
}
