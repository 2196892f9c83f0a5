//! Layered configuration for the chapter pipeline.
//!
//! Sources in order of precedence (later sources override earlier):
//! 1. Bundled defaults (`serialist.toml` shipped with the library)
//! 2. User config in the home directory (`~/.config/serialist/serialist.toml`)
//! 3. User config in the current directory (`./serialist.toml`)
//!
//! User config files are optional and silently skipped if not found. Every
//! field has a serde default, so a file only needs the keys it overrides.

use config::{Config, File, FileFormat};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use serialist_cache::ContextCacheConfig;
use serialist_error::{ConfigError, ConfigErrorKind, SerialistError, SerialistResult};
use serialist_quality::QualityConfig;
use serialist_retry::RetryPolicy;
use serialist_story::PlotContextConfig;
use tracing::{debug, instrument};

/// Sampling settings for one pipeline stage.
#[derive(
    Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_")]
pub struct StageSettings {
    /// Sampling temperature, 0.0 to 2.0
    temperature: f32,
    /// Output token limit
    max_tokens: u32,
}

impl StageSettings {
    /// Create stage settings.
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

/// Stage budgets and feature switches for chapter generation.
///
/// # Examples
///
/// ```
/// use serialist_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::default().with_max_rewrite_attempts(3_usize);
/// assert_eq!(*config.max_rewrite_attempts(), 3);
/// assert!(*config.enable_planning());
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct PipelineConfig {
    /// Ask for a scene plan before drafting
    #[serde(default = "default_enable_planning")]
    enable_planning: bool,

    /// Self-review rounds after the draft
    #[serde(default = "default_max_self_review_attempts")]
    max_self_review_attempts: usize,

    /// Rewrites allowed while quick QC fails
    #[serde(default = "default_max_rewrite_attempts")]
    max_rewrite_attempts: usize,

    /// Run the model-based quality checks after the quick gate
    #[serde(default)]
    enable_full_qc: bool,

    /// Attempt one repair when full QC fails
    #[serde(default = "default_enable_repair")]
    enable_repair: bool,

    /// Character snapshots included in the context
    #[serde(default = "default_active_character_limit")]
    active_character_limit: usize,

    /// Upper bound on assembled context length (characters)
    #[serde(default = "default_max_context_chars")]
    max_context_chars: usize,

    /// Open loops kept after a summary update
    #[serde(default = "default_max_open_loops")]
    max_open_loops: usize,

    /// Scene planning call
    #[serde(default = "default_plan_stage")]
    plan: StageSettings,

    /// Drafting call
    #[serde(default = "default_draft_stage")]
    draft: StageSettings,

    /// Self-review call
    #[serde(default = "default_review_stage")]
    review: StageSettings,

    /// Rewrite and repair calls
    #[serde(default = "default_rewrite_stage")]
    rewrite: StageSettings,

    /// Character, plot and timeline extraction calls
    #[serde(default = "default_extraction_stage")]
    extraction: StageSettings,

    /// Summary update call
    #[serde(default = "default_summary_stage")]
    summary: StageSettings,
}

fn default_enable_planning() -> bool {
    true
}

fn default_max_self_review_attempts() -> usize {
    2
}

fn default_max_rewrite_attempts() -> usize {
    2
}

fn default_enable_repair() -> bool {
    true
}

fn default_active_character_limit() -> usize {
    8
}

fn default_max_context_chars() -> usize {
    24_000
}

fn default_max_open_loops() -> usize {
    12
}

fn default_plan_stage() -> StageSettings {
    StageSettings::new(0.7, 1024)
}

fn default_draft_stage() -> StageSettings {
    StageSettings::new(0.85, 8192)
}

fn default_review_stage() -> StageSettings {
    StageSettings::new(0.2, 1024)
}

fn default_rewrite_stage() -> StageSettings {
    StageSettings::new(0.75, 8192)
}

fn default_extraction_stage() -> StageSettings {
    StageSettings::new(0.1, 2048)
}

fn default_summary_stage() -> StageSettings {
    StageSettings::new(0.3, 2048)
}

impl Default for StageSettings {
    fn default() -> Self {
        default_draft_stage()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_planning: default_enable_planning(),
            max_self_review_attempts: default_max_self_review_attempts(),
            max_rewrite_attempts: default_max_rewrite_attempts(),
            enable_full_qc: false,
            enable_repair: default_enable_repair(),
            active_character_limit: default_active_character_limit(),
            max_context_chars: default_max_context_chars(),
            max_open_loops: default_max_open_loops(),
            plan: default_plan_stage(),
            draft: default_draft_stage(),
            review: default_review_stage(),
            rewrite: default_rewrite_stage(),
            extraction: default_extraction_stage(),
            summary: default_summary_stage(),
        }
    }
}

impl PipelineConfig {
    /// Stage settings paired with their names, for validation and display.
    pub fn stages(&self) -> [(&'static str, &StageSettings); 6] {
        [
            ("plan", &self.plan),
            ("draft", &self.draft),
            ("review", &self.review),
            ("rewrite", &self.rewrite),
            ("extraction", &self.extraction),
            ("summary", &self.summary),
        ]
    }
}

/// Complete pipeline configuration.
#[derive(
    Debug, Clone, PartialEq, Default, Serialize, Deserialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_")]
pub struct SerialistConfig {
    /// Stage budgets and feature switches
    #[serde(default)]
    pipeline: PipelineConfig,
    /// Quality check thresholds
    #[serde(default)]
    quality: QualityConfig,
    /// Context cache settings
    #[serde(default)]
    cache: ContextCacheConfig,
    /// Model call retry policy
    #[serde(default)]
    retry: RetryPolicy,
    /// Plot context limits
    #[serde(default)]
    plot: PlotContextConfig,
}

impl SerialistConfig {
    /// Load configuration from a specific file, on top of field defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// result fails [`validate`](Self::validate).
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> SerialistResult<Self> {
        debug!("Loading configuration from file");

        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                SerialistError::from(ConfigError::new(ConfigErrorKind::Load(format!(
                    "{}: {}",
                    path.as_ref().display(),
                    e
                ))))
            })?
            .try_deserialize()
            .map_err(|e| {
                SerialistError::from(ConfigError::new(ConfigErrorKind::Parse(e.to_string())))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: current dir > home dir > bundled
    /// defaults.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use serialist_pipeline::SerialistConfig;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = SerialistConfig::load()?;
    /// println!("{}", config.pipeline().max_rewrite_attempts());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be parsed or the merged
    /// configuration is invalid.
    #[instrument]
    pub fn load() -> SerialistResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../serialist.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/serialist/serialist.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("serialist").required(false));

        let config: Self = builder
            .build()
            .map_err(|e| {
                SerialistError::from(ConfigError::new(ConfigErrorKind::Load(e.to_string())))
            })?
            .try_deserialize()
            .map_err(|e| {
                SerialistError::from(ConfigError::new(ConfigErrorKind::Parse(e.to_string())))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first offending value.
    pub fn validate(&self) -> SerialistResult<()> {
        if *self.pipeline.max_context_chars() == 0 {
            return Err(ConfigError::invalid_value("pipeline.max_context_chars", "must be positive").into());
        }
        for (name, stage) in self.pipeline.stages() {
            if !(0.0..=2.0).contains(stage.temperature()) {
                return Err(ConfigError::invalid_value(
                    format!("pipeline.{}.temperature", name),
                    format!("must be between 0 and 2, got {}", stage.temperature()),
                )
                .into());
            }
            if *stage.max_tokens() == 0 {
                return Err(
                    ConfigError::invalid_value(format!("pipeline.{}.max_tokens", name), "must be positive")
                        .into(),
                );
            }
        }
        if self.quality.min_body_chars() >= self.quality.max_body_chars() {
            return Err(ConfigError::invalid_value(
                "quality.min_body_chars",
                format!(
                    "({}) must be below quality.max_body_chars ({})",
                    self.quality.min_body_chars(),
                    self.quality.max_body_chars()
                ),
            )
            .into());
        }
        if *self.retry.timeout_secs() == 0 {
            return Err(ConfigError::invalid_value("retry.timeout_secs", "must be positive").into());
        }
        if *self.cache.enabled() && *self.cache.max_size() == 0 {
            return Err(ConfigError::invalid_value("cache.max_size", "must be positive when caching is enabled").into());
        }
        Ok(())
    }
}
