//! Rule-based chapter checks.

use crate::{QcDimension, QcIssue, QualityConfig, Severity};
use regex::Regex;
use serialist_error::{ConfigError, ConfigErrorKind, SerialistResult};

const FINALE_PATTERNS: &[&str] = &[
    r"(?i)\bthe end\b[\s.!]*$",
    r"(?i)\bend of (the )?(book|story|series|volume|saga)\b",
    r"(?i)\bepilogue\b",
    r"(?i)\bhappily ever after\b",
    r"(?i)\bthe (story|saga|journey|tale) (ends|is over|has ended|comes to an end)\b",
    r"(?i)\bto be concluded\b",
];

const TIME_SKIP_PATTERN: &str = r"(?i)\b(unnoticed,? )?(days|weeks|months|years) (passed|went by|slipped by|flew by)\b|\b(several|many|a few|countless) (days|weeks|months|years) later\b|\btime passed\b";

const MORALIZING_PATTERN: &str = r"(?i)\b(learned|learnt) (a|an|the|her|his|their) (valuable |important )?lesson\b|\b(realized|realised|understood) that (life|true|real|the true|the real)\b|\bthe moral\b|\bin the end,? (what|it) (mattered|matters)\b|\bthe (true )?meaning of (life|friendship|love|courage)\b|\btrue strength (comes|lies)\b";

const SENSORY_PATTERN: &str = r"(?i)\b(smell\w*|scent\w*|stench|taste\w*|sound\w*|nois\w+|cold|chill\w*|warm\w*|heat|rough|smooth|bitter|sweet|sour|salt\w*|damp|wet|glint\w*|gleam\w*|shadow\w*|light|dark\w*|echo\w*|whisper\w*|creak\w*|roar\w*|hum\w*|rustl\w*|sting\w*|ach\w+|sharp|soft|bright|dim|musk\w*|smok\w*)\b";

const DIALOGUE_PATTERN: &str = r#""[^"\n]*"|“[^”\n]*”|「[^」\n]*」"#;

const TITLE_PATTERN: &str = r"(?i)^(#+\s*\S|chapter\s+\w+|ch\.?\s*\d+)";

/// Words outside quotes that still count as a dialogue-only line (tags such
/// as "she said").
const MAX_TAG_WORDS: usize = 3;

fn compile(pattern: &str) -> SerialistResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| {
            ConfigError::new(ConfigErrorKind::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
            .into()
        })
}

/// Compiled rule checks.
#[derive(Debug, Clone)]
pub struct RuleSet {
    config: QualityConfig,
    finale: Vec<Regex>,
    time_skip: Regex,
    moralizing: Regex,
    sensory: Regex,
    dialogue: Regex,
    title: Regex,
}

impl RuleSet {
    /// Compile the built-in rules plus the configured finale patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured pattern is not a valid regex.
    pub fn new(config: QualityConfig) -> SerialistResult<Self> {
        let finale = FINALE_PATTERNS
            .iter()
            .copied()
            .chain(config.extra_finale_patterns().iter().map(String::as_str))
            .map(compile)
            .collect::<SerialistResult<Vec<_>>>()?;

        Ok(Self {
            finale,
            time_skip: compile(TIME_SKIP_PATTERN)?,
            moralizing: compile(MORALIZING_PATTERN)?,
            sensory: compile(SENSORY_PATTERN)?,
            dialogue: compile(DIALOGUE_PATTERN)?,
            title: compile(TITLE_PATTERN)?,
            config,
        })
    }

    /// Thresholds in use.
    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Premature-ending check. Final chapters are exempt.
    pub fn check_ending(&self, text: &str, is_final: bool) -> Vec<QcIssue> {
        if is_final {
            return Vec::new();
        }
        let trimmed = text.trim_end();
        self.finale
            .iter()
            .find_map(|re| re.find(trimmed))
            .map(|m| {
                vec![
                    QcIssue::new(
                        QcDimension::Ending,
                        "premature_ending",
                        Severity::Critical,
                        format!(
                            "Chapter reads like the end of the story (\"{}\") but more chapters follow",
                            m.as_str().trim()
                        ),
                    )
                    .with_suggestion("Remove the finale phrasing and close on an open hook"),
                ]
            })
            .unwrap_or_default()
    }

    /// Length, title, dialogue density and paragraph count.
    pub fn check_structure(&self, text: &str) -> Vec<QcIssue> {
        let mut issues = Vec::new();
        let body = text.trim();
        let chars = body.chars().count();

        if chars < *self.config.min_body_chars() {
            issues.push(
                QcIssue::new(
                    QcDimension::Structure,
                    "too_short",
                    Severity::Major,
                    format!(
                        "Chapter is too short: {} characters, minimum {}",
                        chars, *self.config.min_body_chars()
                    ),
                )
                .with_suggestion("Expand scenes with action, dialogue and sensory detail"),
            );
        } else if chars > *self.config.max_body_chars() {
            issues.push(QcIssue::new(
                QcDimension::Structure,
                "too_long",
                Severity::Minor,
                format!(
                    "Chapter is too long: {} characters, maximum {}",
                    chars, *self.config.max_body_chars()
                ),
            ));
        }

        if !self.has_title(body) {
            issues.push(
                QcIssue::new(
                    QcDimension::Structure,
                    "missing_title",
                    Severity::Minor,
                    "Chapter does not start with a title line",
                )
                .with_suggestion("Start with a line such as \"Chapter 12: The Flooded Archive\""),
            );
        }

        if chars > 0 {
            let ratio = self.dialogue_chars(body) as f64 / chars as f64;
            if ratio < *self.config.min_dialogue_ratio() {
                issues.push(QcIssue::new(
                    QcDimension::Structure,
                    "low_dialogue",
                    Severity::Minor,
                    format!(
                        "Dialogue makes up {:.1}% of the chapter, minimum {:.1}%",
                        ratio * 100.0,
                        *self.config.min_dialogue_ratio() * 100.0
                    ),
                ));
            }
        }

        let paragraphs = paragraphs(body).len();
        if paragraphs < *self.config.min_paragraphs() {
            issues.push(QcIssue::new(
                QcDimension::Structure,
                "too_few_paragraphs",
                Severity::Major,
                format!(
                    "Chapter has {} paragraphs, minimum {}",
                    paragraphs, *self.config.min_paragraphs()
                ),
            ));
        }

        issues
    }

    /// Prose-texture heuristics. Every finding is minor.
    pub fn check_literary(&self, text: &str) -> Vec<QcIssue> {
        let mut issues = Vec::new();
        let body = text.trim();
        let paras = paragraphs(body);

        let bland = paras
            .iter()
            .filter(|p| {
                p.chars().count() > *self.config.bland_paragraph_chars()
                    && !self.sensory.is_match(p)
                    && !self.dialogue.is_match(p)
            })
            .count();
        if bland > 0 {
            issues.push(
                QcIssue::new(
                    QcDimension::Structure,
                    "bland_prose",
                    Severity::Minor,
                    format!("{} long paragraph(s) have no sensory detail or dialogue", bland),
                )
                .with_suggestion("Ground long passages in sight, sound, smell or touch"),
            );
        }

        if let Some(m) = self.time_skip.find(body) {
            issues.push(
                QcIssue::new(
                    QcDimension::Structure,
                    "time_skip_summary",
                    Severity::Minor,
                    format!("Summarizing time skip: \"{}\"", m.as_str()),
                )
                .with_suggestion("Dramatize the interval or cut to the next scene"),
            );
        }

        let closing = tail_chars(body, *self.config.closing_window_chars());
        if let Some(m) = self.moralizing.find(closing) {
            issues.push(
                QcIssue::new(
                    QcDimension::Structure,
                    "moralizing_closing",
                    Severity::Minor,
                    format!("Closing lines moralize: \"{}\"", m.as_str()),
                )
                .with_suggestion("End on an image, action or hook instead of a lesson"),
            );
        }

        let longest_run = self.longest_dialogue_run(&paras);
        if longest_run >= *self.config.dialogue_run_limit() {
            issues.push(
                QcIssue::new(
                    QcDimension::Structure,
                    "dialogue_run",
                    Severity::Minor,
                    format!("{} consecutive dialogue lines without an action beat", longest_run),
                )
                .with_suggestion("Break long exchanges with gestures or movement"),
            );
        }

        let long = paras
            .iter()
            .filter(|p| p.chars().count() > *self.config.long_paragraph_chars())
            .count();
        if long >= *self.config.max_long_paragraphs() {
            issues.push(QcIssue::new(
                QcDimension::Structure,
                "long_paragraphs",
                Severity::Minor,
                format!(
                    "{} paragraphs exceed {} characters",
                    long, *self.config.long_paragraph_chars()
                ),
            ));
        }

        issues
    }

    fn has_title(&self, body: &str) -> bool {
        let Some(first) = body.lines().map(str::trim).find(|l| !l.is_empty()) else {
            return false;
        };
        if self.title.is_match(first) {
            return true;
        }
        // A short line without closing punctuation reads as a bare title
        first.chars().count() <= 60
            && !first.ends_with(['.', '!', '?', '"', '”', ',', '…'])
    }

    fn dialogue_chars(&self, body: &str) -> usize {
        self.dialogue
            .find_iter(body)
            .map(|m| m.as_str().chars().count())
            .sum()
    }

    fn is_dialogue_only(&self, line: &str) -> bool {
        let line = line.trim();
        if !line.starts_with(['"', '“', '「']) {
            return false;
        }
        let outside = self.dialogue.replace_all(line, " ");
        outside.split_whitespace().count() <= MAX_TAG_WORDS
    }

    fn longest_dialogue_run(&self, paras: &[&str]) -> usize {
        let mut longest = 0;
        let mut current = 0;
        for para in paras {
            if self.is_dialogue_only(para) {
                current += 1;
                longest = longest.max(current);
            } else {
                current = 0;
            }
        }
        longest
    }
}

/// Non-empty lines after the title line.
fn paragraphs(body: &str) -> Vec<&str> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .skip(1)
        .collect()
}

fn tail_chars(text: &str, count: usize) -> &str {
    let total = text.chars().count();
    if total <= count {
        return text;
    }
    let start = text
        .char_indices()
        .nth(total - count)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &text[start..]
}
