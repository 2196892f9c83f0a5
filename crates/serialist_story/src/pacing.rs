//! Three-act tension curves and per-chapter pacing guides.

use serde::{Deserialize, Serialize};
use serialist_error::{PipelineError, PipelineErrorKind, SerialistResult};
use std::f64::consts::PI;

/// Largest tension change allowed between consecutive chapters.
pub const MAX_PACING_STEP: f64 = 2.5;

/// Tension used for chapters outside every planned volume.
const DEFAULT_TENSION: f64 = 5.0;

/// Tension at or below which a chapter is a transition chapter.
const TRANSITION_TENSION: f64 = 3.0;

/// Consecutive chapters inspected by the balance check, current included.
const BALANCE_WINDOW: usize = 4;

/// Pacing category derived from a tension value.
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PacingType {
    /// Breathing room between arcs
    Transition,
    /// Character-driven, reflective
    Emotional,
    /// Stakes being set up
    Buildup,
    /// Pressure mounting
    Tension,
    /// Open confrontation
    Action,
    /// Peak of an arc
    Climax,
}

impl PacingType {
    /// Categorise a tension value on the 1 to 10 scale.
    pub fn from_tension(tension: f64) -> Self {
        match tension {
            t if t <= TRANSITION_TENSION => PacingType::Transition,
            t if t < 4.5 => PacingType::Emotional,
            t if t < 6.0 => PacingType::Buildup,
            t if t < 7.5 => PacingType::Tension,
            t if t < 9.0 => PacingType::Action,
            _ => PacingType::Climax,
        }
    }

    fn is_high(&self) -> bool {
        matches!(self, PacingType::Action | PacingType::Climax | PacingType::Tension)
    }

    fn is_low(&self) -> bool {
        matches!(self, PacingType::Emotional | PacingType::Transition)
    }
}

/// Tension curve for one volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumePacingCurve {
    /// Zero-based volume index
    pub volume_index: u32,
    /// First chapter, inclusive
    pub start_chapter: u32,
    /// Last chapter, inclusive
    pub end_chapter: u32,
    /// One tension value per chapter
    pub pacing_curve: Vec<f64>,
    /// Offset of the first maximum within the curve
    pub volume_climax_offset: usize,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Position of `j` within a segment of `len` points, from 0.0 to 1.0.
fn progress(j: usize, len: usize) -> f64 {
    if len <= 1 {
        0.0
    } else {
        j as f64 / (len - 1) as f64
    }
}

fn first_max_offset(curve: &[f64]) -> usize {
    curve
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |(best_i, best), (i, &v)| {
            if v > best { (i, v) } else { (best_i, best) }
        })
        .0
}

impl VolumePacingCurve {
    /// Plan the three-act curve for chapters `start..=end`.
    ///
    /// Act 1 ramps from 2 to 5. Act 2 rises from 4 to 8 with a three-cycle
    /// wobble held inside [4, 8]. Act 3 climbs to the peak over its first
    /// 70% and then falls to 6.
    pub fn plan(volume_index: u32, start_chapter: u32, end_chapter: u32) -> Self {
        let n = end_chapter.saturating_sub(start_chapter) as usize + 1;
        let act1 = (n as f64 * 0.25).round() as usize;
        let act2 = ((n as f64 * 0.5).round() as usize).min(n - act1);
        let act3 = n - act1 - act2;

        let mut curve = Vec::with_capacity(n);
        for j in 0..act1 {
            curve.push(2.0 + 3.0 * progress(j, act1));
        }
        for j in 0..act2 {
            let t = progress(j, act2);
            let wobble = 1.5 * (2.0 * PI * 3.0 * t).sin();
            curve.push((4.0 + 4.0 * t + wobble).clamp(4.0, 8.0));
        }
        let climb = ((act3 as f64) * 0.7).ceil() as usize;
        let fall = act3 - climb;
        for j in 0..climb {
            curve.push((8.0 + 2.5 * progress(j, climb)).min(10.0));
        }
        let peak = curve.last().copied().unwrap_or(DEFAULT_TENSION);
        for k in 1..=fall {
            curve.push(peak - (peak - 6.0) * k as f64 / fall as f64);
        }

        let pacing_curve: Vec<f64> = curve.into_iter().map(|v| round1(v.clamp(1.0, 10.0))).collect();
        let volume_climax_offset = first_max_offset(&pacing_curve);

        tracing::debug!(
            volume_index,
            start_chapter,
            end_chapter,
            volume_climax_offset,
            "Planned volume pacing curve"
        );

        Self {
            volume_index,
            start_chapter,
            end_chapter,
            pacing_curve,
            volume_climax_offset,
        }
    }

    /// Whether `chapter` falls inside this volume.
    pub fn contains(&self, chapter: u32) -> bool {
        (self.start_chapter..=self.end_chapter).contains(&chapter)
    }

    /// Raw tension for `chapter`, if it belongs to this volume.
    pub fn tension_at(&self, chapter: u32) -> Option<f64> {
        if !self.contains(chapter) {
            return None;
        }
        self.pacing_curve
            .get((chapter - self.start_chapter) as usize)
            .copied()
    }

    /// Chapter number of the volume climax.
    pub fn climax_chapter(&self) -> u32 {
        self.start_chapter + self.volume_climax_offset as u32
    }
}

/// Result of the advisory pacing balance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCheck {
    /// False when the recent run is monotonous
    pub balanced: bool,
    /// What to do about it
    pub suggestion: Option<String>,
}

/// Tension plan for the whole story, one curve per volume.
///
/// # Examples
///
/// ```
/// use serialist_story::NarrativeArc;
///
/// let arc = NarrativeArc::plan(40, 1).unwrap();
/// let arc = arc.adjust_chapter(12, 9.0).unwrap();
///
/// assert_eq!(arc.get_chapter_target(12, Some(6.0)), 8.5);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NarrativeArc {
    /// Curves ordered by start chapter
    pub volumes: Vec<VolumePacingCurve>,
    /// Climax chapter of each volume
    #[serde(default)]
    pub climax_chapters: Vec<u32>,
    /// Chapters whose tension is 3 or lower
    #[serde(default)]
    pub transition_chapters: Vec<u32>,
}

fn invalid(message: String) -> serialist_error::SerialistError {
    PipelineError::new(PipelineErrorKind::InvalidInput(message)).into()
}

impl NarrativeArc {
    /// Plan one curve per `(start, end)` range.
    ///
    /// # Errors
    ///
    /// Returns an error if a range is empty, starts at chapter 0, or
    /// overlaps the previous range.
    pub fn build(ranges: &[(u32, u32)]) -> SerialistResult<Self> {
        let mut previous_end = 0;
        let mut volumes = Vec::with_capacity(ranges.len());
        for (index, &(start, end)) in ranges.iter().enumerate() {
            if start == 0 || end < start {
                return Err(invalid(format!("Invalid volume range {}..={}", start, end)));
            }
            if start <= previous_end {
                return Err(invalid(format!(
                    "Volume starting at chapter {} overlaps the previous volume",
                    start
                )));
            }
            previous_end = end;
            volumes.push(VolumePacingCurve::plan(index as u32, start, end));
        }

        let mut arc = Self {
            volumes,
            ..Self::default()
        };
        arc.refresh_derived();
        Ok(arc)
    }

    /// Split `total_chapters` into `volume_count` near-equal volumes and plan
    /// each.
    ///
    /// # Errors
    ///
    /// Returns an error if either count is zero or there are more volumes
    /// than chapters.
    pub fn plan(total_chapters: u32, volume_count: u32) -> SerialistResult<Self> {
        Self::plan_range(1, total_chapters, volume_count)
    }

    /// Split chapters `start..=end` into `volume_count` near-equal volumes
    /// and plan each.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is empty or starts at chapter 0, the
    /// count is zero, or there are more volumes than chapters.
    pub fn plan_range(start: u32, end: u32, volume_count: u32) -> SerialistResult<Self> {
        let total_chapters = if start == 0 || end < start {
            0
        } else {
            end - start + 1
        };
        if total_chapters == 0 || volume_count == 0 || volume_count > total_chapters {
            return Err(invalid(format!(
                "Cannot split chapters {}..={} into {} volumes",
                start, end, volume_count
            )));
        }
        let base = total_chapters / volume_count;
        let extra = total_chapters % volume_count;
        let mut next = start;
        let ranges: Vec<(u32, u32)> = (0..volume_count)
            .map(|i| {
                let len = base + u32::from(i < extra);
                let range = (next, next + len - 1);
                next += len;
                range
            })
            .collect();
        Self::build(&ranges)
    }

    fn refresh_derived(&mut self) {
        self.climax_chapters = self.volumes.iter().map(VolumePacingCurve::climax_chapter).collect();
        self.transition_chapters = self
            .volumes
            .iter()
            .flat_map(|v| {
                v.pacing_curve
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| **t <= TRANSITION_TENSION)
                    .map(move |(i, _)| v.start_chapter + i as u32)
            })
            .collect();
    }

    /// Raw curve tension for `chapter`.
    pub fn tension_at(&self, chapter: u32) -> Option<f64> {
        self.volumes.iter().find_map(|v| v.tension_at(chapter))
    }

    /// Whether `chapter` is a volume climax.
    pub fn is_climax(&self, chapter: u32) -> bool {
        self.climax_chapters.contains(&chapter)
    }

    /// Return a copy with `chapter` set to `tension` (clamped to [1, 10]) and
    /// the derived fields recomputed.
    ///
    /// # Errors
    ///
    /// Returns an error if no volume contains `chapter`.
    pub fn adjust_chapter(&self, chapter: u32, tension: f64) -> SerialistResult<Self> {
        let mut next = self.clone();
        let volume = next
            .volumes
            .iter_mut()
            .find(|v| v.contains(chapter))
            .ok_or_else(|| invalid(format!("Chapter {} is outside the planned arc", chapter)))?;
        let offset = (chapter - volume.start_chapter) as usize;
        if let Some(slot) = volume.pacing_curve.get_mut(offset) {
            *slot = round1(tension.clamp(1.0, 10.0));
        }
        volume.volume_climax_offset = first_max_offset(&volume.pacing_curve);
        next.refresh_derived();
        tracing::info!(chapter, tension, "Adjusted chapter tension");
        Ok(next)
    }

    /// Smoothed tension target for `chapter`.
    ///
    /// The raw curve value is pulled to within [`MAX_PACING_STEP`] of
    /// `previous` when one is given. `previous` is clamped into `[1, 10]`
    /// first; a non-finite value is ignored.
    pub fn get_chapter_target(&self, chapter: u32, previous: Option<f64>) -> f64 {
        let raw = self.tension_at(chapter).unwrap_or(DEFAULT_TENSION);
        let previous = previous
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(1.0, 10.0));
        let target = match previous {
            Some(prev) if (raw - prev).abs() > MAX_PACING_STEP => {
                prev + MAX_PACING_STEP * (raw - prev).signum()
            }
            _ => raw,
        };
        target.clamp(1.0, 10.0)
    }

    /// Flag a monotonous run of pacing types.
    ///
    /// The last three entries of `recent` plus `current` are inspected.
    pub fn check_balance(recent: &[PacingType], current: PacingType) -> BalanceCheck {
        let mut window: Vec<PacingType> = recent
            .iter()
            .rev()
            .take(BALANCE_WINDOW - 1)
            .rev()
            .copied()
            .collect();
        window.push(current);

        let suggestion = if window.len() < BALANCE_WINDOW {
            None
        } else if window.iter().all(|t| *t == current) {
            Some(format!(
                "{} chapters in a row at {} pacing; vary the rhythm",
                BALANCE_WINDOW, current
            ))
        } else if window.iter().all(PacingType::is_high) {
            Some("Sustained high tension; give readers an emotional or transition beat".to_string())
        } else if window.iter().all(PacingType::is_low) {
            Some("Sustained low tension; raise the stakes or introduce conflict".to_string())
        } else {
            None
        };

        BalanceCheck {
            balanced: suggestion.is_none(),
            suggestion,
        }
    }

    /// Build the pacing guide for `chapter`.
    pub fn build_guide(&self, chapter: u32, previous: Option<f64>) -> NarrativeGuide {
        let pacing_target = self.get_chapter_target(chapter, previous);
        let pacing_type = PacingType::from_tension(pacing_target);
        let profile = profile_for(pacing_type);

        let mut scene_requirements: Vec<String> =
            profile.requirements.iter().map(|s| s.to_string()).collect();
        if self.is_climax(chapter) {
            scene_requirements.push("Deliver the volume's central confrontation".to_string());
        }

        NarrativeGuide {
            chapter_index: chapter,
            pacing_target,
            pacing_type,
            emotional_tone: profile.tone.to_string(),
            scene_requirements,
            prohibitions: profile.prohibitions.iter().map(|s| s.to_string()).collect(),
            word_count_range: profile.words,
            pacing_guidance: profile.guidance.to_string(),
        }
    }
}

struct PacingProfile {
    tone: &'static str,
    requirements: &'static [&'static str],
    prohibitions: &'static [&'static str],
    words: (u32, u32),
    guidance: &'static str,
}

fn profile_for(pacing_type: PacingType) -> PacingProfile {
    match pacing_type {
        PacingType::Transition => PacingProfile {
            tone: "calm, reflective",
            requirements: &["Show the aftermath of recent events", "Plant at least one new thread"],
            prohibitions: &["Major battles", "Resolving main plotlines"],
            words: (2000, 3000),
            guidance: "Slow down. Let characters breathe and reposition for what comes next.",
        },
        PacingType::Emotional => PacingProfile {
            tone: "intimate, character-focused",
            requirements: &["A meaningful conversation between key characters", "Reveal an inner conflict"],
            prohibitions: &["Extended action sequences"],
            words: (2000, 3500),
            guidance: "Deepen relationships and motivations; keep external stakes in the background.",
        },
        PacingType::Buildup => PacingProfile {
            tone: "expectant, uneasy",
            requirements: &["Raise the stakes of an active plotline", "Hint at an approaching threat"],
            prohibitions: &["Paying off the main conflict early"],
            words: (2500, 3500),
            guidance: "Set pieces in motion and let pressure accumulate.",
        },
        PacingType::Tension => PacingProfile {
            tone: "tense, suspenseful",
            requirements: &["A setback or complication for the protagonist", "End on an unresolved question"],
            prohibitions: &["Relaxed downtime scenes", "Summarising conflict instead of showing it"],
            words: (2500, 4000),
            guidance: "Tighten scenes and shorten sentences as pressure builds.",
        },
        PacingType::Action => PacingProfile {
            tone: "urgent, kinetic",
            requirements: &["An on-page confrontation", "Consequences that carry forward"],
            prohibitions: &["Long exposition", "Flashbacks that stall momentum"],
            words: (3000, 4000),
            guidance: "Keep momentum high with concrete physical detail and quick exchanges.",
        },
        PacingType::Climax => PacingProfile {
            tone: "intense, decisive",
            requirements: &["Pay off built-up tension", "A decisive choice by the protagonist"],
            prohibitions: &["Introducing new major characters", "Deus ex machina resolutions"],
            words: (3000, 4500),
            guidance: "This is a peak. Everything set up so far should converge here.",
        },
    }
}

/// Per-chapter pacing projection rendered into the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeGuide {
    /// Chapter the guide is for
    pub chapter_index: u32,
    /// Smoothed tension target
    pub pacing_target: f64,
    /// Category of the target
    pub pacing_type: PacingType,
    /// Intended emotional tone
    pub emotional_tone: String,
    /// What the chapter must contain
    pub scene_requirements: Vec<String>,
    /// What the chapter must avoid
    pub prohibitions: Vec<String>,
    /// Suggested word count, inclusive bounds
    pub word_count_range: (u32, u32),
    /// Free-text direction
    pub pacing_guidance: String,
}

impl NarrativeGuide {
    /// Render the guide as a prompt section.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Pacing target: {:.1}/10 ({})\nTone: {}\nLength: {}-{} words\n",
            self.pacing_target,
            self.pacing_type,
            self.emotional_tone,
            self.word_count_range.0,
            self.word_count_range.1
        );
        if !self.scene_requirements.is_empty() {
            out.push_str("Must include:\n");
            for r in &self.scene_requirements {
                out.push_str(&format!("- {}\n", r));
            }
        }
        if !self.prohibitions.is_empty() {
            out.push_str("Avoid:\n");
            for p in &self.prohibitions {
                out.push_str(&format!("- {}\n", p));
            }
        }
        out.push_str(&format!("Guidance: {}", self.pacing_guidance));
        out
    }
}
