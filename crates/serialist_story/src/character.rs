//! Character state registry.

use crate::extraction::{parse_lenient_list, parse_model_payload};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serialist_core::CharacterProfile;
use serialist_error::SerialistResult;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Number of state changes kept per character.
pub const MAX_RECENT_CHANGES: usize = 10;

/// Physical condition of a character.
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CharacterCondition {
    /// No impairment
    #[default]
    Healthy,
    /// Hurt but functional
    MinorInjury,
    /// Seriously hurt
    MajorInjury,
    /// Exhausted or drained
    Weak,
    /// Not conscious
    Unconscious,
}

/// Where the character is and what they carry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhysicalState {
    /// Current location
    pub location: String,
    /// Physical condition
    pub condition: CharacterCondition,
    /// Items carried
    #[serde(default)]
    pub equipment: BTreeSet<String>,
    /// Skills or powers
    #[serde(default)]
    pub abilities: BTreeSet<String>,
    /// Power ranking, for settings that have one
    #[serde(default)]
    pub power_level: Option<String>,
}

/// What the character feels, wants and knows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PsychologicalState {
    /// Current mood
    #[serde(default)]
    pub mood: String,
    /// Current driving motivation
    #[serde(default)]
    pub motivation: String,
    /// Secrets the character knows
    #[serde(default)]
    pub known_secrets: BTreeSet<String>,
    /// Beliefs the character holds
    #[serde(default)]
    pub beliefs: BTreeSet<String>,
    /// Unresolved internal conflict
    #[serde(default)]
    pub inner_conflict: Option<String>,
}

/// How the character stands with others.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SocialState {
    /// Identity known to the world
    #[serde(default)]
    pub public_identity: String,
    /// Concealed identity
    #[serde(default)]
    pub hidden_identity: Option<String>,
    /// Standing with others
    #[serde(default)]
    pub reputation: String,
    /// Current allies
    #[serde(default)]
    pub active_alliances: BTreeSet<String>,
    /// Current enemies
    #[serde(default)]
    pub active_enemies: BTreeSet<String>,
}

/// One recorded field change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    /// Qualified field name, e.g. `physical.location`
    pub field: String,
    /// Value before the change
    pub old_value: String,
    /// Value after the change
    pub new_value: String,
    /// Chapter the change happened in
    pub chapter: u32,
}

/// Current state of one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterStateSnapshot {
    /// Stable character id
    pub id: String,
    /// Display name
    pub name: String,
    /// Physical state
    pub physical: PhysicalState,
    /// Psychological state
    pub psychological: PsychologicalState,
    /// Social state
    pub social: SocialState,
    /// Most recent changes, oldest first
    #[serde(default)]
    pub recent_changes: Vec<StateChange>,
    /// Chapter this snapshot reflects
    pub as_of_chapter: u32,
}

impl CharacterStateSnapshot {
    /// Fresh snapshot with default state.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            physical: PhysicalState {
                location: "unknown".to_string(),
                ..PhysicalState::default()
            },
            psychological: PsychologicalState::default(),
            social: SocialState::default(),
            recent_changes: Vec::new(),
            as_of_chapter: 0,
        }
    }

    /// Fresh snapshot seeded from a profile.
    pub fn from_profile(profile: &CharacterProfile) -> Self {
        let mut snapshot = Self::new(&profile.id, &profile.name);
        snapshot.psychological.motivation = profile.motivation.clone();
        snapshot.social.public_identity = profile.public_identity.clone();
        snapshot
    }

    /// Apply one field change. Returns false when the field is unknown or the
    /// value cannot be interpreted.
    fn apply_change(&mut self, field: &str, new_value: &str, chapter: u32) -> bool {
        let Some(target) = FieldTarget::resolve(field) else {
            tracing::debug!(character = %self.id, field, "Dropping delta for unknown field");
            return false;
        };

        let change = match target {
            FieldTarget::Location => replace_text(&mut self.physical.location, new_value),
            FieldTarget::Condition => {
                let normalized = new_value.trim().replace([' ', '-'], "_");
                let Ok(condition) = CharacterCondition::from_str(&normalized) else {
                    tracing::debug!(character = %self.id, value = new_value, "Dropping unparseable condition");
                    return false;
                };
                let old = self.physical.condition.to_string();
                self.physical.condition = condition;
                (old, condition.to_string())
            }
            FieldTarget::Equipment => update_set(&mut self.physical.equipment, new_value),
            FieldTarget::Abilities => update_set(&mut self.physical.abilities, new_value),
            FieldTarget::PowerLevel => replace_optional(&mut self.physical.power_level, new_value),
            FieldTarget::Mood => replace_text(&mut self.psychological.mood, new_value),
            FieldTarget::Motivation => replace_text(&mut self.psychological.motivation, new_value),
            FieldTarget::KnownSecrets => {
                update_set(&mut self.psychological.known_secrets, new_value)
            }
            FieldTarget::Beliefs => update_set(&mut self.psychological.beliefs, new_value),
            FieldTarget::InnerConflict => {
                replace_optional(&mut self.psychological.inner_conflict, new_value)
            }
            FieldTarget::PublicIdentity => {
                replace_text(&mut self.social.public_identity, new_value)
            }
            FieldTarget::HiddenIdentity => {
                replace_optional(&mut self.social.hidden_identity, new_value)
            }
            FieldTarget::Reputation => replace_text(&mut self.social.reputation, new_value),
            FieldTarget::Alliances => update_set(&mut self.social.active_alliances, new_value),
            FieldTarget::Enemies => update_set(&mut self.social.active_enemies, new_value),
        };

        let (old_value, new_value) = change;
        if old_value != new_value {
            self.recent_changes.push(StateChange {
                field: target.qualified_name().to_string(),
                old_value,
                new_value,
                chapter,
            });
            if self.recent_changes.len() > MAX_RECENT_CHANGES {
                let excess = self.recent_changes.len() - MAX_RECENT_CHANGES;
                self.recent_changes.drain(..excess);
            }
        }
        true
    }

    /// Render the snapshot for prompt inclusion.
    pub fn render(&self) -> String {
        let p = &self.physical;
        let mut lines = vec![format!(
            "{} ({}): at {}, {}",
            self.name,
            self.id,
            if p.location.is_empty() { "unknown" } else { p.location.as_str() },
            p.condition.to_string().replace('_', " ")
        )];
        if !self.psychological.mood.is_empty() {
            lines.push(format!("  Mood: {}", self.psychological.mood));
        }
        if !self.psychological.motivation.is_empty() {
            lines.push(format!("  Wants: {}", self.psychological.motivation));
        }
        if !p.equipment.is_empty() {
            lines.push(format!("  Carries: {}", join(&p.equipment)));
        }
        if !p.abilities.is_empty() {
            lines.push(format!("  Abilities: {}", join(&p.abilities)));
        }
        if let Some(level) = &p.power_level {
            lines.push(format!("  Power level: {}", level));
        }
        if !self.psychological.known_secrets.is_empty() {
            lines.push(format!("  Knows: {}", join(&self.psychological.known_secrets)));
        }
        if let Some(conflict) = &self.psychological.inner_conflict {
            lines.push(format!("  Torn by: {}", conflict));
        }
        if !self.social.public_identity.is_empty() {
            lines.push(format!("  Known as: {}", self.social.public_identity));
        }
        if let Some(hidden) = &self.social.hidden_identity {
            lines.push(format!("  Secretly: {}", hidden));
        }
        if !self.social.active_alliances.is_empty() {
            lines.push(format!("  Allies: {}", join(&self.social.active_alliances)));
        }
        if !self.social.active_enemies.is_empty() {
            lines.push(format!("  Enemies: {}", join(&self.social.active_enemies)));
        }
        lines.join("\n")
    }
}

/// Sub-object field addressed by a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldTarget {
    Location,
    Condition,
    Equipment,
    Abilities,
    PowerLevel,
    Mood,
    Motivation,
    KnownSecrets,
    Beliefs,
    InnerConflict,
    PublicIdentity,
    HiddenIdentity,
    Reputation,
    Alliances,
    Enemies,
}

impl FieldTarget {
    /// Accepts bare (`location`), qualified (`physical.location`) and
    /// camel-case (`powerLevel`) names.
    fn resolve(field: &str) -> Option<Self> {
        let lower = field.trim().to_lowercase();
        let bare = lower.rsplit('.').next().unwrap_or(&lower);
        let key: String = bare.chars().filter(|c| *c != '_' && *c != ' ').collect();
        let target = match key.as_str() {
            "location" => Self::Location,
            "condition" | "health" => Self::Condition,
            "equipment" | "items" => Self::Equipment,
            "abilities" | "skills" => Self::Abilities,
            "powerlevel" | "power" => Self::PowerLevel,
            "mood" | "emotion" => Self::Mood,
            "motivation" | "goal" => Self::Motivation,
            "knownsecrets" | "secrets" => Self::KnownSecrets,
            "beliefs" => Self::Beliefs,
            "innerconflict" => Self::InnerConflict,
            "publicidentity" | "identity" => Self::PublicIdentity,
            "hiddenidentity" => Self::HiddenIdentity,
            "reputation" => Self::Reputation,
            "activealliances" | "alliances" | "allies" => Self::Alliances,
            "activeenemies" | "enemies" => Self::Enemies,
            _ => return None,
        };
        Some(target)
    }

    fn qualified_name(&self) -> &'static str {
        match self {
            Self::Location => "physical.location",
            Self::Condition => "physical.condition",
            Self::Equipment => "physical.equipment",
            Self::Abilities => "physical.abilities",
            Self::PowerLevel => "physical.power_level",
            Self::Mood => "psychological.mood",
            Self::Motivation => "psychological.motivation",
            Self::KnownSecrets => "psychological.known_secrets",
            Self::Beliefs => "psychological.beliefs",
            Self::InnerConflict => "psychological.inner_conflict",
            Self::PublicIdentity => "social.public_identity",
            Self::HiddenIdentity => "social.hidden_identity",
            Self::Reputation => "social.reputation",
            Self::Alliances => "social.active_alliances",
            Self::Enemies => "social.active_enemies",
        }
    }
}

fn replace_text(slot: &mut String, value: &str) -> (String, String) {
    let old = std::mem::replace(slot, value.trim().to_string());
    (old, slot.clone())
}

fn replace_optional(slot: &mut Option<String>, value: &str) -> (String, String) {
    let trimmed = value.trim();
    let next = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(trimmed.to_string())
    };
    let old = std::mem::replace(slot, next);
    (old.unwrap_or_default(), slot.clone().unwrap_or_default())
}

/// `-item` removes, anything else adds.
fn update_set(set: &mut BTreeSet<String>, value: &str) -> (String, String) {
    let old = join(set);
    let trimmed = value.trim();
    if let Some(removed) = trimmed.strip_prefix('-') {
        set.remove(removed.trim());
    } else if !trimmed.is_empty() {
        set.insert(trimmed.to_string());
    }
    (old, join(set))
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// One extracted change to a character's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterDelta {
    /// Character id
    #[serde(alias = "id", alias = "character")]
    pub character_id: String,
    /// Display name, used when the character is new
    #[serde(default)]
    pub name: Option<String>,
    /// Field name, bare or qualified
    pub field: String,
    /// New value; `-item` removes from a set-valued field
    #[serde(alias = "value")]
    pub new_value: String,
}

impl CharacterDelta {
    /// Create a delta.
    pub fn new(
        character_id: impl Into<String>,
        field: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            character_id: character_id.into(),
            name: None,
            field: field.into(),
            new_value: new_value.into(),
        }
    }

    /// Parse deltas from a character-extraction response.
    ///
    /// Accepts a bare array or an object with a `changes` or `deltas` list.
    /// Malformed entries are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the response contains no JSON at all.
    pub fn parse_response(response: &str) -> SerialistResult<Vec<Self>> {
        let payload = parse_model_payload(response)?;
        let list = match &payload {
            Value::Array(_) => Some(&payload),
            Value::Object(map) => map.get("changes").or_else(|| map.get("deltas")),
            _ => None,
        };
        Ok(parse_lenient_list(list, "character_deltas"))
    }
}

/// Advisory consistency finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    /// Character id
    pub character_id: String,
    /// Field involved, when the issue concerns one
    pub field: Option<String>,
    /// Human-readable description
    pub description: String,
}

/// Result of a consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// True when no issue was found
    pub valid: bool,
    /// Findings
    pub issues: Vec<ConsistencyIssue>,
}

/// Map of character id to current state.
///
/// # Examples
///
/// ```
/// use serialist_core::{CharacterProfile, CharacterRole};
/// use serialist_story::{CharacterDelta, CharacterStateRegistry};
///
/// let profiles = vec![CharacterProfile::new("lin", "Lin", CharacterRole::Protagonist)];
/// let registry = CharacterStateRegistry::initialize_from_profiles(&profiles);
///
/// let next = registry.apply_deltas(&[CharacterDelta::new("lin", "location", "the docks")], 1);
/// assert_eq!(next.snapshot("lin").unwrap().physical.location, "the docks");
/// assert_eq!(registry.snapshot("lin").unwrap().physical.location, "unknown");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Getters)]
pub struct CharacterStateRegistry {
    characters: BTreeMap<String, CharacterStateSnapshot>,
    last_updated_chapter: u32,
}

impl CharacterStateRegistry {
    /// One snapshot per protagonist or main character.
    pub fn initialize_from_profiles(profiles: &[CharacterProfile]) -> Self {
        let characters = profiles
            .iter()
            .filter(|p| p.role.is_tracked_from_start())
            .map(|p| (p.id.clone(), CharacterStateSnapshot::from_profile(p)))
            .collect();
        Self {
            characters,
            last_updated_chapter: 0,
        }
    }

    /// Look up a snapshot by id.
    pub fn snapshot(&self, id: &str) -> Option<&CharacterStateSnapshot> {
        self.characters.get(id)
    }

    /// Number of tracked characters.
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    /// True when no character is tracked.
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Apply a chapter's deltas, returning the next registry.
    ///
    /// `self` is left untouched. Deltas for unseen ids create a fresh
    /// snapshot first. Unknown fields are dropped.
    #[tracing::instrument(skip(self, deltas), fields(deltas = deltas.len()))]
    pub fn apply_deltas(&self, deltas: &[CharacterDelta], chapter: u32) -> Self {
        if deltas.is_empty() {
            return self.clone();
        }

        let mut next = self.clone();
        let mut grouped: BTreeMap<&str, Vec<&CharacterDelta>> = BTreeMap::new();
        for delta in deltas {
            let id = delta.character_id.trim();
            if id.is_empty() {
                tracing::debug!("Dropping delta with empty character id");
                continue;
            }
            grouped.entry(id).or_default().push(delta);
        }

        for (id, group) in grouped {
            let snapshot = next.characters.entry(id.to_string()).or_insert_with(|| {
                let name = group
                    .iter()
                    .find_map(|d| d.name.clone())
                    .unwrap_or_else(|| id.to_string());
                tracing::debug!(character = id, "Creating snapshot for new character");
                CharacterStateSnapshot::new(id, name)
            });

            let mut applied = 0usize;
            for delta in group {
                if snapshot.apply_change(&delta.field, &delta.new_value, chapter) {
                    applied += 1;
                }
            }
            snapshot.as_of_chapter = snapshot.as_of_chapter.max(chapter);
            tracing::debug!(character = id, applied, "Applied character deltas");
        }

        next.last_updated_chapter = next.last_updated_chapter.max(chapter);
        next
    }

    /// Up to `limit` snapshots most relevant at `chapter`, most recently
    /// updated first, ties in id order.
    pub fn derive_active_snapshots(
        &self,
        chapter: u32,
        limit: usize,
    ) -> Vec<&CharacterStateSnapshot> {
        let mut snapshots: Vec<&CharacterStateSnapshot> = self
            .characters
            .values()
            .filter(|s| s.as_of_chapter <= chapter)
            .collect();
        snapshots.sort_by(|a, b| b.as_of_chapter.cmp(&a.as_of_chapter));
        snapshots.truncate(limit);
        snapshots
    }

    /// Advisory consistency check.
    pub fn validate_consistency(&self) -> ConsistencyReport {
        let mut issues = Vec::new();

        for snapshot in self.characters.values() {
            let motivation = snapshot.psychological.motivation.trim().to_lowercase();
            if snapshot.physical.condition == CharacterCondition::Unconscious
                && motivation != "unconscious"
                && motivation != "unknown"
            {
                issues.push(ConsistencyIssue {
                    character_id: snapshot.id.clone(),
                    field: Some("physical.condition".to_string()),
                    description: format!(
                        "{} is unconscious but still has an active motivation ({})",
                        snapshot.name, snapshot.psychological.motivation
                    ),
                });
            }

            if snapshot.physical.location.trim().is_empty() {
                issues.push(ConsistencyIssue {
                    character_id: snapshot.id.clone(),
                    field: Some("physical.location".to_string()),
                    description: format!("{} has no location", snapshot.name),
                });
            }

            let mut by_field: BTreeMap<&str, Vec<&StateChange>> = BTreeMap::new();
            for change in &snapshot.recent_changes {
                by_field.entry(change.field.as_str()).or_default().push(change);
            }
            for (field, changes) in by_field {
                if let [.., previous, latest] = changes.as_slice()
                    && latest.new_value == previous.old_value
                {
                    issues.push(ConsistencyIssue {
                        character_id: snapshot.id.clone(),
                        field: Some(field.to_string()),
                        description: format!(
                            "{} {} flipped back to '{}' (chapters {} and {}), needs review",
                            snapshot.name, field, latest.new_value, previous.chapter, latest.chapter
                        ),
                    });
                }
            }
        }

        ConsistencyReport {
            valid: issues.is_empty(),
            issues,
        }
    }

    /// Render selected snapshots for prompt inclusion.
    pub fn render_context(snapshots: &[&CharacterStateSnapshot]) -> String {
        snapshots
            .iter()
            .map(|s| s.render())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
