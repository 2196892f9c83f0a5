//! Character profiles supplied by the story bible.

use serde::{Deserialize, Serialize};

/// Narrative weight of a character.
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
pub enum CharacterRole {
    /// Point-of-view lead
    Protagonist,
    /// Recurring principal character
    Main,
    /// Principal opponent
    Antagonist,
    /// Recurring secondary character
    #[default]
    Supporting,
    /// Walk-on character
    Minor,
}

impl CharacterRole {
    /// Whether characters of this role get a tracked state snapshot from the start.
    pub fn is_tracked_from_start(&self) -> bool {
        matches!(self, Self::Protagonist | Self::Main)
    }
}

/// Static description of a character, read-only during generation.
///
/// # Examples
///
/// ```
/// use serialist_core::{CharacterProfile, CharacterRole};
///
/// let profile = CharacterProfile::new("lin", "Lin Yue", CharacterRole::Protagonist)
///     .with_motivation("find her brother")
///     .with_public_identity("apprentice archivist");
///
/// assert!(profile.role.is_tracked_from_start());
/// assert_eq!(profile.motivation, "find her brother");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Stable identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Narrative role
    #[serde(default)]
    pub role: CharacterRole,
    /// What the character wants
    #[serde(default)]
    pub motivation: String,
    /// How the world sees the character
    #[serde(default)]
    pub public_identity: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

impl CharacterProfile {
    /// Creates a profile with empty motivation and identity.
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: CharacterRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            ..Self::default()
        }
    }

    /// Sets the motivation.
    pub fn with_motivation(mut self, motivation: impl Into<String>) -> Self {
        self.motivation = motivation.into();
        self
    }

    /// Sets the public identity.
    pub fn with_public_identity(mut self, identity: impl Into<String>) -> Self {
        self.public_identity = identity.into();
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}
