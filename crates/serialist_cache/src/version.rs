//! Composite state version.

use serde::{Deserialize, Serialize};

/// Version number derived from the "last updated chapter" of each upstream
/// state component.
///
/// Any change in character, plot or summary state yields a different
/// version, so cached context built from older state is rejected on read.
///
/// # Examples
///
/// ```
/// use serialist_cache::StateVersion;
///
/// let v = StateVersion::compose(12, 11, 12);
/// assert_eq!(v.value(), 12 * 10_000 + 11 * 100 + 12);
/// assert_ne!(v, StateVersion::compose(12, 12, 12));
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("v{}", _0)]
pub struct StateVersion(u64);

impl StateVersion {
    /// Compose a version from the character, plot and summary chapters.
    pub fn compose(character_chapter: u32, plot_chapter: u32, summary_chapter: u32) -> Self {
        Self(
            u64::from(character_chapter) * 10_000
                + u64::from(plot_chapter) * 100
                + u64::from(summary_chapter),
        )
    }

    /// Wrap a raw version number.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Raw version number.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The next version, for callers that bump state without a chapter change.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}
