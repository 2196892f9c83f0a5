//! Context cache implementation.

use crate::{ContextCacheConfig, StateVersion};
use derive_getters::Getters;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

/// Kind of assembled context section.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ContextType {
    /// Static bible rendering
    BibleContext,
    /// Active character snapshots
    CharacterContext,
    /// Plot graph reminders
    PlotContext,
    /// Pacing guide
    PacingContext,
    /// Rolling summary and open loops
    SummaryContext,
    /// Fully assembled prompt context
    FullContext,
}

/// Cache key: `project_id:type:chapter_index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Getters, derive_more::Display)]
#[display("{}:{}:{}", project_id, context_type, chapter_index)]
pub struct CacheKey {
    project_id: String,
    context_type: ContextType,
    chapter_index: u32,
}

impl CacheKey {
    /// Create a cache key.
    pub fn new(project_id: impl Into<String>, context_type: ContextType, chapter_index: u32) -> Self {
        Self {
            project_id: project_id.into(),
            context_type,
            chapter_index,
        }
    }
}

/// Cached context section with the state version it was built from.
#[derive(Debug, Clone, Getters)]
pub struct CacheEntry {
    context_type: ContextType,
    content: String,
    chapter_index: u32,
    state_version: StateVersion,
    created_at: Instant,
    ttl: Duration,
    content_hash: String,
    metadata: HashMap<String, String>,
    #[getter(skip)]
    sequence: u64,
}

impl CacheEntry {
    /// Check if this entry has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }

    /// Check if this entry is usable for the given state version.
    pub fn is_valid_for(&self, current: StateVersion) -> bool {
        !self.is_expired() && self.state_version == current
    }

    /// Get remaining time until expiration.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.ttl.checked_sub(self.created_at.elapsed())
    }
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Getters)]
pub struct CacheStats {
    hits: u64,
    misses: u64,
    stale_reads: u64,
    expired: u64,
    evictions: u64,
    invalidations: u64,
}

impl CacheStats {
    /// Fraction of reads served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let reads = self.hits + self.misses;
        if reads == 0 {
            0.0
        } else {
            self.hits as f64 / reads as f64
        }
    }
}

/// In-memory cache of assembled context sections.
///
/// Single-writer: callers own one cache per worker and pass it by `&mut`.
///
/// # Example
///
/// ```
/// use serialist_cache::{CacheKey, ContextCache, ContextCacheConfig, ContextType, StateVersion};
///
/// let mut cache = ContextCache::new(ContextCacheConfig::default());
/// let key = CacheKey::new("saga", ContextType::PlotContext, 12);
/// let v = StateVersion::compose(11, 11, 11);
///
/// cache.set(key.clone(), "Foreshadowing due: the bell", v);
/// assert_eq!(cache.get(&key, v).unwrap().content(), "Foreshadowing due: the bell");
///
/// // Newer state invalidates the entry on read
/// assert!(cache.get(&key, StateVersion::compose(12, 11, 11)).is_none());
/// assert!(cache.is_empty());
/// ```
#[derive(Debug)]
pub struct ContextCache {
    config: ContextCacheConfig,
    entries: HashMap<CacheKey, CacheEntry>,
    stats: CacheStats,
    next_sequence: u64,
}

impl ContextCache {
    /// Create a new context cache with configuration.
    pub fn new(config: ContextCacheConfig) -> Self {
        tracing::debug!(
            default_ttl_secs = config.default_ttl_secs(),
            max_size = config.max_size(),
            enabled = config.enabled(),
            "Creating new ContextCache"
        );
        Self {
            config,
            entries: HashMap::new(),
            stats: CacheStats::default(),
            next_sequence: 0,
        }
    }

    /// Store a section with the default TTL and no metadata.
    pub fn set(&mut self, key: CacheKey, content: impl Into<String>, state_version: StateVersion) {
        self.set_with_options(key, content, state_version, HashMap::new(), None);
    }

    /// Store a section with metadata and an optional TTL override.
    ///
    /// Every write first purges expired entries, then evicts the globally
    /// oldest entry when the cache is full and `key` is new.
    #[tracing::instrument(
        skip(self, content, metadata),
        fields(key = %key, state_version = %state_version, cache_size = self.entries.len())
    )]
    pub fn set_with_options(
        &mut self,
        key: CacheKey,
        content: impl Into<String>,
        state_version: StateVersion,
        metadata: HashMap<String, String>,
        ttl: Option<Duration>,
    ) {
        if !self.config.enabled() {
            tracing::debug!("Cache disabled, skipping set");
            return;
        }

        self.purge_expired();

        if self.entries.len() >= *self.config.max_size() && !self.entries.contains_key(&key) {
            self.evict_oldest();
        }

        let content = content.into();
        let entry = CacheEntry {
            context_type: key.context_type,
            content_hash: content_hash(&content),
            content,
            chapter_index: key.chapter_index,
            state_version,
            created_at: Instant::now(),
            ttl: ttl.unwrap_or_else(|| Duration::from_secs(*self.config.default_ttl_secs())),
            metadata,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        tracing::debug!(ttl = ?entry.ttl, hash = %entry.content_hash, "Stored context entry");
        self.entries.insert(key, entry);
    }

    /// Read a section if it is still valid for `current_version`.
    ///
    /// Expired or stale entries are removed and reported as a miss.
    #[tracing::instrument(
        skip(self),
        fields(key = %key, current_version = %current_version)
    )]
    pub fn get(&mut self, key: &CacheKey, current_version: StateVersion) -> Option<&CacheEntry> {
        if !self.config.enabled() {
            self.stats.misses += 1;
            return None;
        }

        let Some(entry) = self.entries.get(key) else {
            self.stats.misses += 1;
            tracing::debug!("Cache miss");
            return None;
        };

        if entry.is_expired() {
            tracing::debug!("Cache entry expired, removing");
            self.entries.remove(key);
            self.stats.expired += 1;
            self.stats.misses += 1;
            return None;
        }

        if entry.state_version != current_version {
            tracing::debug!(
                cached_version = %entry.state_version,
                "Cache entry built from older state, removing"
            );
            self.entries.remove(key);
            self.stats.stale_reads += 1;
            self.stats.misses += 1;
            return None;
        }

        self.stats.hits += 1;
        tracing::debug!(time_remaining = ?entry.time_remaining(), "Cache hit");
        self.entries.get(key)
    }

    /// Drop every entry belonging to a project.
    pub fn invalidate_project(&mut self, project_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.project_id != project_id);
        let removed = before - self.entries.len();
        self.stats.invalidations += removed as u64;
        tracing::debug!(project_id, removed, "Invalidated project cache");
        removed
    }

    /// Drop a project's entries for `from_chapter` and every later chapter.
    pub fn invalidate_from_chapter(&mut self, project_id: &str, from_chapter: u32) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|key, _| key.project_id != project_id || key.chapter_index < from_chapter);
        let removed = before - self.entries.len();
        self.stats.invalidations += removed as u64;
        tracing::debug!(project_id, from_chapter, removed, "Invalidated chapter range");
        removed
    }

    /// Remove expired entries from cache.
    pub fn purge_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - self.entries.len();
        if removed > 0 {
            self.stats.expired += removed as u64;
            tracing::debug!(removed, remaining = self.entries.len(), "Purged expired entries");
        }
        removed
    }

    /// Clear all cache entries.
    pub fn clear(&mut self) {
        let count = self.entries.len();
        self.entries.clear();
        tracing::info!(cleared = count, "Cleared context cache");
    }

    /// Get number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cache effectiveness counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Cache configuration.
    pub fn config(&self) -> &ContextCacheConfig {
        &self.config
    }

    /// Evict the globally oldest entry regardless of type.
    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.created_at, entry.sequence))
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            tracing::debug!(key = %key, "Evicting oldest entry");
            self.entries.remove(&key);
            self.stats.evictions += 1;
        }
    }
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new(ContextCacheConfig::default())
    }
}

/// SHA-256 of the content as lowercase hex.
fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_hex() {
        let a = content_hash("the bell rang twice");
        assert_eq!(a.len(), 64);
        assert_eq!(a, content_hash("the bell rang twice"));
        assert_ne!(a, content_hash("the bell rang once"));
    }

    #[test]
    fn test_key_renders_colon_separated() {
        let key = CacheKey::new("saga", ContextType::FullContext, 7);
        assert_eq!(key.to_string(), "saga:full_context:7");
    }
}
