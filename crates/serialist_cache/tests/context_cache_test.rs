use serialist_cache::{
    CacheKey, ContextCache, ContextCacheConfig, ContextType, StateVersion,
};
use std::collections::HashMap;
use std::thread::sleep;
use std::time::Duration;

fn key(project: &str, chapter: u32) -> CacheKey {
    CacheKey::new(project, ContextType::FullContext, chapter)
}

#[test]
fn test_repeated_reads_return_same_content() {
    let mut cache = ContextCache::default();
    let v = StateVersion::compose(3, 3, 3);
    cache.set(key("saga", 4), "assembled context", v);

    let first = cache.get(&key("saga", 4), v).map(|e| e.content().clone());
    let second = cache.get(&key("saga", 4), v).map(|e| e.content().clone());
    assert_eq!(first.as_deref(), Some("assembled context"));
    assert_eq!(first, second);
    assert_eq!(*cache.stats().hits(), 2);
}

#[test]
fn test_newer_state_version_misses_and_removes_entry() {
    let mut cache = ContextCache::default();
    let v = StateVersion::from_raw(40_404);
    cache.set(key("saga", 5), "old", v);

    assert!(cache.get(&key("saga", 5), v.next()).is_none());
    assert!(cache.is_empty());
    // Even the original version misses once the entry is gone
    assert!(cache.get(&key("saga", 5), v).is_none());
    assert_eq!(*cache.stats().stale_reads(), 1);
}

#[test]
fn test_expired_entry_is_dropped_on_read() {
    let mut cache = ContextCache::default();
    let v = StateVersion::default();
    cache.set_with_options(
        key("saga", 1),
        "short lived",
        v,
        HashMap::new(),
        Some(Duration::from_millis(10)),
    );

    sleep(Duration::from_millis(30));
    assert!(cache.get(&key("saga", 1), v).is_none());
    assert_eq!(cache.len(), 0);
}

#[test]
fn test_set_purges_expired_entries_first() {
    let config = ContextCacheConfig::default().with_max_size(2_usize);
    let mut cache = ContextCache::new(config);
    let v = StateVersion::default();

    cache.set_with_options(
        key("saga", 1),
        "expiring",
        v,
        HashMap::new(),
        Some(Duration::from_millis(10)),
    );
    cache.set(key("saga", 2), "durable", v);
    sleep(Duration::from_millis(30));

    // The expired entry frees the slot, so nothing live is evicted
    cache.set(key("saga", 3), "new", v);
    assert_eq!(cache.len(), 2);
    assert!(cache.get(&key("saga", 2), v).is_some());
    assert!(cache.get(&key("saga", 3), v).is_some());
    assert_eq!(*cache.stats().evictions(), 0);
}

#[test]
fn test_full_cache_evicts_globally_oldest_entry() {
    let config = ContextCacheConfig::default().with_max_size(3_usize);
    let mut cache = ContextCache::new(config);
    let v = StateVersion::default();

    cache.set(CacheKey::new("saga", ContextType::PlotContext, 1), "plot", v);
    cache.set(CacheKey::new("saga", ContextType::FullContext, 1), "full", v);
    cache.set(CacheKey::new("other", ContextType::SummaryContext, 9), "summary", v);
    cache.set(CacheKey::new("saga", ContextType::CharacterContext, 2), "chars", v);

    assert_eq!(cache.len(), 3);
    assert!(
        cache
            .get(&CacheKey::new("saga", ContextType::PlotContext, 1), v)
            .is_none()
    );
    assert!(
        cache
            .get(&CacheKey::new("saga", ContextType::FullContext, 1), v)
            .is_some()
    );
    assert_eq!(*cache.stats().evictions(), 1);
}

#[test]
fn test_overwriting_existing_key_does_not_evict() {
    let config = ContextCacheConfig::default().with_max_size(2_usize);
    let mut cache = ContextCache::new(config);
    let v = StateVersion::default();

    cache.set(key("saga", 1), "one", v);
    cache.set(key("saga", 2), "two", v);
    cache.set(key("saga", 2), "two, revised", v);

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&key("saga", 2), v).unwrap().content(), "two, revised");
    assert!(cache.get(&key("saga", 1), v).is_some());
}

#[test]
fn test_invalidate_project_leaves_other_projects() {
    let mut cache = ContextCache::default();
    let v = StateVersion::default();
    cache.set(key("saga", 1), "a", v);
    cache.set(key("saga", 2), "b", v);
    cache.set(key("other", 1), "c", v);

    assert_eq!(cache.invalidate_project("saga"), 2);
    assert_eq!(cache.len(), 1);
    assert!(cache.get(&key("other", 1), v).is_some());
}

#[test]
fn test_invalidate_from_chapter_keeps_earlier_chapters() {
    let mut cache = ContextCache::default();
    let v = StateVersion::default();
    for chapter in 1..=5 {
        cache.set(key("saga", chapter), format!("ch{chapter}"), v);
    }
    cache.set(key("other", 5), "untouched", v);

    assert_eq!(cache.invalidate_from_chapter("saga", 3), 3);
    assert!(cache.get(&key("saga", 2), v).is_some());
    assert!(cache.get(&key("saga", 3), v).is_none());
    assert!(cache.get(&key("other", 5), v).is_some());
}

#[test]
fn test_disabled_cache_never_stores() {
    let config = ContextCacheConfig::default().with_enabled(false);
    let mut cache = ContextCache::new(config);
    let v = StateVersion::default();
    cache.set(key("saga", 1), "ignored", v);

    assert!(cache.is_empty());
    assert!(cache.get(&key("saga", 1), v).is_none());
    assert_eq!(*cache.stats().misses(), 1);
}

#[test]
fn test_entry_carries_hash_and_metadata() {
    let mut cache = ContextCache::default();
    let v = StateVersion::compose(1, 0, 1);
    let mut metadata = HashMap::new();
    metadata.insert("sections".to_string(), "5".to_string());
    cache.set_with_options(key("saga", 2), "body", v, metadata, None);

    let entry = cache.get(&key("saga", 2), v).unwrap();
    assert_eq!(entry.content_hash().len(), 64);
    assert_eq!(entry.metadata().get("sections").map(String::as_str), Some("5"));
    assert_eq!(*entry.chapter_index(), 2);
    assert_eq!(*entry.context_type(), ContextType::FullContext);
}

#[test]
fn test_config_deserializes_with_defaults() {
    let config: ContextCacheConfig = toml::from_str("max_size = 10").unwrap();
    assert_eq!(*config.max_size(), 10);
    assert_eq!(*config.default_ttl_secs(), 1800);
    assert!(*config.enabled());
}
