//! Explicit TTL caches: an in-memory map for API payloads and an on-disk
//! store for ingredient listings.

use std::{
    collections::HashMap,
    fs,
    hash::Hash,
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Ingredient, Profession};

/// Ingredient listings rarely change; keep them a day.
pub const RESOURCE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Source of "now" for TTL checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    Cached,
    Stale,
}

#[derive(Clone, Debug)]
pub struct CachedPayload<T> {
    pub data: T,
    pub fetched_at: SystemTime,
    pub status: CacheStatus,
}

impl<T> CachedPayload<T> {
    pub fn new(data: T, fetched_at: SystemTime, status: CacheStatus) -> Self {
        Self {
            data,
            fetched_at,
            status,
        }
    }
}

struct Entry<V> {
    value: V,
    stored_at: SystemTime,
}

/// In-memory cache whose entries expire after `ttl`.
pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn insert(&mut self, key: K, value: V) -> CachedPayload<V> {
        let stored_at = self.clock.now();
        self.entries.insert(
            key,
            Entry {
                value: value.clone(),
                stored_at,
            },
        );
        CachedPayload::new(value, stored_at, CacheStatus::Fresh)
    }

    /// Value for `key` if it is younger than the TTL.
    pub fn get(&self, key: &K) -> Option<CachedPayload<V>> {
        let entry = self.entries.get(key)?;
        if self.is_fresh(entry.stored_at) {
            Some(CachedPayload::new(
                entry.value.clone(),
                entry.stored_at,
                CacheStatus::Cached,
            ))
        } else {
            None
        }
    }

    /// Value for `key` regardless of age, for use when a refresh failed.
    pub fn get_stale(&self, key: &K) -> Option<CachedPayload<V>> {
        self.entries.get(key).map(|entry| {
            CachedPayload::new(entry.value.clone(), entry.stored_at, CacheStatus::Stale)
        })
    }

    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, stored_at: SystemTime) -> bool {
        self.clock
            .now()
            .duration_since(stored_at)
            .map(|age| age <= self.ttl)
            .unwrap_or(true)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache directory unavailable")]
    StorageUnavailable,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct ResourceListFile {
    /// Unix timestamp (seconds) when the listing was stored.
    cached_at: u64,
    data: Vec<Ingredient>,
}

/// On-disk cache of ingredient listings per profession and level range.
pub struct ResourceListCache {
    dir: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResourceListCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self::with_clock(dir, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(dir: impl Into<PathBuf>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            clock,
        }
    }

    /// Cache under the platform's local data directory.
    pub fn in_data_dir(ttl: Duration) -> Result<Self, CacheError> {
        let dirs = ProjectDirs::from("com", "Kamaskope", "Kamaskope")
            .ok_or(CacheError::StorageUnavailable)?;
        Ok(Self::new(dirs.data_local_dir().join("resources"), ttl))
    }

    pub fn key(profession: Profession, min_level: u32, max_level: u32) -> String {
        format!(
            "resources_cache_{}_{}_{}",
            profession.name(),
            min_level,
            max_level
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Listing stored under `key`, unless it is missing, unreadable or expired.
    pub fn load(&self, key: &str) -> Option<Vec<Ingredient>> {
        let path = self.path(key);
        if !path.exists() {
            log::debug!("[cache] No resource listing at {}", path.display());
            return None;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("[cache] Failed to read {}: {e}", path.display());
                return None;
            }
        };

        let file: ResourceListFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("[cache] Failed to parse {}: {e}", path.display());
                return None;
            }
        };

        let age = self.now_secs().saturating_sub(file.cached_at);
        if Duration::from_secs(age) >= self.ttl {
            log::info!("[cache] Resource listing {key} expired (age: {})", age_string(age));
            return None;
        }

        log::info!(
            "[cache] Loaded {} resources for {key} (age: {})",
            file.data.len(),
            age_string(age)
        );
        Some(file.data)
    }

    pub fn save(&self, key: &str, data: &[Ingredient]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let file = ResourceListFile {
            cached_at: self.now_secs(),
            data: data.to_vec(),
        };
        let path = self.path(key);
        fs::write(&path, serde_json::to_string(&file)?)?;
        log::info!("[cache] Saved {} resources to {}", data.len(), path.display());
        Ok(())
    }

    fn path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }

    fn now_secs(&self) -> u64 {
        self.clock
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Human-readable age string.
pub fn age_string(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ManualClock(Mutex<SystemTime>);

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000))))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> SystemTime {
            *self.0.lock().unwrap()
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "kamaskope-test-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn ingredient(id: i64) -> Ingredient {
        Ingredient {
            id,
            name: format!("resource-{id}"),
            img: String::new(),
            quantity: 1,
        }
    }

    #[test]
    fn entries_expire_after_ttl() {
        let clock = ManualClock::new();
        let mut cache = TtlCache::with_clock(Duration::from_secs(60), clock.clone());
        cache.insert("runes", 3);

        clock.advance(Duration::from_secs(30));
        let hit = cache.get(&"runes").unwrap();
        assert_eq!(hit.data, 3);
        assert_eq!(hit.status, CacheStatus::Cached);

        clock.advance(Duration::from_secs(31));
        assert!(cache.get(&"runes").is_none());
        assert_eq!(cache.get_stale(&"runes").unwrap().status, CacheStatus::Stale);
    }

    #[test]
    fn invalidate_removes_entry() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.insert(1, "a".to_string());
        cache.insert(2, "b".to_string());
        cache.invalidate(&1);
        assert!(cache.get_stale(&1).is_none());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn resource_listing_round_trips_within_ttl() {
        let clock = ManualClock::new();
        let cache =
            ResourceListCache::with_clock(temp_dir("fresh"), RESOURCE_CACHE_TTL, clock.clone());
        let key = ResourceListCache::key(Profession::Jeweller, 10, 60);
        cache.save(&key, &[ingredient(1), ingredient(2)]).unwrap();

        clock.advance(Duration::from_secs(23 * 60 * 60));
        assert_eq!(cache.load(&key).map(|data| data.len()), Some(2));

        clock.advance(Duration::from_secs(60 * 60));
        assert!(cache.load(&key).is_none());
        let _ = fs::remove_dir_all(cache.dir());
    }

    #[test]
    fn corrupt_listing_is_ignored() {
        let cache = ResourceListCache::new(temp_dir("corrupt"), RESOURCE_CACHE_TTL);
        fs::create_dir_all(cache.dir()).unwrap();
        fs::write(cache.dir().join("resources_cache_tailor_1_200.json"), "{not json").unwrap();
        assert!(cache
            .load(&ResourceListCache::key(Profession::Tailor, 1, 200))
            .is_none());
        let _ = fs::remove_dir_all(cache.dir());
    }

    #[test]
    fn key_includes_profession_and_levels() {
        assert_eq!(
            ResourceListCache::key(Profession::Smith, 10, 60),
            "resources_cache_smith_10_60"
        );
    }
}
