//! Context cache
//!
//! Process-wide store that avoids redundant resource discovery across
//! invocations. Keys are typed (no formatted-string collisions) and values
//! are a tagged union of the concrete cached shapes, so reads never
//! downcast. The cache is an explicitly constructed object passed by
//! reference into the orchestrator; there is no package-level state.
//!
//! A persisted variant loads previously cached entries from a local JSON
//! file at command start, trusts them only within a one-hour TTL, and
//! rewrites the file at command end when caching is enabled. Persistence is
//! best effort: a damaged file is logged and ignored, never allowed to
//! corrupt valid in-memory state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::context::RepoContext;
use super::models::{ServiceOffering, ServicePlan};
use crate::constants::cache as cache_constants;
use crate::errors::CacheError;

/// Typed cache key: operation plus its discriminating identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Service offerings visible in a space
    Offerings { space_id: String },
    /// Plans of a service offering
    Plans { offering_id: String },
    /// Fully resolved repository context for an org/space pair
    RepoContext { org_id: String, space_id: String },
}

impl CacheKey {
    /// Stable string form used in the persisted cache file
    pub fn storage_key(&self) -> String {
        match self {
            CacheKey::Offerings { space_id } => format!("offerings:{space_id}"),
            CacheKey::Plans { offering_id } => format!("plans:{offering_id}"),
            CacheKey::RepoContext { org_id, space_id } => {
                format!("repo-context:{org_id}:{space_id}")
            }
        }
    }

    /// Parse the persisted string form back into a typed key
    pub fn parse(raw: &str) -> Option<Self> {
        let (kind, rest) = raw.split_once(':')?;
        match kind {
            "offerings" => Some(CacheKey::Offerings {
                space_id: rest.to_string(),
            }),
            "plans" => Some(CacheKey::Plans {
                offering_id: rest.to_string(),
            }),
            "repo-context" => {
                let (org_id, space_id) = rest.split_once(':')?;
                Some(CacheKey::RepoContext {
                    org_id: org_id.to_string(),
                    space_id: space_id.to_string(),
                })
            }
            _ => None,
        }
    }
}

/// Tagged union of the concrete cached shapes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CacheValue {
    Offerings(Vec<ServiceOffering>),
    Plans(Vec<ServicePlan>),
    Context(RepoContext),
}

/// In-memory context cache. Single writer per command invocation; transfer
/// workers never touch it, so no internal locking is required.
#[derive(Debug, Default)]
pub struct ContextCache {
    entries: HashMap<CacheKey, CacheValue>,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheValue> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: CacheKey, value: CacheValue) {
        self.entries.insert(key, value);
    }

    /// All entries, for persistence
    pub fn dump(&self) -> &HashMap<CacheKey, CacheValue> {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached offerings for a space, if present
    pub fn offerings(&self, space_id: &str) -> Option<&[ServiceOffering]> {
        match self.get(&CacheKey::Offerings {
            space_id: space_id.to_string(),
        }) {
            Some(CacheValue::Offerings(offerings)) => Some(offerings),
            _ => None,
        }
    }

    /// Cached plans for an offering, if present
    pub fn plans(&self, offering_id: &str) -> Option<&[ServicePlan]> {
        match self.get(&CacheKey::Plans {
            offering_id: offering_id.to_string(),
        }) {
            Some(CacheValue::Plans(plans)) => Some(plans),
            _ => None,
        }
    }

    /// Cached resolved repository context, if present
    pub fn repo_context(&self, org_id: &str, space_id: &str) -> Option<&RepoContext> {
        match self.get(&CacheKey::RepoContext {
            org_id: org_id.to_string(),
            space_id: space_id.to_string(),
        }) {
            Some(CacheValue::Context(context)) => Some(context),
            _ => None,
        }
    }
}

/// Persisted cache file layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(rename = "Cache", default)]
    cache: HashMap<String, CacheValue>,
    #[serde(rename = "Timestamp", default)]
    timestamp: Option<Timestamp>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Timestamp {
    #[serde(rename = "LastUpdated")]
    last_updated: i64,
}

/// Handle to the persisted cache file
#[derive(Debug, Clone)]
pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the user's home directory
    pub fn default_path() -> Result<Self, CacheError> {
        let home = dirs::home_dir().ok_or(CacheError::NoHomeDirectory)?;
        Ok(Self::new(
            home.join(cache_constants::CACHE_DIR)
                .join(cache_constants::CACHE_FILE),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted entries. Entries older than the TTL, unknown keys,
    /// and damaged files all yield an empty cache; damage is logged but
    /// never fatal.
    pub fn load(&self) -> ContextCache {
        let mut cache = ContextCache::new();
        if !self.path.exists() {
            debug!("Cache file {} not found, starting empty", self.path.display());
            return cache;
        }

        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                error!("Could not read cache file {}: {err}", self.path.display());
                return cache;
            }
        };
        let state: PersistedState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(err) => {
                error!("Could not parse cache file {}: {err}", self.path.display());
                return cache;
            }
        };

        let Some(timestamp) = state.timestamp else {
            debug!("Cache file has no timestamp, ignoring cached entries");
            return cache;
        };
        let age = Utc::now().timestamp() - timestamp.last_updated;
        let ttl = cache_constants::TTL.as_secs() as i64;
        if age > ttl {
            debug!("Cache file is outdated ({age}s > {ttl}s), ignoring cached entries");
            return cache;
        }

        for (raw_key, value) in state.cache {
            match CacheKey::parse(&raw_key) {
                Some(key) => cache.set(key, value),
                None => debug!("Skipping unknown cache key '{raw_key}'"),
            }
        }
        cache
    }

    /// Write the current cache state with a fresh timestamp
    pub fn flush(&self, cache: &ContextCache) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let state = PersistedState {
            cache: cache
                .dump()
                .iter()
                .map(|(key, value)| (key.storage_key(), value.clone()))
                .collect(),
            timestamp: Some(Timestamp {
                last_updated: Utc::now().timestamp(),
            }),
        };
        let raw = serde_json::to_string(&state)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    /// Drop persisted entries but keep the file structure in place
    pub fn clear(&self) -> Result<(), CacheError> {
        if self.path.exists() {
            self.flush(&ContextCache::new())?;
        }
        Ok(())
    }
}
