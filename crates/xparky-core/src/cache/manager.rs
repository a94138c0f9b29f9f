use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::processor::{CertificateIndex, DriveSnapshot};

/// Consider cache stale after 1 hour.
pub const CACHE_STALE_MINUTES: i64 = 60;

const SNAPSHOT_CACHE: &str = "drive_snapshot";
const CERTIFICATES_CACHE: &str = "certificates";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        self.is_older_than(CACHE_STALE_MINUTES)
    }

    pub fn is_older_than(&self, minutes: i64) -> bool {
        self.age_minutes() >= minutes
    }
}

pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
        Ok(Self { cache_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        debug!(cache = name, age = %cached.age_display(), "Loaded cache");
        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, cached: &CachedData<T>) -> Result<()> {
        let path = self.cache_path(name);
        let contents = serde_json::to_string_pretty(cached)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        Ok(())
    }

    // ===== Drive snapshot =====

    pub fn load_snapshot(&self) -> Result<Option<CachedData<DriveSnapshot>>> {
        self.load(SNAPSHOT_CACHE)
    }

    pub fn save_snapshot(&self, snapshot: &CachedData<DriveSnapshot>) -> Result<()> {
        self.save(SNAPSHOT_CACHE, snapshot)
    }

    // ===== Certificates =====

    pub fn load_certificates(&self) -> Result<Option<CachedData<CertificateIndex>>> {
        self.load(CERTIFICATES_CACHE)
    }

    pub fn save_certificates(&self, index: &CachedData<CertificateIndex>) -> Result<()> {
        self.save(CERTIFICATES_CACHE, index)
    }
}

// ============================================================================
// Tests
// ============================================================================
