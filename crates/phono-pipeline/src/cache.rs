//! Durable provider lookup caches.
//!
//! Each provider client owns one [`DiskCache`] per lookup category. The
//! cache is a single JSON document mapping a normalized lookup key to the
//! cached provider result. It is loaded once at startup, mutated in memory
//! behind a `tokio::sync::Mutex` (all reads and writes go through that one
//! owner), and rewritten in full by [`DiskCache::save`] at the end of a
//! run. Entries never expire on their own; invalidation is deleting the
//! document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::PipelineResult;

/// One cached lookup result with its fetch provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

/// Build the normalized cache key for an artist-level lookup.
pub fn artist_key(artist: &str) -> String {
    artist.trim().to_lowercase()
}

/// Build the normalized cache key for an (artist, album) lookup.
pub fn album_key(artist: &str, album: &str) -> String {
    format!("{}|{}", artist.trim().to_lowercase(), album.trim().to_lowercase())
}

/// Build the normalized cache key for an (artist, track) lookup.
pub fn track_key(artist: &str, track: &str) -> String {
    format!("{}|{}", artist.trim().to_lowercase(), track.trim().to_lowercase())
}

/// A durable key-value cache for one provider lookup category.
#[derive(Debug)]
pub struct DiskCache<T> {
    path: PathBuf,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T> DiskCache<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// Load the cache document at `path`, or start empty when the file does
    /// not exist. A corrupt document is discarded with a warning rather
    /// than failing the run.
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    log::warn!("Discarding corrupt cache {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        }
    }

    /// Look up a cached value by its normalized key.
    pub async fn get(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock().await;
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert a value under its normalized key, stamping it with now.
    pub async fn put(&self, key: String, value: T) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: Utc::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Rewrite the full cache document to disk.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created or the
    /// document cannot be written.
    pub async fn save(&self) -> PipelineResult<()> {
        let entries = self.entries.lock().await;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&*entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_key_normalization() {
        assert_eq!(artist_key("  The Beatles "), "the beatles");
        assert_eq!(album_key("The Beatles", "Abbey Road"), "the beatles|abbey road");
        assert_eq!(track_key("AC/DC", " Thunderstruck"), "ac/dc|thunderstruck");
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let temp = TempDir::new().unwrap();
        let cache: DiskCache<String> = DiskCache::load(&temp.path().join("artists.json"));
        assert!(cache.is_empty().await);
        assert_eq!(cache.get("the beatles").await, None);
    }

    #[tokio::test]
    async fn test_put_get_save_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache").join("albums.json");

        let cache: DiskCache<String> = DiskCache::load(&path);
        cache
            .put(album_key("The Beatles", "Abbey Road"), "hit".to_string())
            .await;
        assert_eq!(
            cache.get("the beatles|abbey road").await,
            Some("hit".to_string())
        );
        cache.save().await.unwrap();

        let reloaded: DiskCache<String> = DiskCache::load(&path);
        assert_eq!(reloaded.len().await, 1);
        assert_eq!(
            reloaded.get("the beatles|abbey road").await,
            Some("hit".to_string())
        );
    }

    #[tokio::test]
    async fn test_corrupt_document_is_discarded() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("artists.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache: DiskCache<String> = DiskCache::load(&path);
        assert!(cache.is_empty().await);
    }
}
