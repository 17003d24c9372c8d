use std::path::PathBuf;

use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Configuration for phono.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (PHONO_* prefix)
/// 3. Config file (~/.config/phono/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory scanned for audio files.
    ///
    /// Can be set via:
    /// - CLI: positional `<MUSIC_DIR>` argument
    /// - ENV: PHONO_MUSIC_DIR
    /// - Config: music_dir = "/path/to/music"
    pub music_dir: Option<PathBuf>,

    /// Path the catalog JSON document is written to.
    ///
    /// Default: ~/.local/share/phono/catalog.json
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// Directory holding the durable provider cache documents.
    ///
    /// Default: ~/.local/share/phono/cache
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// TheAudioDB API key. The free tier key "2" works for testing.
    ///
    /// Can be set via:
    /// - ENV: PHONO_AUDIODB_API_KEY
    #[serde(default = "default_audiodb_key")]
    pub audiodb_api_key: String,

    /// Last.fm API key. The Last.fm fallback is disabled when unset.
    ///
    /// Can be set via:
    /// - ENV: PHONO_LASTFM_API_KEY
    pub lastfm_api_key: Option<String>,

    /// Disable all provider lookups (offline build from tags only).
    #[serde(default)]
    pub offline: bool,

    /// Base URL prefixed to store keys when publishing track references.
    pub public_url_base: Option<String>,

    /// Concurrency bound for per-file tag extraction.
    #[serde(default = "default_extract_workers")]
    pub extract_workers: usize,

    /// Concurrency bound for per-artist resolution work.
    #[serde(default = "default_artist_workers")]
    pub artist_workers: usize,

    /// Concurrency bound for per-album resolution work within one artist.
    #[serde(default = "default_album_workers")]
    pub album_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            music_dir: None,
            catalog_path: default_catalog_path(),
            cache_dir: default_cache_dir(),
            audiodb_api_key: default_audiodb_key(),
            lastfm_api_key: None,
            offline: false,
            public_url_base: None,
            extract_workers: default_extract_workers(),
            artist_workers: default_artist_workers(),
            album_workers: default_album_workers(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/phono/config.toml
    /// Reads environment variables with PHONO_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("phono");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// Check preconditions before any work starts.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::MusicDirNotFound` when the music directory is
    /// unset or not a directory, and `PipelineError::Config` when a worker
    /// bound is zero.
    pub fn validate(&self) -> PipelineResult<()> {
        let music_dir = self
            .music_dir
            .as_ref()
            .ok_or_else(|| PipelineError::Config("music_dir is not set".to_string()))?;
        if !music_dir.is_dir() {
            return Err(PipelineError::MusicDirNotFound(music_dir.clone()));
        }
        for (name, bound) in [
            ("extract_workers", self.extract_workers),
            ("artist_workers", self.artist_workers),
            ("album_workers", self.album_workers),
        ] {
            if bound == 0 {
                return Err(PipelineError::Config(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }
}

fn default_catalog_path() -> PathBuf {
    data_dir().join("catalog.json")
}

fn default_cache_dir() -> PathBuf {
    data_dir().join("cache")
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("phono")
}

// TheAudioDB documents "2" as the shared test key.
fn default_audiodb_key() -> String {
    "2".to_string()
}

fn default_extract_workers() -> usize {
    8
}

fn default_artist_workers() -> usize {
    4
}

fn default_album_workers() -> usize {
    2
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/phono/config.toml
/// - macOS: ~/Library/Application Support/phono/config.toml
/// - Windows: %APPDATA%\phono\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("phono")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.music_dir.is_none());
        assert_eq!(config.audiodb_api_key, "2");
        assert!(config.lastfm_api_key.is_none());
        assert!(config.extract_workers >= 1);
    }

    #[test]
    fn test_validate_requires_music_dir() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_missing_directory() {
        let config = Config {
            music_dir: Some(PathBuf::from("/no/such/directory")),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::MusicDirNotFound(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            music_dir: Some(temp.path().to_path_buf()),
            artist_workers: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_validate_accepts_existing_directory() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            music_dir: Some(temp.path().to_path_buf()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }
}
