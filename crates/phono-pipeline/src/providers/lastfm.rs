//! Last.fm provider client.
//!
//! Tertiary album fallback, consulted when TheAudioDB has nothing. Only
//! `album.getinfo` is used (with autocorrect), yielding a corrected album
//! name, a wiki summary, and artwork. Last.fm reports "not found" as an
//! API-level `error` payload with HTTP 200, which the client treats as a
//! plain miss. Requires an API key; without one the client is disabled
//! and every lookup is an instant empty result.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use phono_core::model::AlbumInfo;

use crate::cache::{album_key, DiskCache};
use crate::error::{PipelineResult, ProviderError, ProviderResult};
use crate::providers::resilience::{call_with_retry, RateLimiter};

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";

// Last.fm allows 5 req/s; 250ms keeps a margin under that.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(250);

#[allow(clippy::unwrap_used)]
static ANCHOR_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<a\s+[^>]*>.*?</a>").unwrap());

#[allow(clippy::unwrap_used)]
static HTML_TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

// ---------------------------------------------------------------------------
// API response types (private -- Last.fm nests JSON awkwardly)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AlbumInfoResponse {
    #[serde(default)]
    error: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    album: Option<AlbumPayload>,
}

#[derive(Debug, Deserialize)]
struct AlbumPayload {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    wiki: Option<Wiki>,
    #[serde(default)]
    image: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Wiki {
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Image {
    #[serde(default)]
    size: String,
    #[serde(rename = "#text", default)]
    url: String,
}

/// Pick the highest-quality image Last.fm offers.
fn best_image(images: &[Image]) -> Option<String> {
    for wanted in ["mega", "extralarge", "large", "medium", "small"] {
        if let Some(img) = images.iter().find(|i| i.size == wanted && !i.url.is_empty()) {
            return Some(img.url.clone());
        }
    }
    None
}

/// Strip "Read more" anchors and leftover HTML from a wiki summary,
/// collapsing whitespace afterwards.
fn clean_wiki_text(text: &str) -> String {
    let without_anchors = ANCHOR_TAGS.replace_all(text, "");
    let without_tags = HTML_TAGS.replace_all(&without_anchors, "");
    without_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl AlbumPayload {
    fn into_info(self) -> AlbumInfo {
        AlbumInfo {
            name: self.name.filter(|n| !n.trim().is_empty()),
            image_url: best_image(&self.image),
            wiki: self
                .wiki
                .and_then(|w| w.summary)
                .map(|s| clean_wiki_text(&s))
                .filter(|s| !s.is_empty()),
            // Last.fm models genre as user tags; those stay out of the
            // genre field to avoid polluting it.
            ..AlbumInfo::default()
        }
    }
}

/// Last.fm API client.
#[derive(Debug)]
pub struct LastFmClient {
    http: Client,
    api_key: String,
    rate_limiter: RateLimiter,
    album_cache: DiskCache<AlbumInfo>,
}

impl LastFmClient {
    /// Create a client, loading its durable cache from `cache_dir`.
    ///
    /// The `api_key` must be a valid Last.fm API key obtained from
    /// <https://www.last.fm/api/account/create>.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be created.
    pub fn new(api_key: String, cache_dir: &Path) -> ProviderResult<Self> {
        let http = Client::builder()
            .user_agent("phono/0.1.0 (https://github.com/oxur/phono)")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key,
            rate_limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
            album_cache: DiskCache::load(&cache_dir.join("lastfm_albums.json")),
        })
    }

    /// Fetch album info by (artist, album) via `album.getinfo`. Soft
    /// failure: API errors, HTTP failures, and misses all cache and
    /// return `AlbumInfo::default()`.
    pub async fn album_info(&self, artist: &str, album: &str) -> AlbumInfo {
        let key = album_key(artist, album);
        if let Some(cached) = self.album_cache.get(&key).await {
            return cached;
        }

        let response: ProviderResult<AlbumInfoResponse> =
            call_with_retry(&self.rate_limiter, || async {
                let response = self
                    .http
                    .get(LASTFM_API_BASE)
                    .query(&[
                        ("method", "album.getinfo"),
                        ("artist", artist),
                        ("album", album),
                        ("autocorrect", "1"),
                        ("api_key", &self.api_key),
                        ("format", "json"),
                    ])
                    .send()
                    .await?
                    .error_for_status()
                    .map_err(|e| ProviderError::Http {
                        provider: "Last.fm".to_string(),
                        message: e.to_string(),
                    })?;
                response.json().await.map_err(|e| ProviderError::Parse {
                    provider: "Last.fm".to_string(),
                    message: e.to_string(),
                })
            })
            .await;

        let info = match response {
            Ok(data) => {
                if let Some(code) = data.error {
                    log::debug!(
                        "Last.fm API error {code} for '{artist}' / '{album}': {}",
                        data.message.unwrap_or_default()
                    );
                    AlbumInfo::default()
                } else {
                    data.album.map(AlbumPayload::into_info).unwrap_or_default()
                }
            }
            Err(e) => {
                log::debug!("Last.fm album lookup failed for '{artist}' / '{album}': {e}");
                AlbumInfo::default()
            }
        };

        self.album_cache.put(key, info.clone()).await;
        info
    }

    /// Persist the durable cache.
    pub async fn save_caches(&self) -> PipelineResult<()> {
        self.album_cache.save().await
    }
}
