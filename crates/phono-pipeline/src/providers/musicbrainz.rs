//! MusicBrainz provider client.
//!
//! Secondary source for structured artist and release detail: type, area,
//! life-span, release date, label, barcode, media format, and tag lists.
//! MusicBrainz requires a descriptive user-agent and at most one request
//! per second, enforced by the client's rate limiter. Searches use Lucene
//! query syntax; names that escaping would mangle get an unescaped retry.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use phono_core::model::{ArtistDetails, ReleaseDetails};
use phono_core::naming::extract_year;

use crate::cache::{album_key, artist_key, DiskCache};
use crate::error::{PipelineResult, ProviderError, ProviderResult};
use crate::providers::resilience::{call_with_retry, RateLimiter};
use crate::providers::titles::{escape_lucene, has_special_chars, names_match, strip_edition_suffix};

const MUSICBRAINZ_API_BASE: &str = "https://musicbrainz.org/ws/2";

const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ArtistSearchResponse {
    #[serde(default)]
    artists: Vec<ArtistSearchEntry>,
}

#[derive(Debug, Deserialize)]
struct ArtistSearchEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistLookupResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default)]
    artist_type: Option<String>,
    #[serde(default)]
    area: Option<Area>,
    #[serde(rename = "life-span", default)]
    life_span: Option<LifeSpan>,
    #[serde(default)]
    disambiguation: Option<String>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Area {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LifeSpan {
    #[serde(default)]
    begin: Option<String>,
    #[serde(default)]
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseSearchResponse {
    #[serde(default)]
    releases: Vec<ReleaseSearchEntry>,
}

#[derive(Debug, Deserialize)]
struct ReleaseSearchEntry {
    id: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseLookupResponse {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    barcode: Option<String>,
    #[serde(rename = "release-group", default)]
    release_group: Option<ReleaseGroup>,
    #[serde(rename = "label-info", default)]
    label_info: Vec<LabelInfo>,
    #[serde(default)]
    media: Vec<Media>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroup {
    #[serde(rename = "primary-type", default)]
    primary_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelInfo {
    #[serde(default)]
    label: Option<Label>,
}

#[derive(Debug, Deserialize)]
struct Label {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(default)]
    format: Option<String>,
}

fn top_tags(tags: Vec<Tag>) -> Vec<String> {
    tags.into_iter().take(5).filter_map(|t| t.name).collect()
}

/// MusicBrainz API client.
///
/// Lookups degrade to `Default` details on any failure; absence of a
/// match is an expected outcome and is cached like a hit.
#[derive(Debug)]
pub struct MusicBrainzClient {
    http: Client,
    rate_limiter: RateLimiter,
    artist_cache: DiskCache<ArtistDetails>,
    release_cache: DiskCache<ReleaseDetails>,
}

impl MusicBrainzClient {
    /// Create a client, loading its durable caches from `cache_dir`.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be created.
    pub fn new(cache_dir: &Path) -> ProviderResult<Self> {
        let http = Client::builder()
            .user_agent("phono/0.1.0 (https://github.com/oxur/phono)")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            rate_limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
            artist_cache: DiskCache::load(&cache_dir.join("musicbrainz_artists.json")),
            release_cache: DiskCache::load(&cache_dir.join("musicbrainz_releases.json")),
        })
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> ProviderResult<T> {
        let url = format!("{MUSICBRAINZ_API_BASE}/{endpoint}");
        call_with_retry(&self.rate_limiter, || async {
            let response = self
                .http
                .get(&url)
                .query(params)
                .send()
                .await?
                .error_for_status()
                .map_err(|e| ProviderError::Http {
                    provider: "MusicBrainz".to_string(),
                    message: e.to_string(),
                })?;
            response.json().await.map_err(|e| ProviderError::Parse {
                provider: "MusicBrainz".to_string(),
                message: e.to_string(),
            })
        })
        .await
    }

    async fn artist_search(&self, query: &str) -> Option<Vec<ArtistSearchEntry>> {
        match self
            .request::<ArtistSearchResponse>(
                "artist",
                &[("query", query), ("fmt", "json"), ("limit", "5")],
            )
            .await
        {
            Ok(response) => Some(response.artists),
            Err(e) => {
                log::debug!("MusicBrainz artist search failed for {query}: {e}");
                None
            }
        }
    }

    /// Find an artist MBID: quoted-exact search with Lucene escaping, then
    /// an unescaped retry when the name carries characters (`.` `&` `!`)
    /// that escaping mangles. Among results the first loose name match
    /// wins; otherwise the top-scored entry does.
    async fn search_artist_mbid(&self, artist: &str) -> Option<String> {
        let escaped = format!("artist:\"{}\"", escape_lucene(artist));
        let mut candidates = self.artist_search(&escaped).await.unwrap_or_default();

        if candidates.is_empty() && has_special_chars(artist) {
            let raw = format!("artist:\"{artist}\"");
            candidates = self.artist_search(&raw).await.unwrap_or_default();
        }

        if candidates.is_empty() {
            return None;
        }
        candidates
            .iter()
            .find(|c| c.name.as_deref().is_some_and(|n| names_match(artist, n)))
            .or_else(|| candidates.first())
            .map(|c| c.id.clone())
    }

    /// Fetch detailed artist info by name. Soft failure: a miss caches and
    /// returns `ArtistDetails::default()`.
    pub async fn artist_details(&self, artist: &str) -> ArtistDetails {
        let key = artist_key(artist);
        if let Some(cached) = self.artist_cache.get(&key).await {
            return cached;
        }

        let Some(mbid) = self.search_artist_mbid(artist).await else {
            let details = ArtistDetails::default();
            self.artist_cache.put(key, details.clone()).await;
            return details;
        };

        let details = match self
            .request::<ArtistLookupResponse>(&format!("artist/{mbid}"), &[
                ("inc", "tags"),
                ("fmt", "json"),
            ])
            .await
        {
            Ok(data) => {
                let life_span = data.life_span.unwrap_or_default();
                ArtistDetails {
                    mbid: Some(mbid),
                    name: data.name,
                    artist_type: data.artist_type,
                    area: data.area.and_then(|a| a.name),
                    begin_date: life_span.begin,
                    end_date: life_span.end,
                    disambiguation: data.disambiguation,
                    tags: top_tags(data.tags),
                }
            }
            Err(e) => {
                log::debug!("MusicBrainz artist lookup failed for {artist}: {e}");
                ArtistDetails {
                    mbid: Some(mbid),
                    ..ArtistDetails::default()
                }
            }
        };

        self.artist_cache.put(key, details.clone()).await;
        details
    }

    async fn release_search(&self, query: &str) -> Option<ReleaseSearchEntry> {
        match self
            .request::<ReleaseSearchResponse>(
                "release",
                &[("query", query), ("fmt", "json"), ("limit", "1")],
            )
            .await
        {
            Ok(response) => response.releases.into_iter().next(),
            Err(e) => {
                log::debug!("MusicBrainz release search failed for {query}: {e}");
                None
            }
        }
    }

    /// Fetch detailed release info by (artist, album): quoted-exact search,
    /// then a fuzzy search with the edition-stripped title. Soft failure.
    pub async fn release_details(&self, artist: &str, album: &str) -> ReleaseDetails {
        let key = album_key(artist, album);
        if let Some(cached) = self.release_cache.get(&key).await {
            return cached;
        }

        let exact = format!(
            "release:\"{}\" AND artist:\"{}\"",
            escape_lucene(album),
            escape_lucene(artist)
        );
        let mut hit = self.release_search(&exact).await;

        if hit.is_none() {
            let cleaned = strip_edition_suffix(album);
            if cleaned != album {
                let fuzzy = format!(
                    "release:{} AND artist:{}",
                    escape_lucene(&cleaned),
                    escape_lucene(artist)
                );
                hit = self.release_search(&fuzzy).await;
            }
        }

        let Some(entry) = hit else {
            let details = ReleaseDetails::default();
            self.release_cache.put(key, details.clone()).await;
            return details;
        };

        let details = self.fetch_release(entry).await;
        self.release_cache.put(key, details.clone()).await;
        details
    }

    async fn fetch_release(&self, entry: ReleaseSearchEntry) -> ReleaseDetails {
        let mbid = entry.id;
        match self
            .request::<ReleaseLookupResponse>(&format!("release/{mbid}"), &[
                ("inc", "labels+media+release-groups+tags"),
                ("fmt", "json"),
            ])
            .await
        {
            Ok(data) => ReleaseDetails {
                title: entry.title.or(data.title),
                release_year: data.date.as_deref().and_then(extract_year),
                release_type: data.release_group.and_then(|g| g.primary_type),
                country: data.country,
                label: data
                    .label_info
                    .into_iter()
                    .find_map(|li| li.label.and_then(|l| l.name)),
                barcode: data.barcode,
                media_format: data.media.into_iter().next().and_then(|m| m.format),
                tags: top_tags(data.tags),
                mbid: Some(mbid),
            },
            Err(e) => {
                log::debug!("MusicBrainz release lookup failed for {mbid}: {e}");
                ReleaseDetails {
                    mbid: Some(mbid),
                    title: entry.title,
                    ..ReleaseDetails::default()
                }
            }
        }
    }

    /// Persist all durable caches.
    pub async fn save_caches(&self) -> PipelineResult<()> {
        self.artist_cache.save().await?;
        self.release_cache.save().await?;
        Ok(())
    }
}
