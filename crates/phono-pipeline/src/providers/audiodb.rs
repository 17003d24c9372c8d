//! TheAudioDB provider client.
//!
//! Primary metadata source: artist bio/image/genre, album wiki/image/
//! year, and track-level tags. The free tier needs no registration and
//! serves roughly 30 requests per minute, so the client keeps a 500ms
//! minimum gap between dispatches. Lookups go through durable caches;
//! misses search by name with punctuation variations, and album lookups
//! walk a ladder of normalized name, original name, then the artist's
//! full album listing.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use phono_core::model::{AlbumInfo, ArtistInfo, TrackInfo};
use phono_core::naming::extract_year;

use crate::cache::{album_key, artist_key, track_key, DiskCache};
use crate::error::{PipelineResult, ProviderError, ProviderResult};
use crate::providers::resilience::{call_with_retry, RateLimiter};
use crate::providers::titles::{name_variations, strip_edition_suffix};

const AUDIODB_API_BASE: &str = "https://www.theaudiodb.com/api/v1/json";

const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// API response types (private -- TheAudioDB returns everything as strings)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ArtistSearchResponse {
    #[serde(default)]
    artists: Option<Vec<ArtistPayload>>,
}

#[derive(Debug, Deserialize)]
struct ArtistPayload {
    #[serde(rename = "idArtist")]
    id: Option<String>,
    #[serde(rename = "strArtist")]
    name: Option<String>,
    #[serde(rename = "strBiographyEN")]
    biography: Option<String>,
    #[serde(rename = "strGenre")]
    genre: Option<String>,
    #[serde(rename = "strStyle")]
    style: Option<String>,
    #[serde(rename = "strMood")]
    mood: Option<String>,
    #[serde(rename = "strArtistThumb")]
    thumb: Option<String>,
    #[serde(rename = "strArtistFanart")]
    fanart: Option<String>,
    #[serde(rename = "strArtistFanart2")]
    fanart2: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlbumSearchResponse {
    #[serde(default)]
    album: Option<Vec<AlbumPayload>>,
}

#[derive(Debug, Deserialize)]
struct AlbumPayload {
    #[serde(rename = "strAlbum")]
    name: Option<String>,
    #[serde(rename = "strDescriptionEN")]
    description_en: Option<String>,
    #[serde(rename = "strDescription")]
    description: Option<String>,
    #[serde(rename = "intYearReleased")]
    year_released: Option<String>,
    #[serde(rename = "strGenre")]
    genre: Option<String>,
    #[serde(rename = "strStyle")]
    style: Option<String>,
    #[serde(rename = "strMood")]
    mood: Option<String>,
    #[serde(rename = "strTheme")]
    theme: Option<String>,
    #[serde(rename = "strAlbumThumb")]
    thumb: Option<String>,
    #[serde(rename = "strAlbumThumbHQ")]
    thumb_hq: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackSearchResponse {
    #[serde(default)]
    track: Option<Vec<TrackPayload>>,
}

#[derive(Debug, Deserialize)]
struct TrackPayload {
    #[serde(rename = "strTrack")]
    name: Option<String>,
    #[serde(rename = "strAlbum")]
    album: Option<String>,
    #[serde(rename = "strGenre")]
    genre: Option<String>,
    #[serde(rename = "strStyle")]
    style: Option<String>,
    #[serde(rename = "strMood")]
    mood: Option<String>,
    #[serde(rename = "strTheme")]
    theme: Option<String>,
}

/// Canonical artist identity cached alongside artist info, reused to make
/// album lookups hit TheAudioDB's own spelling and artist-id listing.
#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct CanonicalArtist {
    pub name: String,
    pub id: Option<String>,
}

fn nonempty(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

impl ArtistPayload {
    fn into_info(self) -> (ArtistInfo, CanonicalArtist) {
        let info = ArtistInfo {
            bio: nonempty(self.biography),
            image_url: nonempty(self.thumb)
                .or_else(|| nonempty(self.fanart))
                .or_else(|| nonempty(self.fanart2)),
            genre: nonempty(self.genre),
            style: nonempty(self.style),
            mood: nonempty(self.mood),
        };
        let canonical = CanonicalArtist {
            name: nonempty(self.name).unwrap_or_default(),
            id: nonempty(self.id),
        };
        (info, canonical)
    }
}

impl AlbumPayload {
    fn into_info(self) -> AlbumInfo {
        AlbumInfo {
            name: nonempty(self.name),
            image_url: nonempty(self.thumb).or_else(|| nonempty(self.thumb_hq)),
            wiki: nonempty(self.description_en).or_else(|| nonempty(self.description)),
            release_year: self.year_released.as_deref().and_then(extract_year),
            genre: nonempty(self.genre),
            style: nonempty(self.style),
            mood: nonempty(self.mood),
            theme: nonempty(self.theme),
        }
    }
}

impl TrackPayload {
    fn into_info(self) -> TrackInfo {
        TrackInfo {
            name: nonempty(self.name),
            album: nonempty(self.album),
            genre: nonempty(self.genre),
            style: nonempty(self.style),
            mood: nonempty(self.mood),
            theme: nonempty(self.theme),
        }
    }
}

/// TheAudioDB API client.
///
/// Lookups never fail to the caller: exhausted retries and unmatched
/// searches both produce an empty (`Default`) info value, which is also
/// cached so the miss is not retried on the next run.
#[derive(Debug)]
pub struct AudioDbClient {
    http: Client,
    base_url: String,
    rate_limiter: RateLimiter,
    artist_cache: DiskCache<ArtistInfo>,
    album_cache: DiskCache<AlbumInfo>,
    track_cache: DiskCache<TrackInfo>,
    canonical_cache: DiskCache<Option<CanonicalArtist>>,
}

impl AudioDbClient {
    /// Create a client, loading its durable caches from `cache_dir`.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be created.
    pub fn new(api_key: &str, cache_dir: &Path) -> ProviderResult<Self> {
        let http = Client::builder()
            .user_agent("phono/0.1.0 (https://github.com/oxur/phono)")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("{AUDIODB_API_BASE}/{api_key}"),
            rate_limiter: RateLimiter::new(MIN_REQUEST_INTERVAL),
            artist_cache: DiskCache::load(&cache_dir.join("audiodb_artists.json")),
            album_cache: DiskCache::load(&cache_dir.join("audiodb_albums.json")),
            track_cache: DiskCache::load(&cache_dir.join("audiodb_tracks.json")),
            canonical_cache: DiskCache::load(&cache_dir.join("audiodb_canonical.json")),
        })
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> ProviderResult<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        call_with_retry(&self.rate_limiter, || async {
            let response = self
                .http
                .get(&url)
                .query(params)
                .send()
                .await?
                .error_for_status()
                .map_err(|e| ProviderError::Http {
                    provider: "TheAudioDB".to_string(),
                    message: e.to_string(),
                })?;
            response.json().await.map_err(|e| ProviderError::Parse {
                provider: "TheAudioDB".to_string(),
                message: e.to_string(),
            })
        })
        .await
    }

    /// Search the artist by name, trying punctuation variations until one
    /// hits. Returns the first payload of the first successful search.
    async fn search_artist(&self, artist: &str) -> Option<ArtistPayload> {
        let mut queries = vec![artist.to_string()];
        queries.extend(name_variations(artist));
        for query in queries {
            match self
                .request::<ArtistSearchResponse>("search.php", &[("s", &query)])
                .await
            {
                Ok(response) => {
                    if let Some(mut artists) = response.artists {
                        if !artists.is_empty() {
                            log::debug!("Found artist '{artist}' using query '{query}'");
                            return Some(artists.remove(0));
                        }
                    }
                }
                Err(e) => {
                    log::debug!("TheAudioDB artist search failed for '{query}': {e}");
                }
            }
        }
        None
    }

    /// Fetch artist info, caching both the info and the canonical artist
    /// identity used by later album lookups. Soft failure: a miss caches
    /// and returns `ArtistInfo::default()`.
    pub async fn artist_info(&self, artist: &str) -> ArtistInfo {
        let key = artist_key(artist);
        if let Some(cached) = self.artist_cache.get(&key).await {
            return cached;
        }

        let (info, canonical) = match self.search_artist(artist).await {
            Some(payload) => {
                let (info, canonical) = payload.into_info();
                (info, Some(canonical))
            }
            None => (ArtistInfo::default(), None),
        };

        self.canonical_cache.put(key.clone(), canonical).await;
        self.artist_cache.put(key, info.clone()).await;
        info
    }

    async fn album_search(&self, artist: &str, album: &str) -> Option<AlbumPayload> {
        match self
            .request::<AlbumSearchResponse>("searchalbum.php", &[("s", artist), ("a", album)])
            .await
        {
            Ok(response) => response.album.and_then(|mut albums| {
                if albums.is_empty() {
                    None
                } else {
                    Some(albums.remove(0))
                }
            }),
            Err(e) => {
                log::debug!("TheAudioDB album search failed for '{artist}' / '{album}': {e}");
                None
            }
        }
    }

    /// List all albums for a canonical artist id and match by exact
    /// lowercase name. Last rung of the album lookup ladder.
    async fn album_by_artist_id(&self, artist_id: &str, album: &str) -> Option<AlbumPayload> {
        let wanted = album.to_lowercase();
        match self
            .request::<AlbumSearchResponse>("album.php", &[("i", artist_id)])
            .await
        {
            Ok(response) => response.album.and_then(|albums| {
                albums
                    .into_iter()
                    .find(|a| a.name.as_deref().is_some_and(|n| n.to_lowercase() == wanted))
            }),
            Err(e) => {
                log::debug!("TheAudioDB album listing failed for artist id {artist_id}: {e}");
                None
            }
        }
    }

    /// Fetch album info by (artist, album).
    ///
    /// Uses the canonical artist spelling cached by [`Self::artist_info`]
    /// when available. The lookup ladder is: edition-normalized name,
    /// original name, then the artist-id album listing. Soft failure.
    pub async fn album_info(&self, artist: &str, album: &str) -> AlbumInfo {
        let key = album_key(artist, album);
        if let Some(cached) = self.album_cache.get(&key).await {
            return cached;
        }

        let canonical = self
            .canonical_cache
            .get(&artist_key(artist))
            .await
            .flatten();
        let search_artist = canonical
            .as_ref()
            .map_or(artist, |c| c.name.as_str());

        let mut payload = None;
        let normalized = strip_edition_suffix(album);
        if normalized != album {
            payload = self.album_search(search_artist, &normalized).await;
        }
        if payload.is_none() {
            payload = self.album_search(search_artist, album).await;
        }
        if payload.is_none() {
            if let Some(id) = canonical.as_ref().and_then(|c| c.id.as_deref()) {
                payload = self.album_by_artist_id(id, album).await;
            }
        }

        let info = payload.map(AlbumPayload::into_info).unwrap_or_default();
        self.album_cache.put(key, info.clone()).await;
        info
    }

    /// Fetch track info by (artist, title). Used to correct album names
    /// when album search misses. Soft failure.
    pub async fn track_info(&self, artist: &str, title: &str) -> TrackInfo {
        let key = track_key(artist, title);
        if let Some(cached) = self.track_cache.get(&key).await {
            return cached;
        }

        let info = match self
            .request::<TrackSearchResponse>("searchtrack.php", &[("s", artist), ("t", title)])
            .await
        {
            Ok(response) => response
                .track
                .and_then(|mut tracks| {
                    if tracks.is_empty() {
                        None
                    } else {
                        Some(tracks.remove(0))
                    }
                })
                .map(TrackPayload::into_info)
                .unwrap_or_default(),
            Err(e) => {
                log::debug!("TheAudioDB track search failed for '{artist}' / '{title}': {e}");
                TrackInfo::default()
            }
        };

        self.track_cache.put(key, info.clone()).await;
        info
    }

    /// Persist all durable caches.
    pub async fn save_caches(&self) -> PipelineResult<()> {
        self.artist_cache.save().await?;
        self.album_cache.save().await?;
        self.track_cache.save().await?;
        self.canonical_cache.save().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn client(temp: &TempDir) -> AudioDbClient {
        AudioDbClient::new("2", temp.path()).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let temp = TempDir::new().unwrap();
        let c = client(&temp);
        let debug = format!("{:?}", c);
        assert!(debug.contains("AudioDbClient"));
        assert!(debug.contains("RateLimiter"));
    }

    #[test]
    fn test_artist_search_deserialize() {
        let json = r#"{
            "artists": [{
                "idArtist": "111239",
                "strArtist": "The Beatles",
                "strBiographyEN": "The Beatles were an English rock band...",
                "strGenre": "Rock",
                "strStyle": "Pop/Rock",
                "strMood": "Happy",
                "strArtistThumb": "https://example.com/thumb.jpg"
            }]
        }"#;
        let response: ArtistSearchResponse = serde_json::from_str(json).unwrap();
        let payload = response.artists.unwrap().remove(0);
        let (info, canonical) = payload.into_info();
        assert_eq!(canonical.name, "The Beatles");
        assert_eq!(canonical.id.as_deref(), Some("111239"));
        assert_eq!(info.genre.as_deref(), Some("Rock"));
        assert_eq!(info.image_url.as_deref(), Some("https://example.com/thumb.jpg"));
    }

    #[test]
    fn test_artist_search_null_artists() {
        // TheAudioDB returns {"artists": null} on no match.
        let json = r#"{"artists": null}"#;
        let response: ArtistSearchResponse = serde_json::from_str(json).unwrap();
        assert!(response.artists.is_none());
    }

    #[test]
    fn test_album_payload_year_is_stringly_typed() {
        let json = r#"{
            "album": [{
                "strAlbum": "Abbey Road",
                "intYearReleased": "1969",
                "strDescriptionEN": "The eleventh studio album...",
                "strGenre": "Rock",
                "strAlbumThumb": "https://example.com/abbey.jpg"
            }]
        }"#;
        let response: AlbumSearchResponse = serde_json::from_str(json).unwrap();
        let info = response.album.unwrap().remove(0).into_info();
        assert_eq!(info.name.as_deref(), Some("Abbey Road"));
        assert_eq!(info.release_year, Some(1969));
        assert!(!info.is_empty());
    }

    #[test]
    fn test_blank_strings_become_none() {
        let json = r#"{"album": [{"strAlbum": "  ", "strGenre": ""}]}"#;
        let response: AlbumSearchResponse = serde_json::from_str(json).unwrap();
        let info = response.album.unwrap().remove(0).into_info();
        assert!(info.name.is_none());
        assert!(info.genre.is_none());
        assert!(info.is_empty());
    }

    #[test]
    fn test_track_payload_into_info() {
        let json = r#"{
            "track": [{
                "strTrack": "Come Together",
                "strAlbum": "Abbey Road",
                "strGenre": "Rock"
            }]
        }"#;
        let response: TrackSearchResponse = serde_json::from_str(json).unwrap();
        let info = response.track.unwrap().remove(0).into_info();
        assert_eq!(info.name.as_deref(), Some("Come Together"));
        assert_eq!(info.album.as_deref(), Some("Abbey Road"));
    }
}
