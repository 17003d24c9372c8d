//! Catalog output entities.
//!
//! The catalog is a single-owner tree: an artist owns its albums, an
//! album owns its tracks. All entities are rebuilt from scratch on every
//! run; only a track's `added` timestamp survives across runs (looked up
//! by store key in the previous catalog document). This module is also
//! the published document format and the prior-snapshot format, so the
//! serde shapes here are load-bearing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::record::AudioFormat;
use crate::naming::sanitize_key;

/// A fully resolved track in the output catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTrack {
    /// Track identifier: the store key of the underlying record.
    pub id: String,

    pub title: String,
    pub artist: Option<String>,
    /// Resolved (provider-corrected) album display name.
    pub album: String,

    pub track_number: Option<u32>,
    pub track_total: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_total: Option<u32>,

    pub duration_secs: Option<u32>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub style: Option<String>,
    pub mood: Option<String>,
    pub theme: Option<String>,
    pub composer: Option<String>,

    pub bitrate_kbps: Option<u32>,
    pub sample_rate_hz: Option<u32>,
    pub channels: Option<u8>,
    pub file_size: u64,
    pub format: AudioFormat,

    /// Public reference for the media itself.
    pub url: Option<String>,
    /// Public reference for artwork (embedded, or the album image).
    pub artwork_url: Option<String>,

    /// First time this store key was seen across catalog builds.
    pub added: DateTime<Utc>,
}

/// An album owned by exactly one artist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogAlbum {
    /// `sanitize(artist)/sanitize(album)` composite identifier.
    pub id: String,
    pub name: String,
    /// Display name of the owning artist.
    pub artist: String,

    pub image_url: Option<String>,
    pub wiki: Option<String>,
    pub release_year: Option<i32>,
    pub genre: Option<String>,
    pub style: Option<String>,
    pub mood: Option<String>,
    pub theme: Option<String>,

    pub release_type: Option<String>,
    pub country: Option<String>,
    pub label: Option<String>,
    pub barcode: Option<String>,
    pub media_format: Option<String>,

    pub tracks: Vec<CatalogTrack>,
}

impl CatalogAlbum {
    /// Compute the composite album identifier.
    #[must_use]
    pub fn make_id(artist_name: &str, album_name: &str) -> String {
        format!(
            "{}/{}",
            sanitize_key(artist_name, "Unknown-Artist"),
            sanitize_key(album_name, "Unknown-Album")
        )
    }
}

/// A top-level catalog artist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogArtist {
    /// Sanitized display name.
    pub id: String,
    pub name: String,

    pub bio: Option<String>,
    pub image_url: Option<String>,
    pub genre: Option<String>,
    pub style: Option<String>,
    pub mood: Option<String>,

    pub artist_type: Option<String>,
    pub area: Option<String>,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
    pub disambiguation: Option<String>,

    pub albums: Vec<CatalogAlbum>,
}

/// The complete catalog document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub artists: Vec<CatalogArtist>,
    pub total_tracks: usize,
    pub generated_at: Option<DateTime<Utc>>,
}

impl Catalog {
    /// Index `added` timestamps by store key, for carry-over into the
    /// next build. An empty catalog yields an empty index.
    #[must_use]
    pub fn added_index(&self) -> HashMap<String, DateTime<Utc>> {
        let mut index = HashMap::new();
        for artist in &self.artists {
            for album in &artist.albums {
                for track in &album.tracks {
                    index.insert(track.id.clone(), track.added);
                }
            }
        }
        index
    }

    #[must_use]
    pub fn album_count(&self) -> usize {
        self.artists.iter().map(|a| a.albums.len()).sum()
    }
}
