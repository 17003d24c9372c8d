//! Provider result shapes.
//!
//! Every field is optional: a missing field means the provider had no
//! opinion, never an error. All shapes serialize, since provider results
//! are persisted in the durable lookup caches between runs.

use serde::{Deserialize, Serialize};

/// Artist metadata from the primary provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistInfo {
    pub bio: Option<String>,
    pub image_url: Option<String>,
    pub genre: Option<String>,
    pub style: Option<String>,
    pub mood: Option<String>,
}

/// Album metadata from the primary or tertiary provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumInfo {
    /// Corrected album name, when the provider knows a canonical spelling.
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub wiki: Option<String>,
    pub release_year: Option<i32>,
    pub genre: Option<String>,
    pub style: Option<String>,
    pub mood: Option<String>,
    pub theme: Option<String>,
}

impl AlbumInfo {
    /// Whether this result carries no useful data (used to decide when
    /// the tertiary fallback provider is worth querying).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image_url.is_none() && self.wiki.is_none() && self.genre.is_none()
    }

    /// Fill gaps from a fallback result, keeping every present field.
    #[must_use]
    pub fn merged_with(self, fallback: Self) -> Self {
        Self {
            name: self.name.or(fallback.name),
            image_url: self.image_url.or(fallback.image_url),
            wiki: self.wiki.or(fallback.wiki),
            release_year: self.release_year.or(fallback.release_year),
            genre: self.genre.or(fallback.genre),
            style: self.style.or(fallback.style),
            mood: self.mood.or(fallback.mood),
            theme: self.theme.or(fallback.theme),
        }
    }
}

/// Track metadata from the primary provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Corrected track name.
    pub name: Option<String>,
    /// Album this track belongs to, per the provider (used to recover a
    /// canonical album name when the album search itself misses).
    pub album: Option<String>,
    pub genre: Option<String>,
    pub style: Option<String>,
    pub mood: Option<String>,
    pub theme: Option<String>,
}

/// Detailed artist information from the secondary provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistDetails {
    pub mbid: Option<String>,
    pub name: Option<String>,
    /// person, group, orchestra, choir, ...
    pub artist_type: Option<String>,
    /// Country or region.
    pub area: Option<String>,
    /// Formation or birth date.
    pub begin_date: Option<String>,
    /// Dissolution or death date.
    pub end_date: Option<String>,
    pub disambiguation: Option<String>,
    pub tags: Vec<String>,
}

/// Detailed release information from the secondary provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDetails {
    pub mbid: Option<String>,
    pub title: Option<String>,
    pub release_year: Option<i32>,
    /// album, single, EP, compilation, ...
    pub release_type: Option<String>,
    pub country: Option<String>,
    pub label: Option<String>,
    pub barcode: Option<String>,
    /// CD, vinyl, digital, ...
    pub media_format: Option<String>,
    pub tags: Vec<String>,
}
