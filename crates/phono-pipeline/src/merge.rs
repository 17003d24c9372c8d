//! Cascade merging of provider results and local tag data.
//!
//! Every output field is resolved by walking a fixed, field-specific
//! priority order and taking the first present value. No blending: a
//! lower-priority source never contributes to a field a higher-priority
//! source filled. The functions here are pure so the cascade is testable
//! with synthetic inputs and no I/O.
//!
//! Source order per field (established by the original catalog service):
//! display name TheAudioDB -> track-search correction -> MusicBrainz ->
//! local tag; release year MusicBrainz -> TheAudioDB -> local tag; genre
//! album -> artist -> local tag; structured release detail (type,
//! country, label, barcode, media format) MusicBrainz only.

use phono_core::model::{AlbumInfo, ArtistDetails, ArtistInfo, ReleaseDetails};

/// Take the first present candidate, in order.
pub fn first_of<T>(candidates: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    candidates.into_iter().flatten().next()
}

/// Like [`first_of`] for strings, additionally skipping blank candidates.
pub fn first_nonblank(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

/// Locally-extracted album facts used as the cascade's last resort.
#[derive(Debug, Clone, Default)]
pub struct LocalAlbumFacts {
    /// Local fallback album name, edition suffix already stripped so
    /// that deluxe and plain pressings resolve to one display name.
    pub name: String,
    pub year: Option<i32>,
    pub genre: Option<String>,
    /// Embedded artwork reference from any track in the album.
    pub artwork_url: Option<String>,
}

/// Final merged artist fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedArtist {
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
}

/// Final merged album fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAlbum {
    /// Resolved display name; always present (local name closes the
    /// cascade).
    pub display_name: String,
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
}

/// Merge artist-level provider results.
///
/// TheAudioDB supplies the descriptive fields, MusicBrainz the
/// structured identity fields; the two do not overlap, so this is a
/// straight projection with blank-filtering.
pub fn resolve_artist(audiodb: &ArtistInfo, details: &ArtistDetails) -> ResolvedArtist {
    ResolvedArtist {
        bio: first_nonblank([audiodb.bio.clone()]),
        image_url: first_nonblank([audiodb.image_url.clone()]),
        genre: first_nonblank([audiodb.genre.clone()]),
        style: first_nonblank([audiodb.style.clone()]),
        mood: first_nonblank([audiodb.mood.clone()]),
        artist_type: first_nonblank([details.artist_type.clone()]),
        area: first_nonblank([details.area.clone()]),
        begin_date: first_nonblank([details.begin_date.clone()]),
        end_date: first_nonblank([details.end_date.clone()]),
        disambiguation: first_nonblank([details.disambiguation.clone()]),
    }
}

/// Merge album-level provider results against local facts.
///
/// `audiodb` carries TheAudioDB's answer after any track-search name
/// correction; `track_search_name` is the corrected album name that
/// correction produced, if any. The Last.fm fallback only fills gaps
/// when TheAudioDB came back essentially empty, matching its role as a
/// tertiary source.
pub fn resolve_album(
    audiodb: &AlbumInfo,
    lastfm: &AlbumInfo,
    release: &ReleaseDetails,
    track_search_name: Option<&str>,
    local: &LocalAlbumFacts,
    artist_genre: Option<&str>,
) -> ResolvedAlbum {
    let primary = if audiodb.is_empty() {
        audiodb.clone().merged_with(lastfm.clone())
    } else {
        audiodb.clone()
    };

    let display_name = first_nonblank([
        primary.name.clone(),
        track_search_name.map(str::to_string),
        release.title.clone(),
    ])
    .unwrap_or_else(|| local.name.clone());

    let genre = first_nonblank([
        primary.genre.clone(),
        artist_genre.map(str::to_string),
        local.genre.clone(),
    ]);

    ResolvedAlbum {
        display_name,
        image_url: first_nonblank([primary.image_url.clone(), local.artwork_url.clone()]),
        wiki: first_nonblank([primary.wiki.clone()]),
        release_year: first_of([release.release_year, primary.release_year, local.year]),
        genre,
        style: first_nonblank([primary.style.clone()]),
        mood: first_nonblank([primary.mood.clone()]),
        theme: first_nonblank([primary.theme.clone()]),
        release_type: first_nonblank([release.release_type.clone()]),
        country: first_nonblank([release.country.clone()]),
        label: first_nonblank([release.label.clone()]),
        barcode: first_nonblank([release.barcode.clone()]),
        media_format: first_nonblank([release.media_format.clone()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> LocalAlbumFacts {
        LocalAlbumFacts {
            name: "Abbey Road (Deluxe Edition)".to_string(),
            year: Some(2019),
            genre: Some("Classic Rock".to_string()),
            artwork_url: Some("file://embedded.jpg".to_string()),
        }
    }

    #[test]
    fn test_first_of_takes_first_present() {
        assert_eq!(first_of([None, Some(2), Some(3)]), Some(2));
        assert_eq!(first_of::<i32>([None, None]), None);
    }

    #[test]
    fn test_first_nonblank_skips_whitespace() {
        assert_eq!(
            first_nonblank([Some("  ".to_string()), Some("Rock".to_string())]),
            Some("Rock".to_string())
        );
        assert_eq!(first_nonblank([None, Some(String::new())]), None);
    }

    #[test]
    fn test_priority_one_dominates() {
        // With non-empty values at priorities 1 and 2, the result is the
        // priority-1 value regardless of what priority 3 holds.
        let audiodb = AlbumInfo {
            name: Some("Abbey Road".to_string()),
            wiki: Some("from audiodb".to_string()),
            genre: Some("Rock".to_string()),
            ..AlbumInfo::default()
        };
        let lastfm = AlbumInfo {
            name: Some("Abbey Rd".to_string()),
            wiki: Some("from lastfm".to_string()),
            ..AlbumInfo::default()
        };
        let release = ReleaseDetails {
            title: Some("Abbey Road (MB)".to_string()),
            ..ReleaseDetails::default()
        };

        let resolved = resolve_album(&audiodb, &lastfm, &release, None, &local(), None);
        assert_eq!(resolved.display_name, "Abbey Road");
        assert_eq!(resolved.wiki.as_deref(), Some("from audiodb"));
        assert_eq!(resolved.genre.as_deref(), Some("Rock"));
    }

    #[test]
    fn test_lastfm_fills_gaps_only_when_primary_is_empty() {
        let audiodb = AlbumInfo::default();
        let lastfm = AlbumInfo {
            name: Some("Abbey Road".to_string()),
            wiki: Some("lastfm wiki".to_string()),
            image_url: Some("https://lastfm/img.jpg".to_string()),
            ..AlbumInfo::default()
        };
        let resolved = resolve_album(
            &audiodb,
            &lastfm,
            &ReleaseDetails::default(),
            None,
            &local(),
            None,
        );
        assert_eq!(resolved.display_name, "Abbey Road");
        assert_eq!(resolved.wiki.as_deref(), Some("lastfm wiki"));
        assert_eq!(resolved.image_url.as_deref(), Some("https://lastfm/img.jpg"));
    }

    #[test]
    fn test_track_search_correction_beats_musicbrainz() {
        let release = ReleaseDetails {
            title: Some("Abbey Road (MB)".to_string()),
            ..ReleaseDetails::default()
        };
        let resolved = resolve_album(
            &AlbumInfo::default(),
            &AlbumInfo::default(),
            &release,
            Some("Abbey Road"),
            &local(),
            None,
        );
        assert_eq!(resolved.display_name, "Abbey Road");
    }

    #[test]
    fn test_local_name_closes_the_cascade() {
        let resolved = resolve_album(
            &AlbumInfo::default(),
            &AlbumInfo::default(),
            &ReleaseDetails::default(),
            None,
            &local(),
            None,
        );
        assert_eq!(resolved.display_name, "Abbey Road (Deluxe Edition)");
        assert_eq!(resolved.image_url.as_deref(), Some("file://embedded.jpg"));
        assert_eq!(resolved.release_year, Some(2019));
    }

    #[test]
    fn test_musicbrainz_release_year_preferred() {
        let audiodb = AlbumInfo {
            name: Some("Abbey Road".to_string()),
            release_year: Some(2019),
            ..AlbumInfo::default()
        };
        let release = ReleaseDetails {
            release_year: Some(1969),
            ..ReleaseDetails::default()
        };
        let resolved = resolve_album(
            &audiodb,
            &AlbumInfo::default(),
            &release,
            None,
            &local(),
            None,
        );
        assert_eq!(resolved.release_year, Some(1969));
    }

    #[test]
    fn test_genre_falls_back_to_artist_then_local() {
        let resolved = resolve_album(
            &AlbumInfo::default(),
            &AlbumInfo::default(),
            &ReleaseDetails::default(),
            None,
            &local(),
            Some("Psychedelic Rock"),
        );
        assert_eq!(resolved.genre.as_deref(), Some("Psychedelic Rock"));

        let resolved = resolve_album(
            &AlbumInfo::default(),
            &AlbumInfo::default(),
            &ReleaseDetails::default(),
            None,
            &local(),
            None,
        );
        assert_eq!(resolved.genre.as_deref(), Some("Classic Rock"));
    }

    #[test]
    fn test_resolve_artist_merges_both_sources() {
        let info = ArtistInfo {
            bio: Some("An English rock band.".to_string()),
            genre: Some("Rock".to_string()),
            ..ArtistInfo::default()
        };
        let details = ArtistDetails {
            artist_type: Some("Group".to_string()),
            area: Some("United Kingdom".to_string()),
            begin_date: Some("1960".to_string()),
            ..ArtistDetails::default()
        };
        let resolved = resolve_artist(&info, &details);
        assert_eq!(resolved.bio.as_deref(), Some("An English rock band."));
        assert_eq!(resolved.artist_type.as_deref(), Some("Group"));
        assert_eq!(resolved.area.as_deref(), Some("United Kingdom"));
        assert!(resolved.end_date.is_none());
    }
}
