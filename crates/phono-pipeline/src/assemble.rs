//! Catalog assembly: grouping raw records and building the entity tree.
//!
//! Assembly is deterministic: artists sort by grouping key, albums by
//! display name, tracks by (track number, title) with missing numbers
//! sorted last. Every entity is rebuilt from scratch; the only carried
//! state is each track's `added` timestamp, looked up by store key in
//! the prior snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use phono_core::model::{
    Catalog, CatalogAlbum, CatalogArtist, CatalogTrack, RawRecord,
};
use phono_core::naming::{group_key, normalize_artist_name, sanitize_key};

use crate::merge::{ResolvedAlbum, ResolvedArtist};
use crate::store::MediaStore;

/// Raw records for one album, grouped under the local tag name.
#[derive(Debug, Clone)]
pub struct AlbumGroup {
    /// Album name as tagged locally (pre-correction).
    pub name: String,
    pub records: Vec<RawRecord>,
}

/// Raw records for one artist grouping key.
#[derive(Debug, Clone)]
pub struct ArtistGroup {
    pub key: String,
    /// First-seen raw spelling for the key; later synonyms never
    /// overwrite it.
    pub display_name: String,
    pub albums: Vec<AlbumGroup>,
}

/// Group raw records into the artist -> album -> records tree.
///
/// Grouping uses the album artist, falling back to the track artist,
/// then "Unknown Artist". Output is sorted by grouping key and album
/// name, which fixes the fan-out order for everything downstream.
pub fn group_records(records: Vec<RawRecord>) -> Vec<ArtistGroup> {
    let mut by_artist: HashMap<String, (String, HashMap<String, Vec<RawRecord>>)> = HashMap::new();

    for record in records {
        let display = record
            .grouping_artist()
            .map(normalize_artist_name)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown Artist".to_string());
        let key = group_key(&display);
        let album = record
            .album
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| "Unknown Album".to_string());

        let entry = by_artist
            .entry(key)
            .or_insert_with(|| (display, HashMap::new()));
        entry.1.entry(album).or_default().push(record);
    }

    let mut groups: Vec<ArtistGroup> = by_artist
        .into_iter()
        .map(|(key, (display_name, albums))| {
            let mut albums: Vec<AlbumGroup> = albums
                .into_iter()
                .map(|(name, records)| AlbumGroup { name, records })
                .collect();
            albums.sort_by(|a, b| a.name.cmp(&b.name));
            ArtistGroup {
                key,
                display_name,
                albums,
            }
        })
        .collect();
    groups.sort_by(|a, b| a.key.cmp(&b.key));
    groups
}

/// One artist's fully resolved inputs to assembly.
#[derive(Debug)]
pub struct ArtistBuild {
    pub display_name: String,
    pub info: ResolvedArtist,
    /// Resolved albums in local-name order, pre-regroup.
    pub albums: Vec<(ResolvedAlbum, Vec<RawRecord>)>,
}

/// Merge albums whose resolved display names collapsed to one.
///
/// Name correction can map several local folders ("Abbey Road", "Abbey
/// Road (Deluxe Edition)") onto one canonical album. The first album to
/// claim a display name keeps its resolved metadata; later ones only
/// contribute their records.
fn regroup_by_display_name(
    albums: Vec<(ResolvedAlbum, Vec<RawRecord>)>,
) -> Vec<(ResolvedAlbum, Vec<RawRecord>)> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, (ResolvedAlbum, Vec<RawRecord>)> = HashMap::new();

    for (resolved, records) in albums {
        let name = resolved.display_name.clone();
        match merged.get_mut(&name) {
            Some((_, existing)) => existing.extend(records),
            None => {
                order.push(name.clone());
                merged.insert(name, (resolved, records));
            }
        }
    }

    let mut regrouped: Vec<(ResolvedAlbum, Vec<RawRecord>)> = order
        .into_iter()
        .filter_map(|name| merged.remove(&name))
        .collect();
    regrouped.sort_by(|a, b| a.0.display_name.cmp(&b.0.display_name));
    regrouped
}

fn track_sort_key(record: &RawRecord) -> (u32, String) {
    (
        record.track_number.unwrap_or(u32::MAX),
        record.title.clone(),
    )
}

fn build_track(
    record: RawRecord,
    artist_name: &str,
    album: &ResolvedAlbum,
    added_index: &HashMap<String, DateTime<Utc>>,
    store: &dyn MediaStore,
) -> CatalogTrack {
    let added = added_index
        .get(&record.store_key)
        .copied()
        .or(record.added)
        .unwrap_or_else(Utc::now);

    CatalogTrack {
        url: store.public_url(&record.store_key),
        artwork_url: record.artwork_url.clone().or_else(|| album.image_url.clone()),
        id: record.store_key,
        title: record.title,
        artist: record.artist.or_else(|| Some(artist_name.to_string())),
        album: album.display_name.clone(),
        track_number: record.track_number,
        track_total: record.track_total,
        disc_number: record.disc_number,
        disc_total: record.disc_total,
        duration_secs: record.duration_secs,
        year: record.year.or(album.release_year),
        genre: record.genre.or_else(|| album.genre.clone()),
        style: album.style.clone(),
        mood: album.mood.clone(),
        theme: album.theme.clone(),
        composer: record.composer,
        bitrate_kbps: record.bitrate_kbps,
        sample_rate_hz: record.sample_rate_hz,
        channels: record.channels,
        file_size: record.file_size,
        format: record.format,
        added,
    }
}

fn build_album(
    artist_name: &str,
    resolved: ResolvedAlbum,
    mut records: Vec<RawRecord>,
    added_index: &HashMap<String, DateTime<Utc>>,
    seen_keys: &mut std::collections::HashSet<String>,
    store: &dyn MediaStore,
) -> CatalogAlbum {
    records.sort_by_key(track_sort_key);

    let mut tracks = Vec::with_capacity(records.len());
    for record in records {
        // First occurrence wins; folders that merged after name
        // correction routinely hold byte-identical duplicates.
        if !seen_keys.insert(record.store_key.clone()) {
            log::debug!("Dropping duplicate track {}", record.store_key);
            continue;
        }
        tracks.push(build_track(record, artist_name, &resolved, added_index, store));
    }

    CatalogAlbum {
        id: CatalogAlbum::make_id(artist_name, &resolved.display_name),
        name: resolved.display_name,
        artist: artist_name.to_string(),
        image_url: resolved.image_url,
        wiki: resolved.wiki,
        release_year: resolved.release_year,
        genre: resolved.genre,
        style: resolved.style,
        mood: resolved.mood,
        theme: resolved.theme,
        release_type: resolved.release_type,
        country: resolved.country,
        label: resolved.label,
        barcode: resolved.barcode,
        media_format: resolved.media_format,
        tracks,
    }
}

/// Assemble the final catalog from per-artist resolved inputs.
///
/// `builds` arrive in sorted grouping-key order from the scheduler and
/// that order is preserved. Store-key deduplication is global across the
/// whole catalog, first occurrence wins.
pub fn assemble(
    builds: Vec<ArtistBuild>,
    added_index: &HashMap<String, DateTime<Utc>>,
    store: &dyn MediaStore,
) -> Catalog {
    let mut seen_keys = std::collections::HashSet::new();
    let mut artists = Vec::with_capacity(builds.len());
    let mut total_tracks = 0;

    for build in builds {
        let albums: Vec<CatalogAlbum> = regroup_by_display_name(build.albums)
            .into_iter()
            .map(|(resolved, records)| {
                build_album(
                    &build.display_name,
                    resolved,
                    records,
                    added_index,
                    &mut seen_keys,
                    store,
                )
            })
            .collect();
        total_tracks += albums.iter().map(|a| a.tracks.len()).sum::<usize>();

        artists.push(CatalogArtist {
            id: sanitize_key(&build.display_name, "Unknown-Artist"),
            name: build.display_name,
            bio: build.info.bio,
            image_url: build.info.image_url,
            genre: build.info.genre,
            style: build.info.style,
            mood: build.info.mood,
            artist_type: build.info.artist_type,
            area: build.info.area,
            begin_date: build.info.begin_date,
            end_date: build.info.end_date,
            disambiguation: build.info.disambiguation,
            albums,
        });
    }

    Catalog {
        artists,
        total_tracks,
        generated_at: Some(Utc::now()),
    }
}
