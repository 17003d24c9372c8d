//! Scanning and raw metadata extraction.
//!
//! Walks the music directory for audio files and turns each one into a
//! [`RawRecord`] via `lofty`. Tag extraction failures degrade to
//! filename-derived records; an entirely empty scan is the one fatal
//! outcome, surfaced before any provider work starts.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::ItemKey;
use lofty::tag::Accessor;
use regex::Regex;
use walkdir::WalkDir;

use phono_core::model::{AudioFormat, RawRecord};
use phono_core::naming::{extract_year, normalize_artist_name, sanitize_key};

use crate::error::{PipelineError, PipelineResult};

#[allow(clippy::unwrap_used)]
static LEADING_TRACK_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+").unwrap());

fn is_audio_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        matches!(
            ext.to_string_lossy().to_lowercase().as_ref(),
            "flac" | "mp3" | "ogg" | "oga" | "wav" | "m4a" | "aac"
        )
    } else {
        false
    }
}

/// Collect all audio file paths under `music_dir`, sorted for
/// deterministic downstream ordering.
///
/// # Errors
/// Returns `MusicDirNotFound` when the root is missing and
/// `NoAudioFiles` when the walk finds nothing.
pub fn scan(music_dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    if !music_dir.is_dir() {
        return Err(PipelineError::MusicDirNotFound(music_dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(music_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file() && is_audio_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(PipelineError::NoAudioFiles(music_dir.to_path_buf()));
    }
    log::info!("Scan found {} audio files under {}", files.len(), music_dir.display());
    Ok(files)
}

/// Parse a "n" or "n/m" tag value into (number, total).
fn parse_number_pair(raw: &str) -> (Option<u32>, Option<u32>) {
    match raw.split_once('/') {
        Some((num, total)) => (num.trim().parse().ok(), total.trim().parse().ok()),
        None => (raw.trim().parse().ok(), None),
    }
}

/// Compute the store key for a record: sanitized
/// `AlbumArtist/Album/Title.ext` path. This is the track's stable
/// identity across runs and the dedup key during assembly.
pub fn store_key(artist: &str, album: &str, title: &str, format: AudioFormat) -> String {
    format!(
        "{}/{}/{}.{}",
        sanitize_key(artist, "Unknown-Artist"),
        sanitize_key(album, "Unknown-Album"),
        sanitize_key(title, "Unknown-Track"),
        format.extension()
    )
}

fn read_tags(record: &mut RawRecord, path: &Path) -> PipelineResult<()> {
    let tagged_file = lofty::read_from_path(path).map_err(|e| {
        PipelineError::Task(format!("tag read failed for {}: {e}", path.display()))
    })?;

    let properties = tagged_file.properties();
    let duration = properties.duration();
    if duration.as_secs() > 0 {
        record.duration_secs = Some(u32::try_from(duration.as_secs()).unwrap_or(u32::MAX));
    }
    record.bitrate_kbps = properties.audio_bitrate();
    record.sample_rate_hz = properties.sample_rate();
    record.channels = properties.channels();

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        if let Some(title) = tag.title() {
            if !title.trim().is_empty() {
                record.title = title.to_string();
            }
        }
        record.artist = tag.artist().map(|s| s.to_string());
        record.album = tag.album().map(|s| s.to_string());
        record.album_artist = tag
            .get_string(&ItemKey::AlbumArtist)
            .map(|s| s.to_string());
        record.genre = tag.genre().map(|s| s.to_string());
        record.composer = tag
            .get_string(&ItemKey::Composer)
            .map(|s| s.to_string());
        record.year = tag
            .get_string(&ItemKey::RecordingDate)
            .and_then(extract_year)
            .or_else(|| tag.year().map(|y| y as i32));

        if let Some(raw) = tag.get_string(&ItemKey::TrackNumber) {
            let (num, total) = parse_number_pair(raw);
            record.track_number = num;
            record.track_total = total;
        } else {
            record.track_number = tag.track();
        }
        if record.track_total.is_none() {
            record.track_total = tag.track_total();
        }

        if let Some(raw) = tag.get_string(&ItemKey::DiscNumber) {
            let (num, total) = parse_number_pair(raw);
            record.disc_number = num;
            record.disc_total = total;
        } else {
            record.disc_number = tag.disk();
        }
        if record.disc_total.is_none() {
            record.disc_total = tag.disk_total();
        }
    }

    Ok(())
}

/// Fallbacks for files with missing tags, derived from the file name and
/// the Artist/Album directory layout under the music root.
fn apply_fallbacks(record: &mut RawRecord, path: &Path, music_dir: &Path) {
    if record.track_number.is_none() {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if let Some(caps) = LEADING_TRACK_NUMBER.captures(name) {
                record.track_number = caps[1].parse().ok();
            }
        }
    }

    if let Ok(relative) = path.strip_prefix(music_dir) {
        let parts: Vec<_> = relative.components().collect();
        if parts.len() >= 3 {
            if record.artist.is_none() {
                record.artist = Some(parts[0].as_os_str().to_string_lossy().into_owned());
            }
            if record.album.is_none() {
                record.album = Some(parts[1].as_os_str().to_string_lossy().into_owned());
            }
        }
    }
}

/// Extract one [`RawRecord`] from an audio file.
///
/// Never fails outright: unreadable tags leave a record carrying only
/// filename-derived fields. Filesystem metadata (size, mtime) comes from
/// a plain stat; losing it is also non-fatal.
pub fn extract_record(path: &Path, music_dir: &Path) -> RawRecord {
    let format = path
        .extension()
        .map(|ext| AudioFormat::from_extension(&ext.to_string_lossy()))
        .unwrap_or(AudioFormat::Other);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Unknown Track".to_string());

    let mut record = RawRecord::new(stem, format, String::new());

    if let Ok(metadata) = std::fs::metadata(path) {
        record.file_size = metadata.len();
        record.file_mtime = metadata.modified().ok().map(Into::into);
    }

    if let Err(e) = read_tags(&mut record, path) {
        log::warn!("{e}");
    }
    apply_fallbacks(&mut record, path, music_dir);

    let grouping = record
        .grouping_artist()
        .map(normalize_artist_name)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown Artist".to_string());
    let album = record.album.clone().unwrap_or_else(|| "Unknown Album".to_string());
    record.store_key = store_key(&grouping, &album, &record.title, record.format);

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("/music/test.flac")));
        assert!(is_audio_file(Path::new("/music/test.MP3")));
        assert!(!is_audio_file(Path::new("/music/cover.jpg")));
        assert!(!is_audio_file(Path::new("/music/test")));
    }

    #[test]
    fn test_scan_missing_root_is_fatal() {
        let result = scan(Path::new("/no/such/music"));
        assert!(matches!(result, Err(PipelineError::MusicDirNotFound(_))));
    }

    #[test]
    fn test_scan_empty_is_fatal() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("readme.md"), "# hi").unwrap();
        let result = scan(temp.path());
        assert!(matches!(result, Err(PipelineError::NoAudioFiles(_))));
    }

    #[test]
    fn test_scan_finds_and_sorts_audio_files() {
        let temp = TempDir::new().unwrap();
        let sub = temp.path().join("b");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("z.mp3"), b"").unwrap();
        fs::write(temp.path().join("a.flac"), b"").unwrap();
        fs::write(temp.path().join("notes.txt"), b"").unwrap();

        let files = scan(temp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.flac"));
        assert!(files[1].ends_with("z.mp3"));
    }

    #[test]
    fn test_parse_number_pair() {
        assert_eq!(parse_number_pair("3/12"), (Some(3), Some(12)));
        assert_eq!(parse_number_pair("7"), (Some(7), None));
        assert_eq!(parse_number_pair("x/y"), (None, None));
    }

    #[test]
    fn test_store_key_shape() {
        assert_eq!(
            store_key("The Beatles", "Abbey Road", "Come Together", AudioFormat::Mp3),
            "The-Beatles/Abbey-Road/Come-Together.mp3"
        );
        assert_eq!(
            store_key("", "", "", AudioFormat::Flac),
            "Unknown-Artist/Unknown-Album/Unknown-Track.flac"
        );
    }

    #[test]
    fn test_untagged_file_falls_back_to_path_structure() {
        let temp = TempDir::new().unwrap();
        let album_dir = temp.path().join("The Beatles").join("Abbey Road");
        fs::create_dir_all(&album_dir).unwrap();
        let file = album_dir.join("01 Come Together.mp3");
        fs::write(&file, b"not really audio").unwrap();

        let record = extract_record(&file, temp.path());
        assert_eq!(record.title, "01 Come Together");
        assert_eq!(record.artist.as_deref(), Some("The Beatles"));
        assert_eq!(record.album.as_deref(), Some("Abbey Road"));
        assert_eq!(record.track_number, Some(1));
        assert_eq!(record.format, AudioFormat::Mp3);
        assert_eq!(
            record.store_key,
            "The-Beatles/Abbey-Road/01-Come-Together.mp3"
        );
    }
}
