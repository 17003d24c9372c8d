use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The format of an audio file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Flac,
    Mp3,
    Ogg,
    Wav,
    Aac,
    Other,
}

impl AudioFormat {
    /// Detect format from a file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "flac" => Self::Flac,
            "mp3" => Self::Mp3,
            "ogg" | "oga" => Self::Ogg,
            "wav" => Self::Wav,
            "aac" | "m4a" => Self::Aac,
            _ => Self::Other,
        }
    }

    /// Canonical file extension for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Wav => "wav",
            Self::Aac => "m4a",
            Self::Other => "bin",
        }
    }
}

/// One raw media record: the tag and file data extracted from a single
/// audio file before any provider correction. Immutable pipeline input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Track title (falls back to the file stem when untagged).
    pub title: String,

    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,

    pub track_number: Option<u32>,
    pub track_total: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_total: Option<u32>,

    /// Duration in whole seconds.
    pub duration_secs: Option<u32>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub composer: Option<String>,

    // --- Technical properties ---
    pub bitrate_kbps: Option<u32>,
    pub sample_rate_hz: Option<u32>,
    pub channels: Option<u8>,
    pub file_size: u64,
    pub format: AudioFormat,

    /// Stable path-like content key (`Artist/Album/Title.ext`). Drives
    /// deduplication and cross-run identity; never derived from provider
    /// data.
    pub store_key: String,

    /// File modification time (1-second tolerance for change detection).
    pub file_mtime: Option<DateTime<Utc>>,

    /// Public reference for embedded artwork, when the artwork collaborator
    /// produced one. Absence is a valid, expected state.
    pub artwork_url: Option<String>,

    /// Prior "added" timestamp carried from a previous catalog, if known
    /// at extraction time.
    pub added: Option<DateTime<Utc>>,
}

impl RawRecord {
    #[must_use]
    pub fn new(title: impl Into<String>, format: AudioFormat, store_key: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: None,
            album: None,
            album_artist: None,
            track_number: None,
            track_total: None,
            disc_number: None,
            disc_total: None,
            duration_secs: None,
            year: None,
            genre: None,
            composer: None,
            bitrate_kbps: None,
            sample_rate_hz: None,
            channels: None,
            file_size: 0,
            format,
            store_key: store_key.into(),
            file_mtime: None,
            artwork_url: None,
            added: None,
        }
    }

    /// The artist used for grouping: album artist when tagged, otherwise
    /// the track artist.
    #[must_use]
    pub fn grouping_artist(&self) -> Option<&str> {
        fn nonblank(value: Option<&str>) -> Option<&str> {
            value.filter(|s| !s.trim().is_empty())
        }
        nonblank(self.album_artist.as_deref()).or_else(|| nonblank(self.artist.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_from_extension() {
        assert_eq!(AudioFormat::from_extension("flac"), AudioFormat::Flac);
        assert_eq!(AudioFormat::from_extension("FLAC"), AudioFormat::Flac);
        assert_eq!(AudioFormat::from_extension("mp3"), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_extension("m4a"), AudioFormat::Aac);
        assert_eq!(AudioFormat::from_extension("oga"), AudioFormat::Ogg);
        assert_eq!(AudioFormat::from_extension("xyz"), AudioFormat::Other);
    }

    #[test]
    fn test_grouping_artist_prefers_album_artist() {
        let mut record = RawRecord::new("Song", AudioFormat::Mp3, "A/B/Song.mp3");
        record.artist = Some("Feature Artist".to_string());
        record.album_artist = Some("Main Artist".to_string());
        assert_eq!(record.grouping_artist(), Some("Main Artist"));
    }

    #[test]
    fn test_grouping_artist_falls_back_to_artist() {
        let mut record = RawRecord::new("Song", AudioFormat::Mp3, "A/B/Song.mp3");
        record.artist = Some("Only Artist".to_string());
        assert_eq!(record.grouping_artist(), Some("Only Artist"));
    }

    #[test]
    fn test_grouping_artist_ignores_blank_tags() {
        let mut record = RawRecord::new("Song", AudioFormat::Mp3, "A/B/Song.mp3");
        record.album_artist = Some("   ".to_string());
        assert_eq!(record.grouping_artist(), None);
    }
}
