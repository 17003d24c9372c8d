//! The catalog build pipeline: phase machine and orchestration.
//!
//! A build walks a strictly forward phase sequence; the three terminal
//! states are reachable from any in-progress phase. Global progress is a
//! weighted sum of fixed per-phase weights plus fractional completion
//! within the active phase, so it increases monotonically even though
//! each phase resets its local counter. Progress is published over a
//! `watch` channel for whoever wants to render it.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::watch;

use phono_core::model::{AudioFormat, RawRecord};

use crate::assemble::{self, AlbumGroup, ArtistBuild, ArtistGroup};
use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::extract;
use crate::merge::{self, LocalAlbumFacts, ResolvedAlbum, ResolvedArtist};
use crate::providers::titles::strip_edition_suffix;
use crate::providers::{AudioDbClient, LastFmClient, MusicBrainzClient};
use crate::schedule::{run_ordered, CancelFlag};
use crate::store::{self, LocalStore};

/// Pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    FetchingExisting,
    Extracting,
    ArtistCorrections,
    AlbumCorrections,
    Assembling,
    Persisting,
    Complete,
    Cancelled,
    Failed,
}

impl Phase {
    /// Share of total progress this phase accounts for. The in-progress
    /// weights sum to 1.0.
    fn weight(self) -> f64 {
        match self {
            Phase::Scanning => 0.05,
            Phase::FetchingExisting => 0.05,
            Phase::Extracting => 0.20,
            Phase::ArtistCorrections => 0.30,
            Phase::AlbumCorrections => 0.25,
            Phase::Assembling => 0.10,
            Phase::Persisting => 0.05,
            Phase::Idle | Phase::Complete | Phase::Cancelled | Phase::Failed => 0.0,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Cancelled | Phase::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Scanning => "scanning",
            Phase::FetchingExisting => "fetching-existing",
            Phase::Extracting => "extracting-metadata",
            Phase::ArtistCorrections => "fetching-corrections(artist)",
            Phase::AlbumCorrections => "fetching-corrections(album)",
            Phase::Assembling => "assembling",
            Phase::Persisting => "persisting",
            Phase::Complete => "complete",
            Phase::Cancelled => "cancelled",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A progress snapshot published on every phase entry and unit tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub phase: Phase,
    /// Monotone overall completion in `0.0..=1.0`.
    pub fraction: f64,
}

#[derive(Debug)]
struct TrackerState {
    base: f64,
    phase: Phase,
    done: usize,
    total: usize,
}

/// Publishes monotone pipeline progress over a watch channel.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    sender: Arc<watch::Sender<Progress>>,
    state: Arc<Mutex<TrackerState>>,
}

impl ProgressTracker {
    fn new() -> Self {
        let (sender, _) = watch::channel(Progress {
            phase: Phase::Idle,
            fraction: 0.0,
        });
        Self {
            sender: Arc::new(sender),
            state: Arc::new(Mutex::new(TrackerState {
                base: 0.0,
                phase: Phase::Idle,
                done: 0,
                total: 0,
            })),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.sender.subscribe()
    }

    fn publish(&self, state: &TrackerState) {
        let within = if state.total == 0 {
            0.0
        } else {
            state.done as f64 / state.total as f64
        };
        let fraction = (state.base + state.phase.weight() * within).min(1.0);
        self.sender.send_replace(Progress {
            phase: state.phase,
            fraction,
        });
    }

    /// Enter a phase with `total` units of expected work. Banks the
    /// weight of the previous phase first, keeping the fraction monotone.
    #[allow(clippy::expect_used)]
    fn enter(&self, phase: Phase, total: usize) {
        let mut state = self.state.lock().expect("progress lock poisoned");
        state.base += state.phase.weight();
        state.phase = phase;
        state.done = 0;
        state.total = total;
        log::info!("Phase: {phase}");
        self.publish(&state);
    }

    /// Record one completed unit inside the current phase.
    #[allow(clippy::expect_used)]
    fn tick(&self) {
        let mut state = self.state.lock().expect("progress lock poisoned");
        state.done = (state.done + 1).min(state.total);
        self.publish(&state);
    }

    #[allow(clippy::expect_used)]
    fn terminal(&self, phase: Phase) {
        let mut state = self.state.lock().expect("progress lock poisoned");
        if phase == Phase::Complete {
            state.base = 1.0;
        }
        state.phase = phase;
        state.done = 0;
        state.total = 0;
        let fraction = state.base.min(1.0);
        self.sender.send_replace(Progress { phase, fraction });
    }
}

/// The configured provider clients. Any client may be absent: offline
/// mode disables all three, and Last.fm also needs an API key.
#[derive(Debug, Default)]
pub struct Providers {
    pub audiodb: Option<Arc<AudioDbClient>>,
    pub musicbrainz: Option<Arc<MusicBrainzClient>>,
    pub lastfm: Option<Arc<LastFmClient>>,
}

impl Providers {
    /// Build clients from config, loading their durable caches.
    ///
    /// # Errors
    /// Returns an error when an HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        if config.offline {
            log::info!("Offline mode: provider lookups disabled");
            return Ok(Self::disabled());
        }
        let cache_dir = &config.cache_dir;
        let audiodb = AudioDbClient::new(&config.audiodb_api_key, cache_dir)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        let musicbrainz = MusicBrainzClient::new(cache_dir)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        let lastfm = match &config.lastfm_api_key {
            Some(key) => Some(Arc::new(
                LastFmClient::new(key.clone(), cache_dir)
                    .map_err(|e| PipelineError::Config(e.to_string()))?,
            )),
            None => {
                log::info!("No Last.fm API key configured; Last.fm fallback disabled");
                None
            }
        };
        Ok(Self {
            audiodb: Some(Arc::new(audiodb)),
            musicbrainz: Some(Arc::new(musicbrainz)),
            lastfm,
        })
    }

    /// All lookups disabled; every resolution falls through to local tags.
    pub fn disabled() -> Self {
        Self::default()
    }

    async fn save_caches(&self) -> PipelineResult<()> {
        if let Some(audiodb) = &self.audiodb {
            audiodb.save_caches().await?;
        }
        if let Some(musicbrainz) = &self.musicbrainz {
            musicbrainz.save_caches().await?;
        }
        if let Some(lastfm) = &self.lastfm {
            lastfm.save_caches().await?;
        }
        Ok(())
    }
}

/// Terminal outcome of a build that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Complete,
    Cancelled,
}

/// Summary returned by [`CatalogPipeline::run`].
#[derive(Debug)]
pub struct BuildReport {
    pub outcome: BuildOutcome,
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
    pub files_scanned: usize,
    pub elapsed: std::time::Duration,
}

impl BuildReport {
    fn cancelled(files_scanned: usize, started: Instant) -> Self {
        Self {
            outcome: BuildOutcome::Cancelled,
            artists: 0,
            albums: 0,
            tracks: 0,
            files_scanned,
            elapsed: started.elapsed(),
        }
    }
}

/// Drives a full catalog build.
#[derive(Debug)]
pub struct CatalogPipeline {
    config: Config,
    providers: Providers,
    media_store: LocalStore,
    cancel: CancelFlag,
    progress: ProgressTracker,
    dry_run: bool,
}

impl CatalogPipeline {
    pub fn new(config: Config, providers: Providers) -> Self {
        let media_store = LocalStore::new(config.public_url_base.clone());
        Self {
            config,
            providers,
            media_store,
            cancel: CancelFlag::new(),
            progress: ProgressTracker::new(),
            dry_run: false,
        }
    }

    /// Resolve and assemble, but skip writing the catalog document.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Flag that trips cooperative cancellation.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Channel carrying live progress snapshots.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Run the whole build.
    ///
    /// # Errors
    /// Fails only on fatal conditions: invalid config, empty scan, or an
    /// I/O failure while persisting. Provider trouble never surfaces
    /// here; affected entities degrade to locally-tagged data.
    pub async fn run(&self) -> PipelineResult<BuildReport> {
        match self.run_inner().await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.progress.terminal(Phase::Failed);
                Err(e)
            }
        }
    }

    async fn run_inner(&self) -> PipelineResult<BuildReport> {
        let started = Instant::now();
        self.config.validate()?;
        let music_dir = self
            .config
            .music_dir
            .clone()
            .ok_or_else(|| PipelineError::Config("music_dir is not set".to_string()))?;

        // Scanning
        self.progress.enter(Phase::Scanning, 1);
        let files = extract::scan(&music_dir)?;
        let files_scanned = files.len();
        self.progress.tick();

        // Fetching existing catalog (added-timestamp carry-over)
        self.progress.enter(Phase::FetchingExisting, 1);
        let added_index = store::load_added_index(&self.config.catalog_path);
        if !added_index.is_empty() {
            log::info!("Prior catalog provides {} added timestamps", added_index.len());
        }
        self.progress.tick();

        // Extracting metadata
        self.progress.enter(Phase::Extracting, files.len());
        let records = self.extract_all(files, &music_dir).await?;
        if self.cancel.is_cancelled() {
            self.progress.terminal(Phase::Cancelled);
            return Ok(BuildReport::cancelled(files_scanned, started));
        }

        let groups = assemble::group_records(records);

        // Artist corrections
        self.progress.enter(Phase::ArtistCorrections, groups.len());
        let artist_infos = self.resolve_artists(&groups).await?;
        if self.cancel.is_cancelled() {
            self.progress.terminal(Phase::Cancelled);
            return Ok(BuildReport::cancelled(files_scanned, started));
        }

        // Album corrections
        let album_total: usize = groups.iter().map(|g| g.albums.len()).sum();
        self.progress.enter(Phase::AlbumCorrections, album_total);
        let builds = self.resolve_albums(groups, artist_infos).await?;
        if self.cancel.is_cancelled() {
            self.progress.terminal(Phase::Cancelled);
            return Ok(BuildReport::cancelled(files_scanned, started));
        }

        // Assembling
        self.progress.enter(Phase::Assembling, 1);
        let catalog = assemble::assemble(builds, &added_index, &self.media_store);
        self.progress.tick();

        // Persisting
        self.progress.enter(Phase::Persisting, 1);
        if self.dry_run {
            log::info!(
                "Dry run: skipping catalog write to {}",
                self.config.catalog_path.display()
            );
        } else {
            store::write_catalog(&catalog, &self.config.catalog_path)?;
        }
        self.providers.save_caches().await?;
        self.progress.tick();

        let report = BuildReport {
            outcome: BuildOutcome::Complete,
            artists: catalog.artists.len(),
            albums: catalog.album_count(),
            tracks: catalog.total_tracks,
            files_scanned,
            elapsed: started.elapsed(),
        };
        self.progress.terminal(Phase::Complete);
        Ok(report)
    }

    async fn extract_all(
        &self,
        files: Vec<std::path::PathBuf>,
        music_dir: &Path,
    ) -> PipelineResult<Vec<RawRecord>> {
        let music_dir = music_dir.to_path_buf();
        let progress = self.progress.clone();
        run_ordered(files, self.config.extract_workers, &self.cancel, move |path| {
            let music_dir = music_dir.clone();
            let progress = progress.clone();
            async move {
                let fallback_path = path.clone();
                let fallback_root = music_dir.clone();
                let record = match tokio::task::spawn_blocking(move || {
                    extract::extract_record(&path, &music_dir)
                })
                .await
                {
                    Ok(record) => record,
                    Err(e) => {
                        log::error!(
                            "Extraction task failed for {}: {e}",
                            fallback_path.display()
                        );
                        degraded_record(&fallback_path, &fallback_root)
                    }
                };
                progress.tick();
                record
            }
        })
        .await
    }

    async fn resolve_artists(
        &self,
        groups: &[ArtistGroup],
    ) -> PipelineResult<Vec<ResolvedArtist>> {
        let names: Vec<String> = groups.iter().map(|g| g.display_name.clone()).collect();
        let audiodb = self.providers.audiodb.clone();
        let musicbrainz = self.providers.musicbrainz.clone();
        let progress = self.progress.clone();

        run_ordered(names, self.config.artist_workers, &self.cancel, move |name| {
            let audiodb = audiodb.clone();
            let musicbrainz = musicbrainz.clone();
            let progress = progress.clone();
            async move {
                let info_fut = async {
                    match &audiodb {
                        Some(client) => client.artist_info(&name).await,
                        None => Default::default(),
                    }
                };
                let details_fut = async {
                    match &musicbrainz {
                        Some(client) => client.artist_details(&name).await,
                        None => Default::default(),
                    }
                };
                let (info, details) = tokio::join!(info_fut, details_fut);
                progress.tick();
                merge::resolve_artist(&info, &details)
            }
        })
        .await
    }

    async fn resolve_albums(
        &self,
        groups: Vec<ArtistGroup>,
        artist_infos: Vec<ResolvedArtist>,
    ) -> PipelineResult<Vec<ArtistBuild>> {
        // The artist fan-out may have been cut short by cancellation;
        // zip drops the artists that never resolved.
        let units: Vec<(ArtistGroup, ResolvedArtist)> =
            groups.into_iter().zip(artist_infos).collect();

        let audiodb = self.providers.audiodb.clone();
        let musicbrainz = self.providers.musicbrainz.clone();
        let lastfm = self.providers.lastfm.clone();
        let progress = self.progress.clone();
        let cancel = self.cancel.clone();
        let album_workers = self.config.album_workers;

        run_ordered(
            units,
            self.config.artist_workers,
            &self.cancel,
            move |(group, info)| {
                let audiodb = audiodb.clone();
                let musicbrainz = musicbrainz.clone();
                let lastfm = lastfm.clone();
                let progress = progress.clone();
                let cancel = cancel.clone();
                async move {
                    let artist_name = group.display_name.clone();
                    let artist_genre = info.genre.clone();
                    let albums = run_ordered(
                        group.albums,
                        album_workers,
                        &cancel,
                        move |album_group| {
                            let audiodb = audiodb.clone();
                            let musicbrainz = musicbrainz.clone();
                            let lastfm = lastfm.clone();
                            let progress = progress.clone();
                            let artist = artist_name.clone();
                            let genre = artist_genre.clone();
                            async move {
                                let resolved = resolve_album_unit(
                                    audiodb.as_deref(),
                                    musicbrainz.as_deref(),
                                    lastfm.as_deref(),
                                    &artist,
                                    genre.as_deref(),
                                    &album_group,
                                )
                                .await;
                                progress.tick();
                                (resolved, album_group.records)
                            }
                        },
                    )
                    .await
                    .unwrap_or_else(|e| {
                        log::error!("Album resolution failed for {}: {e}", group.display_name);
                        Vec::new()
                    });

                    ArtistBuild {
                        display_name: group.display_name,
                        info,
                        albums,
                    }
                }
            },
        )
        .await
    }
}

/// Minimal record for a file whose extraction task died. Carries only
/// path-derived fields, with a real store key so distinct files never
/// collapse into each other during assembly dedup.
fn degraded_record(path: &Path, music_dir: &Path) -> RawRecord {
    let format = path
        .extension()
        .map(|ext| AudioFormat::from_extension(&ext.to_string_lossy()))
        .unwrap_or(AudioFormat::Other);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Unknown Track".to_string());

    let mut record = RawRecord::new(stem, format, String::new());

    let relative = path.strip_prefix(music_dir).unwrap_or(path);
    let parts: Vec<_> = relative.components().collect();
    if parts.len() >= 3 {
        record.artist = Some(parts[0].as_os_str().to_string_lossy().into_owned());
        record.album = Some(parts[1].as_os_str().to_string_lossy().into_owned());
    }

    let artist = record.artist.as_deref().unwrap_or("Unknown Artist");
    let album = record.album.as_deref().unwrap_or("Unknown Album");
    record.store_key = extract::store_key(artist, album, &record.title, record.format);
    record
}

/// Resolve one album: parallel provider fetches, track-search name
/// correction when the primary search misses, then the cascade merge.
async fn resolve_album_unit(
    audiodb: Option<&AudioDbClient>,
    musicbrainz: Option<&MusicBrainzClient>,
    lastfm: Option<&LastFmClient>,
    artist: &str,
    artist_genre: Option<&str>,
    group: &AlbumGroup,
) -> ResolvedAlbum {
    let local = LocalAlbumFacts {
        name: strip_edition_suffix(&group.name),
        year: group.records.iter().find_map(|r| r.year),
        genre: group.records.iter().find_map(|r| r.genre.clone()),
        artwork_url: group.records.iter().find_map(|r| r.artwork_url.clone()),
    };

    let audiodb_fut = async {
        match audiodb {
            Some(client) => client.album_info(artist, &group.name).await,
            None => Default::default(),
        }
    };
    let release_fut = async {
        match musicbrainz {
            Some(client) => client.release_details(artist, &group.name).await,
            None => Default::default(),
        }
    };
    let lastfm_fut = async {
        match lastfm {
            Some(client) => client.album_info(artist, &group.name).await,
            None => Default::default(),
        }
    };
    let (mut audiodb_info, release, lastfm_info) =
        tokio::join!(audiodb_fut, release_fut, lastfm_fut);

    // Album search came up nameless: try finding the canonical album via
    // a track search on the first track, then re-fetch under the
    // corrected name so the wiki and artwork come along.
    let mut track_search_name = None;
    if audiodb_info.name.is_none() {
        if let Some(client) = audiodb {
            if let Some(first) = group.records.first() {
                let track_info = client.track_info(artist, &first.title).await;
                if let Some(corrected) = track_info.album {
                    log::debug!(
                        "Corrected album '{}' to '{corrected}' via track search",
                        group.name
                    );
                    let refetched = client.album_info(artist, &corrected).await;
                    if refetched.wiki.is_some() || refetched.image_url.is_some() {
                        audiodb_info = refetched;
                    }
                    track_search_name = Some(corrected);
                }
            }
        }
    }

    merge::resolve_album(
        &audiodb_info,
        &lastfm_info,
        &release,
        track_search_name.as_deref(),
        &local,
        artist_genre,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_weights_sum_to_one() {
        let total: f64 = [
            Phase::Scanning,
            Phase::FetchingExisting,
            Phase::Extracting,
            Phase::ArtistCorrections,
            Phase::AlbumCorrections,
            Phase::Assembling,
            Phase::Persisting,
        ]
        .iter()
        .map(|p| p.weight())
        .sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(Phase::Complete.is_terminal());
        assert!(Phase::Cancelled.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(!Phase::Assembling.is_terminal());
    }

    #[test]
    fn test_progress_is_monotone_across_phases() {
        let tracker = ProgressTracker::new();
        let receiver = tracker.subscribe();
        let mut last = 0.0;

        tracker.enter(Phase::Scanning, 2);
        for _ in 0..2 {
            tracker.tick();
            let fraction = receiver.borrow().fraction;
            assert!(fraction >= last);
            last = fraction;
        }

        tracker.enter(Phase::FetchingExisting, 1);
        assert!(receiver.borrow().fraction >= last);
        last = receiver.borrow().fraction;

        tracker.enter(Phase::Extracting, 4);
        for _ in 0..4 {
            tracker.tick();
            let fraction = receiver.borrow().fraction;
            assert!(fraction >= last);
            last = fraction;
        }

        tracker.terminal(Phase::Complete);
        let snapshot = *receiver.borrow();
        assert_eq!(snapshot.phase, Phase::Complete);
        assert!(snapshot.fraction >= last);
    }

    #[test]
    fn test_complete_reports_full_fraction() {
        let tracker = ProgressTracker::new();
        let receiver = tracker.subscribe();
        tracker.enter(Phase::Scanning, 1);
        tracker.terminal(Phase::Complete);
        assert!((receiver.borrow().fraction - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_phase_display_names() {
        assert_eq!(Phase::ArtistCorrections.to_string(), "fetching-corrections(artist)");
        assert_eq!(Phase::Extracting.to_string(), "extracting-metadata");
    }

    #[test]
    fn test_degraded_records_keep_distinct_store_keys() {
        let root = Path::new("/music");
        let a = degraded_record(Path::new("/music/The Beatles/Abbey Road/01 Come Together.mp3"), root);
        let b = degraded_record(Path::new("/music/The Beatles/Abbey Road/02 Something.mp3"), root);
        let c = degraded_record(Path::new("/music/loose.flac"), root);

        assert_eq!(a.store_key, "The-Beatles/Abbey-Road/01-Come-Together.mp3");
        assert_eq!(b.store_key, "The-Beatles/Abbey-Road/02-Something.mp3");
        assert_eq!(c.store_key, "Unknown-Artist/Unknown-Album/loose.flac");
        assert_ne!(a.store_key, b.store_key);
        assert!(!c.store_key.is_empty());
    }
}
