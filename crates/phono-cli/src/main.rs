use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "phono", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Build the catalog from a music directory
    ///
    /// Recursively scans the directory for audio files, extracts embedded
    /// tags (with filename and directory-layout fallbacks), groups tracks
    /// into artists and albums, enriches each entity from TheAudioDB,
    /// MusicBrainz, and Last.fm, and writes the catalog JSON document.
    ///
    /// Provider lookups are rate limited per provider and cached on disk,
    /// so repeat builds over the same library are mostly cache hits.
    /// Provider failures degrade individual entities to their locally
    /// tagged metadata; they never fail the build.
    ///
    /// The previous catalog document, if present at the output path, only
    /// contributes each track's `added` timestamp; every other field is
    /// recomputed from scratch.
    ///
    /// Supported formats: FLAC, MP3, OGG, WAV, M4A/AAC
    Build {
        /// Path to the music directory
        music_dir: PathBuf,

        /// Catalog output path (default: ~/.local/share/phono/catalog.json)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Provider cache directory (default: ~/.local/share/phono/cache)
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Resolve and assemble, but do not write the catalog document
        #[arg(long)]
        dry_run: bool,

        /// Skip all provider lookups and build from tags only
        #[arg(long)]
        offline: bool,

        /// Delete the provider cache documents before building
        #[arg(long)]
        refresh: bool,

        /// Concurrency bound for per-artist resolution
        #[arg(long)]
        workers: Option<usize>,

        /// Base URL prefixed to store keys for public track references
        #[arg(long)]
        public_url_base: Option<String>,

        /// Show per-phase progress detail
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            music_dir,
            catalog,
            cache_dir,
            dry_run,
            offline,
            refresh,
            workers,
            public_url_base,
            verbose,
        } => {
            commands::run_build(commands::BuildArgs {
                music_dir,
                catalog,
                cache_dir,
                dry_run,
                offline,
                refresh,
                workers,
                public_url_base,
                verbose,
            })
            .await?;
        }
    }

    Ok(())
}
