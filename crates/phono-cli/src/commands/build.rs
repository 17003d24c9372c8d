use std::path::PathBuf;

use anyhow::Result;

use phono_pipeline::{BuildOutcome, CatalogPipeline, Config, Phase, Providers};

#[derive(Debug)]
pub struct BuildArgs {
    pub music_dir: PathBuf,
    pub catalog: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub dry_run: bool,
    pub offline: bool,
    pub refresh: bool,
    pub workers: Option<usize>,
    pub public_url_base: Option<String>,
    pub verbose: bool,
}

/// Merge CLI arguments over the file/env configuration. CLI flags win.
fn effective_config(args: &BuildArgs) -> Result<Config> {
    let mut config = Config::load()?;
    config.music_dir = Some(args.music_dir.clone());
    if let Some(catalog) = &args.catalog {
        config.catalog_path = catalog.clone();
    }
    if let Some(cache_dir) = &args.cache_dir {
        config.cache_dir = cache_dir.clone();
    }
    if args.offline {
        config.offline = true;
    }
    if let Some(workers) = args.workers {
        config.artist_workers = workers;
    }
    if let Some(base) = &args.public_url_base {
        config.public_url_base = Some(base.clone());
    }
    Ok(config)
}

pub async fn run_build(args: BuildArgs) -> Result<()> {
    let config = effective_config(&args)?;
    let catalog_path = config.catalog_path.clone();

    // Caches never expire on their own; --refresh is the manual
    // full-cache invalidation path.
    if args.refresh && config.cache_dir.is_dir() {
        std::fs::remove_dir_all(&config.cache_dir)?;
        println!("Cleared provider caches at {}", config.cache_dir.display());
    }

    let providers = Providers::from_config(&config)?;
    let pipeline = CatalogPipeline::new(config, providers).dry_run(args.dry_run);

    // First Ctrl-C requests a graceful stop; in-flight work finishes and
    // nothing is written.
    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping after in-flight work...");
            cancel.cancel();
        }
    });

    if args.verbose {
        let mut progress = pipeline.progress();
        tokio::spawn(async move {
            let mut last = Phase::Idle;
            while progress.changed().await.is_ok() {
                let snapshot = *progress.borrow();
                if snapshot.phase != last && !snapshot.phase.is_terminal() {
                    println!(
                        "  ⏳ [{}] {:.0}%",
                        snapshot.phase,
                        snapshot.fraction * 100.0
                    );
                    last = snapshot.phase;
                }
            }
        });
    }

    let report = pipeline.run().await?;

    match report.outcome {
        BuildOutcome::Cancelled => {
            println!(
                "\n✗ Build cancelled after scanning {} files; no catalog written",
                report.files_scanned
            );
        }
        BuildOutcome::Complete => {
            println!("\n✓ Build complete in {:.1?}", report.elapsed);
            println!("  {} files scanned", report.files_scanned);
            println!(
                "  {} artists, {} albums, {} tracks",
                report.artists, report.albums, report.tracks
            );
            if args.dry_run {
                println!("  (dry run: catalog not written)");
            } else {
                println!("  Catalog: {}", catalog_path.display());
            }
        }
    }

    Ok(())
}
