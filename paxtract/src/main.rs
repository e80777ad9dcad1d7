use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use paxtract::catalog::{Catalog, ExtractionDetails, ManifestCatalog};
use paxtract::cli::{Args, Commands};
use paxtract::config::AppConfig;
use paxtract::downloader::{FfmpegMuxer, VariantPreference};
use paxtract::extraction::{ExtractionEngine, QueueRegistry, StatusEvent, StatusReporter};
use paxtract::logging::init_logging;
use stream_resolver::ResolverStrategy;
use tracing::{info, warn};
use vod_engine::HttpClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(filter) = args.log {
        config.log_filter = Some(filter);
    }
    if let Some(dir) = args.log_dir {
        config.log_dir = Some(dir);
    }

    let _guard = init_logging(config.log_filter.as_deref(), config.log_dir.as_deref())?;

    match args.command {
        Commands::Options { manifest } => {
            let catalog = ManifestCatalog::load(&manifest).await?;
            let details = ExtractionDetails::fetch(&catalog).await?;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
        Commands::Extract {
            manifest,
            episodes,
            audio,
            quality,
            library,
        } => {
            if let Some(library) = library {
                config.library_dir = library;
            }
            let preference = VariantPreference::new(
                audio.unwrap_or_else(|| config.preference.audio.clone()),
                quality.unwrap_or(config.preference.quality),
            );
            extract(&config, manifest, &episodes, preference).await?;
        }
    }

    Ok(())
}

async fn extract(
    config: &AppConfig,
    manifest: std::path::PathBuf,
    episodes: &str,
    preference: VariantPreference,
) -> anyhow::Result<()> {
    let catalog: Arc<dyn Catalog> = Arc::new(
        ManifestCatalog::load(&manifest)
            .await
            .with_context(|| format!("Failed to load manifest {}", manifest.display()))?,
    );

    let downloader = config.downloader_config();
    let fetch = Arc::new(HttpClient::new(&downloader)?);
    let resolver = Arc::new(ResolverStrategy::from_kind(
        config.resolver,
        fetch.clone(),
        config.sandbox,
    ));
    let muxer = Arc::new(FfmpegMuxer::new(config.ffmpeg.clone()));
    let engine = ExtractionEngine::new(resolver, fetch, muxer, downloader);

    let registry = QueueRegistry::new(&config.library_dir, engine);
    let series = catalog.title().to_owned();
    let (reporter, mut events) = StatusReporter::channel(series.clone());

    let queued = registry
        .enqueue(&series, catalog, episodes, &preference, reporter)
        .await?;
    if queued == 0 {
        warn!(episodes, "No episode of the catalog matches");
        return Ok(());
    }
    info!(series = %series, queued, audio = %preference.audio, quality = preference.quality, "Extraction queued");

    let mut last_percent = None;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                // the queue drained
                Some(StatusEvent::Current(None)) => break,
                Some(StatusEvent::Progress(value)) => {
                    let percent = (value * 100.0).floor() as u32;
                    if last_percent != Some(percent) && percent % 10 == 0 {
                        info!(progress = %format!("{percent}%"), "Progress");
                    }
                    last_percent = Some(percent);
                }
                Some(StatusEvent::Current(Some(episode))) => info!(episode, "Downloading"),
                Some(StatusEvent::Option { audio, quality }) => info!(audio = %audio, quality, "Selected variant"),
                Some(StatusEvent::Left(left)) => info!(left, "Episodes left"),
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping workers");
                registry.shutdown();
                break;
            }
        }
    }

    Ok(())
}
