use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vigil_alarm::{AlarmController, AudioSink, CpalSink, NullSink};
use vigil_core::{GalleryMatcher, SignatureGallery};
use vigil_events::{EventEmitter, SqliteEventStore};

mod annotate;
mod config;
mod pipeline;
mod source;

use config::Config;
use pipeline::{Pipeline, PipelineError};

#[derive(Parser)]
#[command(name = "vigild", about = "Vigil face watch daemon")]
struct Cli {
    /// Signatures file (JSON array of {identity, embedding})
    #[arg(long)]
    gallery: Option<PathBuf>,

    /// SQLite event database path
    #[arg(long)]
    db: Option<PathBuf>,

    /// Directory for persisted face crops
    #[arg(long)]
    crops: Option<PathBuf>,

    /// Frame source: "synthetic" or "replay:<script.json>"
    #[arg(long)]
    source: Option<String>,

    /// Disable audio output (the alarm state machine still runs)
    #[arg(long)]
    mute: bool,

    /// Validate the signature gallery and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(gallery) = cli.gallery {
        config.gallery_path = gallery;
    }
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(crops) = cli.crops {
        config.crops_dir = crops;
    }
    if let Some(src) = cli.source {
        config.source = src;
    }
    if cli.mute {
        config.audio_enabled = false;
    }

    tracing::info!(
        gallery = %config.gallery_path.display(),
        db = %config.db_path.display(),
        source = %config.source,
        "vigild starting"
    );

    // An unusable gallery is fatal before any frame is read.
    let gallery = SignatureGallery::load(&config.gallery_path)
        .context("signature gallery failed to load; vigild will not watch blind")?;

    if cli.check {
        println!(
            "gallery ok: {} signatures, dimension {}",
            gallery.len(),
            gallery.dimension()
        );
        for identity in gallery.identities() {
            println!("  {identity}");
        }
        return Ok(());
    }

    let matcher =
        GalleryMatcher::with_thresholds(gallery, config.match_tolerance, config.alert_radius);

    let sink: Arc<dyn AudioSink> = if config.audio_enabled {
        Arc::new(CpalSink)
    } else {
        tracing::info!("audio disabled; alarm sequences will be silent");
        Arc::new(NullSink)
    };
    let alarm = AlarmController::new(sink);

    let store = SqliteEventStore::open(&config.db_path, &config.crops_dir)
        .context("failed to open event store")?;
    let emitter = EventEmitter::new(store);

    let mut watch = Pipeline::new(matcher, alarm, emitter, config.detect_scale);
    let (mut frames, mut extractor) =
        source::build(&config).context("failed to build frame source")?;

    // The watch loop is synchronous; run it on a dedicated thread and keep
    // the async main free for signal handling.
    let (done_tx, mut done_rx) = tokio::sync::mpsc::channel::<Result<u64, PipelineError>>(1);
    std::thread::Builder::new()
        .name("vigil-watch".into())
        .spawn(move || {
            let mut display = annotate::LogDisplay;
            let result = watch.run(&mut *frames, &mut *extractor, &mut display);
            let _ = done_tx.blocking_send(result);
        })
        .context("failed to spawn watch thread")?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
        outcome = done_rx.recv() => match outcome {
            Some(Ok(frames)) => tracing::info!(frames, "watch loop finished"),
            Some(Err(e)) => return Err(e).context("watch loop failed"),
            None => tracing::warn!("watch thread exited without reporting"),
        },
    }

    tracing::info!("vigild shutting down");
    Ok(())
}
