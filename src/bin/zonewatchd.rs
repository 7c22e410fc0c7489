//! zonewatchd - debounced zone-occupancy notification daemon
//!
//! This daemon:
//! 1. Loads zone polygons, the class-name list, and the transport config
//! 2. Pulls per-frame detections from a replay source (the live model feeds
//!    the same seam in deployment)
//! 3. Debounces each zone's occupancy into a held vehicle value
//! 4. Fans out value changes over the configured transport channel

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use zonewatch::{
    config::ZonewatchConfig, detect::ReplaySource, ClassList, Dispatcher, LogRenderer,
    NullRenderer, Pipeline, Renderer, ZoneStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Debounced zone-occupancy notification daemon")]
struct Args {
    /// Path to the JSON config file.
    #[arg(long, env = "ZONEWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Replay file with one JSON array of detections per frame.
    #[arg(long, env = "ZONEWATCH_REPLAY")]
    replay: PathBuf,

    /// Zone polygon file (overrides the config).
    #[arg(long, env = "ZONEWATCH_ZONES")]
    zones: Option<PathBuf>,

    /// Class-name list, one label per line (overrides the config).
    #[arg(long, env = "ZONEWATCH_CLASSES")]
    classes: Option<PathBuf>,

    /// Log each cycle's per-zone status lines.
    #[arg(long)]
    show_zones: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => ZonewatchConfig::load_from(Some(path)),
        None => ZonewatchConfig::load(),
    }
    .context("configuration rejected")?;
    if let Some(zones) = args.zones {
        cfg.zones_path = zones;
    }
    if let Some(classes) = args.classes {
        cfg.classes_path = classes;
    }

    let mut zones = ZoneStore::load(&cfg.zones_path)?;
    if let Some((authored, processing)) = cfg.frame_scaling() {
        log::info!(
            "rescaling zones from {}x{} to {}x{}",
            authored.0,
            authored.1,
            processing.0,
            processing.1
        );
        zones = zones.scaled_to(authored, processing);
    }
    let classes = ClassList::load(&cfg.classes_path)?;
    log::info!(
        "loaded {} zone(s) from {}, {} class label(s)",
        zones.len(),
        cfg.zones_path.display(),
        classes.len()
    );

    let channel = zonewatch::transport::open(&cfg, zones.len())?;
    let dispatcher = Dispatcher::new(zones.len(), channel);
    let mut pipeline = Pipeline::new(
        zones,
        classes,
        dispatcher,
        cfg.debounce_interval_secs,
        cfg.sample_every,
    );

    let mut source = ReplaySource::open(&args.replay)?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::SeqCst);
    })
    .context("failed to install interrupt handler")?;

    log::info!(
        "zonewatchd running: interval {:.1}s, every {} frame(s) processed",
        cfg.debounce_interval_secs,
        cfg.sample_every
    );

    let mut renderer: Box<dyn Renderer> = if args.show_zones {
        Box::new(LogRenderer)
    } else {
        Box::new(NullRenderer)
    };
    let summary = pipeline.run(&mut source, renderer.as_mut(), &stop)?;

    log::info!(
        "done: {} frame(s), {} cycle(s), {}/{} send(s) delivered",
        summary.frames_seen,
        summary.cycles,
        summary.sends_delivered,
        summary.sends_attempted
    );
    Ok(())
}
