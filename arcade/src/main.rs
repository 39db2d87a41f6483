mod appearance;
mod camera;
mod convert;
mod detector;
mod display;

use anyhow::{Context, Result};
use appearance::AppearanceEncoder;
use camera::{CameraSource, SourceSpec};
use clap::Parser;
use detector::YoloPersonDetector;
use display::HighGuiDisplay;
use red_light_vision::{
    CentroidTracker, Devices, Display, GameConfig, GameLoop, GameSession, LoopControl, LoopExit,
    ModelArtifacts, NullDisplay, TokioClock,
};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const WINDOW_NAME: &str = "Frame";

#[derive(Parser, Debug)]
#[command(name = "red-light-arcade", about = "Camera-refereed red light, green light")]
struct Args {
    /// Game configuration (YAML). Defaults apply when the file is missing.
    #[arg(long, default_value = "red_light.yaml")]
    config: PathBuf,
    /// Camera index, video file, stream URL or GStreamer pipeline.
    #[arg(long, default_value = "0")]
    source: String,
    /// Directory holding the detector model files. Overrides the config.
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// Run without a window.
    #[arg(long)]
    headless: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // --- 1. Argument Parsing & Logging ---
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- 2. Configuration & Model Discovery ---
    let mut config = GameConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(model_dir) = args.model_dir {
        config.detection.model_dir = model_dir;
    }
    let model_dir = config.detection.model_dir.clone();
    let artifacts = ModelArtifacts::locate(&model_dir)
        .with_context(|| format!("looking for models in {}", model_dir.display()))?;

    // --- 3. Devices ---
    let mut detector = YoloPersonDetector::load(&artifacts, &config.detection)
        .context("loading the person detector")?;
    match artifacts.appearance_model.as_deref().map(AppearanceEncoder::load) {
        Some(Ok(encoder)) => detector = detector.with_appearance(encoder),
        Some(Err(e)) => warn!(error = %e, "appearance model unusable, tracking on geometry only"),
        None => info!("no appearance model, tracking on geometry only"),
    }
    let display: Box<dyn Display> = if args.headless {
        Box::new(NullDisplay)
    } else {
        Box::new(HighGuiDisplay::open(WINDOW_NAME).context("opening the game window")?)
    };
    let devices = Devices {
        source: Box::new(CameraSource::new(SourceSpec::parse(&args.source))),
        detector: Box::new(detector),
        tracker: Box::new(CentroidTracker::new(config.tracking)),
        display,
    };
    let game_loop = GameLoop::new(&config);
    let mut session = GameSession::new(config, devices, Box::new(TokioClock::new()));

    // --- 4. Cancellation ---
    let (control, control_rx) = watch::channel(LoopControl::Run);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupted, stopping");
                control.send_replace(LoopControl::Stop);
            }
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
        }
        // Hold the sender so the loop keeps watching until it exits.
        std::future::pending::<()>().await;
    });

    // --- 5. Main Game Loop ---
    match game_loop.run(&mut session, control_rx).await.context("game aborted")? {
        LoopExit::Finished(standings) => println!("{standings}"),
        LoopExit::Stopped => info!(phase = %session.phase(), "stopped before the end of the game"),
    }
    Ok(())
}
