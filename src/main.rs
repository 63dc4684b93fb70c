//! vrmdrop - Drag-and-drop VRM avatar viewer
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vrmdrop::{
    avatar::{ByteSource, HumanBone},
    config::Config,
    DropHandler, FrameDriver, HeadlessRenderer, InstallOutcome, ViewerState,
};

/// vrmdrop - drop a VRM onto the window and watch it spin
#[derive(Parser, Debug)]
#[command(name = "vrmdrop", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model to load at startup, as if it had been dropped (overrides config)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Load the model without opening a window, run some frames and exit
    #[arg(long)]
    headless: bool,

    /// Frames to run in headless mode
    #[arg(long, default_value_t = 60)]
    frames: u32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", vrmdrop::NAME, vrmdrop::VERSION);

    let mut config = match args.config {
        Some(ref path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(model) = args.model.clone() {
        config.model_path = Some(model);
    }
    config.validate()?;

    let initial = config.model_path.clone().map(ByteSource::Path);

    // Build tokio runtime manually so the main thread stays free for the UI event loop
    let runtime = tokio::runtime::Runtime::new()?;

    if args.headless || cfg!(not(feature = "native-ui")) {
        let Some(source) = initial else {
            anyhow::bail!("headless mode needs a model (--model or model_path in config)");
        };
        return runtime.block_on(run_headless(config, source, args.frames));
    }

    #[cfg(feature = "native-ui")]
    {
        info!("Launching viewer window");

        // Enter the tokio runtime context so the drop handler can spawn loads
        let guard = runtime.enter();

        // eframe::run_native blocks the main thread (winit requirement)
        vrmdrop::ui::ViewerApp::run(config, runtime.handle().clone(), initial)
            .map_err(|e| anyhow::anyhow!("UI error: {}", e))?;

        info!("Window closed, shutting down");
        drop(guard);
        runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    }

    Ok(())
}

/// Load one model through the drop pipeline and drive a fixed number of
/// frames at 60 Hz without a GPU.
async fn run_headless(config: Config, source: ByteSource, frames: u32) -> anyhow::Result<()> {
    let mut drops = DropHandler::new(tokio::runtime::Handle::current());
    let mut state = ViewerState::new(config);
    let mut renderer = HeadlessRenderer;
    let mut driver = FrameDriver::default();

    drops.open(source);
    let completion = drops
        .next_completion()
        .await
        .ok_or_else(|| anyhow::anyhow!("load pipeline closed"))?;
    let avatar = completion.result?;

    match state.install(avatar, &mut renderer) {
        InstallOutcome::Framed { head } => {
            info!("Camera framed at head height {:.3}", head.y)
        }
        InstallOutcome::Unframed(e) => info!("Camera left in place: {}", e),
    }

    for _ in 0..frames {
        driver.tick(&mut state, 1.0 / 60.0, &mut renderer);
    }

    if let Some(avatar) = state.scene.avatar() {
        let yaw = avatar
            .bone_rotation(HumanBone::Hips)
            .map(|r| r.y)
            .unwrap_or_default();
        info!(
            "{} frames ({}, {:.2}s): hips yaw {:.3} rad, camera at {:?}",
            driver.frames(),
            state.driver_state(),
            avatar.elapsed(),
            yaw,
            state.camera.position
        );
    }

    Ok(())
}
