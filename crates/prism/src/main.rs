use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use prism_core::{
    ConfigManager, Coordinator, EventBus, HttpSource, SyncEngine, TransitionController,
};
use prism_lights::{ConsoleLight, Light};
use tokio::sync::mpsc;

/// Music-synced lighting daemon.
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(about = "Drives networked lights from live playback analysis")]
struct Args {
    /// Path to the configuration file (default: config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Music service bearer token (overrides config and PRISM_API_TOKEN)
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let args = Args::parse();

    let mut config = ConfigManager::new(args.config);
    let settings = config.load()?;

    let token = args
        .token
        .or_else(|| settings.api_token.clone())
        .or_else(|| std::env::var("PRISM_API_TOKEN").ok())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no API token: pass --token, set api_token in {}, or export PRISM_API_TOKEN",
                config.config_path().display()
            )
        })?;

    let source = Arc::new(HttpSource::new(token)?);
    let lights: Vec<Arc<dyn Light>> = (0..settings.light_count)
        .map(|i| Arc::new(ConsoleLight::new(format!("light-{i}"))) as Arc<dyn Light>)
        .collect();
    log::info!("driving {} light(s)", lights.len());

    let controller = Arc::new(TransitionController::new(
        Duration::from_millis(settings.command_delay_ms),
        settings.color_mode,
    ));

    let bus = EventBus::new();
    let coordinator = Coordinator::new(lights, controller, &settings, bus.subscribe());
    let engine = SyncEngine::new(source, &settings, bus);

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let engine_handle = tokio::spawn(engine.run(shutdown_rx));
    let coordinator_handle = tokio::spawn(coordinator.run());

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down");
    let _ = shutdown_tx.send(()).await;

    // The engine owns the event bus; once it exits, the coordinator's
    // channel closes and it drains to completion on its own.
    engine_handle.await?;
    coordinator_handle.await?;
    Ok(())
}
