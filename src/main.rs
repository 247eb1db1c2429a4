use anyhow::Result;
use argus::{Config, Monitor};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Optional explicit config path; default locations otherwise
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path),
        None => Config::load(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    argus::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Argus {} sampling wallbox status", env!("APP_VERSION"));

    let monitor = Monitor::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create monitor: {}", e))?;

    // One tick per invocation; the scheduler provides the cadence
    monitor
        .tick()
        .await
        .map_err(|e| anyhow::anyhow!("Tick failed: {}", e))?;

    Ok(())
}
