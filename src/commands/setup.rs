//! Setup command: directory layout, default configuration, engine flavor

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use martingale_engine::Config;

/// Create the directory layout and a default configuration file, then
/// validate the result.
pub fn run(config_path: &str) -> Result<()> {
    dotenv::dotenv().ok();

    for dir in ["logs", "data"] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {} directory", dir))?;
    }

    if !Path::new(config_path).exists() {
        let config = Config::default();
        config
            .save(config_path)
            .context("Failed to write default configuration")?;
        info!("Created default configuration at {}", config_path);
    }

    let config = Config::from_file(config_path)?;
    info!(
        "Configuration valid: mode={}, enhanced_engine={}, martingale max_layers={}",
        config.trading.mode, config.trading.enhanced_engine, config.martingale.max_layers
    );
    println!("Setup complete. Active mode: {}", config.trading.mode);
    Ok(())
}

/// Persist the engine flavor choice (enhanced signal-aware engine vs the
/// original TA-only path).
pub fn set_engine_flavor(config_path: &str, enhanced: bool) -> Result<()> {
    let mut config = Config::from_file(config_path)?;
    config.trading.enhanced_engine = enhanced;
    config.save(config_path)?;
    let flavor = if enhanced { "enhanced" } else { "original" };
    info!("Engine flavor set to {}", flavor);
    println!("Engine flavor: {}", flavor);
    Ok(())
}
