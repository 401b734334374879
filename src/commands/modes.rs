//! Mode commands: list the presets and swap the active profile

use anyhow::{Context, Result};
use tracing::info;

use martingale_engine::modes::{ModeProfile, TradingMode};
use martingale_engine::Config;

/// Print every available mode with its behavior summary.
pub fn list() -> Result<()> {
    println!("Available modes:");
    for mode in TradingMode::ALL {
        println!("  {:22} {}", mode.to_string(), mode.describe());
    }
    Ok(())
}

/// Swap the active mode: build and validate the profile first, then persist
/// the selection atomically. A failed build leaves the config untouched.
pub fn apply(config_path: &str, mode: TradingMode) -> Result<()> {
    let mut config = Config::from_file(config_path)?;

    let profile = ModeProfile::build(mode, &config)
        .with_context(|| format!("Mode profile {} failed validation", mode))?;

    config.trading.mode = mode;
    config.save(config_path)?;

    info!(
        "Mode set to {} (sentiment threshold {:.0}, correlation threshold {:.0}, hard block: {})",
        mode, profile.sentiment_threshold, profile.correlation_risk_threshold,
        profile.sentiment_hard_block
    );
    println!("Active mode: {}", mode);
    Ok(())
}
