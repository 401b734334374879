//! Configuration management
//!
//! Handles loading, validating, and saving the JSON configuration file.
//! The decision engine consumes `trading.risk_management`, `data_integration`,
//! `enhanced_risk_management`, and `martingale`; the remaining sections are
//! typed pass-through for external collaborators (data collection, Telegram,
//! web dashboard).
//!
//! Out-of-range values are rejected at load time with a [`ConfigError`] —
//! never silently clamped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::modes::TradingMode;

/// Validation errors for configuration values
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} ({value}) must be a percentage between 0 and 100")]
    PercentOutOfRange { field: &'static str, value: f64 },

    #[error("risk reduction factor {field} ({value}) must be strictly between 0 and 1")]
    FactorOutOfRange { field: &'static str, value: f64 },

    #[error("martingale multiplier ({0}) must be greater than 1")]
    MultiplierTooSmall(f64),

    #[error("martingale max_layers ({0}) must be at least 1")]
    NoLayers(u32),

    #[error("martingale base lot ({0}) must be positive")]
    NonPositiveLot(f64),

    #[error("martingale pip threshold {field} ({value}) must be >= 0")]
    NegativePips { field: &'static str, value: f64 },
}

fn check_percent(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ConfigError::PercentOutOfRange { field, value });
    }
    Ok(())
}

fn check_factor(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 || value >= 1.0 {
        return Err(ConfigError::FactorOutOfRange { field, value });
    }
    Ok(())
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub system: SystemConfig,
    pub mt5: Mt5Config,
    pub trading: TradingConfig,
    pub data_integration: DataIntegrationConfig,
    pub enhanced_risk_management: EnhancedRiskConfig,
    pub martingale: MartingaleConfig,
    pub data_collection: DataCollectionConfig,
    pub testing: TestingConfig,
    pub telegram: TelegramConfig,
    pub web_dashboard: WebDashboardConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            system: SystemConfig::default(),
            mt5: Mt5Config::default(),
            trading: TradingConfig::default(),
            data_integration: DataIntegrationConfig::default(),
            enhanced_risk_management: EnhancedRiskConfig::default(),
            martingale: MartingaleConfig::default(),
            data_collection: DataCollectionConfig::default(),
            testing: TestingConfig::default(),
            telegram: TelegramConfig::default(),
            web_dashboard: WebDashboardConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from JSON file and validate it.
    ///
    /// The Telegram bot token can be supplied via the TELEGRAM_BOT_TOKEN
    /// environment variable instead of the file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            config.telegram.bot_token = Some(token);
        }

        config.validate().context("Configuration validation failed")?;
        Ok(config)
    }

    /// Save configuration atomically: write to a temp file in the same
    /// directory, then rename over the target.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).context("Failed to write temp config file")?;
        fs::rename(&tmp, path).context("Failed to replace config file")?;
        Ok(())
    }

    /// Validate all engine-relevant sections, failing fast on the first
    /// out-of-range value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trading.risk_management.validate()?;
        self.data_integration.validate()?;
        self.enhanced_risk_management.validate()?;
        self.martingale.validate()?;
        Ok(())
    }
}

/// System identification section (pass-through)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub name: String,
    pub version: String,
    pub environment: String,
    pub debug_mode: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "Unified Trading System".to_string(),
            version: "1.3".to_string(),
            environment: "production".to_string(),
            debug_mode: false,
        }
    }
}

/// Broker connection parameters (pass-through for the execution collaborator)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Mt5Config {
    pub account_number: u64,
    pub magic_number: u64,
    pub server: String,
    pub timeout: u64,
}

impl Default for Mt5Config {
    fn default() -> Self {
        Self {
            account_number: 0,
            magic_number: 50515253,
            server: "MetaTrader5".to_string(),
            timeout: 30,
        }
    }
}

/// Trading section: enablement flags, the active mode, and the hard ceilings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub enabled: bool,
    pub max_positions_per_pair: u32,
    pub emergency_stop_enabled: bool,
    /// True runs the enhanced (signal-aware) engine; false the original
    /// TA-only path
    pub enhanced_engine: bool,
    /// Active mode profile, replaced atomically by the mode commands
    pub mode: TradingMode,
    pub risk_management: RiskCeilings,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_positions_per_pair: 1,
            emergency_stop_enabled: true,
            enhanced_engine: true,
            mode: TradingMode::FullIntelligence,
            risk_management: RiskCeilings::default(),
        }
    }
}

/// Global risk ceilings enforced as a hard veto independent of mode.
/// Read-only during a trading session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskCeilings {
    pub max_drawdown_percent: f64,
    pub max_daily_loss_percent: f64,
    pub max_concurrent_trades: u32,
}

impl Default for RiskCeilings {
    fn default() -> Self {
        Self {
            max_drawdown_percent: 50.0,
            max_daily_loss_percent: 10.0,
            max_concurrent_trades: 20,
        }
    }
}

impl RiskCeilings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_percent("max_drawdown_percent", self.max_drawdown_percent)?;
        check_percent("max_daily_loss_percent", self.max_daily_loss_percent)?;
        Ok(())
    }
}

/// Thresholds for the external signal integrations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataIntegrationConfig {
    pub enabled: bool,
    /// |sentiment| at or above this counts as extreme, 0-100
    pub sentiment_threshold: f64,
    /// Correlation risk at or above this triggers reduction, 0-100
    pub correlation_risk_threshold: f64,
    /// Trades inside this window before a major event are reduced
    pub economic_event_buffer_hours: u32,
    pub cache_duration_seconds: u64,
    /// True: a missing signal is treated as non-triggering.
    /// False: a missing signal vetoes the trade.
    pub fallback_on_error: bool,
}

impl Default for DataIntegrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sentiment_threshold: 70.0,
            correlation_risk_threshold: 70.0,
            economic_event_buffer_hours: 1,
            cache_duration_seconds: 60,
            fallback_on_error: true,
        }
    }
}

impl DataIntegrationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_percent("sentiment_threshold", self.sentiment_threshold)?;
        check_percent("correlation_risk_threshold", self.correlation_risk_threshold)?;
        Ok(())
    }
}

/// Which adjustments run and how hard they cut size
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancedRiskConfig {
    pub correlation_adjustment: bool,
    pub economic_event_adjustment: bool,
    pub sentiment_based_blocking: bool,
    pub dynamic_position_sizing: bool,
    pub risk_reduction_factors: RiskReductionFactors,
}

impl Default for EnhancedRiskConfig {
    fn default() -> Self {
        Self {
            correlation_adjustment: true,
            economic_event_adjustment: true,
            sentiment_based_blocking: true,
            dynamic_position_sizing: true,
            risk_reduction_factors: RiskReductionFactors::default(),
        }
    }
}

impl EnhancedRiskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.risk_reduction_factors.validate()
    }
}

/// Size multipliers applied when an adjustment triggers.
/// Strictly between 0 and 1: reductions only, never amplification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskReductionFactors {
    pub high_correlation: f64,
    pub major_events: f64,
    pub extreme_sentiment: f64,
}

impl Default for RiskReductionFactors {
    fn default() -> Self {
        Self {
            high_correlation: 0.8,
            major_events: 0.7,
            extreme_sentiment: 0.9,
        }
    }
}

impl RiskReductionFactors {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_factor("high_correlation", self.high_correlation)?;
        check_factor("major_events", self.major_events)?;
        check_factor("extreme_sentiment", self.extreme_sentiment)?;
        Ok(())
    }
}

/// Martingale layering parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MartingaleConfig {
    pub enabled: bool,
    pub max_layers: u32,
    /// Lot size of the first layer in a sequence
    pub base_lot: f64,
    /// Lot escalation per layer, must be > 1
    pub multiplier: f64,
    /// Account drawdown at which all martingale exposure is force-closed
    pub emergency_dd_percentage: f64,
    /// Floating profit (pips) required for the early take-profit rule
    pub profit_buffer_pips: f64,
    /// Realized profit (% of equity) that closes a sequence as a win
    pub min_profit_percentage: f64,
    /// Price proximity to original entry (pips) for the early exit
    pub flirt_threshold_pips: f64,
}

impl Default for MartingaleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_layers: 15,
            base_lot: 0.1,
            multiplier: 2.0,
            emergency_dd_percentage: 50.0,
            profit_buffer_pips: 5.0,
            min_profit_percentage: 1.0,
            flirt_threshold_pips: 10.0,
        }
    }
}

impl MartingaleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_layers == 0 {
            return Err(ConfigError::NoLayers(self.max_layers));
        }
        if self.base_lot <= 0.0 {
            return Err(ConfigError::NonPositiveLot(self.base_lot));
        }
        if self.multiplier <= 1.0 {
            return Err(ConfigError::MultiplierTooSmall(self.multiplier));
        }
        check_percent("emergency_dd_percentage", self.emergency_dd_percentage)?;
        check_percent("min_profit_percentage", self.min_profit_percentage)?;
        if self.profit_buffer_pips < 0.0 {
            return Err(ConfigError::NegativePips {
                field: "profit_buffer_pips",
                value: self.profit_buffer_pips,
            });
        }
        if self.flirt_threshold_pips < 0.0 {
            return Err(ConfigError::NegativePips {
                field: "flirt_threshold_pips",
                value: self.flirt_threshold_pips,
            });
        }
        Ok(())
    }
}

/// Collection intervals for the scraper collaborators (pass-through)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataCollectionConfig {
    pub enabled: bool,
    pub sentiment_interval_minutes: u32,
    pub correlation_interval_minutes: u32,
    pub economic_calendar_interval_minutes: u32,
    pub data_retention_days: u32,
}

impl Default for DataCollectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sentiment_interval_minutes: 30,
            correlation_interval_minutes: 30,
            economic_calendar_interval_minutes: 60,
            data_retention_days: 30,
        }
    }
}

/// Testing overrides (pass-through)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingConfig {
    pub reduce_intervals: bool,
    pub sentiment_test_interval: u32,
    pub correlation_test_interval: u32,
    pub calendar_test_interval: u32,
    pub dry_run_mode: bool,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            reduce_intervals: false,
            sentiment_test_interval: 5,
            correlation_test_interval: 5,
            calendar_test_interval: 10,
            dry_run_mode: false,
        }
    }
}

/// Telegram notification toggles (pass-through)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    pub chat_id: String,
    pub alerts_enabled: bool,
    pub status_updates_interval: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: None,
            chat_id: String::new(),
            alerts_enabled: true,
            status_updates_interval: 300,
        }
    }
}

/// Web dashboard toggles (pass-through)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDashboardConfig {
    pub enabled: bool,
    pub port: u16,
    pub host: String,
}

impl Default for WebDashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
            host: "localhost".to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub max_file_size_mb: u64,
    pub backup_count: u32,
    pub console_output: bool,
    /// Record every decision in the audit trail
    pub decision_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            max_file_size_mb: 50,
            backup_count: 5,
            console_output: true,
            decision_logging: true,
        }
    }
}
