//! Mode profiles and atomic profile selection
//!
//! The five presets are pure data: each builds a concrete, pre-validated
//! [`ModeProfile`] from the base configuration plus the preset's overrides.
//! The decision algorithm itself is mode-agnostic; only the profile changes.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::config::{Config, ConfigError, RiskReductionFactors};

/// Closed set of named mode presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    /// All data-integration adjustments disabled; degraded/fallback mode
    PureTa,
    /// Lower thresholds, harder reductions
    Conservative,
    /// All adjustments enabled at baseline strength
    FullIntelligence,
    /// Higher thresholds, lighter reductions
    Aggressive,
    /// Protects running martingale batches: correlation checks only
    MartingaleProtection,
}

impl TradingMode {
    pub const ALL: [TradingMode; 5] = [
        TradingMode::PureTa,
        TradingMode::Conservative,
        TradingMode::FullIntelligence,
        TradingMode::Aggressive,
        TradingMode::MartingaleProtection,
    ];

    pub fn describe(&self) -> &'static str {
        match self {
            TradingMode::PureTa => "Pure technical analysis, no external signal adjustments",
            TradingMode::Conservative => "All intelligence on, lower thresholds, deeper reductions",
            TradingMode::FullIntelligence => "All intelligence features at default strength",
            TradingMode::Aggressive => "Intelligence on with higher thresholds, lighter reductions",
            TradingMode::MartingaleProtection => {
                "Maximum protection for running batches, correlation checks only"
            }
        }
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TradingMode::PureTa => "pure_ta",
            TradingMode::Conservative => "conservative",
            TradingMode::FullIntelligence => "full_intelligence",
            TradingMode::Aggressive => "aggressive",
            TradingMode::MartingaleProtection => "martingale_protection",
        };
        write!(f, "{}", name)
    }
}

/// Which adjustment kinds a profile runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentToggles {
    pub correlation: bool,
    pub economic_event: bool,
    pub sentiment_blocking: bool,
    pub dynamic_sizing: bool,
}

impl AdjustmentToggles {
    pub const ALL_OFF: AdjustmentToggles = AdjustmentToggles {
        correlation: false,
        economic_event: false,
        sentiment_blocking: false,
        dynamic_sizing: false,
    };
}

/// Named bundle of thresholds and toggles governing risk adjustment.
///
/// Immutable once built; selecting a mode replaces the whole profile
/// atomically rather than mutating fields in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeProfile {
    pub mode: TradingMode,
    /// |sentiment| at or above this is extreme, 0-100
    pub sentiment_threshold: f64,
    /// Correlation risk at or above this triggers reduction, 0-100
    pub correlation_risk_threshold: f64,
    /// Trades this close (minutes) to a major event are reduced
    pub event_buffer_minutes: u32,
    pub adjustments: AdjustmentToggles,
    /// Extreme sentiment vetoes the trade instead of reducing size
    pub sentiment_hard_block: bool,
    pub risk_reduction_factors: RiskReductionFactors,
    /// True: unavailable signals are non-triggering. False: they veto.
    pub fallback_on_error: bool,
}

impl ModeProfile {
    /// Build the profile for `mode` from the base configuration, applying
    /// the preset's overrides, and validate the result.
    pub fn build(mode: TradingMode, config: &Config) -> Result<Self, ConfigError> {
        let di = &config.data_integration;
        let erm = &config.enhanced_risk_management;

        let mut profile = ModeProfile {
            mode,
            sentiment_threshold: di.sentiment_threshold,
            correlation_risk_threshold: di.correlation_risk_threshold,
            event_buffer_minutes: di.economic_event_buffer_hours * 60,
            adjustments: AdjustmentToggles {
                correlation: erm.correlation_adjustment,
                economic_event: erm.economic_event_adjustment,
                sentiment_blocking: erm.sentiment_based_blocking,
                dynamic_sizing: erm.dynamic_position_sizing,
            },
            sentiment_hard_block: false,
            risk_reduction_factors: erm.risk_reduction_factors,
            fallback_on_error: di.fallback_on_error,
        };

        match mode {
            TradingMode::PureTa => {
                profile.adjustments = AdjustmentToggles::ALL_OFF;
            }
            TradingMode::Conservative => {
                profile.sentiment_threshold = 60.0;
                profile.sentiment_hard_block = true;
                profile.risk_reduction_factors.high_correlation = 0.6;
                profile.risk_reduction_factors.major_events = 0.5;
            }
            TradingMode::FullIntelligence => {
                profile.adjustments = AdjustmentToggles {
                    correlation: true,
                    economic_event: true,
                    sentiment_blocking: true,
                    dynamic_sizing: true,
                };
                profile.sentiment_hard_block = true;
            }
            TradingMode::Aggressive => {
                profile.sentiment_threshold = 80.0;
                profile.risk_reduction_factors.high_correlation = 0.9;
                profile.risk_reduction_factors.major_events = 0.8;
            }
            TradingMode::MartingaleProtection => {
                profile.adjustments.sentiment_blocking = false;
                profile.adjustments.economic_event = false;
            }
        }

        profile.validate()?;
        Ok(profile)
    }

    /// Reject out-of-range thresholds and factors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.sentiment_threshold) {
            return Err(ConfigError::PercentOutOfRange {
                field: "sentiment_threshold",
                value: self.sentiment_threshold,
            });
        }
        if !(0.0..=100.0).contains(&self.correlation_risk_threshold) {
            return Err(ConfigError::PercentOutOfRange {
                field: "correlation_risk_threshold",
                value: self.correlation_risk_threshold,
            });
        }
        self.risk_reduction_factors.validate()
    }
}

/// Holds the active profile and swaps it atomically.
///
/// Readers clone the Arc under a read lock; a select() is a single pointer
/// swap under the write lock. In-flight decisions keep the profile they
/// read and are never retroactively affected.
#[derive(Debug)]
pub struct ModeSelector {
    active: RwLock<Arc<ModeProfile>>,
}

impl ModeSelector {
    pub fn new(profile: ModeProfile) -> Self {
        Self {
            active: RwLock::new(Arc::new(profile)),
        }
    }

    /// Build and validate the profile for `mode`, then swap it in.
    /// A failed build leaves the previous profile active.
    pub fn select(&self, mode: TradingMode, config: &Config) -> Result<Arc<ModeProfile>, ConfigError> {
        let profile = Arc::new(ModeProfile::build(mode, config)?);
        let mut guard = self.active.write().expect("mode selector lock poisoned");
        *guard = Arc::clone(&profile);
        info!("Mode profile switched to {}", mode);
        Ok(profile)
    }

    /// Current profile. Decisions hold this Arc for their whole evaluation.
    pub fn active(&self) -> Arc<ModeProfile> {
        Arc::clone(&self.active.read().expect("mode selector lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pure_ta_disables_everything() {
        let config = Config::default();
        let profile = ModeProfile::build(TradingMode::PureTa, &config).unwrap();
        assert_eq!(profile.adjustments, AdjustmentToggles::ALL_OFF);
        assert!(!profile.sentiment_hard_block);
    }

    #[test]
    fn test_conservative_overrides() {
        let config = Config::default();
        let profile = ModeProfile::build(TradingMode::Conservative, &config).unwrap();
        assert_eq!(profile.sentiment_threshold, 60.0);
        assert_eq!(profile.risk_reduction_factors.high_correlation, 0.6);
        assert_eq!(profile.risk_reduction_factors.major_events, 0.5);
        assert!(profile.sentiment_hard_block);
    }

    #[test]
    fn test_aggressive_overrides() {
        let config = Config::default();
        let profile = ModeProfile::build(TradingMode::Aggressive, &config).unwrap();
        assert_eq!(profile.sentiment_threshold, 80.0);
        assert_eq!(profile.risk_reduction_factors.high_correlation, 0.9);
        assert!(!profile.sentiment_hard_block);
    }

    #[test]
    fn test_protection_keeps_correlation_only() {
        let config = Config::default();
        let profile = ModeProfile::build(TradingMode::MartingaleProtection, &config).unwrap();
        assert!(profile.adjustments.correlation);
        assert!(!profile.adjustments.sentiment_blocking);
        assert!(!profile.adjustments.economic_event);
    }

    #[test]
    fn test_selector_swap_is_whole_profile() {
        let config = Config::default();
        let selector = ModeSelector::new(
            ModeProfile::build(TradingMode::Aggressive, &config).unwrap(),
        );
        let before = selector.active();
        assert_eq!(before.mode, TradingMode::Aggressive);

        selector.select(TradingMode::PureTa, &config).unwrap();
        let after = selector.active();
        assert_eq!(after.mode, TradingMode::PureTa);
        // The Arc read before the swap still sees the old profile
        assert_eq!(before.mode, TradingMode::Aggressive);
    }

    #[test]
    fn test_failed_select_keeps_previous_profile() {
        let mut config = Config::default();
        let selector = ModeSelector::new(
            ModeProfile::build(TradingMode::FullIntelligence, &config).unwrap(),
        );
        config.data_integration.correlation_risk_threshold = 140.0;
        assert!(selector.select(TradingMode::Aggressive, &config).is_err());
        assert_eq!(selector.active().mode, TradingMode::FullIntelligence);
    }

    #[test]
    fn test_mode_serde_names_match_cli_surface() {
        assert_eq!(
            serde_json::to_string(&TradingMode::PureTa).unwrap(),
            "\"pure_ta\""
        );
        assert_eq!(
            serde_json::to_string(&TradingMode::MartingaleProtection).unwrap(),
            "\"martingale_protection\""
        );
    }
}
