//! Risk adjustment calculation
//!
//! Maps a [`RiskSnapshot`] and the active [`ModeProfile`] into a composite
//! size multiplier and a block/allow verdict. Pure and deterministic:
//! identical snapshot + profile always yields an identical result.

use tracing::debug;

use crate::modes::ModeProfile;
use crate::types::{Reading, RiskSnapshot};

/// Result of evaluating all enabled adjustments against a snapshot.
///
/// `multiplier` is the product of exactly the triggered factors, so it is
/// always in (0, 1]. When `block` is true the multiplier is irrelevant and
/// the caller must treat the trade as vetoed.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentResult {
    pub multiplier: f64,
    pub block: bool,
    pub reasons: Vec<String>,
}

impl AdjustmentResult {
    fn identity() -> Self {
        Self {
            multiplier: 1.0,
            block: false,
            reasons: Vec::new(),
        }
    }
}

/// Evaluate every enabled adjustment kind for the given snapshot.
///
/// Triggered factors multiply (order-independent). An unavailable signal is
/// resolved against `profile.fallback_on_error`: non-triggering when true,
/// a hard block when false. Extreme sentiment blocks outright when the
/// profile marks it a hard block, otherwise reduces size.
pub fn compute_adjustment(snapshot: &RiskSnapshot, profile: &ModeProfile) -> AdjustmentResult {
    let mut result = AdjustmentResult::identity();
    let factors = &profile.risk_reduction_factors;

    if profile.adjustments.correlation {
        match snapshot.correlation_risk {
            Reading::Value(risk) if risk >= profile.correlation_risk_threshold => {
                result.multiplier *= factors.high_correlation;
                result.reasons.push(format!(
                    "high_correlation: risk {:.1} >= threshold {:.1}, factor {:.2}",
                    risk, profile.correlation_risk_threshold, factors.high_correlation
                ));
            }
            Reading::Value(_) => {}
            Reading::Unavailable => apply_fallback(profile, &mut result, "correlation"),
        }
    }

    if profile.adjustments.economic_event {
        match snapshot.minutes_to_major_event {
            Reading::Value(Some(minutes)) if minutes <= profile.event_buffer_minutes => {
                result.multiplier *= factors.major_events;
                result.reasons.push(format!(
                    "major_event: {} min away, inside {} min buffer, factor {:.2}",
                    minutes, profile.event_buffer_minutes, factors.major_events
                ));
            }
            Reading::Value(_) => {}
            Reading::Unavailable => apply_fallback(profile, &mut result, "economic_calendar"),
        }
    }

    if profile.adjustments.sentiment_blocking {
        match snapshot.sentiment_score {
            Reading::Value(score) if score.abs() >= profile.sentiment_threshold => {
                if profile.sentiment_hard_block {
                    result.block = true;
                    result.reasons.push(format!(
                        "extreme_sentiment: |{:.1}| >= threshold {:.1}, blocking",
                        score, profile.sentiment_threshold
                    ));
                } else {
                    result.multiplier *= factors.extreme_sentiment;
                    result.reasons.push(format!(
                        "extreme_sentiment: |{:.1}| >= threshold {:.1}, factor {:.2}",
                        score, profile.sentiment_threshold, factors.extreme_sentiment
                    ));
                }
            }
            Reading::Value(_) => {}
            Reading::Unavailable => apply_fallback(profile, &mut result, "sentiment"),
        }
    }

    debug!(
        "Adjustment for {} mode: multiplier={:.4}, block={}, triggers={}",
        profile.mode,
        result.multiplier,
        result.block,
        result.reasons.len()
    );

    result
}

fn apply_fallback(profile: &ModeProfile, result: &mut AdjustmentResult, signal: &str) {
    if profile.fallback_on_error {
        result
            .reasons
            .push(format!("{} signal unavailable, fallback: no adjustment", signal));
    } else {
        result.block = true;
        result
            .reasons
            .push(format!("{} signal unavailable, blocking", signal));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::modes::{ModeProfile, TradingMode};
    use approx::assert_relative_eq;

    fn profile(mode: TradingMode) -> ModeProfile {
        ModeProfile::build(mode, &Config::default()).unwrap()
    }

    #[test]
    fn test_no_trigger_is_identity() {
        let result = compute_adjustment(&RiskSnapshot::nominal(), &profile(TradingMode::FullIntelligence));
        assert_eq!(result.multiplier, 1.0);
        assert!(!result.block);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_correlation_trigger_applies_factor() {
        let mut snap = RiskSnapshot::nominal();
        snap.correlation_risk = Reading::Value(85.0);
        let result = compute_adjustment(&snap, &profile(TradingMode::FullIntelligence));
        assert_relative_eq!(result.multiplier, 0.8);
        assert!(!result.block);
    }

    #[test]
    fn test_event_inside_buffer_applies_factor() {
        let mut snap = RiskSnapshot::nominal();
        snap.minutes_to_major_event = Reading::Value(Some(45));
        let result = compute_adjustment(&snap, &profile(TradingMode::FullIntelligence));
        assert_relative_eq!(result.multiplier, 0.7);
    }

    #[test]
    fn test_event_outside_buffer_ignored() {
        let mut snap = RiskSnapshot::nominal();
        snap.minutes_to_major_event = Reading::Value(Some(90));
        let result = compute_adjustment(&snap, &profile(TradingMode::FullIntelligence));
        assert_eq!(result.multiplier, 1.0);
    }

    #[test]
    fn test_composite_is_product_of_triggered_factors() {
        let mut snap = RiskSnapshot::nominal();
        snap.correlation_risk = Reading::Value(75.0);
        snap.minutes_to_major_event = Reading::Value(Some(30));
        let result = compute_adjustment(&snap, &profile(TradingMode::FullIntelligence));
        assert_relative_eq!(result.multiplier, 0.8 * 0.7);
        assert_eq!(result.reasons.len(), 2);
    }

    #[test]
    fn test_extreme_sentiment_blocks_in_full_intelligence() {
        let mut snap = RiskSnapshot::nominal();
        snap.sentiment_score = Reading::Value(-75.0);
        let result = compute_adjustment(&snap, &profile(TradingMode::FullIntelligence));
        assert!(result.block);
    }

    #[test]
    fn test_extreme_sentiment_reduces_in_aggressive() {
        let mut snap = RiskSnapshot::nominal();
        snap.sentiment_score = Reading::Value(85.0);
        let result = compute_adjustment(&snap, &profile(TradingMode::Aggressive));
        assert!(!result.block);
        assert_relative_eq!(result.multiplier, 0.9);
    }

    #[test]
    fn test_pure_ta_ignores_all_signals() {
        let mut snap = RiskSnapshot::nominal();
        snap.correlation_risk = Reading::Value(99.0);
        snap.sentiment_score = Reading::Value(99.0);
        snap.minutes_to_major_event = Reading::Value(Some(1));
        let result = compute_adjustment(&snap, &profile(TradingMode::PureTa));
        assert_eq!(result.multiplier, 1.0);
        assert!(!result.block);
    }

    #[test]
    fn test_unavailable_signal_falls_back_when_enabled() {
        let mut snap = RiskSnapshot::nominal();
        snap.correlation_risk = Reading::Unavailable;
        let result = compute_adjustment(&snap, &profile(TradingMode::FullIntelligence));
        assert_eq!(result.multiplier, 1.0);
        assert!(!result.block);
    }

    #[test]
    fn test_unavailable_signal_blocks_without_fallback() {
        let mut snap = RiskSnapshot::nominal();
        snap.correlation_risk = Reading::Unavailable;
        let mut profile = profile(TradingMode::FullIntelligence);
        profile.fallback_on_error = false;
        let result = compute_adjustment(&snap, &profile);
        assert!(result.block);
    }

    #[test]
    fn test_deterministic() {
        let mut snap = RiskSnapshot::nominal();
        snap.correlation_risk = Reading::Value(80.0);
        snap.sentiment_score = Reading::Value(-50.0);
        let profile = profile(TradingMode::Conservative);
        let a = compute_adjustment(&snap, &profile);
        let b = compute_adjustment(&snap, &profile);
        assert_eq!(a, b);
    }
}
