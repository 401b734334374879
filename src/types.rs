//! Core data types used across the decision engine

use serde::{Deserialize, Serialize};

/// Tradable instrument key using Arc<str> for cheap cloning
///
/// Instrument keys are cloned on every decision, ledger lookup, and audit
/// record. Using Arc<str> instead of String reduces heap allocations from
/// O(n) to O(1) per clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Instrument {
    pub fn new(s: impl AsRef<str>) -> Self {
        Instrument(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An external risk signal that may not have been delivered.
///
/// Collaborators scrape sentiment, correlation, and calendar data on their
/// own schedules; a stale or missing feed shows up here as `Unavailable`
/// and is resolved against the profile's `fallback_on_error` switch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reading<T> {
    Value(T),
    Unavailable,
}

impl<T> Reading<T> {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Reading::Unavailable)
    }
}

/// Immutable per-decision bundle of risk signals and account state.
///
/// Created fresh for each decision and never mutated. Percentages are on a
/// 0-100 scale; `sentiment_score` is signed, with extremity measured as
/// absolute value against the profile threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSnapshot {
    /// Correlation risk against other open positions, 0-100
    pub correlation_risk: Reading<f64>,
    /// Signed sentiment score; |score| >= threshold counts as extreme
    pub sentiment_score: Reading<f64>,
    /// Minutes until the next major economic event; None = no upcoming event
    pub minutes_to_major_event: Reading<Option<u32>>,
    /// Peak-to-trough account drawdown, 0-100
    pub account_drawdown_percent: f64,
    /// Loss booked today as a percentage of equity, 0-100
    pub daily_loss_percent: f64,
    /// Number of currently open trades across all instruments
    pub open_concurrent_trades: u32,
}

impl RiskSnapshot {
    /// Snapshot with all signals present and account state nominal.
    /// Useful as a baseline in tests and dry runs.
    pub fn nominal() -> Self {
        Self {
            correlation_risk: Reading::Value(0.0),
            sentiment_score: Reading::Value(0.0),
            minutes_to_major_event: Reading::Value(None),
            account_drawdown_percent: 0.0,
            daily_loss_percent: 0.0,
            open_concurrent_trades: 0,
        }
    }
}

/// Outcome of a closed trade as reported by the execution collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Win,
    Loss,
}

/// Trade-closed event consumed by the martingale tracker.
///
/// Ledger mutation happens exactly once per confirmed close; the caller
/// enforces at-most-once delivery via the broker ticket id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeCloseEvent {
    pub instrument: Instrument,
    pub outcome: TradeOutcome,
    /// Realized profit as a percentage of account equity
    pub realized_profit_percent: f64,
    /// Floating profit in pips at close time
    pub floating_profit_pips: f64,
}

/// Final verdict handed to the execution collaborator.
///
/// `reasons` preserves evaluation order: the first entry names the veto (or
/// the first applied reduction) and later entries add detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    pub lot_size: f64,
    pub reasons: Vec<String>,
}

impl Decision {
    pub fn vetoed(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            lot_size: 0.0,
            reasons: vec![reason.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_cheap_clone_equality() {
        let a = Instrument::new("EURUSD");
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "EURUSD");
    }

    #[test]
    fn test_instrument_serde_transparent() {
        let key = Instrument::new("XAUUSD");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"XAUUSD\"");
        let parsed: Instrument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_nominal_snapshot_has_all_signals() {
        let snap = RiskSnapshot::nominal();
        assert!(!snap.correlation_risk.is_unavailable());
        assert!(!snap.sentiment_score.is_unavailable());
        assert_eq!(snap.open_concurrent_trades, 0);
    }
}
