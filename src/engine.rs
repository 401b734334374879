//! Position sizing decision engine
//!
//! Composes the global risk ceilings, the martingale tracker, and the risk
//! adjustment calculator into a single trade/size/block decision. The first
//! veto wins, in fixed order: ceiling, layer cap, risk block. Evaluation has
//! no side effects; the ledger only moves on confirmed fill/close events
//! reported by the execution collaborator.

use std::sync::Arc;
use tracing::{debug, info};

use crate::adjustment::compute_adjustment;
use crate::config::{Config, RiskCeilings};
use crate::martingale::{CloseEffect, LedgerError, MartingaleTracker};
use crate::modes::{ModeProfile, ModeSelector, TradingMode};
use crate::types::{Decision, Instrument, RiskSnapshot, TradeCloseEvent};

/// Decision engine wiring ceilings, mode selection, and the martingale ledger
#[derive(Debug)]
pub struct DecisionEngine {
    ceilings: RiskCeilings,
    selector: ModeSelector,
    tracker: MartingaleTracker,
}

impl DecisionEngine {
    /// Build the engine from a validated configuration, starting in the
    /// configured mode.
    pub fn from_config(config: &Config) -> Result<Self, crate::config::ConfigError> {
        let profile = ModeProfile::build(config.trading.mode, config)?;
        Ok(Self {
            ceilings: config.trading.risk_management,
            selector: ModeSelector::new(profile),
            tracker: MartingaleTracker::new(config.martingale),
        })
    }

    /// Atomically swap the active mode profile. In-flight decisions finish
    /// under the profile they read.
    pub fn select_mode(
        &self,
        mode: TradingMode,
        config: &Config,
    ) -> Result<Arc<ModeProfile>, crate::config::ConfigError> {
        self.selector.select(mode, config)
    }

    pub fn active_mode(&self) -> TradingMode {
        self.selector.active().mode
    }

    pub fn tracker(&self) -> &MartingaleTracker {
        &self.tracker
    }

    /// Decide whether a new trade on `instrument` is permitted and at what
    /// size. Pure evaluation: recomputing with the same snapshot yields the
    /// same decision, and nothing escapes as an error — every internal
    /// condition folds into `allow=false` with a reason.
    pub fn decide(&self, snapshot: &RiskSnapshot, instrument: &Instrument) -> Decision {
        // 1. Hard ceilings: highest priority, independent of mode
        if let Some(breach) = self.ceiling_breach(snapshot) {
            info!("Trade on {} vetoed by ceiling: {}", instrument, breach);
            let mut decision = Decision::vetoed("ceiling");
            decision.reasons.push(breach);
            return decision;
        }

        // 2. Martingale cap
        if self.tracker.is_capped(instrument) {
            info!("Trade on {} vetoed: martingale layer cap reached", instrument);
            return Decision::vetoed("layer_cap");
        }

        // 3. Risk adjustments under the active profile
        let profile = self.selector.active();
        let adjustment = compute_adjustment(snapshot, &profile);
        if adjustment.block {
            info!("Trade on {} vetoed by risk adjustment", instrument);
            let mut decision = Decision::vetoed("risk_block");
            decision.reasons.extend(adjustment.reasons);
            return decision;
        }

        // 4. Compose the lot size
        let multiplier = if profile.adjustments.dynamic_sizing {
            adjustment.multiplier
        } else {
            1.0
        };
        let lot_size = self.tracker.next_lot_size(instrument) * multiplier;

        debug!(
            "Trade on {} allowed: lot {:.4} (multiplier {:.4}, mode {})",
            instrument, lot_size, multiplier, profile.mode
        );
        Decision {
            allow: true,
            lot_size,
            reasons: adjustment.reasons,
        }
    }

    fn ceiling_breach(&self, snapshot: &RiskSnapshot) -> Option<String> {
        if snapshot.account_drawdown_percent >= self.ceilings.max_drawdown_percent {
            return Some(format!(
                "drawdown {:.1}% >= max {:.1}%",
                snapshot.account_drawdown_percent, self.ceilings.max_drawdown_percent
            ));
        }
        if snapshot.daily_loss_percent >= self.ceilings.max_daily_loss_percent {
            return Some(format!(
                "daily loss {:.1}% >= max {:.1}%",
                snapshot.daily_loss_percent, self.ceilings.max_daily_loss_percent
            ));
        }
        if snapshot.open_concurrent_trades >= self.ceilings.max_concurrent_trades {
            return Some(format!(
                "{} open trades >= max {}",
                snapshot.open_concurrent_trades, self.ceilings.max_concurrent_trades
            ));
        }
        None
    }

    /// Confirmed fill: the instrument's first entry opens its sequence.
    pub fn on_trade_opened(&self, instrument: &Instrument) {
        self.tracker.open_sequence(instrument);
    }

    /// Confirmed close reported by the execution collaborator. A layer-cap
    /// failure is reported as a block, not a crash: the ledger stays capped
    /// and subsequent decisions return `layer_cap`.
    pub fn on_trade_closed(&self, event: &TradeCloseEvent) -> Result<CloseEffect, LedgerError> {
        self.tracker.record_close(event)
    }

    /// Emergency-stop event: force every martingale sequence flat when the
    /// drawdown threshold is reached. Fatal to the positions, not to the
    /// process.
    pub fn on_emergency_stop(&self, account_drawdown_percent: f64) -> Option<Vec<Instrument>> {
        self.tracker.emergency_stop(account_drawdown_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Reading, TradeOutcome};
    use approx::assert_relative_eq;

    fn engine(mode: TradingMode) -> (DecisionEngine, Config) {
        let mut config = Config::default();
        config.trading.mode = mode;
        let engine = DecisionEngine::from_config(&config).unwrap();
        (engine, config)
    }

    fn loss(instrument: &Instrument) -> TradeCloseEvent {
        TradeCloseEvent {
            instrument: instrument.clone(),
            outcome: TradeOutcome::Loss,
            realized_profit_percent: -1.0,
            floating_profit_pips: 0.0,
        }
    }

    #[test]
    fn test_nominal_snapshot_allows_base_lot() {
        let (engine, _) = engine(TradingMode::FullIntelligence);
        let decision = engine.decide(&RiskSnapshot::nominal(), &Instrument::new("EURUSD"));
        assert!(decision.allow);
        assert_relative_eq!(decision.lot_size, 0.1);
        assert!(decision.reasons.is_empty());
    }

    #[test]
    fn test_high_correlation_reduces_lot() {
        // Threshold 70, factor 0.8, base lot 0.1: correlation 85 gives 0.08
        let (engine, _) = engine(TradingMode::FullIntelligence);
        let mut snap = RiskSnapshot::nominal();
        snap.correlation_risk = Reading::Value(85.0);
        let decision = engine.decide(&snap, &Instrument::new("EURUSD"));
        assert!(decision.allow);
        assert_relative_eq!(decision.lot_size, 0.08, epsilon = 1e-12);
    }

    #[test]
    fn test_drawdown_ceiling_vetoes_regardless_of_mode() {
        for mode in TradingMode::ALL {
            let (engine, _) = engine(mode);
            let mut snap = RiskSnapshot::nominal();
            snap.account_drawdown_percent = 55.0; // max is 50
            let decision = engine.decide(&snap, &Instrument::new("EURUSD"));
            assert!(!decision.allow);
            assert_eq!(decision.reasons[0], "ceiling");
        }
    }

    #[test]
    fn test_ceiling_outranks_other_vetoes() {
        let (engine, _) = engine(TradingMode::FullIntelligence);
        let mut snap = RiskSnapshot::nominal();
        snap.account_drawdown_percent = 60.0;
        snap.sentiment_score = Reading::Value(95.0); // would also hard-block
        snap.correlation_risk = Reading::Value(90.0); // would also reduce
        let decision = engine.decide(&snap, &Instrument::new("EURUSD"));
        assert!(!decision.allow);
        assert_eq!(decision.reasons[0], "ceiling");
    }

    #[test]
    fn test_daily_loss_and_concurrency_ceilings() {
        let (engine, _) = engine(TradingMode::PureTa);

        let mut snap = RiskSnapshot::nominal();
        snap.daily_loss_percent = 12.0; // max is 10
        assert!(!engine.decide(&snap, &Instrument::new("EURUSD")).allow);

        let mut snap = RiskSnapshot::nominal();
        snap.open_concurrent_trades = 20; // max is 20, >= vetoes
        assert!(!engine.decide(&snap, &Instrument::new("EURUSD")).allow);
    }

    #[test]
    fn test_capped_instrument_reports_layer_cap() {
        let mut config = Config::default();
        config.martingale.max_layers = 1;
        let engine = DecisionEngine::from_config(&config).unwrap();
        let eurusd = Instrument::new("EURUSD");

        engine.on_trade_opened(&eurusd);
        engine.on_trade_closed(&loss(&eurusd)).unwrap();
        assert!(engine.on_trade_closed(&loss(&eurusd)).is_err());

        let decision = engine.decide(&RiskSnapshot::nominal(), &eurusd);
        assert!(!decision.allow);
        assert_eq!(decision.reasons, vec!["layer_cap".to_string()]);

        // Emergency reset clears the block
        engine.on_emergency_stop(60.0).unwrap();
        let decision = engine.decide(&RiskSnapshot::nominal(), &eurusd);
        assert!(decision.allow);
    }

    #[test]
    fn test_sentiment_hard_block_reports_risk_block() {
        let (engine, _) = engine(TradingMode::FullIntelligence);
        let mut snap = RiskSnapshot::nominal();
        snap.sentiment_score = Reading::Value(-80.0);
        let decision = engine.decide(&snap, &Instrument::new("EURUSD"));
        assert!(!decision.allow);
        assert_eq!(decision.reasons[0], "risk_block");
    }

    #[test]
    fn test_dynamic_sizing_toggle_forces_unit_multiplier() {
        let mut config = Config::default();
        config.trading.mode = TradingMode::Aggressive;
        config.enhanced_risk_management.dynamic_position_sizing = false;
        let engine = DecisionEngine::from_config(&config).unwrap();

        let mut snap = RiskSnapshot::nominal();
        snap.correlation_risk = Reading::Value(95.0);
        let decision = engine.decide(&snap, &Instrument::new("EURUSD"));
        assert!(decision.allow);
        // Reduction computed but not applied to size
        assert_relative_eq!(decision.lot_size, 0.1);
        assert!(!decision.reasons.is_empty());
    }

    #[test]
    fn test_martingale_layer_scales_decision_lot() {
        let (engine, _) = engine(TradingMode::PureTa);
        let eurusd = Instrument::new("EURUSD");
        engine.on_trade_opened(&eurusd);
        engine.on_trade_closed(&loss(&eurusd)).unwrap();
        engine.on_trade_closed(&loss(&eurusd)).unwrap();

        let decision = engine.decide(&RiskSnapshot::nominal(), &eurusd);
        assert!(decision.allow);
        assert_relative_eq!(decision.lot_size, 0.4); // 0.1 * 2^2
    }

    #[test]
    fn test_mode_swap_applies_to_later_decisions_only() {
        let (engine, config) = engine(TradingMode::Aggressive);
        let eurusd = Instrument::new("EURUSD");

        let mut snap = RiskSnapshot::nominal();
        snap.sentiment_score = Reading::Value(85.0);
        let before = engine.decide(&snap, &eurusd);
        assert!(before.allow);
        assert_relative_eq!(before.lot_size, 0.09, epsilon = 1e-12);

        engine.select_mode(TradingMode::PureTa, &config).unwrap();
        let after = engine.decide(&snap, &eurusd);
        assert!(after.allow);
        assert_relative_eq!(after.lot_size, 0.1);
        // The earlier decision is unchanged by the swap
        assert_relative_eq!(before.lot_size, 0.09, epsilon = 1e-12);
    }

    #[test]
    fn test_decide_has_no_side_effects() {
        let (engine, _) = engine(TradingMode::FullIntelligence);
        let eurusd = Instrument::new("EURUSD");
        let snap = RiskSnapshot::nominal();

        let first = engine.decide(&snap, &eurusd);
        let second = engine.decide(&snap, &eurusd);
        assert_eq!(first.lot_size, second.lot_size);
        assert_eq!(engine.tracker().current_layer(&eurusd), None);
    }
}
