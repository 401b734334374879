//! Martingale layer tracking
//!
//! Stateful per-instrument ledger of consecutive-loss layers. Each
//! instrument moves through FLAT, LAYER_0 .. LAYER_max: a losing close
//! escalates the layer and the next lot size, a qualifying win resets the
//! sequence, and an emergency drawdown forces every instrument flat.
//!
//! Entries sit behind per-key locks (map under `RwLock`, entries in
//! `Arc<Mutex<_>>`) so sequences on different instruments mutate in
//! parallel. The caller serializes close events per instrument and delivers
//! each one at most once, keyed by the broker ticket id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::MartingaleConfig;
use crate::types::{Instrument, TradeCloseEvent, TradeOutcome};

/// Ledger transition errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("layer cap exceeded for {instrument}: layer {attempted} > max {max_layers}")]
    LayerCapExceeded {
        instrument: Instrument,
        attempted: u32,
        max_layers: u32,
    },
}

/// Per-instrument martingale state.
///
/// `layer` is the layer of the next entry to place: 0 right after the
/// sequence opens, incremented on every losing close. `cumulative_exposure`
/// only grows while the sequence is alive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub layer: u32,
    pub base_lot: f64,
    pub multiplier: f64,
    pub cumulative_exposure: f64,
    pub profit_buffer_pips: f64,
    pub min_profit_percentage: f64,
    /// Set when a loss would push past max_layers; blocks further entries
    /// until a winning or emergency reset
    pub capped: bool,
}

impl LedgerEntry {
    fn open(config: &MartingaleConfig) -> Self {
        Self {
            layer: 0,
            base_lot: config.base_lot,
            multiplier: config.multiplier,
            cumulative_exposure: config.base_lot,
            profit_buffer_pips: config.profit_buffer_pips,
            min_profit_percentage: config.min_profit_percentage,
            capped: false,
        }
    }

    /// Lot size for the entry at the current layer
    pub fn next_lot(&self) -> f64 {
        self.base_lot * self.multiplier.powi(self.layer as i32)
    }
}

/// What a close event did to the instrument's sequence
#[derive(Debug, Clone, PartialEq)]
pub enum CloseEffect {
    /// Sequence closed in profit, ledger entry removed
    SequenceReset,
    /// Loss escalated the sequence; lot size for the next layer
    Escalated { layer: u32, next_lot: f64 },
    /// Win did not meet the profit target; sequence stays open
    SequenceHeld,
    /// No ledger entry existed for the instrument
    NotTracked,
}

/// Per-instrument martingale ledger with per-key locking
#[derive(Debug)]
pub struct MartingaleTracker {
    config: MartingaleConfig,
    ledger: RwLock<HashMap<Instrument, Arc<Mutex<LedgerEntry>>>>,
    emergency_stop_active: AtomicBool,
}

impl MartingaleTracker {
    pub fn new(config: MartingaleConfig) -> Self {
        Self {
            config,
            ledger: RwLock::new(HashMap::new()),
            emergency_stop_active: AtomicBool::new(false),
        }
    }

    fn entry(&self, instrument: &Instrument) -> Option<Arc<Mutex<LedgerEntry>>> {
        self.ledger
            .read()
            .expect("ledger lock poisoned")
            .get(instrument)
            .cloned()
    }

    /// FLAT -> LAYER_0: start a sequence on first trade entry.
    /// No-op when a sequence is already running.
    pub fn open_sequence(&self, instrument: &Instrument) {
        let mut ledger = self.ledger.write().expect("ledger lock poisoned");
        ledger
            .entry(instrument.clone())
            .or_insert_with(|| Arc::new(Mutex::new(LedgerEntry::open(&self.config))));
    }

    /// Apply a confirmed trade close to the instrument's sequence.
    ///
    /// A win at or above `min_profit_percentage`, or one holding at least
    /// `profit_buffer_pips` of floating profit, resets the sequence. A loss
    /// escalates the layer or fails with [`LedgerError::LayerCapExceeded`]
    /// when the cap is hit.
    pub fn record_close(&self, event: &TradeCloseEvent) -> Result<CloseEffect, LedgerError> {
        match event.outcome {
            TradeOutcome::Win => {
                let qualifies = {
                    match self.entry(&event.instrument) {
                        Some(entry) => {
                            let entry = entry.lock().expect("ledger entry lock poisoned");
                            event.realized_profit_percent >= entry.min_profit_percentage
                                || event.floating_profit_pips >= entry.profit_buffer_pips
                        }
                        None => return Ok(CloseEffect::NotTracked),
                    }
                };
                if qualifies {
                    self.reset(&event.instrument);
                    info!(
                        "Martingale sequence for {} closed in profit ({:.2}%), reset to flat",
                        event.instrument, event.realized_profit_percent
                    );
                    Ok(CloseEffect::SequenceReset)
                } else {
                    Ok(CloseEffect::SequenceHeld)
                }
            }
            TradeOutcome::Loss => self.record_loss(&event.instrument),
        }
    }

    fn record_loss(&self, instrument: &Instrument) -> Result<CloseEffect, LedgerError> {
        self.open_sequence(instrument);
        let entry = self
            .entry(instrument)
            .expect("sequence opened above; entry must exist");
        let mut entry = entry.lock().expect("ledger entry lock poisoned");

        let attempted = entry.layer + 1;
        if attempted > self.config.max_layers {
            entry.capped = true;
            warn!(
                "Martingale cap hit for {}: layer {} would exceed max {}",
                instrument, attempted, self.config.max_layers
            );
            return Err(LedgerError::LayerCapExceeded {
                instrument: instrument.clone(),
                attempted,
                max_layers: self.config.max_layers,
            });
        }

        entry.layer = attempted;
        let next_lot = entry.next_lot();
        entry.cumulative_exposure += next_lot;
        info!(
            "Martingale {} escalated to layer {}, next lot {:.4}, exposure {:.4}",
            instrument, entry.layer, next_lot, entry.cumulative_exposure
        );
        Ok(CloseEffect::Escalated {
            layer: entry.layer,
            next_lot,
        })
    }

    /// Early take-profit rule: lock gains when price has flirted back to
    /// within `flirt_threshold_pips` of the original entry while the
    /// sequence holds at least `profit_buffer_pips` of floating profit.
    /// Applies only to instruments with a running sequence.
    pub fn should_lock_profit(
        &self,
        instrument: &Instrument,
        distance_from_entry_pips: f64,
        floating_profit_pips: f64,
    ) -> bool {
        match self.entry(instrument) {
            Some(entry) => {
                let entry = entry.lock().expect("ledger entry lock poisoned");
                distance_from_entry_pips.abs() <= self.config.flirt_threshold_pips
                    && floating_profit_pips >= entry.profit_buffer_pips
            }
            None => false,
        }
    }

    /// ANY -> FLAT, forced. When drawdown reaches the emergency threshold,
    /// every tracked instrument is flagged for closure and the ledger is
    /// cleared. Returns the flagged instruments, or None when the threshold
    /// was not hit.
    pub fn emergency_stop(&self, account_drawdown_percent: f64) -> Option<Vec<Instrument>> {
        if account_drawdown_percent < self.config.emergency_dd_percentage {
            return None;
        }
        let mut ledger = self.ledger.write().expect("ledger lock poisoned");
        let flagged: Vec<Instrument> = ledger.keys().cloned().collect();
        ledger.clear();
        self.emergency_stop_active.store(true, Ordering::SeqCst);
        warn!(
            "EMERGENCY STOP: drawdown {:.1}% >= {:.1}%, {} instrument(s) flagged for closure",
            account_drawdown_percent,
            self.config.emergency_dd_percentage,
            flagged.len()
        );
        Some(flagged)
    }

    pub fn emergency_stop_active(&self) -> bool {
        self.emergency_stop_active.load(Ordering::SeqCst)
    }

    /// Manual re-arm after an emergency stop has been handled
    pub fn clear_emergency_stop(&self) {
        self.emergency_stop_active.store(false, Ordering::SeqCst);
    }

    /// LAYER_n -> FLAT: remove the instrument's entry. Idempotent.
    pub fn reset(&self, instrument: &Instrument) {
        self.ledger
            .write()
            .expect("ledger lock poisoned")
            .remove(instrument);
    }

    /// Layer of the next entry, None when the instrument is flat
    pub fn current_layer(&self, instrument: &Instrument) -> Option<u32> {
        self.entry(instrument)
            .map(|e| e.lock().expect("ledger entry lock poisoned").layer)
    }

    /// Lot size the next entry would use; base lot when the instrument is flat
    pub fn next_lot_size(&self, instrument: &Instrument) -> f64 {
        match self.entry(instrument) {
            Some(entry) => entry.lock().expect("ledger entry lock poisoned").next_lot(),
            None => self.config.base_lot,
        }
    }

    /// True once a loss has pushed the instrument past max_layers
    pub fn is_capped(&self, instrument: &Instrument) -> bool {
        self.entry(instrument)
            .map(|e| e.lock().expect("ledger entry lock poisoned").capped)
            .unwrap_or(false)
    }

    /// Snapshot of every ledger entry, for observability and persistence
    pub fn entries(&self) -> Vec<(Instrument, LedgerEntry)> {
        self.ledger
            .read()
            .expect("ledger lock poisoned")
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    v.lock().expect("ledger entry lock poisoned").clone(),
                )
            })
            .collect()
    }

    /// Restore ledger entries saved by a previous session
    pub fn restore(&self, entries: Vec<(Instrument, LedgerEntry)>) {
        let mut ledger = self.ledger.write().expect("ledger lock poisoned");
        for (instrument, entry) in entries {
            ledger.insert(instrument, Arc::new(Mutex::new(entry)));
        }
    }
}
