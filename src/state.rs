//! SQLite persistence for ledger state and the decision audit trail
//!
//! The martingale ledger survives restarts, and every decision can be
//! recorded for the status command and dashboard collaborators
//! (`logging.decision_logging`).

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::martingale::LedgerEntry;
use crate::modes::TradingMode;
use crate::types::{Decision, Instrument};

/// One row of the decision audit trail
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub id: i64,
    pub timestamp: String,
    pub instrument: Instrument,
    pub mode: String,
    pub allowed: bool,
    pub lot_size: f64,
    pub reasons: Vec<String>,
}

/// SQLite-backed state store shared across threads
pub struct StateStore {
    conn: Arc<Mutex<Connection>>,
}

impl StateStore {
    /// Open (or create) the state database and initialize the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).context("Failed to open state database")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store for tests and dry runs
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().expect("state db lock poisoned");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS martingale_ledger (
                instrument TEXT PRIMARY KEY,
                layer INTEGER NOT NULL,
                base_lot REAL NOT NULL,
                multiplier REAL NOT NULL,
                cumulative_exposure REAL NOT NULL,
                profit_buffer_pips REAL NOT NULL,
                min_profit_percentage REAL NOT NULL,
                capped INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS decisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                instrument TEXT NOT NULL,
                mode TEXT NOT NULL,
                allowed INTEGER NOT NULL,
                lot_size REAL NOT NULL,
                reasons TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_decisions_instrument
                ON decisions(instrument);",
        )
        .context("Failed to initialize state schema")?;
        Ok(())
    }

    /// Replace the persisted ledger with the tracker's current entries.
    pub fn save_ledger(&self, entries: &[(Instrument, LedgerEntry)]) -> Result<()> {
        let mut conn = self.conn.lock().expect("state db lock poisoned");
        let tx = conn.transaction().context("Failed to start transaction")?;
        tx.execute("DELETE FROM martingale_ledger", [])?;
        let now = Utc::now().to_rfc3339();
        for (instrument, entry) in entries {
            tx.execute(
                "INSERT INTO martingale_ledger
                    (instrument, layer, base_lot, multiplier, cumulative_exposure,
                     profit_buffer_pips, min_profit_percentage, capped, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    instrument.as_str(),
                    entry.layer,
                    entry.base_lot,
                    entry.multiplier,
                    entry.cumulative_exposure,
                    entry.profit_buffer_pips,
                    entry.min_profit_percentage,
                    entry.capped as i64,
                    now,
                ],
            )?;
        }
        tx.commit().context("Failed to commit ledger")?;
        debug!("Persisted {} ledger entries", entries.len());
        Ok(())
    }

    /// Load ledger entries saved by a previous session.
    pub fn load_ledger(&self) -> Result<Vec<(Instrument, LedgerEntry)>> {
        let conn = self.conn.lock().expect("state db lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT instrument, layer, base_lot, multiplier, cumulative_exposure,
                    profit_buffer_pips, min_profit_percentage, capped
             FROM martingale_ledger",
        )?;
        let rows = stmt.query_map([], |row| {
            let instrument: String = row.get(0)?;
            Ok((
                Instrument::new(instrument),
                LedgerEntry {
                    layer: row.get(1)?,
                    base_lot: row.get(2)?,
                    multiplier: row.get(3)?,
                    cumulative_exposure: row.get(4)?,
                    profit_buffer_pips: row.get(5)?,
                    min_profit_percentage: row.get(6)?,
                    capped: row.get::<_, i64>(7)? != 0,
                },
            ))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// Append a decision to the audit trail.
    pub fn record_decision(
        &self,
        instrument: &Instrument,
        mode: TradingMode,
        decision: &Decision,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("state db lock poisoned");
        conn.execute(
            "INSERT INTO decisions (timestamp, instrument, mode, allowed, lot_size, reasons)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Utc::now().to_rfc3339(),
                instrument.as_str(),
                mode.to_string(),
                decision.allow as i64,
                decision.lot_size,
                serde_json::to_string(&decision.reasons)?,
            ],
        )?;
        Ok(())
    }

    /// Most recent decisions, newest first.
    pub fn recent_decisions(&self, limit: u32) -> Result<Vec<DecisionRecord>> {
        let conn = self.conn.lock().expect("state db lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, instrument, mode, allowed, lot_size, reasons
             FROM decisions ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |row| {
            let instrument: String = row.get(2)?;
            let reasons: String = row.get(6)?;
            Ok(DecisionRecord {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                instrument: Instrument::new(instrument),
                mode: row.get(3)?,
                allowed: row.get::<_, i64>(4)? != 0,
                lot_size: row.get(5)?,
                reasons: serde_json::from_str(&reasons).unwrap_or_default(),
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MartingaleConfig;
    use crate::martingale::MartingaleTracker;
    use crate::types::{TradeCloseEvent, TradeOutcome};

    #[test]
    fn test_ledger_round_trip() {
        let store = StateStore::in_memory().unwrap();
        let tracker = MartingaleTracker::new(MartingaleConfig::default());
        let eurusd = Instrument::new("EURUSD");
        tracker.open_sequence(&eurusd);
        tracker
            .record_close(&TradeCloseEvent {
                instrument: eurusd.clone(),
                outcome: TradeOutcome::Loss,
                realized_profit_percent: -1.0,
                floating_profit_pips: 0.0,
            })
            .unwrap();

        store.save_ledger(&tracker.entries()).unwrap();

        let loaded = store.load_ledger().unwrap();
        assert_eq!(loaded.len(), 1);
        let (instrument, entry) = &loaded[0];
        assert_eq!(*instrument, eurusd);
        assert_eq!(entry.layer, 1);
        assert!(!entry.capped);
    }

    #[test]
    fn test_save_ledger_replaces_previous_state() {
        let store = StateStore::in_memory().unwrap();
        let tracker = MartingaleTracker::new(MartingaleConfig::default());
        tracker.open_sequence(&Instrument::new("EURUSD"));
        store.save_ledger(&tracker.entries()).unwrap();

        tracker.reset(&Instrument::new("EURUSD"));
        store.save_ledger(&tracker.entries()).unwrap();
        assert!(store.load_ledger().unwrap().is_empty());
    }

    #[test]
    fn test_decision_audit_trail() {
        let store = StateStore::in_memory().unwrap();
        let eurusd = Instrument::new("EURUSD");
        let decision = Decision {
            allow: true,
            lot_size: 0.08,
            reasons: vec!["high_correlation: risk 85.0 >= threshold 70.0, factor 0.80".into()],
        };
        store
            .record_decision(&eurusd, TradingMode::FullIntelligence, &decision)
            .unwrap();
        store
            .record_decision(&eurusd, TradingMode::FullIntelligence, &Decision::vetoed("ceiling"))
            .unwrap();

        let records = store.recent_decisions(10).unwrap();
        assert_eq!(records.len(), 2);
        // Newest first
        assert!(!records[0].allowed);
        assert_eq!(records[0].reasons, vec!["ceiling".to_string()]);
        assert!(records[1].allowed);
        assert_eq!(records[1].lot_size, 0.08);
    }
}
