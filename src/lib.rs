//! Risk-Adjusted Martingale Position Engine
//!
//! Decides whether a new trade is permitted and at what size, given market
//! and account state plus external risk signals (correlation, sentiment,
//! economic-calendar proximity). Martingale layering escalates exposure
//! after losses while drawdown and daily-loss ceilings stay hard limits.
//! Order execution and signal collection are external collaborators.

pub mod adjustment;
pub mod config;
pub mod engine;
pub mod martingale;
pub mod modes;
pub mod state;
pub mod types;

pub use config::Config;
pub use engine::DecisionEngine;
pub use modes::{ModeProfile, ModeSelector, TradingMode};
pub use types::*;
