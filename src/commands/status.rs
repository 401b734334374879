//! Status command: configuration health, ledger state, recent decisions

use anyhow::Result;
use std::path::Path;

use martingale_engine::modes::ModeProfile;
use martingale_engine::state::StateStore;
use martingale_engine::Config;

pub fn run(config_path: &str, state_db: &str) -> Result<()> {
    if !Path::new(config_path).exists() {
        println!("No configuration found at {} - run setup first", config_path);
        std::process::exit(1);
    }

    let config = Config::from_file(config_path)?;
    let profile = ModeProfile::build(config.trading.mode, &config)?;

    println!("System: {} v{}", config.system.name, config.system.version);
    println!("Trading enabled: {}", config.trading.enabled);
    println!(
        "Engine flavor: {}",
        if config.trading.enhanced_engine { "enhanced" } else { "original" }
    );
    println!("Active mode: {} - {}", profile.mode, profile.mode.describe());
    println!(
        "Ceilings: drawdown {:.0}%, daily loss {:.0}%, concurrent trades {}",
        config.trading.risk_management.max_drawdown_percent,
        config.trading.risk_management.max_daily_loss_percent,
        config.trading.risk_management.max_concurrent_trades
    );
    println!(
        "Martingale: max_layers {}, multiplier {}, emergency DD {:.0}%",
        config.martingale.max_layers,
        config.martingale.multiplier,
        config.martingale.emergency_dd_percentage
    );

    if Path::new(state_db).exists() {
        let store = StateStore::open(state_db)?;

        let ledger = store.load_ledger()?;
        if ledger.is_empty() {
            println!("Martingale ledger: all instruments flat");
        } else {
            println!("Martingale ledger ({} active sequences):", ledger.len());
            for (instrument, entry) in &ledger {
                println!(
                    "  {:10} layer {:2}  next lot {:.4}  exposure {:.4}{}",
                    instrument.to_string(),
                    entry.layer,
                    entry.next_lot(),
                    entry.cumulative_exposure,
                    if entry.capped { "  CAPPED" } else { "" }
                );
            }
        }

        let decisions = store.recent_decisions(10)?;
        if !decisions.is_empty() {
            println!("Recent decisions:");
            for record in decisions {
                println!(
                    "  {} {:10} {:8} lot {:.4}  {}",
                    record.timestamp,
                    record.instrument.to_string(),
                    if record.allowed { "allow" } else { "veto" },
                    record.lot_size,
                    record.reasons.join("; ")
                );
            }
        }
    } else {
        println!("No state database at {} (engine not started yet)", state_db);
    }

    Ok(())
}
