//! Martingale engine - main entry point
//!
//! This binary manages the configuration and mode selection for the
//! decision engine:
//! - setup: create directories and a default configuration
//! - status: show configuration health, ledger state, and recent decisions
//! - modes: list the available mode profiles
//! - enhanced / original: choose the engine flavor
//! - pure-ta, conservative, full-intel, aggressive, protection: mode swaps

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use martingale_engine::modes::TradingMode;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "martingale-engine")]
#[command(about = "Risk-adjusted martingale position engine with mode profiles and trade gating", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "enhanced_config.json")]
    config: String,

    /// Path to the state database
    #[arg(long, global = true, default_value = "state.db")]
    state_db: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create directories and a default configuration file
    Setup,

    /// Show configuration health, active mode, and ledger state
    Status,

    /// List the available mode profiles
    Modes,

    /// Run with the enhanced (signal-aware) engine
    Enhanced,

    /// Run with the original TA-only engine
    Original,

    /// Switch to Pure TA mode (all adjustments off)
    PureTa,

    /// Switch to Conservative mode
    Conservative,

    /// Switch to Full Intelligence mode
    FullIntel,

    /// Switch to Aggressive mode
    Aggressive,

    /// Switch to Martingale Protection mode
    Protection,
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // File appender
    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // File layer - same format but without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Setup => "setup",
        Commands::Status => "status",
        Commands::Modes => "modes",
        Commands::Enhanced => "enhanced",
        Commands::Original => "original",
        Commands::PureTa => "pure_ta",
        Commands::Conservative => "conservative",
        Commands::FullIntel => "full_intel",
        Commands::Aggressive => "aggressive",
        Commands::Protection => "protection",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Setup => {
            if let Err(err) = commands::setup::run(&cli.config) {
                eprintln!("Setup failed: {:#}", err);
                eprintln!("Fix the issue and check with: martingale-engine status");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Status => commands::status::run(&cli.config, &cli.state_db),
        Commands::Modes => commands::modes::list(),
        Commands::Enhanced => commands::setup::set_engine_flavor(&cli.config, true),
        Commands::Original => commands::setup::set_engine_flavor(&cli.config, false),
        Commands::PureTa => commands::modes::apply(&cli.config, TradingMode::PureTa),
        Commands::Conservative => commands::modes::apply(&cli.config, TradingMode::Conservative),
        Commands::FullIntel => commands::modes::apply(&cli.config, TradingMode::FullIntelligence),
        Commands::Aggressive => commands::modes::apply(&cli.config, TradingMode::Aggressive),
        Commands::Protection => {
            commands::modes::apply(&cli.config, TradingMode::MartingaleProtection)
        }
    }
}
