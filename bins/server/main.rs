//! # Market Data Server
//!
//! This is a TCP-based near-real-time security quote server.
//! It simulates price updates while the market is open and streams change
//! events to connected clients over UDP.
//!
//! ## Features
//! - Seeds quotes from a configuration file or a built-in default table.
//! - Periodically updates quotes in the background while the market is open.
//! - TCP interface for client commands: `PING`, `SNAPSHOT`, `FILTER`,
//!   `OPEN`, `CLOSE`, `STATE`, `STREAM`, `STOP`.
//! - Sends market events to clients via UDP.
//! - Multi-threaded and safe with `Arc` and `Mutex` where necessary.
//! - Logging support with configurable log levels.
//!
//! ## Command-line Options
//! - `--tcp-addr` / `-t`: TCP listen address (default `127.0.0.1:33333`).
//! - `--config` / `-c`: Optional path to a `SYMBOL PRICE` seed file.
//! - `--log-level` / `-l`: Log level (`error`, `warn`, `info`, `debug`, `trace`).
//! - `--closed`: Leave the market closed at startup (default is to open it).

use market_data_server::errors::CliError;
use market_data_server::market_engine::MarketDataEngine;
use market_data_server::simulator::PriceSimulator;
use market_data_server::tcp_server::TcpServer;
use std::sync::Arc;
use structopt::StructOpt;

/// Command-line options for the Market Data Server
#[derive(Debug, StructOpt)]
#[structopt(
    name = "market_data_server",
    about = "TCP server distributing near-real-time security quotes"
)]
struct Opt {
    /// TCP listen address, e.g., 127.0.0.1:33333
    #[structopt(short, long, default_value = "127.0.0.1:33333")]
    tcp_addr: String,

    /// Path to a seed file with one `SYMBOL PRICE` pair per line.
    /// Uses the built-in default seed table when omitted.
    #[structopt(short, long)]
    config: Option<String>,

    /// Log level: error, warn, info, debug, trace
    #[structopt(short, long, default_value = "info")]
    log_level: String,

    /// Leave the market closed at startup instead of opening it
    #[structopt(long)]
    closed: bool,
}

/// Initializes the logger using env_logger with the given level
fn init_logger(level: &str) -> Result<(), CliError> {
    let mut builder = env_logger::Builder::new();

    let log_level = match level.to_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };

    builder.filter_level(log_level);
    builder.format_timestamp_micros();
    builder.format_module_path(false);
    builder.format_target(false);
    builder.init();

    Ok(())
}

fn main() -> Result<(), CliError> {
    // Parse CLI arguments
    let opt = Opt::from_args();

    // Initialize logger
    init_logger(&opt.log_level)?;

    log::info!("Starting Market Data Server");
    log::debug!("Command line options: {:?}", opt);

    // Build the price feed and the engine (one instance, shared by all
    // connections through the TCP layer)
    let feed = Arc::new(PriceSimulator::default());

    let engine = match &opt.config {
        Some(path) => {
            log::info!("Loading seed configuration from: {}", path);
            MarketDataEngine::from_config(path, feed)?
        }
        None => {
            log::info!("Using built-in default seed table");
            MarketDataEngine::with_default_seed(feed)
        }
    };
    let engine = Arc::new(engine);

    if opt.closed {
        log::info!("Market left closed at startup (--closed)");
    } else {
        log::info!("Opening market");
        engine.open()?;
    }

    // Start TCP server
    let tcp_server = TcpServer::new(&opt.tcp_addr, engine.clone())
        .map_err(|e| CliError::GeneralError(format!("{:?}", e)))?;

    log::info!("TCP server initialized. Waiting for client connections...");

    // Run server (blocking call)
    log::info!("Entering main server loop");
    tcp_server
        .start()
        .map_err(|e| CliError::GeneralError(format!("{:?}", e)))?;

    log::info!("Server shutdown complete");
    Ok(())
}
