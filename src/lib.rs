//! # Market Data Distribution Server
//!
//! This crate implements a near-real-time security quote distribution
//! server using a **TCP control channel** and **UDP event streaming**.
//! It holds an authoritative in-memory quote set, mutates it under a
//! timer-driven update cycle while the market is open, and fans change
//! events out to subscribed listeners through a per-client security-id
//! filter.
//!
//! ## Features
//!
//! - Seed quotes from a configuration file or a built-in default table.
//! - Randomized price simulation behind a pluggable feed trait.
//! - Market open/close state machine gating the update timer.
//! - Re-entrancy-protected tick handler (overlapping ticks are skipped).
//! - Point-in-time snapshot queries with per-id partial results.
//! - Subscription filter over normalized security ids.
//! - Best-effort event fan-out with per-listener failure isolation.
//! - Thread-safe architecture using `Arc`, `Mutex`, `RwLock`, and atomics.
//!
//! ## Architecture Overview
//!
//! The crate is organized into several modules:
//!
//! - [`defs`](crate::defs) — Shared constants and timing parameters.
//! - [`errors`](crate::errors) — Error types used across modules.
//! - [`security_id`](crate::security_id) — Symbol normalization and the subscription filter.
//! - [`quote`](crate::quote) — Data model for an individual quote.
//! - [`quote_store`](crate::quote_store) — The authoritative quote map.
//! - [`feed`](crate::feed) — The price source trait.
//! - [`simulator`](crate::simulator) — Randomized walk implementing the feed trait.
//! - [`events`](crate::events) — Market state and event types.
//! - [`notifier`](crate::notifier) — Listener registry and event fan-out.
//! - [`market_engine`](crate::market_engine) — The update cycle orchestrator.
//! - [`tcp_server`](crate::tcp_server) — TCP protocol for remote clients.
//!
//! ## TCP Control Protocol
//!
//! The server accepts simple text-based commands over TCP:
//!
//! - `PING`
//!   Server responds with `PONG`.
//!
//! - `SNAPSHOT [SYMBOLS...]`
//!   Responds with a JSON object of the requested quotes (all quotes if
//!   no symbols are given) plus any unresolved ids.
//!
//! - `FILTER [SYMBOLS...]`
//!   Replaces the active subscription filter and echoes the accepted
//!   ids; malformed ids are dropped silently. `FILTER` with no symbols
//!   clears the filter (all securities pass).
//!
//! - `OPEN` / `CLOSE`
//!   Opens or closes the market. Idempotent.
//!
//! - `STATE`
//!   Responds with `STATE Open` or `STATE Closed`.
//!
//! - `STREAM host:port`
//!   Registers a listener and begins pushing JSON events to the provided
//!   UDP address.
//!
//! - `STOP`
//!   Removes the listener and stops event delivery.
//!
//! - Invalid commands result in:
//!   `ERR Invalid command`
//!
//! Each command must end with a newline (`\n`).
//!
//! ## Update Cycle
//!
//! While the market is open, a background timer runs one tick per
//! interval:
//!
//! 1. Every stored quote is polled against the configured feed.
//! 2. Accepted changes are written back to the store.
//! 3. Changes passing the active filter are published to all listeners.
//!
//! A tick that fires while the previous one is still running is skipped
//! entirely, never queued. Per-quote feed failures are logged and
//! skipped without aborting the pass.
//!
//! ## Example: Running the Server
//!
//! ```no_run
//! use std::sync::Arc;
//! use market_data_server::market_engine::MarketDataEngine;
//! use market_data_server::simulator::PriceSimulator;
//! use market_data_server::tcp_server::TcpServer;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build the engine over the default seed data
//!     let engine = Arc::new(MarketDataEngine::with_default_seed(
//!         Arc::new(PriceSimulator::default()),
//!     ));
//!
//!     // Open the market: starts the background update timer
//!     engine.open()?;
//!
//!     // Start the TCP server that manages remote clients
//!     let tcp = TcpServer::new("127.0.0.1:3333", engine.clone())?;
//!     tcp.start()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unreachable_pub)]

pub mod defs;
pub mod errors;
pub mod events;
pub mod feed;
pub mod market_engine;
pub mod notifier;
pub mod quote;
pub mod quote_store;
pub mod security_id;
pub mod simulator;
pub mod tcp_server;
