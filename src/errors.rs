use thiserror::Error;

/// Errors raised by the [`QuoteStore`](crate::quote_store::QuoteStore).
///
/// The store itself is infallible for well-formed requests; these errors
/// cover seed-data problems and lock poisoning.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Seed configuration file is missing, unreadable, or contains a
    /// malformed `SYMBOL PRICE` line.
    #[error("Invalid quote seed config: {0}")]
    InvalidSeed(String),

    /// A reader or writer panicked while holding the quote map lock.
    #[error("Quote store lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Errors raised by a [`MarketFeed`](crate::feed::MarketFeed) implementation.
#[derive(Error, Debug)]
pub enum FeedError {
    /// The upstream source could not be reached or returned garbage.
    ///
    /// Snapshot queries propagate this to the caller; the background
    /// tick loop logs it and retries on the next interval.
    #[error("Feed unavailable: {0}")]
    Unavailable(String),

    /// Feed construction was given an out-of-range tuning parameter.
    #[error("Invalid feed parameter {name}: {value}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// Errors related to individual event listeners.
///
/// These usually originate from callback failures when attempting to
/// deliver events (e.g. a broken UDP socket) or from worker startup.
#[derive(Error, Debug)]
pub enum ListenerError {
    /// Listener callback returned an error while handling an event.
    #[error("Callback returned an error: {0}")]
    CallbackFailed(String),

    /// Failure initializing a listener worker.
    #[error("Failed to initialize listener worker: {0}")]
    InitializationError(String),
}

/// Errors returned from the [`MarketDataEngine`](crate::market_engine::MarketDataEngine).
#[derive(Error, Debug)]
pub enum EngineError {
    /// Critical failure while building the engine or seeding its store.
    #[error("Failed to initialize market data engine: {0}")]
    InitializationError(String),

    /// The quote store could not be read or written.
    #[error("Quote store error: {0}")]
    Store(#[from] StoreError),

    /// The feed adapter failed a snapshot request.
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// A market-state or filter lock was poisoned by a panicking thread.
    #[error("Engine state lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Errors produced by the TCP server subsystem.
///
/// These include I/O errors, protocol violations, and errors propagated
/// from the underlying [`MarketDataEngine`](crate::market_engine::MarketDataEngine).
#[derive(Error, Debug)]
pub enum TcpServerError {
    /// The TCP listener failed to bind to the specified address/port.
    #[error("Failed to bind TCP listener: {0}")]
    BindError(String),

    /// Error while accepting an incoming TCP client connection.
    #[error("Failed to accept TCP connection: {0}")]
    AcceptError(String),

    /// I/O error during communication with a specific client.
    #[error("Client IO error: {0}")]
    ClientIoError(String),

    /// The server received an invalid command or malformed input.
    #[error("Invalid command received: {0}")]
    InvalidCommand(String),

    /// An engine error bubbled up into the TCP layer.
    #[error("Market data engine error: {0}")]
    EngineError(#[from] EngineError),
}

/// High-level errors returned by the server and client binaries.
///
/// Used at the application entry point for formatting user-facing
/// error messages and wrapping lower-level failures.
#[derive(Error, Debug)]
pub enum CliError {
    /// General wrapper around any textual failure.
    #[error("Cli failed with error: {0}")]
    GeneralError(String),
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        CliError::GeneralError(err.to_string())
    }
}
