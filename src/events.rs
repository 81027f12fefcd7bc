use crate::quote::Quote;

use std::fmt;

/// Whether the market is currently accepting price updates.
///
/// The engine starts `Closed`. Transitions are idempotent: opening an
/// already-open market (or closing a closed one) is a no-op that emits
/// no event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarketState {
    /// The update timer is running and quote changes are being published.
    Open,
    /// The update timer is stopped; quotes are frozen at their last values.
    Closed,
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketState::Open => write!(f, "Open"),
            MarketState::Closed => write!(f, "Closed"),
        }
    }
}

/// An event published by the engine to all subscribed listeners.
#[derive(Clone, Debug)]
pub enum MarketEvent {
    /// A quote passed the active subscription filter after a price change.
    QuoteChanged(Quote),
    /// The market transitioned between open and closed.
    MarketStateChanged(MarketState),
}

impl MarketEvent {
    /// Serializes the event into a JSON value for transport payloads.
    ///
    /// Quote changes become `{"event": "quoteChanged", "quote": {...}}`;
    /// state changes become `{"event": "marketOpened"}` or
    /// `{"event": "marketClosed"}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MarketEvent::QuoteChanged(quote) => serde_json::json!({
                "event": "quoteChanged",
                "quote": quote.to_json(),
            }),
            MarketEvent::MarketStateChanged(MarketState::Open) => serde_json::json!({
                "event": "marketOpened",
            }),
            MarketEvent::MarketStateChanged(MarketState::Closed) => serde_json::json!({
                "event": "marketClosed",
            }),
        }
    }
}
