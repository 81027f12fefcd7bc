use crate::errors::FeedError;
use crate::quote::Quote;

/// Source of price changes for the engine's update cycle.
///
/// Two capabilities make up the seam between the engine and whatever
/// produces prices:
///
/// - [`poll`](MarketFeed::poll) yields a candidate update for a single
///   quote on each tick. `Ok(None)` means the quote did not move.
/// - [`fetch_snapshot`](MarketFeed::fetch_snapshot) performs a bulk fetch
///   for a set of symbols, used to seed the store at startup.
///
/// The default implementation is the randomized
/// [`PriceSimulator`](crate::simulator::PriceSimulator); an adapter for an
/// external polled feed plugs in here and fails with
/// [`FeedError::Unavailable`] on transport errors. Snapshot queries
/// propagate that failure to the caller, while the background tick loop
/// logs it and retries on the next interval.
///
/// Implementations are shared across the timer thread and API callers, so
/// they must be `Send + Sync` and keep any internal state behind their own
/// synchronization.
pub trait MarketFeed: Send + Sync {
    /// Produces a candidate price change for one quote.
    ///
    /// Returns `Ok(Some(updated))` when the feed reports a change the
    /// engine should apply and publish, `Ok(None)` when the quote is
    /// unchanged this tick.
    fn poll(&self, current: &Quote) -> Result<Option<Quote>, FeedError>;

    /// Fetches a full snapshot for the given symbols.
    ///
    /// # Errors
    /// [`FeedError::Unavailable`] when the upstream source cannot be
    /// reached within a bounded time.
    fn fetch_snapshot(&self, security_ids: &[String]) -> Result<Vec<Quote>, FeedError>;
}
