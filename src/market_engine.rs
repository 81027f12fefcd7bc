use crate::defs::MARKET_TICK_PERIOD_MSEC;
use crate::errors::{EngineError, ListenerError};
use crate::events::{MarketEvent, MarketState};
use crate::feed::MarketFeed;
use crate::notifier::ChangeNotifier;
use crate::quote_store::{QuoteSnapshot, QuoteStore};
use crate::security_id::{normalize_ids, SecurityIdFilter};

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Orchestrates the quote update cycle.
///
/// The engine owns the quote store, a [`MarketFeed`], the listener
/// registry, the single active subscription filter, and the market
/// open/closed state machine. While the market is open, a background
/// timer thread runs one simulation tick per
/// [`MARKET_TICK_PERIOD_MSEC`](crate::defs::MARKET_TICK_PERIOD_MSEC):
/// each stored quote is polled against the feed, accepted changes are
/// written back to the store, and changes passing the filter are
/// published to all listeners.
///
/// One engine instance is constructed at process start and handed to
/// every transport-level consumer by `Arc`; there is no ambient global.
pub struct MarketDataEngine {
    /// Authoritative quote set.
    store: QuoteStore,

    /// Source of candidate price changes.
    feed: Arc<dyn MarketFeed>,

    /// Fan-out of events to transport listeners.
    notifier: ChangeNotifier,

    /// The single active subscription filter, replaced atomically.
    filter: RwLock<SecurityIdFilter>,

    /// Open/closed state; the lock covers the transition check-and-set
    /// so two concurrent `open` calls cannot both start a timer.
    state: Mutex<MarketState>,

    /// Re-entrancy guard for the tick handler. A tick that fires while
    /// the previous one is still running is skipped, not queued.
    updating: AtomicBool,

    /// Count of ticks skipped by the re-entrancy guard.
    skipped_ticks: AtomicU64,

    /// Background timer thread, present while the market is open.
    bg_thread: Mutex<Option<JoinHandle<()>>>,

    /// Tells the timer thread to exit on market close.
    shutdown_flag: Arc<AtomicBool>,
}

impl MarketDataEngine {
    /// Creates an engine over an already-seeded store. The market starts
    /// `Closed`; call [`open`](Self::open) to start publishing updates.
    pub fn new(store: QuoteStore, feed: Arc<dyn MarketFeed>) -> Self {
        Self {
            store,
            feed,
            notifier: ChangeNotifier::new(),
            filter: RwLock::new(SecurityIdFilter::new()),
            state: Mutex::new(MarketState::Closed),
            updating: AtomicBool::new(false),
            skipped_ticks: AtomicU64::new(0),
            bg_thread: Mutex::new(None),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates an engine seeded from a `SYMBOL PRICE` config file.
    pub fn from_config<P: AsRef<std::path::Path>>(
        path: P,
        feed: Arc<dyn MarketFeed>,
    ) -> Result<Self, EngineError> {
        let store = QuoteStore::from_config(path)?;
        if store.is_empty() {
            return Err(EngineError::InitializationError(
                "Seed config contains no quotes".into(),
            ));
        }
        Ok(Self::new(store, feed))
    }

    /// Creates an engine seeded by an initial feed fetch for `ids`.
    ///
    /// Malformed ids are dropped before the fetch; the fetch failing
    /// surfaces as [`EngineError::Feed`].
    pub fn from_feed(ids: &[String], feed: Arc<dyn MarketFeed>) -> Result<Self, EngineError> {
        let ids = normalize_ids(ids);
        let seed = feed.fetch_snapshot(&ids)?;
        log::info!("Seeded {} quotes from initial feed fetch", seed.len());
        Ok(Self::new(QuoteStore::with_seed(seed), feed))
    }

    /// Creates an engine over the built-in default seed table.
    pub fn with_default_seed(feed: Arc<dyn MarketFeed>) -> Self {
        Self::new(QuoteStore::with_default_seed(), feed)
    }

    /// Opens the market: starts the update timer and publishes
    /// `MarketStateChanged(Open)`.
    ///
    /// Idempotent — opening an already-open market is a no-op that emits
    /// no event.
    pub fn open(self: &Arc<Self>) -> Result<(), EngineError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))?;

        if *state == MarketState::Open {
            log::debug!("Market already open, ignoring open request");
            return Ok(());
        }

        self.shutdown_flag.store(false, Ordering::SeqCst);
        let engine = Arc::clone(self);

        log::info!(
            "Opening market; update timer period: {}ms",
            MARKET_TICK_PERIOD_MSEC
        );

        let handle = thread::spawn(move || {
            log::info!("Market update timer started");
            while !engine.shutdown_flag.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(MARKET_TICK_PERIOD_MSEC));
                if engine.shutdown_flag.load(Ordering::SeqCst) {
                    break;
                }
                engine.tick();
            }
            log::info!("Market update timer stopped");
        });

        *self
            .bg_thread
            .lock()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))? = Some(handle);

        *state = MarketState::Open;
        self.notifier
            .publish(&MarketEvent::MarketStateChanged(MarketState::Open));
        Ok(())
    }

    /// Closes the market: stops the update timer and publishes
    /// `MarketStateChanged(Closed)`.
    ///
    /// Idempotent — closing an already-closed market is a no-op that
    /// emits no event.
    pub fn close(&self) -> Result<(), EngineError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))?;

        if *state == MarketState::Closed {
            log::debug!("Market already closed, ignoring close request");
            return Ok(());
        }

        log::info!("Closing market");
        self.shutdown_flag.store(true, Ordering::SeqCst);

        let handle = self
            .bg_thread
            .lock()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))?
            .take();
        if let Some(handle) = handle {
            handle.join().ok();
            log::debug!("Market update timer joined");
        }

        *state = MarketState::Closed;
        self.notifier
            .publish(&MarketEvent::MarketStateChanged(MarketState::Closed));
        Ok(())
    }

    /// Current market state.
    pub fn market_state(&self) -> Result<MarketState, EngineError> {
        self.state
            .lock()
            .map(|s| *s)
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))
    }

    /// Replaces the active subscription filter.
    ///
    /// Raw ids are normalized first; malformed entries are dropped
    /// silently and the accepted ids are returned to the caller. An
    /// empty accepted set installs the pass-all filter.
    pub fn set_filter(&self, raw_ids: &[String]) -> Result<Vec<String>, EngineError> {
        let accepted = normalize_ids(raw_ids);

        let mut filter = self
            .filter
            .write()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))?;
        *filter = SecurityIdFilter::from_ids(accepted.iter().cloned());

        log::info!(
            "Subscription filter replaced: {} ids accepted of {} supplied",
            filter.len(),
            raw_ids.len()
        );
        Ok(accepted)
    }

    /// Point-in-time snapshot of the requested quotes.
    ///
    /// An empty `ids` list returns every stored quote. Malformed ids are
    /// dropped; well-formed unknown ids are listed in the snapshot's
    /// `unresolved` field. Independent of subscription state.
    pub fn get_snapshot(&self, ids: &[String]) -> Result<QuoteSnapshot, EngineError> {
        let ids = normalize_ids(ids);
        Ok(self.store.get(&ids)?)
    }

    /// Number of ticks skipped so far by the re-entrancy guard.
    ///
    /// A skipped tick is not a failure; the count is exposed for
    /// observability.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks.load(Ordering::SeqCst)
    }

    /// Registers an event listener, returning its id.
    pub fn subscribe(
        &self,
        callback: impl Fn(MarketEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    ) -> u64 {
        self.notifier.subscribe(callback)
    }

    /// Removes an event listener.
    pub fn unsubscribe(&self, id: u64) {
        self.notifier.unsubscribe(id)
    }

    /// Timer callback: one pass over the store.
    ///
    /// Guarded against re-entrancy: if the previous pass is still
    /// running, this one is skipped entirely. The guard is released on
    /// completion, including when the pass fails.
    fn tick(&self) {
        if self
            .updating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.skipped_ticks.fetch_add(1, Ordering::SeqCst);
            log::debug!("Previous tick still running, skipping this interval");
            return;
        }

        if let Err(e) = self.run_tick() {
            log::error!("Tick aborted, no updates this interval: {}", e);
        }

        self.updating.store(false, Ordering::SeqCst);
    }

    /// Polls every stored quote against the feed, applying and
    /// publishing accepted changes. Per-quote failures are logged and
    /// skipped so one bad update cannot abort the pass.
    fn run_tick(&self) -> Result<(), EngineError> {
        let quotes = self.store.snapshot_all()?;
        let filter = self
            .filter
            .read()
            .map_err(|e| EngineError::LockPoisoned(e.to_string()))?
            .clone();

        log::trace!("Tick over {} quotes", quotes.len());

        for quote in quotes {
            match self.feed.poll(&quote) {
                Ok(Some(updated)) => {
                    if let Err(e) = self.store.upsert(updated.clone()) {
                        log::warn!("Failed to store update for {}: {}", updated.security_id, e);
                        continue;
                    }
                    if filter.matches(&updated.security_id) {
                        self.notifier.publish(&MarketEvent::QuoteChanged(updated));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Feed failed for {}: {}", quote.security_id, e);
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MarketDataEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketDataEngine")
            .field("store", &self.store)
            .field("notifier", &self.notifier)
            .field("state", &self.state)
            .field("updating", &self.updating)
            // exclude feed
            .finish()
    }
}

impl Drop for MarketDataEngine {
    fn drop(&mut self) {
        log::debug!("MarketDataEngine drop called, closing market");
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FeedError;
    use crate::quote::Quote;
    use std::collections::HashMap;

    /// Feed double that reports a scripted new price per security id
    /// and leaves everything else unchanged.
    struct ScriptedFeed {
        changes: Mutex<HashMap<String, f64>>,
    }

    impl ScriptedFeed {
        fn new(changes: &[(&str, f64)]) -> Self {
            Self {
                changes: Mutex::new(
                    changes
                        .iter()
                        .map(|(id, price)| (id.to_string(), *price))
                        .collect(),
                ),
            }
        }

        fn clear(&self) {
            self.changes.lock().unwrap().clear();
        }
    }

    impl MarketFeed for ScriptedFeed {
        fn poll(&self, current: &Quote) -> Result<Option<Quote>, FeedError> {
            Ok(self
                .changes
                .lock()
                .unwrap()
                .get(&current.security_id)
                .map(|price| current.with_price(*price)))
        }

        fn fetch_snapshot(&self, security_ids: &[String]) -> Result<Vec<Quote>, FeedError> {
            Ok(security_ids.iter().map(|id| Quote::new(id, 100.0)).collect())
        }
    }

    /// Feed double that fails for one id and moves another.
    struct PartiallyFailingFeed;

    impl MarketFeed for PartiallyFailingFeed {
        fn poll(&self, current: &Quote) -> Result<Option<Quote>, FeedError> {
            match current.security_id.as_str() {
                "AAPL" => Err(FeedError::Unavailable("upstream timeout".into())),
                "MSFT" => Ok(Some(current.with_price(47.00))),
                _ => Ok(None),
            }
        }

        fn fetch_snapshot(&self, _security_ids: &[String]) -> Result<Vec<Quote>, FeedError> {
            Err(FeedError::Unavailable("upstream timeout".into()))
        }
    }

    fn seeded_engine(feed: Arc<dyn MarketFeed>) -> Arc<MarketDataEngine> {
        let store = QuoteStore::with_seed(vec![
            Quote::new("AAPL", 109.73),
            Quote::new("MSFT", 46.95),
        ]);
        Arc::new(MarketDataEngine::new(store, feed))
    }

    /// Captures published events; `drain` unsubscribes (flushing the
    /// listener queue) and returns everything received.
    struct EventCapture {
        engine: Arc<MarketDataEngine>,
        listener_id: u64,
        events: Arc<Mutex<Vec<MarketEvent>>>,
    }

    impl EventCapture {
        fn attach(engine: &Arc<MarketDataEngine>) -> Self {
            let events = Arc::new(Mutex::new(Vec::new()));
            let events_clone = events.clone();
            let listener_id = engine.subscribe(move |event| {
                events_clone.lock().unwrap().push(event);
                Ok(())
            });
            Self {
                engine: engine.clone(),
                listener_id,
                events,
            }
        }

        fn drain(self) -> Vec<MarketEvent> {
            self.engine.unsubscribe(self.listener_id);
            let events = self.events.lock().unwrap();
            events.clone()
        }
    }

    fn quote_changes(events: &[MarketEvent]) -> Vec<(String, f64)> {
        events
            .iter()
            .filter_map(|e| match e {
                MarketEvent::QuoteChanged(q) => Some((q.security_id.clone(), q.price)),
                _ => None,
            })
            .collect()
    }

    fn state_changes(events: &[MarketEvent]) -> Vec<MarketState> {
        events
            .iter()
            .filter_map(|e| match e {
                MarketEvent::MarketStateChanged(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_open_is_idempotent() {
        let engine = seeded_engine(Arc::new(ScriptedFeed::new(&[])));
        let capture = EventCapture::attach(&engine);

        engine.open().unwrap();
        engine.open().unwrap();
        assert_eq!(engine.market_state().unwrap(), MarketState::Open);
        engine.close().unwrap();

        let events = capture.drain();
        assert_eq!(
            state_changes(&events),
            vec![MarketState::Open, MarketState::Closed]
        );
    }

    #[test]
    fn test_close_when_closed_emits_nothing() {
        let engine = seeded_engine(Arc::new(ScriptedFeed::new(&[])));
        let capture = EventCapture::attach(&engine);

        engine.close().unwrap();
        engine.close().unwrap();
        assert_eq!(engine.market_state().unwrap(), MarketState::Closed);

        assert!(capture.drain().is_empty());
    }

    #[test]
    fn test_tick_applies_change_and_publishes() {
        let feed = Arc::new(ScriptedFeed::new(&[("AAPL", 110.00)]));
        let engine = seeded_engine(feed.clone());
        let capture = EventCapture::attach(&engine);

        engine.open().unwrap();
        engine.tick();
        feed.clear();
        engine.close().unwrap();

        let snapshot = engine.get_snapshot(&[]).unwrap();
        let prices: HashMap<String, f64> = snapshot
            .quotes
            .iter()
            .map(|q| (q.security_id.clone(), q.price))
            .collect();
        assert_eq!(prices["AAPL"], 110.00);
        assert_eq!(prices["MSFT"], 46.95);

        let events = capture.drain();
        assert_eq!(
            quote_changes(&events),
            vec![("AAPL".to_string(), 110.00)]
        );
    }

    #[test]
    fn test_reentrant_tick_is_skipped() {
        let engine = seeded_engine(Arc::new(ScriptedFeed::new(&[("AAPL", 110.00)])));
        let capture = EventCapture::attach(&engine);

        // Simulate a tick still in flight.
        engine.updating.store(true, Ordering::SeqCst);
        engine.tick();

        let snapshot = engine.get_snapshot(&["AAPL".to_string()]).unwrap();
        assert_eq!(snapshot.quotes[0].price, 109.73);
        assert_eq!(engine.skipped_ticks(), 1);
        assert!(capture.drain().is_empty());

        // Guard released, the next tick proceeds.
        engine.updating.store(false, Ordering::SeqCst);
        let capture = EventCapture::attach(&engine);
        engine.tick();
        let events = capture.drain();
        assert_eq!(quote_changes(&events), vec![("AAPL".to_string(), 110.00)]);
    }

    #[test]
    fn test_filter_gates_events_but_not_store_updates() {
        let engine = seeded_engine(Arc::new(ScriptedFeed::new(&[
            ("AAPL", 110.00),
            ("MSFT", 47.00),
        ])));

        let accepted = engine.set_filter(&["AAPL".to_string()]).unwrap();
        assert_eq!(accepted, vec!["AAPL".to_string()]);

        let capture = EventCapture::attach(&engine);
        engine.tick();
        let events = capture.drain();
        assert_eq!(quote_changes(&events), vec![("AAPL".to_string(), 110.00)]);

        // MSFT was still updated in the store, just not published.
        let snapshot = engine.get_snapshot(&["MSFT".to_string()]).unwrap();
        assert_eq!(snapshot.quotes[0].price, 47.00);
    }

    #[test]
    fn test_rejected_filter_leaves_pass_all_active() {
        let engine = seeded_engine(Arc::new(ScriptedFeed::new(&[("MSFT", 47.00)])));

        let accepted = engine.set_filter(&["ZZZZZZ".to_string()]).unwrap();
        assert!(accepted.is_empty());

        let capture = EventCapture::attach(&engine);
        engine.tick();
        let events = capture.drain();
        assert_eq!(quote_changes(&events), vec![("MSFT".to_string(), 47.00)]);
    }

    #[test]
    fn test_filter_replacement_discards_previous() {
        let engine = seeded_engine(Arc::new(ScriptedFeed::new(&[
            ("AAPL", 110.00),
            ("MSFT", 47.00),
        ])));

        engine.set_filter(&["AAPL".to_string()]).unwrap();
        engine.set_filter(&["MSFT".to_string()]).unwrap();

        let capture = EventCapture::attach(&engine);
        engine.tick();
        let events = capture.drain();
        assert_eq!(quote_changes(&events), vec![("MSFT".to_string(), 47.00)]);
    }

    #[test]
    fn test_snapshot_normalizes_and_reports_unresolved() {
        let engine = seeded_engine(Arc::new(ScriptedFeed::new(&[])));

        let snapshot = engine
            .get_snapshot(&[
                " aapl ".to_string(),
                "TSLA".to_string(),
                "not-a-symbol!".to_string(),
            ])
            .unwrap();

        assert_eq!(snapshot.quotes.len(), 1);
        assert_eq!(snapshot.quotes[0].security_id, "AAPL");
        assert_eq!(snapshot.unresolved, vec!["TSLA".to_string()]);
    }

    #[test]
    fn test_snapshot_empty_ids_returns_all_with_positive_prices() {
        let engine = seeded_engine(Arc::new(ScriptedFeed::new(&[])));
        let snapshot = engine.get_snapshot(&[]).unwrap();
        assert_eq!(snapshot.quotes.len(), 2);
        assert!(snapshot.quotes.iter().all(|q| q.price > 0.0));
    }

    #[test]
    fn test_per_quote_feed_failure_is_isolated() {
        let engine = seeded_engine(Arc::new(PartiallyFailingFeed));
        let capture = EventCapture::attach(&engine);

        engine.tick();

        let events = capture.drain();
        assert_eq!(quote_changes(&events), vec![("MSFT".to_string(), 47.00)]);

        let snapshot = engine.get_snapshot(&["AAPL".to_string()]).unwrap();
        assert_eq!(snapshot.quotes[0].price, 109.73);
    }

    #[test]
    fn test_from_feed_seeds_store() {
        let feed = Arc::new(ScriptedFeed::new(&[]));
        let engine = MarketDataEngine::from_feed(
            &["aapl".to_string(), "BAD1".to_string(), "GOOG".to_string()],
            feed,
        )
        .unwrap();

        let snapshot = engine.get_snapshot(&[]).unwrap();
        let mut ids: Vec<_> = snapshot
            .quotes
            .iter()
            .map(|q| q.security_id.clone())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["AAPL".to_string(), "GOOG".to_string()]);
    }

    #[test]
    fn test_from_feed_propagates_unavailable() {
        let result = MarketDataEngine::from_feed(
            &["AAPL".to_string()],
            Arc::new(PartiallyFailingFeed),
        );
        assert!(matches!(result, Err(EngineError::Feed(_))));
    }
}
