use crate::errors::StoreError;
use crate::quote::Quote;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::RwLock;

/// Result of a snapshot query against the store.
///
/// Lookups are best-effort per id: quotes that exist are returned, ids
/// that are well-formed but not present are listed in `unresolved` so the
/// caller can report them without failing the whole batch.
#[derive(Clone, Debug, Default)]
pub struct QuoteSnapshot {
    /// The quotes found, in request order (store order for a full snapshot).
    pub quotes: Vec<Quote>,
    /// Requested ids with no quote in the store.
    pub unresolved: Vec<String>,
}

/// The authoritative mapping from security id to current quote.
///
/// The store is populated once at construction (seed file, built-in seed
/// table, or an initial feed fetch) and mutated thereafter only by the
/// engine's update cycle, which overwrites values per key. Reads never
/// block other reads; the single writer path takes the write lock per
/// upsert.
#[derive(Debug, Default)]
pub struct QuoteStore {
    quotes: RwLock<HashMap<String, Quote>>,
}

impl QuoteStore {
    /// Creates a store seeded with the given quotes, keyed by security id.
    pub fn with_seed(seed: Vec<Quote>) -> Self {
        let quotes = seed
            .into_iter()
            .map(|q| (q.security_id.clone(), q))
            .collect();
        Self {
            quotes: RwLock::new(quotes),
        }
    }

    /// Creates a store from a seed configuration file.
    ///
    /// Each non-empty line holds a symbol and a starting price separated
    /// by whitespace, e.g. `AAPL 109.73`. Symbols are upper-cased.
    pub fn from_config<P: AsRef<std::path::Path>>(path: P) -> Result<Self, StoreError> {
        log::info!("Loading quote seed data from: {:?}", path.as_ref());
        let file = File::open(&path).map_err(|e| StoreError::InvalidSeed(e.to_string()))?;
        let reader = BufReader::new(file);

        let mut seed = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(|e| StoreError::InvalidSeed(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.split_whitespace();
            let symbol = parts
                .next()
                .ok_or_else(|| StoreError::InvalidSeed(format!("Missing symbol: '{}'", line)))?
                .to_uppercase();
            let price: f64 = parts
                .next()
                .ok_or_else(|| StoreError::InvalidSeed(format!("Missing price: '{}'", line)))?
                .parse()
                .map_err(|_| StoreError::InvalidSeed(format!("Bad price: '{}'", line)))?;

            if price <= 0.0 {
                return Err(StoreError::InvalidSeed(format!(
                    "Price must be positive: '{}'",
                    line
                )));
            }

            seed.push(Quote::new(&symbol, price));
        }

        log::info!("Loaded {} seed quotes from configuration", seed.len());
        Ok(Self::with_seed(seed))
    }

    /// Creates a store populated with the built-in default seed table.
    pub fn with_default_seed() -> Self {
        let seed = default_seed();
        log::info!("Seeding quote store with {} default quotes", seed.len());
        Self::with_seed(seed)
    }

    /// Returns the requested quotes, or every quote if `ids` is empty.
    ///
    /// Ids must already be normalized (uppercase). Missing ids do not fail
    /// the batch; they are reported in [`QuoteSnapshot::unresolved`].
    pub fn get(&self, ids: &[String]) -> Result<QuoteSnapshot, StoreError> {
        let quotes = self
            .quotes
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;

        if ids.is_empty() {
            return Ok(QuoteSnapshot {
                quotes: quotes.values().cloned().collect(),
                unresolved: Vec::new(),
            });
        }

        let mut snapshot = QuoteSnapshot::default();
        for id in ids {
            match quotes.get(id) {
                Some(quote) => snapshot.quotes.push(quote.clone()),
                None => snapshot.unresolved.push(id.clone()),
            }
        }
        Ok(snapshot)
    }

    /// Replaces the quote stored under its security id, inserting if absent.
    pub fn upsert(&self, quote: Quote) -> Result<(), StoreError> {
        let mut quotes = self
            .quotes
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        quotes.insert(quote.security_id.clone(), quote);
        Ok(())
    }

    /// Consistent point-in-time copy of all current quotes.
    pub fn snapshot_all(&self) -> Result<Vec<Quote>, StoreError> {
        let quotes = self
            .quotes
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        Ok(quotes.values().cloned().collect())
    }

    /// Number of securities currently in the store.
    pub fn len(&self) -> usize {
        self.quotes.read().map(|q| q.len()).unwrap_or(0)
    }

    /// True when the store holds no quotes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The default seed table, carried over from the legacy service.
pub fn default_seed() -> Vec<Quote> {
    vec![
        Quote::new("KRX", 75.86),
        Quote::new("FB", 77.83),
        Quote::new("TWTR", 37.10),
        Quote::new("AMZN", 307.32),
        Quote::new("EBAY", 55.77),
        Quote::new("NFLX", 334.48),
        Quote::new("CI", 101.73),
        Quote::new("AET", 87.30),
        Quote::new("HUM", 143.60),
        Quote::new("UNH", 98.76),
        Quote::new("JPM", 60.04),
        Quote::new("FNMA", 2.24),
        Quote::new("MS", 36.25),
        Quote::new("WFC", 53.70),
        Quote::new("NKE", 96.17),
        Quote::new("BMW", 87.99),
        Quote::new("GM", 31.57),
        Quote::new("MSFT", 46.95),
        Quote::new("AAPL", 109.73),
        Quote::new("GOOG", 518.66),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_config_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "AAPL 109.73\ngoog 518.66\n\nMSFT 46.95").unwrap();

        let store = QuoteStore::from_config(file.path()).unwrap();
        assert_eq!(store.len(), 3);

        let snapshot = store.get(&["GOOG".to_string()]).unwrap();
        assert_eq!(snapshot.quotes[0].price, 518.66);
    }

    #[test]
    fn test_from_config_rejects_bad_price() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "AAPL banana").unwrap();

        match QuoteStore::from_config(file.path()) {
            Err(StoreError::InvalidSeed(_)) => {}
            other => panic!("Expected InvalidSeed, got {:?}", other),
        }
    }

    #[test]
    fn test_from_config_rejects_nonpositive_price() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "AAPL -1.00").unwrap();
        assert!(QuoteStore::from_config(file.path()).is_err());
    }

    #[test]
    fn test_from_config_missing_file() {
        let store = QuoteStore::from_config("nonexistent_seed_file.txt");
        assert!(matches!(store, Err(StoreError::InvalidSeed(_))));
    }

    #[test]
    fn test_get_empty_ids_returns_all() {
        let store = QuoteStore::with_default_seed();
        let snapshot = store.get(&[]).unwrap();
        assert_eq!(snapshot.quotes.len(), 20);
        assert!(snapshot.unresolved.is_empty());
        assert!(snapshot.quotes.iter().all(|q| q.price > 0.0));
    }

    #[test]
    fn test_get_partial_results_with_unresolved() {
        let store = QuoteStore::with_seed(vec![Quote::new("AAPL", 109.73)]);
        let snapshot = store
            .get(&["AAPL".to_string(), "ZZZ".to_string()])
            .unwrap();
        assert_eq!(snapshot.quotes.len(), 1);
        assert_eq!(snapshot.quotes[0].security_id, "AAPL");
        assert_eq!(snapshot.unresolved, vec!["ZZZ".to_string()]);
    }

    #[test]
    fn test_upsert_replaces_and_inserts() {
        let store = QuoteStore::with_seed(vec![Quote::new("AAPL", 109.73)]);

        store.upsert(Quote::new("AAPL", 110.00)).unwrap();
        store.upsert(Quote::new("TSLA", 700.00)).unwrap();

        let snapshot = store.get(&["AAPL".to_string(), "TSLA".to_string()]).unwrap();
        assert_eq!(snapshot.quotes[0].price, 110.00);
        assert_eq!(snapshot.quotes[1].price, 700.00);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = QuoteStore::with_seed(vec![Quote::new("GM", 31.57)]);
        let mut snapshot = store.snapshot_all().unwrap();
        snapshot[0].price = 0.0;

        let fresh = store.snapshot_all().unwrap();
        assert_eq!(fresh[0].price, 31.57);
    }

    #[test]
    fn test_default_seed_prices() {
        let store = QuoteStore::with_default_seed();
        let snapshot = store
            .get(&["AAPL".to_string(), "MSFT".to_string()])
            .unwrap();
        assert_eq!(snapshot.quotes[0].price, 109.73);
        assert_eq!(snapshot.quotes[1].price, 46.95);
    }
}
