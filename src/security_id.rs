use crate::defs::MAX_SECURITY_ID_LEN;

use std::collections::HashSet;

/// Normalizes a batch of raw, subscriber-supplied security ids.
///
/// For each input the function trims surrounding whitespace and keeps it
/// only if the remainder is 1 to 5 alphabetic characters. Survivors are
/// upper-cased so comparisons downstream are case-insensitive. Invalid
/// entries are dropped silently rather than reported; subscription and
/// snapshot requests are best-effort over whatever ids are usable.
///
/// Input order is preserved and duplicates are kept; set-typed consumers
/// such as [`SecurityIdFilter`] deduplicate on insertion.
///
/// # Example
///
/// ```
/// use market_data_server::security_id::normalize_ids;
///
/// let accepted = normalize_ids(&[
///     " aapl ".to_string(),
///     "TOOLONG".to_string(),
///     "MS4T".to_string(),
///     "goog".to_string(),
/// ]);
/// assert_eq!(accepted, vec!["AAPL".to_string(), "GOOG".to_string()]);
/// ```
pub fn normalize_ids(raw: &[String]) -> Vec<String> {
    raw.iter()
        .filter_map(|id| {
            let trimmed = id.trim();
            if trimmed.is_empty() || trimmed.len() > MAX_SECURITY_ID_LEN {
                return None;
            }
            if !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
                return None;
            }
            Some(trimmed.to_uppercase())
        })
        .collect()
}

/// The set of security ids a consumer has restricted notifications to.
///
/// Ids are stored upper-cased, so membership checks are case-insensitive.
/// An empty filter means "no filter": every security passes. The engine
/// replaces the whole filter atomically on each `FILTER` request, so
/// readers never observe a partially-updated set.
#[derive(Clone, Debug, Default)]
pub struct SecurityIdFilter {
    ids: HashSet<String>,
}

impl SecurityIdFilter {
    /// Creates an empty (pass-all) filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a filter from already-normalized ids, deduplicating them.
    pub fn from_ids<I: IntoIterator<Item = String>>(ids: I) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// True if no ids are registered, i.e. the filter passes everything.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of distinct ids in the filter.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether a quote with this security id should be delivered.
    pub fn matches(&self, security_id: &str) -> bool {
        self.ids.is_empty() || self.ids.contains(&security_id.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accepts_valid_ids() {
        let raw = vec!["AAPL".to_string(), "msft".to_string(), " GooG ".to_string()];
        let accepted = normalize_ids(&raw);
        assert_eq!(accepted, vec!["AAPL", "MSFT", "GOOG"]);
    }

    #[test]
    fn test_normalize_rejects_malformed_ids() {
        let raw = vec![
            "".to_string(),
            "   ".to_string(),
            "TOOLONG".to_string(),
            "MS4T".to_string(),
            "A.B".to_string(),
            "ZZZZZZ".to_string(),
        ];
        assert!(normalize_ids(&raw).is_empty());
    }

    #[test]
    fn test_normalize_preserves_order_and_duplicates() {
        let raw = vec!["fb".to_string(), "FB".to_string(), "jpm".to_string()];
        let accepted = normalize_ids(&raw);
        assert_eq!(accepted, vec!["FB", "FB", "JPM"]);
    }

    #[test]
    fn test_boundary_lengths() {
        let raw = vec!["A".to_string(), "ABCDE".to_string(), "ABCDEF".to_string()];
        let accepted = normalize_ids(&raw);
        assert_eq!(accepted, vec!["A", "ABCDE"]);
    }

    #[test]
    fn test_empty_filter_passes_all() {
        let filter = SecurityIdFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches("AAPL"));
        assert!(filter.matches("anything"));
    }

    #[test]
    fn test_filter_matches_case_insensitively() {
        let filter = SecurityIdFilter::from_ids(vec!["AAPL".to_string()]);
        assert!(filter.matches("AAPL"));
        assert!(filter.matches("aapl"));
        assert!(!filter.matches("MSFT"));
    }

    #[test]
    fn test_filter_deduplicates() {
        let filter =
            SecurityIdFilter::from_ids(vec!["FB".to_string(), "FB".to_string(), "GM".to_string()]);
        assert_eq!(filter.len(), 2);
    }
}
