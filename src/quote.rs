use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

/// Represents the current price record for one security.
///
/// A `Quote` contains the normalized security id, the last price, and the
/// timestamp of the last update. Quotes sourced from an external feed may
/// additionally carry the session low and previous close; the built-in
/// simulator leaves those unset.
///
/// Quotes handed out by the server are copies: callers never receive a
/// mutable alias into the store.
#[derive(Clone, Debug, PartialEq)]
pub struct Quote {
    /// Normalized security id (1-5 uppercase letters, e.g. `"AAPL"`).
    pub security_id: String,

    /// Last price, rounded to cents and always greater than zero.
    pub price: f64,

    /// Session low, when the sourcing feed provides one.
    pub low: Option<f64>,

    /// Previous close, when the sourcing feed provides one.
    pub close: Option<f64>,

    /// Timestamp of the last update, in **milliseconds** since the UNIX epoch.
    pub timestamp: u64,
}

impl Quote {
    /// Creates a quote for `security_id` at the given price, stamped with
    /// the current system time.
    ///
    /// # Examples
    ///
    /// ```
    /// use market_data_server::quote::Quote;
    /// let quote = Quote::new("AAPL", 109.73);
    /// assert_eq!(quote.security_id, "AAPL");
    /// assert_eq!(quote.price, 109.73);
    /// ```
    pub fn new(security_id: &str, price: f64) -> Self {
        Quote {
            security_id: security_id.to_string(),
            price,
            low: None,
            close: None,
            timestamp: now_millis(),
        }
    }

    /// Returns a copy of this quote with a new price and a fresh timestamp.
    ///
    /// Used by feed adapters to produce candidate updates without mutating
    /// the stored value in place.
    pub fn with_price(&self, price: f64) -> Self {
        Quote {
            security_id: self.security_id.clone(),
            price,
            low: self.low,
            close: self.close,
            timestamp: now_millis(),
        }
    }

    /// Serializes the quote into a JSON value for transport payloads.
    ///
    /// `low` and `close` are emitted as `null` when absent.
    ///
    /// # Example
    ///
    /// ```
    /// use market_data_server::quote::Quote;
    /// let q = Quote::new("AAPL", 109.73);
    /// let v = q.to_json();
    /// assert_eq!(v["securityId"], "AAPL");
    /// assert_eq!(v["price"], 109.73);
    /// ```
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "securityId": self.security_id,
            "price": self.price,
            "low": self.low,
            "close": self.close,
            "timestamp": self.timestamp,
        })
    }
}

/// Rounds a price or price delta to cents.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Milliseconds since the UNIX epoch, saturating to zero if the clock
/// reads before 1970.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_id_price_and_timestamp() {
        let q = Quote::new("MSFT", 46.95);
        assert_eq!(q.security_id, "MSFT");
        assert_eq!(q.price, 46.95);
        assert!(q.low.is_none());
        assert!(q.close.is_none());
        assert!(q.timestamp > 0);
    }

    #[test]
    fn test_with_price_keeps_id_and_secondary_fields() {
        let mut q = Quote::new("NFLX", 334.48);
        q.low = Some(330.00);
        q.close = Some(333.10);

        let updated = q.with_price(335.00);
        assert_eq!(updated.security_id, "NFLX");
        assert_eq!(updated.price, 335.00);
        assert_eq!(updated.low, Some(330.00));
        assert_eq!(updated.close, Some(333.10));
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(109.736), 109.74);
        assert_eq!(round_cents(109.734), 109.73);
        assert_eq!(round_cents(0.004), 0.0);
        assert_eq!(round_cents(-0.27), -0.27);
    }

    #[test]
    fn test_to_json_includes_optional_fields() {
        let mut q = Quote::new("JPM", 60.04);
        q.close = Some(59.80);
        let v = q.to_json();
        assert_eq!(v["securityId"], "JPM");
        assert_eq!(v["close"], 59.80);
        assert!(v["low"].is_null());
    }
}
