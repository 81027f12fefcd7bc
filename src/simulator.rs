use crate::defs::{MIN_PRICE, RANGE_PERCENT, UPDATE_DIRECTION_BIAS, UPDATE_PROBABILITY};
use crate::errors::FeedError;
use crate::feed::MarketFeed;
use crate::quote::{round_cents, Quote};

use rand::Rng;

/// A randomized walk over quote prices, the default [`MarketFeed`].
///
/// On each poll the simulator decides whether the quote moves at all
/// (a coin weighted by `update_probability`), then draws a magnitude in
/// `[0, range_percent)` of the current price and a direction. The delta
/// is rounded to cents and the resulting price clamped at a small
/// positive floor.
///
/// Direction selection keeps the legacy threshold of
/// [`UPDATE_DIRECTION_BIAS`](crate::defs::UPDATE_DIRECTION_BIAS): draws
/// must exceed 0.51 for an upward move, so prices drift down slightly
/// over time.
///
/// All draws come from the calling thread's RNG, so the simulator itself
/// is stateless and freely shared between the timer thread and tests.
#[derive(Debug)]
pub struct PriceSimulator {
    /// Chance in `(0, 1]` that a quote is updated on a given poll.
    update_probability: f64,
    /// Upper bound in `(0, 1]` on the relative size of one move.
    range_percent: f64,
}

impl PriceSimulator {
    /// Creates a simulator with explicit tuning parameters.
    ///
    /// # Errors
    /// Returns [`FeedError::InvalidParameter`] if either parameter is
    /// outside `(0, 1]`.
    pub fn new(update_probability: f64, range_percent: f64) -> Result<Self, FeedError> {
        if update_probability <= 0.0 || update_probability > 1.0 {
            return Err(FeedError::InvalidParameter {
                name: "update_probability",
                value: update_probability,
            });
        }
        if range_percent <= 0.0 || range_percent > 1.0 {
            return Err(FeedError::InvalidParameter {
                name: "range_percent",
                value: range_percent,
            });
        }
        Ok(Self {
            update_probability,
            range_percent,
        })
    }
}

impl Default for PriceSimulator {
    /// The production tuning: 10% update chance, moves up to 0.2%.
    fn default() -> Self {
        Self {
            update_probability: UPDATE_PROBABILITY,
            range_percent: RANGE_PERCENT,
        }
    }
}

impl MarketFeed for PriceSimulator {
    fn poll(&self, current: &Quote) -> Result<Option<Quote>, FeedError> {
        let mut rng = rand::thread_rng();

        if rng.gen::<f64>() > self.update_probability {
            return Ok(None);
        }

        let percent_change = rng.gen::<f64>() * self.range_percent;
        let is_positive = rng.gen::<f64>() > UPDATE_DIRECTION_BIAS;

        let mut change = round_cents(current.price * percent_change);
        if !is_positive {
            change = -change;
        }

        let new_price = round_cents(current.price + change).max(MIN_PRICE);
        Ok(Some(current.with_price(new_price)))
    }

    /// Seeds the requested symbols at randomized starting prices in
    /// `[1, 1000)`, rounded to cents.
    fn fetch_snapshot(&self, security_ids: &[String]) -> Result<Vec<Quote>, FeedError> {
        let mut rng = rand::thread_rng();
        Ok(security_ids
            .iter()
            .map(|id| Quote::new(id, round_cents(1.0 + rng.gen::<f64>() * 999.0)))
            .collect())
    }
}
