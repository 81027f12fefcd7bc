/// Period of the market update timer in milliseconds.
///
/// While the market is open, the engine runs one simulation tick
/// per period: every quote gets a chance to move, and accepted
/// changes are published to subscribed listeners.
pub const MARKET_TICK_PERIOD_MSEC: u64 = 250;

/// Probability that a given quote is updated on a given tick.
///
/// Each tick draws a uniform value in `[0, 1)` per quote and only
/// updates the price when the draw falls at or below this threshold.
/// This throttles churn so not every quote moves every tick.
pub const UPDATE_PROBABILITY: f64 = 0.1;

/// Maximum relative price move per update.
///
/// The magnitude of a single change is a uniform draw in
/// `[0, RANGE_PERCENT)` of the current price (0 to 0.2%).
pub const RANGE_PERCENT: f64 = 0.002;

/// Direction threshold for a price move.
///
/// A uniform draw in `[0, 1)` strictly above this value produces an
/// upward move, anything else a downward move. Carried over from the
/// legacy simulator; intentionally not 0.5, so downward moves have a
/// slight edge.
pub const UPDATE_DIRECTION_BIAS: f64 = 0.51;

/// Smallest price a simulated update may produce.
///
/// Moves of a fraction of a percent cannot drive a price to zero in
/// practice, but updates clamp here anyway so a quote can never
/// become free or negative.
pub const MIN_PRICE: f64 = 0.01;

/// Maximum length of a security id after trimming.
pub const MAX_SECURITY_ID_LEN: usize = 5;

/// Maximum allowed time (in seconds) between PING messages from a client.
///
/// If no input is received from the TCP connection within this interval,
/// the server assumes the client is dead and removes its subscription.
pub const CLIENT_KEEP_ALIVE_SEC: u64 = 5;

/// Polling interval (in milliseconds) used by the TCP connection handler
/// when waiting for data or performing keep-alive checks.
///
/// Reducing this value makes the server more responsive but increases CPU usage.
pub const TCP_CONNECTION_TICK_PERIOD_MSEC: u64 = 200;
