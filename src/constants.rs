//! Constants for the energy cost tracker
//!
//! All tuning for the tracker is centralized here. The runtime
//! [`MeterConfig`](crate::types::MeterConfig) object carries only the
//! per-household credentials and tariff numbers.

/// Glowmarkt API base URL
pub const GLOWMARKT_API_BASE: &str = "https://api.glowmarkt.com/api/v0-1";

/// Application id sent with every Glowmarkt request
pub const GLOWMARKT_APPLICATION_ID: &str = "b0f1b774-a586-4f72-9edd-27ead8aa7a8d";

/// How often the coordinator refreshes readings (in seconds)
pub const REFRESH_INTERVAL_SECS: u64 = 300;

/// HTTP request timeout for upstream calls (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// In-cycle retries allowed after a transient or token-rejected failure
pub const MAX_CYCLE_RETRIES: u32 = 1;

/// Token validity assumed when the auth response carries no expiry (in seconds)
pub const DEFAULT_TOKEN_VALIDITY_SECS: i64 = 6 * 24 * 60 * 60;

/// Safety margin subtracted from the token expiry to absorb clock skew (in seconds)
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 300;

/// Trailing window scanned for the latest available daily reading (in days).
/// Smart meter data reaches the upstream API 24-48 hours late.
pub const READING_LOOKBACK_DAYS: i64 = 3;

/// Buffered events kept per observer before a slow observer starts lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// User agent for HTTP requests
pub const USER_AGENT: &str = "smart-meter-sdk/0.1.0";

/// Default electricity unit rate (GBP per kWh)
pub const DEFAULT_ELECTRICITY_RATE: f64 = 0.245;

/// Default electricity standing charge (GBP per day)
pub const DEFAULT_ELECTRICITY_STANDING_CHARGE: f64 = 0.45;

/// Default gas unit rate (GBP per kWh)
pub const DEFAULT_GAS_RATE: f64 = 0.065;

/// Default gas standing charge (GBP per day)
pub const DEFAULT_GAS_STANDING_CHARGE: f64 = 0.30;
