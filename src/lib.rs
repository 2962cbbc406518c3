//! # Household Energy Cost Tracker SDK
//!
//! Polls the Glowmarkt smart-meter API for the latest electricity and gas
//! readings, derives daily cost figures from a user-supplied tariff, and
//! publishes eight named values for dashboards and automations.
//!
//! ## Important: readings are not real-time
//!
//! Smart meter data reaches the upstream API with a 24-48 hour reporting
//! lag by design. The tracker therefore always asks for the **latest
//! available** reading rather than "today", and prefers serving a retained,
//! staleness-flagged value over a blank one when the upstream misbehaves.
//!
//! ## Usage
//!
//! ```no_run
//! use smart_meter_sdk::{Credentials, EnergyCostTracker, MeterConfig, MeterValue, TariffConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MeterConfig {
//!     credentials: Credentials {
//!         email: "home@example.com".into(),
//!         password: "secret".into(),
//!     },
//!     tariff: TariffConfig::default(),
//! };
//!
//! // Start the five-minute polling loop
//! let tracker = Arc::new(EnergyCostTracker::new(config)?);
//! tracker.clone().start();
//! tracker.refresh_now().await;
//!
//! // Read single values...
//! let total = tracker.get_value(MeterValue::TotalCost).await?;
//! println!("today so far: £{:.2}", total.value);
//!
//! // ...or take a consistent snapshot of all eight
//! let snapshot = tracker.snapshot().await;
//! for (value, entry) in &snapshot.entries {
//!     println!("{}: {:.2} (stale: {})", value.name(), entry.value, entry.stale);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! interval tick ──▶ EnergyCostTracker (single-flight cycle)
//!                      │
//!                      ├─▶ AuthSession::token()        (one exchange per validity window)
//!                      ├─▶ ReadingFetcher::fetch() ×2  (electricity + gas, concurrent)
//!                      ├─▶ calculator                  (pure tariff arithmetic)
//!                      └─▶ ValueRegistry::publish()    (atomic eight-value snapshot)
//!                                │
//!                                └─▶ observers: snapshot() / get_value() / subscribe()
//! ```

pub mod api;
pub mod calculator;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod glowmarkt;
pub mod metrics;
pub mod registry;
pub mod session;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use error::{ApiError, TariffError, ValueError};
pub use metrics::ApiMetrics;
pub use tracker::EnergyCostTracker;
pub use types::{
    AuthToken, ComponentHealth, Credentials, CycleOutcome, HealthStatus, MeterConfig, MeterEvent,
    MeterReading, MeterValue, ResourceKind, TariffConfig, ValueEntry, ValueSnapshot,
};
