//! Household energy cost tracker service
//!
//! The polling coordinator: drives the fixed-interval refresh cycle,
//! classifies every upstream failure, and publishes the derived value
//! snapshot atomically.

use crate::{
    api::MeterApi,
    calculator,
    constants::{EVENT_CHANNEL_CAPACITY, MAX_CYCLE_RETRIES, REFRESH_INTERVAL_SECS},
    error::{ApiError, TariffError, ValueError},
    fetcher::ReadingFetcher,
    glowmarkt::GlowmarktApi,
    metrics::{ApiMetrics, MetricsCollector},
    registry::ValueRegistry,
    session::AuthSession,
    types::{
        ComponentHealth, CycleOutcome, HealthStatus, MeterConfig, MeterEvent, MeterReading,
        MeterValue, ResourceKind, TariffConfig, ValueEntry, ValueSnapshot,
    },
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

/// Cycle-internal error: everything is classified here and nothing
/// propagates past the coordinator as an unhandled fault
#[derive(Debug, Error)]
enum CycleError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("invalid tariff configuration: {0}")]
    Tariff(#[from] TariffError),
}

/// Household energy cost tracker
///
/// Polls the metering API for the latest electricity and gas readings,
/// derives the eight published cost values from the configured tariff, and
/// retains last-known-good values across transient upstream failures.
///
/// # Example
/// ```no_run
/// use smart_meter_sdk::{Credentials, EnergyCostTracker, MeterConfig, MeterValue, TariffConfig};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = MeterConfig {
///     credentials: Credentials {
///         email: "home@example.com".into(),
///         password: "secret".into(),
///     },
///     tariff: TariffConfig::default(),
/// };
/// let tracker = Arc::new(EnergyCostTracker::new(config)?);
/// tracker.clone().start();
///
/// tracker.refresh_now().await;
/// let total = tracker.get_value(MeterValue::TotalCost).await?;
/// println!("today so far: £{:.2}", total.value);
/// # Ok(())
/// # }
/// ```
pub struct EnergyCostTracker {
    session: AuthSession,
    fetcher: ReadingFetcher,
    registry: ValueRegistry,
    metrics: MetricsCollector,
    tariff: RwLock<TariffConfig>,
    /// Single-flight guard: at most one cycle is ever in flight
    cycle_lock: Mutex<()>,
    /// Latched after a credential rejection until the config is replaced
    credentials_rejected: AtomicBool,
    events: broadcast::Sender<MeterEvent>,
    api_name: &'static str,
}

impl EnergyCostTracker {
    /// Creates a tracker backed by the Glowmarkt API
    pub fn new(config: MeterConfig) -> Result<Self, ApiError> {
        Ok(Self::with_api(Arc::new(GlowmarktApi::new()?), config))
    }

    /// Creates a tracker over a custom API backend
    ///
    /// This is primarily for testing with a scripted mock.
    pub fn with_api(api: Arc<dyn MeterApi>, config: MeterConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let api_name = api.api_name();
        Self {
            api_name,
            session: AuthSession::new(api.clone(), config.credentials),
            fetcher: ReadingFetcher::new(api),
            registry: ValueRegistry::new(),
            metrics: MetricsCollector::new(api_name),
            tariff: RwLock::new(config.tariff),
            cycle_lock: Mutex::new(()),
            credentials_rejected: AtomicBool::new(false),
            events,
        }
    }

    /// Starts the background polling task and returns its handle.
    ///
    /// The first refresh runs immediately, then every
    /// [`REFRESH_INTERVAL_SECS`]. Aborting the handle abandons any in-flight
    /// cycle without touching the published snapshot, since snapshots are
    /// only ever replaced whole.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let tracker = self;
        tokio::spawn(async move {
            tracing::info!(
                refresh_interval_secs = REFRESH_INTERVAL_SECS,
                api = tracker.api_name,
                "starting energy cost tracker"
            );

            let mut interval =
                tokio::time::interval(Duration::from_secs(REFRESH_INTERVAL_SECS));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                match tracker.run_cycle().await {
                    CycleOutcome::Skipped => {
                        tracing::debug!("previous cycle still in flight, tick skipped");
                    }
                    outcome => tracing::debug!(?outcome, "cycle finished"),
                }
            }
        })
    }

    /// Runs one refresh cycle outside the normal interval.
    ///
    /// Returns [`CycleOutcome::Skipped`] when another cycle is in flight.
    pub async fn refresh_now(&self) -> CycleOutcome {
        self.run_cycle().await
    }

    async fn run_cycle(&self) -> CycleOutcome {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            return CycleOutcome::Skipped;
        };

        if self.credentials_rejected.load(Ordering::SeqCst) {
            tracing::debug!("credentials previously rejected, waiting for new configuration");
            return CycleOutcome::Failed;
        }

        let started = Instant::now();
        let tariff = *self.tariff.read().await;
        let outcome = self.execute_cycle(tariff).await;
        self.metrics
            .record_cycle(started.elapsed(), outcome == CycleOutcome::Published)
            .await;
        outcome
    }

    /// Runs cycle attempts up to the retry bound and settles the outcome
    async fn execute_cycle(&self, tariff: TariffConfig) -> CycleOutcome {
        let mut attempt: u32 = 0;
        loop {
            match self.attempt_cycle(tariff).await {
                Ok(outcome) => return outcome,
                Err(CycleError::Api(ApiError::InvalidCredentials)) => {
                    tracing::error!(
                        "credentials rejected; values unavailable until reconfigured"
                    );
                    self.credentials_rejected.store(true, Ordering::SeqCst);
                    self.registry.mark_all_unavailable().await;
                    self.emit(MeterEvent::ValuesUnavailable {
                        id: Uuid::new_v4(),
                        reason: ApiError::InvalidCredentials.to_string(),
                        timestamp: Utc::now(),
                    });
                    return CycleOutcome::Failed;
                }
                Err(CycleError::Tariff(error)) => {
                    // Retrying cannot fix a bad tariff; wait for new config
                    tracing::error!(error = %error, "derivation rejected the tariff");
                    self.registry.mark_all_stale().await;
                    self.emit(MeterEvent::CycleFailed {
                        id: Uuid::new_v4(),
                        reason: error.to_string(),
                        timestamp: Utc::now(),
                    });
                    return CycleOutcome::Failed;
                }
                Err(CycleError::Api(error)) if attempt < MAX_CYCLE_RETRIES => {
                    attempt += 1;
                    if matches!(error, ApiError::AuthRejected) {
                        tracing::warn!(attempt, "token rejected mid-cycle, forcing re-authentication");
                        self.session.invalidate().await;
                    } else {
                        tracing::warn!(attempt, error = %error, "cycle attempt failed, retrying");
                    }
                }
                Err(CycleError::Api(error)) => {
                    tracing::warn!(
                        error = %error,
                        "cycle failed after retries, retaining previous values"
                    );
                    self.registry.mark_all_stale().await;
                    self.emit(MeterEvent::CycleFailed {
                        id: Uuid::new_v4(),
                        reason: error.to_string(),
                        timestamp: Utc::now(),
                    });
                    return CycleOutcome::Failed;
                }
            }
        }
    }

    /// One pass through the cycle: authenticate, fetch both resources,
    /// derive, publish
    async fn attempt_cycle(&self, tariff: TariffConfig) -> Result<CycleOutcome, CycleError> {
        tracing::debug!("authenticating");
        let token = self.session.token().await?;

        tracing::debug!("fetching readings");
        let (electricity, gas) = futures::join!(
            self.fetcher.fetch(ResourceKind::Electricity, &token),
            self.fetcher.fetch(ResourceKind::Gas, &token),
        );
        let electricity = Self::split_not_found(electricity)?;
        let gas = Self::split_not_found(gas)?;

        tracing::debug!("deriving values");
        let (entries, total_cost) =
            Self::derive_entries(electricity.as_ref(), gas.as_ref(), &tariff)?;

        self.registry.publish(entries).await;
        self.emit(MeterEvent::ValuesPublished {
            id: Uuid::new_v4(),
            total_cost,
            timestamp: Utc::now(),
        });
        tracing::info!(
            electricity = electricity.is_some(),
            gas = gas.is_some(),
            total_cost = ?total_cost,
            "published value snapshot"
        );
        Ok(CycleOutcome::Published)
    }

    /// A missing resource is a per-resource condition: the fuel is reported
    /// unavailable and the cycle continues with the other one. Everything
    /// else fails the attempt.
    fn split_not_found(
        result: Result<MeterReading, ApiError>,
    ) -> Result<Option<MeterReading>, ApiError> {
        match result {
            Ok(reading) => Ok(Some(reading)),
            Err(ApiError::NotFound(kind)) => {
                tracing::warn!(resource = %kind, "no upstream resource linked to this account");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Builds the eight entries from the reading pair and the tariff.
    ///
    /// Costs are computed exactly and rounded once here, at the boundary;
    /// the combined cost sums the exact per-fuel figures. Returns the
    /// entries and the rounded total for the published event.
    fn derive_entries(
        electricity: Option<&MeterReading>,
        gas: Option<&MeterReading>,
        tariff: &TariffConfig,
    ) -> Result<(HashMap<MeterValue, ValueEntry>, Option<f64>), TariffError> {
        let now = Utc::now();

        let electricity_cost = electricity
            .map(|reading| {
                calculator::daily_cost(
                    reading.usage_kwh,
                    tariff.electricity_rate,
                    tariff.electricity_standing_charge,
                )
            })
            .transpose()?;
        let gas_cost = gas
            .map(|reading| {
                calculator::daily_cost(reading.usage_kwh, tariff.gas_rate, tariff.gas_standing_charge)
            })
            .transpose()?;

        let total_cost = match (electricity_cost, gas_cost) {
            (None, None) => None,
            (e, g) => Some(calculator::total_daily_cost(
                e.unwrap_or(0.0),
                g.unwrap_or(0.0),
            )?),
        };
        let standing_total = calculator::total_standing_charges(
            tariff.electricity_standing_charge,
            tariff.gas_standing_charge,
        )?;

        let mut entries = HashMap::new();

        match (electricity, electricity_cost) {
            (Some(reading), Some(cost)) => {
                entries.insert(
                    MeterValue::ElectricityUsage,
                    ValueEntry::fresh(calculator::round_usage(reading.usage_kwh), now),
                );
                entries.insert(
                    MeterValue::ElectricityCost,
                    ValueEntry::fresh(calculator::round_to_pence(cost), now),
                );
            }
            _ => {
                entries.insert(MeterValue::ElectricityUsage, ValueEntry::unavailable(now));
                entries.insert(MeterValue::ElectricityCost, ValueEntry::unavailable(now));
            }
        }

        match (gas, gas_cost) {
            (Some(reading), Some(cost)) => {
                entries.insert(
                    MeterValue::GasUsage,
                    ValueEntry::fresh(calculator::round_usage(reading.usage_kwh), now),
                );
                entries.insert(
                    MeterValue::GasCost,
                    ValueEntry::fresh(calculator::round_to_pence(cost), now),
                );
            }
            _ => {
                entries.insert(MeterValue::GasUsage, ValueEntry::unavailable(now));
                entries.insert(MeterValue::GasCost, ValueEntry::unavailable(now));
            }
        }

        match total_cost {
            Some(cost) => entries.insert(
                MeterValue::TotalCost,
                ValueEntry::fresh(calculator::round_to_pence(cost), now),
            ),
            None => entries.insert(MeterValue::TotalCost, ValueEntry::unavailable(now)),
        };

        entries.insert(
            MeterValue::ElectricityStandingCharge,
            ValueEntry::fresh(
                calculator::round_to_pence(tariff.electricity_standing_charge),
                now,
            ),
        );
        entries.insert(
            MeterValue::GasStandingCharge,
            ValueEntry::fresh(calculator::round_to_pence(tariff.gas_standing_charge), now),
        );
        entries.insert(
            MeterValue::TotalStandingCharges,
            ValueEntry::fresh(calculator::round_to_pence(standing_total), now),
        );

        Ok((entries, total_cost.map(calculator::round_to_pence)))
    }

    fn emit(&self, event: MeterEvent) {
        // A send error only means nobody is subscribed right now
        let _ = self.events.send(event);
    }

    /// Replaces credentials and tariff.
    ///
    /// Takes effect from the next cycle: the held token and the resource
    /// discovery cache are dropped and the invalid-credentials latch is
    /// cleared.
    pub async fn update_config(&self, config: MeterConfig) {
        self.session.set_credentials(config.credentials).await;
        self.fetcher.reset().await;
        *self.tariff.write().await = config.tariff;
        self.credentials_rejected.store(false, Ordering::SeqCst);
        tracing::info!("configuration replaced, effective from the next cycle");
    }

    /// Replaces only the tariff numbers, keeping the session intact
    pub async fn update_tariff(&self, tariff: TariffConfig) {
        *self.tariff.write().await = tariff;
        tracing::info!("tariff replaced, effective from the next cycle");
    }

    /// Checks credentials and account linkage without publishing anything.
    ///
    /// Intended for the configuration flow: authenticates and reports
    /// whether any meter resource is linked to the account.
    pub async fn verify_connection(&self) -> Result<bool, ApiError> {
        let token = self.session.token().await?;
        let resources = self.fetcher.discover(&token).await?;
        Ok(!resources.is_empty())
    }

    /// Gets one published value
    ///
    /// # Returns
    /// The entry (flagged when stale), or [`ValueError::NotAvailable`] when
    /// it was never published or is currently unavailable
    pub async fn get_value(&self, value: MeterValue) -> Result<ValueEntry, ValueError> {
        self.registry.get(value).await
    }

    /// Gets a consistent copy of the full published snapshot
    pub async fn snapshot(&self) -> ValueSnapshot {
        self.registry.snapshot().await
    }

    /// Subscribes to cycle events
    pub fn subscribe(&self) -> broadcast::Receiver<MeterEvent> {
        self.events.subscribe()
    }

    /// Gets cycle metrics including latency percentiles and success rate
    pub async fn metrics(&self) -> ApiMetrics {
        self.metrics.metrics().await
    }

    /// Returns the name of the upstream API backend
    pub fn api_name(&self) -> &'static str {
        self.api_name
    }

    /// Perform a health check on the tracker
    ///
    /// # Returns
    /// ComponentHealth grading the availability and freshness of the
    /// published values
    pub async fn health_check(&self) -> ComponentHealth {
        let snapshot = self.registry.snapshot().await;

        let available = snapshot
            .entries
            .values()
            .filter(|entry| entry.available)
            .count();
        let stale_values: Vec<String> = snapshot
            .entries
            .iter()
            .filter(|(_, entry)| entry.stale)
            .map(|(value, _)| value.name().to_string())
            .collect();

        let mut details = HashMap::new();
        details.insert(
            "available_values".to_string(),
            serde_json::json!(available),
        );
        details.insert("api_name".to_string(), serde_json::json!(self.api_name));
        details.insert("stale_values".to_string(), serde_json::json!(stale_values));
        details.insert(
            "published_at".to_string(),
            serde_json::json!(snapshot.published_at),
        );

        let status = if available == 0 {
            HealthStatus::Unhealthy
        } else if !stale_values.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "energy cost tracker is operational with fresh data".to_string(),
            HealthStatus::Degraded => format!(
                "energy cost tracker has {} stale values",
                stale_values.len()
            ),
            HealthStatus::Unhealthy => {
                "energy cost tracker has no available values".to_string()
            }
        };

        ComponentHealth {
            name: "energy_cost_tracker".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: Utc::now(),
        }
    }
}
