//! Types for the energy cost tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::constants::{
    DEFAULT_ELECTRICITY_RATE, DEFAULT_ELECTRICITY_STANDING_CHARGE, DEFAULT_GAS_RATE,
    DEFAULT_GAS_STANDING_CHARGE,
};

/// Utility resources reported by the upstream meter feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Mains electricity consumption
    Electricity,
    /// Mains gas consumption
    Gas,
}

impl ResourceKind {
    /// Get the upstream classifier for this resource kind
    pub fn classifier(&self) -> &'static str {
        match self {
            ResourceKind::Electricity => "electricity.consumption",
            ResourceKind::Gas => "gas.consumption",
        }
    }

    /// Resolve an upstream classifier back to a resource kind
    pub fn from_classifier(classifier: &str) -> Option<Self> {
        match classifier {
            "electricity.consumption" => Some(ResourceKind::Electricity),
            "gas.consumption" => Some(ResourceKind::Gas),
            _ => None,
        }
    }

    /// Get all resource kinds the tracker polls
    pub fn all() -> &'static [ResourceKind] {
        &[ResourceKind::Electricity, ResourceKind::Gas]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Electricity => write!(f, "electricity"),
            ResourceKind::Gas => write!(f, "gas"),
        }
    }
}

/// Account credentials for the upstream API
///
/// The `Debug` representation redacts the password; neither field is logged
/// anywhere in the crate.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Account email
    pub email: String,
    /// Account password
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Tariff numbers used to turn usage into daily cost, in GBP
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TariffConfig {
    /// Electricity unit rate (GBP per kWh)
    pub electricity_rate: f64,
    /// Electricity standing charge (GBP per day)
    pub electricity_standing_charge: f64,
    /// Gas unit rate (GBP per kWh)
    pub gas_rate: f64,
    /// Gas standing charge (GBP per day)
    pub gas_standing_charge: f64,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            electricity_rate: DEFAULT_ELECTRICITY_RATE,
            electricity_standing_charge: DEFAULT_ELECTRICITY_STANDING_CHARGE,
            gas_rate: DEFAULT_GAS_RATE,
            gas_standing_charge: DEFAULT_GAS_STANDING_CHARGE,
        }
    }
}

/// Inbound configuration object: one credential set plus the tariff.
///
/// Replaceable at any time via
/// [`EnergyCostTracker::update_config`](crate::tracker::EnergyCostTracker::update_config);
/// the next poll cycle picks up the new values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Upstream account credentials
    pub credentials: Credentials,
    /// Tariff numbers for cost derivation
    pub tariff: TariffConfig,
}

/// A bearer token with its server-declared expiry
#[derive(Debug, Clone)]
pub struct AuthToken {
    /// Opaque bearer token
    pub token: String,
    /// Expiry as declared by the upstream (the session applies a skew margin)
    pub expires_at: DateTime<Utc>,
}

/// A single usage reading as reported upstream
///
/// Immutable once fetched; one live instance exists per resource kind,
/// replaced wholesale on every successful fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterReading {
    /// The resource this reading belongs to
    pub kind: ResourceKind,
    /// Usage in kilowatt-hours, non-negative
    pub usage_kwh: f64,
    /// When the upstream recorded the reading
    pub timestamp: DateTime<Utc>,
}

/// An upstream meter resource discovered for the account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredResource {
    /// Upstream resource id
    pub resource_id: String,
    /// Human-readable name reported by the upstream
    pub name: String,
}

/// The eight named values published for observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterValue {
    /// Latest available electricity usage (kWh)
    ElectricityUsage,
    /// Latest available gas usage (kWh)
    GasUsage,
    /// Electricity daily cost (GBP)
    ElectricityCost,
    /// Gas daily cost (GBP)
    GasCost,
    /// Combined daily cost across both fuels (GBP)
    TotalCost,
    /// Configured electricity standing charge (GBP per day)
    ElectricityStandingCharge,
    /// Configured gas standing charge (GBP per day)
    GasStandingCharge,
    /// Combined standing charges (GBP per day)
    TotalStandingCharges,
}

impl MeterValue {
    /// Get the stable name of this value
    pub fn name(&self) -> &'static str {
        match self {
            MeterValue::ElectricityUsage => "electricity_usage",
            MeterValue::GasUsage => "gas_usage",
            MeterValue::ElectricityCost => "electricity_cost",
            MeterValue::GasCost => "gas_cost",
            MeterValue::TotalCost => "total_cost",
            MeterValue::ElectricityStandingCharge => "electricity_standing_charge",
            MeterValue::GasStandingCharge => "gas_standing_charge",
            MeterValue::TotalStandingCharges => "total_standing_charges",
        }
    }

    /// Get all eight published values
    pub fn all() -> &'static [MeterValue] {
        &[
            MeterValue::ElectricityUsage,
            MeterValue::GasUsage,
            MeterValue::ElectricityCost,
            MeterValue::GasCost,
            MeterValue::TotalCost,
            MeterValue::ElectricityStandingCharge,
            MeterValue::GasStandingCharge,
            MeterValue::TotalStandingCharges,
        ]
    }
}

/// One published value with its availability and freshness
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValueEntry {
    /// The value, already rounded to display precision
    pub value: f64,
    /// False when the value cannot currently be served
    pub available: bool,
    /// True when the value was retained across a failed refresh
    pub stale: bool,
    /// When the entry was last written
    pub last_updated: DateTime<Utc>,
}

impl ValueEntry {
    /// Creates a fresh, available entry
    pub fn fresh(value: f64, at: DateTime<Utc>) -> Self {
        Self {
            value,
            available: true,
            stale: false,
            last_updated: at,
        }
    }

    /// Creates an unavailable placeholder entry
    pub fn unavailable(at: DateTime<Utc>) -> Self {
        Self {
            value: 0.0,
            available: false,
            stale: false,
            last_updated: at,
        }
    }
}

/// A consistent view of all published values
///
/// Produced and replaced as a whole; observers never see a mix of old and
/// new entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueSnapshot {
    /// The published entries, one per [`MeterValue`] once the first cycle ran
    pub entries: HashMap<MeterValue, ValueEntry>,
    /// When the snapshot was last published, if ever
    pub published_at: Option<DateTime<Utc>>,
}

impl ValueSnapshot {
    /// Creates the empty pre-first-cycle snapshot
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            published_at: None,
        }
    }

    /// Looks up one entry
    pub fn get(&self, value: MeterValue) -> Option<&ValueEntry> {
        self.entries.get(&value)
    }
}

/// Terminal result of one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The snapshot was replaced
    Published,
    /// The cycle failed; the previous snapshot was retained or flagged
    Failed,
    /// Another cycle was in flight; nothing ran
    Skipped,
}

/// Events broadcast to observers after each cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeterEvent {
    /// A cycle completed and the snapshot was replaced
    ValuesPublished {
        id: Uuid,
        /// Combined daily cost, absent when neither fuel was available
        total_cost: Option<f64>,
        timestamp: DateTime<Utc>,
    },

    /// A cycle exhausted its retries; the previous values were retained
    CycleFailed {
        id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Credentials were rejected; values are unavailable until reconfigured
    ValuesUnavailable {
        id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl MeterEvent {
    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            MeterEvent::ValuesPublished { id, .. } => *id,
            MeterEvent::CycleFailed { id, .. } => *id,
            MeterEvent::ValuesUnavailable { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            MeterEvent::ValuesPublished { .. } => "VALUES_PUBLISHED",
            MeterEvent::CycleFailed { .. } => "CYCLE_FAILED",
            MeterEvent::ValuesUnavailable { .. } => "VALUES_UNAVAILABLE",
        }
    }
}

impl fmt::Display for MeterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeterEvent::ValuesPublished { total_cost, .. } => match total_cost {
                Some(cost) => write!(f, "Values published: total daily cost £{cost:.2}"),
                None => write!(f, "Values published: no fuel available"),
            },
            MeterEvent::CycleFailed { reason, .. } => {
                write!(f, "Refresh cycle failed: {reason}")
            }
            MeterEvent::ValuesUnavailable { reason, .. } => {
                write!(f, "Values unavailable: {reason}")
            }
        }
    }
}

/// Overall tracker health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HealthStatus {
    /// All published values are available and fresh
    Healthy,
    /// Some values are stale or unavailable but the tracker is functional
    Degraded,
    /// No values can currently be served
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}
