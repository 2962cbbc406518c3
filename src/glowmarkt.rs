//! Glowmarkt implementation of the metering capability
//!
//! Talks to the Glowmarkt REST API: one credential exchange, resource
//! discovery per virtual entity, and daily-sum readings queries. Readings
//! are requested over a trailing multi-day window and the newest non-null
//! day is reported, because the upstream publishes data 24-48 hours late
//! and a "today" query would systematically come back empty.

use crate::{
    api::MeterApi,
    constants::{
        DEFAULT_TOKEN_VALIDITY_SECS, GLOWMARKT_API_BASE, GLOWMARKT_APPLICATION_ID,
        READING_LOOKBACK_DAYS, REQUEST_TIMEOUT_SECS, USER_AGENT,
    },
    error::ApiError,
    types::{AuthToken, Credentials, DiscoveredResource, MeterReading, ResourceKind},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    valid: bool,
    token: Option<String>,
    /// Expiry as unix seconds; absent on some accounts
    exp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct VirtualEntity {
    #[serde(rename = "veId")]
    ve_id: String,
}

#[derive(Debug, Deserialize)]
struct ResourceList {
    #[serde(default)]
    resources: Vec<ResourceEntry>,
}

#[derive(Debug, Deserialize)]
struct ResourceEntry {
    #[serde(rename = "resourceId")]
    resource_id: String,
    classifier: String,
    name: Option<String>,
}

/// Readings come back as `[unix_seconds, kwh_or_null]` pairs
#[derive(Debug, Deserialize)]
struct ReadingsResponse {
    status: Option<String>,
    #[serde(default)]
    data: Vec<(i64, Option<f64>)>,
}

/// HTTP client for the Glowmarkt metering API
pub struct GlowmarktApi {
    client: Client,
    base_url: String,
}

impl GlowmarktApi {
    /// Creates a client against the production Glowmarkt API
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(GLOWMARKT_API_BASE)
    }

    /// Creates a client against a non-default base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Performs an authenticated GET and parses the JSON body
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .header("applicationId", GLOWMARKT_APPLICATION_ID)
            .header("token", token)
            .send()
            .await
            .map_err(ApiError::Network)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::AuthRejected);
        }

        if !response.status().is_success() {
            return Err(ApiError::Api(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let text = response.text().await.map_err(ApiError::Network)?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!(
                "failed to parse Glowmarkt response: {e}. Response: {text}"
            ))
        })
    }
}

#[async_trait]
impl MeterApi for GlowmarktApi {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthToken, ApiError> {
        let url = format!("{}/auth", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("applicationId", GLOWMARKT_APPLICATION_ID)
            .json(&AuthRequest {
                username: &credentials.email,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(ApiError::Network)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::InvalidCredentials);
        }

        if !response.status().is_success() {
            return Err(ApiError::Api(format!(
                "HTTP {} from the auth endpoint",
                response.status()
            )));
        }

        // The auth body holds the token, so parse errors never echo it
        let body: AuthResponse = response
            .json()
            .await
            .map_err(|_| ApiError::InvalidResponse("unparseable auth response".to_string()))?;

        if !body.valid {
            return Err(ApiError::InvalidCredentials);
        }

        let token = body
            .token
            .ok_or_else(|| ApiError::InvalidResponse("auth response carried no token".to_string()))?;

        let expires_at = body
            .exp
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
            .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(DEFAULT_TOKEN_VALIDITY_SECS));

        tracing::debug!(expires_at = %expires_at, "authenticated against Glowmarkt");

        Ok(AuthToken { token, expires_at })
    }

    async fn list_resources(
        &self,
        token: &str,
    ) -> Result<HashMap<ResourceKind, DiscoveredResource>, ApiError> {
        let url = format!("{}/virtualentity", self.base_url);
        let entities: Vec<VirtualEntity> = self.get_json(&url, token).await?;

        let mut resources = HashMap::new();
        for entity in entities {
            let url = format!("{}/virtualentity/{}/resources", self.base_url, entity.ve_id);
            let list: ResourceList = self.get_json(&url, token).await?;

            for entry in list.resources {
                if let Some(kind) = ResourceKind::from_classifier(&entry.classifier) {
                    resources.insert(
                        kind,
                        DiscoveredResource {
                            resource_id: entry.resource_id,
                            name: entry.name.unwrap_or(entry.classifier),
                        },
                    );
                }
            }
        }

        tracing::debug!(count = resources.len(), "listed Glowmarkt resources");
        Ok(resources)
    }

    async fn latest_reading(
        &self,
        token: &str,
        resource_id: &str,
        kind: ResourceKind,
    ) -> Result<MeterReading, ApiError> {
        let to = Utc::now();
        let from = to - chrono::Duration::days(READING_LOOKBACK_DAYS);
        let url = format!(
            "{}/resource/{}/readings?from={}&to={}&period=P1D&offset=0&function=sum",
            self.base_url,
            resource_id,
            from.format("%Y-%m-%dT%H:%M:%S"),
            to.format("%Y-%m-%dT%H:%M:%S"),
        );

        let readings: ReadingsResponse = self.get_json(&url, token).await?;

        if readings.status.as_deref() != Some("OK") {
            return Err(ApiError::Api(format!(
                "readings query for {kind} returned status {:?}",
                readings.status
            )));
        }

        let (seconds, usage_kwh) = readings
            .data
            .iter()
            .rev()
            .find_map(|(seconds, value)| value.map(|v| (*seconds, v)))
            .ok_or_else(|| {
                ApiError::InvalidResponse(format!(
                    "no usable {kind} reading in the last {READING_LOOKBACK_DAYS} days"
                ))
            })?;

        if usage_kwh < 0.0 {
            return Err(ApiError::InvalidResponse(format!(
                "negative {kind} usage reported: {usage_kwh}"
            )));
        }

        let timestamp = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
            ApiError::InvalidResponse(format!("unrepresentable reading timestamp: {seconds}"))
        })?;

        tracing::debug!(resource = %kind, usage_kwh, timestamp = %timestamp, "fetched latest reading");

        Ok(MeterReading {
            kind,
            usage_kwh,
            timestamp,
        })
    }

    fn api_name(&self) -> &'static str {
        "glowmarkt"
    }
}
