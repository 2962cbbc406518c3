//! Capability trait over the upstream metering API

use crate::{
    error::ApiError,
    types::{AuthToken, Credentials, DiscoveredResource, MeterReading, ResourceKind},
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Trait for the three-call metering API boundary
///
/// The tracker depends only on this contract. [`GlowmarktApi`] implements it
/// over HTTP; tests script it with [`mock::MockApi`].
///
/// [`GlowmarktApi`]: crate::glowmarkt::GlowmarktApi
#[async_trait]
pub trait MeterApi: Send + Sync {
    /// Exchanges account credentials for a bearer token
    ///
    /// # Returns
    /// The token with its server-declared expiry, or
    /// [`ApiError::InvalidCredentials`] when the exchange is rejected.
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthToken, ApiError>;

    /// Lists the account's meter resources keyed by kind
    async fn list_resources(
        &self,
        token: &str,
    ) -> Result<HashMap<ResourceKind, DiscoveredResource>, ApiError>;

    /// Fetches the most recent reading the upstream is willing to report
    ///
    /// Implementations must ask for "latest available", never "today":
    /// smart meter data reaches the upstream with a 24-48 hour lag.
    async fn latest_reading(
        &self,
        token: &str,
        resource_id: &str,
        kind: ResourceKind,
    ) -> Result<MeterReading, ApiError>;

    /// Returns the name of this API backend
    fn api_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted in-memory API for exercising the tracker without a live
    /// upstream.
    ///
    /// Each call pops a one-shot scripted result when present and otherwise
    /// repeats the sticky result configured with the `set_*` methods.
    pub struct MockApi {
        state: Mutex<MockState>,
    }

    struct MockState {
        auth_sticky: Result<AuthToken, ApiError>,
        auth_queue: VecDeque<Result<AuthToken, ApiError>>,
        resources_sticky: Result<HashMap<ResourceKind, DiscoveredResource>, ApiError>,
        readings_sticky: HashMap<ResourceKind, Result<MeterReading, ApiError>>,
        readings_queue: HashMap<ResourceKind, VecDeque<Result<MeterReading, ApiError>>>,
        auth_calls: usize,
        resource_calls: usize,
        reading_calls: usize,
        reading_delay: Option<Duration>,
        token_counter: usize,
    }

    /// Builds a token valid for one hour
    pub fn token(n: usize) -> AuthToken {
        AuthToken {
            token: format!("token-{n}"),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        }
    }

    /// Builds a reading stamped with yesterday's date, mirroring the
    /// upstream reporting lag
    pub fn reading(kind: ResourceKind, usage_kwh: f64) -> MeterReading {
        MeterReading {
            kind,
            usage_kwh,
            timestamp: Utc::now() - ChronoDuration::days(1),
        }
    }

    fn resource(kind: ResourceKind) -> DiscoveredResource {
        DiscoveredResource {
            resource_id: format!("resource-{kind}"),
            name: format!("{kind} consumption"),
        }
    }

    /// Manual "clone" of ApiError since reqwest errors don't implement Clone
    fn clone_error(error: &ApiError) -> ApiError {
        match error {
            ApiError::InvalidCredentials => ApiError::InvalidCredentials,
            ApiError::NotFound(kind) => ApiError::NotFound(*kind),
            ApiError::AuthRejected => ApiError::AuthRejected,
            ApiError::Network(e) => ApiError::Api(format!("network error (cloned): {e}")),
            ApiError::InvalidResponse(s) => ApiError::InvalidResponse(s.clone()),
            ApiError::Api(s) => ApiError::Api(s.clone()),
        }
    }

    fn clone_result<T: Clone>(result: &Result<T, ApiError>) -> Result<T, ApiError> {
        match result {
            Ok(value) => Ok(value.clone()),
            Err(error) => Err(clone_error(error)),
        }
    }

    impl MockApi {
        /// A mock where authentication succeeds, both resources are linked
        /// and both fuels have readings (10.5 kWh electricity, 13.5 kWh gas)
        pub fn healthy() -> Self {
            let mut readings_sticky = HashMap::new();
            readings_sticky.insert(
                ResourceKind::Electricity,
                Ok(reading(ResourceKind::Electricity, 10.5)),
            );
            readings_sticky.insert(ResourceKind::Gas, Ok(reading(ResourceKind::Gas, 13.5)));

            let mut resources = HashMap::new();
            for kind in ResourceKind::all() {
                resources.insert(*kind, resource(*kind));
            }

            Self {
                state: Mutex::new(MockState {
                    auth_sticky: Ok(token(0)),
                    auth_queue: VecDeque::new(),
                    resources_sticky: Ok(resources),
                    readings_sticky,
                    readings_queue: HashMap::new(),
                    auth_calls: 0,
                    resource_calls: 0,
                    reading_calls: 0,
                    reading_delay: None,
                    token_counter: 0,
                }),
            }
        }

        /// Replaces the sticky authentication result
        pub fn set_auth(&self, result: Result<AuthToken, ApiError>) {
            self.state.lock().unwrap().auth_sticky = result;
        }

        /// Queues a one-shot authentication result
        pub fn script_auth(&self, result: Result<AuthToken, ApiError>) {
            self.state.lock().unwrap().auth_queue.push_back(result);
        }

        /// Replaces the sticky resource listing result
        pub fn set_resources(
            &self,
            result: Result<HashMap<ResourceKind, DiscoveredResource>, ApiError>,
        ) {
            self.state.lock().unwrap().resources_sticky = result;
        }

        /// Removes one resource kind from the sticky listing
        pub fn unlink_resource(&self, kind: ResourceKind) {
            let mut state = self.state.lock().unwrap();
            if let Ok(resources) = &mut state.resources_sticky {
                resources.remove(&kind);
            }
        }

        /// Replaces the sticky reading result for one kind
        pub fn set_reading(&self, kind: ResourceKind, result: Result<MeterReading, ApiError>) {
            self.state.lock().unwrap().readings_sticky.insert(kind, result);
        }

        /// Queues a one-shot reading result for one kind
        pub fn script_reading(&self, kind: ResourceKind, result: Result<MeterReading, ApiError>) {
            self.state
                .lock()
                .unwrap()
                .readings_queue
                .entry(kind)
                .or_default()
                .push_back(result);
        }

        /// Delays every reading call, for exercising the single-flight guard
        pub fn set_reading_delay(&self, delay: Duration) {
            self.state.lock().unwrap().reading_delay = Some(delay);
        }

        pub fn auth_calls(&self) -> usize {
            self.state.lock().unwrap().auth_calls
        }

        pub fn resource_calls(&self) -> usize {
            self.state.lock().unwrap().resource_calls
        }

        pub fn reading_calls(&self) -> usize {
            self.state.lock().unwrap().reading_calls
        }
    }

    #[async_trait]
    impl MeterApi for MockApi {
        async fn authenticate(&self, _credentials: &Credentials) -> Result<AuthToken, ApiError> {
            let mut state = self.state.lock().unwrap();
            state.auth_calls += 1;
            if let Some(result) = state.auth_queue.pop_front() {
                return result;
            }
            state.token_counter += 1;
            let counter = state.token_counter;
            clone_result(&state.auth_sticky).map(|mut t| {
                t.token = format!("token-{counter}");
                t
            })
        }

        async fn list_resources(
            &self,
            _token: &str,
        ) -> Result<HashMap<ResourceKind, DiscoveredResource>, ApiError> {
            let mut state = self.state.lock().unwrap();
            state.resource_calls += 1;
            clone_result(&state.resources_sticky)
        }

        async fn latest_reading(
            &self,
            _token: &str,
            _resource_id: &str,
            kind: ResourceKind,
        ) -> Result<MeterReading, ApiError> {
            let delay = {
                let mut state = self.state.lock().unwrap();
                state.reading_calls += 1;
                state.reading_delay
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state.lock().unwrap();
            if let Some(result) = state
                .readings_queue
                .get_mut(&kind)
                .and_then(|queue| queue.pop_front())
            {
                return result;
            }
            match state.readings_sticky.get(&kind) {
                Some(result) => clone_result(result),
                None => Err(ApiError::NotFound(kind)),
            }
        }

        fn api_name(&self) -> &'static str {
            "mock"
        }
    }
}
