//! Per-request resolution.
//!
//! ```text
//! classify ─┬─ Bypass ── network(bypass_timeout) ──┬─ response
//!           │                                       └─ JSON error
//!           └─ Cache ─── lookup ─┬─ hit ── response
//!                                └─ miss ── network(timeout) ─┬─ response (+ store copy unless 206)
//!                                                             └─ offline document | 503
//! ```
//!
//! [`Dispatcher::dispatch`] is infallible: every branch ends in a response.

use std::sync::Arc;

use serde::Serialize;
use shelter_core::{CacheStorage, Error, Method, Request, RequestKey, Response};

use super::fallback;
use super::policy::Policy;
use crate::fetch::{Network, fetch_with_timeout};

/// Strategy chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Bypass,
    Cache,
}

/// Where a resolved response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Cache,
    Network,
    OfflineDocument,
    Unavailable,
    BypassNetwork,
    BypassError,
}

/// A response together with its [`Source`].
#[derive(Debug, Clone)]
pub struct Resolution {
    pub response: Response,
    pub source: Source,
}

impl Resolution {
    fn new(response: Response, source: Source) -> Self {
        Self { response, source }
    }
}

pub struct Dispatcher {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    policy: Arc<Policy>,
}

impl Dispatcher {
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, policy: Arc<Policy>) -> Self {
        Self { storage, network, policy }
    }

    pub fn classify(&self, request: &Request) -> Route {
        if self.policy.bypass.matches(request) { Route::Bypass } else { Route::Cache }
    }

    /// Resolve an intercepted request to a response.
    pub async fn dispatch(&self, request: &Request) -> Resolution {
        match self.classify(request) {
            Route::Bypass => self.bypass(request).await,
            Route::Cache => self.cache_first(request).await,
        }
    }

    async fn bypass(&self, request: &Request) -> Resolution {
        match fetch_with_timeout(self.network.as_ref(), request, self.policy.bypass_timeout).await {
            Ok(response) => Resolution::new(response, Source::BypassNetwork),
            Err(e) => {
                tracing::warn!(method = %request.method, url = %request.url, error = %e, "bypassed request failed");
                Resolution::new(fallback::offline_json(&self.policy.offline_message), Source::BypassError)
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> Resolution {
        match self.resolve(request).await {
            Ok(resolution) => resolution,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, navigate = request.is_navigation(), "serving fallback");
                self.fallback(request).await
            }
        }
    }

    async fn resolve(&self, request: &Request) -> Result<Resolution, Error> {
        let generation = &self.policy.generation;
        let key = request.key();

        if let Some(cached) = self.storage.match_request(generation, &key).await? {
            tracing::debug!(key = %key, "cache hit");
            return Ok(Resolution::new(cached, Source::Cache));
        }

        tracing::debug!(key = %key, "cache miss");
        let response = fetch_with_timeout(self.network.as_ref(), request, self.policy.timeout).await?;

        if self.policy.dynamic_caching
            && request.method.is_get()
            && response.status != 206
            && let Err(e) = self.storage.put(generation, &key, &response.duplicate()).await
        {
            tracing::warn!(key = %key, error = %e, "failed to store network response");
        }

        Ok(Resolution::new(response, Source::Network))
    }

    async fn fallback(&self, request: &Request) -> Resolution {
        if request.is_navigation() {
            let key = RequestKey::new(Method::Get, &self.policy.offline_document);
            match self.storage.match_request(&self.policy.generation, &key).await {
                Ok(Some(document)) => return Resolution::new(document, Source::OfflineDocument),
                Ok(None) => tracing::warn!(key = %key, "offline document missing from cache"),
                Err(e) => tracing::warn!(key = %key, error = %e, "failed to read offline document"),
            }
        }

        Resolution::new(fallback::unavailable(&self.policy.unavailable_message), Source::Unavailable)
    }
}
