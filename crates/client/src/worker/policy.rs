//! Immutable interception policy.
//!
//! Built once from [`AppConfig`] and shared by the installer, activator and
//! dispatcher. Manifest entries are resolved against the origin up front so a
//! bad entry is rejected at construction instead of at install time.

use std::time::Duration;

use shelter_core::{AppConfig, Error, Request};
use url::Url;

use crate::fetch::resolve;

/// A manifest entry: the identifier as configured and the URL it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub id: String,
    pub url: Url,
}

/// Which requests skip the cache entirely.
#[derive(Debug, Clone, Default)]
pub struct BypassRule {
    /// Host substrings, e.g. `script.google.com`.
    pub hosts: Vec<String>,
    /// Send every non-GET request straight to the network.
    pub non_get: bool,
}

impl BypassRule {
    pub fn matches(&self, request: &Request) -> bool {
        if self.non_get && !request.method.is_get() {
            return true;
        }
        let Some(host) = request.url.host_str() else {
            return false;
        };
        self.hosts.iter().any(|h| !h.is_empty() && host.contains(h.as_str()))
    }
}

/// Everything the interceptor needs to decide, fixed at construction.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Current cache generation name.
    pub generation: String,
    pub origin: Url,
    pub manifest: Vec<ManifestEntry>,
    pub offline_document: Url,
    /// Deadline for cache-path network calls.
    pub timeout: Duration,
    /// Deadline for bypassed network calls.
    pub bypass_timeout: Duration,
    /// Deadline for each manifest fetch.
    pub install_timeout: Duration,
    pub bypass: BypassRule,
    pub dynamic_caching: bool,
    pub evict_stale_generations: bool,
    pub skip_waiting: bool,
    pub offline_message: String,
    pub unavailable_message: String,
}

impl Policy {
    /// Build a policy from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the configuration fails validation
    /// (out-of-range timeouts, offline document outside the manifest, ...)
    /// and `Error::InvalidUrl` if a manifest entry does not resolve to an
    /// http(s) URL.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        config.validate().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;

        let manifest = config
            .manifest
            .iter()
            .map(|id| {
                resolve(&origin, id)
                    .map(|url| ManifestEntry { id: id.clone(), url })
                    .map_err(|e| Error::InvalidUrl(format!("manifest entry '{id}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let offline_document = manifest
            .iter()
            .find(|entry| entry.id == config.offline_document)
            .map(|entry| entry.url.clone())
            .ok_or_else(|| {
                Error::InvalidInput(format!("offline document '{}' is not in the manifest", config.offline_document))
            })?;

        Ok(Self {
            generation: config.cache_name.clone(),
            origin,
            manifest,
            offline_document,
            timeout: config.timeout(),
            bypass_timeout: config.bypass_timeout(),
            install_timeout: config.install_timeout(),
            bypass: BypassRule { hosts: config.bypass_hosts.clone(), non_get: config.bypass_non_get },
            dynamic_caching: config.dynamic_caching,
            evict_stale_generations: config.evict_stale_generations,
            skip_waiting: config.skip_waiting,
            offline_message: config.offline_message.clone(),
            unavailable_message: config.unavailable_message.clone(),
        })
    }
}
