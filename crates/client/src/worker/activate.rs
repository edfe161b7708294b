//! Stale generation eviction.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use shelter_core::{CacheStorage, Error};

use super::policy::Policy;

/// Outcome of an activation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivationReport {
    /// Generations deleted.
    pub evicted: Vec<String>,
    /// Generations whose deletion failed, with the reason. They stay behind
    /// but are never read again.
    pub failed: Vec<(String, String)>,
}

pub struct Activator {
    storage: Arc<dyn CacheStorage>,
    policy: Arc<Policy>,
}

impl Activator {
    pub fn new(storage: Arc<dyn CacheStorage>, policy: Arc<Policy>) -> Self {
        Self { storage, policy }
    }

    /// Delete every generation except the current one.
    ///
    /// Deletions run concurrently and all of them finish before this returns.
    /// A no-op when eviction is disabled.
    ///
    /// # Errors
    ///
    /// Only listing the generations can fail the activation; individual
    /// deletion failures are reported in [`ActivationReport::failed`].
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        if !self.policy.evict_stale_generations {
            return Ok(ActivationReport::default());
        }

        let current = &self.policy.generation;
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| name != current)
            .collect();

        let results = join_all(stale.iter().map(|name| self.storage.delete(name))).await;

        let mut report = ActivationReport::default();
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(true) => report.evicted.push(name),
                Ok(false) => tracing::debug!(generation = %name, "generation already gone"),
                Err(e) => {
                    tracing::warn!(generation = %name, error = %e, "failed to delete stale generation");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        tracing::info!(current = %current, evicted = report.evicted.len(), failed = report.failed.len(), "activated");
        Ok(report)
    }
}
