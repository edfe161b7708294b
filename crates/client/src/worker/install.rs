//! Manifest pre-population.
//!
//! All entries are fetched before anything is written, so a failed install
//! leaves the generation opened but empty of this attempt's entries.

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::Serialize;
use shelter_core::{CacheStorage, Error, Request, RequestKey, Response};

use super::policy::{ManifestEntry, Policy};
use crate::fetch::{Network, fetch_with_timeout};

/// Outcome of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub generation: String,
    pub entries: usize,
    pub bytes: usize,
}

pub struct Installer {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    policy: Arc<Policy>,
}

impl Installer {
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, policy: Arc<Policy>) -> Self {
        Self { storage, network, policy }
    }

    /// Open the current generation and cache every manifest entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` naming the first entry that could not be
    /// fetched or returned a non-2xx status, or the storage error if opening
    /// or writing the generation fails.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let generation = &self.policy.generation;
        self.storage.open(generation).await?;

        let fetched = try_join_all(self.policy.manifest.iter().map(|entry| self.fetch_entry(entry))).await?;

        let mut bytes = 0;
        for (key, response) in &fetched {
            self.storage.put(generation, key, response).await?;
            bytes += response.body.len();
        }

        tracing::info!(generation = %generation, entries = fetched.len(), bytes, "manifest cached");

        Ok(InstallReport { generation: generation.clone(), entries: fetched.len(), bytes })
    }

    async fn fetch_entry(&self, entry: &ManifestEntry) -> Result<(RequestKey, Response), Error> {
        let request = Request::get(entry.url.clone());
        let response = fetch_with_timeout(self.network.as_ref(), &request, self.policy.install_timeout)
            .await
            .map_err(|e| Error::InstallFailed { entry: entry.id.clone(), reason: e.to_string() })?;

        if !response.is_ok() {
            return Err(Error::InstallFailed { entry: entry.id.clone(), reason: format!("status {}", response.status) });
        }

        tracing::debug!(entry = %entry.id, url = %entry.url, "fetched manifest entry");
        Ok((request.key(), response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingStorage, StubNetwork, test_policy};
    use shelter_core::MemoryCacheStorage;
    use std::time::Duration;

    fn full_network() -> StubNetwork {
        StubNetwork::new()
            .respond("https://app.example.com/", 200, "<html>root</html>")
            .respond("https://app.example.com/index.html", 200, "<html>index</html>")
            .respond("https://app.example.com/offline.html", 200, "<html>offline</html>")
    }

    #[tokio::test]
    async fn test_install_caches_every_entry() {
        let storage = MemoryCacheStorage::new();
        let installer = Installer::new(Arc::new(storage.clone()), Arc::new(full_network()), Arc::new(test_policy()));

        let report = installer.install().await.unwrap();

        assert_eq!(report.generation, "app-v2");
        assert_eq!(report.entries, 3);
        assert_eq!(storage.len("app-v2").await, 3);

        let key = Request::get("https://app.example.com/offline.html".parse().unwrap()).key();
        let offline = storage.match_request("app-v2", &key).await.unwrap().unwrap();
        assert_eq!(offline.text(), "<html>offline</html>");
    }

    #[tokio::test]
    async fn test_install_fails_on_unreachable_entry() {
        let storage = MemoryCacheStorage::new();
        let network = full_network().fail("https://app.example.com/index.html");
        let installer = Installer::new(Arc::new(storage.clone()), Arc::new(network), Arc::new(test_policy()));

        let err = installer.install().await.unwrap_err();

        assert!(matches!(err, Error::InstallFailed { ref entry, .. } if entry == "index.html"));
        assert_eq!(storage.len("app-v2").await, 0);
    }

    #[tokio::test]
    async fn test_install_fails_on_error_status() {
        let storage = MemoryCacheStorage::new();
        let network = full_network().respond("https://app.example.com/offline.html", 404, "nope");
        let installer = Installer::new(Arc::new(storage.clone()), Arc::new(network), Arc::new(test_policy()));

        let err = installer.install().await.unwrap_err();

        assert!(matches!(err, Error::InstallFailed { ref entry, ref reason } if entry == "offline.html" && reason == "status 404"));
        assert_eq!(storage.len("app-v2").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_fetch_is_bounded() {
        let storage = MemoryCacheStorage::new();
        let network = full_network().hang("https://app.example.com/");
        let policy = Policy { install_timeout: Duration::from_millis(1_000), ..test_policy() };
        let installer = Installer::new(Arc::new(storage), Arc::new(network), Arc::new(policy));

        let err = installer.install().await.unwrap_err();

        assert!(matches!(err, Error::InstallFailed { ref reason, .. } if reason.starts_with("FETCH_TIMEOUT")));
    }

    #[tokio::test]
    async fn test_install_surfaces_storage_failure() {
        let installer = Installer::new(Arc::new(FailingStorage), Arc::new(full_network()), Arc::new(test_policy()));
        let err = installer.install().await.unwrap_err();
        assert!(err.is_storage_failure());
    }
}
