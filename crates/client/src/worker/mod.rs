//! The request interceptor.
//!
//! [`ServiceWorker`] wires the three lifecycle hooks to one shared
//! [`Policy`], cache storage and network:
//!
//! - `install`: pre-populate the current generation from the manifest
//! - `activate`: evict every other generation
//! - `fetch`: resolve an intercepted request through the [`Dispatcher`]

pub mod activate;
pub mod dispatch;
pub mod fallback;
pub mod install;
pub mod lifecycle;
pub mod policy;

use std::sync::Arc;

use serde::Serialize;
use shelter_core::{CacheStorage, Error, Request};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

pub use activate::{ActivationReport, Activator};
pub use dispatch::{Dispatcher, Resolution, Route, Source};
pub use install::{InstallReport, Installer};
pub use lifecycle::WorkerState;
pub use policy::{BypassRule, ManifestEntry, Policy};

use crate::fetch::Network;

/// Result of the `install` signal.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub install: InstallReport,
    /// Present when the policy skips waiting and activation succeeded.
    pub activation: Option<ActivationReport>,
    /// Why the immediate activation failed. The install itself still stands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_error: Option<String>,
}

pub struct ServiceWorker {
    state: RwLock<WorkerState>,
    installer: Installer,
    activator: Activator,
    dispatcher: Arc<Dispatcher>,
    policy: Arc<Policy>,
}

impl ServiceWorker {
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, policy: Policy) -> Self {
        let policy = Arc::new(policy);
        Self {
            state: RwLock::new(WorkerState::Parsed),
            installer: Installer::new(storage.clone(), network.clone(), policy.clone()),
            activator: Activator::new(storage.clone(), policy.clone()),
            dispatcher: Arc::new(Dispatcher::new(storage, network, policy.clone())),
            policy,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Move to `next` if `guard` accepts the current state, returning the
    /// state that was left.
    async fn transition(&self, guard: fn(&WorkerState) -> bool, next: WorkerState) -> Result<WorkerState, Error> {
        let mut state = self.state.write().await;
        if !guard(&state) {
            return Err(Error::InvalidState(format!("cannot enter {next} from {}", *state)));
        }
        Ok(std::mem::replace(&mut *state, next))
    }

    async fn set_state(&self, next: WorkerState) {
        *self.state.write().await = next;
    }

    /// Handle the `install` signal.
    ///
    /// On success the worker is `Installed`, or `Activated` when the policy
    /// skips waiting and activation succeeds. A failed immediate activation
    /// is reported in the outcome and leaves the worker `Installed`.
    ///
    /// A failed first install makes the worker `Redundant`. A failed
    /// re-install of an already installed worker restores the previous
    /// state, since the generation it serves is still intact. Either way the
    /// error is returned unchanged.
    pub async fn install(&self) -> Result<InstallOutcome, Error> {
        let previous = self.transition(WorkerState::can_install, WorkerState::Installing).await?;
        tracing::info!(generation = %self.policy.generation, entries = self.policy.manifest.len(), "installing");

        let install = match self.installer.install().await {
            Ok(report) => report,
            Err(e) => {
                let fallback = match previous {
                    WorkerState::Installed | WorkerState::Activated => previous,
                    _ => WorkerState::Redundant,
                };
                tracing::warn!(generation = %self.policy.generation, error = %e, state = %fallback, "install failed");
                self.set_state(fallback).await;
                return Err(e);
            }
        };
        self.set_state(WorkerState::Installed).await;

        let mut outcome = InstallOutcome { install, activation: None, activation_error: None };
        if self.policy.skip_waiting {
            match self.activate().await {
                Ok(report) => outcome.activation = Some(report),
                Err(e) => {
                    tracing::warn!(generation = %self.policy.generation, error = %e, "immediate activation failed");
                    outcome.activation_error = Some(e.to_string());
                }
            }
        }

        Ok(outcome)
    }

    /// Handle the `activate` signal.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless the worker has installed successfully.
    /// A failure while listing generations returns the worker to `Installed`.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.transition(WorkerState::can_activate, WorkerState::Activating).await?;

        match self.activator.activate().await {
            Ok(report) => {
                self.set_state(WorkerState::Activated).await;
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Installed).await;
                Err(e)
            }
        }
    }

    /// Handle the `fetch` signal, awaiting the resolution.
    pub async fn handle_fetch(&self, request: &Request) -> Resolution {
        self.dispatcher.dispatch(request).await
    }

    /// Handle the `fetch` signal without waiting: the resolution runs as its
    /// own task and the returned handle yields it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn intercept(&self, request: Request) -> PendingResponse {
        let dispatcher = self.dispatcher.clone();
        let handle = tokio::spawn(async move { dispatcher.dispatch(&request).await });
        PendingResponse { handle, unavailable_message: self.policy.unavailable_message.clone() }
    }
}

/// A resolution still in flight.
pub struct PendingResponse {
    handle: JoinHandle<Resolution>,
    unavailable_message: String,
}

impl PendingResponse {
    /// Wait for the resolution.
    ///
    /// A task that panicked or was cancelled still yields a 503 so the
    /// requesting page is never left without a response.
    pub async fn wait(self) -> Resolution {
        match self.handle.await {
            Ok(resolution) => resolution,
            Err(e) => {
                tracing::warn!(error = %e, "interception task did not complete");
                Resolution { response: fallback::unavailable(&self.unavailable_message), source: Source::Unavailable }
            }
        }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}
