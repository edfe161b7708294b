//! Client side of shelter: the network primitive and the request interceptor.
//!
//! This crate provides the timeout-bounded network layer and the
//! install/activate/fetch lifecycle built on top of the storage in
//! `shelter-core`.

pub mod fetch;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch::{FetchConfig, HttpNetwork, Network, fetch_with_timeout};
pub use worker::{
    ActivationReport, Dispatcher, InstallOutcome, InstallReport, PendingResponse, Policy, Resolution, Route,
    ServiceWorker, Source, WorkerState,
};
