//! Core types and shared functionality for shelter.
//!
//! This crate provides:
//! - Request/response snapshots and cache identities
//! - Versioned cache storage (in-memory and SQLite backends)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheStorage, MemoryCacheStorage};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Method, Request, RequestKey, RequestMode, Response};
