//! Dyve provider process.
//!
//! Loads [`config::AppConfig`], opens the configured store, seeds the
//! provider root and runs the reconcile worker pool until shutdown.

pub mod config;
pub mod observability;
pub mod runtime;

pub use config::{AppConfig, ConfigError, ProviderKind, StorageBackend};
