//! In-memory storage backend for Dyve.
//!
//! Implements both [`LeaseStore`](dyve_core::LeaseStore) and
//! [`HierarchyStore`](dyve_core::HierarchyStore) over a single locked map.
//! Suitable for tests and single-process deployments; state is lost on exit.
//!
//! # Example
//!
//! ```ignore
//! use dyve_db_memory::InMemoryStore;
//!
//! let store = Arc::new(InMemoryStore::new(dyve_cloudfoundry::lease_plan()));
//! let job = store.accept_reconcile_job(Duration::from_secs(60)).await?;
//! ```

mod store;

pub use store::{InMemoryStore, StoreKey};
