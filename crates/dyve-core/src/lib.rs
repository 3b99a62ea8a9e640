//! Reconciliation engine for the Dyve resource cache.
//!
//! Keeps a local copy of remote resource hierarchies (Cloud Foundry
//! foundations, GitHub organizations, ...) eventually consistent with the
//! upstream systems:
//!
//! - a [`LeaseStore`] hands out at most one stale entity per call and stamps
//!   it so concurrent callers never receive the same entity;
//! - the [`Reconciler`] dispatches the leased [`Job`] to the handler
//!   registered for its [`ScopeTag`];
//! - the [`Scheduler`] runs a fixed pool of workers polling the reconciler;
//! - a [`Cascade`] handler makes the stored children of a parent match the
//!   upstream listing, removing whole subtrees that disappeared.
//!
//! # Example
//!
//! ```ignore
//! use dyve_core::{Reconciler, Scheduler, ScopeTag, handler_fn};
//!
//! let reconciler = Reconciler::builder(store, Duration::from_secs(60))
//!     .handler(ScopeTag::from_static("spaces"), spaces_cascade)
//!     .build();
//!
//! let handle = Scheduler::new(Arc::new(reconciler)).start(4, Duration::from_secs(1));
//! // ...
//! handle.shutdown().await;
//! ```

pub mod cascade;
pub mod clock;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod scheduler;
pub mod store;

pub use cascade::{Cascade, CascadeReport, ChildOf, Node, UpstreamSource};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorCategory, ReconcileError, StoreError, UpstreamError};
pub use model::{ChildRecord, Entity, EntityKind, EntityRef, Job, LeasePlan, ScopeTag};
pub use reconciler::{
    DEFAULT_OLDER_THAN, HandlerFn, Reconcile, ReconcileHandler, Reconciler, ReconcilerBuilder,
    RunOutcome, handler_fn,
};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use store::{HierarchyStore, LeaseStore};
