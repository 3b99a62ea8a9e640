//! Lease-and-dispatch loop body.
//!
//! A [`Reconciler`] leases at most one job per [`Reconciler::run`] call and
//! dispatches it to the handler registered for the job's scope. Handlers are
//! registered once through [`ReconcilerBuilder`]; the resulting table is
//! immutable for the lifetime of the reconciler.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, info, warn};

use crate::error::ReconcileError;
use crate::model::{Job, ScopeTag};
use crate::store::LeaseStore;

/// Lease duration used when a zero `older_than` is configured.
pub const DEFAULT_OLDER_THAN: Duration = Duration::from_secs(60);

/// Work performed for one leased job.
#[async_trait]
pub trait ReconcileHandler: Send + Sync {
    async fn reconcile(&self, job: &Job) -> Result<(), ReconcileError>;
}

/// Adapter turning an async closure into a [`ReconcileHandler`].
pub struct HandlerFn<F>(F);

/// Wraps `f` so it can be registered as a handler.
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ReconcileError>> + Send + 'static,
{
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> ReconcileHandler for HandlerFn<F>
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ReconcileError>> + Send + 'static,
{
    async fn reconcile(&self, job: &Job) -> Result<(), ReconcileError> {
        (self.0)(job.clone()).await
    }
}

/// Result of a single [`Reconcile::run`] call.
#[derive(Debug)]
pub enum RunOutcome {
    /// Nothing was eligible for reconciliation.
    Idle,
    /// The lease call itself failed; no job was taken.
    LeaseFailed(ReconcileError),
    /// The job was handled successfully.
    Completed(Job),
    /// The job's scope has no handler; acknowledged as a no-op.
    Skipped(Job),
    /// The handler reported an error or panicked.
    Failed { job: Job, error: ReconcileError },
}

impl RunOutcome {
    /// Whether a job was leased. Pollers loop without delay while this is true.
    pub fn worked(&self) -> bool {
        matches!(
            self,
            Self::Completed(_) | Self::Skipped(_) | Self::Failed { .. }
        )
    }

    pub fn error(&self) -> Option<&ReconcileError> {
        match self {
            Self::LeaseFailed(error) | Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn job(&self) -> Option<&Job> {
        match self {
            Self::Completed(job) | Self::Skipped(job) | Self::Failed { job, .. } => Some(job),
            _ => None,
        }
    }

    /// Collapses the outcome into `Ok(worked)` or the reported error.
    pub fn into_result(self) -> Result<bool, ReconcileError> {
        match self {
            Self::Idle => Ok(false),
            Self::Completed(_) | Self::Skipped(_) => Ok(true),
            Self::LeaseFailed(error) | Self::Failed { error, .. } => Err(error),
        }
    }
}

/// Something a polling worker can drive.
#[async_trait]
pub trait Reconcile: Send + Sync {
    async fn run(&self) -> RunOutcome;
}

/// Builder collecting the closed set of scope handlers.
pub struct ReconcilerBuilder {
    store: Arc<dyn LeaseStore>,
    older_than: Duration,
    handlers: Vec<(ScopeTag, Arc<dyn ReconcileHandler>)>,
}

impl ReconcilerBuilder {
    /// Registers `handler` for `scope`. A later registration for the same
    /// scope replaces the earlier one.
    #[must_use]
    pub fn handler<H>(mut self, scope: ScopeTag, handler: H) -> Self
    where
        H: ReconcileHandler + 'static,
    {
        self.handlers.retain(|(s, _)| *s != scope);
        self.handlers.push((scope, Arc::new(handler)));
        self
    }

    pub fn build(self) -> Reconciler {
        let older_than = if self.older_than.is_zero() {
            DEFAULT_OLDER_THAN
        } else {
            self.older_than
        };

        Reconciler {
            store: self.store,
            older_than,
            handlers: self.handlers.into_boxed_slice(),
        }
    }
}

/// Leases jobs from a [`LeaseStore`] and dispatches them by scope.
pub struct Reconciler {
    store: Arc<dyn LeaseStore>,
    older_than: Duration,
    handlers: Box<[(ScopeTag, Arc<dyn ReconcileHandler>)]>,
}

impl Reconciler {
    pub fn builder(store: Arc<dyn LeaseStore>, older_than: Duration) -> ReconcilerBuilder {
        ReconcilerBuilder {
            store,
            older_than,
            handlers: Vec::new(),
        }
    }

    /// Freshness window, which is also the effective lease duration.
    pub fn older_than(&self) -> Duration {
        self.older_than
    }

    pub fn scopes(&self) -> impl Iterator<Item = &ScopeTag> {
        self.handlers.iter().map(|(scope, _)| scope)
    }

    fn handler_for(&self, scope: &ScopeTag) -> Option<&Arc<dyn ReconcileHandler>> {
        self.handlers
            .iter()
            .find(|(s, _)| s == scope)
            .map(|(_, handler)| handler)
    }

    /// Lease at most one job and dispatch it.
    pub async fn run(&self) -> RunOutcome {
        let job = match self.store.accept_reconcile_job(self.older_than).await {
            Ok(Some(job)) => job,
            Ok(None) => return RunOutcome::Idle,
            Err(e) => return RunOutcome::LeaseFailed(ReconcileError::Lease(e)),
        };

        info!(scope = %job.scope, entity_id = %job.entity_id, "reconciling");

        let Some(handler) = self.handler_for(&job.scope) else {
            debug!(scope = %job.scope, entity_id = %job.entity_id, "No handler for scope, skipping");
            return RunOutcome::Skipped(job);
        };

        let started = Instant::now();
        let result = AssertUnwindSafe(handler.reconcile(&job))
            .catch_unwind()
            .await;
        let elapsed = started.elapsed();

        if elapsed >= self.older_than {
            // No lease renewal exists; another worker may already hold this entity.
            warn!(
                scope = %job.scope,
                entity_id = %job.entity_id,
                elapsed_ms = elapsed.as_millis() as u64,
                older_than_ms = self.older_than.as_millis() as u64,
                "Handler outlived its lease"
            );
        }

        match result {
            Ok(Ok(())) => RunOutcome::Completed(job),
            Ok(Err(error)) => {
                warn!(scope = %job.scope, entity_id = %job.entity_id, error = %error, "Reconcile failed");
                RunOutcome::Failed { job, error }
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(scope = %job.scope, entity_id = %job.entity_id, panic = %message, "Reconcile handler panicked");
                let error = ReconcileError::HandlerPanicked {
                    scope: job.scope.clone(),
                    entity_id: job.entity_id.clone(),
                    message,
                };
                RunOutcome::Failed { job, error }
            }
        }
    }
}

#[async_trait]
impl Reconcile for Reconciler {
    async fn run(&self) -> RunOutcome {
        Reconciler::run(self).await
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
