//! Fixed pool of polling workers driving a [`Reconcile`] implementation.
//!
//! Workers share no in-process state. All coordination happens in the lease
//! store, so adding workers scales throughput until the store saturates.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::reconciler::Reconcile;

/// Launches polling workers.
pub struct Scheduler {
    reconciler: Arc<dyn Reconcile>,
    startup_jitter: Duration,
}

impl Scheduler {
    pub fn new(reconciler: Arc<dyn Reconcile>) -> Self {
        Self {
            reconciler,
            startup_jitter: Duration::ZERO,
        }
    }

    /// Delay each worker's first poll by a random amount below `max`, so a
    /// freshly started pool does not hit the store in lockstep.
    #[must_use]
    pub fn with_startup_jitter(mut self, max: Duration) -> Self {
        self.startup_jitter = max;
        self
    }

    /// Spawn `worker_count` workers and return without blocking.
    ///
    /// Each worker calls [`Reconcile::run`] in a loop. When a run did no work
    /// the worker sleeps for `poll_interval`; otherwise it polls again
    /// immediately to drain a backlog.
    pub fn start(&self, worker_count: usize, poll_interval: Duration) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            workers = worker_count,
            poll_interval_ms = poll_interval.as_millis() as u64,
            "Reconcile scheduler started"
        );

        let workers = (0..worker_count)
            .map(|id| {
                let reconciler = self.reconciler.clone();
                let shutdown = shutdown_rx.clone();
                let jitter = self.startup_jitter;
                tokio::spawn(worker(id, reconciler, poll_interval, jitter, shutdown))
            })
            .collect();

        SchedulerHandle {
            shutdown: shutdown_tx,
            workers,
        }
    }
}

/// Handle to a running worker pool.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Signal all workers to stop at their next lease or backoff boundary.
    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal all workers and wait for them to exit.
    pub async fn shutdown(self) {
        self.cancel();
        for handle in self.workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "Reconcile worker terminated abnormally");
            }
        }
        info!("Reconcile scheduler stopped");
    }
}

async fn worker(
    id: usize,
    reconciler: Arc<dyn Reconcile>,
    poll_interval: Duration,
    startup_jitter: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker = id, "Reconcile worker started");

    if !startup_jitter.is_zero() {
        let delay = rand::thread_rng().gen_range(Duration::ZERO..startup_jitter);
        if wait_or_cancel(&mut shutdown, tokio::time::sleep(delay)).await {
            return;
        }
    }

    let backoff = tokio::time::sleep(poll_interval);
    tokio::pin!(backoff);

    loop {
        if *shutdown.borrow() {
            break;
        }

        let outcome = reconciler.run().await;
        if let Some(error) = outcome.error() {
            warn!(
                worker = id,
                entity_id = outcome.job().map(|job| job.entity_id.as_str()),
                category = %error.category(),
                error = %error,
                "Reconcile run failed"
            );
        }

        if outcome.worked() {
            continue;
        }

        trace!(worker = id, "nothing to reconcile, sleeping...");
        backoff.as_mut().reset(Instant::now() + poll_interval);
        if wait_or_cancel(&mut shutdown, backoff.as_mut()).await {
            break;
        }
    }

    debug!(worker = id, "Reconcile worker stopped");
}

/// Waits for `timer`; returns `true` if cancellation arrived first.
async fn wait_or_cancel<F>(shutdown: &mut watch::Receiver<bool>, timer: F) -> bool
where
    F: std::future::Future<Output = ()>,
{
    tokio::select! {
        biased;

        changed = shutdown.changed() => match changed {
            Ok(()) => *shutdown.borrow(),
            // Handle dropped.
            Err(_) => true,
        },
        _ = timer => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReconcileError, StoreError};
    use crate::model::{Job, ScopeTag};
    use crate::reconciler::RunOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeReconciler {
        times: AtomicUsize,
        backlog: AtomicUsize,
        fail_lease: bool,
    }

    #[async_trait]
    impl Reconcile for FakeReconciler {
        async fn run(&self) -> RunOutcome {
            self.times.fetch_add(1, Ordering::SeqCst);
            if self.fail_lease {
                return RunOutcome::LeaseFailed(ReconcileError::Lease(StoreError::connection(
                    "down",
                )));
            }
            let remaining = self.backlog.load(Ordering::SeqCst);
            if remaining > 0 {
                self.backlog.store(remaining - 1, Ordering::SeqCst);
                return RunOutcome::Completed(Job::new(ScopeTag::from_static("x"), "a"));
            }
            RunOutcome::Idle
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_worker_polls_at_interval() {
        let r = Arc::new(FakeReconciler::default());
        let handle = Scheduler::new(r.clone()).start(1, Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.shutdown().await;

        let times = r.times.load(Ordering::SeqCst);
        assert!(
            (10..=14).contains(&times),
            "expected reconciler to have been called roughly 12 times, was {times}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_backlog_is_drained_without_delay() {
        let r = Arc::new(FakeReconciler {
            backlog: AtomicUsize::new(25),
            ..Default::default()
        });
        let handle = Scheduler::new(r.clone()).start(1, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.shutdown().await;

        assert_eq!(r.backlog.load(Ordering::SeqCst), 0);
        assert_eq!(r.times.load(Ordering::SeqCst), 26);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_do_not_stop_workers() {
        let r = Arc::new(FakeReconciler {
            fail_lease: true,
            ..Default::default()
        });
        let handle = Scheduler::new(r.clone()).start(2, Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(55)).await;
        handle.shutdown().await;

        assert!(r.times.load(Ordering::SeqCst) >= 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_polling() {
        let r = Arc::new(FakeReconciler::default());
        let handle = Scheduler::new(r.clone()).start(4, Duration::from_millis(10));
        assert_eq!(handle.worker_count(), 4);

        tokio::time::sleep(Duration::from_millis(25)).await;
        handle.shutdown().await;
        let after_shutdown = r.times.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(r.times.load(Ordering::SeqCst), after_shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_jitter_delays_first_poll() {
        let r = Arc::new(FakeReconciler::default());
        let handle = Scheduler::new(r.clone())
            .with_startup_jitter(Duration::from_millis(5))
            .start(3, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(r.times.load(Ordering::SeqCst), 3);
        handle.shutdown().await;
    }
}
