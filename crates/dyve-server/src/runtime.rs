//! Assembly of store, provider and worker pool from an [`AppConfig`].

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use dyve_cloudfoundry::CloudFoundryClient;
use dyve_core::{HierarchyStore, LeasePlan, LeaseStore, Reconciler, Scheduler};
use dyve_db_memory::InMemoryStore;
use dyve_db_postgres::PostgresStore;
use dyve_github::GitHubClient;
use tracing::info;

use crate::config::{AppConfig, ProviderKind, StorageBackend};

/// One backend seen through both store contracts.
#[derive(Clone)]
pub struct Stores {
    pub leases: Arc<dyn LeaseStore>,
    pub hierarchy: Arc<dyn HierarchyStore>,
}

pub fn lease_plan(kind: ProviderKind) -> LeasePlan {
    match kind {
        ProviderKind::CloudFoundry => dyve_cloudfoundry::lease_plan(),
        ProviderKind::GitHub => dyve_github::lease_plan(),
    }
}

pub async fn open_store(cfg: &AppConfig) -> anyhow::Result<Stores> {
    let plan = lease_plan(cfg.provider.kind);
    let stores = match cfg.storage.backend {
        StorageBackend::Memory => {
            let store = Arc::new(InMemoryStore::new(plan));
            Stores {
                leases: store.clone(),
                hierarchy: store,
            }
        }
        StorageBackend::Postgres => {
            let store = Arc::new(
                PostgresStore::connect(&cfg.storage.postgres, plan)
                    .await
                    .context("failed to open PostgreSQL store")?,
            );
            Stores {
                leases: store.clone(),
                hierarchy: store,
            }
        }
    };
    info!(backend = %cfg.storage.backend, "Store opened");
    Ok(stores)
}

/// Seeds the provider's root entity and builds its reconciler.
pub async fn build_reconciler(cfg: &AppConfig, stores: &Stores) -> anyhow::Result<Reconciler> {
    let older_than = cfg.reconciliation.older_than();
    let reconciler = match cfg.provider.kind {
        ProviderKind::CloudFoundry => {
            let api = Arc::new(
                CloudFoundryClient::new(cfg.provider.cloudfoundry.clone())
                    .context("failed to build Cloud Foundry client")?,
            );
            dyve_cloudfoundry::seed_root(stores.hierarchy.as_ref())
                .await
                .context("failed to seed Cloud Foundry root")?;
            dyve_cloudfoundry::reconciler(
                stores.leases.clone(),
                stores.hierarchy.clone(),
                api,
                older_than,
            )
        }
        ProviderKind::GitHub => {
            let gh = &cfg.provider.github;
            let api = Arc::new(GitHubClient::new(gh).context("failed to build GitHub client")?);
            dyve_github::seed_root(stores.hierarchy.as_ref(), &gh.org)
                .await
                .context("failed to seed GitHub root")?;
            dyve_github::reconciler(
                stores.leases.clone(),
                stores.hierarchy.clone(),
                api,
                older_than,
            )
        }
    };
    Ok(reconciler)
}

/// Runs the worker pool until `shutdown` resolves, then stops every worker.
pub async fn run<F>(cfg: &AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let stores = open_store(cfg).await?;
    let reconciler = build_reconciler(cfg, &stores).await?;
    info!(
        provider = %cfg.provider.kind,
        scopes = ?reconciler.scopes().map(|s| s.to_string()).collect::<Vec<_>>(),
        older_than_secs = cfg.reconciliation.older_than_secs,
        "Reconciler ready"
    );

    let rc = &cfg.reconciliation;
    let handle = Scheduler::new(Arc::new(reconciler))
        .with_startup_jitter(rc.startup_jitter())
        .start(rc.workers, rc.poll_interval());

    shutdown.await;
    info!("Shutdown requested, stopping workers");
    handle.shutdown().await;
    Ok(())
}
