//! Wiring of the Cloud Foundry cascades into a reconciler.

use std::sync::Arc;
use std::time::Duration;

use dyve_core::{
    Cascade, Entity, HierarchyStore, LeasePlan, LeaseStore, Reconciler, ScopeTag, StoreError,
};
use tracing::info;

use crate::client::CloudFoundryApi;
use crate::model::{FOUNDATION, ORG, ROOT_GUID, SPACE};
use crate::upstream::{Apps, Organizations, Spaces};

/// Refresh the organizations of a foundation.
pub const ORGANIZATIONS: ScopeTag = ScopeTag::from_static("organizations");
/// Refresh the spaces of an organization.
pub const SPACES: ScopeTag = ScopeTag::from_static("spaces");
/// Refresh the apps of a space.
pub const APPS: ScopeTag = ScopeTag::from_static("apps");

/// Leased collections, highest priority first.
pub fn lease_plan() -> LeasePlan {
    LeasePlan::new()
        .then(FOUNDATION, ORGANIZATIONS)
        .then(ORG, SPACES)
        .then(SPACE, APPS)
}

/// The never-reconciled foundation root every hierarchy starts from.
pub fn root_entity() -> Entity {
    Entity::root(FOUNDATION, ROOT_GUID, serde_json::json!({ "guid": ROOT_GUID }))
}

/// Inserts the foundation root unless it already exists.
pub async fn seed_root(store: &dyn HierarchyStore) -> Result<(), StoreError> {
    store.ensure_root(root_entity()).await?;
    info!(kind = %FOUNDATION, id = ROOT_GUID, "Cloud Foundry root seeded");
    Ok(())
}

/// Builds a reconciler handling all three Cloud Foundry scopes.
pub fn reconciler<A: CloudFoundryApi>(
    leases: Arc<dyn LeaseStore>,
    store: Arc<dyn HierarchyStore>,
    api: Arc<A>,
    older_than: Duration,
) -> Reconciler {
    let orgs = Arc::new(Organizations::new(api.clone()));
    let spaces = Arc::new(Spaces::new(api.clone()));
    let apps = Arc::new(Apps::new(api));

    Reconciler::builder(leases, older_than)
        .handler(ORGANIZATIONS, Cascade::new(ORGANIZATIONS, orgs, store.clone()))
        .handler(SPACES, Cascade::new(SPACES, spaces, store.clone()))
        .handler(APPS, Cascade::new(APPS, apps, store))
        .build()
}
