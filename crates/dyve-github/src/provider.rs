use std::sync::Arc;
use std::time::Duration;

use dyve_core::{
    Cascade, Entity, HierarchyStore, LeasePlan, LeaseStore, Reconciler, ScopeTag, StoreError,
};
use tracing::info;

use crate::client::GitHubApi;
use crate::model::ORG;
use crate::upstream::Teams;

/// Refresh the teams (and their members) of an organization.
pub const TEAMS: ScopeTag = ScopeTag::from_static("teams");

pub fn lease_plan() -> LeasePlan {
    LeasePlan::new().then(ORG, TEAMS)
}

pub fn root_entity(org: &str) -> Entity {
    Entity::root(ORG, org, serde_json::json!({ "login": org }))
}

/// Inserts the configured organization unless it already exists.
pub async fn seed_root(store: &dyn HierarchyStore, org: &str) -> Result<(), StoreError> {
    store.ensure_root(root_entity(org)).await?;
    info!(kind = %ORG, id = org, "GitHub root seeded");
    Ok(())
}

pub fn reconciler<A: GitHubApi>(
    leases: Arc<dyn LeaseStore>,
    store: Arc<dyn HierarchyStore>,
    api: Arc<A>,
    older_than: Duration,
) -> Reconciler {
    let teams = Arc::new(Teams::new(api));
    Reconciler::builder(leases, older_than)
        .handler(TEAMS, Cascade::new(TEAMS, teams, store))
        .build()
}
