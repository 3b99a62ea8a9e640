//! Storage contracts consumed by the engine.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{ChildRecord, Entity, EntityKind, EntityRef, Job};

/// Source of reconcile jobs.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Atomically select one eligible entity and stamp its lease.
    ///
    /// An entity is eligible when it was never reconciled or its last
    /// reconcile is at least `older_than` in the past. Selection and stamping
    /// must be a single atomic step so that two concurrent callers can never
    /// receive the same entity within one `older_than` window.
    ///
    /// Returns `Ok(None)` when nothing is eligible.
    async fn accept_reconcile_job(&self, older_than: Duration) -> Result<Option<Job>, StoreError>;
}

/// Persistence of the parent/child tree of reconciled snapshots.
#[async_trait]
pub trait HierarchyStore: Send + Sync {
    /// Insert a root node if it does not exist yet. Never resets the lease stamp.
    async fn ensure_root(&self, entity: Entity) -> Result<(), StoreError>;

    async fn get(&self, entity: &EntityRef) -> Result<Option<Entity>, StoreError>;

    /// All entities of a kind, ordered by id.
    async fn list(&self, kind: &EntityKind) -> Result<Vec<Entity>, StoreError>;

    /// Direct children of `parent` of the given kind, ordered by id.
    async fn children(
        &self,
        parent: &EntityRef,
        child_kind: &EntityKind,
    ) -> Result<Vec<Entity>, StoreError>;

    /// Insert or replace children under `parent`, keeping their lease stamps.
    async fn upsert_children(
        &self,
        parent: &EntityRef,
        child_kind: &EntityKind,
        children: Vec<ChildRecord>,
    ) -> Result<(), StoreError>;

    /// Remove every child of `parent` whose id is not in `keep_ids`, along
    /// with the subtree below it. Returns the number of removed entities.
    async fn delete_stale_children(
        &self,
        parent: &EntityRef,
        child_kind: &EntityKind,
        keep_ids: &[String],
    ) -> Result<u64, StoreError>;

    /// Remove `entity` and every descendant. Returns the number of removed entities.
    async fn delete_cascade(&self, entity: &EntityRef) -> Result<u64, StoreError>;
}
