//! Generic parent → children cascade reconciliation.
//!
//! One [`Cascade`] drives a single hierarchy level: for a leased parent it
//! fetches the upstream child listing and makes the stored children match
//! it exactly. Deeper hierarchies are built from several independently
//! leased cascades, one per level.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{ReconcileError, StoreError, UpstreamError};
use crate::model::{ChildRecord, EntityKind, EntityRef, Job, ScopeTag};
use crate::reconciler::ReconcileHandler;
use crate::store::HierarchyStore;

/// A typed hierarchy node snapshot.
pub trait Node: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection the node is stored in.
    const KIND: EntityKind;

    fn id(&self) -> &str;
}

/// A node that embeds its parent's identity snapshot.
pub trait ChildOf<P: Node>: Node {
    fn attach_parent(&mut self, parent: &P);
}

/// Per-integration capability: list the children of a parent upstream.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    type Parent: Node;
    type Child: ChildOf<Self::Parent>;

    /// Fetch the current children of `parent_id`.
    ///
    /// Must return [`UpstreamError::NotFound`] when the parent itself no
    /// longer exists, and [`UpstreamError::Transient`] for anything else.
    async fn list_children(&self, parent_id: &str) -> Result<Vec<Self::Child>, UpstreamError>;
}

/// What a single cascade pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub upserted: usize,
    pub removed: u64,
    pub parent_deleted: bool,
}

/// Reconciles the children of one hierarchy level.
pub struct Cascade<U> {
    scope: ScopeTag,
    upstream: Arc<U>,
    store: Arc<dyn HierarchyStore>,
}

impl<U: UpstreamSource> Cascade<U> {
    pub fn new(scope: ScopeTag, upstream: Arc<U>, store: Arc<dyn HierarchyStore>) -> Self {
        Self {
            scope,
            upstream,
            store,
        }
    }

    /// Run one pass for the parent named by `job`.
    pub async fn reconcile_parent(&self, job: &Job) -> Result<CascadeReport, ReconcileError> {
        let parent_ref = EntityRef::new(U::Parent::KIND, job.entity_id.clone());
        let persist = |source: StoreError| ReconcileError::Persistence {
            scope: self.scope.clone(),
            entity_id: job.entity_id.clone(),
            source,
        };

        let listing = match self.upstream.list_children(&job.entity_id).await {
            Ok(children) => children,
            Err(UpstreamError::NotFound { resource }) => {
                let removed = self.store.delete_cascade(&parent_ref).await.map_err(persist)?;
                info!(
                    scope = %self.scope,
                    entity = %parent_ref,
                    resource = %resource,
                    removed,
                    "Parent gone upstream, removed stored subtree"
                );
                return Ok(CascadeReport {
                    removed,
                    parent_deleted: true,
                    ..Default::default()
                });
            }
            Err(source) => {
                return Err(ReconcileError::Fetch {
                    scope: self.scope.clone(),
                    entity_id: job.entity_id.clone(),
                    source,
                });
            }
        };

        let Some(stored) = self.store.get(&parent_ref).await.map_err(persist)? else {
            debug!(entity = %parent_ref, "Parent no longer stored, skipping");
            return Ok(CascadeReport::default());
        };
        let parent: U::Parent =
            serde_json::from_value(stored.info).map_err(|e| persist(e.into()))?;

        let mut keep_ids = Vec::with_capacity(listing.len());
        let mut records = Vec::with_capacity(listing.len());
        for mut child in listing {
            child.attach_parent(&parent);
            let id = child.id().to_string();
            let info = serde_json::to_value(&child).map_err(|e| persist(e.into()))?;
            keep_ids.push(id.clone());
            records.push(ChildRecord { id, info });
        }

        let upserted = records.len();
        let child_kind = U::Child::KIND;
        self.store
            .upsert_children(&parent_ref, &child_kind, records)
            .await
            .map_err(persist)?;
        let removed = self
            .store
            .delete_stale_children(&parent_ref, &child_kind, &keep_ids)
            .await
            .map_err(persist)?;

        debug!(
            scope = %self.scope,
            entity = %parent_ref,
            upserted,
            removed,
            "Children reconciled"
        );

        Ok(CascadeReport {
            upserted,
            removed,
            parent_deleted: false,
        })
    }
}

#[async_trait]
impl<U: UpstreamSource + 'static> ReconcileHandler for Cascade<U> {
    async fn reconcile(&self, job: &Job) -> Result<(), ReconcileError> {
        self.reconcile_parent(job).await.map(|_| ())
    }
}
