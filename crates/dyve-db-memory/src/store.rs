use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dyve_core::{
    ChildRecord, Clock, Entity, EntityKind, EntityRef, HierarchyStore, Job, LeasePlan, LeaseStore,
    StoreError, SystemClock,
};
use tokio::sync::RwLock;
use tracing::trace;

/// Entities are keyed by `(kind, id)`; ids are only unique within a kind.
pub type StoreKey = (EntityKind, String);

fn key_of(entity: &EntityRef) -> StoreKey {
    (entity.kind.clone(), entity.id.clone())
}

/// In-memory lease and hierarchy store.
///
/// Every operation takes the single lock over the entity map, so lease
/// selection and stamping are trivially atomic with respect to each other
/// and to hierarchy writes.
pub struct InMemoryStore {
    entities: RwLock<BTreeMap<StoreKey, Entity>>,
    plan: LeasePlan,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    /// Creates an empty store leasing according to `plan`, using wall time.
    pub fn new(plan: LeasePlan) -> Self {
        Self::with_clock(plan, Arc::new(SystemClock))
    }

    pub fn with_clock(plan: LeasePlan, clock: Arc<dyn Clock>) -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
            plan,
            clock,
        }
    }

    /// Copy of every stored entity, ordered by `(kind, id)`.
    pub async fn snapshot(&self) -> Vec<Entity> {
        self.entities.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }

    /// Insert or overwrite an entity as given, including its lease stamp.
    pub async fn put(&self, entity: Entity) {
        let mut guard = self.entities.write().await;
        guard.insert(key_of(&entity.reference()), entity);
    }
}

/// Oldest eligible entity of `kind`; never-reconciled entities sort first.
fn pick_eligible<'a>(
    entities: &'a BTreeMap<StoreKey, Entity>,
    kind: &EntityKind,
    now: time::OffsetDateTime,
    older_than: Duration,
) -> Option<&'a StoreKey> {
    entities
        .iter()
        .filter(|((k, _), e)| k == kind && e.is_lease_eligible(now, older_than))
        .min_by(|(ka, a), (kb, b)| {
            a.last_reconciled
                .cmp(&b.last_reconciled)
                .then_with(|| ka.cmp(kb))
        })
        .map(|(key, _)| key)
}

/// Keys of `root` and everything below it, parents before children.
fn collect_subtree(entities: &BTreeMap<StoreKey, Entity>, root: &EntityRef) -> Vec<StoreKey> {
    let mut found = Vec::new();
    if !entities.contains_key(&key_of(root)) {
        return found;
    }

    let mut frontier = vec![root.clone()];
    found.push(key_of(root));
    while let Some(parent) = frontier.pop() {
        for (key, entity) in entities {
            if entity.parent.as_ref() == Some(&parent) {
                found.push(key.clone());
                frontier.push(entity.reference());
            }
        }
    }
    found
}

fn remove_all(entities: &mut BTreeMap<StoreKey, Entity>, keys: &[StoreKey]) -> u64 {
    keys.iter()
        .filter(|key| entities.remove(*key).is_some())
        .count() as u64
}

#[async_trait]
impl LeaseStore for InMemoryStore {
    async fn accept_reconcile_job(&self, older_than: Duration) -> Result<Option<Job>, StoreError> {
        let mut guard = self.entities.write().await;
        let now = self.clock.now();

        for (kind, scope) in self.plan.entries() {
            let Some(key) = pick_eligible(&guard, kind, now, older_than).cloned() else {
                continue;
            };
            let Some(entity) = guard.get_mut(&key) else {
                continue;
            };

            let previous = entity.last_reconciled.replace(now);
            trace!(entity = %entity.reference(), scope = %scope, "lease granted");
            return Ok(Some(Job {
                scope: scope.clone(),
                entity_id: entity.id.clone(),
                last_reconciled: previous,
            }));
        }

        Ok(None)
    }
}

#[async_trait]
impl HierarchyStore for InMemoryStore {
    async fn ensure_root(&self, entity: Entity) -> Result<(), StoreError> {
        let mut guard = self.entities.write().await;
        guard.entry(key_of(&entity.reference())).or_insert(entity);
        Ok(())
    }

    async fn get(&self, entity: &EntityRef) -> Result<Option<Entity>, StoreError> {
        Ok(self.entities.read().await.get(&key_of(entity)).cloned())
    }

    async fn list(&self, kind: &EntityKind) -> Result<Vec<Entity>, StoreError> {
        let guard = self.entities.read().await;
        Ok(guard
            .iter()
            .filter(|((k, _), _)| k == kind)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn children(
        &self,
        parent: &EntityRef,
        child_kind: &EntityKind,
    ) -> Result<Vec<Entity>, StoreError> {
        let guard = self.entities.read().await;
        Ok(guard
            .values()
            .filter(|e| &e.kind == child_kind && e.parent.as_ref() == Some(parent))
            .cloned()
            .collect())
    }

    async fn upsert_children(
        &self,
        parent: &EntityRef,
        child_kind: &EntityKind,
        children: Vec<ChildRecord>,
    ) -> Result<(), StoreError> {
        let mut guard = self.entities.write().await;
        for child in children {
            let key = (child_kind.clone(), child.id);
            match guard.get_mut(&key) {
                Some(existing) => {
                    existing.parent = Some(parent.clone());
                    existing.info = child.info;
                }
                None => {
                    let entity = Entity {
                        kind: child_kind.clone(),
                        id: key.1.clone(),
                        parent: Some(parent.clone()),
                        info: child.info,
                        last_reconciled: None,
                    };
                    guard.insert(key, entity);
                }
            }
        }
        Ok(())
    }

    async fn delete_stale_children(
        &self,
        parent: &EntityRef,
        child_kind: &EntityKind,
        keep_ids: &[String],
    ) -> Result<u64, StoreError> {
        let keep: HashSet<&str> = keep_ids.iter().map(String::as_str).collect();
        let mut guard = self.entities.write().await;

        let stale: Vec<EntityRef> = guard
            .values()
            .filter(|e| {
                &e.kind == child_kind
                    && e.parent.as_ref() == Some(parent)
                    && !keep.contains(e.id.as_str())
            })
            .map(Entity::reference)
            .collect();

        let mut removed = 0;
        for child in &stale {
            let keys = collect_subtree(&guard, child);
            removed += remove_all(&mut guard, &keys);
        }
        Ok(removed)
    }

    async fn delete_cascade(&self, entity: &EntityRef) -> Result<u64, StoreError> {
        let mut guard = self.entities.write().await;
        let keys = collect_subtree(&guard, entity);
        Ok(remove_all(&mut guard, &keys))
    }
}
