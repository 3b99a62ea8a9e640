//! Shared fixtures: a three-level org → space → app hierarchy and a
//! scripted upstream that records every fetch.
#![allow(dead_code)]

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dyve_core::{
    ChildOf, Entity, EntityKind, EntityRef, HierarchyStore, LeasePlan, Node, ScopeTag,
    UpstreamError, UpstreamSource,
};
use dyve_db_memory::InMemoryStore;
use serde::{Deserialize, Serialize};

pub const ORG: EntityKind = EntityKind::from_static("org");
pub const SPACE: EntityKind = EntityKind::from_static("space");
pub const APP: EntityKind = EntityKind::from_static("app");

pub const SPACES: ScopeTag = ScopeTag::from_static("spaces");
pub const APPS: ScopeTag = ScopeTag::from_static("apps");

pub fn plan() -> LeasePlan {
    LeasePlan::new().then(ORG, SPACES).then(SPACE, APPS)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Org {
    pub guid: String,
}

impl Node for Org {
    const KIND: EntityKind = ORG;
    fn id(&self) -> &str {
        &self.guid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub guid: String,
    pub name: String,
    #[serde(default)]
    pub org: Option<Org>,
}

impl Space {
    pub fn new(guid: &str) -> Self {
        Self {
            guid: guid.to_string(),
            name: format!("space-{guid}"),
            org: None,
        }
    }
}

impl Node for Space {
    const KIND: EntityKind = SPACE;
    fn id(&self) -> &str {
        &self.guid
    }
}

impl ChildOf<Org> for Space {
    fn attach_parent(&mut self, parent: &Org) {
        self.org = Some(parent.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub guid: String,
    #[serde(default)]
    pub space: Option<Space>,
}

impl App {
    pub fn new(guid: &str) -> Self {
        Self {
            guid: guid.to_string(),
            space: None,
        }
    }
}

impl Node for App {
    const KIND: EntityKind = APP;
    fn id(&self) -> &str {
        &self.guid
    }
}

impl ChildOf<Space> for App {
    fn attach_parent(&mut self, parent: &Space) {
        self.space = Some(parent.clone());
    }
}

/// Upstream answering from a per-parent script.
pub struct ScriptedUpstream<P, C> {
    listings: Mutex<HashMap<String, Result<Vec<C>, UpstreamError>>>,
    fetches: AtomicUsize,
    _parent: PhantomData<fn() -> P>,
}

impl<P, C: Clone> ScriptedUpstream<P, C> {
    pub fn new() -> Self {
        Self {
            listings: Mutex::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
            _parent: PhantomData,
        }
    }

    pub fn set(&self, parent_id: &str, listing: Result<Vec<C>, UpstreamError>) {
        self.listings
            .lock()
            .unwrap()
            .insert(parent_id.to_string(), listing);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<P, C> UpstreamSource for ScriptedUpstream<P, C>
where
    P: Node,
    C: ChildOf<P> + Clone,
{
    type Parent = P;
    type Child = C;

    async fn list_children(&self, parent_id: &str) -> Result<Vec<C>, UpstreamError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.listings
            .lock()
            .unwrap()
            .get(parent_id)
            .cloned()
            .unwrap_or_else(|| Err(UpstreamError::not_found(parent_id.to_string())))
    }
}

pub async fn seed_org(store: &InMemoryStore, guid: &str) -> EntityRef {
    let org = Org {
        guid: guid.to_string(),
    };
    store
        .ensure_root(Entity::root(
            ORG,
            guid,
            serde_json::to_value(&org).unwrap(),
        ))
        .await
        .unwrap();
    EntityRef::new(ORG, guid)
}

/// Ids of the stored children of `parent`, in id order.
pub async fn child_ids(store: &InMemoryStore, parent: &EntityRef, kind: &EntityKind) -> Vec<String> {
    store
        .children(parent, kind)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id)
        .collect()
}
