//! Core data model of the reconciliation engine.
//!
//! Hierarchy nodes are stored as [`Entity`] records keyed by `(kind, id)`.
//! A leased node is handed to the reconciler as a [`Job`] whose
//! [`ScopeTag`] names the downstream work to perform for it.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Label identifying which reconcile handler a leased job is dispatched to.
///
/// The tag describes *downstream* work: leasing an organization yields a
/// job tagged "spaces", meaning "refresh this organization's spaces".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeTag(Cow<'static, str>);

impl ScopeTag {
    /// Creates a tag from a static string, usable in `const` items.
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collection a hierarchy node belongs to (e.g. `cf_org`, `gh_team`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKind(Cow<'static, str>);

impl EntityKind {
    pub const fn from_static(kind: &'static str) -> Self {
        Self(Cow::Borrowed(kind))
    }

    pub fn new(kind: impl Into<String>) -> Self {
        Self(Cow::Owned(kind.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a node in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A reconcilable hierarchy node as persisted by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub id: String,

    /// Link to the owning node; `None` for roots.
    pub parent: Option<EntityRef>,

    /// Public identity snapshot. Children embed their parent's snapshot here.
    pub info: serde_json::Value,

    /// Lease token: the last time this node was handed out for reconciliation.
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub last_reconciled: Option<OffsetDateTime>,
}

impl Entity {
    /// Creates a root node that has never been reconciled.
    pub fn root(kind: EntityKind, id: impl Into<String>, info: serde_json::Value) -> Self {
        Self {
            kind,
            id: id.into(),
            parent: None,
            info,
            last_reconciled: None,
        }
    }

    pub fn reference(&self) -> EntityRef {
        EntityRef::new(self.kind.clone(), self.id.clone())
    }

    /// Eligibility rule for leasing: never reconciled, or reconciled at
    /// least `older_than` ago (inclusive at the boundary).
    pub fn is_lease_eligible(&self, now: OffsetDateTime, older_than: std::time::Duration) -> bool {
        match self.last_reconciled {
            None => true,
            Some(last) => now - last >= older_than,
        }
    }
}

/// Child snapshot handed to a store for upserting under a known parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRecord {
    pub id: String,
    pub info: serde_json::Value,
}

/// Unit of work produced by a lease.
///
/// `last_reconciled` carries the value *before* the lease stamped the entity,
/// so `None` means this is the entity's first reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub scope: ScopeTag,
    pub entity_id: String,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub last_reconciled: Option<OffsetDateTime>,
}

impl Job {
    pub fn new(scope: ScopeTag, entity_id: impl Into<String>) -> Self {
        Self {
            scope,
            entity_id: entity_id.into(),
            last_reconciled: None,
        }
    }
}

/// Ordered mapping from leased collection to the scope of the job it yields.
///
/// Stores walk the plan front to back, so earlier entries win when several
/// collections have eligible entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeasePlan {
    entries: Vec<(EntityKind, ScopeTag)>,
}

impl LeasePlan {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn then(mut self, kind: EntityKind, scope: ScopeTag) -> Self {
        self.entries.push((kind, scope));
        self
    }

    pub fn entries(&self) -> &[(EntityKind, ScopeTag)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(EntityKind, ScopeTag)> for LeasePlan {
    fn from_iter<I: IntoIterator<Item = (EntityKind, ScopeTag)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
