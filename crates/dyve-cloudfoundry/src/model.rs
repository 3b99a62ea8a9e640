//! Identity snapshots of the Cloud Foundry hierarchy.
//!
//! Each level embeds the snapshot of its parent, so an [`AppInfo`] read from
//! the store already knows its space, organization and foundation.

use dyve_core::{ChildOf, EntityKind, Node};
use serde::{Deserialize, Serialize};

pub const FOUNDATION: EntityKind = EntityKind::from_static("cf_foundation");
pub const ORG: EntityKind = EntityKind::from_static("cf_org");
pub const SPACE: EntityKind = EntityKind::from_static("cf_space");
pub const APP: EntityKind = EntityKind::from_static("cf_app");

/// Guid of the single foundation root.
pub const ROOT_GUID: &str = "main";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundationInfo {
    pub guid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgInfo {
    pub guid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub foundation: FoundationInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceInfo {
    pub guid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub org: OrgInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub guid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub space: SpaceInfo,
}

impl Node for FoundationInfo {
    const KIND: EntityKind = FOUNDATION;
    fn id(&self) -> &str {
        &self.guid
    }
}

impl Node for OrgInfo {
    const KIND: EntityKind = ORG;
    fn id(&self) -> &str {
        &self.guid
    }
}

impl Node for SpaceInfo {
    const KIND: EntityKind = SPACE;
    fn id(&self) -> &str {
        &self.guid
    }
}

impl Node for AppInfo {
    const KIND: EntityKind = APP;
    fn id(&self) -> &str {
        &self.guid
    }
}

impl ChildOf<FoundationInfo> for OrgInfo {
    fn attach_parent(&mut self, parent: &FoundationInfo) {
        self.foundation = parent.clone();
    }
}

impl ChildOf<OrgInfo> for SpaceInfo {
    fn attach_parent(&mut self, parent: &OrgInfo) {
        self.org = parent.clone();
    }
}

impl ChildOf<SpaceInfo> for AppInfo {
    fn attach_parent(&mut self, parent: &SpaceInfo) {
        self.space = parent.clone();
    }
}
