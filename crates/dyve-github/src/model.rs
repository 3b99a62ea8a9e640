//! Snapshots of a GitHub organization and its teams.

use dyve_core::{ChildOf, EntityKind, Node};
use serde::{Deserialize, Serialize};

pub const ORG: EntityKind = EntityKind::from_static("gh_org");
pub const TEAM: EntityKind = EntityKind::from_static("gh_team");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgInfo {
    pub login: String,
}

/// A team with its members folded in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    /// Numeric team id, as a string.
    pub guid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub org: OrgInfo,
    #[serde(default)]
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Numeric user id, as a string.
    pub guid: String,
    pub name: String,
}

impl Node for OrgInfo {
    const KIND: EntityKind = ORG;
    fn id(&self) -> &str {
        &self.login
    }
}

impl Node for TeamInfo {
    const KIND: EntityKind = TEAM;
    fn id(&self) -> &str {
        &self.guid
    }
}

impl ChildOf<OrgInfo> for TeamInfo {
    fn attach_parent(&mut self, parent: &OrgInfo) {
        self.org = parent.clone();
    }
}
