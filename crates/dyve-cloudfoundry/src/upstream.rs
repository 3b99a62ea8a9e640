//! Per-level upstream listings for the cascade handlers.

use std::sync::Arc;

use async_trait::async_trait;
use dyve_core::{UpstreamError, UpstreamSource};

use crate::client::CloudFoundryApi;
use crate::model::{AppInfo, FoundationInfo, OrgInfo, SpaceInfo};

/// Organizations of the foundation. The foundation itself never disappears,
/// so every failure here is transient.
pub struct Organizations<A> {
    api: Arc<A>,
}

impl<A> Organizations<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<A: CloudFoundryApi> UpstreamSource for Organizations<A> {
    type Parent = FoundationInfo;
    type Child = OrgInfo;

    async fn list_children(&self, _foundation: &str) -> Result<Vec<OrgInfo>, UpstreamError> {
        self.api
            .list_orgs()
            .await
            .map_err(|e| UpstreamError::transient(e.to_string()))
    }
}

/// Spaces of one organization. A missing organization is reported as
/// not found so its subtree is removed.
pub struct Spaces<A> {
    api: Arc<A>,
}

impl<A> Spaces<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<A: CloudFoundryApi> UpstreamSource for Spaces<A> {
    type Parent = OrgInfo;
    type Child = SpaceInfo;

    async fn list_children(&self, org_guid: &str) -> Result<Vec<SpaceInfo>, UpstreamError> {
        self.api.get_org(org_guid).await?;
        self.api
            .list_spaces(org_guid)
            .await
            .map_err(|e| UpstreamError::transient(e.to_string()))
    }
}

/// Apps of one space.
pub struct Apps<A> {
    api: Arc<A>,
}

impl<A> Apps<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<A: CloudFoundryApi> UpstreamSource for Apps<A> {
    type Parent = SpaceInfo;
    type Child = AppInfo;

    async fn list_children(&self, space_guid: &str) -> Result<Vec<AppInfo>, UpstreamError> {
        self.api.get_space(space_guid).await?;
        self.api
            .list_apps(space_guid)
            .await
            .map_err(|e| UpstreamError::transient(e.to_string()))
    }
}
