use std::sync::Arc;

use async_trait::async_trait;
use dyve_core::{UpstreamError, UpstreamSource};
use tracing::debug;

use crate::client::GitHubApi;
use crate::model::{OrgInfo, TeamInfo};

/// Teams of an organization, each with its current members.
///
/// A missing organization is reported as not found. A team vanishing
/// between the team listing and its member listing is transient; the next
/// pass sees a consistent listing.
pub struct Teams<A> {
    api: Arc<A>,
}

impl<A> Teams<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<A: GitHubApi> UpstreamSource for Teams<A> {
    type Parent = OrgInfo;
    type Child = TeamInfo;

    async fn list_children(&self, org: &str) -> Result<Vec<TeamInfo>, UpstreamError> {
        let mut teams = self.api.list_teams(org).await?;
        for team in &mut teams {
            team.members = self
                .api
                .list_members(org, &team.slug)
                .await
                .map_err(|e| UpstreamError::transient(e.to_string()))?;
            debug!(org, team = %team.slug, members = team.members.len(), "Team members fetched");
        }
        Ok(teams)
    }
}
