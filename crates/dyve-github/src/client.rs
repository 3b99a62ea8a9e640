//! GitHub REST client for teams and memberships.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, LINK};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::GitHubConfig;
use crate::error::ApiError;
use crate::model::{Member, OrgInfo, TeamInfo};

const USER_AGENT: &str = concat!("dyve-provider/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait GitHubApi: Send + Sync + 'static {
    /// Teams of `org`, without members.
    async fn list_teams(&self, org: &str) -> Result<Vec<TeamInfo>, ApiError>;
    async fn list_members(&self, org: &str, team_slug: &str) -> Result<Vec<Member>, ApiError>;
}

#[derive(Debug, Deserialize)]
struct TeamResource {
    id: u64,
    name: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
struct UserResource {
    id: u64,
    login: String,
    #[serde(default)]
    name: Option<String>,
}

pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    page_size: u32,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|source| ApiError::Http {
                url: config.api_url.clone(),
                source,
            })?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            page_size: config.page_size,
        })
    }

    /// Fetches every page of `path`, advancing while the `Link` header
    /// advertises a `next` relation.
    async fn list_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let response = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .header(ACCEPT, "application/vnd.github+json")
                .query(&[("per_page", self.page_size), ("page", page)])
                .send()
                .await
                .map_err(|source| ApiError::Http {
                    url: url.clone(),
                    source,
                })?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(ApiError::NotFound { url });
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::Status {
                    url,
                    status: status.as_u16(),
                    body,
                });
            }

            let more = has_next_page(response.headers());
            let batch: Vec<T> = response.json().await.map_err(|e| ApiError::Decode {
                url: url.clone(),
                message: e.to_string(),
            })?;
            let fetched = batch.len();
            items.extend(batch);

            if !more || fetched == 0 {
                break;
            }
            page += 1;
        }

        debug!(path, count = items.len(), "Listed GitHub resources");
        Ok(items)
    }
}

fn has_next_page(headers: &HeaderMap) -> bool {
    headers
        .get(LINK)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|link| link.split(',').any(|part| part.contains("rel=\"next\"")))
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn list_teams(&self, org: &str) -> Result<Vec<TeamInfo>, ApiError> {
        let teams: Vec<TeamResource> = self.list_all(&format!("/orgs/{org}/teams")).await?;
        Ok(teams
            .into_iter()
            .map(|t| TeamInfo {
                guid: t.id.to_string(),
                name: t.name,
                slug: t.slug,
                org: OrgInfo {
                    login: org.to_string(),
                },
                members: Vec::new(),
            })
            .collect())
    }

    async fn list_members(&self, org: &str, team_slug: &str) -> Result<Vec<Member>, ApiError> {
        let users: Vec<UserResource> = self
            .list_all(&format!("/orgs/{org}/teams/{team_slug}/members"))
            .await?;
        Ok(users
            .into_iter()
            .map(|u| Member {
                guid: u.id.to_string(),
                name: u.name.filter(|n| !n.is_empty()).unwrap_or(u.login),
            })
            .collect())
    }
}
