//! Cloud Controller v3 client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::config::CloudFoundryConfig;
use crate::error::ApiError;
use crate::model::{AppInfo, FoundationInfo, OrgInfo, ROOT_GUID, SpaceInfo};

/// Tokens are refreshed this long before UAA says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Read access to the Cloud Foundry hierarchy.
#[async_trait]
pub trait CloudFoundryApi: Send + Sync + 'static {
    async fn list_orgs(&self) -> Result<Vec<OrgInfo>, ApiError>;
    async fn get_org(&self, guid: &str) -> Result<OrgInfo, ApiError>;
    async fn list_spaces(&self, org_guid: &str) -> Result<Vec<SpaceInfo>, ApiError>;
    async fn get_space(&self, guid: &str) -> Result<SpaceInfo, ApiError>;
    async fn list_apps(&self, space_guid: &str) -> Result<Vec<AppInfo>, ApiError>;
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    pagination: Pagination,
    resources: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next: Option<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Deserialize)]
struct Resource {
    guid: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RootInfo {
    links: RootLinks,
}

#[derive(Debug, Deserialize)]
struct RootLinks {
    login: Option<Link>,
    uaa: Option<Link>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// HTTP client for the Cloud Controller v3 API, authenticated with a UAA
/// password grant for the `cf` client.
pub struct CloudFoundryClient {
    http: reqwest::Client,
    base_url: String,
    config: CloudFoundryConfig,
    token: RwLock<Option<CachedToken>>,
}

impl CloudFoundryClient {
    pub fn new(config: CloudFoundryConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|source| ApiError::Http {
                url: config.api.clone(),
                source,
            })?;

        Ok(Self {
            http,
            base_url: config.api.trim_end_matches('/').to_string(),
            config,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn token_endpoint(&self) -> Result<String, ApiError> {
        if let Some(url) = &self.config.token_url {
            return Ok(url.clone());
        }

        let url = self.url("/");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ApiError::Http {
                url: url.clone(),
                source,
            })?;
        let root: RootInfo = decode(&url, response).await?;
        let login = root.links.login.or(root.links.uaa).ok_or_else(|| ApiError::Decode {
            url: url.clone(),
            message: "no login or uaa link advertised".into(),
        })?;

        Ok(format!("{}/oauth/token", login.href.trim_end_matches('/')))
    }

    /// Returns a cached access token, fetching a new one when it is close to expiry.
    async fn access_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.token.read().await.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.access_token.clone());
        }

        let mut guard = self.token.write().await;
        if let Some(token) = guard.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.access_token.clone());
        }

        let url = self.token_endpoint().await?;
        let response = self
            .http
            .post(&url)
            .basic_auth("cf", Some(""))
            .form(&[
                ("grant_type", "password"),
                ("username", self.config.user.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .await
            .map_err(|source| ApiError::Http {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(ApiError::Auth {
                message: format!("token endpoint returned HTTP {}", response.status().as_u16()),
            });
        }

        let token: TokenResponse = decode(&url, response).await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        debug!(expires_in = token.expires_in, "Obtained UAA access token");

        *guard = Some(CachedToken {
            access_token: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|source| ApiError::Http {
                url: url.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ApiError::NotFound {
                url: url.to_string(),
            }),
            StatusCode::UNAUTHORIZED => {
                // Force a fresh token on the next call.
                self.token.write().await.take();
                Err(ApiError::Auth {
                    message: format!("{url} rejected the access token"),
                })
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(ApiError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                })
            }
            _ => decode(url, response).await,
        }
    }

    /// Fetches every page of a list endpoint, following `pagination.next`.
    #[instrument(skip(self, filter))]
    async fn list_all(&self, path: &str, filter: Option<(&str, &str)>) -> Result<Vec<Resource>, ApiError> {
        let mut query = vec![
            ("page", "1".to_string()),
            ("per_page", self.config.page_size.to_string()),
        ];
        if let Some((key, value)) = filter {
            query.push((key, value.to_string()));
        }

        let mut url = self.url(path);
        let mut resources = Vec::new();
        loop {
            let page: Page<Resource> = self.get_json(&url, &query).await?;
            resources.extend(page.resources);
            match page.pagination.next {
                Some(next) => {
                    // The next link already carries the full query.
                    url = next.href;
                    query.clear();
                }
                None => break,
            }
        }

        debug!(path, count = resources.len(), "Listed resources");
        Ok(resources)
    }
}

async fn decode<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> Result<T, ApiError> {
    response.json().await.map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl CloudFoundryApi for CloudFoundryClient {
    async fn list_orgs(&self) -> Result<Vec<OrgInfo>, ApiError> {
        let orgs = self.list_all("/v3/organizations", None).await?;
        Ok(orgs
            .into_iter()
            .map(|r| OrgInfo {
                guid: r.guid,
                name: r.name,
                foundation: FoundationInfo {
                    guid: ROOT_GUID.to_string(),
                },
            })
            .collect())
    }

    async fn get_org(&self, guid: &str) -> Result<OrgInfo, ApiError> {
        let url = self.url(&format!("/v3/organizations/{guid}"));
        let r: Resource = self.get_json(&url, &[]).await?;
        Ok(OrgInfo {
            guid: r.guid,
            name: r.name,
            foundation: FoundationInfo {
                guid: ROOT_GUID.to_string(),
            },
        })
    }

    async fn list_spaces(&self, org_guid: &str) -> Result<Vec<SpaceInfo>, ApiError> {
        let spaces = self
            .list_all("/v3/spaces", Some(("organization_guids", org_guid)))
            .await?;
        Ok(spaces
            .into_iter()
            .map(|r| SpaceInfo {
                guid: r.guid,
                name: r.name,
                org: OrgInfo {
                    guid: org_guid.to_string(),
                    ..Default::default()
                },
            })
            .collect())
    }

    async fn get_space(&self, guid: &str) -> Result<SpaceInfo, ApiError> {
        let url = self.url(&format!("/v3/spaces/{guid}"));
        let r: Resource = self.get_json(&url, &[]).await?;
        Ok(SpaceInfo {
            guid: r.guid,
            name: r.name,
            org: OrgInfo::default(),
        })
    }

    async fn list_apps(&self, space_guid: &str) -> Result<Vec<AppInfo>, ApiError> {
        let apps = self
            .list_all("/v3/apps", Some(("space_guids", space_guid)))
            .await?;
        Ok(apps
            .into_iter()
            .map(|r| AppInfo {
                guid: r.guid,
                name: r.name,
                space: SpaceInfo {
                    guid: space_guid.to_string(),
                    ..Default::default()
                },
            })
            .collect())
    }
}
