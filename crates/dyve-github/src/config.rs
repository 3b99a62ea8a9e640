use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API root; `https://api.github.com` or a GitHub Enterprise `/api/v3` URL.
    pub api_url: String,

    /// Login of the organization to mirror.
    pub org: String,

    /// Token sent as `Authorization: Bearer`.
    pub token: String,

    pub page_size: u32,
    pub request_timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".into(),
            org: String::new(),
            token: String::new(),
            page_size: 100,
            request_timeout_secs: 30,
        }
    }
}

impl GitHubConfig {
    #[must_use]
    pub fn new(org: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            token: token.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.org.trim().is_empty() {
            return Err("github.org must be set".into());
        }
        if self.token.is_empty() {
            return Err("github.token must be set".into());
        }
        if self.page_size == 0 || self.page_size > 100 {
            return Err("github.page_size must be between 1 and 100".into());
        }
        Ok(())
    }
}
