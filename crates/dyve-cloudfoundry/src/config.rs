use serde::{Deserialize, Serialize};

/// Connection settings for a Cloud Foundry API endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudFoundryConfig {
    /// Base URL of the Cloud Controller, e.g. `https://api.sys.example.com`.
    pub api: String,

    /// UAA token endpoint. Discovered from the API root when unset.
    pub token_url: Option<String>,

    pub user: String,
    pub password: String,

    /// Page size requested from list endpoints.
    pub page_size: u32,

    pub request_timeout_secs: u64,
}

impl Default for CloudFoundryConfig {
    fn default() -> Self {
        Self {
            api: String::new(),
            token_url: None,
            user: String::new(),
            password: String::new(),
            page_size: 100,
            request_timeout_secs: 30,
        }
    }
}

impl CloudFoundryConfig {
    #[must_use]
    pub fn new(api: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            user: user.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Checks the settings a client cannot work without.
    pub fn validate(&self) -> Result<(), String> {
        if self.api.trim().is_empty() {
            return Err("cloudfoundry.api must be set".into());
        }
        if self.user.is_empty() {
            return Err("cloudfoundry.user must be set".into());
        }
        if self.page_size == 0 {
            return Err("cloudfoundry.page_size must be at least 1".into());
        }
        Ok(())
    }
}
