use dyve_core::UpstreamError;

/// Failures talking to the Cloud Controller or UAA.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} not found")]
    NotFound { url: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("authentication failed: {message}")]
    Auth { message: String },

    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<ApiError> for UpstreamError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound { url } => UpstreamError::not_found(url),
            other => UpstreamError::transient(other.to_string()),
        }
    }
}
