//! Error taxonomy of the reconciliation engine.

use std::fmt;

use crate::model::{EntityRef, ScopeTag};

/// Errors raised by a store backing leases or the hierarchy.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced entity does not exist in the store.
    #[error("Entity not found: {entity}")]
    NotFound {
        /// The entity that was not found.
        entity: EntityRef,
    },

    /// Failed to reach the storage backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// A stored snapshot could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StoreError {
    #[must_use]
    pub fn not_found(entity: EntityRef) -> Self {
        Self::NotFound { entity }
    }

    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Errors reported by an upstream system of record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// The parent whose children were requested no longer exists upstream.
    #[error("Upstream resource not found: {resource}")]
    NotFound { resource: String },

    /// Any other failure (network, auth, rate limit, malformed payload).
    #[error("Upstream request failed: {message}")]
    Transient { message: String },
}

impl UpstreamError {
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors surfaced by a reconcile run.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Leasing the next job failed.
    #[error("Lease failed: {0}")]
    Lease(#[source] StoreError),

    /// Upstream fetch failed for a reason other than absence.
    #[error("{scope} reconcile failed for '{entity_id}': {source}")]
    Fetch {
        scope: ScopeTag,
        entity_id: String,
        #[source]
        source: UpstreamError,
    },

    /// Writing the reconciled state failed.
    #[error("{scope} reconcile could not persist '{entity_id}': {source}")]
    Persistence {
        scope: ScopeTag,
        entity_id: String,
        #[source]
        source: StoreError,
    },

    /// A handler panicked; the dispatcher recovered.
    #[error("{scope} handler panicked for '{entity_id}': {message}")]
    HandlerPanicked {
        scope: ScopeTag,
        entity_id: String,
        message: String,
    },
}

impl ReconcileError {
    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Lease(_) => ErrorCategory::Lease,
            Self::Fetch { .. } => ErrorCategory::Upstream,
            Self::Persistence { .. } => ErrorCategory::Persistence,
            Self::HandlerPanicked { .. } => ErrorCategory::Panic,
        }
    }
}

/// Categories of reconcile errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Lease,
    Upstream,
    Persistence,
    Panic,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lease => write!(f, "lease"),
            Self::Upstream => write!(f, "upstream"),
            Self::Persistence => write!(f, "persistence"),
            Self::Panic => write!(f, "panic"),
        }
    }
}
