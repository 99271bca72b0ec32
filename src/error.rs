//! Error types for the sync pipeline
//!
//! Every failure surfaces to the caller of [`crate::SourceSync::sync`] as a
//! [`SyncError`]. Transport failures keep the HTTP status and the structured
//! report sent back by Bitbucket so callers can decide what to show.

use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Error returned by a [`crate::bitbucket::BitbucketApi`] call
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status code, if the remote answered at all
    pub status: Option<u16>,
    pub message: String,
    /// Structured diagnostics sent back by the remote
    pub report: Option<Value>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            report: None,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(message)
        }
    }

    pub fn with_report(mut self, report: Value) -> Self {
        self.report = Some(report);
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid repository: {0}")]
    InvalidRepository(String),

    #[error("Repository not found: {owner}/{name}")]
    RepositoryNotFound { owner: String, name: String },

    #[error("Bitbucket request failed: {0}")]
    Api(#[from] ApiError),

    #[error("Error downloading '{path}': {source}")]
    Download {
        path: String,
        #[source]
        source: ApiError,
    },
}

impl SyncError {
    /// Structured report attached to the underlying transport error, if any
    pub fn report(&self) -> Option<&Value> {
        match self {
            SyncError::Api(err) | SyncError::Download { source: err, .. } => err.report.as_ref(),
            _ => None,
        }
    }
}
