// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for distribution reconciliation
//!
//! Two layers: [`RemoteError`] is what a single call against the control
//! plane can fail with; [`ReconcileError`] is what a reconciler operation
//! reports to its caller after internal retries have been applied.

use std::time::Duration;

use thiserror::Error;

use crate::domain::{DistributionId, DistributionStatus};
use crate::state_machine::TransitionError;

/// Failure of one remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The distribution does not exist
    #[error("Distribution not found: {0}")]
    NotFound(String),

    /// The If-Match token does not name the current revision
    #[error("Version conflict: {0}")]
    VersionConflict(String),

    /// A precondition of the mutation (usually the ETag) failed
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The distribution is enabled or still deploying
    #[error("Resource busy: {0}")]
    ResourceBusy(String),

    /// The referenced certificate is not visible to the remote yet
    #[error("Invalid viewer certificate: {0}")]
    InvalidViewerCertificate(String),

    /// Throttling or a server-side failure
    #[error("Transient remote error: {0}")]
    Transient(String),

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Any other rejection by the remote API
    #[error("Remote API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    /// Stale version token, resolved by re-reading and retrying
    pub fn is_version_conflict(&self) -> bool {
        matches!(
            self,
            RemoteError::VersionConflict(_) | RemoteError::PreconditionFailed(_)
        )
    }

    pub fn is_resource_busy(&self) -> bool {
        matches!(self, RemoteError::ResourceBusy(_))
    }

    pub fn is_invalid_certificate(&self) -> bool {
        matches!(self, RemoteError::InvalidViewerCertificate(_))
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Transient(format!("request timed out: {}", err))
        } else if err.is_decode() {
            RemoteError::Api {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                code: "MalformedResponse".to_string(),
                message: err.to_string(),
            }
        } else {
            RemoteError::Transport(err.to_string())
        }
    }
}

/// Errors reported by reconciler operations
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The distribution does not exist
    #[error("Distribution {id} not found")]
    NotFound { id: DistributionId },

    /// Version conflicts persisted for the whole retry budget
    #[error("{operation} of distribution {id} still conflicting after {attempts} attempts in {elapsed:?}: {last}")]
    RetryExhausted {
        id: DistributionId,
        operation: &'static str,
        attempts: u32,
        elapsed: Duration,
        last: RemoteError,
    },

    /// The distribution did not reach `Deployed` in time
    #[error("Timed out after {waited:?} waiting for distribution {id} to deploy (last status {last_status})")]
    DeploymentTimeout {
        id: DistributionId,
        last_status: DistributionStatus,
        waited: Duration,
    },

    /// The distribution was still readable when the deletion wait ran out
    #[error("Timed out after {waited:?} waiting for distribution {id} to disappear")]
    DeletionTimeout { id: DistributionId, waited: Duration },

    /// The caller cancelled the operation
    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },

    /// A remote failure that is not retried
    #[error("{operation} of distribution {id} failed: {source}")]
    Remote {
        operation: &'static str,
        id: String,
        #[source]
        source: RemoteError,
    },

    /// The operation needs an id but none is tracked
    #[error("{operation} requires a tracked distribution id")]
    Untracked { operation: &'static str },

    /// The lifecycle or delete protocol rejected a transition
    #[error("Protocol error: {0}")]
    Protocol(#[from] TransitionError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for reconciler operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

impl ReconcileError {
    /// Classify a remote failure for `operation` on `id`
    ///
    /// `NotFound` is lifted into [`ReconcileError::NotFound`] so that callers
    /// can treat it uniformly; everything else is wrapped unchanged.
    pub fn remote(operation: &'static str, id: &DistributionId, source: RemoteError) -> Self {
        if source.is_not_found() {
            ReconcileError::NotFound { id: id.clone() }
        } else {
            ReconcileError::Remote {
                operation,
                id: id.to_string(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::NotFound { .. })
    }

    /// The remote refused because the resource is not disabled
    pub fn is_resource_busy(&self) -> bool {
        matches!(
            self,
            ReconcileError::Remote { source, .. } if source.is_resource_busy()
        )
    }

    pub fn is_invalid_certificate(&self) -> bool {
        matches!(
            self,
            ReconcileError::Remote { source, .. } if source.is_invalid_certificate()
        )
    }

    /// Whether the caller may reasonably run the same operation again
    pub fn is_retryable_by_caller(&self) -> bool {
        match self {
            ReconcileError::RetryExhausted { .. }
            | ReconcileError::DeploymentTimeout { .. }
            | ReconcileError::DeletionTimeout { .. }
            | ReconcileError::Cancelled { .. } => true,
            ReconcileError::Remote { source, .. } => {
                matches!(source, RemoteError::Transient(_) | RemoteError::Transport(_))
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        ReconcileError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> DistributionId {
        DistributionId::new("E2QWRUHEXAMPLE")
    }

    #[test]
    fn test_remote_not_found_is_lifted() {
        let err = ReconcileError::remote("update", &id(), RemoteError::NotFound("gone".into()));
        assert!(err.is_not_found());
        assert!(!err.is_retryable_by_caller());
    }

    #[test]
    fn test_busy_is_detected_through_wrapper() {
        let err = ReconcileError::remote(
            "delete",
            &id(),
            RemoteError::ResourceBusy("DistributionNotDisabled".into()),
        );
        assert!(err.is_resource_busy());
        assert!(err.to_string().contains("E2QWRUHEXAMPLE"));
    }

    #[test]
    fn test_version_conflict_classification() {
        assert!(RemoteError::VersionConflict("x".into()).is_version_conflict());
        assert!(RemoteError::PreconditionFailed("x".into()).is_version_conflict());
        assert!(!RemoteError::ResourceBusy("x".into()).is_version_conflict());
    }

    #[test]
    fn test_caller_retryable_errors() {
        let timeout = ReconcileError::DeploymentTimeout {
            id: id(),
            last_status: DistributionStatus::InProgress,
            waited: Duration::from_secs(5400),
        };
        assert!(timeout.is_retryable_by_caller());
        assert!(timeout.to_string().contains("InProgress"));

        let exhausted = ReconcileError::RetryExhausted {
            id: id(),
            operation: "update",
            attempts: 4,
            elapsed: Duration::from_secs(60),
            last: RemoteError::PreconditionFailed("stale".into()),
        };
        assert!(exhausted.is_retryable_by_caller());
        assert!(exhausted.to_string().contains("4 attempts"));

        let fatal = ReconcileError::remote(
            "create",
            &id(),
            RemoteError::Api {
                status: 400,
                code: "InvalidArgument".into(),
                message: "bad origin".into(),
            },
        );
        assert!(!fatal.is_retryable_by_caller());
    }
}
