//! Reconciliation error types

use crate::state::LifecycleStatus;
use thiserror::Error;

/// Failure reported by a [`Gateway`](crate::gateway::Gateway) call.
///
/// Variants carry the remote's declared status or condition so that
/// [`classify`](crate::classify::classify) never has to look at message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Remote returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Remote entity not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response body: {0}")]
    Decode(String),

    /// Request accepted at the HTTP level but the operation it carried failed
    #[error("Remote rejected the operation: {0}")]
    Rejected(String),
}

impl GatewayError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced by one reconciliation invocation
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Invalid declared state: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous reference: {reference} matched {candidates} identities")]
    AmbiguousReference { reference: String, candidates: usize },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timeout after {elapsed_secs}s waiting for {kind} {id} to stabilize (last status: {last_status})")]
    Timeout {
        kind: String,
        id: String,
        elapsed_secs: u64,
        last_status: LifecycleStatus,
    },

    #[error("Unexpected status {status} while waiting for {kind} {id}")]
    UnexpectedStatus {
        kind: String,
        id: String,
        status: LifecycleStatus,
    },

    #[error("{0} requires an identifier")]
    MissingIdentifier(String),

    #[error("Soft delete of {id} succeeded but permanent delete failed: {source}")]
    PurgeFailed {
        id: String,
        #[source]
        source: GatewayError,
    },

    #[error("Remote adapter mismatch: expected {expected}, got {actual}")]
    KindMismatch { expected: String, actual: String },

    #[error("{context}: {source}")]
    Remote {
        context: String,
        #[source]
        source: GatewayError,
    },
}

impl ReconcileError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn remote(context: impl Into<String>, source: GatewayError) -> Self {
        Self::Remote {
            context: context.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
