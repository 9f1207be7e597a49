//! Reconciliation operations and their outcomes

use crate::error::ReconcileError;
use crate::state::{DeclaredState, Identifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operation requested by the schema layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Operation::Create),
            "read" => Ok(Operation::Read),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(ReconcileError::validation(format!("unknown operation: {other}"))),
        }
    }
}

/// Where one entity sits while a reconciliation call drives it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Absent,
    Creating,
    Restoring,
    Stabilizing,
    Updating,
    Deleting,
    Ready,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecyclePhase::Absent => write!(f, "absent"),
            LifecyclePhase::Creating => write!(f, "creating"),
            LifecyclePhase::Restoring => write!(f, "restoring"),
            LifecyclePhase::Stabilizing => write!(f, "stabilizing"),
            LifecyclePhase::Updating => write!(f, "updating"),
            LifecyclePhase::Deleting => write!(f, "deleting"),
            LifecyclePhase::Ready => write!(f, "ready"),
        }
    }
}

/// Result of one `reconcile` call.
///
/// The identifier is reported even when `error` is set: a create whose
/// stabilization timed out still names the entity it created.
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// Snapshot the caller should persist
    pub state: DeclaredState,

    /// `None` means the entity is not (or no longer) known remotely
    pub identifier: Option<Identifier>,

    /// Phase the entity ended in
    pub phase: LifecyclePhase,

    pub error: Option<ReconcileError>,

    pub finished_at: DateTime<Utc>,
}

impl ReconcileOutcome {
    pub fn ready(state: DeclaredState, identifier: Identifier) -> Self {
        Self {
            state,
            identifier: Some(identifier),
            phase: LifecyclePhase::Ready,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn absent(state: DeclaredState) -> Self {
        Self {
            state,
            identifier: None,
            phase: LifecyclePhase::Absent,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(
        state: DeclaredState,
        identifier: Option<Identifier>,
        phase: LifecyclePhase,
        error: ReconcileError,
    ) -> Self {
        Self {
            state,
            identifier,
            phase,
            error: Some(error),
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Collapse into a `Result`, dropping the preserved identifier on error
    pub fn into_result(self) -> crate::error::Result<(DeclaredState, Option<Identifier>)> {
        match self.error {
            Some(error) => Err(error),
            None => Ok((self.state, self.identifier)),
        }
    }
}
