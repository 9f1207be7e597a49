//! Remote failure classification
//!
//! The controller only needs to know whether a failure means "the remote
//! entity is gone" or anything else. The decision is made on the typed
//! status carried by [`GatewayError`]; message text is never inspected.

use crate::error::{GatewayError, ReconcileError};

const HTTP_NOT_FOUND: u16 = 404;

/// Two-way taxonomy used at the engine boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Other,
}

/// Classify a gateway failure by its declared status/condition
pub fn classify(error: &GatewayError) -> ErrorClass {
    match error {
        GatewayError::NotFound(_) => ErrorClass::NotFound,
        GatewayError::Status { status, .. } if *status == HTTP_NOT_FOUND => ErrorClass::NotFound,
        GatewayError::Status { .. }
        | GatewayError::Transport(_)
        | GatewayError::Decode(_)
        | GatewayError::Rejected(_) => ErrorClass::Other,
    }
}

pub fn is_not_found(error: &GatewayError) -> bool {
    classify(error) == ErrorClass::NotFound
}

/// Lift a gateway failure into a fatal reconcile error.
///
/// Not-found keeps its own variant so callers that treat it as fatal
/// (resolve, update, delete) still report it distinctly.
pub fn into_reconcile_error(context: impl Into<String>, error: GatewayError) -> ReconcileError {
    let context = context.into();
    match classify(&error) {
        ErrorClass::NotFound => ReconcileError::NotFound(format!("{context}: {error}")),
        ErrorClass::Other => ReconcileError::remote(context, error),
    }
}
