//! Type adapter contract
//!
//! One adapter per managed entity kind converts between the declared-state
//! representation and the remote record. Adapters are pure: anything
//! ambient (environment-provided defaults) arrives through [`EncodeContext`].

pub mod audit_stream;
pub mod feed;
pub mod feed_permission;
pub mod group_entitlement;

use crate::error::{ReconcileError, Result};
use crate::model::{EntityKind, RemoteEntity};
use crate::poll::StatusSets;
use crate::state::{DeclaredState, EntityKey, Identifier, LifecycleStatus};
use std::collections::BTreeMap;

pub use audit_stream::AuditStreamAdapter;
pub use feed::FeedAdapter;
pub use feed_permission::{FeedPermissionAdapter, GrantRequest};
pub use group_entitlement::GroupEntitlementAdapter;

/// Encode/decode pair for one entity kind
pub trait TypeAdapter: Send + Sync {
    type Remote: Clone
        + Send
        + Sync
        + std::fmt::Debug
        + Into<RemoteEntity>
        + TryFrom<RemoteEntity, Error = ReconcileError>;

    fn kind(&self) -> EntityKind;

    /// Declared fields this adapter reads or produces
    fn managed_fields(&self) -> &'static [&'static str];

    /// Remote record -> canonical declared fields
    fn decode(&self, remote: &Self::Remote) -> DeclaredState;

    /// Declared fields -> remote record; fields the adapter does not manage
    /// are left at their defaults
    fn encode(&self, declared: &DeclaredState, ctx: &EncodeContext) -> Result<Self::Remote>;

    fn identifier(&self, remote: &Self::Remote) -> Option<Identifier>;

    /// Address of an entity that already has an identifier
    fn key(&self, declared: &DeclaredState, id: &Identifier) -> EntityKey;

    /// Address derivable before an identifier exists
    fn natural_key(&self, _declared: &DeclaredState) -> Result<Option<EntityKey>> {
        Ok(None)
    }

    /// Whether create first looks for a soft-deleted entity under the
    /// natural key and restores it
    fn supports_restore(&self) -> bool {
        false
    }

    /// Record whether create restored a soft-deleted entity
    fn mark_restored(&self, _state: &mut DeclaredState, _restored: bool) {}

    /// Snapshot to persist after a successful call: observed values win,
    /// local-only and write-only fields are carried over from `declared`
    fn carry_over(&self, declared: &DeclaredState, observed: DeclaredState) -> DeclaredState {
        declared.overlay(observed)
    }

    /// Asynchronous provisioning status, for kinds that have one
    fn status(&self, _remote: &Self::Remote) -> Option<LifecycleStatus> {
        None
    }

    fn desired_status(&self, _declared: &DeclaredState) -> Option<LifecycleStatus> {
        None
    }

    /// Pending/target sets when create and update complete asynchronously
    fn stabilization(&self) -> Option<StatusSets> {
        None
    }

    /// Whether delete should be followed by a permanent purge
    fn purge_requested(&self, _declared: &DeclaredState) -> bool {
        false
    }

    /// (field, environment variable) pairs the caller may use as defaults
    fn env_defaults(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }
}

/// Ambient inputs to `encode`, gathered by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeContext {
    defaults: BTreeMap<String, String>,
}

impl EncodeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(field.into(), value.into());
        self
    }

    /// Capture `(field, env var)` defaults from the process environment
    pub fn from_env(pairs: &[(&str, &str)]) -> Self {
        let defaults = pairs
            .iter()
            .filter_map(|(field, var)| {
                std::env::var(var)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (field.to_string(), v))
            })
            .collect();
        Self { defaults }
    }

    pub fn default_for(&self, field: &str) -> Option<&str> {
        self.defaults.get(field).map(String::as_str)
    }

    /// Declared value, falling back to the ambient default
    pub fn resolve<'a>(&'a self, declared: &'a DeclaredState, field: &str) -> Option<&'a str> {
        declared.str(field).or_else(|| self.default_for(field))
    }
}

// ============ Field validation helpers ============

pub(crate) fn require_str<'a>(declared: &'a DeclaredState, field: &str) -> Result<&'a str> {
    match declared.str(field) {
        Some(value) => not_blank(field, value),
        None => Err(ReconcileError::validation(format!("{field} is required"))),
    }
}

pub(crate) fn not_blank<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        Err(ReconcileError::validation(format!("{field} must not be blank")))
    } else {
        Ok(value)
    }
}

pub(crate) fn optional_str<'a>(
    declared: &'a DeclaredState,
    field: &str,
) -> Result<Option<&'a str>> {
    declared
        .str(field)
        .map(|value| not_blank(field, value))
        .transpose()
}

pub(crate) fn optional_uuid(declared: &DeclaredState, field: &str) -> Result<Option<String>> {
    declared
        .str(field)
        .map(|value| require_uuid(field, value))
        .transpose()
}

pub(crate) fn require_uuid(field: &str, value: &str) -> Result<String> {
    uuid::Uuid::parse_str(value)
        .map(|id| id.to_string())
        .map_err(|_| ReconcileError::validation(format!("{field} must be a UUID, got {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_require_str() {
        let state = DeclaredState::new().with("name", "  ").with("ok", "x");
        assert!(require_str(&state, "name").is_err());
        assert!(require_str(&state, "missing").is_err());
        assert_eq!(require_str(&state, "ok").unwrap(), "x");
    }

    #[test]
    fn test_optional_uuid() {
        let state = DeclaredState::new()
            .with("good", "6f6a3b7e-0a39-4a0c-9a36-1b0f4a4b2f10")
            .with("bad", "not-a-uuid");
        assert!(optional_uuid(&state, "good").unwrap().is_some());
        assert!(optional_uuid(&state, "missing").unwrap().is_none());
        assert!(optional_uuid(&state, "bad").is_err());
    }

    #[test]
    fn test_context_resolve_prefers_declared() {
        let ctx = EncodeContext::new().with_default("url", "https://default:8088");
        let declared = DeclaredState::new().with("url", "https://declared:8088");
        assert_eq!(ctx.resolve(&declared, "url"), Some("https://declared:8088"));
        assert_eq!(
            ctx.resolve(&DeclaredState::new(), "url"),
            Some("https://default:8088")
        );
    }

    #[test]
    #[serial]
    fn test_context_from_env() {
        temp_env::with_vars(
            [
                ("CONVERGE_TEST_URL", Some("https://env:8088")),
                ("CONVERGE_TEST_EMPTY", Some(" ")),
            ],
            || {
                let ctx = EncodeContext::from_env(&[
                    ("url", "CONVERGE_TEST_URL"),
                    ("token", "CONVERGE_TEST_EMPTY"),
                    ("other", "CONVERGE_TEST_UNSET"),
                ]);
                assert_eq!(ctx.default_for("url"), Some("https://env:8088"));
                assert_eq!(ctx.default_for("token"), None);
                assert_eq!(ctx.default_for("other"), None);
            },
        );
    }
}
