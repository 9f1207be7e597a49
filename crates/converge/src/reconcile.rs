//! One reconcile invocation: pick the controller for a kind and report

use anyhow::Context;
use chrono::{DateTime, Utc};
use converge_core::{
    AuditStreamAdapter, DeclaredState, EncodeContext, EntityKind, FeedAdapter, Gateway,
    GrantController, GroupEntitlementAdapter, Identifier, LifecycleController, LifecyclePhase,
    Operation, ReconcileConfig, ReconcileOutcome, TypeAdapter,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

pub struct Request {
    pub kind: EntityKind,
    pub operation: Operation,
    pub state: DeclaredState,
    pub identifier: Option<Identifier>,
}

/// Read a declared state JSON object
pub fn load_state(path: &Path) -> anyhow::Result<DeclaredState> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("state file {} must be a JSON object", path.display()))
}

pub async fn run<G: Gateway + 'static>(
    gateway: Arc<G>,
    config: ReconcileConfig,
    request: Request,
) -> ReconcileOutcome {
    let Request {
        kind,
        operation,
        state,
        identifier,
    } = request;

    match kind {
        EntityKind::Feed => {
            lifecycle(gateway, FeedAdapter, config)
                .reconcile(operation, state, identifier)
                .await
        }
        EntityKind::AuditStream => {
            lifecycle(gateway, AuditStreamAdapter, config)
                .reconcile(operation, state, identifier)
                .await
        }
        EntityKind::GroupEntitlement => {
            lifecycle(gateway, GroupEntitlementAdapter, config)
                .reconcile(operation, state, identifier)
                .await
        }
        EntityKind::FeedPermission => {
            GrantController::new(gateway)
                .reconcile(operation, state, identifier)
                .await
        }
    }
}

fn lifecycle<G: Gateway, A: TypeAdapter>(
    gateway: Arc<G>,
    adapter: A,
    config: ReconcileConfig,
) -> LifecycleController<G, A> {
    let ctx = EncodeContext::from_env(adapter.env_defaults());
    LifecycleController::new(gateway, adapter)
        .with_config(config)
        .with_context(ctx)
}

/// JSON printed on stdout for the caller to persist
#[derive(Debug, Serialize)]
pub struct Report {
    pub state: DeclaredState,
    pub identifier: Option<Identifier>,
    pub phase: LifecyclePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl From<&ReconcileOutcome> for Report {
    fn from(outcome: &ReconcileOutcome) -> Self {
        Self {
            state: outcome.state.clone(),
            identifier: outcome.identifier.clone(),
            phase: outcome.phase,
            error: outcome.error.as_ref().map(ToString::to_string),
            finished_at: outcome.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_azdo::{AzdoConfig, AzdoGateway};
    use converge_core::ReconcileError;
    use std::fs;
    use tempfile::TempDir;

    fn offline_gateway() -> Arc<AzdoGateway> {
        let config = AzdoConfig::new("https://dev.azure.com/contoso", "pat").unwrap();
        Arc::new(AzdoGateway::new(config).unwrap())
    }

    #[test]
    fn test_load_state() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        fs::write(&path, r#"{"name": "feedA", "permanent_delete": true}"#).unwrap();

        let state = load_state(&path).unwrap();
        assert_eq!(state.str("name"), Some("feedA"));
        assert_eq!(state.bool("permanent_delete"), Some(true));

        fs::write(&path, "[1, 2]").unwrap();
        assert!(load_state(&path).is_err());
    }

    /// Read without an identifier never reaches the remote
    #[tokio::test]
    async fn test_read_without_identifier_is_absent() {
        for kind in [
            EntityKind::Feed,
            EntityKind::AuditStream,
            EntityKind::GroupEntitlement,
            EntityKind::FeedPermission,
        ] {
            let request = Request {
                kind,
                operation: Operation::Read,
                state: DeclaredState::new().with("name", "x"),
                identifier: None,
            };
            let outcome = run(offline_gateway(), ReconcileConfig::default(), request).await;
            assert!(outcome.is_success(), "{kind}");
            assert_eq!(outcome.phase, LifecyclePhase::Absent);
        }
    }

    #[tokio::test]
    async fn test_update_without_identifier_fails() {
        let request = Request {
            kind: EntityKind::Feed,
            operation: Operation::Update,
            state: DeclaredState::new().with("name", "feedA"),
            identifier: None,
        };
        let outcome = run(offline_gateway(), ReconcileConfig::default(), request).await;
        assert!(matches!(
            outcome.error,
            Some(ReconcileError::MissingIdentifier(_))
        ));
    }

    #[test]
    fn test_report_shape() {
        let outcome = ReconcileOutcome::failed(
            DeclaredState::new().with("name", "feedA"),
            Some(Identifier::new("feed-1")),
            LifecyclePhase::Deleting,
            ReconcileError::validation("boom"),
        );
        let report = serde_json::to_value(Report::from(&outcome)).unwrap();

        assert_eq!(report["identifier"], "feed-1");
        assert_eq!(report["phase"], "deleting");
        assert_eq!(report["state"]["name"], "feedA");
        assert_eq!(report["error"], "Invalid declared state: boom");
    }
}
