mod common;

use common::{Call, ScriptedGateway, not_found};
use converge_core::adapter::{audit_stream, feed, group_entitlement};
use converge_core::model::{
    AccessLevel, AccountLicenseType, GraphGroup, LicensingSource, ProjectReference,
};
use converge_core::{
    AuditStream, AuditStreamAdapter, ChangeRecord, ChangeType, DeclaredState, EntityKey, Feed,
    FeedAdapter, GatewayError, GroupEntitlement, GroupEntitlementAdapter, Identifier,
    LifecycleController, LifecyclePhase, LifecycleStatus, Operation, ReconcileConfig,
    ReconcileError, RemoteEntity,
};
use std::sync::Arc;
use std::time::Duration;

const FEED_ID: &str = "0b0c5a55-4a53-4d7c-9b0f-0f0aa1b5d2f4";
const PROJECT_ID: &str = "2f6c2c5e-9c7a-4d59-a1f4-5b8bb1c0e8a1";
const ENTITLEMENT_ID: &str = "9d1c8a0e-7f5b-4c1e-8a43-6b2f0d9e3c71";

fn feed_state() -> DeclaredState {
    DeclaredState::new()
        .with(feed::NAME, "feedA")
        .with(feed::PROJECT_ID, PROJECT_ID)
}

fn feed_remote() -> RemoteEntity {
    Feed {
        id: Some(FEED_ID.to_string()),
        name: "feedA".to_string(),
        project: Some(ProjectReference {
            id: PROJECT_ID.to_string(),
            name: None,
        }),
    }
    .into()
}

fn stream_state() -> DeclaredState {
    DeclaredState::new()
        .with(audit_stream::URL, "https://splunk.example.com:8088")
        .with(audit_stream::COLLECTOR_TOKEN, "token-1")
}

fn stream(status: LifecycleStatus) -> RemoteEntity {
    AuditStream {
        id: Some(7),
        consumer_type: Some(audit_stream::CONSUMER_TYPE.to_string()),
        display_name: Some("splunk.example.com".to_string()),
        status: Some(status),
        ..Default::default()
    }
    .into()
}

fn entitlement(license: AccountLicenseType) -> RemoteEntity {
    GroupEntitlement {
        id: Some(ENTITLEMENT_ID.to_string()),
        group: GraphGroup {
            origin: Some("aad".to_string()),
            origin_id: Some("oid-1".to_string()),
            display_name: Some("Platform".to_string()),
            ..Default::default()
        },
        license_rule: AccessLevel {
            account_license_type: license,
            licensing_source: LicensingSource::Account,
        },
    }
    .into()
}

fn feeds(gateway: &Arc<ScriptedGateway>) -> LifecycleController<ScriptedGateway, FeedAdapter> {
    LifecycleController::new(Arc::clone(gateway), FeedAdapter)
}

fn streams(
    gateway: &Arc<ScriptedGateway>,
) -> LifecycleController<ScriptedGateway, AuditStreamAdapter> {
    LifecycleController::new(Arc::clone(gateway), AuditStreamAdapter)
}

/// A feed with no deletion history is created, not restored
#[tokio::test]
async fn test_feed_create_fresh() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .on_query_change(Err(not_found()))
        .on_create(Ok(feed_remote()))
        .on_get(Ok(feed_remote()));

    let outcome = feeds(&gateway)
        .reconcile(Operation::Create, feed_state(), None)
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.identifier, Some(Identifier::new(FEED_ID)));
    assert_eq!(outcome.phase, LifecyclePhase::Ready);
    assert_eq!(outcome.state.bool(feed::RESTORED), Some(false));
    assert_eq!(gateway.verbs(), vec!["query_change", "create", "get"]);
    assert_eq!(
        gateway.calls()[0],
        Call::QueryChange(EntityKey::in_project(Some(PROJECT_ID), "feedA"))
    );
}

/// A soft-deleted feed is restored with exactly one restore and no create
#[tokio::test]
async fn test_feed_create_restores_soft_deleted() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .on_query_change(Ok(ChangeRecord {
            change_type: ChangeType::Delete,
            entity_id: Some(FEED_ID.to_string()),
        }))
        .on_get(Ok(feed_remote()));

    let outcome = feeds(&gateway)
        .reconcile(Operation::Create, feed_state(), None)
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.identifier, Some(Identifier::new(FEED_ID)));
    assert_eq!(outcome.state.bool(feed::RESTORED), Some(true));
    assert_eq!(gateway.verbs(), vec!["query_change", "restore", "get"]);
    // the only read goes by name, since the restore reply carries no id
    assert_eq!(
        gateway.calls()[2],
        Call::Get(EntityKey::in_project(Some(PROJECT_ID), "feedA"))
    );
}

/// A live feed's change history does not trigger a restore
#[tokio::test]
async fn test_feed_create_ignores_live_change() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .on_query_change(Ok(ChangeRecord {
            change_type: ChangeType::AddOrUpdate,
            entity_id: None,
        }))
        .on_create(Ok(feed_remote()))
        .on_get(Ok(feed_remote()));

    let outcome = feeds(&gateway)
        .reconcile(Operation::Create, feed_state(), None)
        .await;

    assert!(outcome.is_success());
    assert_eq!(gateway.count("restore"), 0);
    assert_eq!(gateway.count("create"), 1);
}

/// A change-history failure other than not-found surfaces instead of creating
#[tokio::test]
async fn test_feed_create_change_lookup_failure() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.on_query_change(Err(GatewayError::status(500, "boom")));

    let outcome = feeds(&gateway)
        .reconcile(Operation::Create, feed_state(), None)
        .await;

    assert!(matches!(outcome.error, Some(ReconcileError::Remote { .. })));
    assert_eq!(outcome.identifier, None);
    assert_eq!(gateway.count("create"), 0);
}

/// Invalid declared state fails before any remote call
#[tokio::test]
async fn test_validation_issues_no_calls() {
    let gateway = Arc::new(ScriptedGateway::new());

    let outcome = feeds(&gateway)
        .reconcile(Operation::Create, DeclaredState::new(), None)
        .await;
    assert!(matches!(outcome.error, Some(ReconcileError::Validation(_))));

    let invalid = stream_state().with(audit_stream::DAYS_TO_BACKFILL, -1);
    let outcome = streams(&gateway)
        .reconcile(Operation::Create, invalid, None)
        .await;
    assert!(matches!(outcome.error, Some(ReconcileError::Validation(_))));

    assert!(gateway.calls().is_empty());
}

/// Naming a group both ways is rejected before any remote call
#[tokio::test]
async fn test_entitlement_conflicting_identity_issues_no_calls() {
    let gateway = Arc::new(ScriptedGateway::new());
    let declared = DeclaredState::new()
        .with(group_entitlement::PRINCIPAL_NAME, "[contoso]\\Platform")
        .with(group_entitlement::ORIGIN, "aad")
        .with(group_entitlement::ORIGIN_ID, "oid-1");

    let outcome = LifecycleController::new(Arc::clone(&gateway), GroupEntitlementAdapter)
        .reconcile(Operation::Create, declared, None)
        .await;

    assert!(matches!(outcome.error, Some(ReconcileError::Validation(_))));
    assert_eq!(outcome.identifier, None);
    assert!(gateway.calls().is_empty());
}

/// Group entitlements have no async status: create and update each read back once
#[tokio::test]
async fn test_entitlement_create_then_update() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .on_create(Ok(entitlement(AccountLicenseType::Stakeholder)))
        .on_get(Ok(entitlement(AccountLicenseType::Stakeholder)));
    let entitlements = LifecycleController::new(Arc::clone(&gateway), GroupEntitlementAdapter);

    let declared = DeclaredState::new()
        .with(group_entitlement::ORIGIN, "aad")
        .with(group_entitlement::ORIGIN_ID, "oid-1")
        .with(group_entitlement::ACCOUNT_LICENSE_TYPE, "stakeholder");
    let created = entitlements
        .reconcile(Operation::Create, declared, None)
        .await;

    assert!(created.is_success(), "{:?}", created.error);
    assert_eq!(created.identifier, Some(Identifier::new(ENTITLEMENT_ID)));
    assert_eq!(
        created.state.str(group_entitlement::DISPLAY_NAME),
        Some("Platform")
    );
    assert_eq!(gateway.verbs(), vec!["create", "get"]);

    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .on_update(Ok(entitlement(AccountLicenseType::Express)))
        .on_get(Ok(entitlement(AccountLicenseType::Express)));
    let entitlements = LifecycleController::new(Arc::clone(&gateway), GroupEntitlementAdapter);

    let declared = created
        .state
        .clone()
        .with(group_entitlement::ACCOUNT_LICENSE_TYPE, "basic");
    let updated = entitlements
        .reconcile(Operation::Update, declared, created.identifier.clone())
        .await;

    assert!(updated.is_success(), "{:?}", updated.error);
    assert_eq!(updated.identifier, Some(Identifier::new(ENTITLEMENT_ID)));
    assert_eq!(
        updated.state.str(group_entitlement::ACCOUNT_LICENSE_TYPE),
        Some("express")
    );
    assert_eq!(gateway.verbs(), vec!["update", "get"]);
    assert_eq!(
        gateway.calls()[0],
        Call::Update(EntityKey::new(ENTITLEMENT_ID))
    );
}

/// Backfilling streams are polled until enabled; no status change needed
#[tokio::test(start_paused = true)]
async fn test_stream_create_stabilizes() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .on_create(Ok(stream(LifecycleStatus::Backfilling)))
        .on_get(Ok(stream(LifecycleStatus::Backfilling)))
        .on_get(Ok(stream(LifecycleStatus::Backfilling)))
        .on_get(Ok(stream(LifecycleStatus::Enabled)));

    let outcome = streams(&gateway)
        .reconcile(Operation::Create, stream_state(), None)
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.identifier, Some(Identifier::new("7")));
    assert_eq!(outcome.state.bool(audit_stream::ENABLED), Some(true));
    // write-only secret is carried over from the declaration
    assert_eq!(
        outcome.state.str(audit_stream::COLLECTOR_TOKEN),
        Some("token-1")
    );
    assert_eq!(gateway.count("set_status"), 0);
    // two pending polls and the stable one; the last poll is the result
    assert_eq!(gateway.verbs(), vec!["create", "get", "get", "get"]);
}

/// A stream declared disabled gets exactly one status change after it settles
#[tokio::test(start_paused = true)]
async fn test_stream_create_disabled_sets_status_once() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .on_create(Ok(stream(LifecycleStatus::Backfilling)))
        .on_get(Ok(stream(LifecycleStatus::Enabled)))
        .on_set_status(Ok(stream(LifecycleStatus::DisabledByUser)));

    let declared = stream_state().with(audit_stream::ENABLED, false);
    let outcome = streams(&gateway)
        .reconcile(Operation::Create, declared, None)
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(outcome.state.bool(audit_stream::ENABLED), Some(false));
    let status_calls: Vec<_> = gateway
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::SetStatus(_)))
        .collect();
    assert_eq!(
        status_calls,
        vec![Call::SetStatus(LifecycleStatus::DisabledByUser)]
    );
    // the status change reply is the final view, no extra read
    assert_eq!(gateway.verbs(), vec!["create", "get", "set_status"]);
}

/// Stabilization gives up at the deadline, stops calling, and keeps the id
#[tokio::test(start_paused = true)]
async fn test_stream_create_timeout_keeps_identifier() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .on_create(Ok(stream(LifecycleStatus::Backfilling)))
        .on_get(Ok(stream(LifecycleStatus::Backfilling)));

    let mut config = ReconcileConfig::default();
    config.timeouts.create_secs = 60;
    let controller = streams(&gateway).with_config(config);

    let started = tokio::time::Instant::now();
    let outcome = controller
        .reconcile(Operation::Create, stream_state(), None)
        .await;

    assert!(matches!(
        outcome.error,
        Some(ReconcileError::Timeout {
            last_status: LifecycleStatus::Backfilling,
            ..
        })
    ));
    assert_eq!(outcome.identifier, Some(Identifier::new("7")));
    assert_eq!(outcome.phase, LifecyclePhase::Stabilizing);
    assert!(started.elapsed() >= Duration::from_secs(60));

    let polls = gateway.count("get");
    assert_eq!(polls, 6);
    assert_eq!(gateway.count("set_status"), 0);
}

/// A status in neither the pending nor the target set aborts the wait
#[tokio::test(start_paused = true)]
async fn test_stream_unexpected_status() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .on_create(Ok(stream(LifecycleStatus::Backfilling)))
        .on_get(Ok(stream(LifecycleStatus::Deleted)));

    let outcome = streams(&gateway)
        .reconcile(Operation::Create, stream_state(), None)
        .await;

    assert!(matches!(
        outcome.error,
        Some(ReconcileError::UnexpectedStatus {
            status: LifecycleStatus::Deleted,
            ..
        })
    ));
    assert_eq!(outcome.identifier, Some(Identifier::new("7")));
    assert_eq!(gateway.count("get"), 1);
}

/// Update stabilizes too and skips the status change when it already matches
#[tokio::test(start_paused = true)]
async fn test_stream_update() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway
        .on_update(Ok(stream(LifecycleStatus::Enabled)))
        .on_get(Ok(stream(LifecycleStatus::Enabled)));

    let outcome = streams(&gateway)
        .reconcile(
            Operation::Update,
            stream_state(),
            Some(Identifier::new("7")),
        )
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(gateway.verbs(), vec!["update", "get"]);
    assert_eq!(gateway.calls()[0], Call::Update(EntityKey::new("7")));
}

/// Update without an identifier is refused before any call
#[tokio::test]
async fn test_update_requires_identifier() {
    let gateway = Arc::new(ScriptedGateway::new());

    let outcome = feeds(&gateway)
        .reconcile(Operation::Update, feed_state(), None)
        .await;

    assert!(matches!(
        outcome.error,
        Some(ReconcileError::MissingIdentifier(_))
    ));
    assert!(gateway.calls().is_empty());
}

/// Reading an entity that vanished clears the identifier without error
#[tokio::test]
async fn test_read_not_found_clears_identifier() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.on_get(Err(not_found()));

    let outcome = feeds(&gateway)
        .reconcile(
            Operation::Read,
            feed_state(),
            Some(Identifier::new(FEED_ID)),
        )
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.identifier, None);
    assert_eq!(outcome.phase, LifecyclePhase::Absent);
}

/// Other read failures surface and keep the identifier
#[tokio::test]
async fn test_read_failure_surfaces() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.on_get(Err(GatewayError::status(401, "unauthorized")));

    let outcome = feeds(&gateway)
        .reconcile(
            Operation::Read,
            feed_state(),
            Some(Identifier::new(FEED_ID)),
        )
        .await;

    assert!(matches!(outcome.error, Some(ReconcileError::Remote { .. })));
    assert_eq!(outcome.identifier, Some(Identifier::new(FEED_ID)));
}

/// Read merges observed fields over the declaration
#[tokio::test]
async fn test_read_refreshes_state() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.on_get(Ok(feed_remote()));

    let declared = DeclaredState::new()
        .with(feed::NAME, "stale")
        .with(feed::PERMANENT_DELETE, false);
    let outcome = feeds(&gateway)
        .reconcile(Operation::Read, declared, Some(Identifier::new(FEED_ID)))
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.state.str(feed::NAME), Some("feedA"));
    assert_eq!(outcome.state.str(feed::PROJECT_ID), Some(PROJECT_ID));
    assert_eq!(outcome.state.bool(feed::PERMANENT_DELETE), Some(false));
}

/// Delete purges by default
#[tokio::test]
async fn test_feed_delete_purges() {
    let gateway = Arc::new(ScriptedGateway::new());

    let outcome = feeds(&gateway)
        .reconcile(
            Operation::Delete,
            feed_state(),
            Some(Identifier::new(FEED_ID)),
        )
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.identifier, None);
    assert_eq!(gateway.verbs(), vec!["delete", "purge"]);
    assert_eq!(
        gateway.calls()[1],
        Call::Purge(EntityKey::in_project(Some(PROJECT_ID), FEED_ID))
    );
}

/// Delete with permanent_delete off only soft-deletes
#[tokio::test]
async fn test_feed_delete_without_purge() {
    let gateway = Arc::new(ScriptedGateway::new());

    let declared = feed_state().with(feed::PERMANENT_DELETE, false);
    let outcome = feeds(&gateway)
        .reconcile(Operation::Delete, declared, Some(Identifier::new(FEED_ID)))
        .await;

    assert!(outcome.is_success());
    assert_eq!(gateway.verbs(), vec!["delete"]);
}

/// A failed purge after a successful soft delete surfaces and keeps the id
#[tokio::test]
async fn test_feed_purge_failure() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.on_purge(Err(GatewayError::status(500, "recycle bin unavailable")));

    let outcome = feeds(&gateway)
        .reconcile(
            Operation::Delete,
            feed_state(),
            Some(Identifier::new(FEED_ID)),
        )
        .await;

    assert!(matches!(
        outcome.error,
        Some(ReconcileError::PurgeFailed { .. })
    ));
    assert_eq!(outcome.identifier, Some(Identifier::new(FEED_ID)));
    assert_eq!(outcome.phase, LifecyclePhase::Deleting);
}

/// Not-found on delete is fatal
#[tokio::test]
async fn test_delete_not_found_is_fatal() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.on_delete(Err(not_found()));

    let outcome = feeds(&gateway)
        .reconcile(
            Operation::Delete,
            feed_state(),
            Some(Identifier::new(FEED_ID)),
        )
        .await;

    assert!(matches!(outcome.error, Some(ReconcileError::NotFound(_))));
    assert_eq!(gateway.count("purge"), 0);
}
