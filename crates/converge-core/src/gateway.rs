//! Remote gateway trait definition

use crate::error::GatewayResult;
use crate::model::{EntityKind, PermissionGrant, Principal, RemoteEntity};
use crate::state::{ChangeRecord, EntityKey, LifecycleStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The only means of reaching the managed service.
///
/// Implementations own transport, authentication and wire-level retries.
/// Every verb reports failures as [`GatewayError`](crate::error::GatewayError)
/// carrying the remote's declared status so the engine can classify them.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Returns the gateway name (e.g., "azure-devops")
    fn name(&self) -> &str;

    async fn get(&self, kind: EntityKind, key: &EntityKey) -> GatewayResult<RemoteEntity>;

    async fn create(&self, kind: EntityKind, entity: &RemoteEntity)
    -> GatewayResult<RemoteEntity>;

    async fn update(
        &self,
        kind: EntityKind,
        key: &EntityKey,
        entity: &RemoteEntity,
    ) -> GatewayResult<RemoteEntity>;

    /// Soft delete; entities with a recycle bin can still be restored
    async fn delete(&self, kind: EntityKind, key: &EntityKey) -> GatewayResult<()>;

    /// Permanently remove a soft-deleted entity
    async fn purge(&self, kind: EntityKind, key: &EntityKey) -> GatewayResult<()>;

    /// Flip the deletion flag of a soft-deleted entity
    async fn restore(&self, kind: EntityKind, key: &EntityKey) -> GatewayResult<()>;

    async fn set_status(
        &self,
        kind: EntityKind,
        key: &EntityKey,
        status: LifecycleStatus,
    ) -> GatewayResult<RemoteEntity>;

    /// Latest change recorded for a natural key (soft-delete detection)
    async fn query_change(&self, kind: EntityKind, key: &EntityKey) -> GatewayResult<ChangeRecord>;

    /// Subject descriptor -> identity storage key
    async fn storage_key(&self, descriptor: &str) -> GatewayResult<String>;

    async fn read_identity(&self, identity_id: &str) -> GatewayResult<Principal>;

    /// Flat identity search; no ordering or disambiguation is implied
    async fn search_identities(&self, query: &IdentityQuery) -> GatewayResult<Vec<Principal>>;

    async fn list_grants(&self, kind: EntityKind, key: &EntityKey)
    -> GatewayResult<Vec<PermissionGrant>>;

    async fn set_grants(
        &self,
        kind: EntityKind,
        key: &EntityKey,
        grants: &[PermissionGrant],
    ) -> GatewayResult<()>;
}

/// Identity search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityQuery {
    /// Free-form search (account name, UPN, origin id)
    General(String),

    /// All groups scoped to a project
    ProjectGroups { project_id: String },
}

impl std::fmt::Display for IdentityQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityQuery::General(value) => write!(f, "General={}", value),
            IdentityQuery::ProjectGroups { project_id } => {
                write!(f, "groups in project {}", project_id)
            }
        }
    }
}
