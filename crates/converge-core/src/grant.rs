//! Permission upsert
//!
//! A grant lives inside its parent's permission collection, so it is never
//! created or deleted as a record of its own: every write replaces the
//! principal's entry through `set_grants`, and revocation is an entry with
//! role `None`.

use crate::action::{LifecyclePhase, Operation, ReconcileOutcome};
use crate::adapter::FeedPermissionAdapter;
use crate::classify::into_reconcile_error;
use crate::error::{ReconcileError, Result};
use crate::gateway::Gateway;
use crate::lifecycle::Progress;
use crate::model::{PermissionGrant, Principal};
use crate::resolver::{Resolver, select_match};
use crate::state::{DeclaredState, EntityKey, Identifier};
use std::sync::Arc;

/// Prefix of synthesized grant identifiers
pub const IDENTIFIER_PREFIX: &str = "fp-";

/// Reconciles feed permission entries
pub struct GrantController<G: Gateway> {
    gateway: Arc<G>,
    resolver: Resolver<G>,
    adapter: FeedPermissionAdapter,
}

impl<G: Gateway> GrantController<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            resolver: Resolver::new(Arc::clone(&gateway)),
            gateway,
            adapter: FeedPermissionAdapter,
        }
    }

    pub async fn reconcile(
        &self,
        operation: Operation,
        declared: DeclaredState,
        identifier: Option<Identifier>,
    ) -> ReconcileOutcome {
        tracing::debug!(kind = %self.adapter.kind(), %operation, "Reconciling grant");

        match operation {
            Operation::Create => self.create(declared).await,
            Operation::Read => self.read(declared, identifier).await,
            Operation::Update => self.update(declared, identifier).await,
            Operation::Delete => self.delete(declared, identifier).await,
        }
    }

    async fn create(&self, declared: DeclaredState) -> ReconcileOutcome {
        let mut progress = Progress::new(self.adapter.kind(), LifecyclePhase::Absent, None);
        match self.try_create(&declared, &mut progress).await {
            Ok((state, id)) => {
                progress.enter(LifecyclePhase::Ready);
                ReconcileOutcome::ready(state, id)
            }
            Err(e) => progress.fail(declared, e),
        }
    }

    async fn try_create(
        &self,
        declared: &DeclaredState,
        progress: &mut Progress,
    ) -> Result<(DeclaredState, Identifier)> {
        let request = self.adapter.encode(declared)?;
        let principal = self.resolver.resolve(&request.principal).await?;
        let grants = self.grants(&request.parent).await?;

        if let Ok(existing) = select_match(&grants, &principal) {
            return Err(ReconcileError::Conflict(format!(
                "{} already holds role {} on feed {}",
                request.principal, existing.role, request.parent
            )));
        }

        progress.enter(LifecyclePhase::Creating);
        let grant = request.grant_for(&principal);
        self.write(&request.parent, &grant).await?;

        let id = Identifier::new(format!("{IDENTIFIER_PREFIX}{}", uuid::Uuid::new_v4()));
        tracing::info!(%id, role = %grant.role, feed = %request.parent, "Granted feed permission");
        Ok((self.snapshot(declared, &grant, &principal), id))
    }

    async fn read(
        &self,
        declared: DeclaredState,
        identifier: Option<Identifier>,
    ) -> ReconcileOutcome {
        let Some(id) = identifier else {
            return ReconcileOutcome::absent(declared);
        };
        let kind = self.adapter.kind();
        let progress = Progress::new(kind, LifecyclePhase::Ready, Some(id.clone()));

        match self.observe(&declared).await {
            Ok((grant, principal)) => {
                let state = self.snapshot(&declared, &grant, &principal);
                ReconcileOutcome::ready(state, id)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(%id, "Feed permission no longer exists: {}", e);
                ReconcileOutcome::absent(declared)
            }
            Err(e) => progress.fail(declared, e),
        }
    }

    async fn update(
        &self,
        declared: DeclaredState,
        identifier: Option<Identifier>,
    ) -> ReconcileOutcome {
        let kind = self.adapter.kind();
        let mut progress = Progress::new(kind, LifecyclePhase::Ready, identifier.clone());
        let Some(id) = identifier else {
            let error = ReconcileError::MissingIdentifier(format!("update of {kind}"));
            return progress.fail(declared, error);
        };

        match self.try_update(&declared, &mut progress).await {
            Ok(state) => {
                progress.enter(LifecyclePhase::Ready);
                ReconcileOutcome::ready(state, id)
            }
            Err(e) => progress.fail(declared, e),
        }
    }

    async fn try_update(
        &self,
        declared: &DeclaredState,
        progress: &mut Progress,
    ) -> Result<DeclaredState> {
        let request = self.adapter.encode(declared)?;
        let principal = self.resolver.resolve(&request.principal).await?;
        let grants = self.grants(&request.parent).await?;
        select_match(&grants, &principal)?;

        progress.enter(LifecyclePhase::Updating);
        let grant = request.grant_for(&principal);
        self.write(&request.parent, &grant).await?;
        Ok(self.snapshot(declared, &grant, &principal))
    }

    async fn delete(
        &self,
        declared: DeclaredState,
        identifier: Option<Identifier>,
    ) -> ReconcileOutcome {
        let kind = self.adapter.kind();
        let mut progress = Progress::new(kind, LifecyclePhase::Ready, identifier.clone());
        if identifier.is_none() {
            let error = ReconcileError::MissingIdentifier(format!("delete of {kind}"));
            return progress.fail(declared, error);
        }

        progress.enter(LifecyclePhase::Deleting);
        match self.revoke(&declared).await {
            Ok(()) => {
                progress.enter(LifecyclePhase::Absent);
                ReconcileOutcome::absent(declared)
            }
            Err(e) => progress.fail(declared, e),
        }
    }

    /// Writes role `None` whether or not a grant currently exists
    async fn revoke(&self, declared: &DeclaredState) -> Result<()> {
        let (parent, reference) = self.adapter.target(declared)?;
        let principal = self.resolver.resolve(&reference).await?;
        self.write(&parent, &PermissionGrant::revoke(&principal)).await?;
        tracing::info!(feed = %parent, principal = %reference, "Revoked feed permission");
        Ok(())
    }

    /// Current grant of the declared principal; not-found when either the
    /// principal or its grant is gone
    async fn observe(&self, declared: &DeclaredState) -> Result<(PermissionGrant, Principal)> {
        let (parent, reference) = self.adapter.target(declared)?;
        let principal = self.resolver.resolve(&reference).await?;
        let grants = self.grants(&parent).await?;
        let grant = select_match(&grants, &principal)?.clone();
        Ok((grant, principal))
    }

    async fn grants(&self, parent: &EntityKey) -> Result<Vec<PermissionGrant>> {
        let kind = self.adapter.parent_kind();
        self.gateway
            .list_grants(kind, parent)
            .await
            .map_err(|e| into_reconcile_error(format!("listing permissions of feed {parent}"), e))
    }

    async fn write(&self, parent: &EntityKey, grant: &PermissionGrant) -> Result<()> {
        let kind = self.adapter.parent_kind();
        let grants = std::slice::from_ref(grant);
        self.gateway
            .set_grants(kind, parent, grants)
            .await
            .map_err(|e| into_reconcile_error(format!("setting permissions of feed {parent}"), e))
    }

    fn snapshot(
        &self,
        declared: &DeclaredState,
        grant: &PermissionGrant,
        principal: &Principal,
    ) -> DeclaredState {
        declared.overlay(self.adapter.decode(grant, principal))
    }
}

/// Whether `id` was synthesized by [`GrantController`]
pub fn is_grant_identifier(id: &Identifier) -> bool {
    id.as_str()
        .strip_prefix(IDENTIFIER_PREFIX)
        .is_some_and(|rest| uuid::Uuid::parse_str(rest).is_ok())
}
