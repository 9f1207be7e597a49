//! Lifecycle controller
//!
//! Drives one entity through create, read, update and delete against an
//! injected [`Gateway`], using a [`TypeAdapter`] for the kind-specific parts.
//!
//! ```text
//! Absent ──┬── Creating ──┐
//!          └── Restoring ─┴── Stabilizing ── Ready
//! Ready ── Updating ── Stabilizing ── Ready
//! Ready ── Deleting ── Absent
//! ```

use crate::action::{LifecyclePhase, Operation, ReconcileOutcome};
use crate::adapter::{EncodeContext, TypeAdapter};
use crate::classify::{into_reconcile_error, is_not_found};
use crate::config::ReconcileConfig;
use crate::error::{GatewayError, ReconcileError, Result};
use crate::gateway::Gateway;
use crate::model::EntityKind;
use crate::poll::{StabilizationPolicy, wait_for_status};
use crate::state::{DeclaredState, EntityKey, Identifier, LifecycleStatus};
use std::sync::Arc;

/// Phase and identifier reached so far; survives a failure part way through
#[derive(Debug)]
pub(crate) struct Progress {
    kind: EntityKind,
    phase: LifecyclePhase,
    identifier: Option<Identifier>,
}

impl Progress {
    pub(crate) fn new(
        kind: EntityKind,
        phase: LifecyclePhase,
        identifier: Option<Identifier>,
    ) -> Self {
        Self {
            kind,
            phase,
            identifier,
        }
    }

    pub(crate) fn enter(&mut self, phase: LifecyclePhase) {
        tracing::info!(
            kind = %self.kind,
            id = ?self.identifier.as_ref().map(Identifier::as_str),
            from = %self.phase,
            to = %phase,
            "Lifecycle transition"
        );
        self.phase = phase;
    }

    pub(crate) fn fail(self, declared: DeclaredState, error: ReconcileError) -> ReconcileOutcome {
        tracing::error!(kind = %self.kind, phase = %self.phase, "Reconcile failed: {}", error);
        ReconcileOutcome::failed(declared, self.identifier, self.phase, error)
    }
}

/// Reconciliation engine for one entity kind
pub struct LifecycleController<G: Gateway, A: TypeAdapter> {
    gateway: Arc<G>,
    adapter: A,
    config: ReconcileConfig,
    ctx: EncodeContext,
}

impl<G: Gateway, A: TypeAdapter> LifecycleController<G, A> {
    pub fn new(gateway: Arc<G>, adapter: A) -> Self {
        Self {
            gateway,
            adapter,
            config: ReconcileConfig::default(),
            ctx: EncodeContext::default(),
        }
    }

    pub fn with_config(mut self, config: ReconcileConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_context(mut self, ctx: EncodeContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Run one operation to completion.
    ///
    /// Never panics on remote failure; the outcome always reports the last
    /// known identifier so the caller can persist it.
    pub async fn reconcile(
        &self,
        operation: Operation,
        declared: DeclaredState,
        identifier: Option<Identifier>,
    ) -> ReconcileOutcome {
        let kind = self.adapter.kind();
        tracing::debug!(%kind, %operation, gateway = self.gateway.name(), "Reconciling");

        match operation {
            Operation::Create => self.create(declared).await,
            Operation::Read => self.read(declared, identifier).await,
            Operation::Update => self.update(declared, identifier).await,
            Operation::Delete => self.delete(declared, identifier).await,
        }
    }

    // ============ Create ============

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
        let kind = self.adapter.kind();
        let desired = self.adapter.encode(declared, &self.ctx)?;

        let (remote, restored) = match self.find_soft_deleted(declared).await? {
            Some(natural_key) => {
                progress.enter(LifecyclePhase::Restoring);
                if let Err(e) = self.gateway.restore(kind, &natural_key).await {
                    let context = format!("restoring {kind} {natural_key}");
                    return Err(into_reconcile_error(context, e));
                }
                // The restore reply has no body; this read doubles as the read-back
                let restored = self.read_back(&natural_key).await?;
                (Fetched::Current(restored), true)
            }
            None => {
                progress.enter(LifecyclePhase::Creating);
                let entity = self
                    .gateway
                    .create(kind, &desired.into())
                    .await
                    .map_err(|e| into_reconcile_error(format!("creating {kind}"), e))?;
                (Fetched::Written(A::Remote::try_from(entity)?), false)
            }
        };

        let id = self.identifier_of(remote.entity())?;
        progress.identifier = Some(id.clone());
        tracing::info!(%kind, %id, restored, "Entity provisioned");

        let key = self.adapter.key(declared, &id);
        let observed = self
            .settle(Operation::Create, declared, &key, &id, remote, progress)
            .await?;

        let mut state = self.adapter.carry_over(declared, self.adapter.decode(&observed));
        self.adapter.mark_restored(&mut state, restored);
        Ok((state, id))
    }

    /// Natural key of a soft-deleted entity that create should restore
    async fn find_soft_deleted(&self, declared: &DeclaredState) -> Result<Option<EntityKey>> {
        if !self.adapter.supports_restore() {
            return Ok(None);
        }
        let Some(natural_key) = self.adapter.natural_key(declared)? else {
            return Ok(None);
        };

        let kind = self.adapter.kind();
        match self.gateway.query_change(kind, &natural_key).await {
            Ok(change) if change.is_soft_delete() => {
                tracing::info!(%kind, key = %natural_key, "Found soft-deleted entity, restoring");
                Ok(Some(natural_key))
            }
            Ok(_) => Ok(None),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(ReconcileError::remote(
                format!("change history for {kind} {natural_key}"),
                e,
            )),
        }
    }

    // ============ Read ============

    async fn read(
        &self,
        declared: DeclaredState,
        identifier: Option<Identifier>,
    ) -> ReconcileOutcome {
        let kind = self.adapter.kind();
        let Some(id) = identifier else {
            return ReconcileOutcome::absent(declared);
        };
        let key = self.adapter.key(&declared, &id);
        let progress = Progress::new(kind, LifecyclePhase::Ready, Some(id.clone()));

        match self.gateway.get(kind, &key).await {
            Ok(entity) => match A::Remote::try_from(entity) {
                Ok(remote) => {
                    let id = self.adapter.identifier(&remote).unwrap_or(id);
                    let state = self.adapter.carry_over(&declared, self.adapter.decode(&remote));
                    ReconcileOutcome::ready(state, id)
                }
                Err(e) => progress.fail(declared, e),
            },
            Err(e) if is_not_found(&e) => {
                tracing::warn!(%kind, %id, "Entity no longer exists remotely");
                ReconcileOutcome::absent(declared)
            }
            Err(e) => {
                let error = ReconcileError::remote(format!("reading {kind} {key}"), e);
                progress.fail(declared, error)
            }
        }
    }

    // ============ Update ============

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

        match self.try_update(&declared, &id, &mut progress).await {
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
        id: &Identifier,
        progress: &mut Progress,
    ) -> Result<DeclaredState> {
        let kind = self.adapter.kind();
        let desired = self.adapter.encode(declared, &self.ctx)?;
        let key = self.adapter.key(declared, id);

        progress.enter(LifecyclePhase::Updating);
        let entity = self
            .gateway
            .update(kind, &key, &desired.into())
            .await
            .map_err(|e| into_reconcile_error(format!("updating {kind} {key}"), e))?;
        let written = Fetched::Written(A::Remote::try_from(entity)?);

        let observed = self
            .settle(Operation::Update, declared, &key, id, written, progress)
            .await?;
        Ok(self.adapter.carry_over(declared, self.adapter.decode(&observed)))
    }

    // ============ Delete ============

    async fn delete(
        &self,
        declared: DeclaredState,
        identifier: Option<Identifier>,
    ) -> ReconcileOutcome {
        let kind = self.adapter.kind();
        let mut progress = Progress::new(kind, LifecyclePhase::Ready, identifier.clone());
        let Some(id) = identifier else {
            let error = ReconcileError::MissingIdentifier(format!("delete of {kind}"));
            return progress.fail(declared, error);
        };
        let key = self.adapter.key(&declared, &id);

        progress.enter(LifecyclePhase::Deleting);
        if let Err(e) = self.gateway.delete(kind, &key).await {
            let error = into_reconcile_error(format!("deleting {kind} {key}"), e);
            return progress.fail(declared, error);
        }

        if self.adapter.purge_requested(&declared) {
            tracing::info!(%kind, %id, "Purging soft-deleted entity");
            if let Err(source) = self.gateway.purge(kind, &key).await {
                let error = ReconcileError::PurgeFailed {
                    id: id.to_string(),
                    source,
                };
                return progress.fail(declared, error);
            }
        }

        progress.enter(LifecyclePhase::Absent);
        ReconcileOutcome::absent(declared)
    }

    // ============ Shared steps ============

    /// Final remote view of a written entity.
    ///
    /// Kinds with a stabilization policy end on the last poll, or on the
    /// reply of the status change. Other kinds are read back once unless
    /// the caller already holds a fresh read.
    async fn settle(
        &self,
        operation: Operation,
        declared: &DeclaredState,
        key: &EntityKey,
        id: &Identifier,
        fetched: Fetched<A::Remote>,
        progress: &mut Progress,
    ) -> Result<A::Remote> {
        let kind = self.adapter.kind();

        let Some(sets) = self.adapter.stabilization() else {
            return match fetched {
                Fetched::Current(remote) => Ok(remote),
                Fetched::Written(_) => self.read_back(key).await,
            };
        };

        progress.enter(LifecyclePhase::Stabilizing);
        let policy = StabilizationPolicy::new(
            sets,
            &self.config.poll,
            self.config.timeouts.for_operation(operation),
        );
        let stable = wait_for_status(&policy, kind, id, || self.refresh(key)).await?;
        self.reconcile_status(declared, key, stable).await
    }

    async fn read_back(&self, key: &EntityKey) -> Result<A::Remote> {
        let kind = self.adapter.kind();
        let entity = self
            .gateway
            .get(kind, key)
            .await
            .map_err(|e| into_reconcile_error(format!("reading back {kind} {key}"), e))?;
        A::Remote::try_from(entity)
    }

    async fn refresh(&self, key: &EntityKey) -> Result<(A::Remote, LifecycleStatus)> {
        let kind = self.adapter.kind();
        let entity = self
            .gateway
            .get(kind, key)
            .await
            .map_err(|e| into_reconcile_error(format!("polling {kind} {key}"), e))?;
        let remote = A::Remote::try_from(entity)?;
        let status = self
            .adapter
            .status(&remote)
            .unwrap_or(LifecycleStatus::Unknown);
        Ok((remote, status))
    }

    /// At most one status change, and only when the observed status differs
    async fn reconcile_status(
        &self,
        declared: &DeclaredState,
        key: &EntityKey,
        observed: A::Remote,
    ) -> Result<A::Remote> {
        let kind = self.adapter.kind();
        let (Some(current), Some(desired)) = (
            self.adapter.status(&observed),
            self.adapter.desired_status(declared),
        ) else {
            return Ok(observed);
        };
        if current == desired {
            return Ok(observed);
        }

        tracing::info!(%kind, %key, %current, %desired, "Changing status");
        let entity = self
            .gateway
            .set_status(kind, key, desired)
            .await
            .map_err(|e| into_reconcile_error(format!("setting status of {kind} {key}"), e))?;
        A::Remote::try_from(entity)
    }

    fn identifier_of(&self, remote: &A::Remote) -> Result<Identifier> {
        self.adapter.identifier(remote).ok_or_else(|| {
            ReconcileError::remote(
                format!("provisioning {}", self.adapter.kind()),
                GatewayError::Decode("response carried no identifier".to_string()),
            )
        })
    }
}

/// Remote record in hand when a write returns
enum Fetched<T> {
    /// Reply of the write call itself
    Written(T),
    /// Fresh read taken after the write
    Current(T),
}

impl<T> Fetched<T> {
    fn entity(&self) -> &T {
        match self {
            Fetched::Written(remote) | Fetched::Current(remote) => remote,
        }
    }
}
