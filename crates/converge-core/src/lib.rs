//! Converge reconciliation engine
//!
//! Converges declared state for Azure DevOps entities onto the live service.
//! The engine is generic over the entity kind ([`TypeAdapter`]) and over the
//! transport ([`Gateway`]).
//!
//! # Managed kinds
//!
//! - **Feed**: restore-or-create from the recycle bin, optional purge
//! - **Audit stream**: asynchronous provisioning with stabilization polling
//! - **Group entitlement**: license assignment for directory groups
//! - **Feed permission**: role entries in a feed's permission collection
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  converge CLI                    │
//! │            (converge reconcile ...)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                converge-core                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  LifecycleController / GrantController    │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐ ┌──────────┐ ┌────────────┐   │
//! │  │ TypeAdapters │ │ Resolver │ │ Classifier │   │
//! │  └──────────────┘ └──────────┘ └────────────┘   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │        trait Gateway { ... }              │   │
//! │  └──────────────────────────────────────────┘   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │ converge-azdo │
//!           │  REST gateway │
//!           └───────────────┘
//! ```

pub mod action;
pub mod adapter;
pub mod classify;
pub mod config;
pub mod error;
pub mod gateway;
pub mod grant;
pub mod lifecycle;
pub mod model;
pub mod poll;
pub mod resolver;
pub mod state;

// Re-exports
pub use action::{LifecyclePhase, Operation, ReconcileOutcome};
pub use adapter::{
    AuditStreamAdapter, EncodeContext, FeedAdapter, FeedPermissionAdapter,
    GroupEntitlementAdapter, TypeAdapter,
};
pub use classify::{ErrorClass, classify};
pub use config::{OperationTimeouts, PollSettings, ReconcileConfig};
pub use error::{GatewayError, GatewayResult, ReconcileError, Result};
pub use gateway::{Gateway, IdentityQuery};
pub use grant::GrantController;
pub use lifecycle::LifecycleController;
pub use model::{
    AuditStream, EntityKind, Feed, FeedRole, GroupEntitlement, PermissionGrant, Principal,
    RemoteEntity,
};
pub use poll::{StabilizationPolicy, StatusSets};
pub use resolver::{Reference, Resolver, select_match};
pub use state::{ChangeRecord, ChangeType, DeclaredState, EntityKey, Identifier, LifecycleStatus};
