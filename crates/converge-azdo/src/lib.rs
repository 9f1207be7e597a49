//! Azure DevOps gateway for converge
//!
//! This crate implements the [`Gateway`](converge_core::Gateway) trait over
//! the Azure DevOps REST API, so the reconciliation engine can manage
//! artifact feeds, feed permissions, audit streams and group entitlements.
//!
//! # Requirements
//!
//! - `AZDO_ORG_SERVICE_URL`: organization URL (`https://dev.azure.com/{org}`)
//! - `AZDO_PERSONAL_ACCESS_TOKEN`: personal access token
//!
//! # Example
//!
//! ```ignore
//! use converge_azdo::{AzdoConfig, AzdoGateway};
//! use converge_core::{FeedAdapter, LifecycleController, Operation};
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(AzdoGateway::new(AzdoConfig::from_env()?)?);
//! let feeds = LifecycleController::new(gateway, FeedAdapter);
//!
//! let outcome = feeds.reconcile(Operation::Create, declared, None).await;
//! ```

mod client;
pub mod config;
pub mod error;
pub mod gateway;
mod wire;

pub use config::{AzdoConfig, Endpoints};
pub use error::{AzdoError, Result};
pub use gateway::AzdoGateway;
