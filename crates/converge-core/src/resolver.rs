//! Principal reference resolution
//!
//! Declared state names principals indirectly (a subject descriptor, a group
//! display name, a principal name or an origin tuple). The resolver turns a
//! [`Reference`] into exactly one [`Principal`] or fails. The grant controller
//! resolves descriptors; the CLI `resolve` command reaches every form.

use crate::classify::into_reconcile_error;
use crate::error::{ReconcileError, Result};
use crate::gateway::{Gateway, IdentityQuery};
use crate::model::{PermissionGrant, Principal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Indirect reference to a principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Reference {
    /// Graph subject descriptor (`vssgp.…`, `aadgp.…`)
    Descriptor(String),

    /// Group display name within a project
    GroupName { name: String, project_id: String },

    /// User principal name or `[org]\Group` form
    PrincipalName(String),

    /// Origin directory tuple
    Origin { origin: String, origin_id: String },
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reference::Descriptor(descriptor) => write!(f, "descriptor {}", descriptor),
            Reference::GroupName { name, project_id } => {
                write!(f, "group {:?} in project {}", name, project_id)
            }
            Reference::PrincipalName(name) => write!(f, "principal {:?}", name),
            Reference::Origin { origin, origin_id } => write!(f, "{}:{}", origin, origin_id),
        }
    }
}

/// Resolves references through a shared gateway
pub struct Resolver<G: Gateway> {
    gateway: Arc<G>,
}

impl<G: Gateway> Resolver<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub async fn resolve(&self, reference: &Reference) -> Result<Principal> {
        tracing::debug!(%reference, "Resolving principal");

        match reference {
            Reference::Descriptor(descriptor) => {
                let storage_key = self
                    .gateway
                    .storage_key(descriptor)
                    .await
                    .map_err(|e| into_reconcile_error(format!("storage key for {reference}"), e))?;
                self.gateway
                    .read_identity(&storage_key)
                    .await
                    .map_err(|e| into_reconcile_error(format!("identity for {reference}"), e))
            }
            Reference::GroupName { name, project_id } => {
                let query = IdentityQuery::ProjectGroups {
                    project_id: project_id.clone(),
                };
                let groups = self.search(reference, &query).await?;
                single(
                    reference,
                    groups.into_iter().filter(|group| {
                        group
                            .display_name
                            .as_deref()
                            .is_some_and(|display| display.eq_ignore_ascii_case(name))
                    }),
                )
            }
            Reference::PrincipalName(name) => {
                let query = IdentityQuery::General(name.clone());
                let found = self.search(reference, &query).await?;
                single(
                    reference,
                    found
                        .into_iter()
                        .filter(|p| p.principal_name.as_deref() == Some(name.as_str())),
                )
            }
            Reference::Origin { origin, origin_id } => {
                let query = IdentityQuery::General(origin_id.clone());
                let found = self.search(reference, &query).await?;
                single(
                    reference,
                    found.into_iter().filter(|p| {
                        p.origin_id.as_deref() == Some(origin_id.as_str())
                            && p.origin
                                .as_deref()
                                .is_some_and(|o| o.eq_ignore_ascii_case(origin))
                    }),
                )
            }
        }
    }

    async fn search(&self, reference: &Reference, query: &IdentityQuery) -> Result<Vec<Principal>> {
        self.gateway
            .search_identities(query)
            .await
            .map_err(|e| into_reconcile_error(format!("identity search for {reference}"), e))
    }
}

fn single(reference: &Reference, matches: impl Iterator<Item = Principal>) -> Result<Principal> {
    let mut matches: Vec<Principal> = matches.collect();
    match matches.len() {
        0 => Err(ReconcileError::NotFound(format!("no identity matches {reference}"))),
        1 => Ok(matches.remove(0)),
        candidates => Err(ReconcileError::AmbiguousReference {
            reference: reference.to_string(),
            candidates,
        }),
    }
}

/// First grant held by `principal`, matched on descriptor
pub fn select_match<'a>(
    grants: &'a [PermissionGrant],
    principal: &Principal,
) -> Result<&'a PermissionGrant> {
    grants
        .iter()
        .find(|grant| grant.identity_descriptor == principal.descriptor)
        .ok_or_else(|| {
            ReconcileError::NotFound(format!("no grant for identity {}", principal.descriptor))
        })
}
