//! Feed permission adapter
//!
//! A feed permission has no remote record of its own: it is one entry in
//! the feed's permission collection, keyed by the principal's descriptor.

use super::{optional_str, optional_uuid, require_str, require_uuid};
use crate::error::Result;
use crate::model::{EntityKind, FeedRole, PermissionGrant, Principal};
use crate::resolver::Reference;
use crate::state::{DeclaredState, EntityKey};

pub const FEED_ID: &str = "feed_id";
pub const IDENTITY_DESCRIPTOR: &str = "identity_descriptor";
pub const IDENTITY_ID: &str = "identity_id";
pub const ROLE: &str = "role";
pub const PROJECT_ID: &str = "project_id";
pub const DISPLAY_NAME: &str = "display_name";

/// Validated form of a declared feed permission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRequest {
    /// The feed owning the permission collection
    pub parent: EntityKey,

    pub principal: Reference,

    pub role: FeedRole,

    pub display_name: Option<String>,
}

impl GrantRequest {
    /// Grant entry for an already-resolved principal
    pub fn grant_for(&self, principal: &Principal) -> PermissionGrant {
        PermissionGrant::new(principal, self.role).with_display_name(self.display_name.clone())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeedPermissionAdapter;

impl FeedPermissionAdapter {
    pub fn kind(&self) -> EntityKind {
        EntityKind::FeedPermission
    }

    /// Kind that owns the permission collection
    pub fn parent_kind(&self) -> EntityKind {
        EntityKind::Feed
    }

    /// Parent feed and principal reference; enough to revoke or look up
    pub fn target(&self, declared: &DeclaredState) -> Result<(EntityKey, Reference)> {
        let feed_id = require_uuid(FEED_ID, require_str(declared, FEED_ID)?)?;
        let project = optional_uuid(declared, PROJECT_ID)?;
        let descriptor = require_str(declared, IDENTITY_DESCRIPTOR)?;
        Ok((
            EntityKey::in_project(project, feed_id),
            Reference::Descriptor(descriptor.to_string()),
        ))
    }

    pub fn encode(&self, declared: &DeclaredState) -> Result<GrantRequest> {
        let (parent, principal) = self.target(declared)?;
        let role = require_str(declared, ROLE)?.parse::<FeedRole>()?;
        let display_name = optional_str(declared, DISPLAY_NAME)?.map(str::to_string);

        Ok(GrantRequest {
            parent,
            principal,
            role,
            display_name,
        })
    }

    /// Observed grant -> declared fields. The descriptor is reported as
    /// declared, since the remote may return it in a different casing.
    pub fn decode(&self, grant: &PermissionGrant, principal: &Principal) -> DeclaredState {
        let mut state = DeclaredState::new()
            .with(ROLE, grant.role.to_string())
            .with(IDENTITY_ID, principal.id.clone());
        if let Some(display_name) = &grant.display_name {
            state.set(DISPLAY_NAME, display_name.clone());
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;

    const FEED: &str = "0b0c5a55-4a53-4d7c-9b0f-0f0aa1b5d2f4";

    fn declared() -> DeclaredState {
        DeclaredState::new()
            .with(FEED_ID, FEED)
            .with(IDENTITY_DESCRIPTOR, "vssgp.Uy0xLTktMTU1")
            .with(ROLE, "contributor")
            .with(DISPLAY_NAME, "Build service")
    }

    #[test]
    fn test_encode() {
        let request = FeedPermissionAdapter.encode(&declared()).unwrap();
        assert_eq!(request.parent, EntityKey::new(FEED));
        assert_eq!(
            request.principal,
            Reference::Descriptor("vssgp.Uy0xLTktMTU1".to_string())
        );
        assert_eq!(request.role, FeedRole::Contributor);
        assert_eq!(request.display_name.as_deref(), Some("Build service"));
    }

    #[test]
    fn test_round_trip() {
        let principal = Principal {
            id: "5c7f5f0e-3b55-4e0b-8d43-1a7c6e1c9a20".to_string(),
            descriptor: "vssgp.Uy0xLTktMTU1".to_string(),
            ..Default::default()
        };
        let request = FeedPermissionAdapter.encode(&declared()).unwrap();
        let grant = request.grant_for(&principal);

        let decoded = FeedPermissionAdapter.decode(&grant, &principal);
        let state = declared().overlay(decoded);
        let again = FeedPermissionAdapter
            .encode(&state)
            .unwrap()
            .grant_for(&principal);

        assert_eq!(again, grant);
        assert_eq!(state.str(IDENTITY_ID), Some(principal.id.as_str()));
    }

    #[test]
    fn test_role_validation() {
        let state = declared().with(ROLE, "owner");
        assert!(matches!(
            FeedPermissionAdapter.encode(&state).unwrap_err(),
            ReconcileError::Validation(_)
        ));

        // revocation is not a declarable role
        let state = declared().with(ROLE, "none");
        assert!(FeedPermissionAdapter.encode(&state).is_err());
    }

    #[test]
    fn test_feed_id_must_be_uuid() {
        let state = declared().with(FEED_ID, "feedA");
        assert!(FeedPermissionAdapter.encode(&state).is_err());
    }
}
