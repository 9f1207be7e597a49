//! Group entitlement adapter
//!
//! A group is identified either by its principal name (`[org]\Group`) or by
//! its origin tuple (`aad` + object id), never both.

use super::{EncodeContext, TypeAdapter, optional_str};
use crate::error::{ReconcileError, Result};
use crate::model::{
    AccessLevel, AccountLicenseType, EntityKind, GraphGroup, GroupEntitlement, LicensingSource,
};
use crate::state::{DeclaredState, EntityKey, Identifier};

pub const DISPLAY_NAME: &str = "display_name";
pub const PRINCIPAL_NAME: &str = "principal_name";
pub const ORIGIN: &str = "origin";
pub const ORIGIN_ID: &str = "origin_id";
pub const ACCOUNT_LICENSE_TYPE: &str = "account_license_type";
pub const LICENSING_SOURCE: &str = "licensing_source";
pub const DESCRIPTOR: &str = "descriptor";

const SUBJECT_KIND_GROUP: &str = "group";

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupEntitlementAdapter;

impl TypeAdapter for GroupEntitlementAdapter {
    type Remote = GroupEntitlement;

    fn kind(&self) -> EntityKind {
        EntityKind::GroupEntitlement
    }

    fn managed_fields(&self) -> &'static [&'static str] {
        &[
            DISPLAY_NAME,
            PRINCIPAL_NAME,
            ORIGIN,
            ORIGIN_ID,
            ACCOUNT_LICENSE_TYPE,
            LICENSING_SOURCE,
            DESCRIPTOR,
        ]
    }

    fn decode(&self, remote: &GroupEntitlement) -> DeclaredState {
        let group = &remote.group;
        let mut state = DeclaredState::new()
            .with(
                ACCOUNT_LICENSE_TYPE,
                remote.license_rule.account_license_type.to_string(),
            )
            .with(
                LICENSING_SOURCE,
                remote.license_rule.licensing_source.to_string(),
            );

        let optional = [
            (DESCRIPTOR, &group.descriptor),
            (ORIGIN, &group.origin),
            (ORIGIN_ID, &group.origin_id),
            (DISPLAY_NAME, &group.display_name),
            (PRINCIPAL_NAME, &group.principal_name),
        ];
        for (field, value) in optional {
            if let Some(value) = value {
                state.set(field, value.clone());
            }
        }
        state
    }

    fn encode(&self, declared: &DeclaredState, _ctx: &EncodeContext) -> Result<GroupEntitlement> {
        let origin = optional_str(declared, ORIGIN)?;
        let origin_id = optional_str(declared, ORIGIN_ID)?;
        let principal_name = optional_str(declared, PRINCIPAL_NAME)?;
        let mut display_name = optional_str(declared, DISPLAY_NAME)?.map(str::to_string);

        if let (Some(origin_id), Some(principal_name)) = (origin_id, principal_name) {
            return Err(ReconcileError::validation(format!(
                "both {ORIGIN_ID} and {PRINCIPAL_NAME} set, use only one: \
                 {ORIGIN_ID}: {origin_id} {PRINCIPAL_NAME}: {principal_name}"
            )));
        }

        // `[org]\Group` names the group `Group`
        if let Some((_, name)) = principal_name.and_then(|p| p.split_once('\\')) {
            display_name = Some(name.to_string());
        }

        if origin_id.is_none() && principal_name.is_none() && display_name.is_none() {
            return Err(ReconcileError::validation(format!(
                "neither {ORIGIN_ID} nor {PRINCIPAL_NAME} set, use one of them"
            )));
        }
        if origin_id.is_some() && origin.is_none() {
            return Err(ReconcileError::validation(format!(
                "{ORIGIN_ID} requires {ORIGIN} to be set"
            )));
        }

        let account_license_type = declared
            .str(ACCOUNT_LICENSE_TYPE)
            .map(str::parse::<AccountLicenseType>)
            .transpose()?
            .unwrap_or_default();
        let licensing_source = declared
            .str(LICENSING_SOURCE)
            .map(str::parse::<LicensingSource>)
            .transpose()?
            .unwrap_or_default();

        Ok(GroupEntitlement {
            id: None,
            group: GraphGroup {
                origin: origin.map(str::to_string),
                origin_id: origin_id.map(str::to_string),
                display_name,
                principal_name: principal_name.map(str::to_string),
                subject_kind: Some(SUBJECT_KIND_GROUP.to_string()),
                descriptor: None,
            },
            license_rule: AccessLevel {
                account_license_type,
                licensing_source,
            },
        })
    }

    fn identifier(&self, remote: &GroupEntitlement) -> Option<Identifier> {
        remote.id.as_deref().map(Identifier::from)
    }

    fn key(&self, _declared: &DeclaredState, id: &Identifier) -> EntityKey {
        EntityKey::new(id.as_str())
    }
}
