//! Remote entity records
//!
//! These mirror the Azure DevOps REST payloads closely enough to be sent and
//! received as JSON by a gateway. The engine only ever holds transient copies.

use crate::error::ReconcileError;
use crate::state::LifecycleStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Managed entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Feed,
    AuditStream,
    GroupEntitlement,
    FeedPermission,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Feed => write!(f, "feed"),
            EntityKind::AuditStream => write!(f, "audit_stream"),
            EntityKind::GroupEntitlement => write!(f, "group_entitlement"),
            EntityKind::FeedPermission => write!(f, "feed_permission"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feed" => Ok(EntityKind::Feed),
            "audit_stream" | "audit_stream_splunk" => Ok(EntityKind::AuditStream),
            "group_entitlement" => Ok(EntityKind::GroupEntitlement),
            "feed_permission" => Ok(EntityKind::FeedPermission),
            other => Err(ReconcileError::validation(format!("unknown entity kind: {other}"))),
        }
    }
}

/// Record returned by the gateway for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteEntity {
    Feed(Feed),
    AuditStream(AuditStream),
    GroupEntitlement(GroupEntitlement),
}

impl RemoteEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            RemoteEntity::Feed(_) => EntityKind::Feed,
            RemoteEntity::AuditStream(_) => EntityKind::AuditStream,
            RemoteEntity::GroupEntitlement(_) => EntityKind::GroupEntitlement,
        }
    }

    fn mismatch(expected: EntityKind, actual: &RemoteEntity) -> ReconcileError {
        ReconcileError::KindMismatch {
            expected: expected.to_string(),
            actual: actual.kind().to_string(),
        }
    }
}

macro_rules! remote_variant {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for RemoteEntity {
            fn from(value: $ty) -> Self {
                RemoteEntity::$variant(value)
            }
        }

        impl TryFrom<RemoteEntity> for $ty {
            type Error = ReconcileError;

            fn try_from(value: RemoteEntity) -> Result<Self, Self::Error> {
                match value {
                    RemoteEntity::$variant(inner) => Ok(inner),
                    other => Err(RemoteEntity::mismatch(EntityKind::$variant, &other)),
                }
            }
        }
    };
}

remote_variant!(Feed, Feed);
remote_variant!(AuditStream, AuditStream);
remote_variant!(GroupEntitlement, GroupEntitlement);

// ============ Feeds ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectReference {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ============ Audit streams ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStream {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_type: Option<String>,

    #[serde(default)]
    pub consumer_inputs: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LifecycleStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,

    /// Create-time query parameter, never part of the payload
    #[serde(skip)]
    pub days_to_backfill: Option<u32>,
}

// ============ Group entitlements ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntitlement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub group: GraphGroup,

    pub license_rule: AccessLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLevel {
    pub account_license_type: AccountLicenseType,
    pub licensing_source: LicensingSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountLicenseType {
    Advanced,
    EarlyAdopter,
    #[default]
    Express,
    None,
    Professional,
    Stakeholder,
}

impl std::fmt::Display for AccountLicenseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountLicenseType::Advanced => write!(f, "advanced"),
            AccountLicenseType::EarlyAdopter => write!(f, "earlyAdopter"),
            AccountLicenseType::Express => write!(f, "express"),
            AccountLicenseType::None => write!(f, "none"),
            AccountLicenseType::Professional => write!(f, "professional"),
            AccountLicenseType::Stakeholder => write!(f, "stakeholder"),
        }
    }
}

impl FromStr for AccountLicenseType {
    type Err = ReconcileError;

    /// Case-insensitive; `basic` is the portal name for `express`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "advanced" => Ok(AccountLicenseType::Advanced),
            "earlyadopter" => Ok(AccountLicenseType::EarlyAdopter),
            "express" | "basic" => Ok(AccountLicenseType::Express),
            "none" => Ok(AccountLicenseType::None),
            "professional" => Ok(AccountLicenseType::Professional),
            "stakeholder" => Ok(AccountLicenseType::Stakeholder),
            other => Err(ReconcileError::validation(format!(
                "unknown account license type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LicensingSource {
    None,
    #[default]
    Account,
    Msdn,
    Profile,
    Auto,
    Trial,
}

impl std::fmt::Display for LicensingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LicensingSource::None => write!(f, "none"),
            LicensingSource::Account => write!(f, "account"),
            LicensingSource::Msdn => write!(f, "msdn"),
            LicensingSource::Profile => write!(f, "profile"),
            LicensingSource::Auto => write!(f, "auto"),
            LicensingSource::Trial => write!(f, "trial"),
        }
    }
}

impl FromStr for LicensingSource {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(LicensingSource::None),
            "account" => Ok(LicensingSource::Account),
            "msdn" => Ok(LicensingSource::Msdn),
            "profile" => Ok(LicensingSource::Profile),
            "auto" => Ok(LicensingSource::Auto),
            "trial" => Ok(LicensingSource::Trial),
            other => Err(ReconcileError::validation(format!("unknown licensing source: {other}"))),
        }
    }
}

// ============ Identities and grants ============

/// A resolved identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,

    pub descriptor: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
}

/// Role assigned to a principal on a feed. `None` revokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedRole {
    None,
    Reader,
    Contributor,
    Collaborator,
    Administrator,
    Custom,
}

impl std::fmt::Display for FeedRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedRole::None => write!(f, "none"),
            FeedRole::Reader => write!(f, "reader"),
            FeedRole::Contributor => write!(f, "contributor"),
            FeedRole::Collaborator => write!(f, "collaborator"),
            FeedRole::Administrator => write!(f, "administrator"),
            FeedRole::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for FeedRole {
    type Err = ReconcileError;

    /// Only roles that can be declared are accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reader" => Ok(FeedRole::Reader),
            "contributor" => Ok(FeedRole::Contributor),
            "collaborator" => Ok(FeedRole::Collaborator),
            "administrator" => Ok(FeedRole::Administrator),
            other => Err(ReconcileError::validation(format!(
                "role must be one of reader, contributor, collaborator, administrator; got {other:?}"
            ))),
        }
    }
}

/// One role assignment on a parent entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    pub identity_descriptor: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,

    pub role: FeedRole,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl PermissionGrant {
    pub fn new(principal: &Principal, role: FeedRole) -> Self {
        Self {
            identity_descriptor: principal.descriptor.clone(),
            identity_id: Some(principal.id.clone()),
            role,
            display_name: None,
        }
    }

    /// Revocation entry: the remote models removal as role `None`
    pub fn revoke(principal: &Principal) -> Self {
        Self {
            identity_descriptor: principal.descriptor.clone(),
            identity_id: None,
            role: FeedRole::None,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = display_name;
        self
    }
}
