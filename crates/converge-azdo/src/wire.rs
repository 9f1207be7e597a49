//! Response and request bodies that differ from the engine's model types

use converge_core::{ChangeRecord, ChangeType, Feed, GatewayError, GroupEntitlement, Principal};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const ACCOUNT_PROPERTY: &str = "Account";
const OBJECT_ID_PROPERTY: &str = "http://schemas.microsoft.com/identity/claims/objectidentifier";

/// `{ "count": n, "value": [...] }` collection envelope
#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeedChange {
    pub change_type: ChangeType,
    #[serde(default)]
    pub feed: Option<Feed>,
}

impl From<FeedChange> for ChangeRecord {
    fn from(change: FeedChange) -> Self {
        ChangeRecord {
            change_type: change.change_type,
            entity_id: change.feed.and_then(|feed| feed.id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StorageKey {
    pub value: String,
}

/// One element of a JSON Patch document
#[derive(Debug, Serialize)]
pub(crate) struct PatchOperation {
    pub op: &'static str,
    pub path: &'static str,
    pub value: Value,
}

impl PatchOperation {
    pub fn replace(path: &'static str, value: Value) -> Self {
        Self {
            op: "replace",
            path,
            value,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Identity {
    pub id: String,
    pub descriptor: String,
    #[serde(default)]
    pub subject_descriptor: Option<String>,
    #[serde(default)]
    pub provider_display_name: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PropertyValue {
    #[serde(rename = "$value", default)]
    pub value: Value,
}

impl Identity {
    fn property(&self, name: &str) -> Option<String> {
        self.properties
            .get(name)
            .and_then(|p| p.value.as_str())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

impl From<Identity> for Principal {
    fn from(identity: Identity) -> Self {
        let principal_name = identity.property(ACCOUNT_PROPERTY);
        let origin_id = identity.property(OBJECT_ID_PROPERTY);
        let origin = match identity.subject_descriptor.as_deref() {
            Some(subject) if subject.starts_with("aad") => Some("aad".to_string()),
            Some(_) => Some("vsts".to_string()),
            None => None,
        };

        Principal {
            id: identity.id,
            descriptor: identity.descriptor,
            display_name: identity.provider_display_name,
            principal_name,
            origin,
            origin_id,
        }
    }
}

/// Reply of the group entitlement add and update calls
#[derive(Debug, Deserialize)]
pub(crate) struct GroupOperationReference {
    #[serde(default)]
    pub results: Vec<GroupOperationResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroupOperationResult {
    pub is_success: bool,
    #[serde(default)]
    pub errors: Vec<OperationError>,
    #[serde(default)]
    pub result: Option<GroupEntitlement>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OperationError {
    pub key: Value,
    pub value: Value,
}

impl GroupOperationReference {
    /// Entitlement from the first result, or the reported errors
    pub fn into_entitlement(self) -> Result<Option<GroupEntitlement>, GatewayError> {
        let Some(first) = self.results.into_iter().next() else {
            return Err(GatewayError::Decode(
                "group entitlement operation returned no results".to_string(),
            ));
        };
        if first.is_success {
            return Ok(first.result);
        }

        let message = if first.errors.is_empty() {
            "Unknown API error".to_string()
        } else {
            first
                .errors
                .iter()
                .map(|e| format!("({}) {}", display(&e.key), display(&e.value)))
                .collect::<Vec<_>>()
                .join("\n")
        };
        Err(GatewayError::Rejected(message))
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
