//! Declared state and the handles that correlate it with remote entities

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The caller's intended configuration for one managed entity.
///
/// Field names follow the schema layer (`name`, `project_id`, ...). Adapters
/// read only the fields they manage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclaredState {
    fields: BTreeMap<String, Value>,
}

impl DeclaredState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// String field; empty strings count as unset
    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Layer `observed` over `self`: observed values win, declared-only
    /// fields (local settings, write-only secrets) are kept.
    pub fn overlay(&self, observed: DeclaredState) -> DeclaredState {
        let mut merged = self.clone();
        for (key, value) in observed.fields {
            if !value.is_null() {
                merged.fields.insert(key, value);
            }
        }
        merged
    }
}

impl FromIterator<(String, Value)> for DeclaredState {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Stable handle persisted between reconciliation cycles
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Identifier {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// How the gateway addresses one remote entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Owning project for project-scoped entities
    pub project: Option<String>,

    /// Remote id or name
    pub id: String,
}

impl EntityKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            project: None,
            id: id.into(),
        }
    }

    pub fn in_project(project: Option<impl Into<String>>, id: impl Into<String>) -> Self {
        Self {
            project: project.map(Into::into),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.project {
            Some(project) => write!(f, "{}/{}", project, self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// Asynchronous provisioning status of a remote entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleStatus {
    Backfilling,
    Enabled,
    DisabledByUser,
    DisabledBySystem,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleStatus::Backfilling => write!(f, "backfilling"),
            LifecycleStatus::Enabled => write!(f, "enabled"),
            LifecycleStatus::DisabledByUser => write!(f, "disabledByUser"),
            LifecycleStatus::DisabledBySystem => write!(f, "disabledBySystem"),
            LifecycleStatus::Deleted => write!(f, "deleted"),
            LifecycleStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Kind of the latest change recorded against an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeType {
    AddOrUpdate,
    Delete,
}

/// Latest change recorded for an entity's natural key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub change_type: ChangeType,

    #[serde(default)]
    pub entity_id: Option<String>,
}

impl ChangeRecord {
    pub fn is_soft_delete(&self) -> bool {
        self.change_type == ChangeType::Delete
    }
}
