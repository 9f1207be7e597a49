//! Artifact feed adapter
//!
//! Feeds are created synchronously. Deleting one moves it to the recycle
//! bin, from which it can be restored or purged.

use super::{EncodeContext, TypeAdapter, optional_uuid, require_str};
use crate::error::Result;
use crate::model::{EntityKind, Feed, ProjectReference};
use crate::state::{DeclaredState, EntityKey, Identifier};

pub const NAME: &str = "name";
pub const PROJECT_ID: &str = "project_id";
pub const PERMANENT_DELETE: &str = "permanent_delete";
pub const RESTORED: &str = "restored";

#[derive(Debug, Clone, Copy, Default)]
pub struct FeedAdapter;

impl FeedAdapter {
    fn project(declared: &DeclaredState) -> Option<String> {
        declared.str(PROJECT_ID).map(str::to_string)
    }
}

impl TypeAdapter for FeedAdapter {
    type Remote = Feed;

    fn kind(&self) -> EntityKind {
        EntityKind::Feed
    }

    fn managed_fields(&self) -> &'static [&'static str] {
        &[NAME, PROJECT_ID, PERMANENT_DELETE, RESTORED]
    }

    fn decode(&self, remote: &Feed) -> DeclaredState {
        let mut state = DeclaredState::new().with(NAME, remote.name.clone());
        if let Some(project) = &remote.project {
            state.set(PROJECT_ID, project.id.clone());
        }
        state
    }

    fn encode(&self, declared: &DeclaredState, _ctx: &EncodeContext) -> Result<Feed> {
        let name = require_str(declared, NAME)?;
        let project = optional_uuid(declared, PROJECT_ID)?;

        Ok(Feed {
            id: None,
            name: name.to_string(),
            project: project.map(|id| ProjectReference { id, name: None }),
        })
    }

    fn identifier(&self, remote: &Feed) -> Option<Identifier> {
        remote.id.as_deref().map(Identifier::from)
    }

    fn key(&self, declared: &DeclaredState, id: &Identifier) -> EntityKey {
        EntityKey::in_project(Self::project(declared), id.as_str())
    }

    /// Feeds are addressed by name until the remote assigns an id
    fn natural_key(&self, declared: &DeclaredState) -> Result<Option<EntityKey>> {
        let name = require_str(declared, NAME)?;
        Ok(Some(EntityKey::in_project(Self::project(declared), name)))
    }

    fn supports_restore(&self) -> bool {
        true
    }

    fn mark_restored(&self, state: &mut DeclaredState, restored: bool) {
        state.set(RESTORED, restored);
    }

    fn purge_requested(&self, declared: &DeclaredState) -> bool {
        declared.bool(PERMANENT_DELETE).unwrap_or(true)
    }
}
