use async_trait::async_trait;
use converge_core::{
    ChangeRecord, EntityKey, EntityKind, Gateway, GatewayError, GatewayResult, IdentityQuery,
    LifecycleStatus, PermissionGrant, Principal, RemoteEntity,
};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One recorded gateway call
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum Call {
    Get(EntityKey),
    Create(RemoteEntity),
    Update(EntityKey),
    Delete(EntityKey),
    Purge(EntityKey),
    Restore(EntityKey),
    SetStatus(LifecycleStatus),
    QueryChange(EntityKey),
    StorageKey(String),
    ReadIdentity(String),
    Search(IdentityQuery),
    ListGrants(EntityKey),
    SetGrants(Vec<PermissionGrant>),
}

impl Call {
    pub fn verb(&self) -> &'static str {
        match self {
            Call::Get(_) => "get",
            Call::Create(_) => "create",
            Call::Update(_) => "update",
            Call::Delete(_) => "delete",
            Call::Purge(_) => "purge",
            Call::Restore(_) => "restore",
            Call::SetStatus(_) => "set_status",
            Call::QueryChange(_) => "query_change",
            Call::StorageKey(_) => "storage_key",
            Call::ReadIdentity(_) => "read_identity",
            Call::Search(_) => "search_identities",
            Call::ListGrants(_) => "list_grants",
            Call::SetGrants(_) => "set_grants",
        }
    }
}

/// Scripted responses for one verb. The last scripted response repeats.
struct Script<T> {
    queue: Mutex<VecDeque<GatewayResult<T>>>,
    fallback: fn() -> GatewayResult<T>,
}

impl<T: Clone> Script<T> {
    fn new(fallback: fn() -> GatewayResult<T>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    fn push(&self, result: GatewayResult<T>) {
        self.queue.lock().unwrap().push_back(result);
    }

    fn next(&self) -> GatewayResult<T> {
        let mut queue = self.queue.lock().unwrap();
        match queue.len() {
            0 => (self.fallback)(),
            1 => queue[0].clone(),
            _ => queue.pop_front().unwrap(),
        }
    }
}

fn unscripted<T>() -> GatewayResult<T> {
    Err(GatewayError::Transport("unscripted call".to_string()))
}

fn ok_unit() -> GatewayResult<()> {
    Ok(())
}

/// In-memory gateway that replays scripted responses and records calls
pub struct ScriptedGateway {
    calls: Mutex<Vec<Call>>,
    get: Script<RemoteEntity>,
    create: Script<RemoteEntity>,
    update: Script<RemoteEntity>,
    delete: Script<()>,
    purge: Script<()>,
    restore: Script<()>,
    set_status: Script<RemoteEntity>,
    query_change: Script<ChangeRecord>,
    storage_key: Script<String>,
    read_identity: Script<Principal>,
    search: Script<Vec<Principal>>,
    list_grants: Script<Vec<PermissionGrant>>,
    set_grants: Script<()>,
}

#[allow(dead_code)]
impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            get: Script::new(unscripted),
            create: Script::new(unscripted),
            update: Script::new(unscripted),
            delete: Script::new(ok_unit),
            purge: Script::new(ok_unit),
            restore: Script::new(ok_unit),
            set_status: Script::new(unscripted),
            query_change: Script::new(|| Err(GatewayError::status(404, "no changes"))),
            storage_key: Script::new(unscripted),
            read_identity: Script::new(unscripted),
            search: Script::new(|| Ok(Vec::new())),
            list_grants: Script::new(|| Ok(Vec::new())),
            set_grants: Script::new(ok_unit),
        }
    }

    pub fn on_get(&self, result: GatewayResult<RemoteEntity>) -> &Self {
        self.get.push(result);
        self
    }

    pub fn on_create(&self, result: GatewayResult<RemoteEntity>) -> &Self {
        self.create.push(result);
        self
    }

    pub fn on_update(&self, result: GatewayResult<RemoteEntity>) -> &Self {
        self.update.push(result);
        self
    }

    pub fn on_delete(&self, result: GatewayResult<()>) -> &Self {
        self.delete.push(result);
        self
    }

    pub fn on_purge(&self, result: GatewayResult<()>) -> &Self {
        self.purge.push(result);
        self
    }

    pub fn on_restore(&self, result: GatewayResult<()>) -> &Self {
        self.restore.push(result);
        self
    }

    pub fn on_set_status(&self, result: GatewayResult<RemoteEntity>) -> &Self {
        self.set_status.push(result);
        self
    }

    pub fn on_query_change(&self, result: GatewayResult<ChangeRecord>) -> &Self {
        self.query_change.push(result);
        self
    }

    pub fn on_storage_key(&self, result: GatewayResult<String>) -> &Self {
        self.storage_key.push(result);
        self
    }

    pub fn on_read_identity(&self, result: GatewayResult<Principal>) -> &Self {
        self.read_identity.push(result);
        self
    }

    pub fn on_search(&self, result: GatewayResult<Vec<Principal>>) -> &Self {
        self.search.push(result);
        self
    }

    pub fn on_list_grants(&self, result: GatewayResult<Vec<PermissionGrant>>) -> &Self {
        self.list_grants.push(result);
        self
    }

    pub fn on_set_grants(&self, result: GatewayResult<()>) -> &Self {
        self.set_grants.push(result);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn verbs(&self) -> Vec<&'static str> {
        self.calls().iter().map(Call::verb).collect()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.calls().iter().filter(|c| c.verb() == verb).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn get(&self, _kind: EntityKind, key: &EntityKey) -> GatewayResult<RemoteEntity> {
        self.record(Call::Get(key.clone()));
        self.get.next()
    }

    async fn create(
        &self,
        _kind: EntityKind,
        entity: &RemoteEntity,
    ) -> GatewayResult<RemoteEntity> {
        self.record(Call::Create(entity.clone()));
        self.create.next()
    }

    async fn update(
        &self,
        _kind: EntityKind,
        key: &EntityKey,
        _entity: &RemoteEntity,
    ) -> GatewayResult<RemoteEntity> {
        self.record(Call::Update(key.clone()));
        self.update.next()
    }

    async fn delete(&self, _kind: EntityKind, key: &EntityKey) -> GatewayResult<()> {
        self.record(Call::Delete(key.clone()));
        self.delete.next()
    }

    async fn purge(&self, _kind: EntityKind, key: &EntityKey) -> GatewayResult<()> {
        self.record(Call::Purge(key.clone()));
        self.purge.next()
    }

    async fn restore(&self, _kind: EntityKind, key: &EntityKey) -> GatewayResult<()> {
        self.record(Call::Restore(key.clone()));
        self.restore.next()
    }

    async fn set_status(
        &self,
        _kind: EntityKind,
        _key: &EntityKey,
        status: LifecycleStatus,
    ) -> GatewayResult<RemoteEntity> {
        self.record(Call::SetStatus(status));
        self.set_status.next()
    }

    async fn query_change(
        &self,
        _kind: EntityKind,
        key: &EntityKey,
    ) -> GatewayResult<ChangeRecord> {
        self.record(Call::QueryChange(key.clone()));
        self.query_change.next()
    }

    async fn storage_key(&self, descriptor: &str) -> GatewayResult<String> {
        self.record(Call::StorageKey(descriptor.to_string()));
        self.storage_key.next()
    }

    async fn read_identity(&self, identity_id: &str) -> GatewayResult<Principal> {
        self.record(Call::ReadIdentity(identity_id.to_string()));
        self.read_identity.next()
    }

    async fn search_identities(&self, query: &IdentityQuery) -> GatewayResult<Vec<Principal>> {
        self.record(Call::Search(query.clone()));
        self.search.next()
    }

    async fn list_grants(
        &self,
        _kind: EntityKind,
        key: &EntityKey,
    ) -> GatewayResult<Vec<PermissionGrant>> {
        self.record(Call::ListGrants(key.clone()));
        self.list_grants.next()
    }

    async fn set_grants(
        &self,
        _kind: EntityKind,
        _key: &EntityKey,
        grants: &[PermissionGrant],
    ) -> GatewayResult<()> {
        self.record(Call::SetGrants(grants.to_vec()));
        self.set_grants.next()
    }
}

#[allow(dead_code)]
pub fn not_found() -> GatewayError {
    GatewayError::status(404, "VS800075: The entity does not exist")
}

#[allow(dead_code)]
pub fn principal(id: &str, descriptor: &str) -> Principal {
    Principal {
        id: id.to_string(),
        descriptor: descriptor.to_string(),
        ..Default::default()
    }
}
