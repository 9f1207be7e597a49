//! Azure DevOps implementation of the engine gateway

use crate::client::RestClient;
use crate::config::{AzdoConfig, Endpoints};
use crate::error::Result;
use crate::wire::{
    FeedChange, GroupOperationReference, Identity, ListResponse, PatchOperation, StorageKey,
};
use async_trait::async_trait;
use converge_core::{
    AuditStream, ChangeRecord, EntityKey, EntityKind, Feed, Gateway, GatewayError, GatewayResult,
    GroupEntitlement, IdentityQuery, LifecycleStatus, PermissionGrant, Principal, RemoteEntity,
};
use reqwest::Method;
use serde_json::json;

const FEEDS_API_VERSION: &str = "7.1-preview.1";
const AUDIT_API_VERSION: &str = "7.1-preview.1";
const ENTITLEMENTS_API_VERSION: &str = "7.1-preview.1";
const GRAPH_API_VERSION: &str = "7.1-preview.1";
const IDENTITIES_API_VERSION: &str = "7.1";

/// REST gateway for one Azure DevOps organization
pub struct AzdoGateway {
    client: RestClient,
    endpoints: Endpoints,
}

impl AzdoGateway {
    pub fn new(config: AzdoConfig) -> Result<Self> {
        Ok(Self {
            client: RestClient::new(config.token)?,
            endpoints: config.endpoints,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    // ============ URLs ============

    /// `{feeds}[/{project}]/_apis/packaging/{path}`
    fn packaging_url(&self, project: Option<&str>, path: &str) -> String {
        match project {
            Some(project) => format!(
                "{}/{}/_apis/packaging/{}?api-version={}",
                self.endpoints.feeds, project, path, FEEDS_API_VERSION
            ),
            None => format!(
                "{}/_apis/packaging/{}?api-version={}",
                self.endpoints.feeds, path, FEEDS_API_VERSION
            ),
        }
    }

    fn feed_url(&self, key: &EntityKey, suffix: &str) -> String {
        let path = format!("feeds/{}{}", key.id, suffix);
        self.packaging_url(key.project.as_deref(), &path)
    }

    fn streams_url(&self, path: &str) -> String {
        format!(
            "{}/_apis/audit/streams{}?api-version={}",
            self.endpoints.audit, path, AUDIT_API_VERSION
        )
    }

    fn entitlements_url(&self, path: &str) -> String {
        format!(
            "{}/_apis/groupentitlements{}?api-version={}",
            self.endpoints.entitlements, path, ENTITLEMENTS_API_VERSION
        )
    }

    // ============ Group entitlements ============

    async fn apply_group_operation(
        &self,
        request: reqwest::RequestBuilder,
        fallback: Option<&EntityKey>,
    ) -> GatewayResult<RemoteEntity> {
        let reference: GroupOperationReference = self.client.send_json(request).await?;
        match (reference.into_entitlement()?, fallback) {
            (Some(entitlement), _) => Ok(entitlement.into()),
            (None, Some(key)) => self.get(EntityKind::GroupEntitlement, key).await,
            (None, None) => Err(GatewayError::Decode(
                "group entitlement operation returned no entitlement".to_string(),
            )),
        }
    }
}

fn unsupported(verb: &str, kind: EntityKind) -> GatewayError {
    GatewayError::Rejected(format!("{verb} is not supported for {kind}"))
}

fn stream_id(key: &EntityKey) -> GatewayResult<i64> {
    key.id.parse().map_err(|_| {
        GatewayError::Decode(format!("audit stream id must be numeric, got {:?}", key.id))
    })
}

#[async_trait]
impl Gateway for AzdoGateway {
    fn name(&self) -> &str {
        "azure-devops"
    }

    async fn get(&self, kind: EntityKind, key: &EntityKey) -> GatewayResult<RemoteEntity> {
        tracing::debug!(%kind, %key, "GET");
        match kind {
            EntityKind::Feed => {
                let request = self.client.request(Method::GET, &self.feed_url(key, ""));
                self.client.send_json::<Feed>(request).await.map(Into::into)
            }
            EntityKind::AuditStream => {
                let url = self.streams_url(&format!("/{}", key.id));
                let request = self.client.request(Method::GET, &url);
                self.client.send_json::<AuditStream>(request).await.map(Into::into)
            }
            EntityKind::GroupEntitlement => {
                let url = self.entitlements_url(&format!("/{}", key.id));
                let request = self.client.request(Method::GET, &url);
                self.client
                    .send_json::<GroupEntitlement>(request)
                    .await
                    .map(Into::into)
            }
            EntityKind::FeedPermission => Err(unsupported("get", kind)),
        }
    }

    async fn create(&self, kind: EntityKind, entity: &RemoteEntity) -> GatewayResult<RemoteEntity> {
        tracing::debug!(%kind, "POST");
        match entity {
            RemoteEntity::Feed(feed) => {
                let project = feed.project.as_ref().map(|p| p.id.as_str());
                let url = self.packaging_url(project, "feeds");
                let request = self.client.request(Method::POST, &url).json(feed);
                self.client.send_json::<Feed>(request).await.map(Into::into)
            }
            RemoteEntity::AuditStream(stream) => {
                let mut url = self.streams_url("");
                if let Some(days) = stream.days_to_backfill {
                    url.push_str(&format!("&daysToBackfill={days}"));
                }
                let request = self.client.request(Method::POST, &url).json(stream);
                self.client.send_json::<AuditStream>(request).await.map(Into::into)
            }
            RemoteEntity::GroupEntitlement(entitlement) => {
                let request = self
                    .client
                    .request(Method::POST, &self.entitlements_url(""))
                    .json(entitlement);
                self.apply_group_operation(request, None).await
            }
        }
    }

    async fn update(
        &self,
        kind: EntityKind,
        key: &EntityKey,
        entity: &RemoteEntity,
    ) -> GatewayResult<RemoteEntity> {
        tracing::debug!(%kind, %key, "UPDATE");
        match entity {
            RemoteEntity::Feed(feed) => {
                let request = self
                    .client
                    .request(Method::PATCH, &self.feed_url(key, ""))
                    .json(feed);
                self.client.send_json::<Feed>(request).await.map(Into::into)
            }
            RemoteEntity::AuditStream(stream) => {
                let stream = AuditStream {
                    id: Some(stream_id(key)?),
                    ..stream.clone()
                };
                let request = self
                    .client
                    .request(Method::PUT, &self.streams_url(""))
                    .json(&stream);
                self.client.send_json::<AuditStream>(request).await.map(Into::into)
            }
            RemoteEntity::GroupEntitlement(entitlement) => {
                let document = [PatchOperation::replace(
                    "/accessLevel",
                    json!({
                        "accountLicenseType": entitlement.license_rule.account_license_type,
                        "licensingSource": entitlement.license_rule.licensing_source,
                    }),
                )];
                let url = self.entitlements_url(&format!("/{}", key.id));
                let request = self.client.patch_document(&url, &document)?;
                self.apply_group_operation(request, Some(key)).await
            }
        }
    }

    async fn delete(&self, kind: EntityKind, key: &EntityKey) -> GatewayResult<()> {
        tracing::debug!(%kind, %key, "DELETE");
        let url = match kind {
            EntityKind::Feed => self.feed_url(key, ""),
            EntityKind::AuditStream => self.streams_url(&format!("/{}", key.id)),
            EntityKind::GroupEntitlement => self.entitlements_url(&format!("/{}", key.id)),
            EntityKind::FeedPermission => return Err(unsupported("delete", kind)),
        };
        self.client
            .send_empty(self.client.request(Method::DELETE, &url))
            .await
    }

    async fn purge(&self, kind: EntityKind, key: &EntityKey) -> GatewayResult<()> {
        if kind != EntityKind::Feed {
            return Err(unsupported("purge", kind));
        }
        tracing::debug!(%kind, %key, "Purging from recycle bin");
        let path = format!("feedrecyclebin/{}", key.id);
        let url = self.packaging_url(key.project.as_deref(), &path);
        self.client
            .send_empty(self.client.request(Method::DELETE, &url))
            .await
    }

    async fn restore(&self, kind: EntityKind, key: &EntityKey) -> GatewayResult<()> {
        if kind != EntityKind::Feed {
            return Err(unsupported("restore", kind));
        }
        tracing::debug!(%kind, %key, "Restoring from recycle bin");
        let path = format!("feedrecyclebin/{}", key.id);
        let url = self.packaging_url(key.project.as_deref(), &path);
        let document = [PatchOperation::replace("/isDeleted", json!(false))];
        let request = self.client.patch_document(&url, &document)?;
        self.client.send_empty(request).await
    }

    async fn set_status(
        &self,
        kind: EntityKind,
        key: &EntityKey,
        status: LifecycleStatus,
    ) -> GatewayResult<RemoteEntity> {
        if kind != EntityKind::AuditStream {
            return Err(unsupported("set_status", kind));
        }
        tracing::debug!(%kind, %key, %status, "Setting status");
        let mut url = self.streams_url(&format!("/{}", key.id));
        url.push_str(&format!("&status={status}"));
        let request = self.client.request(Method::PUT, &url);
        self.client.send_json::<AuditStream>(request).await.map(Into::into)
    }

    async fn query_change(&self, kind: EntityKind, key: &EntityKey) -> GatewayResult<ChangeRecord> {
        if kind != EntityKind::Feed {
            return Err(unsupported("query_change", kind));
        }
        let path = format!("feedchanges/{}", key.id);
        let url = self.packaging_url(key.project.as_deref(), &path);
        let request = self.client.request(Method::GET, &url);
        self.client
            .send_json::<FeedChange>(request)
            .await
            .map(Into::into)
    }

    async fn storage_key(&self, descriptor: &str) -> GatewayResult<String> {
        let url = format!(
            "{}/_apis/graph/storagekeys/{}?api-version={}",
            self.endpoints.identities, descriptor, GRAPH_API_VERSION
        );
        let request = self.client.request(Method::GET, &url);
        let key: StorageKey = self.client.send_json(request).await?;
        Ok(key.value)
    }

    async fn read_identity(&self, identity_id: &str) -> GatewayResult<Principal> {
        let url = format!(
            "{}/_apis/identities/{}?api-version={}",
            self.endpoints.identities, identity_id, IDENTITIES_API_VERSION
        );
        let request = self.client.request(Method::GET, &url);
        self.client
            .send_json::<Identity>(request)
            .await
            .map(Into::into)
    }

    async fn search_identities(&self, query: &IdentityQuery) -> GatewayResult<Vec<Principal>> {
        tracing::debug!(%query, "Searching identities");
        let request = match query {
            IdentityQuery::General(value) => {
                let url = format!("{}/_apis/identities", self.endpoints.identities);
                self.client.request(Method::GET, &url).query(&[
                    ("searchFilter", "General"),
                    ("filterValue", value.as_str()),
                    ("queryMembership", "None"),
                    ("api-version", IDENTITIES_API_VERSION),
                ])
            }
            IdentityQuery::ProjectGroups { project_id } => {
                let url = format!("{}/_apis/groups", self.endpoints.identities);
                self.client.request(Method::GET, &url).query(&[
                    ("scopeIds", project_id.as_str()),
                    ("api-version", IDENTITIES_API_VERSION),
                ])
            }
        };

        let response: ListResponse<Identity> = self.client.send_json(request).await?;
        Ok(response.value.into_iter().map(Principal::from).collect())
    }

    async fn list_grants(
        &self,
        kind: EntityKind,
        key: &EntityKey,
    ) -> GatewayResult<Vec<PermissionGrant>> {
        if kind != EntityKind::Feed {
            return Err(unsupported("list_grants", kind));
        }
        let request = self
            .client
            .request(Method::GET, &self.feed_url(key, "/permissions"));
        let response: ListResponse<PermissionGrant> = self.client.send_json(request).await?;
        Ok(response.value)
    }

    async fn set_grants(
        &self,
        kind: EntityKind,
        key: &EntityKey,
        grants: &[PermissionGrant],
    ) -> GatewayResult<()> {
        if kind != EntityKind::Feed {
            return Err(unsupported("set_grants", kind));
        }
        tracing::debug!(%kind, %key, count = grants.len(), "Setting permissions");
        let request = self
            .client
            .request(Method::PATCH, &self.feed_url(key, "/permissions"))
            .json(grants);
        self.client.send_empty(request).await
    }
}
