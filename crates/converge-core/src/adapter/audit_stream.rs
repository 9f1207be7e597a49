//! Splunk audit stream adapter
//!
//! Audit streams are provisioned asynchronously: a new stream sits in
//! `backfilling` while previously recorded events are replayed into it.

use super::{EncodeContext, TypeAdapter, not_blank};
use crate::error::{ReconcileError, Result};
use crate::model::{AuditStream, EntityKind};
use crate::poll::StatusSets;
use crate::state::{DeclaredState, EntityKey, Identifier, LifecycleStatus};
use std::collections::BTreeMap;

pub const DAYS_TO_BACKFILL: &str = "days_to_backfill";
pub const ENABLED: &str = "enabled";
pub const NAME: &str = "name";
pub const URL: &str = "url";
pub const COLLECTOR_TOKEN: &str = "collector_token";

pub const CONSUMER_TYPE: &str = "Splunk";
const INPUT_URL: &str = "SplunkUrl";
const INPUT_TOKEN: &str = "SplunkEventCollectorToken";

#[derive(Debug, Clone, Copy, Default)]
pub struct AuditStreamAdapter;

fn validate_https_url(value: &str) -> Result<&str> {
    let rest = value.strip_prefix("https://").ok_or_else(|| {
        ReconcileError::validation(format!("{URL} must use https, got {value:?}"))
    })?;
    let host = rest.split(&['/', ':'][..]).next().unwrap_or_default();
    if host.is_empty() {
        return Err(ReconcileError::validation(format!("{URL} has no host: {value:?}")));
    }
    Ok(value)
}

impl TypeAdapter for AuditStreamAdapter {
    type Remote = AuditStream;

    fn kind(&self) -> EntityKind {
        EntityKind::AuditStream
    }

    fn managed_fields(&self) -> &'static [&'static str] {
        &[DAYS_TO_BACKFILL, ENABLED, NAME, URL, COLLECTOR_TOKEN]
    }

    fn decode(&self, remote: &AuditStream) -> DeclaredState {
        let mut state = DeclaredState::new();
        if let Some(name) = &remote.display_name {
            state.set(NAME, name.clone());
        }
        if let Some(url) = remote.consumer_inputs.get(INPUT_URL) {
            state.set(URL, url.clone());
        }
        if let Some(token) = remote.consumer_inputs.get(INPUT_TOKEN) {
            state.set(COLLECTOR_TOKEN, token.clone());
        }
        match remote.status {
            Some(LifecycleStatus::Enabled) => state.set(ENABLED, true),
            Some(LifecycleStatus::DisabledByUser | LifecycleStatus::DisabledBySystem) => {
                state.set(ENABLED, false)
            }
            _ => {}
        }
        state
    }

    fn encode(&self, declared: &DeclaredState, ctx: &EncodeContext) -> Result<AuditStream> {
        let url = ctx
            .resolve(declared, URL)
            .ok_or_else(|| ReconcileError::validation(format!("{URL} is required")))?;
        let url = validate_https_url(not_blank(URL, url)?)?;

        let token = ctx
            .resolve(declared, COLLECTOR_TOKEN)
            .ok_or_else(|| ReconcileError::validation(format!("{COLLECTOR_TOKEN} is required")))?;
        let token = not_blank(COLLECTOR_TOKEN, token)?;

        let days = declared.i64(DAYS_TO_BACKFILL).unwrap_or(0);
        let days = u32::try_from(days).map_err(|_| {
            ReconcileError::validation(format!("{DAYS_TO_BACKFILL} must be at least 0, got {days}"))
        })?;

        let consumer_inputs = BTreeMap::from([
            (INPUT_URL.to_string(), url.to_string()),
            (INPUT_TOKEN.to_string(), token.to_string()),
        ]);

        Ok(AuditStream {
            consumer_type: Some(CONSUMER_TYPE.to_string()),
            consumer_inputs,
            days_to_backfill: Some(days),
            ..Default::default()
        })
    }

    fn identifier(&self, remote: &AuditStream) -> Option<Identifier> {
        remote.id.map(|id| Identifier::new(id.to_string()))
    }

    fn key(&self, _declared: &DeclaredState, id: &Identifier) -> EntityKey {
        EntityKey::new(id.as_str())
    }

    fn status(&self, remote: &AuditStream) -> Option<LifecycleStatus> {
        Some(remote.status.unwrap_or(LifecycleStatus::Unknown))
    }

    fn desired_status(&self, declared: &DeclaredState) -> Option<LifecycleStatus> {
        if declared.bool(ENABLED).unwrap_or(true) {
            Some(LifecycleStatus::Enabled)
        } else {
            Some(LifecycleStatus::DisabledByUser)
        }
    }

    fn stabilization(&self) -> Option<StatusSets> {
        Some(StatusSets {
            pending: vec![LifecycleStatus::Backfilling],
            target: vec![
                LifecycleStatus::Enabled,
                LifecycleStatus::DisabledByUser,
                LifecycleStatus::DisabledBySystem,
            ],
        })
    }

    fn env_defaults(&self) -> &'static [(&'static str, &'static str)] {
        &[
            (URL, "AZDO_AUDIT_SPLUNK_URL"),
            (COLLECTOR_TOKEN, "AZDO_AUDIT_SPLUNK_COLLECTOR_TOKEN"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared() -> DeclaredState {
        DeclaredState::new()
            .with(URL, "https://splunk.example.com:8088")
            .with(COLLECTOR_TOKEN, "token-1")
            .with(DAYS_TO_BACKFILL, 3)
    }

    #[test]
    fn test_round_trip() {
        let remote = AuditStream {
            id: Some(41),
            consumer_type: Some(CONSUMER_TYPE.to_string()),
            consumer_inputs: BTreeMap::from([
                (INPUT_URL.to_string(), "https://splunk:8088".to_string()),
                (INPUT_TOKEN.to_string(), "secret".to_string()),
            ]),
            display_name: Some("Splunk stream".to_string()),
            status: Some(LifecycleStatus::Enabled),
            ..Default::default()
        };

        let adapter = AuditStreamAdapter;
        let encoded = adapter
            .encode(&adapter.decode(&remote), &EncodeContext::new())
            .unwrap();

        assert_eq!(encoded.consumer_type, remote.consumer_type);
        assert_eq!(encoded.consumer_inputs, remote.consumer_inputs);
        // identity and status stay with the remote
        assert_eq!(encoded.id, None);
        assert_eq!(encoded.status, None);
    }

    #[test]
    fn test_encode_carries_backfill() {
        let stream = AuditStreamAdapter
            .encode(&declared(), &EncodeContext::new())
            .unwrap();
        assert_eq!(stream.days_to_backfill, Some(3));
        assert_eq!(stream.consumer_inputs[INPUT_TOKEN], "token-1");
    }

    #[test]
    fn test_negative_backfill_rejected() {
        let state = declared().with(DAYS_TO_BACKFILL, -1);
        let err = AuditStreamAdapter
            .encode(&state, &EncodeContext::new())
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
    }

    #[test]
    fn test_url_must_be_https() {
        let state = declared().with(URL, "http://splunk:8088");
        assert!(AuditStreamAdapter.encode(&state, &EncodeContext::new()).is_err());

        let state = declared().with(URL, "https://");
        assert!(AuditStreamAdapter.encode(&state, &EncodeContext::new()).is_err());
    }

    #[test]
    fn test_ambient_defaults() {
        let ctx = EncodeContext::new()
            .with_default(URL, "https://from-env:8088")
            .with_default(COLLECTOR_TOKEN, "env-token");

        let stream = AuditStreamAdapter.encode(&DeclaredState::new(), &ctx).unwrap();
        assert_eq!(stream.consumer_inputs[INPUT_URL], "https://from-env:8088");
        assert_eq!(stream.consumer_inputs[INPUT_TOKEN], "env-token");

        let err = AuditStreamAdapter
            .encode(&DeclaredState::new(), &EncodeContext::new())
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
    }

    #[test]
    fn test_desired_status() {
        let adapter = AuditStreamAdapter;
        assert_eq!(
            adapter.desired_status(&declared()),
            Some(LifecycleStatus::Enabled)
        );
        assert_eq!(
            adapter.desired_status(&declared().with(ENABLED, false)),
            Some(LifecycleStatus::DisabledByUser)
        );
    }
}
