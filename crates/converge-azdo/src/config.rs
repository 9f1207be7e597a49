//! Connection settings
//!
//! Azure DevOps spreads its REST surface over several hosts per
//! organization (`feeds.`, `auditservice.`, `vsaex.`, `vssps.`). Each one is
//! kept separately so a test can point them all at a single mock server.

use crate::error::{AzdoError, Result};

pub const ORG_SERVICE_URL_ENV: &str = "AZDO_ORG_SERVICE_URL";
pub const PERSONAL_ACCESS_TOKEN_ENV: &str = "AZDO_PERSONAL_ACCESS_TOKEN";

/// Base URLs of the services the gateway talks to, organization included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub feeds: String,
    pub audit: String,
    pub entitlements: String,
    pub identities: String,
}

impl Endpoints {
    pub fn for_organization(organization: &str) -> Self {
        Self {
            feeds: format!("https://feeds.dev.azure.com/{organization}"),
            audit: format!("https://auditservice.dev.azure.com/{organization}"),
            entitlements: format!("https://vsaex.dev.azure.com/{organization}"),
            identities: format!("https://vssps.dev.azure.com/{organization}"),
        }
    }

    /// Every service under one base URL
    pub fn uniform(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            feeds: base.clone(),
            audit: base.clone(),
            entitlements: base.clone(),
            identities: base,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AzdoConfig {
    pub organization: String,
    pub token: String,
    pub endpoints: Endpoints,
}

impl AzdoConfig {
    /// Settings for `https://dev.azure.com/{org}` or `https://{org}.visualstudio.com`
    pub fn new(org_service_url: &str, token: impl Into<String>) -> Result<Self> {
        let organization = organization_from_url(org_service_url)?;
        let token = token.into();
        if token.trim().is_empty() {
            return Err(AzdoError::InvalidConfig(
                "personal access token is empty".to_string(),
            ));
        }

        Ok(Self {
            endpoints: Endpoints::for_organization(&organization),
            organization,
            token,
        })
    }

    /// Create AzdoConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(ORG_SERVICE_URL_ENV)
            .map_err(|_| AzdoError::MissingEnvVar(ORG_SERVICE_URL_ENV.to_string()))?;
        let token = std::env::var(PERSONAL_ACCESS_TOKEN_ENV)
            .map_err(|_| AzdoError::MissingEnvVar(PERSONAL_ACCESS_TOKEN_ENV.to_string()))?;
        Self::new(&url, token)
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

fn organization_from_url(value: &str) -> Result<String> {
    let url = reqwest::Url::parse(value)
        .map_err(|e| AzdoError::InvalidConfig(format!("{ORG_SERVICE_URL_ENV} {value:?}: {e}")))?;
    let host = url.host_str().unwrap_or_default();

    let organization = if let Some(org) = host.strip_suffix(".visualstudio.com") {
        Some(org.to_string())
    } else {
        url.path_segments()
            .and_then(|mut segments| segments.find(|s| !s.is_empty()))
            .map(str::to_string)
    };

    organization.ok_or_else(|| {
        AzdoError::InvalidConfig(format!(
            "cannot find the organization in {ORG_SERVICE_URL_ENV} {value:?}"
        ))
    })
}
