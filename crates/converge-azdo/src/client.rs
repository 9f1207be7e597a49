//! Authenticated REST client
//!
//! Personal access tokens go in HTTP basic auth with an empty user name.
//! Non-success responses become [`GatewayError::Status`] carrying the HTTP
//! status and the service's own message.

use crate::error::Result;
use converge_core::{GatewayError, GatewayResult};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

const JSON_PATCH: &str = "application/json-patch+json";

pub(crate) struct RestClient {
    http: reqwest::Client,
    token: String,
}

impl RestClient {
    pub(crate) fn new(token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("converge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
        })
    }

    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth("", Some(&self.token))
            .header(ACCEPT, "application/json")
    }

    /// Request with a JSON Patch document body
    pub(crate) fn patch_document<T: Serialize + ?Sized>(
        &self,
        url: &str,
        document: &T,
    ) -> GatewayResult<RequestBuilder> {
        let body =
            serde_json::to_vec(document).map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(self
            .request(Method::PATCH, url)
            .header(CONTENT_TYPE, JSON_PATCH)
            .body(body))
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> GatewayResult<T> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    pub(crate) async fn send_empty(&self, request: RequestBuilder) -> GatewayResult<()> {
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ServiceError>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        tracing::debug!(status = status.as_u16(), "Request failed: {}", message);
        Err(GatewayError::status(status.as_u16(), message))
    }
}

/// Error body returned by Azure DevOps services
#[derive(Debug, serde::Deserialize)]
struct ServiceError {
    message: String,
}
