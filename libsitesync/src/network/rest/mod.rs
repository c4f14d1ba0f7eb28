//! REST clients (WordPress.com style JSON API)
//!
//! Endpoints live under `{base_url}/sites/{site_id}/...` and authenticate with
//! the site's bearer token. Errors come back as
//! `{ "error": "unknown_plugin", "message": "Plugin not found" }`; newer
//! endpoints use `code` instead of `error`, and both are accepted.

use reqwest::Url;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use tracing::debug;

use super::{normalize, normalize_delete, Auth, HttpRequest, HttpResponse, NetworkContext, ProgressSink, TransportFault};
use crate::error::SyncError;
use crate::types::{Site, SiteApi};

pub mod media;
pub mod plugin;
pub mod post;

pub use media::RestMediaClient;
pub use plugin::RestPluginClient;
pub use post::RestPostClient;

pub const DEFAULT_BASE_URL: &str = "https://public-api.wordpress.com/rest/v1.1";

/// Shared plumbing for REST clients
#[derive(Clone)]
pub struct RestClient {
    ctx: NetworkContext,
    base_url: String,
}

impl RestClient {
    pub fn new(ctx: NetworkContext, base_url: impl Into<String>) -> Self {
        Self {
            ctx,
            base_url: base_url.into(),
        }
    }

    pub fn context(&self) -> &NetworkContext {
        &self.ctx
    }

    /// URL of `segments` below the site's root; each segment is percent-encoded
    pub fn site_url(&self, site: &Site, segments: &[&str], query: &[(&str, String)]) -> Result<String, SyncError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SyncError::generic(format!("Invalid REST base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::generic(format!("Invalid REST base URL {}", self.base_url)))?
            .pop_if_empty()
            .push("sites")
            .push(&site.id.to_string())
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        Ok(url.to_string())
    }

    /// Send `request` with the site's token and decode a JSON success body
    pub async fn execute<T: DeserializeOwned>(&self, site: &Site, request: HttpRequest) -> Result<T, SyncError> {
        let request = request.with_auth(auth(site)?);
        debug!(site_id = %site.id, url = %request.url, "REST request");
        let response = self.ctx.transport().send(request).await.map_err(normalize)?;
        decode(response).map_err(normalize)
    }

    /// Send a delete-style request, ignoring the success body
    ///
    /// Faults go through [`normalize_delete`], so a missing target comes back
    /// as `NOT_FOUND` even when the server adds a domain error code.
    pub async fn execute_delete(&self, site: &Site, request: HttpRequest) -> Result<(), SyncError> {
        let request = request.with_auth(auth(site)?);
        debug!(site_id = %site.id, url = %request.url, "REST delete request");
        let response = self.ctx.transport().send(request).await.map_err(normalize_delete)?;
        let _: IgnoredAny = decode(response).map_err(normalize_delete)?;
        Ok(())
    }

    /// Like [`execute`](Self::execute), reporting request body progress
    pub async fn execute_with_progress<T: DeserializeOwned>(
        &self,
        site: &Site,
        request: HttpRequest,
        progress: ProgressSink,
    ) -> Result<T, SyncError> {
        let request = request.with_auth(auth(site)?);
        debug!(site_id = %site.id, url = %request.url, "REST request with progress");
        let response = self
            .ctx
            .transport()
            .send_with_progress(request, progress)
            .await
            .map_err(normalize)?;
        decode(response).map_err(normalize)
    }
}

fn auth(site: &Site) -> Result<Auth, SyncError> {
    match &site.api {
        SiteApi::Rest { token } => Ok(Auth::Bearer(token.clone())),
        SiteApi::XmlRpc { .. } => Err(SyncError::requires_precondition(format!(
            "site {} is not reachable through the REST API",
            site.id
        ))),
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "code")]
    error: String,
    #[serde(default)]
    message: String,
}

/// Decode a success body, or turn an error response into a fault
pub(crate) fn decode<T: DeserializeOwned>(response: HttpResponse) -> Result<T, TransportFault> {
    if !response.is_success() {
        return Err(match serde_json::from_str::<ErrorBody>(&response.body) {
            Ok(body) => TransportFault::Api {
                status: response.status,
                code: body.error,
                message: body.message,
            },
            Err(_) => TransportFault::Status {
                status: response.status,
                body: response.body,
            },
        });
    }

    serde_json::from_str(&response.body)
        .map_err(|e| TransportFault::MalformedBody(format!("Failed to decode response: {}", e)))
}

/// Deserialize a JSON `false`/`null`/missing field as the type's default
///
/// The API sends `false` in place of absent strings and objects.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null | serde_json::Value::Bool(false) => Ok(T::default()),
        other => Ok(serde_json::from_value(other).unwrap_or_default()),
    }
}
