//! Plugin management over REST

use serde::Deserialize;
use serde_json::json;

use super::{lenient, RestClient};
use crate::action::plugin as action;
use crate::error::SyncError;
use crate::network::{absorb_not_found, Body, HttpRequest, PluginClient};
use crate::types::{Plugin, Site};

/// Plugin record as the API sends it
#[derive(Debug, Deserialize)]
pub(crate) struct PluginResponse {
    /// "akismet/akismet"; older endpoints only send `name`
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    display_name: String,
    #[serde(default, deserialize_with = "lenient")]
    version: Option<String>,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    autoupdate: bool,
    #[serde(default, deserialize_with = "lenient")]
    plugin_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    description: Option<String>,
}

impl From<PluginResponse> for Plugin {
    fn from(response: PluginResponse) -> Self {
        let name = if response.id.is_empty() {
            response.name.clone()
        } else {
            response.id
        };
        let display_name = [response.display_name, response.name]
            .into_iter()
            .find(|candidate| !candidate.is_empty())
            .unwrap_or_else(|| name.clone());
        Plugin {
            name,
            slug: response.slug,
            display_name,
            version: response.version,
            active: response.active,
            autoupdate: response.autoupdate,
            plugin_url: response.plugin_url,
            description: response.description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PluginListResponse {
    #[serde(default)]
    plugins: Vec<PluginResponse>,
}

pub struct RestPluginClient {
    client: RestClient,
}

impl RestPluginClient {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

impl PluginClient for RestPluginClient {
    fn fetch_site_plugins(&self, site: Site) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = fetch_plugins(&client, &site).await;
            action::fetched_site_plugins(site, result)
        });
    }

    fn configure_site_plugin(&self, site: Site, plugin: Plugin) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = configure_plugin(&client, &site, &plugin).await;
            action::configured_site_plugin(site, plugin.name, result)
        });
    }

    fn install_site_plugin(&self, site: Site, slug: String) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = install_plugin(&client, &site, &slug).await;
            action::installed_site_plugin(site, slug, result)
        });
    }

    fn delete_site_plugin(&self, site: Site, plugin: Plugin) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = delete_plugin(&client, &site, &plugin).await;
            action::deleted_site_plugin(site, plugin, absorb_not_found(result))
        });
    }
}

async fn fetch_plugins(client: &RestClient, site: &Site) -> Result<Vec<Plugin>, SyncError> {
    let url = client.site_url(site, &["plugins"], &[])?;
    let list: PluginListResponse = client.execute(site, HttpRequest::get(url)).await?;
    Ok(list.plugins.into_iter().map(Plugin::from).collect())
}

async fn configure_plugin(client: &RestClient, site: &Site, plugin: &Plugin) -> Result<Plugin, SyncError> {
    let url = client.site_url(site, &["plugins", &plugin.name], &[])?;
    let body = Body::Json(json!({
        "active": plugin.active,
        "autoupdate": plugin.autoupdate,
    }));
    let response: PluginResponse = client.execute(site, HttpRequest::post(url, body)).await?;
    Ok(response.into())
}

async fn install_plugin(client: &RestClient, site: &Site, slug: &str) -> Result<Plugin, SyncError> {
    let url = client.site_url(site, &["plugins", slug, "install"], &[])?;
    let response: PluginResponse = client.execute(site, HttpRequest::post(url, Body::Empty)).await?;
    Ok(response.into())
}

async fn delete_plugin(client: &RestClient, site: &Site, plugin: &Plugin) -> Result<(), SyncError> {
    let url = client.site_url(site, &["plugins", &plugin.name, "delete"], &[])?;
    client.execute_delete(site, HttpRequest::post(url, Body::Empty)).await
}
