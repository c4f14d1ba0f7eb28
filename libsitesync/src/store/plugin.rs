//! Plugin store

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::emit_change;
use crate::action::{Action, ActionKind, PluginAction};
use crate::dispatcher::Subscriber;
use crate::error::SyncError;
use crate::events::{EventBus, StoreId};
use crate::network::PluginClient;
use crate::types::{Plugin, Site, SiteId};

/// Installed plugins per site
///
/// Plugin management is only offered by the REST API. Requests for sites
/// reached over XML-RPC are rejected with `OPERATION_REQUIRES_PRECONDITION`
/// without touching the network.
pub struct PluginStore {
    client: Arc<dyn PluginClient>,
    events: EventBus,
    plugins: Mutex<HashMap<SiteId, Vec<Plugin>>>,
}

impl PluginStore {
    pub fn new(client: Arc<dyn PluginClient>, events: EventBus) -> Self {
        Self {
            client,
            events,
            plugins: Mutex::new(HashMap::new()),
        }
    }

    /// Plugins of a site, in the order the server listed them
    pub fn site_plugins(&self, site_id: SiteId) -> Vec<Plugin> {
        self.plugins.lock().get(&site_id).cloned().unwrap_or_default()
    }

    pub fn site_plugin_by_name(&self, site_id: SiteId, name: &str) -> Option<Plugin> {
        self.plugins
            .lock()
            .get(&site_id)
            .and_then(|plugins| plugins.iter().find(|p| p.name == name).cloned())
    }

    fn emit(&self, cause: ActionKind, site_id: SiteId, error: Option<SyncError>) {
        emit_change(&self.events, StoreId::Plugin, cause, site_id, error);
    }

    /// Reject requests the site cannot serve; returns whether to proceed
    fn accepts(&self, cause: ActionKind, site: &Site) -> bool {
        if site.uses_rest_api() {
            return true;
        }
        self.emit(
            cause,
            site.id,
            Some(SyncError::requires_precondition(format!(
                "Plugin management for site {} requires the REST API",
                site.id
            ))),
        );
        false
    }

    /// Apply a result under the lock, then announce it
    fn apply<T>(
        &self,
        cause: ActionKind,
        site_id: SiteId,
        result: &Result<T, SyncError>,
        update: impl FnOnce(&mut Vec<Plugin>, &T),
    ) {
        match result {
            Ok(value) => {
                update(self.plugins.lock().entry(site_id).or_default(), value);
                self.emit(cause, site_id, None);
            }
            Err(err) => self.emit(cause, site_id, Some(err.clone())),
        }
    }
}

impl Subscriber for PluginStore {
    fn name(&self) -> &str {
        "plugin-store"
    }

    fn handle(&self, action: &Action) {
        let Action::Plugin(action) = action else {
            return;
        };
        let cause = action.kind();

        match action {
            PluginAction::FetchSitePlugins(site) => {
                if self.accepts(cause, site) {
                    self.client.fetch_site_plugins(site.clone());
                }
            }
            PluginAction::ConfigureSitePlugin { site, plugin } => {
                if self.accepts(cause, site) {
                    self.client.configure_site_plugin(site.clone(), plugin.clone());
                }
            }
            PluginAction::InstallSitePlugin { site, slug } => {
                if self.accepts(cause, site) {
                    self.client.install_site_plugin(site.clone(), slug.clone());
                }
            }
            PluginAction::DeleteSitePlugin { site, plugin } => {
                if self.accepts(cause, site) {
                    self.client.delete_site_plugin(site.clone(), plugin.clone());
                }
            }

            PluginAction::FetchedSitePlugins(payload) => {
                self.apply(cause, payload.site.id, &payload.result, |plugins, fetched| {
                    debug!(site_id = %payload.site.id, count = fetched.len(), "Replacing site plugins");
                    *plugins = fetched.clone();
                });
            }
            PluginAction::ConfiguredSitePlugin(payload) => {
                self.apply(cause, payload.site.id, &payload.result, upsert);
            }
            PluginAction::InstalledSitePlugin(payload) => {
                self.apply(cause, payload.site.id, &payload.result, upsert);
            }
            PluginAction::DeletedSitePlugin(payload) => {
                self.apply(cause, payload.site.id, &payload.result, |plugins, _| {
                    plugins.retain(|p| p.name != payload.plugin.name);
                });
            }
        }
    }
}

fn upsert(plugins: &mut Vec<Plugin>, plugin: &Plugin) {
    match plugins.iter_mut().find(|p| p.name == plugin.name) {
        Some(existing) => *existing = plugin.clone(),
        None => plugins.push(plugin.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::plugin as action;
    use crate::error::ErrorKind;
    use crate::events::ChangeReceiver;

    /// Records calls instead of doing network work
    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<String>>,
    }

    impl PluginClient for RecordingClient {
        fn fetch_site_plugins(&self, site: Site) {
            self.calls.lock().push(format!("fetch:{}", site.id));
        }
        fn configure_site_plugin(&self, site: Site, plugin: Plugin) {
            self.calls.lock().push(format!("configure:{}:{}", site.id, plugin.name));
        }
        fn install_site_plugin(&self, site: Site, slug: String) {
            self.calls.lock().push(format!("install:{}:{}", site.id, slug));
        }
        fn delete_site_plugin(&self, site: Site, plugin: Plugin) {
            self.calls.lock().push(format!("delete:{}:{}", site.id, plugin.name));
        }
    }

    fn setup() -> (PluginStore, Arc<RecordingClient>, ChangeReceiver) {
        let client = Arc::new(RecordingClient::default());
        let events = EventBus::new(16);
        let receiver = events.subscribe();
        (PluginStore::new(client.clone(), events), client, receiver)
    }

    fn site() -> Site {
        Site::rest(42, "https://example.wordpress.com", "token")
    }

    fn plugin(name: &str, active: bool) -> Plugin {
        Plugin {
            name: name.to_string(),
            slug: name.split('/').next().unwrap_or(name).to_string(),
            display_name: name.to_string(),
            active,
            ..Default::default()
        }
    }

    #[test]
    fn test_request_calls_client_without_event() {
        let (store, client, mut receiver) = setup();

        store.handle(&action::fetch_site_plugins(site()));
        store.handle(&action::install_site_plugin(site(), "jetpack"));

        assert_eq!(*client.calls.lock(), vec!["fetch:42", "install:42:jetpack"]);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_fetched_replaces_site_list() {
        let (store, _client, mut receiver) = setup();

        store.handle(&action::fetched_site_plugins(site(), Ok(vec![plugin("a/a", true), plugin("b/b", false)])));
        store.handle(&action::fetched_site_plugins(site(), Ok(vec![plugin("c/c", true)])));

        let names: Vec<_> = store.site_plugins(SiteId(42)).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["c/c"]);

        for _ in 0..2 {
            let event = receiver.try_recv().unwrap();
            assert_eq!(event.cause, ActionKind::FetchedSitePlugins);
            assert!(event.error.is_none());
        }
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_error_leaves_state_unchanged() {
        let (store, _client, mut receiver) = setup();
        store.handle(&action::fetched_site_plugins(site(), Ok(vec![plugin("a/a", true)])));
        let _ = receiver.try_recv();

        store.handle(&action::fetched_site_plugins(site(), Err(SyncError::not_found("HTTP 404"))));

        assert_eq!(store.site_plugins(SiteId(42)), vec![plugin("a/a", true)]);
        let event = receiver.try_recv().unwrap();
        assert_eq!(event.error.unwrap().kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_configure_and_install_upsert() {
        let (store, _client, _receiver) = setup();
        store.handle(&action::fetched_site_plugins(site(), Ok(vec![plugin("a/a", false)])));

        store.handle(&action::configured_site_plugin(site(), "a/a", Ok(plugin("a/a", true))));
        store.handle(&action::installed_site_plugin(site(), "b", Ok(plugin("b/b", false))));

        assert!(store.site_plugin_by_name(SiteId(42), "a/a").unwrap().active);
        assert!(store.site_plugin_by_name(SiteId(42), "b/b").is_some());
        assert_eq!(store.site_plugins(SiteId(42)).len(), 2);
    }

    #[test]
    fn test_deleted_removes_plugin() {
        let (store, _client, _receiver) = setup();
        store.handle(&action::fetched_site_plugins(site(), Ok(vec![plugin("a/a", false), plugin("b/b", false)])));

        store.handle(&action::deleted_site_plugin(site(), plugin("a/a", false), Ok(())));

        assert!(store.site_plugin_by_name(SiteId(42), "a/a").is_none());
        assert_eq!(store.site_plugins(SiteId(42)).len(), 1);
    }

    #[test]
    fn test_xmlrpc_site_requires_rest() {
        let (store, client, mut receiver) = setup();
        let site = Site::xmlrpc(7, "https://blog.example", "https://blog.example/xmlrpc.php", "admin", "pw");

        store.handle(&action::fetch_site_plugins(site));

        assert!(client.calls.lock().is_empty());
        let event = receiver.try_recv().unwrap();
        assert_eq!(event.cause, ActionKind::FetchSitePlugins);
        assert_eq!(event.error.unwrap().kind, ErrorKind::RequiresPrecondition);
    }

    #[test]
    fn test_ignores_other_domains() {
        let (store, client, mut receiver) = setup();
        store.handle(&crate::action::post::fetch_posts(site(), false));
        assert!(client.calls.lock().is_empty());
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_sites_are_independent() {
        let (store, _client, _receiver) = setup();
        let other = Site::rest(43, "https://other.wordpress.com", "token");

        store.handle(&action::fetched_site_plugins(site(), Ok(vec![plugin("a/a", true)])));
        store.handle(&action::fetched_site_plugins(other, Ok(vec![])));

        assert_eq!(store.site_plugins(SiteId(42)).len(), 1);
        assert!(store.site_plugins(SiteId(43)).is_empty());
    }
}
