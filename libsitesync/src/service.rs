//! Service facade for sitesync
//!
//! [`SiteSync`] wires the pipeline together: one dispatcher, one event bus,
//! the HTTP transport, the REST and XML-RPC clients, and the three stores,
//! registered in a fixed order (posts, media, plugins).
//!
//! # Example
//!
//! ```no_run
//! use libsitesync::action::plugin;
//! use libsitesync::service::SiteSync;
//!
//! # async fn example() -> libsitesync::Result<()> {
//! let sync = SiteSync::new()?;
//! let site = sync.config().site(42)?;
//!
//! sync.request(plugin::fetch_site_plugins(site)).await?;
//! for p in sync.plugins().site_plugins(libsitesync::SiteId(42)) {
//!     println!("{} {}", p.name, p.active);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::action::{Action, ActionKind};
use crate::config::Config;
use crate::dispatcher::{Dispatcher, SubscriberId};
use crate::error::{Result, SitesyncError, SyncError};
use crate::events::{ChangeEvent, ChangeReceiver, EventBus};
use crate::network::rest::{RestClient, RestMediaClient, RestPluginClient, RestPostClient};
use crate::network::transport::ReqwestTransport;
use crate::network::xmlrpc::{XmlRpcClient, XmlRpcMediaClient, XmlRpcPostClient};
use crate::network::{HttpTransport, NetworkContext};
use crate::store::{MediaStore, PluginStore, PostStore};
use crate::types::SiteId;

/// Extra time `request` waits beyond the network timeout
const REQUEST_GRACE: Duration = Duration::from_secs(5);

pub struct SiteSync {
    config: Arc<Config>,
    dispatcher: Dispatcher,
    events: EventBus,
    posts: Arc<PostStore>,
    media: Arc<MediaStore>,
    plugins: Arc<PluginStore>,
    registrations: Vec<SubscriberId>,
    request_timeout: Duration,
}

impl SiteSync {
    /// Create a service from the default configuration file
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config)
    }

    /// Create a service using the production HTTP transport
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the network timeout is not a valid duration
    /// - the HTTP client cannot be built
    /// - there is no current tokio runtime
    pub fn from_config(config: Config) -> Result<Self> {
        let transport = ReqwestTransport::new(config.network.timeout()?, &config.network.user_agent)?;
        let runtime = Handle::try_current().map_err(|e| {
            SitesyncError::InvalidInput(format!("sitesync needs a tokio runtime: {}", e))
        })?;
        Self::with_transport(config, Arc::new(transport), runtime)
    }

    /// Create a service over any transport, e.g. a `MockTransport` in tests
    pub fn with_transport(
        config: Config,
        transport: Arc<dyn HttpTransport>,
        runtime: Handle,
    ) -> Result<Self> {
        let request_timeout = config.network.timeout()? + REQUEST_GRACE;
        let dispatcher = Dispatcher::new();
        let events = EventBus::new(config.network.event_capacity);

        let ctx = NetworkContext::new(dispatcher.clone(), transport.clone(), runtime);
        let rest = RestClient::new(ctx.clone(), config.network.rest_base_url.clone());
        let xmlrpc = XmlRpcClient::new(ctx);

        let posts = Arc::new(PostStore::new(
            Arc::new(RestPostClient::new(rest.clone())),
            Arc::new(XmlRpcPostClient::new(xmlrpc.clone())),
            events.clone(),
        ));
        let media = Arc::new(MediaStore::new(
            Arc::new(RestMediaClient::new(rest.clone())),
            Arc::new(XmlRpcMediaClient::new(xmlrpc)),
            events.clone(),
        ));
        let plugins = Arc::new(PluginStore::new(Arc::new(RestPluginClient::new(rest)), events.clone()));

        let registrations = vec![
            dispatcher.register(posts.clone()),
            dispatcher.register(media.clone()),
            dispatcher.register(plugins.clone()),
        ];

        info!(transport = transport.name(), sites = config.sites.len(), "sitesync initialized");

        Ok(Self {
            config: Arc::new(config),
            dispatcher,
            events,
            posts,
            media,
            plugins,
            registrations,
            request_timeout,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn posts(&self) -> &PostStore {
        &self.posts
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    pub fn plugins(&self) -> &PluginStore {
        &self.plugins
    }

    /// Subscribe to change events emitted after this call
    pub fn subscribe(&self) -> ChangeReceiver {
        self.events.subscribe()
    }

    pub fn dispatch(&self, action: Action) -> Result<()> {
        self.dispatcher.dispatch(action)?;
        Ok(())
    }

    /// Dispatch a request and wait until its outcome reaches the stores
    ///
    /// Resolves on the change event that finishes the request: the result
    /// action, or an immediate rejection by the owning store. Progress events
    /// are skipped. A failed outcome is returned as
    /// [`SitesyncError::Sync`].
    pub async fn request(&self, action: Action) -> Result<ChangeEvent> {
        let kind = action.kind();
        let site_id = action.site_id();

        let mut receiver = self.events.subscribe();
        self.dispatch(action)?;

        let wait = async {
            loop {
                let event = match receiver.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Change event receiver lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        return Err(SitesyncError::Sync(SyncError::generic("event bus closed")));
                    }
                };
                if !event.is_final() || !finishes(kind, site_id, &event) {
                    continue;
                }
                return match event.error.clone() {
                    Some(err) => Err(SitesyncError::Sync(err)),
                    None => Ok(event),
                };
            }
        };

        tokio::time::timeout(self.request_timeout, wait)
            .await
            .map_err(|_| SyncError::generic(format!("timed out waiting for {}", kind.completion())))?
    }

    /// Unregister the stores and stop accepting actions
    ///
    /// Network operations still in flight finish, but their results are
    /// dropped.
    pub fn shutdown(&self) {
        for id in &self.registrations {
            self.dispatcher.unregister(*id);
        }
        self.dispatcher.shutdown();
        info!("sitesync shut down");
    }
}

fn finishes(request: ActionKind, site_id: Option<SiteId>, event: &ChangeEvent) -> bool {
    let kind_matches = event.cause == request.completion() || event.cause == request;
    let site_matches = site_id.map_or(true, |id| id == event.site_id);
    kind_matches && site_matches
}
