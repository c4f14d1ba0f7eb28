//! Network clients
//!
//! Stores never talk to the network directly. On a request action they hand
//! the work to a client, which runs it on the tokio runtime and, when the
//! operation completes, dispatches the matching result action. That dispatch
//! is the only way network results re-enter the pipeline.
//!
//! Two wire protocols implement the same client traits:
//!
//! - [`rest`]: JSON over HTTPS with a bearer token
//! - [`xmlrpc`]: `methodCall` documents posted to a self-hosted endpoint
//!
//! Both sit on the [`HttpTransport`] seam, so tests can substitute
//! [`mock::MockTransport`] for the production [`transport::ReqwestTransport`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::action::Action;
use crate::dispatcher::Dispatcher;
use crate::types::{Media, MediaUpload, Plugin, Post, PostType, Site};

pub mod normalize;
pub mod rest;
pub mod transport;
pub mod xmlrpc;

// Mock transport is available for all builds (not just tests) to support integration tests
pub mod mock;

pub use normalize::{absorb_not_found, normalize, normalize_delete, TransportFault};

/// Callback receiving the fraction of a request body sent so far
pub type ProgressSink = Arc<dyn Fn(f32) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub enum Auth {
    None,
    Bearer(Arc<SecretString>),
    Basic {
        username: String,
        password: Arc<SecretString>,
    },
}

#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    Xml(String),
    /// Single-file multipart form
    Multipart {
        field: String,
        file_name: String,
        mime_type: String,
        bytes: Arc<[u8]>,
        fields: Vec<(String, String)>,
    },
}

impl Body {
    /// Textual body, if any; multipart payloads are binary
    pub fn text(&self) -> Option<String> {
        match self {
            Body::Empty | Body::Multipart { .. } => None,
            Body::Json(value) => Some(value.to_string()),
            Body::Xml(xml) => Some(xml.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub auth: Auth,
    pub body: Body,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            auth: Auth::None,
            body: Body::Empty,
        }
    }

    pub fn post(url: impl Into<String>, body: Body) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            auth: Auth::None,
            body,
        }
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP seam shared by every client
///
/// Implementations return `Ok` for any HTTP status, including 4xx and 5xx.
/// `Err` is reserved for requests that produced no response at all.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFault>;

    /// Send a request, reporting how much of its body has gone out
    ///
    /// Transports that cannot observe upload progress fall back to `send`.
    async fn send_with_progress(
        &self,
        request: HttpRequest,
        progress: ProgressSink,
    ) -> Result<HttpResponse, TransportFault> {
        let _ = progress;
        self.send(request).await
    }

    /// Transport name for logs
    fn name(&self) -> &str;
}

/// Everything a client needs to run an operation and report its result
#[derive(Clone)]
pub struct NetworkContext {
    dispatcher: Dispatcher,
    transport: Arc<dyn HttpTransport>,
    runtime: Handle,
}

impl NetworkContext {
    pub fn new(dispatcher: Dispatcher, transport: Arc<dyn HttpTransport>, runtime: Handle) -> Self {
        Self {
            dispatcher,
            transport,
            runtime,
        }
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run `operation` in the background and dispatch the action it yields
    pub fn complete<F>(&self, operation: F) -> JoinHandle<()>
    where
        F: Future<Output = Action> + Send + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        self.runtime.spawn(async move {
            let action = operation.await;
            report(&dispatcher, action);
        })
    }

    /// Dispatch an intermediate result (e.g. upload progress) from a running operation
    pub fn report(&self, action: Action) {
        report(&self.dispatcher, action);
    }
}

fn report(dispatcher: &Dispatcher, action: Action) {
    let kind = action.kind();
    trace!(action = %kind, "Network operation produced result");
    if let Err(err) = dispatcher.dispatch(action) {
        warn!(action = %kind, error = %err, "Dropped network result");
    }
}

/// Plugin management operations
pub trait PluginClient: Send + Sync {
    fn fetch_site_plugins(&self, site: Site);
    fn configure_site_plugin(&self, site: Site, plugin: Plugin);
    fn install_site_plugin(&self, site: Site, slug: String);
    fn delete_site_plugin(&self, site: Site, plugin: Plugin);
}

/// Media library operations
pub trait MediaClient: Send + Sync {
    fn fetch_all_media(&self, site: Site);
    fn fetch_media(&self, site: Site, media_ids: Vec<u64>);
    fn push_media(&self, site: Site, media: Media);
    fn upload_media(&self, site: Site, upload: MediaUpload);
    fn delete_media(&self, site: Site, media: Media);
}

/// Post and page operations
pub trait PostClient: Send + Sync {
    /// Fetch one page of `post_type` starting at `offset`
    fn fetch_posts(&self, site: Site, post_type: PostType, offset: usize);
    fn push_post(&self, site: Site, post: Post);
}

/// Number of posts requested per page
pub const POSTS_PER_PAGE: usize = 20;
