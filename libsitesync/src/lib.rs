//! Sitesync - client-side synchronization for WordPress sites
//!
//! Typed actions flow through a [`Dispatcher`] to stores that own local
//! state. Stores start network operations over REST or XML-RPC, and each
//! operation re-enters the dispatcher with a result action once it completes.
//! Observers learn about state changes from [`ChangeEvent`]s and read the
//! stores through their accessors.

pub mod action;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod logging;
pub mod network;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use action::{Action, ActionKind};
pub use config::Config;
pub use dispatcher::{Dispatcher, Subscriber, SubscriberId};
pub use error::{ErrorKind, Result, SitesyncError, SyncError};
pub use events::{ChangeEvent, ChangeReceiver, EventBus, StoreId};
pub use service::SiteSync;
pub use types::{Media, MediaUpload, Plugin, Post, PostType, Progress, Site, SiteId};
