//! Actions flowing through the dispatcher
//!
//! An [`Action`] is an immutable value made of a type tag ([`ActionKind`]) and a
//! payload. Request actions carry input parameters; result actions carry a
//! `Result<T, SyncError>`, so a payload holds either domain values or an error,
//! never both.
//!
//! Each domain module exposes builder functions that construct well-typed
//! actions:
//!
//! ```
//! use libsitesync::action::{plugin, ActionKind};
//! use libsitesync::types::Site;
//!
//! let site = Site::rest(42, "https://example.wordpress.com", "token");
//! let action = plugin::fetch_site_plugins(site);
//! assert_eq!(action.kind(), ActionKind::FetchSitePlugins);
//! ```

pub mod media;
pub mod plugin;
pub mod post;

pub use media::MediaAction;
pub use plugin::PluginAction;
pub use post::PostAction;

use crate::types::SiteId;

#[derive(Debug, Clone)]
pub enum Action {
    Post(PostAction),
    Media(MediaAction),
    Plugin(PluginAction),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Post(action) => action.kind(),
            Action::Media(action) => action.kind(),
            Action::Plugin(action) => action.kind(),
        }
    }

    /// Site the action concerns, used for log context
    pub fn site_id(&self) -> Option<SiteId> {
        match self {
            Action::Post(action) => action.site_id(),
            Action::Media(action) => Some(action.site_id()),
            Action::Plugin(action) => Some(action.site_id()),
        }
    }
}

impl From<PostAction> for Action {
    fn from(action: PostAction) -> Self {
        Action::Post(action)
    }
}

impl From<MediaAction> for Action {
    fn from(action: MediaAction) -> Self {
        Action::Media(action)
    }
}

impl From<PluginAction> for Action {
    fn from(action: PluginAction) -> Self {
        Action::Plugin(action)
    }
}

/// Flat type tag of every action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    // Posts
    FetchPosts,
    FetchPages,
    FetchedPosts,
    UpdatePost,
    PushPost,
    PushedPost,

    // Media
    FetchAllMedia,
    FetchMedia,
    FetchedMedia,
    PushMedia,
    PushedMedia,
    UploadMedia,
    UploadedMedia,
    DeleteMedia,
    DeletedMedia,

    // Plugins
    FetchSitePlugins,
    FetchedSitePlugins,
    ConfigureSitePlugin,
    ConfiguredSitePlugin,
    InstallSitePlugin,
    InstalledSitePlugin,
    DeleteSitePlugin,
    DeletedSitePlugin,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::FetchPosts => "FETCH_POSTS",
            ActionKind::FetchPages => "FETCH_PAGES",
            ActionKind::FetchedPosts => "FETCHED_POSTS",
            ActionKind::UpdatePost => "UPDATE_POST",
            ActionKind::PushPost => "PUSH_POST",
            ActionKind::PushedPost => "PUSHED_POST",
            ActionKind::FetchAllMedia => "FETCH_ALL_MEDIA",
            ActionKind::FetchMedia => "FETCH_MEDIA",
            ActionKind::FetchedMedia => "FETCHED_MEDIA",
            ActionKind::PushMedia => "PUSH_MEDIA",
            ActionKind::PushedMedia => "PUSHED_MEDIA",
            ActionKind::UploadMedia => "UPLOAD_MEDIA",
            ActionKind::UploadedMedia => "UPLOADED_MEDIA",
            ActionKind::DeleteMedia => "DELETE_MEDIA",
            ActionKind::DeletedMedia => "DELETED_MEDIA",
            ActionKind::FetchSitePlugins => "FETCH_SITE_PLUGINS",
            ActionKind::FetchedSitePlugins => "FETCHED_SITE_PLUGINS",
            ActionKind::ConfigureSitePlugin => "CONFIGURE_SITE_PLUGIN",
            ActionKind::ConfiguredSitePlugin => "CONFIGURED_SITE_PLUGIN",
            ActionKind::InstallSitePlugin => "INSTALL_SITE_PLUGIN",
            ActionKind::InstalledSitePlugin => "INSTALLED_SITE_PLUGIN",
            ActionKind::DeleteSitePlugin => "DELETE_SITE_PLUGIN",
            ActionKind::DeletedSitePlugin => "DELETED_SITE_PLUGIN",
        }
    }

    /// Kind of the result action that finishes this one
    ///
    /// Result actions and local edits finish themselves.
    pub fn completion(&self) -> ActionKind {
        match self {
            ActionKind::FetchPosts | ActionKind::FetchPages => ActionKind::FetchedPosts,
            ActionKind::PushPost => ActionKind::PushedPost,
            ActionKind::FetchAllMedia | ActionKind::FetchMedia => ActionKind::FetchedMedia,
            ActionKind::PushMedia => ActionKind::PushedMedia,
            ActionKind::UploadMedia => ActionKind::UploadedMedia,
            ActionKind::DeleteMedia => ActionKind::DeletedMedia,
            ActionKind::FetchSitePlugins => ActionKind::FetchedSitePlugins,
            ActionKind::ConfigureSitePlugin => ActionKind::ConfiguredSitePlugin,
            ActionKind::InstallSitePlugin => ActionKind::InstalledSitePlugin,
            ActionKind::DeleteSitePlugin => ActionKind::DeletedSitePlugin,
            other => *other,
        }
    }

    /// Whether this kind carries a network result
    pub fn is_result(&self) -> bool {
        self.completion() == *self && *self != ActionKind::UpdatePost
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
