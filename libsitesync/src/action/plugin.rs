//! Plugin actions

use super::{Action, ActionKind};
use crate::error::SyncError;
use crate::types::{Plugin, Site, SiteId};

#[derive(Debug, Clone)]
pub enum PluginAction {
    FetchSitePlugins(Site),
    FetchedSitePlugins(FetchedSitePluginsPayload),
    /// Push the plugin's `active`/`autoupdate` flags to the site
    ConfigureSitePlugin { site: Site, plugin: Plugin },
    ConfiguredSitePlugin(ConfiguredSitePluginPayload),
    InstallSitePlugin { site: Site, slug: String },
    InstalledSitePlugin(InstalledSitePluginPayload),
    DeleteSitePlugin { site: Site, plugin: Plugin },
    DeletedSitePlugin(DeletedSitePluginPayload),
}

#[derive(Debug, Clone)]
pub struct FetchedSitePluginsPayload {
    pub site: Site,
    pub result: Result<Vec<Plugin>, SyncError>,
}

#[derive(Debug, Clone)]
pub struct ConfiguredSitePluginPayload {
    pub site: Site,
    pub plugin_name: String,
    pub result: Result<Plugin, SyncError>,
}

#[derive(Debug, Clone)]
pub struct InstalledSitePluginPayload {
    pub site: Site,
    pub slug: String,
    pub result: Result<Plugin, SyncError>,
}

#[derive(Debug, Clone)]
pub struct DeletedSitePluginPayload {
    pub site: Site,
    pub plugin: Plugin,
    pub result: Result<(), SyncError>,
}

impl PluginAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            PluginAction::FetchSitePlugins(_) => ActionKind::FetchSitePlugins,
            PluginAction::FetchedSitePlugins(_) => ActionKind::FetchedSitePlugins,
            PluginAction::ConfigureSitePlugin { .. } => ActionKind::ConfigureSitePlugin,
            PluginAction::ConfiguredSitePlugin(_) => ActionKind::ConfiguredSitePlugin,
            PluginAction::InstallSitePlugin { .. } => ActionKind::InstallSitePlugin,
            PluginAction::InstalledSitePlugin(_) => ActionKind::InstalledSitePlugin,
            PluginAction::DeleteSitePlugin { .. } => ActionKind::DeleteSitePlugin,
            PluginAction::DeletedSitePlugin(_) => ActionKind::DeletedSitePlugin,
        }
    }

    pub fn site_id(&self) -> SiteId {
        match self {
            PluginAction::FetchSitePlugins(site)
            | PluginAction::ConfigureSitePlugin { site, .. }
            | PluginAction::InstallSitePlugin { site, .. }
            | PluginAction::DeleteSitePlugin { site, .. } => site.id,
            PluginAction::FetchedSitePlugins(p) => p.site.id,
            PluginAction::ConfiguredSitePlugin(p) => p.site.id,
            PluginAction::InstalledSitePlugin(p) => p.site.id,
            PluginAction::DeletedSitePlugin(p) => p.site.id,
        }
    }
}

pub fn fetch_site_plugins(site: Site) -> Action {
    PluginAction::FetchSitePlugins(site).into()
}

pub fn configure_site_plugin(site: Site, plugin: Plugin) -> Action {
    PluginAction::ConfigureSitePlugin { site, plugin }.into()
}

pub fn install_site_plugin(site: Site, slug: impl Into<String>) -> Action {
    PluginAction::InstallSitePlugin {
        site,
        slug: slug.into(),
    }
    .into()
}

pub fn delete_site_plugin(site: Site, plugin: Plugin) -> Action {
    PluginAction::DeleteSitePlugin { site, plugin }.into()
}

pub fn fetched_site_plugins(site: Site, result: Result<Vec<Plugin>, SyncError>) -> Action {
    PluginAction::FetchedSitePlugins(FetchedSitePluginsPayload { site, result }).into()
}

pub fn configured_site_plugin(
    site: Site,
    plugin_name: impl Into<String>,
    result: Result<Plugin, SyncError>,
) -> Action {
    PluginAction::ConfiguredSitePlugin(ConfiguredSitePluginPayload {
        site,
        plugin_name: plugin_name.into(),
        result,
    })
    .into()
}

pub fn installed_site_plugin(
    site: Site,
    slug: impl Into<String>,
    result: Result<Plugin, SyncError>,
) -> Action {
    PluginAction::InstalledSitePlugin(InstalledSitePluginPayload {
        site,
        slug: slug.into(),
        result,
    })
    .into()
}

pub fn deleted_site_plugin(site: Site, plugin: Plugin, result: Result<(), SyncError>) -> Action {
    PluginAction::DeletedSitePlugin(DeletedSitePluginPayload {
        site,
        plugin,
        result,
    })
    .into()
}
