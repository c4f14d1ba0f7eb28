//! sitesync - Manage plugins, media and posts of WordPress sites

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use libsitesync::action::{media, plugin, post};
use libsitesync::types::{Media, MediaUpload, Post, PostType, Site};
use libsitesync::{Config, SiteSync, SitesyncError};
use serde::Serialize;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "sitesync")]
#[command(version, about = "Manage plugins, media and posts of WordPress sites")]
#[command(long_about = r#"Manage plugins, media and posts of WordPress sites.

Sites are configured in ~/.config/sitesync/config.toml (or $SITESYNC_CONFIG).
REST sites need a bearer token file, self-hosted sites an XML-RPC username
and password file.

EXAMPLES:
    sitesync plugins list --site 42
    sitesync plugins activate akismet/akismet --site 42
    sitesync media upload ./sunset.jpg --title "Sunset"
    sitesync posts list --pages --format json | jq '.[].title'

EXIT CODES:
    0 - Success
    1 - Request failed or configuration error
    2 - Authorization error
    3 - Invalid input
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Site id from the configuration (optional when only one site is configured)
    #[arg(short, long, global = true, value_name = "ID")]
    site: Option<u64>,

    /// Configuration file
    #[arg(long, global = true, env = "SITESYNC_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage site plugins (REST sites only)
    Plugins {
        #[command(subcommand)]
        command: PluginCommand,
    },

    /// Manage the media library
    Media {
        #[command(subcommand)]
        command: MediaCommand,
    },

    /// Manage posts and pages
    Posts {
        #[command(subcommand)]
        command: PostCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PluginCommand {
    /// List installed plugins
    List,
    /// Activate an installed plugin
    Activate { name: String },
    /// Deactivate an installed plugin
    Deactivate { name: String },
    /// Install a plugin from the plugin directory
    Install { slug: String },
    /// Delete an inactive plugin
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum MediaCommand {
    /// List the media library
    List,
    /// Upload a file
    Upload {
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
    },
    /// Delete a media item
    Delete { id: u64 },
}

#[derive(Subcommand, Debug)]
enum PostCommand {
    /// List posts
    List {
        /// List pages instead of posts
        #[arg(long)]
        pages: bool,

        /// Keep fetching until this many entries are loaded
        #[arg(short, long, default_value = "20", value_name = "N")]
        limit: usize,
    },
    /// Create a post
    New {
        #[arg(long)]
        title: String,
        /// Post body (HTML)
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long, default_value = "draft")]
        status: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libsitesync::logging::init_default(cli.verbose);
    debug!("sitesync started with args: {:?}", cli);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e.downcast_ref::<SitesyncError>().map_or(1, SitesyncError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    let site = select_site(&config, cli.site)?;
    let sync = SiteSync::from_config(config).context("Failed to start sitesync")?;
    let output = Output::new(&cli.format);

    let result = match cli.command {
        Commands::Plugins { command } => run_plugins(&sync, site, command, output).await,
        Commands::Media { command } => run_media(&sync, site, command, output).await,
        Commands::Posts { command } => run_posts(&sync, site, command, output).await,
    };

    sync.shutdown();
    result
}

fn select_site(config: &Config, id: Option<u64>) -> Result<Site> {
    let id = match (id, config.sites.as_slice()) {
        (Some(id), _) => id,
        (None, [only]) => only.id,
        (None, []) => bail!(SitesyncError::InvalidInput("no sites configured".to_string())),
        (None, _) => bail!(SitesyncError::InvalidInput(
            "several sites configured, choose one with --site".to_string()
        )),
    };
    Ok(config.site(id)?)
}

async fn run_plugins(sync: &SiteSync, site: Site, command: PluginCommand, output: Output) -> Result<()> {
    match command {
        PluginCommand::List => {
            sync.request(plugin::fetch_site_plugins(site.clone())).await?;
            output.list(&sync.plugins().site_plugins(site.id), |p| {
                let state = if p.active { "active" } else { "inactive" };
                format!("{:<40} {:<8} {}", p.name, state, p.version.as_deref().unwrap_or("-"))
            })
        }
        PluginCommand::Activate { name } => set_active(sync, site, &name, true, output).await,
        PluginCommand::Deactivate { name } => set_active(sync, site, &name, false, output).await,
        PluginCommand::Install { slug } => {
            sync.request(plugin::install_site_plugin(site.clone(), slug.as_str())).await?;
            let installed = sync
                .plugins()
                .site_plugins(site.id)
                .into_iter()
                .find(|p| p.slug == slug);
            match installed {
                Some(p) => output.item(&p, |p| format!("Installed {}", p.name)),
                None => output.message(&format!("Installed {}", slug)),
            }
        }
        PluginCommand::Delete { name } => {
            let target = find_plugin(sync, &site, &name).await?;
            sync.request(plugin::delete_site_plugin(site, target)).await?;
            output.message(&format!("Deleted {}", name))
        }
    }
}

async fn find_plugin(sync: &SiteSync, site: &Site, name: &str) -> Result<libsitesync::Plugin> {
    sync.request(plugin::fetch_site_plugins(site.clone())).await?;
    sync.plugins()
        .site_plugin_by_name(site.id, name)
        .ok_or_else(|| SitesyncError::InvalidInput(format!("plugin '{}' is not installed", name)).into())
}

async fn set_active(sync: &SiteSync, site: Site, name: &str, active: bool, output: Output) -> Result<()> {
    let mut target = find_plugin(sync, &site, name).await?;
    target.active = active;
    sync.request(plugin::configure_site_plugin(site.clone(), target)).await?;

    let updated = sync
        .plugins()
        .site_plugin_by_name(site.id, name)
        .context("plugin disappeared after update")?;
    let verb = if updated.active { "Activated" } else { "Deactivated" };
    output.item(&updated, |p| format!("{} {}", verb, p.name))
}

async fn run_media(sync: &SiteSync, site: Site, command: MediaCommand, output: Output) -> Result<()> {
    match command {
        MediaCommand::List => {
            sync.request(media::fetch_all_media(site.clone())).await?;
            output.list(&sync.media().site_media(site.id), |m| {
                format!("{:>8} {:<24} {}", m.media_id, m.mime_type, m.url)
            })
        }
        MediaCommand::Upload { path, title } => {
            let mut upload = MediaUpload::from_path(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if upload.is_empty() {
                bail!(SitesyncError::InvalidInput(format!("{} is empty", path.display())));
            }
            upload.title = title;
            debug!(file = %path.display(), bytes = upload.len(), "Uploading");

            let before = sync.media().site_media(site.id);
            sync.request(media::upload_media(site.clone(), upload)).await?;
            let uploaded = sync
                .media()
                .site_media(site.id)
                .into_iter()
                .find(|m| !before.contains(m));
            match uploaded {
                Some(m) => output.item(&m, |m| format!("Uploaded {} as {}", m.url, m.media_id)),
                None => output.message("Uploaded"),
            }
        }
        MediaCommand::Delete { id } => {
            let target = Media {
                site_id: site.id.0,
                media_id: id,
                ..Default::default()
            };
            sync.request(media::delete_media(site, target)).await?;
            output.message(&format!("Deleted media {}", id))
        }
    }
}

/// Fetch pages of posts until `limit` are loaded or the server runs dry
async fn load_posts(sync: &SiteSync, site: &Site, post_type: PostType, limit: usize) -> Result<Vec<Post>> {
    let fetch = |load_more| match post_type {
        PostType::Page => post::fetch_pages(site.clone(), load_more),
        PostType::Post => post::fetch_posts(site.clone(), load_more),
    };

    sync.request(fetch(false)).await?;
    loop {
        let count = sync.posts().post_count(site.id, post_type);
        if count >= limit || !sync.posts().can_load_more(site.id, post_type) {
            break;
        }
        sync.request(fetch(true)).await?;
        if sync.posts().post_count(site.id, post_type) == count {
            debug!(count, "Load more returned no new posts");
            break;
        }
    }

    let mut posts = sync.posts().posts(site.id, post_type);
    posts.truncate(limit);
    Ok(posts)
}

async fn run_posts(sync: &SiteSync, site: Site, command: PostCommand, output: Output) -> Result<()> {
    match command {
        PostCommand::List { pages, limit } => {
            let post_type = if pages { PostType::Page } else { PostType::Post };
            let posts = load_posts(sync, &site, post_type, limit).await?;
            output.list(&posts, |p| format!("{:>8} {:<10} {}", p.remote_id, p.status, p.title))
        }
        PostCommand::New {
            title,
            content,
            status,
        } => {
            let draft = Post::draft(site.id.0, PostType::Post, title, content, status);
            sync.dispatch(post::update_post(draft.clone()))?;
            sync.request(post::push_post(site.clone(), draft.clone())).await?;

            let created = sync
                .posts()
                .posts(site.id, PostType::Post)
                .into_iter()
                .find(|p| p.remote_id != 0 && p.local_id == draft.local_id);
            match created {
                Some(p) => output.item(&p, |p| format!("Created post {}", p.remote_id)),
                None => output.message("Created post"),
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Output {
    Text,
    Json,
}

impl Output {
    fn new(format: &str) -> Self {
        match format {
            "json" => Output::Json,
            _ => Output::Text,
        }
    }

    fn list<T: Serialize>(self, items: &[T], line: impl Fn(&T) -> String) -> Result<()> {
        match self {
            Output::Json => println!("{}", serde_json::to_string_pretty(items)?),
            Output::Text => {
                for item in items {
                    println!("{}", line(item));
                }
            }
        }
        Ok(())
    }

    fn item<T: Serialize>(self, item: &T, line: impl Fn(&T) -> String) -> Result<()> {
        match self {
            Output::Json => println!("{}", serde_json::to_string_pretty(item)?),
            Output::Text => println!("{}", line(item)),
        }
        Ok(())
    }

    fn message(self, text: &str) -> Result<()> {
        match self {
            Output::Json => println!("{}", serde_json::json!({ "message": text })),
            Output::Text => println!("{}", text),
        }
        Ok(())
    }
}
