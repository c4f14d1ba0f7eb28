//! Core types for sitesync

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable local identifier of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId(pub u64);

impl std::fmt::Display for SiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a site is reached
///
/// Secrets are wrapped in [`SecretString`] so they never show up in `Debug`
/// output or logs.
#[derive(Debug, Clone)]
pub enum SiteApi {
    /// REST API with bearer-token authentication
    Rest { token: Arc<SecretString> },

    /// Self-hosted XML-RPC endpoint with basic credentials
    XmlRpc {
        endpoint: String,
        blog_id: u64,
        username: String,
        password: Arc<SecretString>,
    },
}

#[derive(Debug, Clone)]
pub struct Site {
    pub id: SiteId,
    pub url: String,
    pub api: SiteApi,
}

impl Site {
    pub fn rest(id: u64, url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: SiteId(id),
            url: url.into(),
            api: SiteApi::Rest {
                token: Arc::new(SecretString::from(token.into())),
            },
        }
    }

    pub fn xmlrpc(
        id: u64,
        url: impl Into<String>,
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: SiteId(id),
            url: url.into(),
            api: SiteApi::XmlRpc {
                endpoint: endpoint.into(),
                blog_id: 1,
                username: username.into(),
                password: Arc::new(SecretString::from(password.into())),
            },
        }
    }

    pub fn uses_rest_api(&self) -> bool {
        matches!(self.api, SiteApi::Rest { .. })
    }

    /// Bearer token for REST sites
    pub fn token(&self) -> Option<&str> {
        match &self.api {
            SiteApi::Rest { token } => Some(token.expose_secret()),
            SiteApi::XmlRpc { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    /// Server-side identifier, e.g. "akismet/akismet"
    pub name: String,
    pub slug: String,
    pub display_name: String,
    pub version: Option<String>,
    pub active: bool,
    pub autoupdate: bool,
    pub plugin_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub site_id: u64,
    pub media_id: u64,
    pub post_id: u64,
    pub title: String,
    pub caption: String,
    pub description: String,
    pub url: String,
    pub file_name: String,
    pub file_extension: String,
    pub mime_type: String,
    pub thumbnail_url: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub width: u32,
    pub height: u32,
    pub videopress_guid: Option<String>,
}

impl Media {
    /// Fill `file_name` and `file_extension` from the media URL
    ///
    /// `https://example.com/wp-content/uploads/2024/01/sunset.jpg` gives
    /// `sunset` and `jpg`.
    pub fn apply_url(&mut self, url: &str) {
        self.url = url.to_string();
        let last_segment = url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .rsplit('/')
            .next()
            .unwrap_or_default();
        match last_segment.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                self.file_name = stem.to_string();
                self.file_extension = ext.to_lowercase();
            }
            _ => {
                self.file_name = last_segment.to_string();
                self.file_extension.clear();
            }
        }
        if self.mime_type.is_empty() {
            if let Some(mime) = mime_type_for_extension(&self.file_extension) {
                self.mime_type = mime.to_string();
            }
        }
    }
}

/// Local media waiting to be uploaded
#[derive(Debug, Clone)]
pub struct MediaUpload {
    /// Identifies the upload until the server assigns a media id
    pub local_id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub title: Option<String>,
    pub bytes: Arc<[u8]>,
}

impl MediaUpload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            title: None,
            bytes: Arc::from(bytes),
        }
    }

    /// Read a file from disk, guessing the MIME type from its extension
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = path
            .extension()
            .and_then(|ext| mime_type_for_extension(&ext.to_string_lossy()))
            .unwrap_or("application/octet-stream");
        Ok(Self::new(file_name, mime_type, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Guess a MIME type from a file extension
pub fn mime_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "mp4" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "mp3" => Some("audio/mpeg"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Post,
    Page,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Post => "post",
            PostType::Page => "page",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Identifies the post before the server assigns a remote id
    pub local_id: Uuid,
    pub site_id: u64,
    /// 0 until the post has been pushed
    pub remote_id: u64,
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    pub status: String,
    pub link: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Set by a local edit, cleared once the server copy is applied
    pub locally_changed: bool,
}

impl Post {
    /// A post that exists only locally
    pub fn draft(
        site_id: u64,
        post_type: PostType,
        title: impl Into<String>,
        content: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            site_id,
            remote_id: 0,
            post_type,
            title: title.into(),
            content: content.into(),
            status: status.into(),
            link: None,
            created_at: None,
            locally_changed: false,
        }
    }

    /// Whether both records describe the same post
    ///
    /// Pushed posts match on their remote id, local drafts on their local id.
    pub fn is_same_post(&self, other: &Post) -> bool {
        if self.remote_id != 0 && other.remote_id != 0 {
            self.remote_id == other.remote_id
        } else {
            self.local_id == other.local_id
        }
    }
}

/// Upload progress while the transfer is in flight
///
/// Always within `[0.0, MAX_IN_FLIGHT]`: a value of 1.0 is reserved for the
/// final result, which travels as a separate completion state.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Progress(f32);

impl Progress {
    pub const MAX_IN_FLIGHT: f32 = 0.99;

    pub fn new(fraction: f32) -> Self {
        if fraction.is_nan() {
            return Self(0.0);
        }
        Self(fraction.clamp(0.0, Self::MAX_IN_FLIGHT))
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}
