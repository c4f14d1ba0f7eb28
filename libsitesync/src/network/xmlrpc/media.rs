//! Media library over XML-RPC

use std::sync::Arc;

use crate::action::media::{self as action, FetchScope, UploadState};
use crate::error::SyncError;
use crate::network::{absorb_not_found, MediaClient, ProgressSink};
use crate::types::{Media, MediaUpload, Progress, Site, SiteId};

use super::{expect_true, id_param, Value, XmlRpcClient};

/// Items requested from `wp.getMediaLibrary`
const MEDIA_LIBRARY_LIMIT: i64 = 1000;

pub struct XmlRpcMediaClient {
    client: XmlRpcClient,
}

impl XmlRpcMediaClient {
    pub fn new(client: XmlRpcClient) -> Self {
        Self { client }
    }
}

impl MediaClient for XmlRpcMediaClient {
    fn fetch_all_media(&self, site: Site) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let filter = Value::structure([("number", Value::Int(MEDIA_LIBRARY_LIMIT))]);
            let result = client
                .call(&site, "wp.getMediaLibrary", vec![filter])
                .await
                .and_then(|value| media_list(&value, site.id));
            action::fetched_media(site, FetchScope::Library, result)
        });
    }

    fn fetch_media(&self, site: Site, media_ids: Vec<u64>) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let mut fetched = Vec::with_capacity(media_ids.len());
            let mut result = Ok(());
            for media_id in media_ids {
                match fetch_item(&client, &site, media_id).await {
                    Ok(item) => fetched.push(item),
                    Err(err) => {
                        result = Err(err);
                        break;
                    }
                }
            }
            action::fetched_media(site, FetchScope::Items, result.map(|()| fetched))
        });
    }

    fn push_media(&self, site: Site, media: Media) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = edit_item(&client, &site, &media).await.map(|()| media.clone());
            action::pushed_media(site, media, result)
        });
    }

    fn upload_media(&self, site: Site, upload: MediaUpload) {
        let client = self.client.clone();
        let ctx = self.client.context().clone();
        self.client.context().complete(async move {
            let local_id = upload.local_id;
            let progress: ProgressSink = {
                let site = site.clone();
                Arc::new(move |fraction| {
                    ctx.report(action::upload_progress(site.clone(), local_id, Progress::new(fraction)))
                })
            };

            let mut file = vec![
                ("name", Value::string(upload.file_name.as_str())),
                ("type", Value::string(upload.mime_type.as_str())),
                ("bits", Value::Base64(upload.bytes.to_vec())),
            ];
            if let Some(title) = &upload.title {
                file.push(("title", Value::string(title.as_str())));
            }

            let state = match client
                .call_with_progress(&site, "wp.uploadFile", vec![Value::structure(file)], progress)
                .await
                .and_then(|value| media_from_value(&value, site.id))
            {
                Ok(mut uploaded) => {
                    if uploaded.mime_type.is_empty() {
                        uploaded.mime_type = upload.mime_type.clone();
                    }
                    if uploaded.title.is_empty() {
                        uploaded.title = upload.title.clone().unwrap_or_default();
                    }
                    UploadState::Completed(uploaded)
                }
                Err(err) => UploadState::Failed(err),
            };
            action::uploaded_media(site, local_id, state)
        });
    }

    fn delete_media(&self, site: Site, media: Media) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = delete_item(&client, &site, media.media_id).await;
            action::deleted_media(site, media, absorb_not_found(result))
        });
    }
}

async fn fetch_item(client: &XmlRpcClient, site: &Site, media_id: u64) -> Result<Media, SyncError> {
    let value = client.call(site, "wp.getMediaItem", vec![id_param(media_id)?]).await?;
    media_from_value(&value, site.id)
}

async fn edit_item(client: &XmlRpcClient, site: &Site, media: &Media) -> Result<(), SyncError> {
    let id = id_param(media.media_id)?;
    let content = Value::structure([
        ("post_title", Value::string(media.title.as_str())),
        ("post_content", Value::string(media.description.as_str())),
        ("post_excerpt", Value::string(media.caption.as_str())),
    ]);
    let value = client.call(site, "wp.editPost", vec![id, content]).await?;
    expect_true(&value, "wp.editPost", media.media_id)
}

async fn delete_item(client: &XmlRpcClient, site: &Site, media_id: u64) -> Result<(), SyncError> {
    let value = client.call_delete(site, "wp.deletePost", vec![id_param(media_id)?]).await?;
    expect_true(&value, "wp.deletePost", media_id)
}

fn media_list(value: &Value, site_id: SiteId) -> Result<Vec<Media>, SyncError> {
    value
        .as_array()
        .ok_or_else(|| SyncError::parse("wp.getMediaLibrary did not return an array"))?
        .iter()
        .map(|item| media_from_value(item, site_id))
        .collect()
}

/// Build a media record from a media item struct
///
/// `wp.uploadFile` answers with a reduced struct using `id` and `url`, so
/// those are accepted as fallbacks for `attachment_id` and `link`.
pub(crate) fn media_from_value(value: &Value, site_id: SiteId) -> Result<Media, SyncError> {
    if !matches!(value, Value::Struct(_)) {
        return Err(SyncError::parse("media item is not a struct"));
    }

    let text = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or_default().to_string();

    let media_id = value
        .get("attachment_id")
        .or_else(|| value.get("id"))
        .and_then(Value::as_u64)
        .ok_or_else(|| SyncError::parse("media item without attachment_id"))?;

    let mut item = Media {
        site_id: site_id.0,
        media_id,
        post_id: value.get("parent").and_then(Value::as_u64).unwrap_or_default(),
        title: text("title"),
        caption: text("caption"),
        description: text("description"),
        mime_type: text("type"),
        thumbnail_url: value
            .get("thumbnail")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        uploaded_at: value.get("date_created_gmt").and_then(Value::as_datetime),
        videopress_guid: value
            .get("videopress_shortcode")
            .and_then(Value::as_str)
            .and_then(videopress_guid),
        ..Default::default()
    };

    if let Some(metadata) = value.get("metadata") {
        let dimension = |key| {
            metadata
                .get(key)
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or_default()
        };
        item.width = dimension("width");
        item.height = dimension("height");
    }

    let link = value
        .get("link")
        .or_else(|| value.get("url"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    item.apply_url(link);

    Ok(item)
}

/// `[wpvideo OcobLTqC w=640 h=400]` gives `OcobLTqC`
fn videopress_guid(shortcode: &str) -> Option<String> {
    shortcode
        .trim()
        .strip_prefix("[wpvideo")?
        .split(|c: char| c.is_whitespace() || c == ']')
        .find(|token| !token.is_empty())
        .map(str::to_string)
}
