//! Media library over REST

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::{lenient, RestClient};
use crate::action::media::{self as action, FetchScope, UploadState};
use crate::error::SyncError;
use crate::network::{absorb_not_found, Body, HttpRequest, MediaClient, ProgressSink};
use crate::types::{Media, MediaUpload, Progress, Site, SiteId};

/// Items requested per library fetch
const MEDIA_PAGE_SIZE: usize = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Thumbnails {
    thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    #[serde(rename = "ID")]
    id: u64,
    #[serde(rename = "URL", default)]
    url: String,
    #[serde(rename = "post_ID", default)]
    post_id: u64,
    #[serde(default, deserialize_with = "lenient")]
    date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    mime_type: String,
    #[serde(default, deserialize_with = "lenient")]
    title: String,
    #[serde(default, deserialize_with = "lenient")]
    caption: String,
    #[serde(default, deserialize_with = "lenient")]
    description: String,
    #[serde(default, deserialize_with = "lenient")]
    thumbnails: Thumbnails,
    #[serde(default, deserialize_with = "lenient")]
    width: u32,
    #[serde(default, deserialize_with = "lenient")]
    height: u32,
    #[serde(default, deserialize_with = "lenient")]
    videopress_guid: Option<String>,
}

impl MediaResponse {
    fn into_media(self, site_id: SiteId) -> Media {
        let mut media = Media {
            site_id: site_id.0,
            media_id: self.id,
            post_id: self.post_id,
            title: self.title,
            caption: self.caption,
            description: self.description,
            mime_type: self.mime_type,
            thumbnail_url: self.thumbnails.thumbnail.filter(|t| !t.is_empty()),
            uploaded_at: self.date,
            width: self.width,
            height: self.height,
            videopress_guid: self.videopress_guid.filter(|g| !g.is_empty()),
            ..Default::default()
        };
        media.apply_url(&self.url);
        media
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UploadError {
    error: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct MediaListResponse {
    #[serde(default)]
    media: Vec<MediaResponse>,
    #[serde(default)]
    errors: Vec<UploadError>,
}

pub struct RestMediaClient {
    client: RestClient,
}

impl RestMediaClient {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

impl MediaClient for RestMediaClient {
    fn fetch_all_media(&self, site: Site) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = fetch_library(&client, &site).await;
            action::fetched_media(site, FetchScope::Library, result)
        });
    }

    fn fetch_media(&self, site: Site, media_ids: Vec<u64>) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = fetch_items(&client, &site, &media_ids).await;
            action::fetched_media(site, FetchScope::Items, result)
        });
    }

    fn push_media(&self, site: Site, media: Media) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = push(&client, &site, &media).await;
            action::pushed_media(site, media, result)
        });
    }

    fn upload_media(&self, site: Site, upload: MediaUpload) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let local_id = upload.local_id;
            let progress: ProgressSink = {
                let ctx = client.context().clone();
                let site = site.clone();
                Arc::new(move |fraction| {
                    ctx.report(action::upload_progress(site.clone(), local_id, Progress::new(fraction)))
                })
            };
            let state = match upload_file(&client, &site, upload, progress).await {
                Ok(media) => UploadState::Completed(media),
                Err(err) => UploadState::Failed(err),
            };
            action::uploaded_media(site, local_id, state)
        });
    }

    fn delete_media(&self, site: Site, media: Media) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = delete(&client, &site, &media).await;
            action::deleted_media(site, media, absorb_not_found(result))
        });
    }
}

async fn fetch_library(client: &RestClient, site: &Site) -> Result<Vec<Media>, SyncError> {
    let url = client.site_url(site, &["media"], &[("number", MEDIA_PAGE_SIZE.to_string())])?;
    let list: MediaListResponse = client.execute(site, HttpRequest::get(url)).await?;
    Ok(list.media.into_iter().map(|item| item.into_media(site.id)).collect())
}

async fn fetch_items(client: &RestClient, site: &Site, media_ids: &[u64]) -> Result<Vec<Media>, SyncError> {
    let mut fetched = Vec::with_capacity(media_ids.len());
    for media_id in media_ids {
        let url = client.site_url(site, &["media", &media_id.to_string()], &[])?;
        let item: MediaResponse = client.execute(site, HttpRequest::get(url)).await?;
        fetched.push(item.into_media(site.id));
    }
    Ok(fetched)
}

async fn push(client: &RestClient, site: &Site, media: &Media) -> Result<Media, SyncError> {
    let url = client.site_url(site, &["media", &media.media_id.to_string()], &[])?;
    let body = Body::Json(json!({
        "title": media.title,
        "caption": media.caption,
        "description": media.description,
    }));
    let item: MediaResponse = client.execute(site, HttpRequest::post(url, body)).await?;
    Ok(item.into_media(site.id))
}

async fn upload_file(
    client: &RestClient,
    site: &Site,
    upload: MediaUpload,
    progress: ProgressSink,
) -> Result<Media, SyncError> {
    let url = client.site_url(site, &["media", "new"], &[])?;
    let fields = upload
        .title
        .iter()
        .map(|title| ("attrs[0][title]".to_string(), title.clone()))
        .collect();
    let body = Body::Multipart {
        field: "media[]".to_string(),
        file_name: upload.file_name,
        mime_type: upload.mime_type,
        bytes: upload.bytes,
        fields,
    };

    let list: MediaListResponse = client
        .execute_with_progress(site, HttpRequest::post(url, body), progress)
        .await?;

    match list.media.into_iter().next() {
        Some(item) => Ok(item.into_media(site.id)),
        None => {
            let message = list
                .errors
                .into_iter()
                .next()
                .map(|e| if e.message.is_empty() { e.error } else { e.message })
                .unwrap_or_else(|| "Upload response contained no media".to_string());
            Err(SyncError::generic(message))
        }
    }
}

async fn delete(client: &RestClient, site: &Site, media: &Media) -> Result<(), SyncError> {
    let url = client.site_url(site, &["media", &media.media_id.to_string(), "delete"], &[])?;
    client.execute_delete(site, HttpRequest::post(url, Body::Empty)).await
}
