//! Posts and pages over REST

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{lenient, RestClient};
use crate::action::post::{self as action, FetchedPosts};
use crate::error::SyncError;
use crate::network::{Body, HttpRequest, PostClient, POSTS_PER_PAGE};
use crate::types::{Post, PostType, Site, SiteId};

#[derive(Debug, Deserialize)]
struct PostResponse {
    #[serde(rename = "ID")]
    id: u64,
    #[serde(default, deserialize_with = "lenient")]
    title: String,
    #[serde(default, deserialize_with = "lenient")]
    content: String,
    #[serde(default, deserialize_with = "lenient")]
    status: String,
    #[serde(rename = "URL", default, deserialize_with = "lenient")]
    url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    date: Option<DateTime<Utc>>,
}

impl PostResponse {
    fn into_post(self, site_id: SiteId, post_type: PostType) -> Post {
        Post {
            local_id: Uuid::new_v4(),
            site_id: site_id.0,
            remote_id: self.id,
            post_type,
            title: self.title,
            content: self.content,
            status: self.status,
            link: self.url.filter(|u| !u.is_empty()),
            created_at: self.date,
            locally_changed: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostListResponse {
    #[serde(default)]
    found: Option<usize>,
    #[serde(default)]
    posts: Vec<PostResponse>,
}

impl PostListResponse {
    fn into_page(self, site_id: SiteId, post_type: PostType, offset: usize) -> FetchedPosts {
        let received = self.posts.len();
        let can_load_more = match self.found {
            Some(found) => offset + received < found,
            None => received == POSTS_PER_PAGE,
        };
        FetchedPosts {
            posts: self
                .posts
                .into_iter()
                .map(|post| post.into_post(site_id, post_type))
                .collect(),
            can_load_more,
        }
    }
}

pub struct RestPostClient {
    client: RestClient,
}

impl RestPostClient {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

impl PostClient for RestPostClient {
    fn fetch_posts(&self, site: Site, post_type: PostType, offset: usize) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = fetch_page(&client, &site, post_type, offset).await;
            action::fetched_posts(site, post_type, offset > 0, result)
        });
    }

    fn push_post(&self, site: Site, post: Post) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = push(&client, &site, &post).await;
            action::pushed_post(site, post, result)
        });
    }
}

async fn fetch_page(
    client: &RestClient,
    site: &Site,
    post_type: PostType,
    offset: usize,
) -> Result<FetchedPosts, SyncError> {
    let query = [
        ("type", post_type.as_str().to_string()),
        ("number", POSTS_PER_PAGE.to_string()),
        ("offset", offset.to_string()),
        ("status", "any".to_string()),
    ];
    let url = client.site_url(site, &["posts"], &query)?;
    let list: PostListResponse = client.execute(site, HttpRequest::get(url)).await?;
    Ok(list.into_page(site.id, post_type, offset))
}

async fn push(client: &RestClient, site: &Site, post: &Post) -> Result<Post, SyncError> {
    let target = if post.remote_id == 0 {
        "new".to_string()
    } else {
        post.remote_id.to_string()
    };
    let url = client.site_url(site, &["posts", &target], &[])?;
    let body = Body::Json(json!({
        "type": post.post_type.as_str(),
        "title": post.title,
        "content": post.content,
        "status": post.status,
    }));
    let response: PostResponse = client.execute(site, HttpRequest::post(url, body)).await?;
    Ok(response.into_post(site.id, post.post_type))
}
