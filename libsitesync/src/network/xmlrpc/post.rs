//! Posts and pages over XML-RPC

use uuid::Uuid;

use crate::action::post::{self as action, FetchedPosts};
use crate::error::SyncError;
use crate::network::{PostClient, POSTS_PER_PAGE};
use crate::types::{Post, PostType, Site, SiteId};

use super::{expect_true, id_param, Value, XmlRpcClient};

pub struct XmlRpcPostClient {
    client: XmlRpcClient,
}

impl XmlRpcPostClient {
    pub fn new(client: XmlRpcClient) -> Self {
        Self { client }
    }
}

impl PostClient for XmlRpcPostClient {
    fn fetch_posts(&self, site: Site, post_type: PostType, offset: usize) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let filter = Value::structure([
                ("post_type", Value::string(post_type.as_str())),
                ("number", Value::Int(POSTS_PER_PAGE as i64)),
                ("offset", Value::Int(offset as i64)),
            ]);
            let result = client
                .call(&site, "wp.getPosts", vec![filter])
                .await
                .and_then(|value| post_page(&value, site.id, post_type));
            action::fetched_posts(site, post_type, offset > 0, result)
        });
    }

    fn push_post(&self, site: Site, post: Post) {
        let client = self.client.clone();
        self.client.context().complete(async move {
            let result = send_post(&client, &site, &post).await.map(|remote_id| Post {
                remote_id,
                locally_changed: false,
                ..post.clone()
            });
            action::pushed_post(site, post, result)
        });
    }
}

/// Create or update `post`, returning its remote id
async fn send_post(client: &XmlRpcClient, site: &Site, post: &Post) -> Result<u64, SyncError> {
    let content = Value::structure([
        ("post_type", Value::string(post.post_type.as_str())),
        ("post_title", Value::string(post.title.as_str())),
        ("post_content", Value::string(post.content.as_str())),
        ("post_status", Value::string(post.status.as_str())),
    ]);

    if post.remote_id == 0 {
        let value = client.call(site, "wp.newPost", vec![content]).await?;
        return value
            .as_u64()
            .ok_or_else(|| SyncError::parse("wp.newPost did not return a post id"));
    }

    let id = id_param(post.remote_id)?;
    let value = client.call(site, "wp.editPost", vec![id, content]).await?;
    expect_true(&value, "wp.editPost", post.remote_id)?;
    Ok(post.remote_id)
}

fn post_page(value: &Value, site_id: SiteId, post_type: PostType) -> Result<FetchedPosts, SyncError> {
    let posts = value
        .as_array()
        .ok_or_else(|| SyncError::parse("wp.getPosts did not return an array"))?
        .iter()
        .map(|item| post_from_value(item, site_id, post_type))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FetchedPosts {
        can_load_more: posts.len() == POSTS_PER_PAGE,
        posts,
    })
}

fn post_from_value(value: &Value, site_id: SiteId, post_type: PostType) -> Result<Post, SyncError> {
    let text = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or_default().to_string();

    let remote_id = value
        .get("post_id")
        .and_then(Value::as_u64)
        .ok_or_else(|| SyncError::parse("post without post_id"))?;

    Ok(Post {
        local_id: Uuid::new_v4(),
        site_id: site_id.0,
        remote_id,
        post_type,
        title: text("post_title"),
        content: text("post_content"),
        status: text("post_status"),
        link: value
            .get("link")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        created_at: value.get("post_date_gmt").and_then(Value::as_datetime),
        locally_changed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str) -> Value {
        Value::structure([
            ("post_id", Value::string(id)),
            ("post_title", Value::string("Hello")),
            ("post_content", Value::string("<p>World</p>")),
            ("post_status", Value::string("publish")),
            ("post_type", Value::string("page")),
            ("link", Value::string("https://blog.example/hello")),
            ("post_date_gmt", Value::DateTime("20240301T08:00:00".into())),
        ])
    }

    #[test]
    fn test_post_from_value() {
        let post = post_from_value(&post("5"), SiteId(7), PostType::Page).unwrap();
        assert_eq!(post.remote_id, 5);
        assert_eq!(post.site_id, 7);
        assert_eq!(post.post_type, PostType::Page);
        assert_eq!(post.title, "Hello");
        assert_eq!(post.status, "publish");
        assert_eq!(post.link.as_deref(), Some("https://blog.example/hello"));
        assert!(post.created_at.is_some());
        assert!(!post.locally_changed);
    }

    #[test]
    fn test_short_page_cannot_load_more() {
        let page = post_page(&Value::Array(vec![post("1"), post("2")]), SiteId(7), PostType::Post).unwrap();
        assert_eq!(page.posts.len(), 2);
        assert!(!page.can_load_more);
    }

    #[test]
    fn test_full_page_can_load_more() {
        let items = (1..=POSTS_PER_PAGE).map(|i| post(&i.to_string())).collect();
        let page = post_page(&Value::Array(items), SiteId(7), PostType::Post).unwrap();
        assert!(page.can_load_more);
    }

    #[test]
    fn test_post_without_id() {
        let value = Value::structure([("post_title", Value::string("x"))]);
        assert!(post_from_value(&value, SiteId(7), PostType::Post).is_err());
    }
}
