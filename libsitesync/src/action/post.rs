//! Post and page actions

use super::{Action, ActionKind};
use crate::error::SyncError;
use crate::types::{Post, PostType, Site, SiteId};

#[derive(Debug, Clone)]
pub enum PostAction {
    FetchPosts(FetchPostsPayload),
    FetchPages(FetchPostsPayload),
    FetchedPosts(FetchedPostsPayload),
    /// Local edit, no network call
    UpdatePost(Post),
    PushPost(PushPostPayload),
    PushedPost(PushedPostPayload),
}

#[derive(Debug, Clone)]
pub struct FetchPostsPayload {
    pub site: Site,
    /// Fetch the next page instead of refreshing from the start
    pub load_more: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FetchedPosts {
    pub posts: Vec<Post>,
    pub can_load_more: bool,
}

#[derive(Debug, Clone)]
pub struct FetchedPostsPayload {
    pub site: Site,
    pub post_type: PostType,
    pub load_more: bool,
    pub result: Result<FetchedPosts, SyncError>,
}

#[derive(Debug, Clone)]
pub struct PushPostPayload {
    pub site: Site,
    pub post: Post,
}

#[derive(Debug, Clone)]
pub struct PushedPostPayload {
    pub site: Site,
    pub post: Post,
    pub result: Result<Post, SyncError>,
}

impl PostAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            PostAction::FetchPosts(_) => ActionKind::FetchPosts,
            PostAction::FetchPages(_) => ActionKind::FetchPages,
            PostAction::FetchedPosts(_) => ActionKind::FetchedPosts,
            PostAction::UpdatePost(_) => ActionKind::UpdatePost,
            PostAction::PushPost(_) => ActionKind::PushPost,
            PostAction::PushedPost(_) => ActionKind::PushedPost,
        }
    }

    pub fn site_id(&self) -> Option<SiteId> {
        match self {
            PostAction::FetchPosts(p) | PostAction::FetchPages(p) => Some(p.site.id),
            PostAction::FetchedPosts(p) => Some(p.site.id),
            PostAction::UpdatePost(post) => Some(SiteId(post.site_id)),
            PostAction::PushPost(p) => Some(p.site.id),
            PostAction::PushedPost(p) => Some(p.site.id),
        }
    }
}

pub fn fetch_posts(site: Site, load_more: bool) -> Action {
    PostAction::FetchPosts(FetchPostsPayload { site, load_more }).into()
}

pub fn fetch_pages(site: Site, load_more: bool) -> Action {
    PostAction::FetchPages(FetchPostsPayload { site, load_more }).into()
}

pub fn update_post(post: Post) -> Action {
    PostAction::UpdatePost(post).into()
}

pub fn push_post(site: Site, post: Post) -> Action {
    PostAction::PushPost(PushPostPayload { site, post }).into()
}

pub fn fetched_posts(
    site: Site,
    post_type: PostType,
    load_more: bool,
    result: Result<FetchedPosts, SyncError>,
) -> Action {
    PostAction::FetchedPosts(FetchedPostsPayload {
        site,
        post_type,
        load_more,
        result,
    })
    .into()
}

pub fn pushed_post(site: Site, post: Post, result: Result<Post, SyncError>) -> Action {
    PostAction::PushedPost(PushedPostPayload { site, post, result }).into()
}
