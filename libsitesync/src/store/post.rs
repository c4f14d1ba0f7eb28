//! Post store

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::emit_change;
use crate::action::post::{FetchPostsPayload, FetchedPosts};
use crate::action::{Action, ActionKind, PostAction};
use crate::dispatcher::Subscriber;
use crate::error::SyncError;
use crate::events::{EventBus, StoreId};
use crate::network::PostClient;
use crate::types::{Post, PostType, SiteId};

#[derive(Debug, Default)]
struct PostList {
    posts: Vec<Post>,
    can_load_more: bool,
}

/// Posts and pages keyed by `(site, post type)`
///
/// Local edits survive a refresh: when fetched posts replace a list, a post
/// with unpushed changes keeps its local copy.
pub struct PostStore {
    rest: Arc<dyn PostClient>,
    xmlrpc: Arc<dyn PostClient>,
    events: EventBus,
    lists: Mutex<HashMap<(SiteId, PostType), PostList>>,
}

impl PostStore {
    pub fn new(rest: Arc<dyn PostClient>, xmlrpc: Arc<dyn PostClient>, events: EventBus) -> Self {
        Self {
            rest,
            xmlrpc,
            events,
            lists: Mutex::new(HashMap::new()),
        }
    }

    pub fn posts(&self, site_id: SiteId, post_type: PostType) -> Vec<Post> {
        self.lists
            .lock()
            .get(&(site_id, post_type))
            .map(|list| list.posts.clone())
            .unwrap_or_default()
    }

    pub fn post(&self, site_id: SiteId, post_type: PostType, remote_id: u64) -> Option<Post> {
        self.lists
            .lock()
            .get(&(site_id, post_type))
            .and_then(|list| list.posts.iter().find(|p| p.remote_id == remote_id).cloned())
    }

    pub fn post_count(&self, site_id: SiteId, post_type: PostType) -> usize {
        self.lists
            .lock()
            .get(&(site_id, post_type))
            .map_or(0, |list| list.posts.len())
    }

    /// Whether the server reported more posts after the last fetched page
    pub fn can_load_more(&self, site_id: SiteId, post_type: PostType) -> bool {
        self.lists
            .lock()
            .get(&(site_id, post_type))
            .is_some_and(|list| list.can_load_more)
    }

    fn client(&self, uses_rest: bool) -> &Arc<dyn PostClient> {
        if uses_rest {
            &self.rest
        } else {
            &self.xmlrpc
        }
    }

    fn emit(&self, cause: ActionKind, site_id: SiteId, error: Option<SyncError>) {
        emit_change(&self.events, StoreId::Post, cause, site_id, error);
    }

    fn fetch(&self, payload: &FetchPostsPayload, post_type: PostType) {
        let offset = if payload.load_more {
            self.post_count(payload.site.id, post_type)
        } else {
            0
        };
        self.client(payload.site.uses_rest_api())
            .fetch_posts(payload.site.clone(), post_type, offset);
    }

    fn on_fetched(
        &self,
        cause: ActionKind,
        site_id: SiteId,
        post_type: PostType,
        load_more: bool,
        result: &Result<FetchedPosts, SyncError>,
    ) {
        let page = match result {
            Ok(page) => page,
            Err(err) => return self.emit(cause, site_id, Some(err.clone())),
        };

        {
            let mut lists = self.lists.lock();
            let list = lists.entry((site_id, post_type)).or_default();
            if load_more {
                for post in &page.posts {
                    if !list.posts.iter().any(|p| p.remote_id == post.remote_id) {
                        list.posts.push(post.clone());
                    }
                }
            } else {
                list.posts = merge_keeping_local_changes(&list.posts, &page.posts);
            }
            list.can_load_more = page.can_load_more;
            debug!(%site_id, post_type = post_type.as_str(), count = list.posts.len(), "Posts updated");
        }
        self.emit(cause, site_id, None);
    }

    fn on_local_update(&self, cause: ActionKind, post: &Post) {
        let site_id = SiteId(post.site_id);
        {
            let mut lists = self.lists.lock();
            let list = lists.entry((site_id, post.post_type)).or_default();
            let mut edited = post.clone();
            edited.locally_changed = true;
            match list.posts.iter_mut().find(|p| p.is_same_post(post)) {
                Some(existing) => *existing = edited,
                None => list.posts.insert(0, edited),
            }
        }
        self.emit(cause, site_id, None);
    }

    fn on_pushed(&self, cause: ActionKind, site_id: SiteId, local: &Post, result: &Result<Post, SyncError>) {
        let pushed = match result {
            Ok(pushed) => pushed,
            Err(err) => return self.emit(cause, site_id, Some(err.clone())),
        };

        {
            let mut lists = self.lists.lock();
            let list = lists.entry((site_id, pushed.post_type)).or_default();
            let stored = Post {
                local_id: local.local_id,
                ..pushed.clone()
            };
            let position = list
                .posts
                .iter()
                .position(|p| p.is_same_post(local) || p.is_same_post(&stored));
            match position {
                Some(index) => list.posts[index] = stored,
                None => list.posts.insert(0, stored),
            }
        }
        self.emit(cause, site_id, None);
    }
}

/// Fetched posts replace the list, except where a local edit is pending
fn merge_keeping_local_changes(current: &[Post], fetched: &[Post]) -> Vec<Post> {
    let mut merged: Vec<Post> = current
        .iter()
        .filter(|p| p.locally_changed && p.remote_id == 0)
        .cloned()
        .collect();

    merged.extend(fetched.iter().map(|post| {
        current
            .iter()
            .find(|p| p.locally_changed && p.remote_id == post.remote_id)
            .unwrap_or(post)
            .clone()
    }));
    merged
}

impl Subscriber for PostStore {
    fn name(&self) -> &str {
        "post-store"
    }

    fn handle(&self, action: &Action) {
        let Action::Post(action) = action else {
            return;
        };
        let cause = action.kind();

        match action {
            PostAction::FetchPosts(payload) => self.fetch(payload, PostType::Post),
            PostAction::FetchPages(payload) => self.fetch(payload, PostType::Page),
            PostAction::PushPost(payload) => self
                .client(payload.site.uses_rest_api())
                .push_post(payload.site.clone(), payload.post.clone()),

            PostAction::UpdatePost(post) => self.on_local_update(cause, post),
            PostAction::FetchedPosts(payload) => self.on_fetched(
                cause,
                payload.site.id,
                payload.post_type,
                payload.load_more,
                &payload.result,
            ),
            PostAction::PushedPost(payload) => {
                self.on_pushed(cause, payload.site.id, &payload.post, &payload.result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::post as action;
    use crate::events::ChangeReceiver;
    use crate::types::Site;

    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<String>>,
    }

    impl PostClient for RecordingClient {
        fn fetch_posts(&self, site: Site, post_type: PostType, offset: usize) {
            self.calls
                .lock()
                .push(format!("fetch:{}:{}:{}", site.id, post_type.as_str(), offset));
        }
        fn push_post(&self, site: Site, post: Post) {
            self.calls.lock().push(format!("push:{}:{}", site.id, post.remote_id));
        }
    }

    fn setup() -> (PostStore, Arc<RecordingClient>, Arc<RecordingClient>, ChangeReceiver) {
        let rest = Arc::new(RecordingClient::default());
        let xmlrpc = Arc::new(RecordingClient::default());
        let events = EventBus::new(32);
        let receiver = events.subscribe();
        (
            PostStore::new(rest.clone(), xmlrpc.clone(), events),
            rest,
            xmlrpc,
            receiver,
        )
    }

    fn site() -> Site {
        Site::rest(42, "https://example.wordpress.com", "token")
    }

    fn post(id: u64, title: &str) -> Post {
        Post {
            remote_id: id,
            ..Post::draft(42, PostType::Post, title, "", "publish")
        }
    }

    fn page(posts: Vec<Post>, can_load_more: bool) -> Result<FetchedPosts, SyncError> {
        Ok(FetchedPosts { posts, can_load_more })
    }

    #[test]
    fn test_fetch_offsets() {
        let (store, rest, xmlrpc, _receiver) = setup();
        store.handle(&action::fetched_posts(site(), PostType::Post, false, page(vec![post(1, "a"), post(2, "b")], true)));

        store.handle(&action::fetch_posts(site(), false));
        store.handle(&action::fetch_posts(site(), true));
        let blog = Site::xmlrpc(7, "https://blog.example", "https://blog.example/xmlrpc.php", "admin", "pw");
        store.handle(&action::fetch_pages(blog, false));

        assert_eq!(*rest.calls.lock(), vec!["fetch:42:post:0", "fetch:42:post:2"]);
        assert_eq!(*xmlrpc.calls.lock(), vec!["fetch:7:page:0"]);
    }

    #[test]
    fn test_refresh_replaces_load_more_appends() {
        let (store, _rest, _xmlrpc, mut receiver) = setup();

        store.handle(&action::fetched_posts(site(), PostType::Post, false, page(vec![post(1, "a"), post(2, "b")], true)));
        store.handle(&action::fetched_posts(site(), PostType::Post, true, page(vec![post(2, "b"), post(3, "c")], false)));

        let ids: Vec<u64> = store.posts(SiteId(42), PostType::Post).iter().map(|p| p.remote_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(!store.can_load_more(SiteId(42), PostType::Post));

        store.handle(&action::fetched_posts(site(), PostType::Post, false, page(vec![post(9, "z")], true)));
        assert_eq!(store.post_count(SiteId(42), PostType::Post), 1);
        assert!(store.can_load_more(SiteId(42), PostType::Post));
        assert_eq!(store.post_count(SiteId(42), PostType::Page), 0);

        for _ in 0..3 {
            assert_eq!(receiver.try_recv().unwrap().cause, ActionKind::FetchedPosts);
        }
    }

    #[test]
    fn test_local_edit_survives_refresh() {
        let (store, _rest, _xmlrpc, _receiver) = setup();
        store.handle(&action::fetched_posts(site(), PostType::Post, false, page(vec![post(1, "server")], false)));

        store.handle(&action::update_post(post(1, "local edit")));
        store.handle(&action::fetched_posts(site(), PostType::Post, false, page(vec![post(1, "server"), post(2, "new")], false)));

        let edited = store.post(SiteId(42), PostType::Post, 1).unwrap();
        assert_eq!(edited.title, "local edit");
        assert!(edited.locally_changed);
        assert_eq!(store.post_count(SiteId(42), PostType::Post), 2);
    }

    #[test]
    fn test_push_applies_server_copy() {
        let (store, rest, _xmlrpc, mut receiver) = setup();
        store.handle(&action::update_post(post(0, "draft")));
        let _ = receiver.try_recv();

        let local = store.posts(SiteId(42), PostType::Post).remove(0);
        store.handle(&action::push_post(site(), local.clone()));
        assert_eq!(*rest.calls.lock(), vec!["push:42:0"]);
        assert!(receiver.try_recv().is_err());

        store.handle(&action::pushed_post(site(), local, Ok(post(15, "draft"))));

        let posts = store.posts(SiteId(42), PostType::Post);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].remote_id, 15);
        assert!(!posts[0].locally_changed);
    }

    #[test]
    fn test_repeated_draft_edits_keep_one_entry() {
        let (store, _rest, _xmlrpc, _receiver) = setup();
        let mut draft = post(0, "v1");
        store.handle(&action::update_post(draft.clone()));
        draft.title = "v2".to_string();
        store.handle(&action::update_post(draft.clone()));

        let posts = store.posts(SiteId(42), PostType::Post);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "v2");

        store.handle(&action::update_post(post(0, "other draft")));
        assert_eq!(store.post_count(SiteId(42), PostType::Post), 2);

        store.handle(&action::pushed_post(site(), draft.clone(), Ok(post(21, "v2"))));
        let posts = store.posts(SiteId(42), PostType::Post);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts.iter().filter(|p| p.remote_id == 0).count(), 1);
        let pushed = store.post(SiteId(42), PostType::Post, 21).unwrap();
        assert_eq!(pushed.local_id, draft.local_id);
    }

    #[test]
    fn test_failed_push_keeps_local_copy() {
        let (store, _rest, _xmlrpc, mut receiver) = setup();
        store.handle(&action::update_post(post(3, "edited")));
        let _ = receiver.try_recv();

        store.handle(&action::pushed_post(site(), post(3, "edited"), Err(SyncError::authorization("expired"))));

        assert!(store.post(SiteId(42), PostType::Post, 3).unwrap().locally_changed);
        assert!(receiver.try_recv().unwrap().is_error());
    }
}
