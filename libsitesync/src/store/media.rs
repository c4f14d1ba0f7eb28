//! Media store

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

use super::emit_change;
use crate::action::media::{FetchScope, UploadState};
use crate::action::{Action, ActionKind, MediaAction};
use crate::dispatcher::Subscriber;
use crate::error::SyncError;
use crate::events::{ChangeEvent, EventBus, StoreId};
use crate::network::MediaClient;
use crate::types::{Media, Progress, Site, SiteId};

/// Media libraries keyed by `(site, media id)`
///
/// In-flight uploads are tracked separately by local id until the server
/// assigns a media id.
pub struct MediaStore {
    rest: Arc<dyn MediaClient>,
    xmlrpc: Arc<dyn MediaClient>,
    events: EventBus,
    media: Mutex<BTreeMap<(SiteId, u64), Media>>,
    uploads: Mutex<HashMap<Uuid, Progress>>,
}

impl MediaStore {
    pub fn new(rest: Arc<dyn MediaClient>, xmlrpc: Arc<dyn MediaClient>, events: EventBus) -> Self {
        Self {
            rest,
            xmlrpc,
            events,
            media: Mutex::new(BTreeMap::new()),
            uploads: Mutex::new(HashMap::new()),
        }
    }

    /// Media of a site ordered by media id
    pub fn site_media(&self, site_id: SiteId) -> Vec<Media> {
        self.media
            .lock()
            .range((site_id, u64::MIN)..=(site_id, u64::MAX))
            .map(|(_, media)| media.clone())
            .collect()
    }

    pub fn media(&self, site_id: SiteId, media_id: u64) -> Option<Media> {
        self.media.lock().get(&(site_id, media_id)).cloned()
    }

    pub fn media_count(&self, site_id: SiteId) -> usize {
        self.media
            .lock()
            .range((site_id, u64::MIN)..=(site_id, u64::MAX))
            .count()
    }

    /// Progress of an upload that has not finished yet
    pub fn upload_progress(&self, local_id: Uuid) -> Option<Progress> {
        self.uploads.lock().get(&local_id).copied()
    }

    fn client(&self, site: &Site) -> &Arc<dyn MediaClient> {
        if site.uses_rest_api() {
            &self.rest
        } else {
            &self.xmlrpc
        }
    }

    fn emit(&self, cause: ActionKind, site_id: SiteId, error: Option<SyncError>) {
        emit_change(&self.events, StoreId::Media, cause, site_id, error);
    }

    fn on_fetched(&self, cause: ActionKind, site_id: SiteId, scope: FetchScope, result: &Result<Vec<Media>, SyncError>) {
        let fetched = match result {
            Ok(fetched) => fetched,
            Err(err) => return self.emit(cause, site_id, Some(err.clone())),
        };

        {
            let mut media = self.media.lock();
            if scope == FetchScope::Library {
                debug!(%site_id, count = fetched.len(), "Replacing media library");
                media.retain(|(site, _), _| *site != site_id);
            }
            for item in fetched {
                media.insert((site_id, item.media_id), item.clone());
            }
        }
        self.emit(cause, site_id, None);
    }

    fn on_uploaded(&self, cause: ActionKind, site_id: SiteId, local_id: Uuid, state: &UploadState) {
        match state {
            UploadState::InProgress(progress) => {
                if let Some(current) = self.uploads.lock().get_mut(&local_id) {
                    *current = *progress;
                }
                trace!(%site_id, %local_id, progress = progress.value(), "Upload progress");
                self.events
                    .emit(ChangeEvent::in_progress(StoreId::Media, cause, site_id, *progress));
            }
            UploadState::Completed(uploaded) => {
                {
                    let mut media = self.media.lock();
                    self.uploads.lock().remove(&local_id);
                    media.insert((site_id, uploaded.media_id), uploaded.clone());
                }
                debug!(%site_id, %local_id, media_id = uploaded.media_id, "Upload completed");
                self.emit(cause, site_id, None);
            }
            UploadState::Failed(err) => {
                self.uploads.lock().remove(&local_id);
                self.emit(cause, site_id, Some(err.clone()));
            }
        }
    }
}

impl Subscriber for MediaStore {
    fn name(&self) -> &str {
        "media-store"
    }

    fn handle(&self, action: &Action) {
        let Action::Media(action) = action else {
            return;
        };
        let cause = action.kind();

        match action {
            MediaAction::FetchAllMedia(site) => self.client(site).fetch_all_media(site.clone()),
            MediaAction::FetchMedia { site, media_ids } => {
                self.client(site).fetch_media(site.clone(), media_ids.clone())
            }
            MediaAction::PushMedia { site, media } => self.client(site).push_media(site.clone(), media.clone()),
            MediaAction::UploadMedia { site, upload } => {
                self.uploads.lock().insert(upload.local_id, Progress::new(0.0));
                self.client(site).upload_media(site.clone(), upload.clone());
            }
            MediaAction::DeleteMedia { site, media } => {
                self.client(site).delete_media(site.clone(), media.clone())
            }

            MediaAction::FetchedMedia(payload) => {
                self.on_fetched(cause, payload.site.id, payload.scope, &payload.result)
            }
            MediaAction::PushedMedia(payload) => match &payload.result {
                Ok(pushed) => {
                    self.media
                        .lock()
                        .insert((payload.site.id, pushed.media_id), pushed.clone());
                    self.emit(cause, payload.site.id, None);
                }
                Err(err) => self.emit(cause, payload.site.id, Some(err.clone())),
            },
            MediaAction::UploadedMedia(payload) => {
                self.on_uploaded(cause, payload.site.id, payload.local_id, &payload.state)
            }
            MediaAction::DeletedMedia(payload) => match &payload.result {
                Ok(()) => {
                    self.media.lock().remove(&(payload.site.id, payload.media.media_id));
                    self.emit(cause, payload.site.id, None);
                }
                Err(err) => self.emit(cause, payload.site.id, Some(err.clone())),
            },
        }
    }
}
