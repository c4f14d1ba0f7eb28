//! Media actions

use uuid::Uuid;

use super::{Action, ActionKind};
use crate::error::SyncError;
use crate::types::{Media, MediaUpload, Progress, Site, SiteId};

#[derive(Debug, Clone)]
pub enum MediaAction {
    FetchAllMedia(Site),
    FetchMedia { site: Site, media_ids: Vec<u64> },
    FetchedMedia(FetchedMediaPayload),
    /// Push local edits (title, caption, description) of one item
    PushMedia { site: Site, media: Media },
    PushedMedia(PushedMediaPayload),
    UploadMedia { site: Site, upload: MediaUpload },
    /// Either an in-flight progress report or the final outcome of an upload
    UploadedMedia(UploadedMediaPayload),
    DeleteMedia { site: Site, media: Media },
    DeletedMedia(DeletedMediaPayload),
}

/// Which request a `FetchedMedia` result answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScope {
    /// Whole library; the result replaces the site's media
    Library,
    /// Individual items; results are merged
    Items,
}

#[derive(Debug, Clone)]
pub struct FetchedMediaPayload {
    pub site: Site,
    pub scope: FetchScope,
    pub result: Result<Vec<Media>, SyncError>,
}

#[derive(Debug, Clone)]
pub struct PushedMediaPayload {
    pub site: Site,
    pub media: Media,
    pub result: Result<Media, SyncError>,
}

#[derive(Debug, Clone)]
pub enum UploadState {
    InProgress(Progress),
    Completed(Media),
    Failed(SyncError),
}

impl UploadState {
    pub fn is_final(&self) -> bool {
        !matches!(self, UploadState::InProgress(_))
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            UploadState::Failed(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedMediaPayload {
    pub site: Site,
    pub local_id: Uuid,
    pub state: UploadState,
}

#[derive(Debug, Clone)]
pub struct DeletedMediaPayload {
    pub site: Site,
    pub media: Media,
    pub result: Result<(), SyncError>,
}

impl MediaAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            MediaAction::FetchAllMedia(_) => ActionKind::FetchAllMedia,
            MediaAction::FetchMedia { .. } => ActionKind::FetchMedia,
            MediaAction::FetchedMedia(_) => ActionKind::FetchedMedia,
            MediaAction::PushMedia { .. } => ActionKind::PushMedia,
            MediaAction::PushedMedia(_) => ActionKind::PushedMedia,
            MediaAction::UploadMedia { .. } => ActionKind::UploadMedia,
            MediaAction::UploadedMedia(_) => ActionKind::UploadedMedia,
            MediaAction::DeleteMedia { .. } => ActionKind::DeleteMedia,
            MediaAction::DeletedMedia(_) => ActionKind::DeletedMedia,
        }
    }

    pub fn site_id(&self) -> SiteId {
        match self {
            MediaAction::FetchAllMedia(site)
            | MediaAction::FetchMedia { site, .. }
            | MediaAction::PushMedia { site, .. }
            | MediaAction::UploadMedia { site, .. }
            | MediaAction::DeleteMedia { site, .. } => site.id,
            MediaAction::FetchedMedia(p) => p.site.id,
            MediaAction::PushedMedia(p) => p.site.id,
            MediaAction::UploadedMedia(p) => p.site.id,
            MediaAction::DeletedMedia(p) => p.site.id,
        }
    }
}

pub fn fetch_all_media(site: Site) -> Action {
    MediaAction::FetchAllMedia(site).into()
}

pub fn fetch_media(site: Site, media_ids: Vec<u64>) -> Action {
    MediaAction::FetchMedia { site, media_ids }.into()
}

pub fn push_media(site: Site, media: Media) -> Action {
    MediaAction::PushMedia { site, media }.into()
}

pub fn upload_media(site: Site, upload: MediaUpload) -> Action {
    MediaAction::UploadMedia { site, upload }.into()
}

pub fn delete_media(site: Site, media: Media) -> Action {
    MediaAction::DeleteMedia { site, media }.into()
}

pub fn fetched_media(site: Site, scope: FetchScope, result: Result<Vec<Media>, SyncError>) -> Action {
    MediaAction::FetchedMedia(FetchedMediaPayload {
        site,
        scope,
        result,
    })
    .into()
}

pub fn pushed_media(site: Site, media: Media, result: Result<Media, SyncError>) -> Action {
    MediaAction::PushedMedia(PushedMediaPayload {
        site,
        media,
        result,
    })
    .into()
}

pub fn upload_progress(site: Site, local_id: Uuid, progress: Progress) -> Action {
    uploaded_media(site, local_id, UploadState::InProgress(progress))
}

pub fn uploaded_media(site: Site, local_id: Uuid, state: UploadState) -> Action {
    MediaAction::UploadedMedia(UploadedMediaPayload {
        site,
        local_id,
        state,
    })
    .into()
}

pub fn deleted_media(site: Site, media: Media, result: Result<(), SyncError>) -> Action {
    MediaAction::DeletedMedia(DeletedMediaPayload {
        site,
        media,
        result,
    })
    .into()
}
