//! Stores
//!
//! A store owns the local state of one domain and is registered with the
//! dispatcher as a [`Subscriber`](crate::dispatcher::Subscriber). It reacts to
//! two kinds of actions:
//!
//! - Request actions start a network operation through the store's client and
//!   leave state untouched, so they emit no change event. The one exception is
//!   a request the store rejects locally, which is answered at once with an
//!   error event.
//! - Result actions are applied in a single step under the store's lock and
//!   then announced with exactly one [`ChangeEvent`]. A failed result leaves
//!   state as it was and carries the error in the event.
//!
//! Results apply in dispatch order, so when two requests for the same data
//! overlap, whichever completes last wins.

use tracing::{debug, warn};

use crate::action::ActionKind;
use crate::error::SyncError;
use crate::events::{ChangeEvent, EventBus, StoreId};
use crate::types::SiteId;

pub mod media;
pub mod plugin;
pub mod post;

pub use media::MediaStore;
pub use plugin::PluginStore;
pub use post::PostStore;

/// Announce that `cause` was processed
pub(crate) fn emit_change(
    events: &EventBus,
    source: StoreId,
    cause: ActionKind,
    site_id: SiteId,
    error: Option<SyncError>,
) {
    match &error {
        None => debug!(store = source.as_str(), action = %cause, %site_id, "Store changed"),
        Some(err) if cause.is_result() => warn!(
            store = source.as_str(),
            action = %cause,
            %site_id,
            error = %err,
            "Action failed, store unchanged"
        ),
        Some(err) => warn!(
            store = source.as_str(),
            action = %cause,
            %site_id,
            error = %err,
            "Request rejected before sending"
        ),
    }

    events.emit(ChangeEvent {
        source,
        cause,
        site_id,
        error,
        progress: None,
    });
}
