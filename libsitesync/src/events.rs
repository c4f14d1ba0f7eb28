//! Change events
//!
//! Stores announce that their state may have changed by emitting a
//! [`ChangeEvent`] on the [`EventBus`]. An event carries no state snapshot:
//! observers re-query the store through its accessors.
//!
//! # Architecture
//!
//! The bus uses `tokio::sync::broadcast` for multi-subscriber support. Emitting
//! never blocks: if nobody is subscribed the event is dropped, and a lagging
//! subscriber loses the oldest events rather than stalling a store.
//!
//! # Example
//!
//! ```no_run
//! use libsitesync::events::{ChangeEvent, EventBus, StoreId};
//! use libsitesync::action::ActionKind;
//! use libsitesync::types::SiteId;
//!
//! # async fn example() {
//! let bus = EventBus::new(100);
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(ChangeEvent::ok(StoreId::Plugin, ActionKind::FetchedSitePlugins, SiteId(42)));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("{:?} changed after {}", event.source, event.cause);
//! }
//! # }
//! ```

use tokio::sync::broadcast;

use crate::action::ActionKind;
use crate::error::SyncError;
use crate::types::{Progress, SiteId};

/// Change event receiver type alias
pub type ChangeReceiver = broadcast::Receiver<ChangeEvent>;

/// Store that emitted a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreId {
    Post,
    Media,
    Plugin,
}

impl StoreId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreId::Post => "post",
            StoreId::Media => "media",
            StoreId::Plugin => "plugin",
        }
    }
}

/// Notification that a store processed an action
///
/// A non-`None` error means the action failed and the store's state is
/// unchanged from before it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub source: StoreId,
    /// The action that was processed
    pub cause: ActionKind,
    pub site_id: SiteId,
    pub error: Option<SyncError>,
    /// Set on upload progress notifications, which precede the final event
    pub progress: Option<Progress>,
}

impl ChangeEvent {
    pub fn ok(source: StoreId, cause: ActionKind, site_id: SiteId) -> Self {
        Self {
            source,
            cause,
            site_id,
            error: None,
            progress: None,
        }
    }

    pub fn failed(source: StoreId, cause: ActionKind, site_id: SiteId, error: SyncError) -> Self {
        Self {
            source,
            cause,
            site_id,
            error: Some(error),
            progress: None,
        }
    }

    pub fn in_progress(source: StoreId, cause: ActionKind, site_id: SiteId, progress: Progress) -> Self {
        Self {
            source,
            cause,
            site_id,
            error: None,
            progress: Some(progress),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the processed action finished its operation
    pub fn is_final(&self) -> bool {
        self.progress.is_none()
    }
}

/// Event bus for distributing change events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified capacity
    ///
    /// The capacity determines how many events can be buffered per subscriber
    /// before older events are dropped.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to change events emitted after this call
    pub fn subscribe(&self) -> ChangeReceiver {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers without blocking
    pub fn emit(&self, event: ChangeEvent) {
        // send() only fails when nobody is listening
        let _ = self.sender.send(event);
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_emission_and_subscription() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        bus.emit(ChangeEvent::ok(StoreId::Plugin, ActionKind::FetchedSitePlugins, SiteId(42)));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.source, StoreId::Plugin);
        assert_eq!(received.cause, ActionKind::FetchedSitePlugins);
        assert_eq!(received.site_id, SiteId(42));
        assert!(!received.is_error());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut receiver1 = bus.subscribe();
        let mut receiver2 = bus.subscribe();

        let event = ChangeEvent::failed(
            StoreId::Media,
            ActionKind::FetchedMedia,
            SiteId(7),
            SyncError::generic("timeout"),
        );
        bus.emit(event.clone());

        assert_eq!(receiver1.recv().await.unwrap(), event);
        assert_eq!(receiver2.recv().await.unwrap(), event);
    }

    #[test]
    fn test_no_subscribers() {
        let bus = EventBus::new(10);

        // Should not panic or block
        bus.emit(ChangeEvent::ok(StoreId::Post, ActionKind::FetchedPosts, SiteId(1)));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_count() {
        let bus = EventBus::new(10);
        let _receiver1 = bus.subscribe();
        let _receiver2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_events_arrive_in_emission_order() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        bus.emit(ChangeEvent::ok(StoreId::Post, ActionKind::FetchedPosts, SiteId(1)));
        bus.emit(ChangeEvent::ok(StoreId::Post, ActionKind::UpdatePost, SiteId(1)));

        assert_eq!(receiver.try_recv().unwrap().cause, ActionKind::FetchedPosts);
        assert_eq!(receiver.try_recv().unwrap().cause, ActionKind::UpdatePost);
        assert!(receiver.try_recv().is_err());
    }
}
