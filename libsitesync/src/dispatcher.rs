//! Action dispatcher
//!
//! The [`Dispatcher`] is the single entry point for actions. `dispatch` hands
//! the action to every registered [`Subscriber`] in registration order and
//! returns once all of them have handled it.
//!
//! # Delivery rounds
//!
//! - Rounds are serialized: a dispatch from another thread (for example a
//!   network completion on a tokio worker) waits until the current round ends.
//! - Dispatching from inside a handler, on the thread that is running the
//!   round, is rejected with [`DispatchError::Reentrant`].
//! - The subscriber list is snapshotted when a round starts, so registering or
//!   unregistering during a round only affects later rounds.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use libsitesync::action::{post, Action};
//! use libsitesync::dispatcher::{Dispatcher, Subscriber};
//! use libsitesync::types::Site;
//!
//! struct Logger;
//!
//! impl Subscriber for Logger {
//!     fn name(&self) -> &str {
//!         "logger"
//!     }
//!
//!     fn handle(&self, action: &Action) {
//!         println!("saw {}", action.kind());
//!     }
//! }
//!
//! let dispatcher = Dispatcher::new();
//! dispatcher.register(Arc::new(Logger));
//!
//! let site = Site::rest(1, "https://example.wordpress.com", "token");
//! dispatcher.dispatch(post::fetch_posts(site, false)).unwrap();
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::action::Action;
use crate::error::DispatchError;

/// Receiver of dispatched actions
///
/// Handlers run synchronously inside a delivery round and must not block on
/// I/O. Network work is handed to a client, which re-enters the dispatcher
/// from its own task when the operation completes.
pub trait Subscriber: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Handle one action. Actions a subscriber does not own are ignored.
    fn handle(&self, action: &Action);
}

/// Handle returned by [`Dispatcher::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Registration = (SubscriberId, Arc<dyn Subscriber>);

struct Inner {
    subscribers: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
    /// Held for the duration of a delivery round
    round: Mutex<()>,
    /// Thread currently running a delivery round
    delivering_on: Mutex<Option<ThreadId>>,
    shut_down: AtomicBool,
}

/// Cheap-to-clone handle to one dispatcher instance
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                round: Mutex::new(()),
                delivering_on: Mutex::new(None),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Append a subscriber to the delivery order
    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(subscriber = subscriber.name(), "Registering subscriber");
        self.inner.subscribers.write().push((id, subscriber));
        id
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(registered, _)| *registered != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Whether the calling thread is inside a delivery round
    pub fn is_dispatching(&self) -> bool {
        *self.inner.delivering_on.lock() == Some(thread::current().id())
    }

    /// Deliver `action` to every registered subscriber
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Reentrant`] when called from a handler on the thread
    ///   that is running the current round
    /// - [`DispatchError::ShutDown`] after [`Dispatcher::shutdown`]
    pub fn dispatch(&self, action: Action) -> Result<(), DispatchError> {
        let kind = action.kind();
        let current = thread::current().id();

        if *self.inner.delivering_on.lock() == Some(current) {
            error!(
                action = %kind,
                "Rejected reentrant dispatch from inside a subscriber handler"
            );
            return Err(DispatchError::Reentrant(kind));
        }

        let _round = self.inner.round.lock();

        if self.inner.shut_down.load(Ordering::Acquire) {
            warn!(action = %kind, "Dropping action dispatched after shutdown");
            return Err(DispatchError::ShutDown(kind));
        }

        let subscribers: Vec<Registration> = self.inner.subscribers.read().clone();
        let _delivering = DeliveryGuard::enter(&self.inner.delivering_on, current);

        debug!(
            action = %kind,
            site_id = ?action.site_id(),
            subscribers = subscribers.len(),
            "Dispatching action"
        );

        for (_, subscriber) in &subscribers {
            subscriber.handle(&action);
        }

        Ok(())
    }

    /// Stop accepting actions and drop every subscriber
    ///
    /// A round already in progress finishes with its snapshot. Network
    /// completions that arrive later are logged and dropped.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
        self.inner.subscribers.write().clear();
        info!("Dispatcher shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }
}

/// Marks the current thread as delivering; cleared on drop, including unwinds
struct DeliveryGuard<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
}

impl<'a> DeliveryGuard<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>, thread: ThreadId) -> Self {
        *slot.lock() = Some(thread);
        Self { slot }
    }
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{post, ActionKind};
    use crate::types::Site;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn site() -> Site {
        Site::rest(42, "https://example.wordpress.com", "token")
    }

    /// Appends `name:ACTION` to a shared log
    struct Recorder {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                log: Arc::clone(log),
            })
        }
    }

    impl Subscriber for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn handle(&self, action: &Action) {
            self.log.lock().push(format!("{}:{}", self.name, action.kind()));
        }
    }

    /// Dispatches from inside its own handler
    struct Reentrant {
        dispatcher: Dispatcher,
        outcome: Mutex<Option<Result<(), DispatchError>>>,
    }

    impl Subscriber for Reentrant {
        fn name(&self) -> &str {
            "reentrant"
        }

        fn handle(&self, action: &Action) {
            if action.kind() == ActionKind::FetchPosts {
                let result = self.dispatcher.dispatch(post::fetch_pages(site(), false));
                *self.outcome.lock() = Some(result);
            }
        }
    }

    #[test]
    fn test_delivers_in_registration_order() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register(Recorder::new("a", &log));
        dispatcher.register(Recorder::new("b", &log));
        dispatcher.register(Recorder::new("c", &log));

        dispatcher.dispatch(post::fetch_posts(site(), false)).unwrap();

        assert_eq!(
            *log.lock(),
            vec!["a:FETCH_POSTS", "b:FETCH_POSTS", "c:FETCH_POSTS"]
        );
    }

    #[test]
    fn test_each_action_delivered_exactly_once() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register(Recorder::new("a", &log));

        dispatcher.dispatch(post::fetch_posts(site(), false)).unwrap();
        dispatcher.dispatch(post::fetch_pages(site(), false)).unwrap();

        assert_eq!(*log.lock(), vec!["a:FETCH_POSTS", "a:FETCH_PAGES"]);
    }

    #[test]
    fn test_reentrant_dispatch_fails_fast() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let reentrant = Arc::new(Reentrant {
            dispatcher: dispatcher.clone(),
            outcome: Mutex::new(None),
        });
        dispatcher.register(reentrant.clone());
        dispatcher.register(Recorder::new("after", &log));

        dispatcher.dispatch(post::fetch_posts(site(), false)).unwrap();

        assert_eq!(
            *reentrant.outcome.lock(),
            Some(Err(DispatchError::Reentrant(ActionKind::FetchPages)))
        );
        // The nested action was never delivered; the outer round completed
        assert_eq!(*log.lock(), vec!["after:FETCH_POSTS"]);
        // The dispatcher is usable again once the round ends
        assert!(!dispatcher.is_dispatching());
        dispatcher.dispatch(post::fetch_pages(site(), false)).unwrap();
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_unregister_takes_effect_next_round() {
        struct Unregisterer {
            dispatcher: Dispatcher,
            target: Mutex<Option<SubscriberId>>,
        }

        impl Subscriber for Unregisterer {
            fn name(&self) -> &str {
                "unregisterer"
            }

            fn handle(&self, _action: &Action) {
                if let Some(id) = self.target.lock().take() {
                    assert!(self.dispatcher.unregister(id));
                }
            }
        }

        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let unregisterer = Arc::new(Unregisterer {
            dispatcher: dispatcher.clone(),
            target: Mutex::new(None),
        });
        dispatcher.register(unregisterer.clone());
        let victim = dispatcher.register(Recorder::new("victim", &log));
        *unregisterer.target.lock() = Some(victim);

        dispatcher.dispatch(post::fetch_posts(site(), false)).unwrap();
        assert_eq!(*log.lock(), vec!["victim:FETCH_POSTS"]);

        dispatcher.dispatch(post::fetch_pages(site(), false)).unwrap();
        assert_eq!(log.lock().len(), 1);
        assert_eq!(dispatcher.subscriber_count(), 1);
    }

    #[test]
    fn test_register_during_round_joins_next_round() {
        struct Registrar {
            dispatcher: Dispatcher,
            log: Arc<Mutex<Vec<String>>>,
            done: AtomicBool,
        }

        impl Subscriber for Registrar {
            fn name(&self) -> &str {
                "registrar"
            }

            fn handle(&self, _action: &Action) {
                if !self.done.swap(true, Ordering::SeqCst) {
                    self.dispatcher.register(Recorder::new("late", &self.log));
                }
            }
        }

        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register(Arc::new(Registrar {
            dispatcher: dispatcher.clone(),
            log: Arc::clone(&log),
            done: AtomicBool::new(false),
        }));

        dispatcher.dispatch(post::fetch_posts(site(), false)).unwrap();
        assert!(log.lock().is_empty());

        dispatcher.dispatch(post::fetch_pages(site(), false)).unwrap();
        assert_eq!(*log.lock(), vec!["late:FETCH_PAGES"]);
    }

    #[test]
    fn test_unregister_unknown_id() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = dispatcher.register(Recorder::new("a", &log));

        assert!(dispatcher.unregister(id));
        assert!(!dispatcher.unregister(id));
    }

    #[test]
    fn test_rounds_are_serialized_across_threads() {
        struct Overlap {
            in_flight: AtomicUsize,
            max_seen: AtomicUsize,
            delivered: AtomicUsize,
        }

        impl Subscriber for Overlap {
            fn name(&self) -> &str {
                "overlap"
            }

            fn handle(&self, _action: &Action) {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                self.delivered.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dispatcher = Dispatcher::new();
        let overlap = Arc::new(Overlap {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            delivered: AtomicUsize::new(0),
        });
        dispatcher.register(overlap.clone());
        dispatcher.register(overlap.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                thread::spawn(move || {
                    for _ in 0..5 {
                        dispatcher.dispatch(post::fetch_posts(site(), false)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(overlap.max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(overlap.delivered.load(Ordering::SeqCst), 8 * 5 * 2);
    }

    #[test]
    fn test_shutdown_rejects_further_dispatch() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register(Recorder::new("a", &log));

        dispatcher.shutdown();

        assert!(dispatcher.is_shut_down());
        assert_eq!(dispatcher.subscriber_count(), 0);
        assert_eq!(
            dispatcher.dispatch(post::fetch_posts(site(), false)),
            Err(DispatchError::ShutDown(ActionKind::FetchPosts))
        );
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_panicking_handler_does_not_wedge_dispatcher() {
        struct Panicker;

        impl Subscriber for Panicker {
            fn name(&self) -> &str {
                "panicker"
            }

            fn handle(&self, action: &Action) {
                if action.kind() == ActionKind::FetchPosts {
                    panic!("handler bug");
                }
            }
        }

        let dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(Panicker));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            dispatcher.dispatch(post::fetch_posts(site(), false))
        }));
        assert!(result.is_err());

        assert!(!dispatcher.is_dispatching());
        assert!(dispatcher.dispatch(post::fetch_pages(site(), false)).is_ok());
    }
}
