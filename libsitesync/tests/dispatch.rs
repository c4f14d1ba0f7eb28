//! Dispatcher behaviour observed through a running service

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{rest_site, service, REST_SITE};
use libsitesync::action::{plugin, Action};
use libsitesync::error::DispatchError;
use libsitesync::network::mock::MockTransport;
use libsitesync::{ActionKind, Dispatcher, SiteId, SitesyncError, Subscriber};
use parking_lot::Mutex;
use serde_json::json;

/// Records every action kind it sees
#[derive(Default)]
struct Journal {
    seen: Mutex<Vec<ActionKind>>,
}

impl Subscriber for Journal {
    fn name(&self) -> &str {
        "journal"
    }

    fn handle(&self, action: &Action) {
        self.seen.lock().push(action.kind());
    }
}

/// Tries to dispatch again from inside its handler
struct Echo {
    dispatcher: Dispatcher,
    outcome: Mutex<Option<Result<(), DispatchError>>>,
}

impl Subscriber for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn handle(&self, action: &Action) {
        if action.kind() == ActionKind::FetchSitePlugins {
            let result = self.dispatcher.dispatch(plugin::fetch_site_plugins(rest_site()));
            *self.outcome.lock() = Some(result);
        }
    }
}

#[tokio::test]
async fn test_observer_sees_request_and_result() {
    let transport = MockTransport::new();
    transport.respond_json("/sites/42/plugins", 200, json!({ "plugins": [] }));
    let sync = service(&transport);
    let journal = Arc::new(Journal::default());
    sync.dispatcher().register(journal.clone());

    sync.request(plugin::fetch_site_plugins(rest_site())).await.unwrap();

    assert_eq!(
        *journal.seen.lock(),
        vec![ActionKind::FetchSitePlugins, ActionKind::FetchedSitePlugins]
    );
    assert_eq!(sync.dispatcher().subscriber_count(), 4);
}

#[tokio::test]
async fn test_reentrant_dispatch_rejected() {
    let transport = MockTransport::new();
    transport.respond_json("/sites/42/plugins", 200, json!({ "plugins": [] }));
    let sync = service(&transport);
    let echo = Arc::new(Echo {
        dispatcher: sync.dispatcher().clone(),
        outcome: Mutex::new(None),
    });
    sync.dispatcher().register(echo.clone());

    sync.request(plugin::fetch_site_plugins(rest_site())).await.unwrap();

    assert_eq!(
        *echo.outcome.lock(),
        Some(Err(DispatchError::Reentrant(ActionKind::FetchSitePlugins)))
    );
    // Only the outer request reached the network
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_results_after_shutdown_are_dropped() {
    let transport = MockTransport::new().with_delay(Duration::from_millis(50));
    transport.respond_json(
        "/sites/42/plugins",
        200,
        json!({ "plugins": [{ "id": "akismet/akismet", "slug": "akismet", "active": true }] }),
    );
    let sync = service(&transport);
    let mut receiver = sync.subscribe();

    sync.dispatch(plugin::fetch_site_plugins(rest_site())).unwrap();
    sync.shutdown();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(transport.request_count(), 1);
    assert!(sync.plugins().site_plugins(SiteId(REST_SITE)).is_empty());
    assert!(receiver.try_recv().is_err());

    match sync.dispatch(plugin::fetch_site_plugins(rest_site())) {
        Err(SitesyncError::Dispatch(DispatchError::ShutDown(kind))) => {
            assert_eq!(kind, ActionKind::FetchSitePlugins)
        }
        other => panic!("expected shutdown error, got {:?}", other),
    }
}
