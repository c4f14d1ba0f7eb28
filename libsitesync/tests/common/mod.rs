//! Shared fixtures for pipeline tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use libsitesync::events::ChangeReceiver;
use libsitesync::network::mock::MockTransport;
use libsitesync::{ChangeEvent, Config, ErrorKind, Site, SiteSync, SitesyncError};
use tokio::runtime::Handle;

pub const REST_SITE: u64 = 42;
pub const XMLRPC_SITE: u64 = 7;
pub const XMLRPC_ENDPOINT: &str = "https://blog.example/xmlrpc.php";

pub fn rest_site() -> Site {
    Site::rest(REST_SITE, "https://example.wordpress.com", "secret-token")
}

pub fn xmlrpc_site() -> Site {
    Site::xmlrpc(XMLRPC_SITE, "https://blog.example", XMLRPC_ENDPOINT, "admin", "hunter2")
}

/// Service over `transport` with short timeouts
pub fn service(transport: &MockTransport) -> SiteSync {
    let mut config = Config::default_config();
    config.network.timeout = "2s".to_string();
    SiteSync::with_transport(config, Arc::new(transport.clone()), Handle::current()).unwrap()
}

/// Next final change event, skipping progress notifications
pub async fn next_final(receiver: &mut ChangeReceiver) -> ChangeEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("timed out waiting for a change event")
            .expect("event bus closed");
        if event.is_final() {
            return event;
        }
    }
}

/// Kind of a failed sync outcome
pub fn sync_kind(err: &SitesyncError) -> Option<ErrorKind> {
    match err {
        SitesyncError::Sync(err) => Some(err.kind),
        _ => None,
    }
}

/// Wrap XML-RPC values in a `methodResponse`
pub fn xmlrpc_response(value: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?><methodResponse><params><param><value>{}</value></param></params></methodResponse>",
        value
    )
}

pub fn xmlrpc_fault(code: i64, message: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?><methodResponse><fault><value><struct>\
         <member><name>faultCode</name><value><int>{}</int></value></member>\
         <member><name>faultString</name><value><string>{}</string></value></member>\
         </struct></value></fault></methodResponse>",
        code, message
    )
}
