//! Scripted transport for testing
//!
//! [`MockTransport`] answers requests from a table of scripted replies instead
//! of the network and records every request it sees. It drives the whole
//! pipeline in integration tests without a server.
//!
//! A route matches when its pattern occurs in the request URL or in a textual
//! request body. The longest matching pattern wins, so `"/plugins/akismet"`
//! takes precedence over `"/plugins"`. XML-RPC calls all share one endpoint,
//! so they are usually scripted by method name (`"wp.getMediaLibrary"`).
//!
//! Each route holds a queue of replies. Replies are consumed in order and the
//! last one repeats.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::warn;

use super::{HttpRequest, HttpResponse, HttpTransport, ProgressSink, TransportFault};

#[derive(Debug, Clone)]
pub enum MockReply {
    Response(HttpResponse),
    Fault(TransportFault),
}

struct Route {
    pattern: String,
    replies: VecDeque<MockReply>,
}

#[derive(Default)]
struct MockState {
    routes: Vec<Route>,
    requests: Vec<HttpRequest>,
    progress_steps: Vec<f32>,
    delay: Duration,
}

/// Transport returning scripted replies
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for requests matching `pattern`
    pub fn reply(&self, pattern: &str, reply: MockReply) -> &Self {
        let mut state = self.state.lock();
        match state.routes.iter_mut().find(|route| route.pattern == pattern) {
            Some(route) => route.replies.push_back(reply),
            None => state.routes.push(Route {
                pattern: pattern.to_string(),
                replies: VecDeque::from([reply]),
            }),
        }
        drop(state);
        self
    }

    pub fn respond(&self, pattern: &str, status: u16, body: &str) -> &Self {
        self.reply(pattern, MockReply::Response(HttpResponse::new(status, body)))
    }

    pub fn respond_json(&self, pattern: &str, status: u16, body: serde_json::Value) -> &Self {
        self.respond(pattern, status, &body.to_string())
    }

    pub fn fail(&self, pattern: &str, fault: TransportFault) -> &Self {
        self.reply(pattern, MockReply::Fault(fault))
    }

    /// Fractions reported by `send_with_progress` before the reply is returned
    pub fn with_progress_steps(self, steps: Vec<f32>) -> Self {
        self.state.lock().progress_steps = steps;
        self
    }

    /// Delay applied before every reply (simulates network latency)
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().delay = delay;
        self
    }

    /// Every request seen so far, in arrival order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    fn next_reply(&self, request: &HttpRequest) -> (Option<MockReply>, Duration) {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        let delay = state.delay;

        let body = request.body.text().unwrap_or_default();
        let route = state
            .routes
            .iter_mut()
            .filter(|route| request.url.contains(&route.pattern) || body.contains(&route.pattern))
            .max_by_key(|route| route.pattern.len());

        let reply = route.and_then(|route| {
            if route.replies.len() > 1 {
                route.replies.pop_front()
            } else {
                route.replies.front().cloned()
            }
        });
        (reply, delay)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFault> {
        let (reply, delay) = self.next_reply(&request);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::Fault(fault)) => Err(fault),
            None => {
                warn!(url = %request.url, "No scripted reply for request");
                Err(TransportFault::Connectivity(format!(
                    "no scripted reply for {}",
                    request.url
                )))
            }
        }
    }

    async fn send_with_progress(
        &self,
        request: HttpRequest,
        progress: ProgressSink,
    ) -> Result<HttpResponse, TransportFault> {
        let steps = self.state.lock().progress_steps.clone();
        for step in steps {
            progress(step);
        }
        self.send(request).await
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Body;

    #[tokio::test]
    async fn test_scripted_response() {
        let mock = MockTransport::new();
        mock.respond("/sites/42/plugins", 200, r#"{"plugins":[]}"#);

        let response = mock
            .send(HttpRequest::get("https://api.example/sites/42/plugins"))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_longest_pattern_wins() {
        let mock = MockTransport::new();
        mock.respond("/plugins", 200, "list");
        mock.respond("/plugins/akismet", 200, "single");

        let response = mock
            .send(HttpRequest::get("https://api.example/sites/1/plugins/akismet"))
            .await
            .unwrap();
        assert_eq!(response.body, "single");
    }

    #[tokio::test]
    async fn test_replies_consumed_in_order_last_repeats() {
        let mock = MockTransport::new();
        mock.respond("/media", 500, "first").respond("/media", 200, "second");

        let url = "https://api.example/sites/1/media";
        assert_eq!(mock.send(HttpRequest::get(url)).await.unwrap().body, "first");
        assert_eq!(mock.send(HttpRequest::get(url)).await.unwrap().body, "second");
        assert_eq!(mock.send(HttpRequest::get(url)).await.unwrap().body, "second");
    }

    #[tokio::test]
    async fn test_matches_xmlrpc_method_in_body() {
        let mock = MockTransport::new();
        mock.respond("wp.deletePost", 200, "deleted");

        let request = HttpRequest::post(
            "https://blog.example/xmlrpc.php",
            Body::Xml("<methodCall><methodName>wp.deletePost</methodName></methodCall>".into()),
        );
        assert_eq!(mock.send(request).await.unwrap().body, "deleted");
    }

    #[tokio::test]
    async fn test_fault_and_unmatched() {
        let mock = MockTransport::new();
        mock.fail("/posts", TransportFault::Timeout("30s".into()));

        let result = mock.send(HttpRequest::get("https://api.example/sites/1/posts")).await;
        assert_eq!(result, Err(TransportFault::Timeout("30s".into())));

        let result = mock.send(HttpRequest::get("https://api.example/other")).await;
        assert!(matches!(result, Err(TransportFault::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_progress_steps_reported() {
        let mock = MockTransport::new().with_progress_steps(vec![0.25, 0.5, 1.0]);
        mock.respond("/media/new", 200, "{}");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: ProgressSink = Arc::new(move |fraction| sink_seen.lock().push(fraction));

        mock.send_with_progress(HttpRequest::post("https://api.example/sites/1/media/new", Body::Empty), sink)
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![0.25, 0.5, 1.0]);
    }
}
