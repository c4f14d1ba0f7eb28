//! XML-RPC clients for self-hosted sites
//!
//! Every WordPress XML-RPC method takes `blog_id, username, password` as its
//! leading parameters; [`XmlRpcClient::call`] prepends them. The same
//! credentials also go out as HTTP basic authentication, which hosts behind
//! an authenticating proxy require.

use secrecy::ExposeSecret;
use tracing::debug;

use super::{normalize, normalize_delete, Auth, Body, HttpRequest, HttpResponse, NetworkContext, ProgressSink, TransportFault};
use crate::error::SyncError;
use crate::types::{Site, SiteApi};

pub mod codec;
pub mod media;
pub mod post;

pub use codec::Value;
pub use media::XmlRpcMediaClient;
pub use post::XmlRpcPostClient;

/// Shared plumbing for XML-RPC clients
#[derive(Clone)]
pub struct XmlRpcClient {
    ctx: NetworkContext,
}

impl XmlRpcClient {
    pub fn new(ctx: NetworkContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &NetworkContext {
        &self.ctx
    }

    /// Invoke `method` on the site's endpoint
    pub async fn call(&self, site: &Site, method: &str, params: Vec<Value>) -> Result<Value, SyncError> {
        let request = build_request(site, method, params)?;
        debug!(site_id = %site.id, method, "XML-RPC call");
        let response = self.ctx.transport().send(request).await.map_err(normalize)?;
        decode(response).map_err(normalize)
    }

    /// Invoke a delete-style method; a missing target comes back as `NOT_FOUND`
    pub async fn call_delete(&self, site: &Site, method: &str, params: Vec<Value>) -> Result<Value, SyncError> {
        let request = build_request(site, method, params)?;
        debug!(site_id = %site.id, method, "XML-RPC delete call");
        let response = self
            .ctx
            .transport()
            .send(request)
            .await
            .map_err(normalize_delete)?;
        decode(response).map_err(normalize_delete)
    }

    /// Like [`call`](Self::call), reporting request body progress
    pub async fn call_with_progress(
        &self,
        site: &Site,
        method: &str,
        params: Vec<Value>,
        progress: ProgressSink,
    ) -> Result<Value, SyncError> {
        let request = build_request(site, method, params)?;
        debug!(site_id = %site.id, method, "XML-RPC call with progress");
        let response = self
            .ctx
            .transport()
            .send_with_progress(request, progress)
            .await
            .map_err(normalize)?;
        decode(response).map_err(normalize)
    }
}

fn build_request(site: &Site, method: &str, params: Vec<Value>) -> Result<HttpRequest, SyncError> {
    let SiteApi::XmlRpc {
        endpoint,
        blog_id,
        username,
        password,
    } = &site.api
    else {
        return Err(SyncError::requires_precondition(format!(
            "site {} has no XML-RPC endpoint",
            site.id
        )));
    };

    let mut all = Vec::with_capacity(params.len() + 3);
    all.push(id_param(*blog_id)?);
    all.push(Value::string(username.as_str()));
    all.push(Value::string(password.expose_secret()));
    all.extend(params);

    let auth = Auth::Basic {
        username: username.clone(),
        password: password.clone(),
    };
    Ok(HttpRequest::post(endpoint.as_str(), Body::Xml(codec::encode_call(method, &all))).with_auth(auth))
}

/// Integer parameter for an id; XML-RPC integers are signed
pub(crate) fn id_param(id: u64) -> Result<Value, SyncError> {
    i64::try_from(id)
        .map(Value::Int)
        .map_err(|_| SyncError::generic(format!("id {} is out of range for XML-RPC", id)))
}

/// Boolean answer of an update or delete call
///
/// A missing or non-boolean answer is a malformed response; `false` means the
/// server refused.
pub(crate) fn expect_true(value: &Value, method: &str, id: u64) -> Result<(), SyncError> {
    match value.as_bool() {
        Some(true) => Ok(()),
        Some(false) => Err(SyncError::generic(format!("{} refused for id {}", method, id))),
        None => Err(SyncError::parse(format!("{} did not return a boolean", method))),
    }
}

/// Interpret an HTTP response carrying a `methodResponse`
fn decode(response: HttpResponse) -> Result<Value, TransportFault> {
    if !response.is_success() {
        // Some servers send a fault document alongside an error status
        if let Err(fault @ TransportFault::XmlRpc { .. }) = codec::decode_response(&response.body) {
            return Err(fault);
        }
        return Err(TransportFault::Status {
            status: response.status,
            body: response.body,
        });
    }
    codec::decode_response(&response.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_request_prepends_credentials() {
        let site = Site::xmlrpc(7, "https://blog.example", "https://blog.example/xmlrpc.php", "admin", "pw");
        let request = build_request(&site, "wp.getMediaItem", vec![Value::Int(99)]).unwrap();

        assert_eq!(request.url, "https://blog.example/xmlrpc.php");
        let body = request.body.text().unwrap();
        let blog = body.find("<int>1</int>").unwrap();
        let user = body.find("admin").unwrap();
        let pass = body.find("<string>pw</string>").unwrap();
        let item = body.find("<int>99</int>").unwrap();
        assert!(blog < user && user < pass && pass < item);
    }

    #[test]
    fn test_request_carries_basic_auth() {
        let site = Site::xmlrpc(7, "https://blog.example", "https://blog.example/xmlrpc.php", "admin", "pw");
        let request = build_request(&site, "wp.uploadFile", vec![]).unwrap();

        match request.auth {
            Auth::Basic { username, password } => {
                assert_eq!(username, "admin");
                assert_eq!(password.expose_secret(), "pw");
            }
            other => panic!("expected basic auth, got {:?}", other),
        }
    }

    #[test]
    fn test_id_param_range() {
        assert_eq!(id_param(42).unwrap(), Value::Int(42));
        let err = id_param(u64::MAX).unwrap_err();
        assert_eq!(err.kind, ErrorKind::GenericError);
    }

    #[test]
    fn test_expect_true() {
        assert!(expect_true(&Value::Bool(true), "wp.editPost", 3).is_ok());
        assert_eq!(
            expect_true(&Value::Bool(false), "wp.editPost", 3).unwrap_err().kind,
            ErrorKind::GenericError
        );
        assert_eq!(
            expect_true(&Value::string("ok"), "wp.deletePost", 3).unwrap_err().kind,
            ErrorKind::ParseError
        );
    }

    #[test]
    fn test_request_requires_xmlrpc_site() {
        let site = Site::rest(42, "https://example.wordpress.com", "token");
        let err = build_request(&site, "wp.getMediaItem", vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RequiresPrecondition);
    }

    #[test]
    fn test_decode_http_error() {
        let result = decode(HttpResponse::new(404, "<html>Not Found</html>"));
        assert_eq!(
            result,
            Err(TransportFault::Status {
                status: 404,
                body: "<html>Not Found</html>".to_string()
            })
        );
    }

    #[test]
    fn test_decode_fault_with_error_status() {
        let body = "<methodResponse><fault><value><struct>\
                    <member><name>faultCode</name><value><int>403</int></value></member>\
                    <member><name>faultString</name><value><string>Forbidden</string></value></member>\
                    </struct></value></fault></methodResponse>";
        assert!(matches!(
            decode(HttpResponse::new(500, body)),
            Err(TransportFault::XmlRpc { code: 403, .. })
        ));
    }
}
