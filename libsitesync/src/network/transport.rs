//! Production HTTP transport built on reqwest

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use tracing::debug;

use super::{Auth, Body, HttpRequest, HttpResponse, HttpTransport, Method, ProgressSink, TransportFault};
use crate::error::{ConfigError, Result};

/// Size of the slices a request body is streamed in when progress is observed
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "network".to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    fn builder(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        match &request.auth {
            Auth::None => builder,
            Auth::Bearer(token) => builder.bearer_auth(token.expose_secret()),
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password.expose_secret())),
        }
    }

    async fn execute(&self, builder: reqwest::RequestBuilder) -> std::result::Result<HttpResponse, TransportFault> {
        let response = builder.send().await.map_err(fault_from_reqwest)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(fault_from_reqwest)?;
        debug!(status, bytes = body.len(), "Received HTTP response");
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportFault> {
        debug!(method = ?request.method, url = %request.url, "Sending HTTP request");
        let builder = self.builder(&request);
        let builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Xml(xml) => builder.header(CONTENT_TYPE, "text/xml").body(xml),
            Body::Multipart {
                field,
                file_name,
                mime_type,
                bytes,
                fields,
            } => {
                let part = Part::bytes(bytes.to_vec())
                    .file_name(file_name)
                    .mime_str(&mime_type)
                    .map_err(|e| TransportFault::InvalidRequest(format!("invalid MIME type {}: {}", mime_type, e)))?;
                builder.multipart(form(field, part, fields))
            }
        };
        self.execute(builder).await
    }

    async fn send_with_progress(
        &self,
        request: HttpRequest,
        progress: ProgressSink,
    ) -> std::result::Result<HttpResponse, TransportFault> {
        debug!(method = ?request.method, url = %request.url, "Sending HTTP request with progress");
        let builder = self.builder(&request);
        let builder = match request.body {
            Body::Multipart {
                field,
                file_name,
                mime_type,
                bytes,
                fields,
            } => {
                let length = bytes.len() as u64;
                let part = Part::stream_with_length(progress_body(bytes, progress), length)
                    .file_name(file_name)
                    .mime_str(&mime_type)
                    .map_err(|e| TransportFault::InvalidRequest(format!("invalid MIME type {}: {}", mime_type, e)))?;
                builder.multipart(form(field, part, fields))
            }
            Body::Xml(xml) => {
                let bytes: Arc<[u8]> = Arc::from(xml.into_bytes());
                builder
                    .header(CONTENT_TYPE, "text/xml")
                    .header(CONTENT_LENGTH, bytes.len())
                    .body(progress_body(bytes, progress))
            }
            other => {
                return self
                    .send(HttpRequest {
                        body: other,
                        ..request
                    })
                    .await
            }
        };
        self.execute(builder).await
    }

    fn name(&self) -> &str {
        "reqwest"
    }
}

fn form(field: String, part: Part, fields: Vec<(String, String)>) -> Form {
    fields
        .into_iter()
        .fold(Form::new(), |form, (name, value)| form.text(name, value))
        .part(field, part)
}

/// Stream `bytes` in chunks, reporting the fraction handed to the connection
fn progress_body(bytes: Arc<[u8]>, progress: ProgressSink) -> reqwest::Body {
    let stream = futures::stream::iter(progress_chunks(bytes, progress).map(Ok::<_, std::io::Error>));
    reqwest::Body::wrap_stream(stream)
}

fn progress_chunks(bytes: Arc<[u8]>, progress: ProgressSink) -> impl Iterator<Item = Vec<u8>> + Send + Sync {
    let total = bytes.len().max(1);
    let chunks: Vec<Vec<u8>> = bytes.chunks(UPLOAD_CHUNK_SIZE).map(<[u8]>::to_vec).collect();
    let mut sent = 0usize;
    chunks.into_iter().map(move |chunk| {
        sent += chunk.len();
        progress(sent as f32 / total as f32);
        chunk
    })
}

fn fault_from_reqwest(err: reqwest::Error) -> TransportFault {
    if err.is_timeout() {
        TransportFault::Timeout(err.to_string())
    } else if err.is_decode() {
        TransportFault::MalformedBody(err.to_string())
    } else if err.is_builder() {
        TransportFault::InvalidRequest(err.to_string())
    } else {
        TransportFault::Connectivity(err.to_string())
    }
}
