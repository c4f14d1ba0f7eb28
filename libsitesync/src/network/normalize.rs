//! Transport fault normalization
//!
//! Every transport reports failures as a [`TransportFault`]. Before a fault
//! reaches a result action it is translated into the canonical [`SyncError`],
//! so stores never see transport-specific details.
//!
//! Classification order:
//!
//! 1. Connectivity failures and timeouts become `GENERIC_ERROR`; undecodable
//!    bodies become `PARSE_ERROR`.
//! 2. Recognized domain faults (structured codes first, then message patterns)
//!    get their dedicated kinds, even when they arrive with an HTTP 404.
//! 3. HTTP 404 or XML-RPC fault code 404 becomes `NOT_FOUND`.
//! 4. HTTP 401/403, fault codes 401/403 and authorization codes become
//!    `AUTHORIZATION_ERROR`.
//! 5. Anything else becomes `GENERIC_ERROR` carrying the best message available.
//!
//! Delete-style operations go through [`normalize_delete`] instead, which checks
//! step 3 before step 2: a target reported missing is `NOT_FOUND` whatever
//! domain code comes with it, and [`absorb_not_found`] turns that into success.

use tracing::debug;

use crate::error::{ErrorKind, SyncError};

/// Longest slice of an unstructured error body kept in a message
const MAX_BODY_EXCERPT: usize = 200;

/// Failure reported by a transport or by response decoding
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFault {
    /// The server could not be reached
    Connectivity(String),

    Timeout(String),

    /// The request could not be built (bad URL, bad MIME type)
    InvalidRequest(String),

    /// The response body could not be decoded
    MalformedBody(String),

    /// Non-success status without a structured error body
    Status { status: u16, body: String },

    /// REST error body: `{ "error": code, "message": text }`
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// XML-RPC `<fault>`
    XmlRpc { code: i64, message: String },
}

impl TransportFault {
    /// Whether the server reported the target as missing (HTTP 404 or fault 404)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TransportFault::Status { status: 404, .. }
                | TransportFault::Api { status: 404, .. }
                | TransportFault::XmlRpc { code: 404, .. }
        )
    }
}

/// Translate a fault raised by a delete-style operation
pub fn normalize_delete(fault: TransportFault) -> SyncError {
    let message = match &fault {
        TransportFault::Api { code, message, .. } if fault.is_not_found() => {
            if message.is_empty() {
                code.clone()
            } else {
                message.clone()
            }
        }
        TransportFault::Status { body, .. } if fault.is_not_found() => {
            if body.trim().is_empty() {
                "HTTP 404".to_string()
            } else {
                format!("HTTP 404: {}", excerpt(body))
            }
        }
        TransportFault::XmlRpc { message, .. } if fault.is_not_found() => message.clone(),
        _ => return normalize(fault),
    };
    debug!(message = %message, "Delete target reported missing");
    SyncError::not_found(message)
}

/// Translate a transport fault into the canonical error
pub fn normalize(fault: TransportFault) -> SyncError {
    let error = match fault {
        TransportFault::Connectivity(message) => {
            SyncError::generic(format!("Network unreachable: {}", message))
        }
        TransportFault::Timeout(message) => {
            SyncError::generic(format!("Request timed out: {}", message))
        }
        TransportFault::InvalidRequest(message) => SyncError::generic(message),
        TransportFault::MalformedBody(message) => SyncError::parse(message),
        TransportFault::Api {
            status,
            code,
            message,
        } => {
            let message = if message.is_empty() { code.clone() } else { message };
            match domain_kind(Some(&code), &message) {
                Some(kind) => SyncError::new(kind, message),
                None if is_authorization_code(&code) => SyncError::authorization(message),
                None => classify_status(status, message),
            }
        }
        TransportFault::Status { status, body } => match domain_kind(None, &body) {
            Some(kind) => SyncError::new(kind, excerpt(&body)),
            None => {
                let message = if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    format!("HTTP {}: {}", status, excerpt(&body))
                };
                classify_status(status, message)
            }
        },
        TransportFault::XmlRpc { code, message } => match domain_kind(None, &message) {
            Some(kind) => SyncError::new(kind, message),
            None => match code {
                404 => SyncError::not_found(message),
                401 | 403 => SyncError::authorization(message),
                _ => SyncError::generic(format!("XML-RPC fault {}: {}", code, message)),
            },
        },
    };

    debug!(kind = %error.kind, message = %error.message, "Normalized transport fault");
    error
}

/// Treat `NOT_FOUND` as success
///
/// Used by delete operations: removing something that is already gone leaves
/// the system in the requested state.
pub fn absorb_not_found(result: Result<(), SyncError>) -> Result<(), SyncError> {
    match result {
        Err(err) if err.is_not_found() => {
            debug!(message = %err.message, "Target already absent, treating delete as successful");
            Ok(())
        }
        other => other,
    }
}

fn domain_kind(code: Option<&str>, message: &str) -> Option<ErrorKind> {
    if let Some(code) = code {
        match code {
            "unknown_plugin" | "no_package" | "plugin_not_found" => {
                return Some(ErrorKind::UnknownResource)
            }
            "delete_plugin_error" | "activated_plugin" | "plugin_active" => {
                return Some(ErrorKind::RequiresPrecondition)
            }
            _ => {}
        }
    }

    let message = message.to_lowercase();
    if message.contains("plugin does not exist") || message.contains("plugin not found") {
        Some(ErrorKind::UnknownResource)
    } else if message.contains("active plugin") {
        Some(ErrorKind::RequiresPrecondition)
    } else {
        None
    }
}

fn is_authorization_code(code: &str) -> bool {
    matches!(
        code,
        "unauthorized" | "authorization_required" | "invalid_token" | "rest_forbidden" | "forbidden"
    )
}

fn classify_status(status: u16, message: String) -> SyncError {
    match status {
        404 => SyncError::not_found(message),
        401 | 403 => SyncError::authorization(message),
        _ => SyncError::generic(message),
    }
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: &str, message: &str) -> TransportFault {
        TransportFault::Api {
            status,
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_connectivity_and_timeout_are_generic() {
        let error = normalize(TransportFault::Connectivity("connection refused".into()));
        assert_eq!(error.kind, ErrorKind::GenericError);
        assert!(error.message.contains("connection refused"));

        let error = normalize(TransportFault::Timeout("30s elapsed".into()));
        assert_eq!(error.kind, ErrorKind::GenericError);
    }

    #[test]
    fn test_malformed_body_is_parse_error() {
        let error = normalize(TransportFault::MalformedBody("expected value at line 1".into()));
        assert_eq!(error.kind, ErrorKind::ParseError);
    }

    #[test]
    fn test_http_404_is_not_found() {
        let error = normalize(TransportFault::Status {
            status: 404,
            body: String::new(),
        });
        assert_eq!(error.kind, ErrorKind::NotFound);
        assert_eq!(error.message, "HTTP 404");
    }

    #[test]
    fn test_xmlrpc_fault_404_is_not_found() {
        let error = normalize(TransportFault::XmlRpc {
            code: 404,
            message: "Invalid post ID.".into(),
        });
        assert_eq!(error.kind, ErrorKind::NotFound);
        assert_eq!(error.message, "Invalid post ID.");
    }

    #[test]
    fn test_unknown_plugin_code() {
        let error = normalize(api(404, "unknown_plugin", "Plugin not found"));
        assert_eq!(error.kind, ErrorKind::UnknownResource);
        assert_eq!(error.message, "Plugin not found");
    }

    #[test]
    fn test_active_plugin_code() {
        let error = normalize(api(400, "delete_plugin_error", "You cannot delete a plugin while it is active"));
        assert_eq!(error.kind, ErrorKind::RequiresPrecondition);
    }

    #[test]
    fn test_domain_message_patterns() {
        let error = normalize(api(400, "something_else", "The plugin does not exist."));
        assert_eq!(error.kind, ErrorKind::UnknownResource);

        let error = normalize(TransportFault::Status {
            status: 500,
            body: "Cannot delete an active plugin".into(),
        });
        assert_eq!(error.kind, ErrorKind::RequiresPrecondition);

        let error = normalize(TransportFault::XmlRpc {
            code: 500,
            message: "Plugin does not exist".into(),
        });
        assert_eq!(error.kind, ErrorKind::UnknownResource);
    }

    #[test]
    fn test_authorization() {
        assert_eq!(
            normalize(api(400, "unauthorized", "User cannot manage plugins")).kind,
            ErrorKind::AuthorizationError
        );
        assert_eq!(
            normalize(TransportFault::Status {
                status: 403,
                body: String::new()
            })
            .kind,
            ErrorKind::AuthorizationError
        );
        assert_eq!(
            normalize(TransportFault::XmlRpc {
                code: 403,
                message: "Incorrect username or password.".into()
            })
            .kind,
            ErrorKind::AuthorizationError
        );
    }

    #[test]
    fn test_other_failures_are_generic() {
        let error = normalize(api(500, "internal", "Something broke"));
        assert_eq!(error.kind, ErrorKind::GenericError);
        assert_eq!(error.message, "Something broke");

        let error = normalize(api(500, "internal", ""));
        assert_eq!(error.message, "internal");

        let error = normalize(TransportFault::XmlRpc {
            code: -32700,
            message: "parse error. not well formed".into(),
        });
        assert_eq!(error.kind, ErrorKind::GenericError);
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let error = normalize(TransportFault::Status { status: 502, body });
        assert!(error.message.len() < 300);
        assert!(error.message.ends_with("..."));
    }

    #[test]
    fn test_delete_checks_missing_target_first() {
        let fault = api(404, "unknown_plugin", "Plugin not found");
        assert_eq!(normalize(fault.clone()).kind, ErrorKind::UnknownResource);

        let error = normalize_delete(fault);
        assert_eq!(error.kind, ErrorKind::NotFound);
        assert_eq!(error.message, "Plugin not found");
        assert_eq!(absorb_not_found(Err(error)), Ok(()));

        let error = normalize_delete(TransportFault::Status {
            status: 404,
            body: "plugin not found".into(),
        });
        assert_eq!(error.kind, ErrorKind::NotFound);

        let error = normalize_delete(TransportFault::XmlRpc {
            code: 404,
            message: "Plugin does not exist".into(),
        });
        assert_eq!(error.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_delete_keeps_other_classifications() {
        let error = normalize_delete(api(400, "delete_plugin_error", "Plugin is active"));
        assert_eq!(error.kind, ErrorKind::RequiresPrecondition);

        let error = normalize_delete(api(403, "unauthorized", "Nope"));
        assert_eq!(error.kind, ErrorKind::AuthorizationError);

        let error = normalize_delete(TransportFault::MalformedBody("eof".into()));
        assert_eq!(error.kind, ErrorKind::ParseError);
    }

    #[test]
    fn test_absorb_not_found() {
        assert_eq!(absorb_not_found(Err(SyncError::not_found("gone"))), Ok(()));
        assert_eq!(absorb_not_found(Ok(())), Ok(()));

        let other = Err(SyncError::generic("boom"));
        assert_eq!(absorb_not_found(other.clone()), other);
    }
}
