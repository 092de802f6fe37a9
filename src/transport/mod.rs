//! Transport layer.
//!
//! Two interchangeable strategies live behind the [`Transport`] trait:
//! [`HttpTransport`](http::HttpTransport), the default built on `reqwest`, and
//! [`SocketTransport`](socket::SocketTransport), a raw-TCP fallback for
//! environments without a working HTTP stack. Both inject the auth token and
//! user-agent headers, apply the configured timeouts, follow the service's
//! legacy redirect contract, and support multipart file upload.

pub mod http;
pub mod socket;

use std::path::PathBuf;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::KaiwaError;
use crate::params::ParameterBag;

/// Header carrying the API key.
pub const TOKEN_HEADER: &str = "X-KaiwaToken";

/// Upper bound on redirect hops followed per request.
///
/// The service contract does not cap redirect chains; the bound is a
/// hardening addition so a misbehaving endpoint cannot loop us forever.
pub const MAX_REDIRECT_HOPS: usize = 10;

/// Parameter values beginning with this marker name a local file to upload.
pub const FILE_MARKER: char = '@';

lazy_static! {
    /// The service signals relocation with an HTML body rather than a
    /// `Location` header; the target is scraped from the first `href`.
    static ref HREF_RE: Regex = Regex::new(r#"href="([^"]+)""#).expect("valid href pattern");
}

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Methods that carry a request body.
    pub fn has_body(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

/// A local file scheduled for multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub field_name: String,
    pub path: PathBuf,
}

/// Request body, resolved from a [`ParameterBag`] before sending.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// Percent-encoded form body (`application/x-www-form-urlencoded`).
    Form(String),
    /// Mixed text fields and file uploads (`multipart/form-data`).
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<UploadFile>,
    },
}

impl RequestBody {
    /// Split a parameter bag into a body.
    ///
    /// Values prefixed with [`FILE_MARKER`] become file parts; when at least
    /// one is present the whole body switches to multipart and the remaining
    /// non-empty parameters ride along as text parts. Otherwise the body is
    /// the ordinary url-encoded query string. Keys in `exclude` (ids already
    /// embedded in the URL path) are skipped either way.
    pub fn from_params(params: &ParameterBag, exclude: &[&str]) -> Self {
        let mut files = Vec::new();
        let mut fields = Vec::new();
        for (key, value) in params.iter() {
            if exclude.contains(&key) || value.is_empty() {
                continue;
            }
            let rendered = value.render();
            if let Some(path) = rendered.strip_prefix(FILE_MARKER) {
                files.push(UploadFile {
                    field_name: key.to_string(),
                    path: PathBuf::from(path),
                });
            } else {
                fields.push((key.to_string(), rendered));
            }
        }

        if !files.is_empty() {
            RequestBody::Multipart { fields, files }
        } else {
            let query = params.to_query_string(exclude);
            if query.is_empty() {
                RequestBody::Empty
            } else {
                RequestBody::Form(query)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// One fully-shaped request. Immutable once constructed; redirect hops reuse
/// it with a replaced URL.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    /// Extra headers beyond the auth token and user agent.
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl RequestSpec {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Status code and raw body of one HTTP exchange.
///
/// Only produced when the exchange completed at the HTTP level; transport
/// failures surface as [`KaiwaError::HttpError`] instead, so callers can
/// distinguish "connection failed" from "server said no".
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub body: String,
}

impl ResponseEnvelope {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Strategy contract: send one request, return status and raw body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, spec: &RequestSpec) -> Result<ResponseEnvelope, KaiwaError>;
}

/// Redirect statuses honored by both strategies.
pub(crate) fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307)
}

/// Pick the relocation target for a redirect response.
///
/// A standard `Location` header wins when present; otherwise fall back to the
/// service's legacy contract of embedding the target in an `href="..."`
/// attribute inside the response body.
pub(crate) fn redirect_target(location: Option<&str>, body: &str) -> Option<String> {
    if let Some(loc) = location
        && !loc.is_empty()
    {
        return Some(loc.to_string());
    }
    HREF_RE
        .captures(body)
        .map(|caps| caps[1].to_string())
}

/// Content type for an upload, sniffed from bytes first, file extension
/// second.
pub(crate) fn sniff_mime(bytes: &[u8], path: &std::path::Path) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_from_params_is_form_without_file_markers() {
        let params = ParameterBag::new()
            .add("room_id", "9")
            .add("body", "hello")
            .add("empty", "");
        let body = RequestBody::from_params(&params, &["room_id"]);
        assert_eq!(body, RequestBody::Form("body=hello".to_string()));
    }

    #[test]
    fn body_from_params_switches_to_multipart() {
        let params = ParameterBag::new()
            .add("message", "see attachment")
            .add("file", "@/tmp/report.pdf");
        let body = RequestBody::from_params(&params, &[]);
        match body {
            RequestBody::Multipart { fields, files } => {
                assert_eq!(fields, vec![("message".to_string(), "see attachment".to_string())]);
                assert_eq!(
                    files,
                    vec![UploadFile {
                        field_name: "file".to_string(),
                        path: PathBuf::from("/tmp/report.pdf"),
                    }]
                );
            }
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn empty_params_produce_empty_body() {
        let body = RequestBody::from_params(&ParameterBag::new(), &[]);
        assert!(body.is_empty());
    }

    #[test]
    fn redirect_statuses() {
        for status in [301, 302, 303, 307] {
            assert!(is_redirect(status));
        }
        for status in [200, 204, 304, 308, 400] {
            assert!(!is_redirect(status));
        }
    }

    #[test]
    fn redirect_target_prefers_location_header() {
        let target = redirect_target(
            Some("https://moved.example/x"),
            r#"<a href="https://body.example/y">moved</a>"#,
        );
        assert_eq!(target.as_deref(), Some("https://moved.example/x"));
    }

    #[test]
    fn redirect_target_scrapes_href_from_body() {
        let body = r#"<html><body>Moved: <a href="https://newhost/x">here</a></body></html>"#;
        assert_eq!(redirect_target(None, body).as_deref(), Some("https://newhost/x"));
        assert_eq!(redirect_target(Some(""), body).as_deref(), Some("https://newhost/x"));
    }

    #[test]
    fn redirect_target_missing() {
        assert_eq!(redirect_target(None, "no anchors here"), None);
    }

    #[test]
    fn mime_sniffing_falls_back_to_extension() {
        // %PDF magic number beats the extension
        assert_eq!(
            sniff_mime(b"%PDF-1.4 rest", std::path::Path::new("report.txt")),
            "application/pdf"
        );
        assert_eq!(
            sniff_mime(b"plain text", std::path::Path::new("notes.txt")),
            "text/plain"
        );
        assert_eq!(
            sniff_mime(b"????", std::path::Path::new("blob")),
            "application/octet-stream"
        );
    }
}
