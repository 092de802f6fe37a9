//! Raw-socket fallback transport.
//!
//! Hand-builds an HTTP/1.1 request over a plain `TcpStream` for environments
//! where the full HTTP client stack is unavailable. Plain TCP only: `https`
//! URLs are rejected up front rather than silently speaking cleartext to a
//! TLS port. PUT and DELETE are additionally conveyed as a `method=` query
//! parameter, a quirk of the service's legacy ingress that some deployments
//! still require.

use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Url;
use secrecy::ExposeSecret;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{
    is_redirect, redirect_target, sniff_mime, Method, RequestBody, RequestSpec, ResponseEnvelope,
    Transport, MAX_REDIRECT_HOPS, TOKEN_HEADER,
};
use crate::config::KaiwaConfig;
use crate::error::KaiwaError;

pub struct SocketTransport {
    config: KaiwaConfig,
}

/// Parsed wire response: status, raw header block, body.
#[derive(Debug)]
struct RawResponse {
    status: u16,
    headers: String,
    body: String,
}

impl SocketTransport {
    pub fn new(config: KaiwaConfig) -> Self {
        Self { config }
    }

    async fn exchange(&self, url: &Url, spec: &RequestSpec) -> Result<RawResponse, KaiwaError> {
        if url.scheme() != "http" {
            return Err(KaiwaError::ConfigurationError(format!(
                "socket transport speaks plain TCP only; cannot send {} request (use HttpTransport)",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| KaiwaError::ConfigurationError(format!("URL has no host: {url}")))?;
        let port = port_for(url);

        let request = self.build_request(url, spec).await?;

        let mut stream =
            tokio::time::timeout(self.config.connect_timeout, TcpStream::connect((host, port)))
                .await
                .map_err(|_| KaiwaError::HttpError(format!("connect to {host}:{port} timed out")))?
                .map_err(|e| KaiwaError::HttpError(format!("connect to {host}:{port} failed: {e}")))?;

        let mut raw = Vec::new();
        tokio::time::timeout(self.config.timeout, async {
            stream.write_all(&request).await?;
            stream.read_to_end(&mut raw).await
        })
        .await
        .map_err(|_| KaiwaError::HttpError("request timed out".to_string()))?
        .map_err(|e| KaiwaError::HttpError(format!("socket exchange failed: {e}")))?;

        parse_response(&raw)
    }

    /// Assemble request line, headers, blank line and body.
    async fn build_request(&self, url: &Url, spec: &RequestSpec) -> Result<Vec<u8>, KaiwaError> {
        let path_and_query = request_target(url, spec.method);

        let mut head = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nConnection: close\r\n{}: {}\r\n",
            spec.method.as_str(),
            path_and_query,
            host_header(url),
            self.config.user_agent,
            TOKEN_HEADER,
            self.config.api_key.expose_secret(),
        );
        for (name, value) in self
            .config
            .headers
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .chain(spec.headers.iter().map(|(n, v)| (n.as_str(), v.as_str())))
        {
            head.push_str(&format!("{name}: {value}\r\n"));
        }

        let mut request = Vec::new();
        if spec.method.has_body() {
            let (content_type, body) = self.encode_body(&spec.body).await?;
            head.push_str(&format!("Content-Type: {content_type}\r\n"));
            head.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
            request.extend_from_slice(head.as_bytes());
            request.extend_from_slice(&body);
        } else {
            head.push_str("\r\n");
            request.extend_from_slice(head.as_bytes());
        }
        Ok(request)
    }

    async fn encode_body(&self, body: &RequestBody) -> Result<(String, Vec<u8>), KaiwaError> {
        match body {
            RequestBody::Empty => Ok((
                "application/x-www-form-urlencoded".to_string(),
                Vec::new(),
            )),
            RequestBody::Form(encoded) => Ok((
                "application/x-www-form-urlencoded".to_string(),
                encoded.as_bytes().to_vec(),
            )),
            RequestBody::Multipart { fields, files } => {
                let boundary = fresh_boundary();
                let mut data = Vec::new();

                for (key, value) in fields {
                    data.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
                    data.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"\r\nContent-Type: text/plain\r\n\r\n",
                            urlencoding::encode(key)
                        )
                        .as_bytes(),
                    );
                    data.extend_from_slice(value.as_bytes());
                    data.extend_from_slice(b"\r\n");
                }

                for file in files {
                    let bytes = tokio::fs::read(&file.path).await.map_err(|e| {
                        KaiwaError::IoError(format!(
                            "upload file {} is not readable: {e}",
                            file.path.display()
                        ))
                    })?;
                    let file_name = file
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "upload".to_string());
                    let mime = sniff_mime(&bytes, &file.path);
                    data.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
                    data.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            urlencoding::encode(&file.field_name),
                            file_name,
                            mime
                        )
                        .as_bytes(),
                    );
                    data.extend_from_slice(&bytes);
                    data.extend_from_slice(b"\r\n");
                }

                data.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
                Ok((format!("multipart/form-data; boundary={boundary}"), data))
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for SocketTransport {
    async fn send(&self, spec: &RequestSpec) -> Result<ResponseEnvelope, KaiwaError> {
        let mut url = Url::parse(&spec.url)
            .map_err(|e| KaiwaError::ConfigurationError(format!("invalid URL {}: {e}", spec.url)))?;

        for hop in 0..=MAX_REDIRECT_HOPS {
            tracing::debug!(method = spec.method.as_str(), %url, hop, "socket request");
            let response = self.exchange(&url, spec).await?;

            if is_redirect(response.status) {
                let location = header_value(&response.headers, "location");
                match redirect_target(location.as_deref(), &response.body) {
                    Some(target) => {
                        tracing::debug!(status = response.status, %target, "following redirect");
                        url = Url::parse(&target).map_err(|e| {
                            KaiwaError::HttpError(format!("invalid redirect target {target}: {e}"))
                        })?;
                        continue;
                    }
                    None => {
                        return Err(KaiwaError::HttpError(format!(
                            "redirect status {} without a relocation target",
                            response.status
                        )));
                    }
                }
            }

            let body = if header_value(&response.headers, "transfer-encoding")
                .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
            {
                decode_chunked(&response.body)
            } else {
                response.body
            };
            return Ok(ResponseEnvelope {
                status: response.status,
                body,
            });
        }

        Err(KaiwaError::HttpError(format!(
            "redirect limit of {MAX_REDIRECT_HOPS} hops exceeded"
        )))
    }
}

/// 443 default for https, 80 otherwise, explicit port always wins.
fn port_for(url: &Url) -> u16 {
    url.port().unwrap_or(match url.scheme() {
        "https" => 443,
        _ => 80,
    })
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Path plus query for the request line. PUT/DELETE additionally get a
/// `method=` query parameter (legacy ingress conveyance).
fn request_target(url: &Url, method: Method) -> String {
    let mut target = url.path().to_string();
    let mut query = url.query().unwrap_or("").to_string();
    if matches!(method, Method::Put | Method::Delete) {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!("method={}", method.as_str()));
    }
    if !query.is_empty() {
        target.push('?');
        target.push_str(&query);
    }
    target
}

fn fresh_boundary() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("KaiwaFormBoundary{suffix}")
}

/// Split a raw response into status line, header block and body.
///
/// An empty or truncated read (no header/body separator) is a
/// transport-level failure, distinct from any HTTP error status.
fn parse_response(raw: &[u8]) -> Result<RawResponse, KaiwaError> {
    let text = String::from_utf8_lossy(raw);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return Err(KaiwaError::HttpError(
            "empty or malformed response from server".to_string(),
        ));
    };
    let status_line = head.lines().next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| {
            KaiwaError::HttpError(format!("unparseable status line: {status_line}"))
        })?;
    Ok(RawResponse {
        status,
        headers: head.to_string(),
        body: body.to_string(),
    })
}

/// Case-insensitive lookup in a raw header block.
fn header_value(headers: &str, name: &str) -> Option<String> {
    headers.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}

/// Minimal `Transfer-Encoding: chunked` decoding; reading to EOF keeps the
/// chunk framing in the buffer otherwise.
fn decode_chunked(body: &str) -> String {
    let mut out = String::new();
    let mut rest = body;
    loop {
        let Some((size_line, tail)) = rest.split_once("\r\n") else {
            break;
        };
        // chunk extensions (";name=val") follow the hex size
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_hex, 16).unwrap_or(0);
        if size == 0 || tail.len() < size {
            break;
        }
        out.push_str(&tail[..size]);
        // chunk data is followed by CRLF
        rest = tail[size..].strip_prefix("\r\n").unwrap_or("");
    }
    out
}
