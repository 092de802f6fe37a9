//! Primary transport strategy built on `reqwest`.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use secrecy::ExposeSecret;

use super::{
    is_redirect, redirect_target, sniff_mime, Method, RequestBody, RequestSpec, ResponseEnvelope,
    Transport, MAX_REDIRECT_HOPS, TOKEN_HEADER,
};
use crate::config::KaiwaConfig;
use crate::error::KaiwaError;

/// Pre-resolved multipart file part: bytes are read once per request and
/// reused across redirect hops.
struct ResolvedFile {
    field_name: String,
    file_name: String,
    mime: String,
    bytes: Vec<u8>,
}

/// `reqwest`-backed transport.
///
/// Automatic redirect handling is disabled on the inner client; redirects are
/// followed manually because the service relocates with an HTML body rather
/// than a `Location` header (see [`redirect_target`]).
pub struct HttpTransport {
    client: reqwest::Client,
    config: KaiwaConfig,
}

impl HttpTransport {
    pub fn new(config: KaiwaConfig) -> Result<Self, KaiwaError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| KaiwaError::ConfigurationError(format!("HTTP client build failed: {e}")))?;
        Ok(Self { client, config })
    }

    fn build_headers(&self, spec: &RequestSpec) -> Result<HeaderMap, KaiwaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_bytes(TOKEN_HEADER.as_bytes())
                .map_err(|e| KaiwaError::ConfigurationError(format!("Invalid token header: {e}")))?,
            HeaderValue::from_str(self.config.api_key.expose_secret())
                .map_err(|e| KaiwaError::ConfigurationError(format!("Invalid API key: {e}")))?,
        );
        for (name, value) in self.config.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
            .chain(spec.headers.iter().map(|(n, v)| (n.as_str(), v.as_str())))
        {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| KaiwaError::ConfigurationError(format!("Invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| KaiwaError::ConfigurationError(format!("Invalid header value: {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    async fn resolve_files(&self, spec: &RequestSpec) -> Result<Vec<ResolvedFile>, KaiwaError> {
        let RequestBody::Multipart { files, .. } = &spec.body else {
            return Ok(Vec::new());
        };
        let mut resolved = Vec::with_capacity(files.len());
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
            resolved.push(ResolvedFile {
                field_name: file.field_name.clone(),
                file_name,
                mime,
                bytes,
            });
        }
        Ok(resolved)
    }

    fn attach_body(
        &self,
        builder: reqwest::RequestBuilder,
        spec: &RequestSpec,
        resolved: &[ResolvedFile],
    ) -> Result<reqwest::RequestBuilder, KaiwaError> {
        if !spec.method.has_body() {
            return Ok(builder);
        }
        match &spec.body {
            RequestBody::Empty => Ok(builder),
            RequestBody::Form(encoded) => Ok(builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encoded.clone())),
            RequestBody::Multipart { fields, .. } => {
                let mut form = reqwest::multipart::Form::new();
                for (key, value) in fields {
                    form = form.text(key.clone(), value.clone());
                }
                for file in resolved {
                    let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.mime)
                        .map_err(|e| {
                            KaiwaError::ConfigurationError(format!("Invalid MIME type: {e}"))
                        })?;
                    form = form.part(file.field_name.clone(), part);
                }
                Ok(builder.multipart(form))
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, spec: &RequestSpec) -> Result<ResponseEnvelope, KaiwaError> {
        let headers = self.build_headers(spec)?;
        let resolved = self.resolve_files(spec).await?;
        let mut url = spec.url.clone();

        for hop in 0..=MAX_REDIRECT_HOPS {
            tracing::debug!(method = spec.method.as_str(), %url, hop, "sending request");

            let builder = match spec.method {
                Method::Get => self.client.get(&url),
                Method::Post => self.client.post(&url),
                Method::Put => self.client.put(&url),
                Method::Delete => self.client.delete(&url),
            }
            .headers(headers.clone());
            let builder = self.attach_body(builder, spec, &resolved)?;

            let response = builder
                .send()
                .await
                .map_err(|e| KaiwaError::HttpError(e.to_string()))?;
            let status = response.status().as_u16();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response
                .text()
                .await
                .map_err(|e| KaiwaError::HttpError(e.to_string()))?;

            if is_redirect(status) {
                match redirect_target(location.as_deref(), &body) {
                    Some(target) => {
                        tracing::debug!(status, %target, "following redirect");
                        url = target;
                        continue;
                    }
                    None => {
                        return Err(KaiwaError::HttpError(format!(
                            "redirect status {status} without a relocation target"
                        )));
                    }
                }
            }

            tracing::debug!(status, bytes = body.len(), "response received");
            return Ok(ResponseEnvelope { status, body });
        }

        Err(KaiwaError::HttpError(format!(
            "redirect limit of {MAX_REDIRECT_HOPS} hops exceeded"
        )))
    }
}
