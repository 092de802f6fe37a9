//! Client configuration.

use secrecy::SecretString;
use std::collections::HashMap;
use std::time::Duration;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.kaiwa.com/v1";

/// Default connect and total timeouts, matching the service's documented
/// defaults.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`KaiwaClient`](crate::client::KaiwaClient).
///
/// Built with `with_*` chaining:
///
/// ```rust,ignore
/// let config = KaiwaConfig::new("my-api-key")
///     .with_timeout(Duration::from_secs(10))
///     .with_user_agent("my-bot/1.0");
/// ```
#[derive(Debug, Clone)]
pub struct KaiwaConfig {
    /// API key, sent on every request in the `X-KaiwaToken` header.
    pub api_key: SecretString,
    /// Base endpoint. Overridable for tests and self-hosted deployments.
    pub base_url: String,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Total round-trip timeout per request (including redirect hops).
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Extra headers appended to every request.
    pub headers: HashMap<String, String>,
}

impl KaiwaConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: DEFAULT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("kaiwa-rs/{}", env!("CARGO_PKG_VERSION")),
            headers: HashMap::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        // A trailing slash would double up with the path templates.
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
