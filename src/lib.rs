//! # Kaiwa
//!
//! Client library for the Kaiwa chat service REST API.
//!
//! The crate wraps the fixed set of Kaiwa endpoints (account, rooms, members,
//! messages, tasks, files) behind [`KaiwaClient`]: parameters go into a
//! [`ParameterBag`], are validated per operation before any network I/O, and
//! the JSON response comes back as a [`serde_json::Value`] or a typed
//! [`KaiwaError`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use kaiwa::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), KaiwaError> {
//!     let client = KaiwaClient::new(KaiwaConfig::new("your-api-key"))?;
//!
//!     let me = client.get_me().await?;
//!     println!("logged in as {}", me["name"]);
//!
//!     client
//!         .post_room_message(
//!             ParameterBag::new()
//!                 .add("room_id", "12345")
//!                 .add("body", "hello from rust"),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Transports
//!
//! Requests go through the `reqwest`-backed [`transport::http::HttpTransport`]
//! by default. A raw-socket fallback,
//! [`transport::socket::SocketTransport`], is available for constrained
//! environments; both honor the same contract (auth header injection,
//! timeouts, multipart upload via `@/path/to/file` parameter values, and the
//! service's legacy body-scraping redirect behavior, bounded at ten hops).
//!
//! ## File uploads
//!
//! A parameter value prefixed with `@` names a local file; the request body
//! switches to `multipart/form-data` and the file's content type is sniffed
//! from its bytes (extension as fallback):
//!
//! ```rust,ignore
//! client
//!     .post_room_message(
//!         ParameterBag::new()
//!             .add("room_id", "12345")
//!             .add("body", "weekly report attached")
//!             .add("file", "@/tmp/report.pdf"),
//!     )
//!     .await?;
//! ```
//!
//! The library performs no logging of its own beyond `tracing` debug events;
//! install a subscriber to see them.

pub mod client;
pub mod config;
pub mod error;
pub mod params;
pub mod transport;
pub mod validator;

pub use client::KaiwaClient;
pub use config::KaiwaConfig;
pub use error::KaiwaError;
pub use params::{ParamValue, ParameterBag};

/// Convenience re-exports for the common path.
pub mod prelude {
    pub use crate::client::KaiwaClient;
    pub use crate::config::KaiwaConfig;
    pub use crate::error::KaiwaError;
    pub use crate::params::{ParamValue, ParameterBag};
    pub use crate::transport::Transport;
}
