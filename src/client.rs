//! The Kaiwa API client facade.
//!
//! One async method per API operation. Each method validates its
//! [`ParameterBag`] (failing fast, before any network I/O), shapes a
//! [`RequestSpec`] from the operation's path template, sends it through the
//! configured [`Transport`], and decodes the JSON response.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::config::KaiwaConfig;
use crate::error::KaiwaError;
use crate::params::ParameterBag;
use crate::transport::http::HttpTransport;
use crate::transport::socket::SocketTransport;
use crate::transport::{Method, RequestBody, RequestSpec, ResponseEnvelope, Transport};
use crate::validator;

const ME_PATH: &str = "/me";
const MY_STATUS_PATH: &str = "/my/status";
const MY_TASKS_PATH: &str = "/my/tasks";
const CONTACTS_PATH: &str = "/contacts";
const ROOMS_PATH: &str = "/rooms";

/// Error payload shape returned by the API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    errors: Vec<String>,
}

/// Client for the Kaiwa chat service REST API.
///
/// ```rust,ignore
/// use kaiwa::prelude::*;
///
/// let client = KaiwaClient::new(KaiwaConfig::new("api-key"))?;
/// let me = client.get_me().await?;
/// let room = client
///     .create_room(
///         ParameterBag::new()
///             .add("name", "dev room")
///             .add("members_admin_ids", "101,102"),
///     )
///     .await?;
/// ```
pub struct KaiwaClient {
    config: KaiwaConfig,
    transport: Arc<dyn Transport>,
}

impl KaiwaClient {
    /// Create a client using the default `reqwest`-backed transport.
    pub fn new(config: KaiwaConfig) -> Result<Self, KaiwaError> {
        let transport = Arc::new(HttpTransport::new(config.clone())?);
        Ok(Self { config, transport })
    }

    /// Create a client using the raw-socket fallback transport.
    ///
    /// Only useful where the full HTTP stack is unavailable; plain TCP, no
    /// TLS.
    pub fn new_with_socket_transport(config: KaiwaConfig) -> Self {
        let transport = Arc::new(SocketTransport::new(config.clone()));
        Self { config, transport }
    }

    /// Create a client with a caller-supplied transport strategy.
    pub fn with_transport(config: KaiwaConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    // -- account ---------------------------------------------------------

    /// Get the authenticated account's information. `GET /me`
    pub async fn get_me(&self) -> Result<Value, KaiwaError> {
        self.get(ME_PATH.to_string(), &ParameterBag::new()).await
    }

    /// Get the authenticated account's unread/task counts. `GET /my/status`
    pub async fn get_my_status(&self) -> Result<Value, KaiwaError> {
        self.get(MY_STATUS_PATH.to_string(), &ParameterBag::new())
            .await
    }

    /// List the authenticated account's tasks. `GET /my/tasks`
    ///
    /// Optional filters: `assigned_by_account_id` (non-zero integer),
    /// `status` (`open` or `done`).
    pub async fn get_my_tasks(&self, params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_my_tasks(&params)?;
        self.get(MY_TASKS_PATH.to_string(), &params).await
    }

    /// List the authenticated account's contacts. `GET /contacts`
    pub async fn get_contacts(&self) -> Result<Value, KaiwaError> {
        self.get(CONTACTS_PATH.to_string(), &ParameterBag::new())
            .await
    }

    // -- rooms -----------------------------------------------------------

    /// List rooms the account belongs to. `GET /rooms`
    pub async fn get_rooms(&self) -> Result<Value, KaiwaError> {
        self.get(ROOMS_PATH.to_string(), &ParameterBag::new()).await
    }

    /// Create a room. `POST /rooms`
    pub async fn create_room(&self, mut params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_create_room(&mut params)?;
        self.send_with_body(Method::Post, ROOMS_PATH.to_string(), &params, &[])
            .await
    }

    /// Get one room's details. `GET /rooms/{roomId}`
    pub async fn get_room(&self, params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_room_id(&params)?;
        self.get(room_path(&params), &ParameterBag::new()).await
    }

    /// Update a room's name, description or icon. `PUT /rooms/{roomId}`
    pub async fn update_room(&self, params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_update_room(&params)?;
        self.send_with_body(Method::Put, room_path(&params), &params, &["room_id"])
            .await
    }

    /// Leave a room. `DELETE /rooms/{roomId}` with `action_type=leave`.
    pub async fn leave_room(&self, params: ParameterBag) -> Result<Value, KaiwaError> {
        self.room_action(params, "leave").await
    }

    /// Delete a room. `DELETE /rooms/{roomId}` with `action_type=delete`.
    pub async fn delete_room(&self, params: ParameterBag) -> Result<Value, KaiwaError> {
        self.room_action(params, "delete").await
    }

    async fn room_action(
        &self,
        mut params: ParameterBag,
        action_type: &str,
    ) -> Result<Value, KaiwaError> {
        validator::validate_room_id(&params)?;
        params.set("action_type", action_type);
        self.send_with_body(Method::Delete, room_path(&params), &params, &["room_id"])
            .await
    }

    // -- members ---------------------------------------------------------

    /// List a room's members. `GET /rooms/{roomId}/members`
    pub async fn get_room_members(&self, params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_room_id(&params)?;
        self.get(
            format!("{}/members", room_path(&params)),
            &ParameterBag::new(),
        )
        .await
    }

    /// Replace a room's member roster. `PUT /rooms/{roomId}/members`
    pub async fn update_room_members(&self, mut params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_update_room_members(&mut params)?;
        self.send_with_body(
            Method::Put,
            format!("{}/members", room_path(&params)),
            &params,
            &["room_id"],
        )
        .await
    }

    // -- messages --------------------------------------------------------

    /// List a room's messages.
    ///
    /// Deliberately disabled: the service does not provide this endpoint yet.
    /// Always returns [`KaiwaError::UnsupportedOperation`] without issuing a
    /// request.
    pub async fn get_room_messages(&self, _params: ParameterBag) -> Result<Value, KaiwaError> {
        Err(KaiwaError::UnsupportedOperation(
            "room message listing is not provided by the API".to_string(),
        ))
    }

    /// Post a message to a room. `POST /rooms/{roomId}/messages`
    pub async fn post_room_message(&self, params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_post_room_message(&params)?;
        self.send_with_body(
            Method::Post,
            format!("{}/messages", room_path(&params)),
            &params,
            &["room_id"],
        )
        .await
    }

    /// Get one message. `GET /rooms/{roomId}/messages/{messageId}`
    pub async fn get_room_message(&self, params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_room_message_detail(&params)?;
        let message_id = rendered(&params, "message_id");
        self.get(
            format!(
                "{}/messages/{}",
                room_path(&params),
                urlencoding::encode(&message_id)
            ),
            &ParameterBag::new(),
        )
        .await
    }

    // -- tasks -----------------------------------------------------------

    /// List a room's tasks, with optional filters. `GET /rooms/{roomId}/tasks`
    pub async fn get_room_tasks(&self, params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_room_id(&params)?;
        self.get_excluding(format!("{}/tasks", room_path(&params)), &params, &["room_id"])
            .await
    }

    /// Add a task to a room. `POST /rooms/{roomId}/tasks`
    pub async fn add_room_task(&self, mut params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_add_room_task(&mut params)?;
        self.send_with_body(
            Method::Post,
            format!("{}/tasks", room_path(&params)),
            &params,
            &["room_id"],
        )
        .await
    }

    /// Get one task. `GET /rooms/{roomId}/tasks/{taskId}`
    pub async fn get_room_task(&self, params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_room_task_detail(&params)?;
        let task_id = rendered(&params, "task_id");
        self.get(
            format!("{}/tasks/{}", room_path(&params), task_id),
            &ParameterBag::new(),
        )
        .await
    }

    // -- files -----------------------------------------------------------

    /// List a room's uploaded files. `GET /rooms/{roomId}/files`
    ///
    /// Optional filter: `account_id` (non-zero integer).
    pub async fn get_room_files(&self, params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_room_files(&params)?;
        self.get_excluding(format!("{}/files", room_path(&params)), &params, &["room_id"])
            .await
    }

    /// Get one uploaded file's details. `GET /rooms/{roomId}/files/{fileId}`
    ///
    /// With `create_download_url = true` (a genuine boolean; it is sent as
    /// the literal string `"true"`), the response carries a time-limited
    /// download URL.
    pub async fn get_room_file(&self, mut params: ParameterBag) -> Result<Value, KaiwaError> {
        validator::validate_room_file_detail(&mut params)?;
        let path = match params.get("file_id") {
            Some(file_id) => format!("{}/files/{}", room_path(&params), file_id.render()),
            None => format!("{}/files", room_path(&params)),
        };
        self.get_excluding(path, &params, &["room_id", "file_id"]).await
    }

    // -- plumbing --------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// GET with the bag serialized as a query string (no exclusions).
    async fn get(&self, path: String, params: &ParameterBag) -> Result<Value, KaiwaError> {
        self.get_excluding(path, params, &[]).await
    }

    async fn get_excluding(
        &self,
        path: String,
        params: &ParameterBag,
        exclude: &[&str],
    ) -> Result<Value, KaiwaError> {
        let query = params.to_query_string(exclude);
        let url = if query.is_empty() {
            self.url(&path)
        } else {
            format!("{}?{}", self.url(&path), query)
        };
        let spec = RequestSpec::new(Method::Get, url);
        decode_response(self.transport.send(&spec).await?)
    }

    /// POST/PUT/DELETE with the bag serialized into the body; switches to
    /// multipart when a parameter carries a file-reference marker.
    async fn send_with_body(
        &self,
        method: Method,
        path: String,
        params: &ParameterBag,
        exclude: &[&str],
    ) -> Result<Value, KaiwaError> {
        let spec = RequestSpec::new(method, self.url(&path))
            .with_body(RequestBody::from_params(params, exclude));
        decode_response(self.transport.send(&spec).await?)
    }
}

/// `/rooms/{roomId}` prefix; room_id has been digit-validated by the caller.
fn room_path(params: &ParameterBag) -> String {
    format!("{ROOMS_PATH}/{}", rendered(params, "room_id"))
}

fn rendered(params: &ParameterBag, key: &str) -> String {
    params.get(key).map(|v| v.render()).unwrap_or_default()
}

/// Decode a transport envelope into the parsed JSON body, or the typed error
/// for non-2xx statuses.
fn decode_response(envelope: ResponseEnvelope) -> Result<Value, KaiwaError> {
    // Some operations legitimately return an empty body on success.
    let body: Value = if envelope.body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&envelope.body)
            .map_err(|e| KaiwaError::ParseError(format!("invalid JSON response: {e}")))?
    };

    if envelope.is_success() {
        return Ok(body);
    }

    let message = serde_json::from_value::<ErrorPayload>(body.clone())
        .ok()
        .and_then(|payload| payload.errors.into_iter().next())
        .unwrap_or_else(|| format!("HTTP status {}", envelope.status));
    Err(KaiwaError::ApiError {
        code: envelope.status,
        message,
        details: Some(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Transport double that records the spec and replies with a canned
    /// envelope. Panics if used when no response is queued, which doubles as
    /// a "no network call happened" assertion.
    struct RecordingTransport {
        response: Option<ResponseEnvelope>,
        seen: Mutex<Vec<RequestSpec>>,
    }

    impl RecordingTransport {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                response: Some(ResponseEnvelope {
                    status,
                    body: body.to_string(),
                }),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn unreachable() -> Self {
            Self {
                response: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn last_spec(&self) -> RequestSpec {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, spec: &RequestSpec) -> Result<ResponseEnvelope, KaiwaError> {
            self.seen.lock().unwrap().push(spec.clone());
            Ok(self
                .response
                .clone()
                .expect("transport was not supposed to be reached"))
        }
    }

    fn client_with(transport: Arc<RecordingTransport>) -> KaiwaClient {
        KaiwaClient::with_transport(KaiwaConfig::new("k"), transport)
    }

    #[tokio::test]
    async fn get_me_hits_me_path() {
        let transport = Arc::new(RecordingTransport::replying(200, r#"{"account_id":1}"#));
        let client = client_with(transport.clone());
        let me = client.get_me().await.unwrap();
        assert_eq!(me["account_id"], 1);
        let spec = transport.last_spec();
        assert_eq!(spec.method, Method::Get);
        assert_eq!(spec.url, "https://api.kaiwa.com/v1/me");
    }

    #[tokio::test]
    async fn validation_failure_makes_no_network_call() {
        let client = client_with(Arc::new(RecordingTransport::unreachable()));
        let err = client
            .create_room(ParameterBag::new().add("members_admin_ids", "1,2"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid parameter: name is required field.");
    }

    #[tokio::test]
    async fn stubbed_message_listing_never_sends() {
        let client = client_with(Arc::new(RecordingTransport::unreachable()));
        let err = client
            .get_room_messages(ParameterBag::new().add("room_id", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, KaiwaError::UnsupportedOperation(_)));

        // any input, including an invalid one
        let err = client.get_room_messages(ParameterBag::new()).await.unwrap_err();
        assert!(matches!(err, KaiwaError::UnsupportedOperation(_)));
    }

    #[tokio::test]
    async fn add_room_task_shapes_path_and_body() {
        let transport = Arc::new(RecordingTransport::replying(200, r#"{"task_id":1}"#));
        let client = client_with(transport.clone());
        let result = client
            .add_room_task(
                ParameterBag::new()
                    .add("room_id", "7")
                    .add("body", "ship it")
                    .add("to_ids", vec!["1".to_string(), "2".to_string()]),
            )
            .await
            .unwrap();
        assert_eq!(result["task_id"], 1);

        let spec = transport.last_spec();
        assert_eq!(spec.method, Method::Post);
        assert_eq!(spec.url, "https://api.kaiwa.com/v1/rooms/7/tasks");
        assert_eq!(
            spec.body,
            RequestBody::Form("body=ship%20it&to_ids=1%2C2".to_string())
        );
    }

    #[tokio::test]
    async fn leave_room_sends_action_type() {
        let transport = Arc::new(RecordingTransport::replying(200, "{}"));
        let client = client_with(transport.clone());
        client
            .leave_room(ParameterBag::new().add("room_id", "7"))
            .await
            .unwrap();
        let spec = transport.last_spec();
        assert_eq!(spec.method, Method::Delete);
        assert_eq!(spec.url, "https://api.kaiwa.com/v1/rooms/7");
        assert_eq!(spec.body, RequestBody::Form("action_type=leave".to_string()));
    }

    #[tokio::test]
    async fn file_detail_serializes_boolean_as_string() {
        let transport = Arc::new(RecordingTransport::replying(200, "{}"));
        let client = client_with(transport.clone());
        client
            .get_room_file(
                ParameterBag::new()
                    .add("room_id", "7")
                    .add("file_id", "33")
                    .add("create_download_url", true),
            )
            .await
            .unwrap();
        let spec = transport.last_spec();
        assert_eq!(
            spec.url,
            "https://api.kaiwa.com/v1/rooms/7/files/33?create_download_url=true"
        );
    }

    #[tokio::test]
    async fn my_tasks_filters_ride_the_query_string() {
        let transport = Arc::new(RecordingTransport::replying(200, "[]"));
        let client = client_with(transport.clone());
        client
            .get_my_tasks(ParameterBag::new().add("status", "done"))
            .await
            .unwrap();
        assert_eq!(
            transport.last_spec().url,
            "https://api.kaiwa.com/v1/my/tasks?status=done"
        );

        client.get_my_tasks(ParameterBag::new()).await.unwrap();
        assert_eq!(
            transport.last_spec().url,
            "https://api.kaiwa.com/v1/my/tasks"
        );
    }

    #[test]
    fn decode_success() {
        let value = decode_response(ResponseEnvelope {
            status: 200,
            body: r#"{"task_id":1}"#.to_string(),
        })
        .unwrap();
        assert_eq!(value["task_id"], 1);
    }

    #[test]
    fn decode_empty_success_is_null() {
        let value = decode_response(ResponseEnvelope {
            status: 204,
            body: String::new(),
        })
        .unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn decode_api_error_takes_first_message() {
        let err = decode_response(ResponseEnvelope {
            status: 400,
            body: r#"{"errors":["room_id is invalid","second"]}"#.to_string(),
        })
        .unwrap_err();
        match err {
            KaiwaError::ApiError { code, message, details } => {
                assert_eq!(code, 400);
                assert_eq!(message, "room_id is invalid");
                assert!(details.is_some());
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[test]
    fn decode_unparseable_body_is_parse_error() {
        let err = decode_response(ResponseEnvelope {
            status: 500,
            body: "<html>gateway exploded</html>".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, KaiwaError::ParseError(_)));
    }

    #[test]
    fn decode_error_without_errors_array() {
        let err = decode_response(ResponseEnvelope {
            status: 502,
            body: "{}".to_string(),
        })
        .unwrap_err();
        match err {
            KaiwaError::ApiError { message, .. } => assert_eq!(message, "HTTP status 502"),
            other => panic!("expected ApiError, got {other:?}"),
        }
    }
}
