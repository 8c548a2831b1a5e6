//! Response capability and the persisted result it normalizes into.
//!
//! The task runner produces and consumes [`TaskResponse`], a framework-free
//! equivalent of an HTTP response: content bytes, a status code, and an
//! ordered header list. When a task finishes, the response is captured as a
//! [`TaskResult`] on the record; polling callers reconstruct a `TaskResponse`
//! from it later.
//!
//! Two shapes normalize into one persisted structure: a structured
//! `TaskResponse` is captured field by field, while a plain value (a work
//! function returning a bare string) is synthesized into status 200 with
//! `Content-Type: text/html`.

use http::{HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

/// Framework-free response: content bytes, status code, ordered headers.
///
/// # Examples
///
/// ```
/// use bgtask::TaskResponse;
/// use http::StatusCode;
///
/// let response = TaskResponse::html("<p>done</p>");
/// assert_eq!(response.status, StatusCode::OK);
/// assert_eq!(response.content_str(), "<p>done</p>");
/// ```
#[derive(Debug, Clone)]
pub struct TaskResponse {
    /// Response body bytes.
    pub content: Vec<u8>,
    /// HTTP-equivalent status code.
    pub status: StatusCode,
    /// Headers in the order they were set.
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl TaskResponse {
    /// Builds a response from raw parts.
    pub fn new(
        content: impl Into<Vec<u8>>,
        status: StatusCode,
        headers: Vec<(HeaderName, HeaderValue)>,
    ) -> Self {
        Self {
            content: content.into(),
            status,
            headers,
        }
    }

    /// 200 response with `Content-Type: text/html`.
    pub fn html(content: impl Into<Vec<u8>>) -> Self {
        Self::new(
            content,
            StatusCode::OK,
            vec![(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("text/html"),
            )],
        )
    }

    /// 200 response with `Content-Type: application/json`.
    pub fn json(content: impl Into<Vec<u8>>) -> Self {
        Self::new(
            content,
            StatusCode::OK,
            vec![(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
        )
    }

    /// 503 response telling the queue transport to re-deliver later.
    pub fn retry_later(message: &str) -> Self {
        Self::html(message).with_status(StatusCode::SERVICE_UNAVAILABLE)
    }

    /// Replaces the status code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Body as a string, replacing invalid UTF-8.
    pub fn content_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Persisted form of a captured response.
///
/// Content bytes are base64 in the serialized record; header names and
/// values are kept as plain strings so a record written by one process
/// reads back anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Captured body bytes.
    #[serde(with = "b64")]
    pub content: Vec<u8>,
    /// HTTP-equivalent status code.
    pub status_code: u16,
    /// Ordered header list as captured.
    pub headers: Vec<(String, String)>,
}

impl TaskResult {
    /// Synthesizes a result from a plain value: status 200, `text/html`.
    pub fn from_plain(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            status_code: StatusCode::OK.as_u16(),
            headers: vec![("Content-Type".to_string(), "text/html".to_string())],
        }
    }

    /// Reconstructs the response this result was captured from.
    ///
    /// Header entries that no longer parse as valid header names or values
    /// are dropped with a warning rather than failing the read path.
    pub fn to_response(&self) -> TaskResponse {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| {
                match (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    (Ok(name), Ok(value)) => Some((name, value)),
                    _ => {
                        tracing::warn!(header = %name, "dropping unparseable persisted header");
                        None
                    },
                }
            })
            .collect();
        TaskResponse::new(self.content.clone(), status, headers)
    }

    /// Parses the captured content as JSON, falling back to `{}`.
    ///
    /// Missing or malformed content never errors; status pages and humans
    /// read the raw body, programs get an empty object.
    pub fn content_json(&self) -> Value {
        serde_json::from_slice(&self.content).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

impl From<&TaskResponse> for TaskResult {
    fn from(response: &TaskResponse) -> Self {
        Self {
            content: response.content.clone(),
            status_code: response.status.as_u16(),
            headers: response
                .headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
        }
    }
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    // ---- Constructor tests ----

    #[test]
    fn test_html_response() {
        let response = TaskResponse::html("hello");
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content, b"hello");
        assert_eq!(
            response.headers,
            vec![(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("text/html")
            )]
        );
    }

    #[test]
    fn test_retry_later_response() {
        let response = TaskResponse::retry_later("Background task not found. Retry later.");
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.content_str().contains("Retry later"));
    }

    // ---- Capture and reconstruction tests ----

    #[test]
    fn test_capture_structured_response() {
        let response = TaskResponse::json(r#"{"rows": 3}"#);
        let result = TaskResult::from(&response);
        assert_eq!(result.status_code, 200);
        assert_eq!(result.content, br#"{"rows": 3}"#);
        assert_eq!(
            result.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn test_plain_value_synthesizes_html_200() {
        let result = TaskResult::from_plain("done");
        assert_eq!(result.status_code, 200);
        assert_eq!(
            result.headers,
            vec![("Content-Type".to_string(), "text/html".to_string())]
        );
    }

    #[test]
    fn test_round_trip_through_response() {
        let original = TaskResponse::json(r#"{"ok":true}"#).with_status(StatusCode::CREATED);
        let rebuilt = TaskResult::from(&original).to_response();
        assert_eq!(rebuilt.content, original.content);
        assert_eq!(rebuilt.status, StatusCode::CREATED);
        assert_eq!(rebuilt.headers.len(), 1);
    }

    #[test]
    fn test_unparseable_persisted_header_is_dropped() {
        let result = TaskResult {
            content: b"x".to_vec(),
            status_code: 200,
            headers: vec![
                ("bad header name".to_string(), "v".to_string()),
                ("x-ok".to_string(), "v".to_string()),
            ],
        };
        let response = result.to_response();
        assert_eq!(response.headers.len(), 1);
        assert_eq!(response.headers[0].0.as_str(), "x-ok");
    }

    // ---- content_json tests ----

    #[test]
    fn test_content_json_parses_valid_json() {
        let result = TaskResult::from_plain(r#"{"count": 2}"#);
        assert_eq!(result.content_json(), json!({"count": 2}));
    }

    #[test]
    fn test_content_json_falls_back_to_empty_object() {
        let result = TaskResult::from_plain("<html>not json</html>");
        assert_eq!(result.content_json(), json!({}));

        let empty = TaskResult::from_plain("");
        assert_eq!(empty.content_json(), json!({}));
    }

    // ---- Serialization tests ----

    #[test]
    fn test_result_content_is_base64_in_json() {
        let result = TaskResult::from_plain("hi");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["content"], "aGk=");
        assert_eq!(value["status_code"], 200);

        let parsed: TaskResult = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, result);
    }
}
