//! Face recognition backend client.
//!
//! Two multipart endpoints: one matches a single photo against enrolled
//! employees, the other enrolls a new employee from a batch of photos.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

const DETECT_PATH: &str = "/face/inference";
const REGISTER_PATH: &str = "/register-faces";
const NO_MATCH_SENTINELS: [&str; 2] = ["guest", "unknown"];

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Connect to server failed. Please check your internet connection.")]
    Connection(#[source] reqwest::Error),
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("invalid server response: {0}")]
    MalformedResponse(String),
    #[error("failed to read photo {path}: {source}")]
    Photo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl ApiError {
    fn transport(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            ApiError::Connection(e)
        } else {
            ApiError::Request(e)
        }
    }
}

/// Server verdict for one detect upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchDecision {
    Matched { label: String, similarity: Option<f32> },
    NoMatch { similarity: Option<f32> },
}

impl MatchDecision {
    pub fn label(&self) -> Option<&str> {
        match self {
            MatchDecision::Matched { label, .. } => Some(label),
            MatchDecision::NoMatch { .. } => None,
        }
    }

    pub fn similarity(&self) -> Option<f32> {
        match self {
            MatchDecision::Matched { similarity, .. } | MatchDecision::NoMatch { similarity } => {
                *similarity
            }
        }
    }
}

/// Backend operations used by the upload coordinator.
pub trait FaceBackend: Send + Sync {
    /// Match one photo. `threshold` is sent as the `threshold` form field.
    fn detect_face(
        &self,
        photo: &Path,
        threshold: f32,
    ) -> impl Future<Output = Result<MatchDecision, ApiError>> + Send;

    /// Enroll `person_name` from `photos`, all in one request.
    fn register_faces(
        &self,
        photos: &[PathBuf],
        person_name: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// HTTP client for the recognition backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(ApiError::Request)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, form: Form) -> Result<Value, ApiError> {
        let url = self.url(path);
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "backend request failed");
                ApiError::transport(e)
            })?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(ApiError::transport)?;
        let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        if !status.is_success() {
            let message = status_message(status, &body);
            tracing::error!(url = %url, status = status.as_u16(), %message, "backend returned error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(url = %url, status = status.as_u16(), "backend request ok");
        Ok(body)
    }
}

impl FaceBackend for BackendClient {
    async fn detect_face(&self, photo: &Path, threshold: f32) -> Result<MatchDecision, ApiError> {
        let form = Form::new()
            .part("file", photo_part(photo, 0).await?)
            .text("threshold", threshold.to_string());

        let body = self.post(DETECT_PATH, form).await?;
        parse_match_response(&body)
    }

    async fn register_faces(&self, photos: &[PathBuf], person_name: &str) -> Result<(), ApiError> {
        let mut form = Form::new();
        for (i, photo) in photos.iter().enumerate() {
            form = form.part("files", photo_part(photo, i).await?);
        }
        form = form.text("person_name", person_name.to_string());

        self.post(REGISTER_PATH, form).await?;
        Ok(())
    }
}

async fn photo_part(path: &Path, index: usize) -> Result<Part, ApiError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| ApiError::Photo {
        path: path.to_path_buf(),
        source: e,
    })?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("photo_{index}.jpg"));
    let mime = mime_for(&name);

    Part::bytes(bytes)
        .file_name(name)
        .mime_str(&mime)
        .map_err(ApiError::Request)
}

/// `image/<ext>` from the file extension, `image/jpeg` when there is none.
pub fn mime_for(file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        None | Some("jpg") | Some("jpeg") => "image/jpeg".to_string(),
        Some(ext) => format!("image/{ext}"),
    }
}

/// Readable message for a failed response.
pub fn status_message(status: StatusCode, body: &Value) -> String {
    let server_message = body.get("message").and_then(Value::as_str);

    match status.as_u16() {
        400 => server_message.unwrap_or("Invalid data!").to_string(),
        401 => "Session expired. Please log in again!".to_string(),
        403 => "You do not have permission to perform this action!".to_string(),
        404 => "Resource not found!".to_string(),
        422 => match body.get("errors").and_then(Value::as_object) {
            Some(errors) => errors
                .iter()
                .map(|(field, msgs)| {
                    let joined = match msgs {
                        Value::Array(items) => items
                            .iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join(", "),
                        other => other.as_str().unwrap_or_default().to_string(),
                    };
                    format!("{field}: {joined}")
                })
                .collect::<Vec<_>>()
                .join("; "),
            None => server_message.unwrap_or("Invalid data!").to_string(),
        },
        429 => "You have sent too many requests. Please try again later!".to_string(),
        500 => "Server error! Please try again later.".to_string(),
        502..=504 => "Server is under maintenance. Please try again later!".to_string(),
        _ => server_message
            .unwrap_or("An error occurred. Please try again!")
            .to_string(),
    }
}

/// Validate a detect response: `{ "match": string|null, "similarity": number|null }`.
pub fn parse_match_response(body: &Value) -> Result<MatchDecision, ApiError> {
    let obj = body
        .as_object()
        .ok_or_else(|| ApiError::MalformedResponse(format!("expected JSON object, got {body}")))?;

    let similarity = match obj.get("similarity") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => {
            let v = n.as_f64().unwrap_or(f64::NAN);
            if !(0.0..=1.0).contains(&v) {
                return Err(ApiError::MalformedResponse(format!(
                    "similarity out of range [0, 1]: {n}"
                )));
            }
            Some(v as f32)
        }
        Some(other) => {
            return Err(ApiError::MalformedResponse(format!(
                "similarity is not a number: {other}"
            )))
        }
    };

    match obj.get("match") {
        None | Some(Value::Null) => Ok(MatchDecision::NoMatch { similarity }),
        Some(Value::String(label)) => {
            let label = label.trim();
            if label.is_empty()
                || NO_MATCH_SENTINELS
                    .iter()
                    .any(|s| label.eq_ignore_ascii_case(s))
            {
                Ok(MatchDecision::NoMatch { similarity })
            } else {
                Ok(MatchDecision::Matched {
                    label: label.to_string(),
                    similarity,
                })
            }
        }
        Some(other) => Err(ApiError::MalformedResponse(format!(
            "match is not a string: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_match() {
        let d = parse_match_response(&json!({"match": "Alice", "similarity": 0.92})).unwrap();
        assert_eq!(d.label(), Some("Alice"));
        assert!((d.similarity().unwrap() - 0.92).abs() < 1e-6);
    }

    #[test]
    fn test_parse_guest_and_null_are_no_match() {
        let guest = parse_match_response(&json!({"match": "Guest", "similarity": 0.1})).unwrap();
        assert!(matches!(guest, MatchDecision::NoMatch { .. }));

        let null = parse_match_response(&json!({"match": null})).unwrap();
        assert_eq!(null, MatchDecision::NoMatch { similarity: None });

        let absent = parse_match_response(&json!({})).unwrap();
        assert_eq!(absent, MatchDecision::NoMatch { similarity: None });
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for body in [
            json!("Alice"),
            json!(null),
            json!({"match": 42}),
            json!({"match": "Alice", "similarity": "high"}),
            json!({"match": "Alice", "similarity": 1.5}),
            json!({"match": "Alice", "similarity": -0.1}),
        ] {
            let err = parse_match_response(&body).unwrap_err();
            assert!(matches!(err, ApiError::MalformedResponse(_)), "{body} should be malformed");
        }
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("capture.jpg"), "image/jpeg");
        assert_eq!(mime_for("capture.PNG"), "image/png");
        assert_eq!(mime_for("capture"), "image/jpeg");
    }

    #[test]
    fn test_status_messages() {
        let empty = Value::Null;
        assert_eq!(status_message(StatusCode::UNAUTHORIZED, &empty), "Session expired. Please log in again!");
        assert_eq!(
            status_message(StatusCode::SERVICE_UNAVAILABLE, &empty),
            "Server is under maintenance. Please try again later!"
        );
        assert_eq!(
            status_message(StatusCode::BAD_REQUEST, &json!({"message": "no face in photo"})),
            "no face in photo"
        );
        assert_eq!(status_message(StatusCode::IM_A_TEAPOT, &empty), "An error occurred. Please try again!");
    }

    #[test]
    fn test_status_message_validation_errors() {
        let body = json!({"errors": {"person_name": ["is required", "too short"]}});
        assert_eq!(
            status_message(StatusCode::UNPROCESSABLE_ENTITY, &body),
            "person_name: is required, too short"
        );
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = BackendClient::new("http://localhost:8000/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.url(DETECT_PATH), "http://localhost:8000/face/inference");
    }

    #[tokio::test]
    async fn test_missing_photo_fails_before_request() {
        // Port 9 (discard) is never contacted: the photo read fails first.
        let client = BackendClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = client
            .detect_face(Path::new("/nonexistent/capture.jpg"), 0.2)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Photo { .. }));
    }
}
