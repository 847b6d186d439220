//! Request body extractors.
//!
//! Candidate writes accept either JSON or `multipart/form-data`. Both end up
//! as a [`CandidatePayload`]; rule checking happens in the service.

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use ats_core::CandidatePayload;

use crate::error::ApiError;

/// Multipart part carrying the attachment bytes.
const CV_PART: &str = "cv";
const CV_FILENAME_FIELD: &str = "cvFilename";

/// Candidate write body, from JSON or multipart.
#[derive(Debug)]
pub struct CandidateForm(pub CandidatePayload);

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

#[async_trait]
impl<S> FromRequest<S> for CandidateForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_multipart(&req) {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| multipart_error(e.status(), e.body_text()))?;
            return payload_from_multipart(multipart).await.map(CandidateForm);
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::body_rejection(e.status(), e.body_text()))?;
        payload_from_json(&bytes).map(CandidateForm)
    }
}

fn multipart_error(status: StatusCode, detail: String) -> ApiError {
    ApiError::body_rejection(status, format!("Invalid multipart body: {}", detail))
}

/// Parse a JSON body into a payload. An empty body is an empty payload.
pub fn payload_from_json(bytes: &[u8]) -> Result<CandidatePayload, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(CandidatePayload::new());
    }
    let value: Value = serde_json::from_slice(bytes).map_err(|e| {
        debug!(subsystem = "api", component = "extract", error = %e, "Malformed JSON body");
        ApiError::invalid_json()
    })?;
    CandidatePayload::try_from(value).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Text parts become fields; the `cv` file part supplies the attachment.
///
/// An empty file part means no upload. When the form carries no
/// `cvFilename` field the uploaded part's own file name is used.
async fn payload_from_multipart(mut multipart: Multipart) -> Result<CandidatePayload, ApiError> {
    let mut payload = CandidatePayload::new();
    let mut uploaded_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e.status(), e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == CV_PART {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| multipart_error(e.status(), e.body_text()))?;
            if bytes.is_empty() {
                continue;
            }
            payload.set_cv(bytes.to_vec());
            uploaded_name = file_name.filter(|n| !n.trim().is_empty());
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| multipart_error(e.status(), e.body_text()))?;
            payload.set(name, text);
        }
    }

    if payload.has_cv() && !payload.contains(CV_FILENAME_FIELD) {
        if let Some(name) = uploaded_name {
            payload.set(CV_FILENAME_FIELD, name);
        }
    }

    debug!(
        subsystem = "api",
        component = "extract",
        field_count = payload.fields().len(),
        has_cv = payload.has_cv(),
        "Parsed multipart candidate form"
    );
    Ok(payload)
}

/// JSON extractor whose rejection uses the API error envelope.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::body_rejection(e.status(), e.body_text()))?;
        let value = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Default::default())
        } else {
            serde_json::from_slice(&bytes).map_err(|_| ApiError::invalid_json())?
        };
        serde_json::from_value(value)
            .map(JsonBody)
            .map_err(|e| ApiError::BadRequest(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_payload_with_base64_cv() {
        let payload =
            payload_from_json(br#"{"document":"12345678A","cv":"JVBERg=="}"#).unwrap();
        assert_eq!(payload.get("document").unwrap(), "12345678A");
        assert!(payload.contains("cv"));
    }

    #[test]
    fn test_empty_body_is_empty_payload() {
        let payload = payload_from_json(b"  \n").unwrap();
        assert!(payload.fields().is_empty());
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = payload_from_json(b"{\"document\": ").unwrap_err();
        assert_eq!(err.to_string(), crate::error::INVALID_JSON_MESSAGE);
    }

    #[test]
    fn test_non_object_json_rejected() {
        let err = payload_from_json(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
