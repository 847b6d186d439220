//! Response envelope shared by every JSON endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use ats_core::CandidatePage;

/// Pagination metadata for list responses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// Matching records across all pages.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    /// Whether more results exist past this page.
    pub has_more: bool,
}

impl From<&CandidatePage> for PaginationMeta {
    fn from(page: &CandidatePage) -> Self {
        Self {
            total: page.total,
            limit: page.limit,
            offset: page.offset,
            has_more: page.has_more(),
        }
    }
}

/// `{success, message, data?, pagination?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            pagination: None,
            status: StatusCode::OK,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }

    pub fn with_pagination(mut self, pagination: PaginationMeta) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl ApiResponse<()> {
    /// Success with no payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            pagination: None,
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pagination_meta_serializes_camel_case() {
        let meta = PaginationMeta {
            total: 120,
            limit: 50,
            offset: 50,
            has_more: true,
        };
        assert_eq!(
            serde_json::to_value(&meta).unwrap(),
            json!({"total": 120, "limit": 50, "offset": 50, "hasMore": true})
        );
    }

    #[test]
    fn test_pagination_from_page() {
        let page = CandidatePage {
            items: vec![],
            total: 3,
            limit: 50,
            offset: 3,
        };
        assert!(!PaginationMeta::from(&page).has_more);
    }

    #[test]
    fn test_message_only_omits_data() {
        let body =
            serde_json::to_value(ApiResponse::message("Candidate deleted successfully")).unwrap();
        assert_eq!(body, json!({"success": true, "message": "Candidate deleted successfully"}));
    }

    #[test]
    fn test_created_status() {
        let response = ApiResponse::created("Created", json!({"document": "12345678A"}));
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["data"]["document"], "12345678A");
        assert!(body.get("pagination").is_none());
    }
}
