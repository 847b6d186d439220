//! Candidate CRUD and CV download handlers.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::info;

use ats_core::defaults::{DEFAULT_LIST_LIMIT, DEFAULT_LIST_OFFSET, MAX_LIST_LIMIT};
use ats_core::{Candidate, CandidateFilter, CvDownload, Page};

use crate::error::ApiError;
use crate::extract::{CandidateForm, JsonBody};
use crate::response::{ApiResponse, PaginationMeta};
use crate::state::AppState;

/// Query parameters for listing candidates.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCandidatesQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListCandidatesQuery {
    /// Split into a filter and a page window.
    ///
    /// `limit` below 1 and negative `offset` are rejected; `limit` above the
    /// maximum is clamped.
    pub fn into_parts(self) -> Result<(CandidateFilter, Page), ApiError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if limit < 1 {
            return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
        }
        let offset = self.offset.unwrap_or(DEFAULT_LIST_OFFSET);
        if offset < 0 {
            return Err(ApiError::BadRequest("offset must not be negative".to_string()));
        }

        let filter = CandidateFilter {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
        };
        Ok((filter, Page::new(limit.min(MAX_LIST_LIMIT), offset)))
    }
}

/// Body of the `detail` and `download-cv` endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct DocumentBody {
    #[serde(default)]
    pub document: Option<String>,
}

impl DocumentBody {
    fn require_document(self) -> Result<String, ApiError> {
        self.document
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(ApiError::document_required)
    }
}

pub async fn list_candidates(
    State(state): State<AppState>,
    query: Result<Query<ListCandidatesQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<Candidate>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let (filter, page) = query.into_parts()?;

    let page = state.service.list(filter, page).await?;
    let pagination = PaginationMeta::from(&page);
    Ok(ApiResponse::ok("Candidates retrieved successfully", page.items).with_pagination(pagination))
}

pub async fn create_candidate(
    State(state): State<AppState>,
    CandidateForm(payload): CandidateForm,
) -> Result<ApiResponse<Candidate>, ApiError> {
    let candidate = state.service.create(&payload).await?;
    info!(
        subsystem = "api",
        component = "candidates",
        op = "create",
        document = %candidate.document,
        "Candidate created"
    );
    Ok(ApiResponse::created("Candidate created successfully", candidate))
}

pub async fn get_candidate(
    State(state): State<AppState>,
    Path(document): Path<String>,
) -> Result<ApiResponse<Candidate>, ApiError> {
    let candidate = state.service.get(&document).await?;
    Ok(ApiResponse::ok("Candidate retrieved successfully", candidate))
}

/// `POST /detail` keeps the document number out of the URL.
pub async fn candidate_detail(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<DocumentBody>,
) -> Result<ApiResponse<Candidate>, ApiError> {
    let document = body.require_document()?;
    let candidate = state.service.get(&document).await?;
    Ok(ApiResponse::ok("Candidate retrieved successfully", candidate))
}

/// The path names the record; a body without `document` addresses it.
pub async fn update_candidate(
    State(state): State<AppState>,
    Path(document): Path<String>,
    CandidateForm(mut payload): CandidateForm,
) -> Result<ApiResponse<Candidate>, ApiError> {
    if !payload.contains("document") {
        payload.set("document", document.clone());
    }
    let candidate = state.service.update(&document, &payload).await?;
    info!(
        subsystem = "api",
        component = "candidates",
        op = "update",
        document = %document,
        "Candidate updated"
    );
    Ok(ApiResponse::ok("Candidate updated successfully", candidate))
}

pub async fn delete_candidate(
    State(state): State<AppState>,
    Path(document): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    state.service.delete(&document).await?;
    info!(
        subsystem = "api",
        component = "candidates",
        op = "delete",
        document = %document,
        "Candidate deleted"
    );
    Ok(ApiResponse::message("Candidate deleted successfully"))
}

pub async fn download_cv(
    State(state): State<AppState>,
    Path(document): Path<String>,
) -> Result<Response, ApiError> {
    let download = state.service.download_cv(&document).await?;
    file_response(download)
}

/// `POST /download-cv` keeps the document number out of the URL.
pub async fn download_cv_by_body(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<DocumentBody>,
) -> Result<Response, ApiError> {
    let document = body.require_document()?;
    let download = state.service.download_cv(&document).await?;
    file_response(download)
}

fn file_response(download: CvDownload) -> Result<Response, ApiError> {
    let disposition = HeaderValue::from_str(&download.content_disposition())
        .map_err(|e| ApiError::Internal(format!("invalid Content-Disposition: {e}")))?;
    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static(download.content_type)),
        (CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, download.bytes).into_response())
}
