//! Candidate write coordinator.
//!
//! [`CandidateService`] is the single entry point for reading and mutating
//! candidates. Every write follows the same order: validate the payload,
//! run the read-side uniqueness checks, then make exactly one persistence
//! call. A failed pre-check never reaches the store.
//!
//! Uniqueness pre-checks and the write are not atomic. If a concurrent
//! writer wins the race the store's unique constraint rejects the write,
//! and that rejection is reported with the same error kind as the pre-check.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::attachment::CvDownload;
use crate::defaults::{DEFAULT_LIST_OFFSET, MAX_LIST_LIMIT};
use crate::error::{Error, UniqueField};
use crate::models::*;
use crate::traits::CandidateRepository;
use crate::uniqueness::UniquenessChecker;
use crate::validation::{validate_create, validate_update, FieldErrors, Invalid};

pub const DUPLICATE_DOCUMENT_MESSAGE: &str = "A candidate with this document number already exists";
pub const DUPLICATE_EMAIL_MESSAGE: &str = "A candidate with this email already exists";

/// Why a candidate operation did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CandidateError {
    /// One or more fields broke a rule.
    #[error("Invalid input data: {0}")]
    ValidationFailed(FieldErrors),

    /// An update named only fields outside the accepted set.
    #[error("Field not allowed: {0}")]
    UnknownFieldRejected(FieldErrors),

    #[error("{}", DUPLICATE_DOCUMENT_MESSAGE)]
    DuplicateDocument,

    #[error("{}", DUPLICATE_EMAIL_MESSAGE)]
    DuplicateEmail,

    /// No candidate with this document number.
    #[error("Candidate not found: {0}")]
    NotFound(String),

    /// The candidate exists but has no CV stored.
    #[error("Candidate {0} has no CV")]
    NoAttachment(String),

    /// Backend fault that is not a business outcome. Terminal, not retried.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl CandidateError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CandidateError::ValidationFailed(_) => "validation_failed",
            CandidateError::UnknownFieldRejected(_) => "unknown_field_rejected",
            CandidateError::DuplicateDocument => "duplicate_document",
            CandidateError::DuplicateEmail => "duplicate_email",
            CandidateError::NotFound(_) => "not_found",
            CandidateError::NoAttachment(_) => "no_attachment",
            CandidateError::PersistenceFailure(_) => "persistence_failure",
        }
    }

    /// Field-attributed messages for this failure, if it has any.
    ///
    /// Duplicates attach to the field that collided.
    pub fn field_errors(&self) -> Option<FieldErrors> {
        match self {
            CandidateError::ValidationFailed(errors)
            | CandidateError::UnknownFieldRejected(errors) => Some(errors.clone()),
            CandidateError::DuplicateDocument => Some(FieldErrors::single(
                UniqueField::Document.field_name(),
                DUPLICATE_DOCUMENT_MESSAGE,
            )),
            CandidateError::DuplicateEmail => Some(FieldErrors::single(
                UniqueField::Email.field_name(),
                DUPLICATE_EMAIL_MESSAGE,
            )),
            _ => None,
        }
    }

    fn duplicate(field: UniqueField) -> Self {
        match field {
            UniqueField::Document => CandidateError::DuplicateDocument,
            UniqueField::Email => CandidateError::DuplicateEmail,
        }
    }
}

impl From<Error> for CandidateError {
    fn from(err: Error) -> Self {
        match err {
            Error::UniqueViolation(field) => CandidateError::duplicate(field),
            Error::NotFound(what) => CandidateError::NotFound(what),
            other => CandidateError::PersistenceFailure(other.to_string()),
        }
    }
}

impl From<Invalid> for CandidateError {
    fn from(invalid: Invalid) -> Self {
        if invalid.only_unknown_fields() {
            CandidateError::UnknownFieldRejected(invalid.errors)
        } else {
            CandidateError::ValidationFailed(invalid.errors)
        }
    }
}

pub type CandidateResult<T> = std::result::Result<T, CandidateError>;

/// One page of a candidate listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePage {
    pub items: Vec<Candidate>,
    /// Matching records across all pages.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl CandidatePage {
    pub fn has_more(&self) -> bool {
        self.offset + (self.items.len() as i64) < self.total
    }
}

/// Orchestrates validation, uniqueness checks and persistence.
#[derive(Clone)]
pub struct CandidateService {
    repo: Arc<dyn CandidateRepository>,
}

impl CandidateService {
    pub fn new(repo: Arc<dyn CandidateRepository>) -> Self {
        Self { repo }
    }

    fn uniqueness(&self) -> UniquenessChecker<'_> {
        UniquenessChecker::new(self.repo.as_ref())
    }

    /// Map a persistence error for `document` to its business outcome.
    fn classify(op: &'static str, document: &str, err: Error) -> CandidateError {
        match err {
            Error::UniqueViolation(field) => {
                warn!(
                    subsystem = "candidates",
                    component = "service",
                    op,
                    document,
                    field = %field,
                    "Write rejected by unique constraint"
                );
                CandidateError::duplicate(field)
            }
            Error::NotFound(_) => CandidateError::NotFound(document.to_string()),
            other => {
                error!(
                    subsystem = "candidates",
                    component = "service",
                    op,
                    document,
                    error = %other,
                    "Persistence failure"
                );
                CandidateError::PersistenceFailure(other.to_string())
            }
        }
    }

    async fn require(&self, op: &'static str, document: &str) -> CandidateResult<Candidate> {
        match self.repo.find_by_document(document).await {
            Ok(Some(candidate)) => Ok(candidate),
            Ok(None) => {
                warn!(
                    subsystem = "candidates",
                    component = "service",
                    op,
                    document,
                    "Candidate not found"
                );
                Err(CandidateError::NotFound(document.to_string()))
            }
            Err(e) => Err(Self::classify(op, document, e)),
        }
    }

    /// Create a candidate.
    ///
    /// Fails with `ValidationFailed`, `DuplicateDocument` or `DuplicateEmail`
    /// before touching the store; `createdAt` and `updatedAt` of the result
    /// are equal.
    #[instrument(skip(self, payload), fields(subsystem = "candidates", component = "service", op = "create"))]
    pub async fn create(&self, payload: &CandidatePayload) -> CandidateResult<Candidate> {
        let start = Instant::now();

        let new = validate_create(payload).map_err(|invalid| {
            warn!(
                errors = %invalid.errors,
                "Create rejected by validation"
            );
            CandidateError::from(invalid)
        })?;
        let document = new.document.clone();

        let checker = self.uniqueness();
        let taken = checker
            .exists_by_document(&document)
            .await
            .map_err(|e| Self::classify("create", &document, e))?;
        if taken {
            warn!(document = %document, "Create rejected: duplicate document");
            return Err(CandidateError::DuplicateDocument);
        }

        let taken = checker
            .exists_by_email(&new.email, None)
            .await
            .map_err(|e| Self::classify("create", &document, e))?;
        if taken {
            warn!(document = %document, "Create rejected: duplicate email");
            return Err(CandidateError::DuplicateEmail);
        }

        let stored = self
            .repo
            .insert(new.into_candidate(Utc::now()))
            .await
            .map_err(|e| Self::classify("create", &document, e))?;

        info!(
            document = %stored.document,
            has_cv = stored.cv.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Candidate created"
        );
        Ok(stored)
    }

    /// Update the candidate identified by `document`.
    ///
    /// Only fields present in the payload change. An email change is checked
    /// against other candidates; keeping the current email never collides.
    #[instrument(skip(self, payload), fields(subsystem = "candidates", component = "service", op = "update"))]
    pub async fn update(
        &self,
        document: &str,
        payload: &CandidatePayload,
    ) -> CandidateResult<Candidate> {
        let start = Instant::now();

        let patch = validate_update(document, payload).map_err(|invalid| {
            warn!(
                errors = %invalid.errors,
                unknown = invalid.unknown_fields.len(),
                "Update rejected by validation"
            );
            CandidateError::from(invalid)
        })?;

        let existing = self.require("update", document).await?;

        if let Some(email) = patch.email.as_deref().filter(|e| *e != existing.email) {
            let taken = self
                .uniqueness()
                .exists_by_email(email, Some(document))
                .await
                .map_err(|e| Self::classify("update", document, e))?;
            if taken {
                warn!("Update rejected: duplicate email");
                return Err(CandidateError::DuplicateEmail);
            }
        } else {
            debug!("Email unchanged, skipping uniqueness check");
        }

        let updated = self
            .repo
            .update(document, &patch, Utc::now())
            .await
            .map_err(|e| Self::classify("update", document, e))?;

        info!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Candidate updated"
        );
        Ok(updated)
    }

    /// Delete the candidate identified by `document`.
    #[instrument(skip(self), fields(subsystem = "candidates", component = "service", op = "delete"))]
    pub async fn delete(&self, document: &str) -> CandidateResult<()> {
        self.require("delete", document).await?;
        self.repo
            .delete(document)
            .await
            .map_err(|e| Self::classify("delete", document, e))?;
        info!("Candidate deleted");
        Ok(())
    }

    /// Fetch one candidate.
    #[instrument(skip(self), fields(subsystem = "candidates", component = "service", op = "get"))]
    pub async fn get(&self, document: &str) -> CandidateResult<Candidate> {
        self.require("get", document).await
    }

    /// List candidates newest first.
    ///
    /// `limit` is clamped to `1..=MAX_LIST_LIMIT` and a negative `offset`
    /// is treated as zero.
    #[instrument(skip(self, filter), fields(subsystem = "candidates", component = "service", op = "list"))]
    pub async fn list(
        &self,
        filter: CandidateFilter,
        page: Page,
    ) -> CandidateResult<CandidatePage> {
        let start = Instant::now();
        let filter = filter.normalized();
        let page = Page::new(
            page.limit.clamp(1, MAX_LIST_LIMIT),
            page.offset.max(DEFAULT_LIST_OFFSET),
        );

        let items = self
            .repo
            .find_many(&filter, page, ListOrder::NewestFirst)
            .await
            .map_err(|e| Self::classify("list", "", e))?;
        let total = self
            .repo
            .count_where(&CandidatePredicate::Matches(filter))
            .await
            .map_err(|e| Self::classify("list", "", e))?;

        debug!(
            result_count = items.len(),
            total,
            duration_ms = start.elapsed().as_millis() as u64,
            "Candidates listed"
        );
        Ok(CandidatePage {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Resolve the stored CV of a candidate for download.
    #[instrument(skip(self), fields(subsystem = "candidates", component = "service", op = "download_cv"))]
    pub async fn download_cv(&self, document: &str) -> CandidateResult<CvDownload> {
        let candidate = self.require("download_cv", document).await?;
        CvDownload::from_candidate(candidate).ok_or_else(|| {
            warn!("Candidate has no CV");
            CandidateError::NoAttachment(document.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::InMemoryCandidateRepository;
    use crate::CvBlob;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use serde_json::json;

    fn service() -> (CandidateService, InMemoryCandidateRepository) {
        let repo = InMemoryCandidateRepository::new();
        (CandidateService::new(Arc::new(repo.clone())), repo)
    }

    fn maria() -> CandidatePayload {
        CandidatePayload::new()
            .with("document", "12345678A")
            .with("firstName", "María")
            .with("lastName", "González")
            .with("email", "maria@x.com")
    }

    fn person(document: &str, first: &str, last: &str, email: &str) -> CandidatePayload {
        CandidatePayload::new()
            .with("document", document)
            .with("firstName", first)
            .with("lastName", last)
            .with("email", email)
    }

    #[tokio::test]
    async fn test_create_returns_record_with_equal_timestamps() {
        let (svc, repo) = service();
        let c = svc.create(&maria()).await.unwrap();
        assert_eq!(c.document, "12345678A");
        assert_eq!(c.created_at, c.updated_at);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_document_then_email() {
        let (svc, repo) = service();
        svc.create(&maria()).await.unwrap();

        let err = svc
            .create(&maria().with("email", "other@x.com"))
            .await
            .unwrap_err();
        assert_eq!(err, CandidateError::DuplicateDocument);
        assert_eq!(
            err.field_errors().unwrap().get("document"),
            Some(DUPLICATE_DOCUMENT_MESSAGE)
        );

        let err = svc
            .create(&maria().with("document", "999999999Z"))
            .await
            .unwrap_err();
        assert_eq!(err, CandidateError::DuplicateEmail);
        assert_eq!(
            err.field_errors().unwrap().get("email"),
            Some(DUPLICATE_EMAIL_MESSAGE)
        );

        // Only the first create reached the store.
        assert_eq!(repo.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_create_validation_failure_makes_no_write() {
        let (svc, repo) = service();
        let payload = CandidatePayload::new()
            .with("document", "12345678A")
            .with("email", "bad");
        let err = svc.create(&payload).await.unwrap_err();
        match err {
            CandidateError::ValidationFailed(errors) => {
                assert!(errors.contains("firstName"));
                assert!(errors.contains("lastName"));
                assert!(errors.contains("email"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(repo.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_update_email_collision_and_self_update() {
        let (svc, _repo) = service();
        svc.create(&maria()).await.unwrap();
        svc.create(&person("X1234567", "Juan", "Pérez", "juan@x.com"))
            .await
            .unwrap();

        let err = svc
            .update(
                "X1234567",
                &CandidatePayload::new()
                    .with("document", "X1234567")
                    .with("email", "maria@x.com"),
            )
            .await
            .unwrap_err();
        assert_eq!(err, CandidateError::DuplicateEmail);

        let updated = svc
            .update(
                "12345678A",
                &CandidatePayload::new()
                    .with("document", "12345678A")
                    .with("email", "maria@x.com")
                    .with("phone", "600000000"),
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "maria@x.com");
        assert_eq!(updated.phone.as_deref(), Some("600000000"));
    }

    #[tokio::test]
    async fn test_update_keeps_absent_fields_and_refreshes_updated_at() {
        let (svc, _repo) = service();
        let created = svc.create(&maria().with("address", "Calle Mayor 1")).await.unwrap();

        let updated = svc
            .update(
                "12345678A",
                &CandidatePayload::new()
                    .with("document", "12345678A")
                    .with("firstName", "Lucía"),
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Lucía");
        assert_eq!(updated.last_name, "González");
        assert_eq!(updated.address.as_deref(), Some("Calle Mayor 1"));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_update_unknown_field_is_rejected_by_name() {
        let (svc, repo) = service();
        svc.create(&maria()).await.unwrap();

        let err = svc
            .update(
                "12345678A",
                &CandidatePayload::new()
                    .with("document", "12345678A")
                    .with("createdAt", "2000-01-01T00:00:00Z"),
            )
            .await
            .unwrap_err();
        match err {
            CandidateError::UnknownFieldRejected(errors) => {
                assert_eq!(errors.get("createdAt"), Some("Creation date cannot be modified."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(repo.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_candidate() {
        let (svc, _repo) = service();
        let err = svc
            .update("NOPE12", &CandidatePayload::new().with("document", "NOPE12"))
            .await
            .unwrap_err();
        assert_eq!(err, CandidateError::NotFound("NOPE12".to_string()));
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let (svc, _repo) = service();
        assert_eq!(
            svc.delete("12345678A").await.unwrap_err(),
            CandidateError::NotFound("12345678A".to_string())
        );

        svc.create(&maria()).await.unwrap();
        svc.delete("12345678A").await.unwrap();
        assert!(matches!(
            svc.get("12345678A").await,
            Err(CandidateError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_case_insensitively() {
        let (svc, _repo) = service();
        svc.create(&maria()).await.unwrap();
        svc.create(&person("X1234567", "Juan", "Pérez", "juan@x.com"))
            .await
            .unwrap();

        let filter = CandidateFilter {
            last_name: Some("gonz".to_string()),
            ..Default::default()
        };
        let page = svc.list(filter, Page::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].last_name, "González");
        assert!(!page.has_more());
    }

    #[tokio::test]
    async fn test_list_newest_first_and_paginates() {
        let (svc, repo) = service();
        let t0 = Utc::now();
        for (i, doc) in ["AAAAA1", "BBBBB2", "CCCCC3"].iter().enumerate() {
            let mut c = crate::validation::validate_create(&person(
                doc,
                "N",
                "L",
                &format!("{}@x.com", doc.to_lowercase()),
            ))
            .unwrap()
            .into_candidate(t0 + Duration::seconds(i as i64));
            c.updated_at = c.created_at;
            repo.seed(c);
        }

        let page = svc.list(CandidateFilter::default(), Page::new(2, 0)).await.unwrap();
        let docs: Vec<&str> = page.items.iter().map(|c| c.document.as_str()).collect();
        assert_eq!(docs, vec!["CCCCC3", "BBBBB2"]);
        assert_eq!(page.total, 3);
        assert!(page.has_more());

        let page = svc.list(CandidateFilter::default(), Page::new(2, 2)).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_more());
    }

    #[tokio::test]
    async fn test_list_clamps_page() {
        let (svc, _repo) = service();
        let page = svc
            .list(CandidateFilter::default(), Page::new(10_000, -5))
            .await
            .unwrap();
        assert_eq!(page.limit, MAX_LIST_LIMIT);
        assert_eq!(page.offset, 0);
    }

    #[tokio::test]
    async fn test_attachment_round_trip() {
        let (svc, _repo) = service();
        svc.create(
            &maria()
                .with_cv(vec![0x25, 0x50, 0x44, 0x46])
                .with("cvFilename", "cv.pdf"),
        )
        .await
        .unwrap();

        let download = svc.download_cv("12345678A").await.unwrap();
        assert_eq!(download.content_type, "application/pdf");
        assert_eq!(download.bytes, vec![0x25, 0x50, 0x44, 0x46]);
    }

    #[tokio::test]
    async fn test_download_without_cv() {
        let (svc, _repo) = service();
        svc.create(&maria()).await.unwrap();
        assert_eq!(
            svc.download_cv("12345678A").await.unwrap_err(),
            CandidateError::NoAttachment("12345678A".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_normalizes_tagged_buffer_cv() {
        let (svc, _repo) = service();
        svc.create(&maria().with("cv", json!({"type": "Buffer", "data": [1, 2, 3]})))
            .await
            .unwrap();
        let c = svc.get("12345678A").await.unwrap();
        assert_eq!(c.cv, Some(CvBlob::new(vec![1, 2, 3])));
        assert_eq!(c.cv_filename, None);
    }

    #[tokio::test]
    async fn test_persistence_fault_is_classified() {
        let (svc, repo) = service();
        repo.fail_next_call("connection refused");
        let err = svc.create(&maria()).await.unwrap_err();
        assert!(matches!(
            err,
            CandidateError::PersistenceFailure(ref m) if m.contains("connection refused")
        ));
        assert_eq!(err.kind(), "persistence_failure");
        assert!(err.field_errors().is_none());
    }

    /// Repository whose uniqueness queries always report "free", as if a
    /// concurrent writer committed between check and write.
    struct RacingRepository(InMemoryCandidateRepository);

    #[async_trait]
    impl CandidateRepository for RacingRepository {
        async fn insert(&self, candidate: Candidate) -> crate::Result<Candidate> {
            self.0.insert(candidate).await
        }
        async fn find_by_document(&self, document: &str) -> crate::Result<Option<Candidate>> {
            self.0.find_by_document(document).await
        }
        async fn find_many(
            &self,
            filter: &CandidateFilter,
            page: Page,
            order: ListOrder,
        ) -> crate::Result<Vec<Candidate>> {
            self.0.find_many(filter, page, order).await
        }
        async fn update(
            &self,
            document: &str,
            patch: &CandidatePatch,
            updated_at: DateTime<Utc>,
        ) -> crate::Result<Candidate> {
            self.0.update(document, patch, updated_at).await
        }
        async fn delete(&self, document: &str) -> crate::Result<()> {
            self.0.delete(document).await
        }
        async fn count_where(&self, _predicate: &CandidatePredicate) -> crate::Result<i64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_constraint_violation_after_race_maps_to_duplicate() {
        let repo = InMemoryCandidateRepository::new();
        let svc = CandidateService::new(Arc::new(RacingRepository(repo.clone())));
        svc.create(&maria()).await.unwrap();

        let err = svc
            .create(&maria().with("email", "other@x.com"))
            .await
            .unwrap_err();
        assert_eq!(err, CandidateError::DuplicateDocument);

        let err = svc
            .create(&maria().with("document", "999999999Z"))
            .await
            .unwrap_err();
        assert_eq!(err, CandidateError::DuplicateEmail);

        svc.create(&person("X1234567", "Juan", "Pérez", "juan@x.com"))
            .await
            .unwrap();
        let err = svc
            .update(
                "X1234567",
                &CandidatePayload::new()
                    .with("document", "X1234567")
                    .with("email", "maria@x.com"),
            )
            .await
            .unwrap_err();
        assert_eq!(err, CandidateError::DuplicateEmail);
    }

    #[test]
    fn test_error_conversion() {
        assert_eq!(
            CandidateError::from(Error::UniqueViolation(UniqueField::Document)),
            CandidateError::DuplicateDocument
        );
        assert!(matches!(
            CandidateError::from(Error::Internal("boom".into())),
            CandidateError::PersistenceFailure(_)
        ));
    }
}
