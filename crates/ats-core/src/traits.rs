//! Core traits for the candidate store.
//!
//! The write coordinator only talks to persistence through
//! [`CandidateRepository`], so the PostgreSQL backend and the in-memory
//! test double are interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::*;

// =============================================================================
// CANDIDATE REPOSITORY
// =============================================================================

/// Persistence collaborator for candidate records.
///
/// Implementations must report a duplicate natural key or email as
/// [`Error::UniqueViolation`] and a missing target as [`Error::NotFound`],
/// so callers can tell these apart from backend faults.
///
/// [`Error::UniqueViolation`]: crate::Error::UniqueViolation
/// [`Error::NotFound`]: crate::Error::NotFound
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    /// Insert a fully stamped record and return it as stored.
    async fn insert(&self, candidate: Candidate) -> Result<Candidate>;

    /// Fetch a record by document number.
    async fn find_by_document(&self, document: &str) -> Result<Option<Candidate>>;

    /// List records matching `filter`, ordered by creation time with ties
    /// broken by insertion order.
    async fn find_many(
        &self,
        filter: &CandidateFilter,
        page: Page,
        order: ListOrder,
    ) -> Result<Vec<Candidate>>;

    /// Merge `patch` into the record and set its `updated_at`.
    async fn update(
        &self,
        document: &str,
        patch: &CandidatePatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Candidate>;

    /// Remove a record.
    async fn delete(&self, document: &str) -> Result<()>;

    /// Count records satisfying a predicate.
    async fn count_where(&self, predicate: &CandidatePredicate) -> Result<i64>;
}
