//! In-memory candidate repository for deterministic testing.
//!
//! Enforces the same unique keys as the SQL schema (document and email), so
//! duplicate handling can be tested without a database.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ats_core::mock::InMemoryCandidateRepository;
//! use ats_core::CandidateService;
//!
//! let repo = InMemoryCandidateRepository::new();
//! let service = CandidateService::new(Arc::new(repo.clone()));
//! assert_eq!(repo.len(), 0);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result, UniqueField};
use crate::models::*;
use crate::traits::CandidateRepository;

#[derive(Debug, Default)]
struct State {
    rows: Vec<Row>,
    next_seq: u64,
    fail_next: Option<String>,
    write_calls: usize,
}

#[derive(Debug, Clone)]
struct Row {
    seq: u64,
    candidate: Candidate,
}

impl State {
    fn take_failure(&mut self) -> Result<()> {
        match self.fail_next.take() {
            Some(message) => Err(Error::Internal(message)),
            None => Ok(()),
        }
    }

    fn conflict(&self, candidate: &Candidate, skip_document: Option<&str>) -> Option<UniqueField> {
        let others = self
            .rows
            .iter()
            .filter(|r| Some(r.candidate.document.as_str()) != skip_document);
        for row in others {
            if row.candidate.document == candidate.document {
                return Some(UniqueField::Document);
            }
            if row.candidate.email == candidate.email {
                return Some(UniqueField::Email);
            }
        }
        None
    }
}

/// Shared, cloneable in-memory store.
#[derive(Clone, Default)]
pub struct InMemoryCandidateRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryCandidateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a record directly, bypassing unique checks.
    pub fn seed(&self, candidate: Candidate) {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.rows.push(Row { seq, candidate });
    }

    /// Make the next repository call fail with an internal error.
    pub fn fail_next_call(&self, message: impl Into<String>) {
        self.lock().fail_next = Some(message.into());
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of insert, update and delete calls received so far.
    pub fn write_calls(&self) -> usize {
        self.lock().write_calls
    }

    /// Snapshot of a stored record.
    pub fn get(&self, document: &str) -> Option<Candidate> {
        self.lock()
            .rows
            .iter()
            .find(|r| r.candidate.document == document)
            .map(|r| r.candidate.clone())
    }
}

#[async_trait]
impl CandidateRepository for InMemoryCandidateRepository {
    async fn insert(&self, candidate: Candidate) -> Result<Candidate> {
        let mut state = self.lock();
        state.write_calls += 1;
        state.take_failure()?;

        if let Some(field) = state.conflict(&candidate, None) {
            return Err(Error::UniqueViolation(field));
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.rows.push(Row {
            seq,
            candidate: candidate.clone(),
        });
        Ok(candidate)
    }

    async fn find_by_document(&self, document: &str) -> Result<Option<Candidate>> {
        let mut state = self.lock();
        state.take_failure()?;
        Ok(state
            .rows
            .iter()
            .find(|r| r.candidate.document == document)
            .map(|r| r.candidate.clone()))
    }

    async fn find_many(
        &self,
        filter: &CandidateFilter,
        page: Page,
        order: ListOrder,
    ) -> Result<Vec<Candidate>> {
        let mut state = self.lock();
        state.take_failure()?;

        let mut rows: Vec<&Row> = state
            .rows
            .iter()
            .filter(|r| filter.matches(&r.candidate))
            .collect();
        rows.sort_by(|a, b| {
            let by_time = a.candidate.created_at.cmp(&b.candidate.created_at);
            let by_time = match order {
                ListOrder::NewestFirst => by_time.reverse(),
                ListOrder::OldestFirst => by_time,
            };
            by_time.then(a.seq.cmp(&b.seq))
        });

        let offset = usize::try_from(page.offset).unwrap_or(0);
        let limit = usize::try_from(page.limit).unwrap_or(0);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|r| r.candidate.clone())
            .collect())
    }

    async fn update(
        &self,
        document: &str,
        patch: &CandidatePatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Candidate> {
        let mut state = self.lock();
        state.write_calls += 1;
        state.take_failure()?;

        let index = state
            .rows
            .iter()
            .position(|r| r.candidate.document == document)
            .ok_or_else(|| Error::NotFound(format!("candidate {document}")))?;

        let mut updated = state.rows[index].candidate.clone();
        patch.apply_to(&mut updated, updated_at);

        if let Some(field) = state.conflict(&updated, Some(document)) {
            return Err(Error::UniqueViolation(field));
        }

        state.rows[index].candidate = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, document: &str) -> Result<()> {
        let mut state = self.lock();
        state.write_calls += 1;
        state.take_failure()?;

        let before = state.rows.len();
        state.rows.retain(|r| r.candidate.document != document);
        if state.rows.len() == before {
            return Err(Error::NotFound(format!("candidate {document}")));
        }
        Ok(())
    }

    async fn count_where(&self, predicate: &CandidatePredicate) -> Result<i64> {
        let mut state = self.lock();
        state.take_failure()?;
        let count = state
            .rows
            .iter()
            .filter(|r| predicate.matches(&r.candidate))
            .count();
        Ok(count as i64)
    }
}
