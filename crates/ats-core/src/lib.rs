//! # ats-core
//!
//! Core types, traits, and write-path rules for the applicant tracking system.
//!
//! This crate owns everything that decides whether a candidate record may be
//! written: the field rule set, the uniqueness checks, attachment handling,
//! and the [`CandidateService`] that orchestrates them over any
//! [`CandidateRepository`] implementation.

pub mod attachment;
pub mod defaults;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod service;
pub mod traits;
pub mod uniqueness;
pub mod validation;

// Re-export commonly used types at crate root
pub use attachment::{content_type_for, decode_blob, sanitize_filename, CvBlob, CvDownload};
pub use error::{Error, Result, UniqueField};
pub use models::*;
pub use service::{CandidateError, CandidatePage, CandidateResult, CandidateService};
pub use traits::CandidateRepository;
pub use uniqueness::UniquenessChecker;
pub use validation::{validate_create, validate_update, FieldErrors, Invalid};
