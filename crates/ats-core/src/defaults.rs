//! Centralized default constants for the applicant tracking system.
//!
//! Field limits here are shared by the validator, the SQL schema in
//! `migrations/`, and the OpenAPI document. Keep them in step.

// =============================================================================
// FIELD LIMITS (characters)
// =============================================================================

/// Minimum length of a candidate document number.
pub const DOCUMENT_MIN_CHARS: usize = 5;

/// Maximum length of a candidate document number.
pub const DOCUMENT_MAX_CHARS: usize = 20;

/// Maximum length of first and last names.
pub const NAME_MAX_CHARS: usize = 100;

/// Maximum length of an email address.
pub const EMAIL_MAX_CHARS: usize = 150;

pub const PHONE_MAX_CHARS: usize = 20;

pub const ADDRESS_MAX_CHARS: usize = 200;

/// Maximum length of the education summary.
///
/// Earlier revisions capped this at 200 on the server and 1000 in the UI;
/// the larger value is canonical.
pub const EDUCATION_MAX_CHARS: usize = 1000;

pub const EXPERIENCE_MAX_CHARS: usize = 500;

/// Maximum length of a CV file name (enforced on update).
pub const CV_FILENAME_MAX_CHARS: usize = 200;

// =============================================================================
// ATTACHMENTS
// =============================================================================

/// Largest CV accepted on create or update (5 MiB).
pub const MAX_CV_BYTES: usize = 5 * 1024 * 1024;

/// File name served when a stored CV has no name.
pub const DEFAULT_CV_FILENAME: &str = "cv.pdf";

pub const MIME_PDF: &str = "application/pdf";

pub const MIME_WORD: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Upper bound for a sanitized download file name.
pub const MAX_FILENAME_CHARS: usize = 255;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for candidate listings.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Hard ceiling for a single listing page.
pub const MAX_LIST_LIMIT: i64 = 500;

/// Default page offset.
pub const DEFAULT_LIST_OFFSET: i64 = 0;
