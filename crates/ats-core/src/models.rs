//! Candidate domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attachment::CvBlob;
use crate::defaults::{DEFAULT_LIST_LIMIT, DEFAULT_LIST_OFFSET};
use crate::error::{Error, Result};

// =============================================================================
// CANDIDATE
// =============================================================================

/// A stored candidate record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// National identity or passport number; the natural key.
    pub document: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv: Option<CvBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated candidate ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCandidate {
    pub document: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub education: Option<String>,
    pub experience: Option<String>,
    pub cv: Option<CvBlob>,
    pub cv_filename: Option<String>,
}

impl NewCandidate {
    /// Stamp the record with its creation time. Both timestamps start equal.
    pub fn into_candidate(self, now: DateTime<Utc>) -> Candidate {
        Candidate {
            document: self.document,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            education: self.education,
            experience: self.experience,
            cv: self.cv,
            cv_filename: self.cv_filename,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A validated partial update. `None` leaves the stored value untouched.
///
/// Attachment semantics:
/// - `cv: Some(_)` replaces the CV and sets its name to `cv_filename`
///   (clearing the name when `cv_filename` is `None`).
/// - `cv: None, cv_filename: Some(_)` renames the stored CV, and is a no-op
///   when no CV is stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub education: Option<String>,
    pub experience: Option<String>,
    pub cv: Option<CvBlob>,
    pub cv_filename: Option<String>,
}

impl CandidatePatch {
    /// True when applying the patch would change nothing but `updatedAt`.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge the patch into `candidate` and refresh `updated_at`.
    ///
    /// `updated_at` never moves before `created_at`.
    pub fn apply_to(&self, candidate: &mut Candidate, now: DateTime<Utc>) {
        fn merge(slot: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                slot.clone_from(v);
            }
        }
        fn merge_opt(slot: &mut Option<String>, value: &Option<String>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }

        merge(&mut candidate.first_name, &self.first_name);
        merge(&mut candidate.last_name, &self.last_name);
        merge(&mut candidate.email, &self.email);
        merge_opt(&mut candidate.phone, &self.phone);
        merge_opt(&mut candidate.address, &self.address);
        merge_opt(&mut candidate.education, &self.education);
        merge_opt(&mut candidate.experience, &self.experience);

        match (&self.cv, &self.cv_filename) {
            (Some(cv), name) => {
                candidate.cv = Some(cv.clone());
                candidate.cv_filename.clone_from(name);
            }
            (None, Some(name)) if candidate.cv.is_some() => {
                candidate.cv_filename = Some(name.clone());
            }
            (None, _) => {}
        }

        candidate.updated_at = now.max(candidate.created_at);
    }
}

// =============================================================================
// LISTING
// =============================================================================

/// Case-insensitive substring filters. All present filters must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFilter {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl CandidateFilter {
    /// Drop blank filter values so they match everything.
    pub fn normalized(self) -> Self {
        fn keep(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            first_name: keep(self.first_name),
            last_name: keep(self.last_name),
            email: keep(self.email),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.email.is_none()
    }

    /// Evaluate the filter against a record in memory.
    pub fn matches(&self, candidate: &Candidate) -> bool {
        fn contains(haystack: &str, needle: &Option<String>) -> bool {
            match needle {
                Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
                None => true,
            }
        }
        contains(&candidate.first_name, &self.first_name)
            && contains(&candidate.last_name, &self.last_name)
            && contains(&candidate.email, &self.email)
    }
}

/// A window over an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: DEFAULT_LIST_OFFSET,
        }
    }
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

/// Listing order by creation time. Ties always fall back to insertion order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Predicate understood by [`CandidateRepository::count_where`].
///
/// [`CandidateRepository::count_where`]: crate::traits::CandidateRepository::count_where
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidatePredicate {
    /// Exact match on the natural key.
    Document(String),
    /// Exact match on email, optionally ignoring one record.
    Email {
        email: String,
        exclude_document: Option<String>,
    },
    /// Same semantics as a listing filter.
    Matches(CandidateFilter),
}

impl CandidatePredicate {
    pub fn matches(&self, candidate: &Candidate) -> bool {
        match self {
            CandidatePredicate::Document(document) => candidate.document == *document,
            CandidatePredicate::Email {
                email,
                exclude_document,
            } => {
                candidate.email == *email
                    && exclude_document.as_deref() != Some(candidate.document.as_str())
            }
            CandidatePredicate::Matches(filter) => filter.matches(candidate),
        }
    }
}

// =============================================================================
// RAW INPUT
// =============================================================================

/// An unvalidated create or update request.
///
/// Text fields are kept as raw JSON so the validator can report type errors.
/// Attachment bytes that were already decoded by a transport (for example a
/// multipart upload) are carried separately and take precedence over any
/// `cv` entry in `fields`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePayload {
    fields: Map<String, Value>,
    cv: Option<Vec<u8>>,
}

impl CandidatePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder-style attachment setter.
    pub fn with_cv(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.set_cv(bytes);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn set_cv(&mut self, bytes: impl Into<Vec<u8>>) {
        self.cv = Some(bytes.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Pre-decoded attachment bytes, if a transport supplied them.
    pub fn cv_bytes(&self) -> Option<&[u8]> {
        self.cv.as_deref()
    }

    /// Whether any attachment was supplied, in either form.
    pub fn has_cv(&self) -> bool {
        self.cv.is_some() || self.fields.get("cv").is_some_and(|v| !v.is_null())
    }
}

impl From<Map<String, Value>> for CandidatePayload {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields, cv: None }
    }
}

impl TryFrom<Value> for CandidatePayload {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(map.into()),
            other => Err(Error::InvalidInput(format!(
                "candidate payload must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn sample(now: DateTime<Utc>) -> Candidate {
        NewCandidate {
            document: "12345678A".to_string(),
            first_name: "María".to_string(),
            last_name: "González".to_string(),
            email: "maria@x.com".to_string(),
            phone: Some("+34 600 000 000".to_string()),
            address: None,
            education: None,
            experience: None,
            cv: None,
            cv_filename: None,
        }
        .into_candidate(now)
    }

    #[test]
    fn test_into_candidate_sets_equal_timestamps() {
        let now = Utc::now();
        let c = sample(now);
        assert_eq!(c.created_at, now);
        assert_eq!(c.updated_at, now);
    }

    #[test]
    fn test_candidate_serializes_camel_case_without_empty_optionals() {
        let mut c = sample(Utc::now());
        c.cv = Some(CvBlob::new(b"%PDF".to_vec()));
        c.cv_filename = Some("cv.pdf".to_string());
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["firstName"], "María");
        assert_eq!(v["lastName"], "González");
        assert_eq!(v["cv"], "JVBERg==");
        assert_eq!(v["cvFilename"], "cv.pdf");
        assert!(v.get("address").is_none());
        assert!(v.get("createdAt").is_some());
    }

    #[test]
    fn test_patch_overwrites_only_present_fields() {
        let now = Utc::now();
        let mut c = sample(now);
        let patch = CandidatePatch {
            first_name: Some("Lucía".to_string()),
            address: Some(String::new()),
            ..Default::default()
        };
        patch.apply_to(&mut c, now + Duration::seconds(5));
        assert_eq!(c.first_name, "Lucía");
        assert_eq!(c.last_name, "González");
        assert_eq!(c.phone.as_deref(), Some("+34 600 000 000"));
        assert_eq!(c.address.as_deref(), Some(""));
        assert_eq!(c.updated_at, now + Duration::seconds(5));
        assert_eq!(c.created_at, now);
    }

    #[test]
    fn test_patch_never_moves_updated_at_before_created_at() {
        let now = Utc::now();
        let mut c = sample(now);
        CandidatePatch::default().apply_to(&mut c, now - Duration::hours(1));
        assert_eq!(c.updated_at, c.created_at);
    }

    #[test]
    fn test_patch_new_cv_replaces_name() {
        let now = Utc::now();
        let mut c = sample(now);
        c.cv = Some(CvBlob::new(vec![1]));
        c.cv_filename = Some("old.pdf".to_string());

        let patch = CandidatePatch {
            cv: Some(CvBlob::new(vec![2])),
            ..Default::default()
        };
        patch.apply_to(&mut c, now);
        assert_eq!(c.cv.as_ref().map(CvBlob::as_bytes), Some(&[2u8][..]));
        assert_eq!(c.cv_filename, None);
    }

    #[test]
    fn test_patch_rename_requires_stored_cv() {
        let now = Utc::now();
        let mut c = sample(now);
        let rename = CandidatePatch {
            cv_filename: Some("new.pdf".to_string()),
            ..Default::default()
        };

        rename.apply_to(&mut c, now);
        assert_eq!(c.cv_filename, None);

        c.cv = Some(CvBlob::new(vec![1]));
        rename.apply_to(&mut c, now);
        assert_eq!(c.cv_filename.as_deref(), Some("new.pdf"));
    }

    #[test]
    fn test_filter_is_case_insensitive_substring() {
        let c = sample(Utc::now());
        let filter = CandidateFilter {
            last_name: Some("gonz".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&c));

        let filter = CandidateFilter {
            first_name: Some("MARÍA".to_string()),
            email: Some("@X.COM".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&c));

        let filter = CandidateFilter {
            first_name: Some("maría".to_string()),
            last_name: Some("pérez".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&c));
    }

    #[test]
    fn test_filter_normalized_drops_blanks() {
        let filter = CandidateFilter {
            first_name: Some("   ".to_string()),
            last_name: Some(" gonz ".to_string()),
            email: None,
        }
        .normalized();
        assert_eq!(filter.first_name, None);
        assert_eq!(filter.last_name.as_deref(), Some("gonz"));
        assert!(!filter.is_empty());
        assert!(CandidateFilter::default().is_empty());
    }

    #[test]
    fn test_email_predicate_excludes_document() {
        let c = sample(Utc::now());
        let p = CandidatePredicate::Email {
            email: "maria@x.com".to_string(),
            exclude_document: None,
        };
        assert!(p.matches(&c));

        let p = CandidatePredicate::Email {
            email: "maria@x.com".to_string(),
            exclude_document: Some("12345678A".to_string()),
        };
        assert!(!p.matches(&c));
    }

    #[test]
    fn test_page_default() {
        assert_eq!(Page::default(), Page::new(50, 0));
    }

    #[test]
    fn test_payload_from_json_object() {
        let payload = CandidatePayload::try_from(json!({"document": "12345678A"})).unwrap();
        assert_eq!(payload.get("document"), Some(&json!("12345678A")));
        assert!(!payload.has_cv());
    }

    #[test]
    fn test_payload_rejects_non_object() {
        let err = CandidatePayload::try_from(json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref msg) if msg.contains("array")));
    }

    #[test]
    fn test_payload_has_cv_ignores_null() {
        let payload = CandidatePayload::new().with("cv", Value::Null);
        assert!(!payload.has_cv());
        assert!(CandidatePayload::new().with_cv(vec![1]).has_cv());
    }
}
