//! Candidate field rules and payload validation.
//!
//! Every field is checked against the declarative [`RULES`] table; all fields
//! are evaluated and at most one message is kept per field (the first
//! violation wins). Messages are written for end users: they name the field
//! by its display label rather than its wire name.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attachment::{decode_blob, normalize_filename, CvBlob};
use crate::defaults::*;
use crate::models::{CandidatePatch, CandidatePayload, NewCandidate};

/// Local part and dotted domain with at least two labels. Letters and digits
/// from any script are accepted on both sides of the `@`.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^[\p{L}\p{N}!#$%&'*+/=?^_`{|}~-]+(?:\.[\p{L}\p{N}!#$%&'*+/=?^_`{|}~-]+)*",
        r"@[\p{L}\p{N}](?:[\p{L}\p{N}-]{0,61}[\p{L}\p{N}])?",
        r"(?:\.[\p{L}\p{N}](?:[\p{L}\p{N}-]{0,61}[\p{L}\p{N}])?)+$",
    ))
    .expect("email pattern is a valid regex")
});

// =============================================================================
// FIELD ERRORS
// =============================================================================

/// Field name to a single human-readable message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.insert(field, message);
        errors
    }

    /// Record a message unless the field already has one.
    ///
    /// Returns `true` when the message was kept.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) -> bool {
        use std::collections::btree_map::Entry;
        match self.0.entry(field.into()) {
            Entry::Vacant(slot) => {
                slot.insert(message.into());
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
        }
        Ok(())
    }
}

/// A payload that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalid {
    pub errors: FieldErrors,
    /// Keys outside the accepted field set (update only).
    pub unknown_fields: Vec<String>,
}

impl Invalid {
    /// True when every reported error is an unrecognised key.
    pub fn only_unknown_fields(&self) -> bool {
        !self.unknown_fields.is_empty() && self.errors.len() == self.unknown_fields.len()
    }
}

// =============================================================================
// RULES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Text,
    Email,
    Binary,
}

#[derive(Debug)]
pub struct FieldRule {
    field: &'static str,
    label: &'static str,
    kind: Kind,
    min: usize,
    create_max: Option<usize>,
    update_max: Option<usize>,
    on_create: Presence,
    on_update: Presence,
}

impl FieldRule {
    const fn text(field: &'static str, label: &'static str, max: usize) -> Self {
        Self {
            field,
            label,
            kind: Kind::Text,
            min: 0,
            create_max: Some(max),
            update_max: Some(max),
            on_create: Presence::Optional,
            on_update: Presence::Optional,
        }
    }

    const fn min(mut self, min: usize) -> Self {
        self.min = min;
        self
    }

    const fn required_on_create(mut self) -> Self {
        self.on_create = Presence::Required;
        self
    }

    const fn required_always(mut self) -> Self {
        self.on_create = Presence::Required;
        self.on_update = Presence::Required;
        self
    }

    fn presence(&self, mode: Mode) -> Presence {
        match mode {
            Mode::Create => self.on_create,
            Mode::Update => self.on_update,
        }
    }

    fn max(&self, mode: Mode) -> Option<usize> {
        match mode {
            Mode::Create => self.create_max,
            Mode::Update => self.update_max,
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// The accepted candidate fields, in evaluation order.
pub static RULES: &[FieldRule] = &[
    FieldRule::text("document", "Document number", DOCUMENT_MAX_CHARS)
        .min(DOCUMENT_MIN_CHARS)
        .required_always(),
    FieldRule::text("firstName", "First name", NAME_MAX_CHARS)
        .min(1)
        .required_on_create(),
    FieldRule::text("lastName", "Last name", NAME_MAX_CHARS)
        .min(1)
        .required_on_create(),
    FieldRule {
        kind: Kind::Email,
        ..FieldRule::text("email", "Email", EMAIL_MAX_CHARS)
            .min(1)
            .required_on_create()
    },
    FieldRule::text("phone", "Phone", PHONE_MAX_CHARS),
    FieldRule::text("address", "Address", ADDRESS_MAX_CHARS),
    FieldRule::text("education", "Education", EDUCATION_MAX_CHARS),
    FieldRule::text("experience", "Experience", EXPERIENCE_MAX_CHARS),
    FieldRule {
        kind: Kind::Binary,
        create_max: None,
        update_max: None,
        ..FieldRule::text("cv", "CV", 0)
    },
    FieldRule {
        create_max: None,
        ..FieldRule::text("cvFilename", "CV file name", CV_FILENAME_MAX_CHARS)
    },
];

/// Look up the rule for a wire field name.
pub fn rule_for(field: &str) -> Option<&'static FieldRule> {
    RULES.iter().find(|r| r.field == field)
}

/// Display label for a field, including protected fields that are never
/// accepted from callers.
pub fn display_label(field: &str) -> &str {
    if let Some(rule) = rule_for(field) {
        return rule.label;
    }
    match field {
        "createdAt" => "Creation date",
        "updatedAt" => "Last modified date",
        "id" => "ID field",
        other => other,
    }
}

// =============================================================================
// VIOLATIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Violation {
    Required,
    Empty,
    NotText,
    TooShort(usize),
    TooLong(usize),
    InvalidEmail,
    NotBinary,
    TooLarge,
    NotAllowed,
}

impl Violation {
    fn message(&self, label: &str) -> String {
        match self {
            Violation::Required => format!("{label} is required"),
            Violation::Empty => format!("{label} cannot be empty"),
            Violation::NotText => format!("{label} must be text."),
            Violation::TooShort(min) => format!("{label} must be at least {min} characters"),
            Violation::TooLong(max) => format!("{label} cannot exceed {max} characters"),
            Violation::InvalidEmail => format!("{label} format is not valid"),
            Violation::NotBinary => format!("{label} must be a PDF or DOCX file"),
            Violation::TooLarge => format!(
                "{label} file cannot exceed {} MB",
                MAX_CV_BYTES / (1024 * 1024)
            ),
            Violation::NotAllowed => format!("{label} cannot be modified."),
        }
    }
}

enum Extracted {
    Text(String),
    Binary(Vec<u8>),
}

fn check_text(rule: &FieldRule, mode: Mode, value: &Value) -> Result<String, Violation> {
    let text = value.as_str().ok_or(Violation::NotText)?;
    let len = text.chars().count();

    if len == 0 && (rule.min > 0 || rule.kind == Kind::Email) {
        return Err(Violation::Empty);
    }
    if len < rule.min {
        return Err(Violation::TooShort(rule.min));
    }
    if let Some(max) = rule.max(mode) {
        if len > max {
            return Err(Violation::TooLong(max));
        }
    }
    if rule.kind == Kind::Email && !is_valid_email(text) {
        return Err(Violation::InvalidEmail);
    }
    Ok(text.to_string())
}

fn check_binary(payload: &CandidatePayload) -> Result<Option<Vec<u8>>, Violation> {
    let bytes = match (payload.cv_bytes(), payload.get("cv")) {
        (Some(bytes), _) => bytes.to_vec(),
        (None, None | Some(Value::Null)) => return Ok(None),
        (None, Some(value)) => decode_blob(value).map_err(|_| Violation::NotBinary)?,
    };
    // Zero bytes means nothing was uploaded.
    if bytes.is_empty() {
        return Ok(None);
    }
    if bytes.len() > MAX_CV_BYTES {
        return Err(Violation::TooLarge);
    }
    Ok(Some(bytes))
}

fn check_field(
    rule: &FieldRule,
    mode: Mode,
    payload: &CandidatePayload,
) -> Result<Option<Extracted>, Violation> {
    if rule.kind == Kind::Binary {
        return Ok(check_binary(payload)?.map(Extracted::Binary));
    }

    match payload.get(rule.field) {
        None | Some(Value::Null) => match rule.presence(mode) {
            Presence::Required => Err(Violation::Required),
            Presence::Optional => Ok(None),
        },
        Some(value) => check_text(rule, mode, value).map(|t| Some(Extracted::Text(t))),
    }
}

/// Syntactic email check: `local@domain.tld`, no leading, trailing or
/// doubled dots.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

// =============================================================================
// EVALUATION
// =============================================================================

struct Checked {
    values: BTreeMap<&'static str, Extracted>,
    errors: FieldErrors,
}

impl Checked {
    fn evaluate(mode: Mode, payload: &CandidatePayload) -> Self {
        let mut values = BTreeMap::new();
        let mut errors = FieldErrors::new();

        for rule in RULES {
            match check_field(rule, mode, payload) {
                Ok(Some(value)) => {
                    values.insert(rule.field, value);
                }
                Ok(None) => {}
                Err(violation) => {
                    errors.insert(rule.field, violation.message(rule.label));
                }
            }
        }

        Self { values, errors }
    }

    fn text(&mut self, field: &str) -> Option<String> {
        match self.values.remove(field) {
            Some(Extracted::Text(t)) => Some(t),
            _ => None,
        }
    }

    fn binary(&mut self, field: &str) -> Option<CvBlob> {
        match self.values.remove(field) {
            Some(Extracted::Binary(b)) => Some(CvBlob::new(b)),
            _ => None,
        }
    }
}

/// Validate a create payload.
///
/// Unrecognised keys are ignored. A `cvFilename` without a CV is dropped.
pub fn validate_create(payload: &CandidatePayload) -> Result<NewCandidate, Invalid> {
    let mut checked = Checked::evaluate(Mode::Create, payload);
    if !checked.errors.is_empty() {
        return Err(Invalid {
            errors: checked.errors,
            unknown_fields: Vec::new(),
        });
    }

    let cv = checked.binary("cv");
    let cv_filename = normalize_filename(checked.text("cvFilename")).filter(|_| cv.is_some());

    Ok(NewCandidate {
        document: checked.text("document").unwrap_or_default(),
        first_name: checked.text("firstName").unwrap_or_default(),
        last_name: checked.text("lastName").unwrap_or_default(),
        email: checked.text("email").unwrap_or_default(),
        phone: checked.text("phone"),
        address: checked.text("address"),
        education: checked.text("education"),
        experience: checked.text("experience"),
        cv,
        cv_filename,
    })
}

/// Validate an update payload addressed to `target`.
///
/// The payload must restate `target` as its `document`; any other value is
/// rejected because the natural key is immutable. Keys outside [`RULES`]
/// are rejected and listed in [`Invalid::unknown_fields`].
pub fn validate_update(
    target: &str,
    payload: &CandidatePayload,
) -> Result<CandidatePatch, Invalid> {
    let mut checked = Checked::evaluate(Mode::Update, payload);

    if let Some(Extracted::Text(document)) = checked.values.get("document") {
        if document != target {
            checked
                .errors
                .insert("document", Violation::NotAllowed.message(display_label("document")));
        }
    }

    let mut unknown_fields = Vec::new();
    for key in payload.fields().keys() {
        if rule_for(key).is_none() {
            checked
                .errors
                .insert(key.clone(), Violation::NotAllowed.message(display_label(key)));
            unknown_fields.push(key.clone());
        }
    }

    if !checked.errors.is_empty() {
        return Err(Invalid {
            errors: checked.errors,
            unknown_fields,
        });
    }

    Ok(CandidatePatch {
        first_name: checked.text("firstName"),
        last_name: checked.text("lastName"),
        email: checked.text("email"),
        phone: checked.text("phone"),
        address: checked.text("address"),
        education: checked.text("education"),
        experience: checked.text("experience"),
        cv: checked.binary("cv"),
        cv_filename: normalize_filename(checked.text("cvFilename")),
    })
}
