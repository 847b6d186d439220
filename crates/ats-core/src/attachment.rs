//! CV attachment normalization.
//!
//! A CV can reach the service in several shapes: raw bytes from a multipart
//! upload, base64 text in a JSON body, a plain array of byte values, or the
//! tagged `{"type": "Buffer", "data": [...]}` object that some JavaScript
//! clients produce when they serialize a binary buffer. Everything in this
//! module collapses those shapes into a single [`CvBlob`] so the rest of the
//! crate only ever handles a canonical byte sequence.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::defaults::{DEFAULT_CV_FILENAME, MAX_FILENAME_CHARS, MIME_PDF, MIME_WORD};
use crate::error::{Error, Result};
use crate::models::Candidate;

/// Raw CV file contents.
///
/// Serializes as standard base64 text. Deserializes from any shape accepted
/// by [`decode_blob`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CvBlob(Vec<u8>);

impl CvBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for CvBlob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for CvBlob {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for CvBlob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Never dump file contents into logs.
impl fmt::Debug for CvBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CvBlob({} bytes)", self.0.len())
    }
}

impl Serialize for CvBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for CvBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        decode_blob(&value)
            .map(CvBlob)
            .map_err(serde::de::Error::custom)
    }
}

/// Decode a JSON representation of binary data into bytes.
///
/// Accepted shapes:
/// - base64 text, optionally prefixed with a `data:<mime>;base64,` header
/// - an array of integers in `0..=255`
/// - an object carrying such an array under `data`, with `type` either
///   absent or equal to `"Buffer"`
pub fn decode_blob(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::String(text) => {
            let encoded = match text.split_once(";base64,") {
                Some((header, rest)) if header.starts_with("data:") => rest,
                _ => text.as_str(),
            };
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| Error::Serialization(format!("invalid base64 attachment: {e}")))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| {
                        Error::Serialization("attachment array must contain bytes".to_string())
                    })
            })
            .collect(),
        Value::Object(map) => {
            let tagged = match map.get("type") {
                None => true,
                Some(Value::String(tag)) => tag == "Buffer",
                Some(_) => false,
            };
            match map.get("data") {
                Some(data @ Value::Array(_)) if tagged => decode_blob(data),
                _ => Err(Error::Serialization(
                    "attachment object must be a tagged byte buffer".to_string(),
                )),
            }
        }
        _ => Err(Error::Serialization(
            "attachment must be base64 text or a byte array".to_string(),
        )),
    }
}

/// Resolve the MIME type served for a CV from its file name.
///
/// Only the extension is considered, case-insensitively. Word documents map
/// to the OOXML type; anything unrecognised is served as PDF.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => MIME_PDF,
        "doc" | "docx" => MIME_WORD,
        _ => MIME_PDF,
    }
}

/// Make a file name safe for a `Content-Disposition` header.
///
/// Strips directory components, replaces quotes, reserved characters and
/// control characters with `_`, and caps the length while keeping the
/// extension. An empty result falls back to the default CV name.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | ';' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return DEFAULT_CV_FILENAME.to_string();
    }

    let total = sanitized.chars().count();
    if total <= MAX_FILENAME_CHARS {
        return sanitized.to_string();
    }

    match sanitized.rfind('.') {
        Some(dot) if sanitized[dot..].chars().count() < MAX_FILENAME_CHARS => {
            let ext = &sanitized[dot..];
            let keep = MAX_FILENAME_CHARS - ext.chars().count();
            let stem: String = sanitized[..dot].chars().take(keep).collect();
            format!("{stem}{ext}")
        }
        _ => sanitized.chars().take(MAX_FILENAME_CHARS).collect(),
    }
}

/// Normalize a submitted CV file name: blank names count as absent.
pub(crate) fn normalize_filename(name: Option<String>) -> Option<String> {
    name.filter(|n| !n.trim().is_empty())
}

/// A CV resolved for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvDownload {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl CvDownload {
    /// Resolve the download for a stored candidate, if it has a CV.
    ///
    /// Uses the stored file name when present, otherwise
    /// [`DEFAULT_CV_FILENAME`].
    pub fn from_candidate(candidate: Candidate) -> Option<Self> {
        let blob = candidate.cv?;
        let filename = candidate
            .cv_filename
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CV_FILENAME.to_string());
        let content_type = content_type_for(&filename);

        Some(Self {
            filename,
            content_type,
            bytes: blob.into_bytes(),
        })
    }

    /// `Content-Disposition` header value for this download.
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", sanitize_filename(&self.filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn candidate_with_cv(cv: Option<Vec<u8>>, cv_filename: Option<&str>) -> Candidate {
        let now = Utc::now();
        Candidate {
            document: "12345678A".to_string(),
            first_name: "María".to_string(),
            last_name: "González".to_string(),
            email: "maria@x.com".to_string(),
            phone: None,
            address: None,
            education: None,
            experience: None,
            cv: cv.map(CvBlob::new),
            cv_filename: cv_filename.map(String::from),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_decode_blob_base64() {
        let bytes = decode_blob(&json!("JVBERg==")).unwrap();
        assert_eq!(bytes, vec![0x25, 0x50, 0x44, 0x46]);
    }

    #[test]
    fn test_decode_blob_data_url() {
        let bytes = decode_blob(&json!("data:application/pdf;base64,JVBERg==")).unwrap();
        assert_eq!(bytes, b"%PDF");
    }

    #[test]
    fn test_decode_blob_byte_array() {
        let bytes = decode_blob(&json!([37, 80, 68, 70])).unwrap();
        assert_eq!(bytes, b"%PDF");
    }

    #[test]
    fn test_decode_blob_tagged_buffer() {
        let bytes = decode_blob(&json!({"type": "Buffer", "data": [37, 80, 68, 70]})).unwrap();
        assert_eq!(bytes, b"%PDF");
    }

    #[test]
    fn test_decode_blob_rejects_out_of_range_bytes() {
        assert!(decode_blob(&json!([1, 256])).is_err());
        assert!(decode_blob(&json!([-1])).is_err());
        assert!(decode_blob(&json!(["a"])).is_err());
    }

    #[test]
    fn test_decode_blob_rejects_other_shapes() {
        assert!(decode_blob(&json!(42)).is_err());
        assert!(decode_blob(&json!(true)).is_err());
        assert!(decode_blob(&json!("not base64!!")).is_err());
        assert!(decode_blob(&json!({"type": "Blob", "data": [1]})).is_err());
        assert!(decode_blob(&json!({"type": "Buffer"})).is_err());
    }

    #[test]
    fn test_cv_blob_serializes_as_base64() {
        let blob = CvBlob::new(b"%PDF".to_vec());
        assert_eq!(serde_json::to_value(&blob).unwrap(), json!("JVBERg=="));
    }

    #[test]
    fn test_cv_blob_deserializes_tagged_buffer() {
        let blob: CvBlob =
            serde_json::from_value(json!({"type": "Buffer", "data": [1, 2, 3]})).unwrap();
        assert_eq!(blob.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_cv_blob_debug_hides_contents() {
        let blob = CvBlob::new(vec![0u8; 42]);
        assert_eq!(format!("{:?}", blob), "CvBlob(42 bytes)");
    }

    #[test]
    fn test_content_type_for_extensions() {
        assert_eq!(content_type_for("cv.pdf"), MIME_PDF);
        assert_eq!(content_type_for("CV.PDF"), MIME_PDF);
        assert_eq!(content_type_for("resume.docx"), MIME_WORD);
        assert_eq!(content_type_for("resume.DOC"), MIME_WORD);
        assert_eq!(content_type_for("notes.txt"), MIME_PDF);
        assert_eq!(content_type_for("no_extension"), MIME_PDF);
    }

    #[test]
    fn test_sanitize_removes_path() {
        assert_eq!(sanitize_filename("/etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cv.pdf"), "cv.pdf");
    }

    #[test]
    fn test_sanitize_replaces_header_breaking_chars() {
        assert_eq!(sanitize_filename("my\"cv\".pdf"), "my_cv_.pdf");
        assert_eq!(sanitize_filename("a\r\nb.pdf"), "a__b.pdf");
        assert_eq!(sanitize_filename("x;y.pdf"), "x_y.pdf");
    }

    #[test]
    fn test_sanitize_empty_falls_back_to_default() {
        assert_eq!(sanitize_filename(""), DEFAULT_CV_FILENAME);
        assert_eq!(sanitize_filename("   "), DEFAULT_CV_FILENAME);
        assert_eq!(sanitize_filename("dir/"), DEFAULT_CV_FILENAME);
    }

    #[test]
    fn test_sanitize_truncates_long_names_keeping_extension() {
        let long_name = format!("{}.docx", "á".repeat(300));
        let sanitized = sanitize_filename(&long_name);
        assert_eq!(sanitized.chars().count(), MAX_FILENAME_CHARS);
        assert!(sanitized.ends_with(".docx"));
    }

    #[test]
    fn test_download_round_trip() {
        let candidate = candidate_with_cv(Some(vec![0x25, 0x50, 0x44, 0x46]), Some("cv.pdf"));
        let download = CvDownload::from_candidate(candidate).unwrap();
        assert_eq!(download.content_type, MIME_PDF);
        assert_eq!(download.filename, "cv.pdf");
        assert_eq!(download.bytes, vec![0x25, 0x50, 0x44, 0x46]);
    }

    #[test]
    fn test_download_defaults_filename() {
        let candidate = candidate_with_cv(Some(vec![1, 2, 3]), None);
        let download = CvDownload::from_candidate(candidate).unwrap();
        assert_eq!(download.filename, DEFAULT_CV_FILENAME);
        assert_eq!(download.content_type, MIME_PDF);
    }

    #[test]
    fn test_download_word_document() {
        let candidate = candidate_with_cv(Some(vec![1]), Some("Resume.DOCX"));
        let download = CvDownload::from_candidate(candidate).unwrap();
        assert_eq!(download.content_type, MIME_WORD);
        assert_eq!(
            download.content_disposition(),
            "attachment; filename=\"Resume.DOCX\""
        );
    }

    #[test]
    fn test_download_without_cv_is_none() {
        let candidate = candidate_with_cv(None, Some("cv.pdf"));
        assert!(CvDownload::from_candidate(candidate).is_none());
    }

    #[test]
    fn test_normalize_filename_drops_blank() {
        assert_eq!(normalize_filename(Some("  ".to_string())), None);
        assert_eq!(normalize_filename(None), None);
        assert_eq!(
            normalize_filename(Some("cv.pdf".to_string())),
            Some("cv.pdf".to_string())
        );
    }
}
