//! Failure classification.
//!
//! The Atlas API has no reliable typed error contract: the only signals are
//! an optional HTTP status, an optional error code and free text. Every
//! retry decision in the crate goes through [`classify`], so the matching
//! rules can be hardened here without touching the loops.

use atlas_core::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Server-side fault. Retrying the same call is expected to succeed.
    Transient,
    /// The addressed object does not exist. What that means depends on the
    /// caller: success for a delete, "not yet visible" for a fresh create.
    NotFoundExisting,
    /// Anything else. Not retried.
    PermanentFailure,
}

impl ErrorCategory {
    pub fn is_transient(self) -> bool {
        self == Self::Transient
    }
}

const TRANSIENT_STATUS: &str = "500";
const NOT_FOUND_STATUS: &str = "404";

const TRANSIENT_MARKERS: &[&str] = &["Unexpected error", "UNEXPECTED_ERROR"];

const NOT_FOUND_MARKERS: &[&str] = &[
    "ATLAS_ACCESS_LIST_NOT_FOUND",
    "ATLAS_NETWORK_PERMISSION_ENTRY_NOT_FOUND",
    "RESTORE_JOB_NOT_FOUND",
];

/// Classify a failed API call. Server faults win over not-found.
///
/// A structured status is authoritative for the numeric part: messages
/// often embed request URLs, and object ids in them can contain "500" or
/// "404". Only the error code and message are searched for text markers.
pub fn classify(err: &ApiError) -> ErrorCategory {
    let Some(status) = err.status else {
        return classify_text(&err.to_string());
    };
    if (500..=599).contains(&status) {
        return ErrorCategory::Transient;
    }

    let code = err.code.as_deref().unwrap_or_default();
    let has = |markers: &[&str]| {
        markers
            .iter()
            .any(|m| code.contains(m) || err.message.contains(m))
    };
    if has(TRANSIENT_MARKERS) {
        ErrorCategory::Transient
    } else if status == 404 || has(NOT_FOUND_MARKERS) {
        ErrorCategory::NotFoundExisting
    } else {
        ErrorCategory::PermanentFailure
    }
}

/// Classify raw error text by marker substrings. Status numbers only count
/// as standalone tokens.
pub fn classify_text(text: &str) -> ErrorCategory {
    let has = |markers: &[&str]| markers.iter().any(|m| text.contains(m));
    if contains_token(text, TRANSIENT_STATUS) || has(TRANSIENT_MARKERS) {
        ErrorCategory::Transient
    } else if contains_token(text, NOT_FOUND_STATUS) || has(NOT_FOUND_MARKERS) {
        ErrorCategory::NotFoundExisting
    } else {
        ErrorCategory::PermanentFailure
    }
}

/// `token` occurs in `text` with no letter or digit on either side.
fn contains_token(text: &str, token: &str) -> bool {
    text.match_indices(token).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + token.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}
