//! Schema validation errors.

use thiserror::Error;

/// Raised when external review input fails deserialization or a range check.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// JSON was malformed or did not match the review shape.
    #[error("invalid review JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A numeric field fell outside its allowed range.
    #[error("{field} out of range: got {got}, expected {expected}")]
    OutOfRange {
        field: &'static str,
        got: i64,
        expected: &'static str,
    },

    /// `grippy_note` exceeded the 280-character budget.
    #[error("grippy_note too long: {0} chars (max 280)")]
    NoteTooLong(usize),
}
