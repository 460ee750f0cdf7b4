//! Error types for the edgequake-mcq library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`McqError`] — **Fatal**: the run cannot start or cannot finish at all
//!   (missing credentials, unreadable manifest, provider not configured).
//!   Returned as `Err(McqError)` from the top-level entry points, always
//!   before any image has been sent to the model when it is a configuration
//!   problem.
//!
//! * [`ItemError`] — **Non-fatal**: a single image failed (download error,
//!   transient API error, unparseable reply) but every other image is fine.
//!   Stored inside [`crate::output::ImageReport`] so callers can list what
//!   failed without losing the rest of the batch.
//!
//! Question-level problems are finer still: validation rejections live in
//! [`crate::question::Rejection`] and upload results in
//! [`crate::pipeline::upload::UploadOutcome`], both attached to the
//! individual question.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-mcq library.
#[derive(Debug, Error)]
pub enum McqError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// A required setting (credential, endpoint) was not supplied.
    #[error("Missing required configuration '{name}'.\n{hint}")]
    MissingConfig { name: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// An exercise identifier was not a positive integer.
    #[error("Invalid exercise id '{input}': expected a positive integer")]
    InvalidExerciseId { input: String },

    /// The batch manifest could not be read or has the wrong columns.
    #[error("Invalid batch manifest '{path}': {detail}")]
    InvalidManifest { path: PathBuf, detail: String },

    /// A manual question entry failed validation.
    #[error("Question rejected: {0}")]
    Rejected(#[from] crate::question::Rejection),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artefact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialising an artefact failed.
    #[error("Failed to serialise output: {0}")]
    Serialise(#[from] serde_json::Error),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image.
///
/// Stored in [`crate::output::ImageReport::error`]. The run continues with
/// the next image.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ItemError {
    /// The image could not be read from disk or downloaded.
    #[error("{source_name}: could not load image: {detail}")]
    ImageLoad { source_name: String, detail: String },

    /// The bytes are not a supported image, or re-encoding failed.
    #[error("{source_name}: image encoding failed: {detail}")]
    Encode { source_name: String, detail: String },

    /// The completion service failed after all retries.
    #[error("{source_name}: extraction failed after {retries} retries: {detail}")]
    ExtractionTransport {
        source_name: String,
        retries: u32,
        detail: String,
    },

    /// The model replied, but no parser strategy could read the reply.
    ///
    /// `raw` keeps the full reply so an operator can recover it by hand.
    #[error("{source_name}: could not parse model reply ({detail})")]
    Parse {
        source_name: String,
        detail: String,
        raw: String,
    },

    /// A batch row named an image that was not supplied.
    #[error("row {row}: image '{filename}' not found")]
    UnknownImage { row: usize, filename: String },

    /// A batch row carried an exercise id that is not a positive integer.
    #[error("row {row}: invalid exercise id '{input}'")]
    InvalidExerciseId { row: usize, input: String },

    /// A batch row could not be read (missing field, bad encoding).
    #[error("row {row}: malformed manifest row: {detail}")]
    MalformedRow { row: usize, detail: String },
}

impl ItemError {
    /// Raw model reply preserved for manual recovery, if any.
    pub fn raw_reply(&self) -> Option<&str> {
        match self {
            ItemError::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_display() {
        let e = McqError::MissingConfig {
            name: "MCQ_UPLOAD_TOKEN".into(),
            hint: "Set it in the environment.".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("MCQ_UPLOAD_TOKEN"), "got: {msg}");
    }

    #[test]
    fn invalid_exercise_display() {
        let e = McqError::InvalidExerciseId { input: "abc".into() };
        assert!(e.to_string().contains("'abc'"));
    }

    #[test]
    fn parse_error_keeps_raw_reply() {
        let e = ItemError::Parse {
            source_name: "page.png".into(),
            detail: "strict-json: expected value".into(),
            raw: "Sorry, I cannot read this image.".into(),
        };
        assert_eq!(e.raw_reply(), Some("Sorry, I cannot read this image."));
        assert!(e.to_string().contains("page.png"));
    }

    #[test]
    fn transport_error_has_no_raw_reply() {
        let e = ItemError::ExtractionTransport {
            source_name: "a.jpg".into(),
            retries: 3,
            detail: "timeout".into(),
        };
        assert!(e.raw_reply().is_none());
        assert!(e.to_string().contains("3 retries"));
    }

    #[test]
    fn batch_row_errors_name_the_row() {
        let e = ItemError::UnknownImage {
            row: 4,
            filename: "missing.png".into(),
        };
        assert!(e.to_string().starts_with("row 4"));
    }
}
