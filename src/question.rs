//! Question records as they move through the pipeline.
//!
//! * [`QuestionRecord`] — what the model said, after syntactic parsing. May
//!   violate every invariant; nothing is checked yet.
//! * [`ValidatedQuestion`] — a record that passed
//!   [`crate::pipeline::validate::validate`]. It can only be built there, so
//!   holding one is proof the invariants hold.
//! * [`Rejection`] — why a record did not pass, with a stable [`Validity`]
//!   code for reporting.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel `answer_index` meaning "the model did not know the answer".
pub const ANSWER_UNKNOWN: i64 = -1;

/// One extracted question, exactly as parsed from the model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question: String,
    pub options: Vec<String>,
    /// Zero-based index into `options`, or [`ANSWER_UNKNOWN`].
    pub answer_index: i64,
}

impl QuestionRecord {
    pub fn new(question: impl Into<String>, options: Vec<String>, answer_index: i64) -> Self {
        Self {
            question: question.into(),
            options,
            answer_index,
        }
    }
}

/// A record whose option count, answer index and text have been checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedQuestion {
    record: QuestionRecord,
    answer: usize,
}

impl ValidatedQuestion {
    /// Only the validator constructs these.
    pub(crate) fn new_unchecked(record: QuestionRecord, answer: usize) -> Self {
        Self { record, answer }
    }

    pub fn question(&self) -> &str {
        &self.record.question
    }

    pub fn options(&self) -> &[String] {
        &self.record.options
    }

    /// Index of the correct option, guaranteed in bounds.
    pub fn answer(&self) -> usize {
        self.answer
    }

    pub fn correct_option(&self) -> &str {
        &self.record.options[self.answer]
    }

    pub fn record(&self) -> &QuestionRecord {
        &self.record
    }

    pub fn into_record(self) -> QuestionRecord {
        self.record
    }
}

/// Validity code carried for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    Valid,
    InvalidOptionCount,
    InvalidAnswerIndex,
    AnswerUnknown,
    EmptyText,
}

/// Why a record failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    #[error("expected {min}–{max} options, found {found}")]
    OptionCount { min: usize, max: usize, found: usize },

    #[error("answer is unknown (answer_index = {index})")]
    AnswerUnknown { index: i64 },

    #[error("answer_index {index} is out of range for {options} options")]
    AnswerOutOfRange { index: i64, options: usize },

    #[error("question text is empty")]
    EmptyQuestion,

    #[error("option {position} is empty")]
    EmptyOption { position: usize },
}

impl Rejection {
    pub fn validity(&self) -> Validity {
        match self {
            Rejection::OptionCount { .. } => Validity::InvalidOptionCount,
            Rejection::AnswerUnknown { .. } => Validity::AnswerUnknown,
            Rejection::AnswerOutOfRange { .. } => Validity::InvalidAnswerIndex,
            Rejection::EmptyQuestion | Rejection::EmptyOption { .. } => Validity::EmptyText,
        }
    }
}
