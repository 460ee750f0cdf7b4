//! Result types returned by the pipeline.
//!
//! One [`ImageReport`] per input image, holding one [`QuestionOutcome`] per
//! parsed record. Reports are plain data (`Serialize`/`Deserialize`) so the
//! CLI can dump a whole run as JSON.

use crate::error::ItemError;
use crate::pipeline::perseus::PerseusDocument;
use crate::pipeline::reshape::AuditEntry;
use crate::pipeline::upload::{ExerciseId, UploadOutcome};
use crate::question::{QuestionRecord, Rejection, Validity};
use serde::{Deserialize, Serialize};

/// What happened to one parsed question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    /// 1-based position within the image's reply.
    pub position: usize,

    /// The record after reshaping.
    pub record: QuestionRecord,

    /// Rendered question prose, before the widget placeholder.
    pub content: String,

    /// Transforms that fired, in order.
    pub audit: Vec<AuditEntry>,

    pub validity: Validity,

    /// Present when `validity` is not `Valid`.
    pub rejection: Option<Rejection>,

    /// Present when `validity` is `Valid`.
    pub document: Option<PerseusDocument>,

    /// Present when an upload was attempted.
    pub upload: Option<UploadOutcome>,
}

impl QuestionOutcome {
    pub fn is_accepted(&self) -> bool {
        self.document.is_some()
    }

    pub fn is_uploaded(&self) -> bool {
        self.upload.as_ref().is_some_and(UploadOutcome::is_success)
    }
}

/// Everything produced for one input image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReport {
    /// 1-based position in the run's input order.
    pub index: usize,

    /// File name or URL segment.
    pub source: String,

    /// 1-based manifest data row, for batch runs.
    pub row: Option<usize>,

    /// Target exercise, when uploading.
    pub exercise: Option<ExerciseId>,

    pub questions: Vec<QuestionOutcome>,

    /// The model's reply, kept whether or not it parsed.
    pub raw_reply: Option<String>,

    pub input_tokens: u64,
    pub output_tokens: u64,
    pub retries: u32,
    pub duration_ms: u64,

    /// Set when the image failed before any question could be classified.
    pub error: Option<ItemError>,
}

impl ImageReport {
    pub fn new(index: usize, source: impl Into<String>) -> Self {
        Self {
            index,
            source: source.into(),
            row: None,
            exercise: None,
            questions: Vec::new(),
            raw_reply: None,
            input_tokens: 0,
            output_tokens: 0,
            retries: 0,
            duration_ms: 0,
            error: None,
        }
    }

    /// A report for an image that failed with `error`.
    pub fn failed(index: usize, source: impl Into<String>, error: ItemError) -> Self {
        let mut report = Self::new(index, source);
        report.error = Some(error);
        report
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn accepted(&self) -> impl Iterator<Item = &QuestionOutcome> {
        self.questions.iter().filter(|q| q.is_accepted())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &QuestionOutcome> {
        self.questions.iter().filter(|q| !q.is_accepted())
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: usize,
    pub total_questions: usize,
    pub accepted_questions: usize,
    pub rejected_questions: usize,
    pub uploaded_questions: usize,
    pub upload_failures: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

impl RunStats {
    pub fn from_reports(reports: &[ImageReport], total_duration_ms: u64) -> Self {
        let mut stats = RunStats {
            total_images: reports.len(),
            total_duration_ms,
            ..Default::default()
        };
        for report in reports {
            if report.is_ok() {
                stats.processed_images += 1;
            } else {
                stats.failed_images += 1;
            }
            stats.total_input_tokens += report.input_tokens;
            stats.total_output_tokens += report.output_tokens;
            for q in &report.questions {
                stats.total_questions += 1;
                if q.is_accepted() {
                    stats.accepted_questions += 1;
                } else {
                    stats.rejected_questions += 1;
                }
                match &q.upload {
                    Some(outcome) if outcome.is_success() => stats.uploaded_questions += 1,
                    Some(_) => stats.upload_failures += 1,
                    None => {}
                }
            }
        }
        stats
    }
}

/// Reports for every image, in input order, plus totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub images: Vec<ImageReport>,
    pub stats: RunStats,
}
