//! # edgequake-mcq
//!
//! Extract multiple-choice questions from images with a Vision Language
//! Model and turn them into Perseus quiz items.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Image
//!  │
//!  ├─ 1. Input      local file or URL
//!  ├─ 2. Encode     sniff format, downscale, base64
//!  ├─ 3. VLM        JSON array of {question, options, answer_index}
//!  ├─ 4. Normalise  strict JSON → literal structure → embedded array
//!  ├─ 5. Reshape    numbered-statement reflow, optional combinator rewrite
//!  ├─ 6. Validate   option count, answer index, non-empty text
//!  ├─ 7. Perseus    graded radio widget + reveal hint
//!  └─ 8. Upload     POST to {base}/exercise/{id}/questions (optional)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_mcq::{ExtractionConfig, Pipeline, QuestionStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let pipeline = Pipeline::new(ExtractionConfig::default())?;
//!     let mut store = QuestionStore::new();
//!     let run = pipeline.extract(&["questions.png".to_string()], &mut store).await;
//!     eprintln!("{} accepted, {} rejected",
//!         run.stats.accepted_questions,
//!         run.stats.rejected_questions);
//!     println!("{}", store.to_json()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Builds the `mcq2perseus` binary (clap, indicatif, tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-mcq = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod question;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{BatchJob, Manifest, ManifestRow, RowError};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ItemError, McqError};
pub use extract::{resolve_provider, Pipeline, ReplyProcessor};
pub use output::{ImageReport, QuestionOutcome, RunOutput, RunStats};
pub use pipeline::normalize::{normalize_reply, ParseFailure};
pub use pipeline::perseus::{to_perseus, HintConfig, PerseusDocument};
pub use pipeline::reshape::{ReshapeConfig, Reshaper};
pub use pipeline::upload::{ExerciseId, UploadClient, UploadConfig, UploadOutcome};
pub use pipeline::validate::{validate, ValidationRules};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use question::{QuestionRecord, Rejection, ValidatedQuestion, Validity};
pub use store::QuestionStore;
