//! Pipeline stages for image-to-Perseus question extraction.
//!
//! Each submodule implements one transformation step and is tested on its
//! own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ normalize ──▶ reshape ──▶ validate ──▶ perseus ──▶ upload
//! (path/URL) (base64)  (VLM)   (JSON/literal) (heuristics) (rules)   (widgets)   (CMS)
//! ```
//!
//! 1. [`input`]     — read a local image or download it from a URL
//! 2. [`encode`]    — sniff the format, downscale if needed, base64-wrap
//! 3. [`llm`]       — the model call with timeout, retry and backoff
//! 4. [`normalize`] — ordered reply parsers ([`literal`] covers Python-style
//!    structures)
//! 5. [`reshape`]   — optional named transforms, audited
//! 6. [`validate`]  — option-count, answer-index and empty-text rules
//! 7. [`perseus`]   — graded and reveal radio widgets, deterministic JSON
//! 8. [`upload`]    — authenticated POST to the exercise endpoint

pub mod encode;
pub mod input;
pub mod literal;
pub mod llm;
pub mod normalize;
pub mod perseus;
pub mod reshape;
pub mod upload;
pub mod validate;
