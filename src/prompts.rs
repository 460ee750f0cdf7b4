//! Prompts for VLM-based question extraction.
//!
//! Every prompt lives here so the reply contract (a bare JSON array with
//! `question`, `options`, `answer_index`) is stated in one place, next to
//! the constants that [`crate::pipeline::normalize`] relies on. Callers can
//! override the system prompt via
//! [`crate::config::ExtractionConfig::prompt`]; an override must keep the
//! same output contract.

/// Default system prompt for extracting MCQs from an image.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are an expert at transcribing multiple-choice questions (MCQs) from images of exam papers, worksheets and textbooks.

Extract every multiple-choice question visible in the image.

For each question produce an object with exactly these keys:
  "question"      the full question text, exactly as printed. If the question lists numbered statements, keep each statement on its own line, prefixed with its number.
  "options"       an array with the text of each answer option, in the printed order, WITHOUT the option label (drop "A.", "(b)", "iii)" and similar).
  "answer_index"  the zero-based index of the correct option if it is marked or can be determined with certainty; otherwise -1.

Rules:
  - Preserve wording, numbers, units and symbols. Write mathematical notation with LaTeX between $ signs.
  - Do not invent questions, options or answers that are not in the image.
  - Skip content that is not a multiple-choice question.

Output ONLY a JSON array of these objects, e.g.
[{"question": "2 + 2 = ?", "options": ["3", "4", "5", "6"], "answer_index": 1}]
Output [] if the image contains no multiple-choice questions.
Do NOT wrap the array in ``` fences and do NOT add commentary."#;

/// Text of the user turn that carries the image.
pub const USER_INSTRUCTION: &str =
    "Extract all multiple-choice questions from this image as a JSON array.";
