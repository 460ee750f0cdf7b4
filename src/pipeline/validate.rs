//! Structural validation of parsed question records.
//!
//! Rules run in a fixed order and the first failure wins:
//!
//! 1. option count within the configured range
//! 2. answer index known (non-negative) and in bounds
//! 3. question and every option non-empty after trimming
//!
//! The option-count range is a parameter because the CMS needs exactly four
//! choices while display-only runs happily show two to eight.

use crate::question::{QuestionRecord, Rejection, ValidatedQuestion, Validity};
use serde::{Deserialize, Serialize};

/// Accepted option-count range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRules {
    pub min_options: usize,
    pub max_options: usize,
}

impl ValidationRules {
    pub const fn exactly(n: usize) -> Self {
        Self {
            min_options: n,
            max_options: n,
        }
    }

    pub const fn between(min_options: usize, max_options: usize) -> Self {
        Self {
            min_options,
            max_options,
        }
    }

    /// Exactly four options, as the CMS requires.
    pub const fn submission() -> Self {
        Self::exactly(4)
    }

    /// Two to eight options, for extraction-only runs.
    pub const fn display() -> Self {
        Self::between(2, 8)
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::submission()
    }
}

/// Check `record` against `rules`.
pub fn validate(
    record: &QuestionRecord,
    rules: &ValidationRules,
) -> Result<ValidatedQuestion, Rejection> {
    let found = record.options.len();
    if found < rules.min_options || found > rules.max_options {
        return Err(Rejection::OptionCount {
            min: rules.min_options,
            max: rules.max_options,
            found,
        });
    }

    if record.answer_index < 0 {
        return Err(Rejection::AnswerUnknown {
            index: record.answer_index,
        });
    }
    let answer = record.answer_index as usize;
    if answer >= found {
        return Err(Rejection::AnswerOutOfRange {
            index: record.answer_index,
            options: found,
        });
    }

    if record.question.trim().is_empty() {
        return Err(Rejection::EmptyQuestion);
    }
    if let Some(position) = record.options.iter().position(|o| o.trim().is_empty()) {
        return Err(Rejection::EmptyOption { position });
    }

    Ok(ValidatedQuestion::new_unchecked(record.clone(), answer))
}

/// Validity code without keeping the validated value.
pub fn classify(record: &QuestionRecord, rules: &ValidationRules) -> Validity {
    match validate(record, rules) {
        Ok(_) => Validity::Valid,
        Err(rejection) => rejection.validity(),
    }
}
