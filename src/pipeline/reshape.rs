//! Optional text transforms applied to a question before validation.
//!
//! Each heuristic is a named [`QuestionTransform`]; a [`Reshaper`] runs the
//! transforms enabled in [`ReshapeConfig`] in a fixed order and records an
//! [`AuditEntry`] for every one that fired.
//!
//! A transform works on a [`Draft`]: the record plus the prose that will
//! become the rendered question content (before the widget placeholder is
//! appended by [`crate::pipeline::perseus`]). Some transforms change the
//! record itself, others only the rendered content.

use crate::question::{QuestionRecord, ANSWER_UNKNOWN};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Markdown hard line break used between numbered statements.
pub const LINE_BREAK: &str = "  \n";

/// Line appended after the enumerated statements by the combinator rewrite.
pub const FOLLOW_UP_LINE: &str = "Select the correct answer using the code given below:";

/// Replacement option set used by the combinator rewrite.
pub const COMBINATOR_OPTIONS: [&str; 4] = ["1 alone", "1 and 3", "2 and 3", "1, 2 and 3"];

/// A record on its way to serialisation, with its rendered content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub record: QuestionRecord,
    pub content: String,
}

impl Draft {
    pub fn new(record: QuestionRecord) -> Self {
        let content = record.question.trim().to_string();
        Self { record, content }
    }
}

/// A transform that fired, with the record before and after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub transform: String,
    pub before: QuestionRecord,
    pub after: QuestionRecord,
}

/// A named, independently testable question heuristic.
pub trait QuestionTransform: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `None` when the transform does not apply to `draft`.
    fn apply(&self, draft: &Draft) -> Option<Draft>;
}

/// Which heuristics run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReshapeConfig {
    /// Keep numbered statements on separate rendered lines. Default: on.
    pub numbered_reflow: bool,

    /// Rewrite "which of the above" questions with three statement options
    /// into the four-way combinator set. Default: off.
    ///
    /// The rewrite cannot know which combinator is correct. Unless
    /// `which_of_the_above_answer` is set by an operator, rewritten records
    /// get an unknown answer and are rejected by validation.
    pub which_of_the_above: bool,

    /// Operator-confirmed answer index for rewritten records.
    pub which_of_the_above_answer: Option<usize>,
}

impl Default for ReshapeConfig {
    fn default() -> Self {
        Self {
            numbered_reflow: true,
            which_of_the_above: false,
            which_of_the_above_answer: None,
        }
    }
}

/// Ordered set of enabled transforms.
pub struct Reshaper {
    transforms: Vec<Box<dyn QuestionTransform>>,
}

impl Reshaper {
    /// No transforms: content is the trimmed question text.
    pub fn identity() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// The combinator rewrite runs first so a rewritten question is never
    /// mistaken for a numbered list.
    pub fn from_config(config: &ReshapeConfig) -> Self {
        let mut reshaper = Self::identity();
        if config.which_of_the_above {
            reshaper = reshaper.with(Box::new(ImplicitStatementOptionRewrite {
                default_answer: config.which_of_the_above_answer,
            }));
        }
        if config.numbered_reflow {
            reshaper = reshaper.with(Box::new(NumberedStatementReflow));
        }
        reshaper
    }

    pub fn with(mut self, transform: Box<dyn QuestionTransform>) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn reshape(&self, record: QuestionRecord) -> (Draft, Vec<AuditEntry>) {
        let mut draft = Draft::new(record);
        let mut audit = Vec::new();

        for transform in &self.transforms {
            if let Some(next) = transform.apply(&draft) {
                debug!("Transform '{}' applied", transform.name());
                audit.push(AuditEntry {
                    transform: transform.name().to_string(),
                    before: draft.record.clone(),
                    after: next.record.clone(),
                });
                draft = next;
            }
        }

        (draft, audit)
    }
}

// ── NumberedStatementReflow ──────────────────────────────────────────────────

/// Joins numbered statement lines with [`LINE_BREAK`] so renderers that
/// collapse single newlines keep one statement per line.
pub struct NumberedStatementReflow;

impl QuestionTransform for NumberedStatementReflow {
    fn name(&self) -> &'static str {
        "numbered-statement-reflow"
    }

    fn apply(&self, draft: &Draft) -> Option<Draft> {
        let lines: Vec<&str> = non_empty_lines(&draft.content).collect();
        if lines.len() < 2 || !is_numbered_sequence(&lines) {
            return None;
        }
        Some(Draft {
            record: draft.record.clone(),
            content: lines.join(LINE_BREAK),
        })
    }
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Line `i` (1-based) starts with `i`, and the number is not the prefix of
/// a longer one.
fn is_numbered_sequence(lines: &[&str]) -> bool {
    lines.iter().enumerate().all(|(i, line)| {
        line.strip_prefix(&(i + 1).to_string())
            .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_digit()))
    })
}

// ── ImplicitStatementOptionRewrite ───────────────────────────────────────────

static RE_WHICH_OF_THE_ABOVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)which\s+of\s+the\s+above").unwrap());

static RE_COMBINATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)^\s*
          (?:only\s+)?
          (?:\d+|[ivx]+|[a-d])
          (?:\s*(?:,|and|or|&)\s*(?:\d+|[ivx]+|[a-d]))*
          (?:\s+(?:only|alone))?
          \s*\.?\s*$",
    )
    .unwrap()
});

static RE_ALL_NONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(all|none|both|neither)\b.*\b(above|these|them|statements?)\b").unwrap()
});

/// Turns a "which of the above" question whose three options are themselves
/// statements into a numbered statement list with the combinator set.
///
/// Lossy: the correct combinator is a guess unless an operator supplied
/// `default_answer`. Every rewrite is logged.
pub struct ImplicitStatementOptionRewrite {
    pub default_answer: Option<usize>,
}

impl QuestionTransform for ImplicitStatementOptionRewrite {
    fn name(&self) -> &'static str {
        "implicit-statement-option-rewrite"
    }

    fn apply(&self, draft: &Draft) -> Option<Draft> {
        let record = &draft.record;
        if !RE_WHICH_OF_THE_ABOVE.is_match(&record.question) {
            return None;
        }
        if record.options.len() != 3 || !record.options.iter().all(|o| is_prose_statement(o)) {
            return None;
        }

        let statements: Vec<String> = record
            .options
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s.trim()))
            .collect();
        let question = format!(
            "{}\n\n{}\n\n{}",
            record.question.trim(),
            statements.join("\n"),
            FOLLOW_UP_LINE
        );
        let answer_index = self
            .default_answer
            .map(|i| i as i64)
            .unwrap_or(ANSWER_UNKNOWN);

        warn!(
            "Rewrote statement options into combinator set (answer_index = {}): {:?}",
            answer_index,
            record.question.trim()
        );

        let rewritten = QuestionRecord {
            question,
            options: COMBINATOR_OPTIONS.iter().map(|s| s.to_string()).collect(),
            answer_index,
        };
        Some(Draft::new(rewritten))
    }
}

fn is_prose_statement(option: &str) -> bool {
    let option = option.trim();
    !RE_COMBINATOR.is_match(option)
        && !RE_ALL_NONE.is_match(option)
        && option.split_whitespace().count() >= 3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(question: &str, options: &[&str]) -> Draft {
        Draft::new(QuestionRecord::new(
            question,
            options.iter().map(|s| s.to_string()).collect(),
            0,
        ))
    }

    #[test]
    fn numbered_lines_are_reflowed() {
        let out = NumberedStatementReflow
            .apply(&draft("1. Fact A\n2. Fact B", &[]))
            .unwrap();
        assert_eq!(out.content, format!("1. Fact A{LINE_BREAK}2. Fact B"));
    }

    #[test]
    fn blank_lines_between_statements_are_dropped() {
        let out = NumberedStatementReflow
            .apply(&draft("1) Alpha\n\n2) Beta\n3) Gamma", &[]))
            .unwrap();
        assert_eq!(out.content.matches(LINE_BREAK).count(), 2);
    }

    #[test]
    fn plain_question_is_untouched() {
        assert!(NumberedStatementReflow
            .apply(&draft("What is the capital?", &[]))
            .is_none());
    }

    #[test]
    fn numbering_must_start_at_one_and_be_in_order() {
        assert!(NumberedStatementReflow.apply(&draft("2. B\n1. A", &[])).is_none());
        assert!(NumberedStatementReflow
            .apply(&draft("Consider:\n1. A\n2. B", &[]))
            .is_none());
        // "12 apples" is not line 1.
        assert!(NumberedStatementReflow
            .apply(&draft("12 apples\n2 pears", &[]))
            .is_none());
    }

    const STATEMENTS: [&str; 3] = [
        "The Earth orbits the Sun",
        "Water boils at 50 degrees at sea level",
        "Light travels faster than sound",
    ];

    #[test]
    fn which_of_the_above_is_rewritten_with_unknown_answer() {
        let rewrite = ImplicitStatementOptionRewrite { default_answer: None };
        let out = rewrite
            .apply(&draft("Which of the above statements is/are correct?", &STATEMENTS))
            .unwrap();
        assert_eq!(out.record.options, COMBINATOR_OPTIONS);
        assert_eq!(out.record.answer_index, ANSWER_UNKNOWN);
        assert!(out.record.question.contains("1. The Earth orbits the Sun"));
        assert!(out.record.question.contains("3. Light travels faster than sound"));
        assert!(out.record.question.ends_with(FOLLOW_UP_LINE));
    }

    #[test]
    fn operator_answer_is_used() {
        let rewrite = ImplicitStatementOptionRewrite {
            default_answer: Some(1),
        };
        let out = rewrite
            .apply(&draft("WHICH OF THE ABOVE is true?", &STATEMENTS))
            .unwrap();
        assert_eq!(out.record.answer_index, 1);
    }

    #[test]
    fn combinator_options_are_left_alone() {
        let rewrite = ImplicitStatementOptionRewrite { default_answer: None };
        let combinators = ["1 only", "1 and 2", "All of the above"];
        assert!(rewrite
            .apply(&draft("Which of the above are correct?", &combinators))
            .is_none());
        assert!(rewrite
            .apply(&draft("Which of the above are correct?", &["i and ii", "ii only", "iii"]))
            .is_none());
        // Four options: not the three-statement pattern.
        assert!(rewrite
            .apply(&draft(
                "Which of the above?",
                &[STATEMENTS[0], STATEMENTS[1], STATEMENTS[2], "Neither of these statements"]
            ))
            .is_none());
    }

    #[test]
    fn reshaper_defaults_to_reflow_only() {
        let reshaper = Reshaper::from_config(&ReshapeConfig::default());
        assert_eq!(reshaper.names(), vec!["numbered-statement-reflow"]);

        let (out, audit) = reshaper.reshape(QuestionRecord::new(
            "Which of the above is correct?",
            STATEMENTS.iter().map(|s| s.to_string()).collect(),
            0,
        ));
        assert!(audit.is_empty());
        assert_eq!(out.record.options.len(), 3);
    }

    #[test]
    fn reshaper_audits_rewrites() {
        let reshaper = Reshaper::from_config(&ReshapeConfig {
            which_of_the_above: true,
            which_of_the_above_answer: Some(3),
            ..ReshapeConfig::default()
        });
        let (out, audit) = reshaper.reshape(QuestionRecord::new(
            "Which of the above is correct?",
            STATEMENTS.iter().map(|s| s.to_string()).collect(),
            0,
        ));
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].transform, "implicit-statement-option-rewrite");
        assert_eq!(audit[0].before.options.len(), 3);
        assert_eq!(audit[0].after.options.len(), 4);
        assert_eq!(out.record.answer_index, 3);
    }
}
