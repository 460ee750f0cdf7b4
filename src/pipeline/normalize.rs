//! Reply normalisation: raw model text → ordered [`QuestionRecord`]s.
//!
//! The model is asked for a bare JSON array, and most of the time that is
//! what arrives. The rest of the time it is fenced, Python-flavoured, or
//! wrapped in a sentence of prose. Rather than one parser full of special
//! cases, the normaliser runs an ordered chain of [`ReplyParser`]
//! strategies and stops at the first success:
//!
//! 1. [`StrictJson`]        — `serde_json` on the unfenced text
//! 2. [`LiteralStructure`]  — [`crate::pipeline::literal`] on the same text
//! 3. [`EmbeddedArray`]     — locate a fenced block or the outermost
//!    `[ … ]` inside surrounding prose, then retry 1 and 2 on it
//!
//! When every strategy fails the result is a [`ParseFailure`] holding the
//! raw reply and each strategy's error, so nothing is silently dropped.
//!
//! This stage only establishes syntactic shape. Missing `options` or
//! `answer_index` keys still produce a record (empty options, unknown
//! answer); the validator rejects them with a proper reason.

use crate::pipeline::literal::parse_literal;
use crate::question::{QuestionRecord, ANSWER_UNKNOWN};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// One step in the parser chain.
pub trait ReplyParser: Send + Sync {
    fn name(&self) -> &'static str;
    fn parse(&self, text: &str) -> Result<Vec<QuestionRecord>, String>;
}

/// A strategy that was tried and what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseAttempt {
    pub strategy: String,
    pub error: String,
}

/// No strategy could read the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub raw: String,
    pub attempts: Vec<ParseAttempt>,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .attempts
            .iter()
            .map(|a| format!("{}: {}", a.strategy, a.error))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ParseFailure {}

/// Ordered chain of reply parsers.
pub struct ResponseNormalizer {
    parsers: Vec<Box<dyn ReplyParser>>,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self {
            parsers: vec![
                Box::new(StrictJson),
                Box::new(LiteralStructure),
                Box::new(EmbeddedArray),
            ],
        }
    }
}

impl ResponseNormalizer {
    /// A normaliser with a caller-chosen chain.
    pub fn with_parsers(parsers: Vec<Box<dyn ReplyParser>>) -> Self {
        Self { parsers }
    }

    pub fn normalize(&self, raw: &str) -> Result<Vec<QuestionRecord>, ParseFailure> {
        let text = strip_code_fence(raw.trim());
        let mut attempts = Vec::with_capacity(self.parsers.len());

        for parser in &self.parsers {
            match parser.parse(text) {
                Ok(records) => {
                    debug!(
                        "Reply parsed by '{}': {} question(s)",
                        parser.name(),
                        records.len()
                    );
                    return Ok(records);
                }
                Err(error) => {
                    debug!("Parser '{}' failed: {}", parser.name(), error);
                    attempts.push(ParseAttempt {
                        strategy: parser.name().to_string(),
                        error,
                    });
                }
            }
        }

        Err(ParseFailure {
            raw: raw.to_string(),
            attempts,
        })
    }
}

/// Normalise with the default parser chain.
pub fn normalize_reply(raw: &str) -> Result<Vec<QuestionRecord>, ParseFailure> {
    ResponseNormalizer::default().normalize(raw)
}

// ── Fence stripping ──────────────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[\w-]*[ \t]*\r?\n(.*?)\r?\n?```$").unwrap());

/// Strip exactly one fenced-code wrapper around the whole text.
pub fn strip_code_fence(text: &str) -> &str {
    match RE_OUTER_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text,
    }
}

// ── Strategies ───────────────────────────────────────────────────────────────

/// `serde_json` on the text as-is.
pub struct StrictJson;

impl ReplyParser for StrictJson {
    fn name(&self) -> &'static str {
        "strict-json"
    }

    fn parse(&self, text: &str) -> Result<Vec<QuestionRecord>, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        records_from_value(value)
    }
}

/// Python-literal / relaxed-JSON fallback.
pub struct LiteralStructure;

impl ReplyParser for LiteralStructure {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn parse(&self, text: &str) -> Result<Vec<QuestionRecord>, String> {
        let value = parse_literal(text).map_err(|e| e.to_string())?;
        records_from_value(value)
    }
}

static RE_INNER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[\w-]*[ \t]*\r?\n(.*?)\r?\n```").unwrap());

/// Find the structured part inside surrounding prose.
pub struct EmbeddedArray;

impl ReplyParser for EmbeddedArray {
    fn name(&self) -> &'static str {
        "embedded-array"
    }

    fn parse(&self, text: &str) -> Result<Vec<QuestionRecord>, String> {
        let candidate = if let Some(inner) = RE_INNER_FENCE.captures(text).and_then(|c| c.get(1)) {
            inner.as_str().trim()
        } else {
            match (text.find('['), text.rfind(']')) {
                (Some(start), Some(end)) if start < end => &text[start..=end],
                _ => return Err("no fenced block or bracketed array found".into()),
            }
        };

        StrictJson
            .parse(candidate)
            .or_else(|_| LiteralStructure.parse(candidate))
    }
}

// ── Value → records ──────────────────────────────────────────────────────────

fn records_from_value(value: Value) -> Result<Vec<QuestionRecord>, String> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => return Err("expected an array of question objects".into()),
        },
        other => return Err(format!("expected an array, found {}", kind(&other))),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(record_from_object(map)),
            other => Err(format!("element {i} is {}, not an object", kind(&other))),
        })
        .collect()
}

fn record_from_object(mut map: Map<String, Value>) -> QuestionRecord {
    let question = map.remove("question").map(text_of).unwrap_or_default();
    let options = match map.remove("options") {
        Some(Value::Array(items)) => items.into_iter().map(text_of).collect(),
        // {"A": "...", "B": "..."}: keys sort in letter order.
        Some(Value::Object(labelled)) => labelled.into_iter().map(|(_, v)| text_of(v)).collect(),
        _ => Vec::new(),
    };
    let answer_index = map
        .get("answer_index")
        .and_then(Value::as_i64)
        .unwrap_or(ANSWER_UNKNOWN);

    QuestionRecord {
        question,
        options,
        answer_index,
    }
}

fn text_of(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARRAY: &str = concat!(
        r#"[{"question":"2+2=?","options":["3","4","5","6"],"answer_index":1},"#,
        r#"{"question":"Capital of Italy?","options":["Rome","Milan"],"answer_index":0}]"#,
    );

    #[test]
    fn strict_array_round_trips() {
        let records = normalize_reply(ARRAY).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].question, "2+2=?");
        assert_eq!(records[0].options, vec!["3", "4", "5", "6"]);
        assert_eq!(records[0].answer_index, 1);
        assert_eq!(records[1].options, vec!["Rome", "Milan"]);
    }

    #[test]
    fn fenced_equals_unfenced() {
        let fenced = format!("```json\n{ARRAY}\n```");
        assert_eq!(normalize_reply(&fenced).unwrap(), normalize_reply(ARRAY).unwrap());

        let bare_fence = format!("  ```\n{ARRAY}\n```  \n");
        assert_eq!(normalize_reply(&bare_fence).unwrap(), normalize_reply(ARRAY).unwrap());
    }

    #[test]
    fn only_one_fence_is_stripped() {
        assert_eq!(strip_code_fence("```json\n[]\n```"), "[]");
        assert_eq!(strip_code_fence("[]"), "[]");
    }

    #[test]
    fn empty_array_is_not_a_failure() {
        assert!(normalize_reply("[]").unwrap().is_empty());
        assert!(normalize_reply("```json\n[]\n```").unwrap().is_empty());
    }

    #[test]
    fn missing_keys_become_sentinels() {
        let records = normalize_reply(r#"[{"question":"Orphan"}]"#).unwrap();
        assert_eq!(records[0].options, Vec::<String>::new());
        assert_eq!(records[0].answer_index, ANSWER_UNKNOWN);
    }

    #[test]
    fn answer_index_is_not_coerced() {
        let reply = r#"[{"question":"q","options":["a","b"],"answer_index":"1"}]"#;
        let records = normalize_reply(reply).unwrap();
        assert_eq!(records[0].answer_index, ANSWER_UNKNOWN);
    }

    #[test]
    fn numeric_options_keep_their_text() {
        let reply = r#"[{"question":"q","options":[3,4.5,true],"answer_index":0}]"#;
        let records = normalize_reply(reply).unwrap();
        assert_eq!(records[0].options, vec!["3", "4.5", "true"]);
    }

    #[test]
    fn python_repr_falls_back_to_literal() {
        let records = normalize_reply(
            "[{'question': 'Largest ocean?', \
              'options': ['Atlantic', 'Pacific', 'Indian', 'Arctic'], 'answer_index': 1}]",
        )
        .unwrap();
        assert_eq!(records[0].options[1], "Pacific");
        assert_eq!(records[0].answer_index, 1);
    }

    #[test]
    fn prose_wrapped_array_is_found() {
        let reply =
            format!("Here are the questions I found:\n\n```json\n{ARRAY}\n```\nLet me know!");
        assert_eq!(normalize_reply(&reply).unwrap().len(), 2);

        let reply = format!("Sure! {ARRAY} Hope this helps.");
        assert_eq!(normalize_reply(&reply).unwrap().len(), 2);
    }

    #[test]
    fn questions_envelope_is_unwrapped() {
        let reply = format!(r#"{{"questions": {ARRAY}}}"#);
        assert_eq!(normalize_reply(&reply).unwrap().len(), 2);
    }

    #[test]
    fn deeply_nested_reply_is_a_parse_failure() {
        let raw = format!("{}{}", "[".repeat(3000), "]".repeat(3000));
        let failure = normalize_reply(&raw).unwrap_err();
        assert_eq!(failure.raw, raw);
        assert_eq!(failure.attempts.len(), 3);
    }

    #[test]
    fn failure_keeps_raw_text_and_every_attempt() {
        let raw = "I'm sorry, the image is too blurry to read.";
        let failure = normalize_reply(raw).unwrap_err();
        assert_eq!(failure.raw, raw);
        let names: Vec<&str> = failure.attempts.iter().map(|a| a.strategy.as_str()).collect();
        assert_eq!(names, vec!["strict-json", "literal", "embedded-array"]);
        assert!(failure.to_string().contains("strict-json"));
    }

    #[test]
    fn non_object_elements_fail() {
        assert!(normalize_reply(r#"["just a string"]"#).is_err());
    }

    #[test]
    fn custom_chain_is_respected() {
        let strict_only = ResponseNormalizer::with_parsers(vec![Box::new(StrictJson)]);
        let failure = strict_only.normalize("[{'question': 'x'}]").unwrap_err();
        assert_eq!(failure.attempts.len(), 1);
    }
}
