//! Session store of accepted questions and their exported artefacts.
//!
//! The store collects every question that passed validation, whether it came
//! from an image or was typed in by an operator, and renders two artefacts:
//! a JSON array of records and a Markdown table per question with the
//! correct option marked. Both are written atomically (temp file + rename).

use crate::error::McqError;
use crate::output::ImageReport;
use crate::pipeline::validate::{validate, ValidationRules};
use crate::question::{QuestionRecord, ValidatedQuestion};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info};

/// Source label for questions entered by hand.
pub const MANUAL_SOURCE: &str = "manual";

/// An accepted question and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredQuestion {
    pub source: String,
    pub question: ValidatedQuestion,
}

/// Ordered, append-only list of accepted questions for one session.
#[derive(Debug, Clone, Default)]
pub struct QuestionStore {
    entries: Vec<StoredQuestion>,
}

impl QuestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredQuestion> {
        self.entries.iter()
    }

    pub fn push(&mut self, source: impl Into<String>, question: ValidatedQuestion) {
        self.entries.push(StoredQuestion {
            source: source.into(),
            question,
        });
    }

    /// Validate an operator-entered record and keep it if it passes.
    pub fn add_manual(
        &mut self,
        record: QuestionRecord,
        rules: &ValidationRules,
    ) -> Result<&ValidatedQuestion, McqError> {
        let question = validate(&record, rules)?;
        self.push(MANUAL_SOURCE, question);
        let last = self.entries.len() - 1;
        Ok(&self.entries[last].question)
    }

    /// Keep every accepted question from `report`, in reply order.
    ///
    /// Returns how many were added.
    pub fn absorb(&mut self, report: &ImageReport) -> usize {
        let before = self.entries.len();
        for outcome in report.accepted() {
            let Some(choices) = outcome
                .document
                .as_ref()
                .and_then(|doc| doc.graded_widget())
                .map(|w| &w.options.choices)
            else {
                continue;
            };
            if let Some(answer) = choices.iter().position(|c| c.correct) {
                self.push(
                    report.source.clone(),
                    ValidatedQuestion::new_unchecked(outcome.record.clone(), answer),
                );
            }
        }
        let added = self.entries.len() - before;
        debug!("Stored {} question(s) from {}", added, report.source);
        added
    }

    /// Records with their validated answer index, in insertion order.
    pub fn records(&self) -> Vec<QuestionRecord> {
        self.entries
            .iter()
            .map(|e| {
                let mut record = e.question.record().clone();
                record.answer_index = e.question.answer() as i64;
                record
            })
            .collect()
    }

    /// Pretty-printed JSON array of `{question, options, answer_index}`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.records())
    }

    /// One heading and option table per question, correct option marked.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Extracted questions\n");
        if self.entries.is_empty() {
            out.push_str("\n_No questions._\n");
            return out;
        }
        for (i, entry) in self.entries.iter().enumerate() {
            let q = &entry.question;
            let _ = write!(out, "\n## Question {} ({})\n\n", i + 1, entry.source);
            out.push_str(q.question().trim());
            out.push_str("\n\n| # | Option | Correct |\n|---|--------|:-------:|\n");
            for (j, option) in q.options().iter().enumerate() {
                let mark = if j == q.answer() { "✓" } else { "" };
                let (label, cell) = (option_label(j), table_cell(option));
                let _ = writeln!(out, "| {label} | {cell} | {mark} |");
            }
        }
        out
    }

    pub async fn write_json(&self, path: impl AsRef<Path>) -> Result<(), McqError> {
        let json = self.to_json()?;
        write_atomic(path.as_ref(), json.as_bytes()).await
    }

    pub async fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), McqError> {
        write_atomic(path.as_ref(), self.to_markdown().as_bytes()).await
    }
}

/// `A`, `B`, … `Z`, then `27`, `28`, ….
fn option_label(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => char::from(b'A' + i).to_string(),
        _ => (index + 1).to_string(),
    }
}

fn table_cell(text: &str) -> String {
    text.trim().replace('|', "\\|").replace('\n', "<br>")
}

/// Write `contents` to `path` via a sibling temp file and rename.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), McqError> {
    let write_err = |e| McqError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::Rejection;

    fn four(answer: i64) -> QuestionRecord {
        QuestionRecord::new(
            "2+2=?",
            vec!["3".into(), "4".into(), "5".into(), "6".into()],
            answer,
        )
    }

    #[test]
    fn manual_entry_is_validated() {
        let mut store = QuestionStore::new();
        let q = store.add_manual(four(1), &ValidationRules::submission()).unwrap();
        assert_eq!(q.correct_option(), "4");

        let err = store
            .add_manual(four(-1), &ValidationRules::submission())
            .unwrap_err();
        assert!(matches!(err, McqError::Rejected(Rejection::AnswerUnknown { .. })));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn json_export_is_record_array() {
        let mut store = QuestionStore::new();
        store.add_manual(four(1), &ValidationRules::submission()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&store.to_json().unwrap()).unwrap();
        assert_eq!(value[0]["question"], "2+2=?");
        assert_eq!(value[0]["answer_index"], 1);
        assert_eq!(value[0]["options"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn markdown_marks_correct_option_and_escapes_pipes() {
        let mut store = QuestionStore::new();
        let record = QuestionRecord::new(
            "Pick one",
            vec!["a | b".into(), "c".into()],
            1,
        );
        store.add_manual(record, &ValidationRules::display()).unwrap();
        let md = store.to_markdown();
        assert!(md.contains("## Question 1 (manual)"));
        assert!(md.contains("| A | a \\| b |  |"));
        assert!(md.contains("| B | c | ✓ |"));
    }

    #[test]
    fn empty_store_renders_placeholder() {
        assert!(QuestionStore::new().to_markdown().contains("_No questions._"));
    }

    #[test]
    fn option_labels() {
        assert_eq!(option_label(0), "A");
        assert_eq!(option_label(25), "Z");
        assert_eq!(option_label(26), "27");
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("questions.json");
        let mut store = QuestionStore::new();
        store.add_manual(four(2), &ValidationRules::submission()).unwrap();
        store.write_json(&path).await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(written.contains("\"answer_index\": 2"));
        assert!(!path.with_file_name("questions.json.tmp").exists());
    }
}
