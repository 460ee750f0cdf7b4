//! Offline pipeline tests: everything after the model call, plus image
//! encoding, batch manifests and the session store. No network.

use edgequake_mcq::pipeline::encode::{data_uri, encode_image};
use edgequake_mcq::pipeline::perseus::{REVEAL_HINT_TEXT, WIDGET_PLACEHOLDER};
use edgequake_mcq::pipeline::reshape::LINE_BREAK;
use edgequake_mcq::{
    normalize_reply, BatchJob, ExerciseId, ExtractionConfig, ImageReport, ItemError, Manifest,
    QuestionRecord, QuestionStore, Rejection, ReplyProcessor, RunStats, ValidationRules, Validity,
};
use image::{ImageBuffer, Rgb};
use std::path::PathBuf;

const TWO_PLUS_TWO: &str =
    r#"[{"question": "2+2=?", "options": ["3", "4", "5", "6"], "answer_index": 1}]"#;

fn processor() -> ReplyProcessor {
    ReplyProcessor::from_config(&ExtractionConfig::default())
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgb([255u8, 255, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

// ── End-to-end reply → document ──────────────────────────────────────────────

#[test]
fn two_plus_two_marks_four_correct_in_reveal_widget() {
    let outcomes = processor().process(TWO_PLUS_TWO).unwrap();
    assert_eq!(outcomes.len(), 1);
    let doc = outcomes[0].document.as_ref().expect("accepted");

    assert_eq!(doc.question.content, format!("2+2=?\n\n{WIDGET_PLACEHOLDER}"));

    let reveal_hint = doc.hints.last().unwrap();
    assert!(reveal_hint.content.starts_with(REVEAL_HINT_TEXT));
    let correct: Vec<&str> = doc
        .reveal_widget()
        .unwrap()
        .options
        .choices
        .iter()
        .filter(|c| c.correct)
        .map(|c| c.content.as_str())
        .collect();
    assert_eq!(correct, vec!["4"]);

    let graded = doc.graded_widget().unwrap();
    let flags = |w: &edgequake_mcq::pipeline::perseus::RadioWidget| {
        w.options.choices.iter().map(|c| c.correct).collect::<Vec<_>>()
    };
    assert_eq!(flags(graded), flags(doc.reveal_widget().unwrap()));
}

#[test]
fn fenced_and_unfenced_replies_give_identical_documents() {
    let fenced = format!("```json\n{TWO_PLUS_TWO}\n```");
    let a = processor().process(TWO_PLUS_TWO).unwrap();
    let b = processor().process(&fenced).unwrap();
    assert_eq!(a, b);
}

#[test]
fn python_literal_reply_is_accepted() {
    let raw = "[{'question': '2+2=?', 'options': ['3', '4', '5', '6'], 'answer_index': 1,}]";
    let outcomes = processor().process(raw).unwrap();
    assert!(outcomes[0].is_accepted());
}

#[test]
fn serialised_documents_are_byte_identical_across_runs() {
    let json = |raw: &str| {
        processor().process(raw).unwrap()[0]
            .document
            .as_ref()
            .unwrap()
            .to_json()
            .unwrap()
    };
    assert_eq!(json(TWO_PLUS_TWO), json(TWO_PLUS_TWO));
}

#[test]
fn reflow_applies_only_to_numbered_statements() {
    let raw = r#"[
        {"question": "1. Fact A\n2. Fact B", "options": ["a","b","c","d"], "answer_index": 0},
        {"question": "What is the capital?", "options": ["a","b","c","d"], "answer_index": 0}
    ]"#;
    let outcomes = processor().process(raw).unwrap();
    let content = |i: usize| outcomes[i].document.as_ref().unwrap().question.content.clone();

    assert_eq!(
        content(0),
        format!("1. Fact A{LINE_BREAK}2. Fact B\n\n{WIDGET_PLACEHOLDER}")
    );
    assert_eq!(content(1), format!("What is the capital?\n\n{WIDGET_PLACEHOLDER}"));
}

#[test]
fn unknown_answer_is_never_treated_as_first_option() {
    let raw = r#"[{"question": "q", "options": ["a","b","c","d"], "answer_index": -1}]"#;
    let outcome = &processor().process(raw).unwrap()[0];
    assert_eq!(outcome.validity, Validity::AnswerUnknown);
    assert!(outcome.document.is_none());
}

#[test]
fn option_count_rule_follows_configuration() {
    let raw = r#"[{"question": "Pick", "options": ["a","b","c"], "answer_index": 2}]"#;
    let strict = processor().process(raw).unwrap();
    assert_eq!(
        strict[0].rejection,
        Some(Rejection::OptionCount {
            min: 4,
            max: 4,
            found: 3
        })
    );

    let relaxed = ReplyProcessor::from_config(
        &ExtractionConfig::builder()
            .validation(ValidationRules::exactly(3))
            .build()
            .unwrap(),
    );
    assert!(relaxed.process(raw).unwrap()[0].is_accepted());
}

#[test]
fn normalised_records_round_trip_fields() {
    let raw = r#"[
        {"question": "A?", "options": ["x", "y"], "answer_index": 0},
        {"question": "B?", "options": ["p", "q", "r"], "answer_index": 2}
    ]"#;
    let records = normalize_reply(raw).unwrap();
    assert_eq!(
        records,
        vec![
            QuestionRecord::new("A?", vec!["x".into(), "y".into()], 0),
            QuestionRecord::new("B?", vec!["p".into(), "q".into(), "r".into()], 2),
        ]
    );
}

// ── Image encoding ───────────────────────────────────────────────────────────

#[test]
fn small_png_is_sent_unchanged_as_data_uri() {
    let bytes = png_bytes(20, 10);
    let image = encode_image(&bytes, 2000).unwrap();
    assert!(data_uri(&image).starts_with("data:image/png;base64,"));
}

#[test]
fn oversized_png_is_downscaled() {
    let bytes = png_bytes(400, 100);
    let image = encode_image(&bytes, 200).unwrap();

    use base64::Engine;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(&image.data)
        .unwrap();
    let img = image::load_from_memory(&decoded).unwrap();
    assert_eq!((img.width(), img.height()), (200, 50));
}

// ── Session store ────────────────────────────────────────────────────────────

#[test]
fn store_absorbs_accepted_questions_in_order() {
    let raw = r#"[
        {"question": "First", "options": ["a","b","c","d"], "answer_index": 3},
        {"question": "Bad", "options": ["a"], "answer_index": 0},
        {"question": "Second", "options": ["e","f","g","h"], "answer_index": 0}
    ]"#;
    let mut report = ImageReport::new(1, "sheet.png");
    report.questions = processor().process(raw).unwrap();

    let mut store = QuestionStore::new();
    assert_eq!(store.absorb(&report), 2);
    store
        .add_manual(
            QuestionRecord::new("Manual", vec!["w".into(), "x".into(), "y".into(), "z".into()], 2),
            &ValidationRules::submission(),
        )
        .unwrap();

    let records = store.records();
    let questions: Vec<&str> = records.iter().map(|r| r.question.as_str()).collect();
    assert_eq!(questions, vec!["First", "Second", "Manual"]);
    assert_eq!(records[0].answer_index, 3);

    let md = store.to_markdown();
    assert!(md.contains("## Question 1 (sheet.png)"));
    assert!(md.contains("## Question 3 (manual)"));
}

#[test]
fn store_artefacts_are_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = QuestionStore::new();
    store
        .add_manual(
            QuestionRecord::new("2+2=?", vec!["3".into(), "4".into(), "5".into(), "6".into()], 1),
            &ValidationRules::submission(),
        )
        .unwrap();

    let json_path = dir.path().join("questions.json");
    let md_path = dir.path().join("questions.md");
    tokio_test::block_on(store.write_json(&json_path)).unwrap();
    tokio_test::block_on(store.write_markdown(&md_path)).unwrap();

    let records: Vec<QuestionRecord> =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(records[0].options[records[0].answer_index as usize], "4");
    assert!(std::fs::read_to_string(&md_path).unwrap().contains("| B | 4 | ✓ |"));
}

// ── Batch manifests ──────────────────────────────────────────────────────────

#[test]
fn manifest_rows_bind_to_uploaded_images() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = dir.path().join("rows.csv");
    std::fs::write(
        &manifest_path,
        "exercise_id,image_filename\n11,a.png\n-4,b.png\n13,c.png\n",
    )
    .unwrap();
    let images = vec![
        dir.path().join("a.png"),
        dir.path().join("b.png"),
    ];

    let manifest = Manifest::from_path(&manifest_path).unwrap();
    let jobs = manifest.bind(&images);
    assert_eq!(jobs.len(), 3);
    assert_eq!(
        jobs[0],
        BatchJob::Ready {
            row: 1,
            exercise: ExerciseId::new(11).unwrap(),
            path: dir.path().join("a.png"),
        }
    );
    assert!(matches!(
        &jobs[1],
        BatchJob::Invalid {
            error: ItemError::InvalidExerciseId { input, .. },
            ..
        } if input == "-4"
    ));
    assert!(matches!(
        &jobs[2],
        BatchJob::Invalid {
            error: ItemError::UnknownImage { filename, .. },
            ..
        } if filename == "c.png"
    ));
}

#[test]
fn unreadable_manifest_is_fatal() {
    let err = Manifest::from_path(PathBuf::from("/nonexistent/rows.csv")).unwrap_err();
    assert!(err.to_string().contains("rows.csv"));
}

#[test]
fn run_stats_over_mixed_reports() {
    let mut ok = ImageReport::new(1, "a.png");
    ok.questions = processor().process(TWO_PLUS_TWO).unwrap();
    let failed = ImageReport::failed(
        2,
        "b.png",
        ItemError::UnknownImage {
            row: 2,
            filename: "b.png".into(),
        },
    );
    let stats = RunStats::from_reports(&[ok, failed], 0);
    assert_eq!(stats.processed_images, 1);
    assert_eq!(stats.failed_images, 1);
    assert_eq!(stats.accepted_questions, 1);
}
