//! Perseus document serialisation.
//!
//! The CMS stores each question as a Perseus item: Markdown content with
//! `[[☃ widget-key]]` placeholders, a map of widget definitions, a list of
//! hints, and a few item-level toggles. Every document produced here has:
//!
//! * one graded, randomised `radio` widget under [`WIDGET_KEY`] in the
//!   question body;
//! * the caller's hints (or [`DEFAULT_HINTS`]);
//! * a final "reveal" hint carrying a static, non-randomised copy of the
//!   same radio widget so the learner can see the answer.
//!
//! Both widgets are built from one choice list, so content and `correct`
//! flags cannot diverge. All maps are `BTreeMap` and all structs have fixed
//! field order, so serialisation is byte-for-byte deterministic.

use crate::question::ValidatedQuestion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key of the radio widget in both the question and the reveal hint.
pub const WIDGET_KEY: &str = "radio 1";

/// Placeholder the renderer replaces with [`WIDGET_KEY`]'s widget.
pub const WIDGET_PLACEHOLDER: &str = "[[☃ radio 1]]";

/// Text of the final hint, before its placeholder.
pub const REVEAL_HINT_TEXT: &str = "The correct answer is:";

/// Hints used when the caller supplies none.
pub const DEFAULT_HINTS: [&str; 2] = [
    "Read each option carefully and rule out the ones that clearly do not fit the question.",
    "Compare the remaining options against the key facts stated in the question.",
];

/// Caller-supplied hint texts, shown in order before the reveal hint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintConfig {
    pub hints: Vec<String>,
}

impl HintConfig {
    pub fn new(hints: Vec<String>) -> Self {
        Self { hints }
    }

    /// Non-blank caller hints, or [`DEFAULT_HINTS`] when there are none.
    pub fn effective(&self) -> Vec<String> {
        let hints: Vec<String> = self
            .hints
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        if hints.is_empty() {
            DEFAULT_HINTS.iter().map(|s| s.to_string()).collect()
        } else {
            hints
        }
    }
}

// ── Document model ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerseusDocument {
    pub question: Renderer,
    pub answer_area: AnswerArea,
    pub item_data_version: Version,
    pub hints: Vec<Hint>,
}

/// Markdown content plus the widgets its placeholders refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Renderer {
    pub content: String,
    pub images: BTreeMap<String, Value>,
    pub widgets: BTreeMap<String, RadioWidget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    pub replace: bool,
    pub content: String,
    pub images: BTreeMap<String, Value>,
    pub widgets: BTreeMap<String, RadioWidget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioWidget {
    #[serde(rename = "type")]
    pub kind: String,
    pub alignment: String,
    #[serde(rename = "static")]
    pub is_static: bool,
    pub graded: bool,
    pub options: RadioOptions,
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioOptions {
    pub choices: Vec<Choice>,
    pub randomize: bool,
    pub multiple_select: bool,
    pub display_count: Option<u32>,
    pub has_none_of_the_above: bool,
    pub one_per_line: bool,
    pub deselect_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub content: String,
    pub correct: bool,
}

/// Item-level toggles; identical in every document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerArea {
    pub calculator: bool,
    pub chi2_table: bool,
    pub periodic_table: bool,
    pub t_table: bool,
    pub z_table: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

const ITEM_DATA_VERSION: Version = Version { major: 0, minor: 1 };
const RADIO_VERSION: Version = Version { major: 1, minor: 0 };

impl PerseusDocument {
    /// The graded widget in the question body.
    pub fn graded_widget(&self) -> Option<&RadioWidget> {
        self.question.widgets.get(WIDGET_KEY)
    }

    /// The static widget in the final hint.
    pub fn reveal_widget(&self) -> Option<&RadioWidget> {
        self.hints.last()?.widgets.get(WIDGET_KEY)
    }

    /// Compact JSON, as sent to the CMS.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── Serialiser ───────────────────────────────────────────────────────────────

/// Question content: the formatted body followed by the widget placeholder.
pub fn question_content(body: &str) -> String {
    format!("{}\n\n{}", body.trim_end(), WIDGET_PLACEHOLDER)
}

/// Build the Perseus document for `question`.
///
/// `body` is the rendered question prose (from the reshaper, or the
/// question text itself); the placeholder is appended here.
pub fn to_perseus(question: &ValidatedQuestion, body: &str, hints: &HintConfig) -> PerseusDocument {
    let choices: Vec<Choice> = question
        .options()
        .iter()
        .enumerate()
        .map(|(i, option)| Choice {
            content: option.trim().to_string(),
            correct: i == question.answer(),
        })
        .collect();

    let graded = radio_widget(choices.clone(), false);
    let reveal = radio_widget(choices, true);

    let mut all_hints: Vec<Hint> = hints
        .effective()
        .into_iter()
        .map(|content| Hint {
            replace: false,
            content,
            images: BTreeMap::new(),
            widgets: BTreeMap::new(),
        })
        .collect();
    all_hints.push(Hint {
        replace: false,
        content: format!("{}\n\n{}", REVEAL_HINT_TEXT, WIDGET_PLACEHOLDER),
        images: BTreeMap::new(),
        widgets: BTreeMap::from([(WIDGET_KEY.to_string(), reveal)]),
    });

    PerseusDocument {
        question: Renderer {
            content: question_content(body),
            images: BTreeMap::new(),
            widgets: BTreeMap::from([(WIDGET_KEY.to_string(), graded)]),
        },
        answer_area: AnswerArea::default(),
        item_data_version: ITEM_DATA_VERSION,
        hints: all_hints,
    }
}

fn radio_widget(choices: Vec<Choice>, reveal: bool) -> RadioWidget {
    RadioWidget {
        kind: "radio".to_string(),
        alignment: "default".to_string(),
        is_static: reveal,
        graded: !reveal,
        options: RadioOptions {
            choices,
            randomize: !reveal,
            multiple_select: false,
            display_count: None,
            has_none_of_the_above: false,
            one_per_line: true,
            deselect_enabled: false,
        },
        version: RADIO_VERSION,
    }
}
