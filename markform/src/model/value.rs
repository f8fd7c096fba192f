//! Field value shapes and checkbox state vocabulary.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How a checkboxes field interprets its option states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckboxMode {
    /// Plain checklist: options are `todo` or `done`; complete when all done.
    #[default]
    Simple,
    /// Pick-any checklist: complete when at least one option is `done`.
    Multi,
    /// Every option must be explicitly decided `yes` or `no`.
    Explicit,
}

impl CheckboxMode {
    /// The state an option id coerced from a bare array element receives.
    pub fn positive_state(self) -> CheckState {
        match self {
            CheckboxMode::Simple | CheckboxMode::Multi => CheckState::Done,
            CheckboxMode::Explicit => CheckState::Yes,
        }
    }

    /// The state an option receives from a boolean-`false` coercion.
    pub fn negative_state(self) -> CheckState {
        match self {
            CheckboxMode::Simple | CheckboxMode::Multi => CheckState::Todo,
            CheckboxMode::Explicit => CheckState::No,
        }
    }

    /// Whether `state` belongs to this mode's vocabulary.
    pub fn allows(self, state: CheckState) -> bool {
        match self {
            CheckboxMode::Simple | CheckboxMode::Multi => {
                matches!(state, CheckState::Todo | CheckState::Done)
            }
            CheckboxMode::Explicit => matches!(state, CheckState::Yes | CheckState::No),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckboxMode::Simple => "simple",
            CheckboxMode::Multi => "multi",
            CheckboxMode::Explicit => "explicit",
        }
    }
}

/// Per-option state of a checkboxes value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Todo,
    Done,
    Yes,
    No,
}

impl CheckState {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckState::Todo => "todo",
            CheckState::Done => "done",
            CheckState::Yes => "yes",
            CheckState::No => "no",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(CheckState::Todo),
            "done" => Some(CheckState::Done),
            "yes" => Some(CheckState::Yes),
            "no" => Some(CheckState::No),
            _ => None,
        }
    }
}

/// A field's answered value. The shape is constrained by the field kind; the
/// validator reports mismatches on programmatically built forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// `string`, `url`, `single_select`.
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Year(i32),
    /// `string_list`, `url_list`, `multi_select`.
    List(Vec<String>),
    Checkboxes(BTreeMap<String, CheckState>),
    /// Rows of cells, one cell per table column.
    Table(Vec<Vec<String>>),
}

impl FieldValue {
    /// Short shape name for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Number(_) => "number",
            FieldValue::Date(_) => "date",
            FieldValue::Year(_) => "year",
            FieldValue::List(_) => "list",
            FieldValue::Checkboxes(_) => "checkboxes",
            FieldValue::Table(_) => "table",
        }
    }
}
