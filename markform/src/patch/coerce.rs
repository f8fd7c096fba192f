//! Narrowing of patch payloads into typed field values.
//!
//! Set operations must name the right operation for the field's kind; a
//! mismatch is a rejection that tells the agent which operation to use.
//! A few forgiving coercions apply with a warning instead.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::{CheckState, CheckboxConstraints, Field, FieldKind, FieldValue};
use crate::patch::{Patch, RejectionCode, WarningKind};

#[derive(Debug, Clone)]
pub struct Coerced {
    pub value: FieldValue,
    pub warning: Option<WarningKind>,
}

impl Coerced {
    fn plain(value: FieldValue) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    fn warned(value: FieldValue, warning: WarningKind) -> Self {
        Self {
            value,
            warning: Some(warning),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoerceError {
    pub code: RejectionCode,
    pub message: String,
}

impl CoerceError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: RejectionCode::InvalidValue,
            message: message.into(),
        }
    }
}

/// Turn a set patch into a typed value for `field`, or explain why not.
pub fn coerce_value(field: &Field, patch: &Patch) -> Result<Coerced, CoerceError> {
    match (patch, &field.kind) {
        (Patch::SetString { value, .. }, FieldKind::String(_)) => {
            Ok(Coerced::plain(FieldValue::Text(value.clone())))
        }
        (Patch::SetNumber { value, .. }, FieldKind::Number(_)) => {
            Ok(Coerced::plain(FieldValue::Number(*value)))
        }
        (Patch::SetDate { value, .. }, FieldKind::Date(_)) => {
            let date = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|_| CoerceError::invalid(format!("'{value}' is not a YYYY-MM-DD date")))?;
            Ok(Coerced::plain(FieldValue::Date(date)))
        }
        (Patch::SetYear { value, .. }, FieldKind::Year(_)) => {
            Ok(Coerced::plain(FieldValue::Year(*value)))
        }
        (Patch::SetUrl { value, .. }, FieldKind::Url) => {
            Ok(Coerced::plain(FieldValue::Text(value.clone())))
        }
        (Patch::SetSingleSelect { value, .. }, FieldKind::SingleSelect(_)) => {
            Ok(Coerced::plain(FieldValue::Text(value.clone())))
        }
        (Patch::SetStringList { value, .. }, FieldKind::StringList(_))
        | (Patch::SetUrlList { value, .. }, FieldKind::UrlList(_))
        | (Patch::SetMultiSelect { value, .. }, FieldKind::MultiSelect(_)) => coerce_list(value),
        (Patch::SetCheckboxes { value, .. }, FieldKind::Checkboxes(constraints)) => {
            coerce_checkboxes(value, constraints)
        }
        (Patch::SetTable { value, .. }, FieldKind::Table(_)) => coerce_table(value),
        (
            Patch::SetString { .. }
            | Patch::SetNumber { .. }
            | Patch::SetDate { .. }
            | Patch::SetYear { .. }
            | Patch::SetUrl { .. }
            | Patch::SetSingleSelect { .. }
            | Patch::SetStringList { .. }
            | Patch::SetUrlList { .. }
            | Patch::SetMultiSelect { .. }
            | Patch::SetCheckboxes { .. }
            | Patch::SetTable { .. },
            kind,
        ) => Err(CoerceError {
            code: RejectionCode::WrongOperation,
            message: format!(
                "field '{}' is {}, use {}",
                field.id,
                kind.name(),
                kind.set_op()
            ),
        }),
        _ => Err(CoerceError::invalid(format!(
            "operation {} does not carry a value",
            patch.op()
        ))),
    }
}

/// Arrays of strings pass through; a bare string becomes a one-item list
/// with a warning.
fn coerce_list(value: &Value) -> Result<Coerced, CoerceError> {
    match value {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    other => {
                        return Err(CoerceError::invalid(format!(
                            "list items must be strings, got {other}"
                        )));
                    }
                }
            }
            Ok(Coerced::plain(FieldValue::List(out)))
        }
        Value::String(s) => Ok(Coerced::warned(
            FieldValue::List(vec![s.clone()]),
            WarningKind::StringToList,
        )),
        other => Err(CoerceError::invalid(format!(
            "expected an array of strings, got {other}"
        ))),
    }
}

/// Checkboxes accept three payload shapes: an object of option states, a
/// bare boolean (all options positive or negative), or an array of option
/// ids (those options positive). The last two warn.
fn coerce_checkboxes(
    value: &Value,
    constraints: &CheckboxConstraints,
) -> Result<Coerced, CoerceError> {
    match value {
        Value::Object(entries) => {
            let mut states = BTreeMap::new();
            for (id, state) in entries {
                let Value::String(state) = state else {
                    return Err(CoerceError::invalid(format!(
                        "state for '{id}' must be a string, got {state}"
                    )));
                };
                let Some(state) = CheckState::parse(state) else {
                    return Err(CoerceError::invalid(format!(
                        "unknown checkbox state '{state}' for '{id}'"
                    )));
                };
                states.insert(id.clone(), state);
            }
            Ok(Coerced::plain(FieldValue::Checkboxes(states)))
        }
        Value::Bool(positive) => {
            let state = if *positive {
                constraints.mode.positive_state()
            } else {
                constraints.mode.negative_state()
            };
            let states = constraints
                .options
                .iter()
                .map(|opt| (opt.id.clone(), state))
                .collect();
            Ok(Coerced::warned(
                FieldValue::Checkboxes(states),
                WarningKind::BoolToCheckboxes,
            ))
        }
        Value::Array(items) => {
            let mut states = BTreeMap::new();
            for item in items {
                let Value::String(id) = item else {
                    return Err(CoerceError::invalid(format!(
                        "option ids must be strings, got {item}"
                    )));
                };
                if !constraints.options.iter().any(|opt| opt.id == *id) {
                    return Err(CoerceError::invalid(format!(
                        "'{id}' is not one of the declared options"
                    )));
                }
                states.insert(id.clone(), constraints.mode.positive_state());
            }
            if states.is_empty() {
                return Ok(Coerced::plain(FieldValue::Checkboxes(states)));
            }
            Ok(Coerced::warned(
                FieldValue::Checkboxes(states),
                WarningKind::ArrayToCheckboxes,
            ))
        }
        other => Err(CoerceError::invalid(format!(
            "expected an object of option states, got {other}"
        ))),
    }
}

fn coerce_table(value: &Value) -> Result<Coerced, CoerceError> {
    let Value::Array(rows) = value else {
        return Err(CoerceError::invalid(format!(
            "expected an array of rows, got {value}"
        )));
    };
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Value::Array(cells) = row else {
            return Err(CoerceError::invalid(format!(
                "each row must be an array of cells, got {row}"
            )));
        };
        let mut out_row = Vec::with_capacity(cells.len());
        for cell in cells {
            match cell {
                Value::String(s) => out_row.push(s.clone()),
                Value::Number(n) => out_row.push(n.to_string()),
                other => {
                    return Err(CoerceError::invalid(format!(
                        "cells must be strings, got {other}"
                    )));
                }
            }
        }
        out.push(out_row);
    }
    Ok(Coerced::plain(FieldValue::Table(out)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckboxMode, ListConstraints, SelectOption, TextConstraints};
    use serde_json::json;

    fn checkbox_field(mode: CheckboxMode) -> Field {
        Field::new(
            "tasks",
            FieldKind::Checkboxes(CheckboxConstraints {
                options: vec![SelectOption::new("a"), SelectOption::new("b")],
                mode,
            }),
            "Tasks",
        )
    }

    #[test]
    fn string_payload_on_list_field_wraps_with_warning() {
        let field = Field::new(
            "tags",
            FieldKind::StringList(ListConstraints::default()),
            "Tags",
        );
        let patch = Patch::SetStringList {
            field_id: "tags".to_string(),
            value: json!("solo"),
        };
        let coerced = coerce_value(&field, &patch).expect("coerce");
        assert_eq!(coerced.value, FieldValue::List(vec!["solo".to_string()]));
        assert_eq!(coerced.warning, Some(WarningKind::StringToList));
    }

    #[test]
    fn wrong_operation_names_the_right_one() {
        let field = Field::new("age", FieldKind::Number(Default::default()), "Age");
        let patch = Patch::SetString {
            field_id: "age".to_string(),
            value: "36".to_string(),
        };
        let err = coerce_value(&field, &patch).expect_err("should reject");
        assert_eq!(err.code, RejectionCode::WrongOperation);
        assert!(err.message.contains("use set_number"));
    }

    #[test]
    fn bool_payload_sets_every_option() {
        let field = checkbox_field(CheckboxMode::Explicit);
        let patch = Patch::SetCheckboxes {
            field_id: "tasks".to_string(),
            value: json!(false),
        };
        let coerced = coerce_value(&field, &patch).expect("coerce");
        assert_eq!(coerced.warning, Some(WarningKind::BoolToCheckboxes));
        let FieldValue::Checkboxes(states) = coerced.value else {
            panic!("expected checkboxes");
        };
        assert_eq!(states.get("a"), Some(&CheckState::No));
        assert_eq!(states.get("b"), Some(&CheckState::No));
    }

    #[test]
    fn id_array_payload_marks_positive_states() {
        let field = checkbox_field(CheckboxMode::Simple);
        let patch = Patch::SetCheckboxes {
            field_id: "tasks".to_string(),
            value: json!(["a"]),
        };
        let coerced = coerce_value(&field, &patch).expect("coerce");
        assert_eq!(coerced.warning, Some(WarningKind::ArrayToCheckboxes));
        let FieldValue::Checkboxes(states) = coerced.value else {
            panic!("expected checkboxes");
        };
        assert_eq!(states.get("a"), Some(&CheckState::Done));
        assert_eq!(states.get("b"), None);
    }

    #[test]
    fn unknown_id_in_array_payload_is_rejected() {
        let field = checkbox_field(CheckboxMode::Simple);
        let patch = Patch::SetCheckboxes {
            field_id: "tasks".to_string(),
            value: json!(["zz"]),
        };
        let err = coerce_value(&field, &patch).expect_err("should reject");
        assert_eq!(err.code, RejectionCode::InvalidValue);
    }

    #[test]
    fn empty_array_payload_is_an_empty_value_without_warning() {
        let field = checkbox_field(CheckboxMode::Simple);
        let patch = Patch::SetCheckboxes {
            field_id: "tasks".to_string(),
            value: json!([]),
        };
        let coerced = coerce_value(&field, &patch).expect("coerce");
        assert_eq!(coerced.warning, None);
        assert_eq!(coerced.value, FieldValue::Checkboxes(BTreeMap::new()));
    }

    #[test]
    fn bad_date_is_invalid_value() {
        let field = Field::new("due", FieldKind::Date(Default::default()), "Due");
        let patch = Patch::SetDate {
            field_id: "due".to_string(),
            value: "2026-02-30".to_string(),
        };
        let err = coerce_value(&field, &patch).expect_err("should reject");
        assert_eq!(err.code, RejectionCode::InvalidValue);
    }

    #[test]
    fn string_field_takes_plain_text() {
        let field = Field::new("name", FieldKind::String(TextConstraints::default()), "N");
        let patch = Patch::SetString {
            field_id: "name".to_string(),
            value: "Ada".to_string(),
        };
        let coerced = coerce_value(&field, &patch).expect("coerce");
        assert_eq!(coerced.value, FieldValue::Text("Ada".to_string()));
    }
}
