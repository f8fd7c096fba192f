//! Constraint validation over a parsed form.
//!
//! The parser rejects malformed documents; this module checks the *values*
//! against their field constraints. Constraint violations are issues, not
//! errors, so a document with out-of-range answers still loads and can be
//! repaired by patches.

use regex::Regex;
use serde::Serialize;

use crate::model::{AnswerState, ApprovalMode, CheckboxConstraints, Field, FieldKind, FieldValue,
    ListConstraints, ParsedForm, SelectConstraints, TableConstraints, TextConstraints};
use crate::parse::fields::check_example;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_id: Option<String>,
    pub severity: Severity,
    pub message: String,
}

impl ValidationIssue {
    fn field_error(field_id: &str, message: impl Into<String>) -> Self {
        Self {
            field_id: Some(field_id.to_string()),
            note_id: None,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn field_warning(field_id: &str, message: impl Into<String>) -> Self {
        Self {
            field_id: Some(field_id.to_string()),
            note_id: None,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Validate every response against its field's constraints.
pub fn validate(form: &ParsedForm) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for field in form.schema.fields() {
        let response = form.response(&field.id);
        match response.state {
            AnswerState::Answered => {
                if let Some(value) = &response.value {
                    for message in validate_field_value(field, value) {
                        issues.push(ValidationIssue::field_error(&field.id, message));
                    }
                } else {
                    issues.push(ValidationIssue::field_error(
                        &field.id,
                        "answered field has no value",
                    ));
                }
            }
            AnswerState::Skipped if field.required => {
                issues.push(ValidationIssue::field_error(
                    &field.id,
                    "required field cannot be skipped",
                ));
            }
            _ => {}
        }
        check_field_structure(field, &mut issues);
    }
    issues
}

// Re-affirms the structural rules the parser enforces on tag attributes, so
// forms built or mutated programmatically report the same violations.
fn check_field_structure(field: &Field, issues: &mut Vec<ValidationIssue>) {
    if field.approval != ApprovalMode::None && !matches!(field.kind, FieldKind::Checkboxes(_)) {
        issues.push(ValidationIssue::field_error(
            &field.id,
            format!(
                "approvalMode is only valid on checkboxes, not '{}'",
                field.kind.name()
            ),
        ));
    }
    if field.kind.is_chooser() {
        if field.placeholder.is_some() {
            issues.push(ValidationIssue::field_error(
                &field.id,
                format!("placeholder is not allowed on '{}'", field.kind.name()),
            ));
        }
        if !field.examples.is_empty() {
            issues.push(ValidationIssue::field_error(
                &field.id,
                format!("examples are not allowed on '{}'", field.kind.name()),
            ));
        }
        return;
    }
    if let Some(placeholder) = &field.placeholder {
        if let Err(why) = check_example(&field.kind, placeholder) {
            issues.push(ValidationIssue::field_warning(
                &field.id,
                format!("placeholder does not parse as a value: {why}"),
            ));
        }
    }
    for example in &field.examples {
        if let Err(why) = check_example(&field.kind, example) {
            issues.push(ValidationIssue::field_error(
                &field.id,
                format!("example '{example}' does not parse as a value: {why}"),
            ));
        }
    }
}

/// Check a single value against a field's constraints. Returns one message
/// per violation; empty means valid. Shared with the patch engine.
pub fn validate_field_value(field: &Field, value: &FieldValue) -> Vec<String> {
    let mut issues = Vec::new();
    match (&field.kind, value) {
        (FieldKind::String(constraints), FieldValue::Text(text)) => {
            check_text(constraints, text, &mut issues);
        }
        (FieldKind::Number(constraints), FieldValue::Number(n)) => {
            if let Some(min) = constraints.min {
                if *n < min {
                    issues.push(format!("{n} is below min {min}"));
                }
            }
            if let Some(max) = constraints.max {
                if *n > max {
                    issues.push(format!("{n} is above max {max}"));
                }
            }
        }
        (FieldKind::Date(constraints), FieldValue::Date(date)) => {
            if let Some(min) = constraints.min {
                if *date < min {
                    issues.push(format!("{date} is before min {min}"));
                }
            }
            if let Some(max) = constraints.max {
                if *date > max {
                    issues.push(format!("{date} is after max {max}"));
                }
            }
        }
        (FieldKind::Year(constraints), FieldValue::Year(year)) => {
            if let Some(min) = constraints.min {
                if *year < min {
                    issues.push(format!("{year} is below min {min}"));
                }
            }
            if let Some(max) = constraints.max {
                if *year > max {
                    issues.push(format!("{year} is above max {max}"));
                }
            }
        }
        (FieldKind::Url, FieldValue::Text(text)) => {
            if !is_well_formed_url(text) {
                issues.push(format!("'{text}' is not a well-formed URL"));
            }
        }
        (FieldKind::StringList(constraints), FieldValue::List(items)) => {
            check_list(constraints, items, &mut issues);
        }
        (FieldKind::UrlList(constraints), FieldValue::List(items)) => {
            check_list(constraints, items, &mut issues);
            for item in items {
                if !is_well_formed_url(item) {
                    issues.push(format!("'{item}' is not a well-formed URL"));
                }
            }
        }
        (FieldKind::SingleSelect(constraints), FieldValue::Text(choice)) => {
            if !constraints.options.iter().any(|opt| opt.id == *choice) {
                issues.push(format!("'{choice}' is not one of the declared options"));
            }
        }
        (FieldKind::MultiSelect(constraints), FieldValue::List(choices)) => {
            check_selections(constraints, choices, &mut issues);
        }
        (FieldKind::Checkboxes(constraints), FieldValue::Checkboxes(states)) => {
            check_checkboxes(constraints, states, &mut issues);
        }
        (FieldKind::Table(constraints), FieldValue::Table(rows)) => {
            check_table(constraints, rows, &mut issues);
        }
        (kind, value) => {
            issues.push(format!(
                "value shape '{}' does not match field kind '{}'",
                value.shape(),
                kind.name()
            ));
        }
    }
    issues
}

fn check_text(constraints: &TextConstraints, text: &str, issues: &mut Vec<String>) {
    let len = text.chars().count();
    if let Some(min) = constraints.min_length {
        if len < min {
            issues.push(format!("length {len} is below minLength {min}"));
        }
    }
    if let Some(max) = constraints.max_length {
        if len > max {
            issues.push(format!("length {len} is above maxLength {max}"));
        }
    }
    if let Some(pattern) = &constraints.pattern {
        // Pattern validity was checked at parse time; a programmatic field
        // with an invalid pattern reports as a violation rather than a panic.
        match Regex::new(pattern) {
            Ok(regex) => {
                if !regex.is_match(text) {
                    issues.push(format!("value does not match pattern '{pattern}'"));
                }
            }
            Err(err) => issues.push(format!("invalid pattern '{pattern}': {err}")),
        }
    }
}

fn check_list(constraints: &ListConstraints, items: &[String], issues: &mut Vec<String>) {
    if let Some(min) = constraints.min_items {
        if items.len() < min {
            issues.push(format!("{} items is below minItems {min}", items.len()));
        }
    }
    if let Some(max) = constraints.max_items {
        if items.len() > max {
            issues.push(format!("{} items is above maxItems {max}", items.len()));
        }
    }
    for item in items {
        check_text(&constraints.item, item, issues);
    }
}

fn check_selections(constraints: &SelectConstraints, choices: &[String], issues: &mut Vec<String>) {
    for choice in choices {
        if !constraints.options.iter().any(|opt| opt.id == *choice) {
            issues.push(format!("'{choice}' is not one of the declared options"));
        }
    }
    for (i, choice) in choices.iter().enumerate() {
        if choices[..i].contains(choice) {
            issues.push(format!("duplicate selection '{choice}'"));
        }
    }
    if let Some(min) = constraints.min_selections {
        if choices.len() < min {
            issues.push(format!(
                "{} selections is below minSelections {min}",
                choices.len()
            ));
        }
    }
    if let Some(max) = constraints.max_selections {
        if choices.len() > max {
            issues.push(format!(
                "{} selections is above maxSelections {max}",
                choices.len()
            ));
        }
    }
}

fn check_checkboxes(
    constraints: &CheckboxConstraints,
    states: &std::collections::BTreeMap<String, crate::model::CheckState>,
    issues: &mut Vec<String>,
) {
    for (id, state) in states {
        if !constraints.options.iter().any(|opt| opt.id == *id) {
            issues.push(format!("'{id}' is not one of the declared options"));
        }
        if !constraints.mode.allows(*state) {
            issues.push(format!(
                "state '{}' is not valid in {} mode",
                state.as_str(),
                constraints.mode.as_str()
            ));
        }
    }
}

fn check_table(constraints: &TableConstraints, rows: &[Vec<String>], issues: &mut Vec<String>) {
    if let Some(min) = constraints.min_rows {
        if rows.len() < min {
            issues.push(format!("{} rows is below minRows {min}", rows.len()));
        }
    }
    if let Some(max) = constraints.max_rows {
        if rows.len() > max {
            issues.push(format!("{} rows is above maxRows {max}", rows.len()));
        }
    }
    let width = constraints.columns.len();
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            issues.push(format!(
                "row {} has {} cells, expected {width}",
                i + 1,
                row.len()
            ));
        }
    }
}

/// `scheme://rest`: lowercase scheme, non-empty remainder, no whitespace.
pub fn is_well_formed_url(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((scheme, rest)) = text.split_once("://") else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }
    let mut chars = scheme.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_lowercase()
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+.-".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CheckState, CheckboxMode, NumberConstraints, SelectOption,
    };
    use std::collections::BTreeMap;

    fn field(kind: FieldKind) -> Field {
        Field::new("f", kind, "F")
    }

    #[test]
    fn number_range_violations_are_reported() {
        let field = field(FieldKind::Number(NumberConstraints {
            min: Some(0.0),
            max: Some(10.0),
        }));
        assert!(validate_field_value(&field, &FieldValue::Number(5.0)).is_empty());
        assert_eq!(
            validate_field_value(&field, &FieldValue::Number(-1.0)).len(),
            1
        );
        assert_eq!(
            validate_field_value(&field, &FieldValue::Number(11.0)).len(),
            1
        );
    }

    #[test]
    fn pattern_uses_search_semantics() {
        let field = field(FieldKind::String(TextConstraints {
            pattern: Some("[0-9]{4}".to_string()),
            ..Default::default()
        }));
        assert!(validate_field_value(&field, &FieldValue::Text("year 2024 ok".into())).is_empty());
        assert_eq!(
            validate_field_value(&field, &FieldValue::Text("no digits".into())).len(),
            1
        );
    }

    #[test]
    fn shape_mismatch_is_a_single_issue() {
        let field = field(FieldKind::Number(NumberConstraints::default()));
        let issues = validate_field_value(&field, &FieldValue::Text("abc".into()));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("does not match field kind"));
    }

    #[test]
    fn url_well_formedness() {
        assert!(is_well_formed_url("https://example.com/a?b=c"));
        assert!(is_well_formed_url("ftp://host"));
        assert!(!is_well_formed_url("example.com"));
        assert!(!is_well_formed_url("https://"));
        assert!(!is_well_formed_url("https://exa mple.com"));
        assert!(!is_well_formed_url("HTTPS://example.com"));
    }

    #[test]
    fn multi_select_rejects_unknown_and_duplicate_choices() {
        let field = field(FieldKind::MultiSelect(SelectConstraints {
            options: vec![SelectOption::new("a"), SelectOption::new("b")],
            min_selections: None,
            max_selections: Some(2),
        }));
        let issues = validate_field_value(
            &field,
            &FieldValue::List(vec!["a".into(), "a".into(), "zz".into()]),
        );
        assert!(issues.iter().any(|m| m.contains("duplicate")));
        assert!(issues.iter().any(|m| m.contains("'zz'")));
        assert!(issues.iter().any(|m| m.contains("maxSelections")));
    }

    #[test]
    fn explicit_mode_rejects_simple_markers() {
        let field = field(FieldKind::Checkboxes(crate::model::CheckboxConstraints {
            options: vec![SelectOption::new("a")],
            mode: CheckboxMode::Explicit,
        }));
        let mut states = BTreeMap::new();
        states.insert("a".to_string(), CheckState::Done);
        let issues = validate_field_value(&field, &FieldValue::Checkboxes(states));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("not valid in explicit mode"));
    }

    #[test]
    fn programmatic_attribute_misplacement_is_reported() {
        use crate::model::{FormItem, FormSchema, ParsedForm};
        let mut schema = FormSchema::new("f1");
        let mut gated = Field::new("gated", FieldKind::Url, "Gated");
        gated.approval = ApprovalMode::Blocking;
        schema.items.push(FormItem::Field(gated));
        let mut chooser = Field::new(
            "pick",
            FieldKind::SingleSelect(SelectConstraints {
                options: vec![SelectOption::new("a")],
                min_selections: None,
                max_selections: None,
            }),
            "Pick",
        );
        chooser.placeholder = Some("a".to_string());
        chooser.examples = vec!["a".to_string()];
        schema.items.push(FormItem::Field(chooser));
        let form = ParsedForm::from_schema(schema);
        let issues = validate(&form);
        assert!(issues.iter().all(|i| i.severity == Severity::Error));
        assert!(issues.iter().any(|i| i.message.contains("approvalMode")));
        assert!(issues.iter().any(|i| i.message.contains("placeholder")));
        assert!(issues.iter().any(|i| i.message.contains("examples")));
    }

    #[test]
    fn non_parsing_example_is_an_error_but_placeholder_only_warns() {
        use crate::model::{FormItem, FormSchema, ParsedForm};
        let mut schema = FormSchema::new("f1");
        let mut year = Field::new("y", FieldKind::Year(Default::default()), "Y");
        year.placeholder = Some("soonish".to_string());
        year.examples = vec!["2024".to_string(), "someday".to_string()];
        schema.items.push(FormItem::Field(year));
        let form = ParsedForm::from_schema(schema);
        let issues = validate(&form);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|i| {
            i.severity == Severity::Warning && i.message.contains("placeholder")
        }));
        assert!(issues.iter().any(|i| {
            i.severity == Severity::Error && i.message.contains("'someday'")
        }));
    }

    #[test]
    fn required_skip_surfaces_as_form_issue() {
        use crate::model::{FieldResponse, FormItem, FormSchema, ParsedForm};
        let mut schema = FormSchema::new("f1");
        let mut req = Field::new("x", FieldKind::String(TextConstraints::default()), "X");
        req.required = true;
        schema.items.push(FormItem::Field(req));
        let mut form = ParsedForm::from_schema(schema);
        form.responses
            .insert("x".to_string(), FieldResponse::skipped(None));
        let issues = validate(&form);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
    }
}
