//! Per-kind field tag parsing: attributes, value fences, and state inference.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{FormError, Location, ParseError, ValidationError};
use crate::model::{
    AnswerState, ApprovalMode, CheckState, CheckboxConstraints, CheckboxMode, DateConstraints,
    Field, FieldKind, FieldResponse, FieldValue, ListConstraints, NumberConstraints,
    SelectConstraints, SelectOption, TableColumn, TableConstraints, TextConstraints,
    YearConstraints, DEFAULT_ROLE,
};
use crate::parse::tags::RawTag;

/// A parsed field tag: schema definition plus initial response.
#[derive(Debug, Clone)]
pub struct ParsedFieldTag {
    pub field: Field,
    pub response: FieldResponse,
}

/// Parse a `field` open tag and its body (the text between open and close).
pub fn parse_field_tag(
    tag: &RawTag,
    body: &str,
    tag_location: Location,
) -> Result<ParsedFieldTag, FormError> {
    let mut attrs: BTreeMap<String, Value> = tag.attrs.iter().cloned().collect();

    let id = take_string(&mut attrs, "id")?
        .ok_or_else(|| ParseError::new("field tag missing 'id'", tag_location.clone()))?;
    let loc = Location::field(&id);

    let kind_name = take_string(&mut attrs, "kind")?
        .ok_or_else(|| validation(&loc, "field tag missing 'kind'"))?;
    let label = take_string(&mut attrs, "label")?.unwrap_or_else(|| id.clone());
    let required = take_bool(&mut attrs, "required", &loc)?.unwrap_or(false);
    let role = take_string(&mut attrs, "role")?.unwrap_or_else(|| DEFAULT_ROLE.to_string());
    let priority = take_i64(&mut attrs, "priority", &loc)?.unwrap_or(0);
    let placeholder = take_string(&mut attrs, "placeholder")?;
    let examples = take_string_array(&mut attrs, "examples", &loc)?.unwrap_or_default();
    let approval = match take_string(&mut attrs, "approvalMode")?.as_deref() {
        None | Some("none") => ApprovalMode::None,
        Some("blocking") => ApprovalMode::Blocking,
        Some(other) => {
            return Err(validation(&loc, format!("unknown approvalMode '{other}'")).into());
        }
    };
    let state_attr = take_string(&mut attrs, "state")?;

    let kind = parse_kind(&kind_name, &mut attrs, &loc)?;

    if let Some((key, _)) = attrs.iter().next() {
        return Err(validation(
            &loc,
            format!("unknown attribute '{key}' on field of kind {kind_name}"),
        )
        .into());
    }

    let field = Field {
        id: id.clone(),
        kind,
        label,
        required,
        role,
        priority,
        placeholder,
        examples,
        approval,
    };
    check_structure(&field, &loc)?;

    let response = resolve_response(&field, state_attr.as_deref(), body, &loc)?;
    Ok(ParsedFieldTag { field, response })
}

fn parse_kind(
    name: &str,
    attrs: &mut BTreeMap<String, Value>,
    loc: &Location,
) -> Result<FieldKind, FormError> {
    let kind = match name {
        "string" => FieldKind::String(take_text_constraints(attrs, loc)?),
        "number" => FieldKind::Number(NumberConstraints {
            min: take_f64(attrs, "min", loc)?,
            max: take_f64(attrs, "max", loc)?,
        }),
        "date" => FieldKind::Date(DateConstraints {
            min: take_date(attrs, "min", loc)?,
            max: take_date(attrs, "max", loc)?,
        }),
        "year" => FieldKind::Year(YearConstraints {
            min: take_i32(attrs, "min", loc)?,
            max: take_i32(attrs, "max", loc)?,
        }),
        "string_list" => FieldKind::StringList(take_list_constraints(attrs, loc)?),
        "url" => FieldKind::Url,
        "url_list" => FieldKind::UrlList(take_list_constraints(attrs, loc)?),
        "single_select" => FieldKind::SingleSelect(SelectConstraints {
            options: take_options(attrs, "options", loc)?,
            min_selections: None,
            max_selections: None,
        }),
        "multi_select" => FieldKind::MultiSelect(SelectConstraints {
            options: take_options(attrs, "options", loc)?,
            min_selections: take_usize(attrs, "minSelections", loc)?,
            max_selections: take_usize(attrs, "maxSelections", loc)?,
        }),
        "checkboxes" => FieldKind::Checkboxes(CheckboxConstraints {
            options: take_options(attrs, "options", loc)?,
            mode: match take_string(attrs, "mode")?.as_deref() {
                None | Some("simple") => CheckboxMode::Simple,
                Some("multi") => CheckboxMode::Multi,
                Some("explicit") => CheckboxMode::Explicit,
                Some(other) => {
                    return Err(
                        validation(loc, format!("unknown checkboxes mode '{other}'")).into(),
                    );
                }
            },
        }),
        "table" => FieldKind::Table(TableConstraints {
            columns: take_columns(attrs, loc)?,
            min_rows: take_usize(attrs, "minRows", loc)?,
            max_rows: take_usize(attrs, "maxRows", loc)?,
        }),
        other => return Err(validation(loc, format!("unknown field kind '{other}'")).into()),
    };
    Ok(kind)
}

fn take_text_constraints(
    attrs: &mut BTreeMap<String, Value>,
    loc: &Location,
) -> Result<TextConstraints, FormError> {
    let constraints = TextConstraints {
        min_length: take_usize(attrs, "minLength", loc)?,
        max_length: take_usize(attrs, "maxLength", loc)?,
        pattern: take_string(attrs, "pattern")?,
    };
    if let Some(pattern) = &constraints.pattern {
        regex::Regex::new(pattern)
            .map_err(|err| validation(loc, format!("invalid pattern: {err}")))?;
    }
    Ok(constraints)
}

fn take_list_constraints(
    attrs: &mut BTreeMap<String, Value>,
    loc: &Location,
) -> Result<ListConstraints, FormError> {
    Ok(ListConstraints {
        min_items: take_usize(attrs, "minItems", loc)?,
        max_items: take_usize(attrs, "maxItems", loc)?,
        item: take_text_constraints(attrs, loc)?,
    })
}

/// Structural checks that apply to the schema definition itself.
fn check_structure(field: &Field, loc: &Location) -> Result<(), FormError> {
    if field.kind.is_chooser() {
        if field.placeholder.is_some() {
            return Err(validation(
                loc,
                format!("placeholder not allowed on {} fields", field.kind.name()),
            )
            .into());
        }
        if !field.examples.is_empty() {
            return Err(validation(
                loc,
                format!("examples not allowed on {} fields", field.kind.name()),
            )
            .into());
        }
    }
    if field.approval == ApprovalMode::Blocking
        && !matches!(field.kind, FieldKind::Checkboxes(_))
    {
        return Err(validation(loc, "approvalMode is only valid on checkboxes fields").into());
    }
    // Examples must parse as the field's underlying type; a non-parsing
    // placeholder is only a validator warning.
    for example in &field.examples {
        if let Err(err) = check_example(&field.kind, example) {
            return Err(validation(loc, format!("example '{example}': {err}")).into());
        }
    }
    Ok(())
}

/// Whether `text` parses as the scalar type underlying `kind`.
pub fn check_example(kind: &FieldKind, text: &str) -> Result<(), String> {
    match kind {
        FieldKind::Number(_) => text
            .trim()
            .parse::<f64>()
            .map(|_| ())
            .map_err(|_| "not a number".to_string()),
        FieldKind::Date(_) => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .map(|_| ())
            .map_err(|_| "not a YYYY-MM-DD date".to_string()),
        FieldKind::Year(_) => text
            .trim()
            .parse::<i32>()
            .map(|_| ())
            .map_err(|_| "not a year".to_string()),
        FieldKind::Url | FieldKind::UrlList(_) => {
            if crate::validate::is_well_formed_url(text.trim()) {
                Ok(())
            } else {
                Err("not a well-formed URL".to_string())
            }
        }
        _ => Ok(()),
    }
}

/// Skip/abort sentinel found in a field body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SentinelKind {
    Skip,
    Abort,
}

#[derive(Debug, Clone)]
enum BodyContent {
    Empty,
    Sentinel(SentinelKind, Option<String>),
    Value(String),
}

fn classify_body(body: &str, loc: &Location) -> Result<BodyContent, FormError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(BodyContent::Empty);
    }
    let inner = if trimmed.starts_with("```") {
        parse_fence(trimmed, loc)?
    } else if let Some(sentinel) = parse_sentinel(trimmed) {
        return Ok(BodyContent::Sentinel(sentinel.0, sentinel.1));
    } else {
        return Err(validation(loc, "field content must be a fenced value block").into());
    };
    if let Some((kind, reason)) = parse_sentinel(inner.trim()) {
        return Ok(BodyContent::Sentinel(kind, reason));
    }
    Ok(BodyContent::Value(inner))
}

fn parse_fence(text: &str, loc: &Location) -> Result<String, FormError> {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or_default();
    let ticks: String = first.chars().take_while(|&c| c == '`').collect();
    let mut content: Vec<&str> = Vec::new();
    let mut closed = false;
    for line in lines {
        if line.trim_end() == ticks {
            closed = true;
            break;
        }
        content.push(line);
    }
    if !closed {
        return Err(validation(loc, "unterminated value fence").into());
    }
    // Anything after the closing fence that is not whitespace is unexpected.
    let after = text
        .rsplit_once(&format!("\n{ticks}"))
        .map(|(_, rest)| rest)
        .unwrap_or_default();
    if !after.trim().is_empty() {
        return Err(validation(loc, "unexpected content after value fence").into());
    }
    Ok(content.join("\n"))
}

fn parse_sentinel(text: &str) -> Option<(SentinelKind, Option<String>)> {
    let kind = if let Some(rest) = text.strip_prefix("|SKIP|") {
        (SentinelKind::Skip, rest)
    } else if let Some(rest) = text.strip_prefix("|ABORT|") {
        (SentinelKind::Abort, rest)
    } else {
        return None;
    };
    let rest = kind.1.trim();
    if rest.is_empty() {
        return Some((kind.0, None));
    }
    let reason = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some((kind.0, Some(reason.trim().to_string())))
}

/// State-attribute inference: combine the `state` attribute with the body
/// content per the documented rules.
fn resolve_response(
    field: &Field,
    state_attr: Option<&str>,
    body: &str,
    loc: &Location,
) -> Result<FieldResponse, FormError> {
    let content = classify_body(body, loc)?;
    let declared = match state_attr {
        None => None,
        Some("skipped") => Some(AnswerState::Skipped),
        Some("aborted") => Some(AnswerState::Aborted),
        Some(other) => {
            return Err(validation(loc, format!("unknown state '{other}'")).into());
        }
    };

    let response = match (declared, content) {
        (None, BodyContent::Empty) => FieldResponse::unanswered(),
        (None, BodyContent::Value(text)) => {
            let value = parse_value(&field.kind, &text)
                .map_err(|msg| validation(loc, msg))?;
            FieldResponse::answered(value)
        }
        (Some(_), BodyContent::Value(_)) => {
            return Err(validation(loc, "state not allowed on filled field").into());
        }
        (None, BodyContent::Sentinel(SentinelKind::Skip, reason))
        | (Some(AnswerState::Skipped), BodyContent::Sentinel(SentinelKind::Skip, reason)) => {
            FieldResponse::skipped(reason)
        }
        (None, BodyContent::Sentinel(SentinelKind::Abort, reason))
        | (Some(AnswerState::Aborted), BodyContent::Sentinel(SentinelKind::Abort, reason)) => {
            FieldResponse::aborted(reason)
        }
        (Some(state), BodyContent::Sentinel(..)) => {
            return Err(validation(
                loc,
                format!("state \"{}\" conflicts with sentinel content", state.as_str()),
            )
            .into());
        }
        (Some(AnswerState::Skipped), BodyContent::Empty) => FieldResponse::skipped(None),
        (Some(AnswerState::Aborted), BodyContent::Empty) => FieldResponse::aborted(None),
        (Some(state), BodyContent::Empty) => {
            return Err(validation(loc, format!("unknown state '{}'", state.as_str())).into());
        }
    };

    if response.state == AnswerState::Skipped && field.required {
        return Err(validation(loc, "required field cannot be skipped").into());
    }
    Ok(response)
}

/// Parse fenced value text according to the field kind.
pub fn parse_value(kind: &FieldKind, text: &str) -> Result<FieldValue, String> {
    match kind {
        FieldKind::String(_) => Ok(FieldValue::Text(text.to_string())),
        FieldKind::Number(_) => text
            .trim()
            .parse::<f64>()
            .map(FieldValue::Number)
            .map_err(|_| format!("'{}' is not a number", text.trim())),
        FieldKind::Date(_) => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .map(FieldValue::Date)
            .map_err(|_| format!("'{}' is not a valid YYYY-MM-DD date", text.trim())),
        FieldKind::Year(_) => text
            .trim()
            .parse::<i32>()
            .map(FieldValue::Year)
            .map_err(|_| format!("'{}' is not a year", text.trim())),
        FieldKind::Url | FieldKind::SingleSelect(_) => {
            let line = text.trim();
            if line.is_empty() || line.contains('\n') {
                return Err("expected a single non-empty line".to_string());
            }
            Ok(FieldValue::Text(line.to_string()))
        }
        FieldKind::StringList(_) | FieldKind::UrlList(_) | FieldKind::MultiSelect(_) => {
            let mut items = Vec::new();
            for line in text.lines().filter(|line| !line.trim().is_empty()) {
                let item = line
                    .trim()
                    .strip_prefix("- ")
                    .ok_or_else(|| format!("list line '{}' must start with '- '", line.trim()))?;
                items.push(item.to_string());
            }
            Ok(FieldValue::List(items))
        }
        FieldKind::Checkboxes(_) => {
            let mut states = BTreeMap::new();
            for line in text.lines().filter(|line| !line.trim().is_empty()) {
                let (state, option) = parse_checkbox_line(line.trim())?;
                if states.insert(option.clone(), state).is_some() {
                    return Err(format!("duplicate checkbox option '{option}'"));
                }
            }
            Ok(FieldValue::Checkboxes(states))
        }
        FieldKind::Table(_) => parse_table(text),
    }
}

fn parse_checkbox_line(line: &str) -> Result<(CheckState, String), String> {
    let markers = [
        ("[x] ", CheckState::Done),
        ("[ ] ", CheckState::Todo),
        ("[yes] ", CheckState::Yes),
        ("[no] ", CheckState::No),
    ];
    for (marker, state) in markers {
        if let Some(option) = line.strip_prefix(marker) {
            let option = option.trim();
            if option.is_empty() {
                return Err(format!("checkbox line '{line}' is missing an option id"));
            }
            return Ok((state, option.to_string()));
        }
    }
    Err(format!(
        "checkbox line '{line}' must start with [x], [ ], [yes], or [no]"
    ))
}

fn parse_table(text: &str) -> Result<FieldValue, String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.len() < 2 {
        return Err("table value needs a header row and a separator row".to_string());
    }
    let header = parse_pipe_row(lines[0])?;
    if !lines[1].chars().all(|c| matches!(c, '|' | '-' | ' ' | ':')) {
        return Err("second table line must be a separator row".to_string());
    }
    let mut rows = Vec::new();
    for line in &lines[2..] {
        let row = parse_pipe_row(line)?;
        if row.len() != header.len() {
            return Err(format!(
                "table row has {} cells, expected {}",
                row.len(),
                header.len()
            ));
        }
        rows.push(row);
    }
    Ok(FieldValue::Table(rows))
}

fn parse_pipe_row(line: &str) -> Result<Vec<String>, String> {
    let inner = line
        .strip_prefix('|')
        .and_then(|rest| rest.strip_suffix('|'))
        .ok_or_else(|| format!("table row '{line}' must be pipe-delimited"))?;
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut escape = false;
    for c in inner.chars() {
        match (escape, c) {
            (true, _) => {
                current.push(c);
                escape = false;
            }
            (false, '\\') => escape = true,
            (false, '|') => {
                cells.push(current.trim().to_string());
                current = String::new();
            }
            (false, _) => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    Ok(cells)
}

fn validation(loc: &Location, message: impl Into<String>) -> ValidationError {
    ValidationError::new(message, loc.clone())
}

// --- attribute readers -----------------------------------------------------

fn take_string(
    attrs: &mut BTreeMap<String, Value>,
    key: &str,
) -> Result<Option<String>, FormError> {
    match attrs.remove(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(validation(
            &Location::default(),
            format!("attribute '{key}' must be a string, got {other}"),
        )
        .into()),
    }
}

fn take_bool(
    attrs: &mut BTreeMap<String, Value>,
    key: &str,
    loc: &Location,
) -> Result<Option<bool>, FormError> {
    match attrs.remove(key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(other) => {
            Err(validation(loc, format!("attribute '{key}' must be a boolean, got {other}")).into())
        }
    }
}

fn take_f64(
    attrs: &mut BTreeMap<String, Value>,
    key: &str,
    loc: &Location,
) -> Result<Option<f64>, FormError> {
    match attrs.remove(key) {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => {
            Err(validation(loc, format!("attribute '{key}' must be a number, got {other}")).into())
        }
    }
}

fn take_i64(
    attrs: &mut BTreeMap<String, Value>,
    key: &str,
    loc: &Location,
) -> Result<Option<i64>, FormError> {
    match attrs.remove(key) {
        None => Ok(None),
        Some(Value::Number(n)) if n.is_i64() => Ok(n.as_i64()),
        Some(other) => {
            Err(validation(loc, format!("attribute '{key}' must be an integer, got {other}")).into())
        }
    }
}

fn take_i32(
    attrs: &mut BTreeMap<String, Value>,
    key: &str,
    loc: &Location,
) -> Result<Option<i32>, FormError> {
    match take_i64(attrs, key, loc)? {
        None => Ok(None),
        Some(n) => i32::try_from(n).map(Some).map_err(|_| {
            validation(loc, format!("attribute '{key}' is out of range: {n}")).into()
        }),
    }
}

fn take_usize(
    attrs: &mut BTreeMap<String, Value>,
    key: &str,
    loc: &Location,
) -> Result<Option<usize>, FormError> {
    match take_i64(attrs, key, loc)? {
        None => Ok(None),
        Some(n) if n >= 0 => Ok(Some(n as usize)),
        Some(n) => {
            Err(validation(loc, format!("attribute '{key}' must be non-negative, got {n}")).into())
        }
    }
}

fn take_date(
    attrs: &mut BTreeMap<String, Value>,
    key: &str,
    loc: &Location,
) -> Result<Option<NaiveDate>, FormError> {
    match take_string(attrs, key)? {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                validation(loc, format!("attribute '{key}' must be a YYYY-MM-DD date")).into()
            }),
    }
}

fn take_string_array(
    attrs: &mut BTreeMap<String, Value>,
    key: &str,
    loc: &Location,
) -> Result<Option<Vec<String>>, FormError> {
    match attrs.remove(key) {
        None => Ok(None),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s),
                    other => {
                        return Err(validation(
                            loc,
                            format!("attribute '{key}' must contain strings, got {other}"),
                        )
                        .into());
                    }
                }
            }
            Ok(Some(out))
        }
        Some(other) => {
            Err(validation(loc, format!("attribute '{key}' must be an array, got {other}")).into())
        }
    }
}

/// Options accept `["a", "b"]` or `[{"id": "a", "label": "A"}, ...]`.
fn take_options(
    attrs: &mut BTreeMap<String, Value>,
    key: &str,
    loc: &Location,
) -> Result<Vec<SelectOption>, FormError> {
    let Some(value) = attrs.remove(key) else {
        return Err(validation(loc, format!("missing '{key}' attribute")).into());
    };
    let Value::Array(items) = value else {
        return Err(validation(loc, format!("attribute '{key}' must be an array")).into());
    };
    let mut options = Vec::with_capacity(items.len());
    for item in items {
        let option = match item {
            Value::String(id) => SelectOption::new(id),
            Value::Object(_) => serde_json::from_value(item)
                .map_err(|err| validation(loc, format!("invalid option: {err}")))?,
            other => {
                return Err(validation(loc, format!("invalid option value {other}")).into());
            }
        };
        options.push(option);
    }
    if options.is_empty() {
        return Err(validation(loc, format!("'{key}' must not be empty")).into());
    }
    Ok(options)
}

fn take_columns(
    attrs: &mut BTreeMap<String, Value>,
    loc: &Location,
) -> Result<Vec<TableColumn>, FormError> {
    let Some(value) = attrs.remove("columns") else {
        return Err(validation(loc, "missing 'columns' attribute").into());
    };
    let Value::Array(items) = value else {
        return Err(validation(loc, "attribute 'columns' must be an array").into());
    };
    let mut columns = Vec::with_capacity(items.len());
    for item in items {
        let column = match item {
            Value::String(id) => TableColumn { id, label: None },
            Value::Object(_) => serde_json::from_value(item)
                .map_err(|err| validation(loc, format!("invalid column: {err}")))?,
            other => {
                return Err(validation(loc, format!("invalid column value {other}")).into());
            }
        };
        columns.push(column);
    }
    if columns.is_empty() {
        return Err(validation(loc, "'columns' must not be empty").into());
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::tags::scan;

    fn field_tag(attrs_src: &str, body: &str) -> Result<ParsedFieldTag, FormError> {
        let text = format!("{{% field {attrs_src} %}}{body}{{% /field %}}");
        let (tags, _) = scan(&text, 0).expect("scan");
        parse_field_tag(&tags[0], body, Location::default())
    }

    #[test]
    fn empty_body_without_state_is_unanswered() {
        let parsed = field_tag("id=\"x\" kind=\"string\" label=\"X\"", "\n").expect("parse");
        assert_eq!(parsed.response.state, AnswerState::Unanswered);
    }

    #[test]
    fn fenced_content_is_answered() {
        let parsed = field_tag(
            "id=\"x\" kind=\"number\" label=\"X\"",
            "\n```value\n42\n```\n",
        )
        .expect("parse");
        assert_eq!(parsed.response.state, AnswerState::Answered);
        assert_eq!(parsed.response.value, Some(FieldValue::Number(42.0)));
    }

    #[test]
    fn state_with_content_is_a_validation_error() {
        let err = field_tag(
            "id=\"x\" kind=\"string\" label=\"X\" state=\"skipped\"",
            "\n```value\nfilled\n```\n",
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("state not allowed on filled field"));
    }

    #[test]
    fn skipped_state_on_required_field_is_rejected() {
        let err = field_tag(
            "id=\"x\" kind=\"string\" label=\"X\" required=true state=\"skipped\"",
            "\n",
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("required field cannot be skipped"));
    }

    #[test]
    fn aborted_state_is_allowed_on_required_field() {
        let parsed = field_tag(
            "id=\"x\" kind=\"string\" label=\"X\" required=true state=\"aborted\"",
            "\n",
        )
        .expect("parse");
        assert_eq!(parsed.response.state, AnswerState::Aborted);
    }

    #[test]
    fn sentinel_with_reason_sets_skip_reason() {
        let parsed = field_tag(
            "id=\"x\" kind=\"string\" label=\"X\"",
            "\n```value\n|SKIP| (not applicable)\n```\n",
        )
        .expect("parse");
        assert_eq!(parsed.response.state, AnswerState::Skipped);
        assert_eq!(parsed.response.reason.as_deref(), Some("not applicable"));
    }

    #[test]
    fn conflicting_state_and_sentinel_is_rejected() {
        let err = field_tag(
            "id=\"x\" kind=\"string\" label=\"X\" state=\"aborted\"",
            "\n```value\n|SKIP|\n```\n",
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("conflicts with sentinel"));
    }

    #[test]
    fn placeholder_on_chooser_kind_is_rejected() {
        let err = field_tag(
            "id=\"x\" kind=\"single_select\" label=\"X\" options=[\"a\"] placeholder=\"pick\"",
            "\n",
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("placeholder not allowed"));
    }

    #[test]
    fn non_numeric_example_on_number_field_is_a_hard_error() {
        let err = field_tag(
            "id=\"x\" kind=\"number\" label=\"X\" examples=[\"abc\"]",
            "\n",
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("example"));
    }

    #[test]
    fn non_parsing_placeholder_is_not_a_parse_error() {
        let parsed = field_tag(
            "id=\"x\" kind=\"number\" label=\"X\" placeholder=\"e.g., 123...\"",
            "\n",
        )
        .expect("parse");
        assert_eq!(parsed.field.placeholder.as_deref(), Some("e.g., 123..."));
    }

    #[test]
    fn approval_mode_requires_checkboxes() {
        let err = field_tag(
            "id=\"x\" kind=\"string\" label=\"X\" approvalMode=\"blocking\"",
            "\n",
        )
        .expect_err("should fail");
        assert!(err.to_string().contains("only valid on checkboxes"));
    }

    #[test]
    fn year_bound_outside_i32_is_rejected_not_truncated() {
        let err = field_tag("id=\"x\" kind=\"year\" label=\"X\" min=4294967299", "\n")
            .expect_err("should fail");
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let err = field_tag("id=\"x\" kind=\"string\" label=\"X\" bogus=1", "\n")
            .expect_err("should fail");
        assert!(err.to_string().contains("unknown attribute 'bogus'"));
    }

    #[test]
    fn checkbox_value_lines_parse_states() {
        let kind = FieldKind::Checkboxes(CheckboxConstraints {
            options: vec![SelectOption::new("a"), SelectOption::new("b")],
            mode: CheckboxMode::Simple,
        });
        let value = parse_value(&kind, "[x] a\n[ ] b").expect("parse");
        let FieldValue::Checkboxes(states) = value else {
            panic!("expected checkboxes");
        };
        assert_eq!(states.get("a"), Some(&CheckState::Done));
        assert_eq!(states.get("b"), Some(&CheckState::Todo));
    }

    #[test]
    fn table_value_round_trips_cells() {
        let kind = FieldKind::Table(TableConstraints {
            columns: vec![
                TableColumn {
                    id: "name".into(),
                    label: None,
                },
                TableColumn {
                    id: "age".into(),
                    label: None,
                },
            ],
            min_rows: None,
            max_rows: None,
        });
        let value = parse_value(&kind, "| name | age |\n| --- | --- |\n| Ada | 36 |")
            .expect("parse");
        assert_eq!(
            value,
            FieldValue::Table(vec![vec!["Ada".to_string(), "36".to_string()]])
        );
    }

    #[test]
    fn list_lines_require_dash_prefix() {
        let kind = FieldKind::StringList(ListConstraints::default());
        assert!(parse_value(&kind, "- one\n- two").is_ok());
        assert!(parse_value(&kind, "one").is_err());
    }
}
