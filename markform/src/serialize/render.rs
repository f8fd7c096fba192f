//! Canonical per-entity rendering.
//!
//! Every entity has exactly one canonical text form per surface syntax.
//! The parser normalizes its retained source with these renderings, which is
//! what makes `serialize(parse(serialize(f))) == serialize(f)` hold.

use serde_json::json;

use crate::model::{
    AnswerState, ApprovalMode, CheckState, CheckboxMode, DocBlock, Field, FieldKind, FieldResponse,
    FieldValue, Group, Note, SelectOption, TableColumn, TagSyntax, DEFAULT_ROLE,
};

/// Render an open tag with pre-rendered attribute text.
fn open_tag(syntax: TagSyntax, name: &str, attrs: &str) -> String {
    let body = if attrs.is_empty() {
        name.to_string()
    } else {
        format!("{name} {attrs}")
    };
    match syntax {
        TagSyntax::Markdoc => format!("{{% {body} %}}"),
        TagSyntax::HtmlComment => format!("<!-- {body} -->"),
    }
}

fn close_tag(syntax: TagSyntax, name: &str) -> String {
    match syntax {
        TagSyntax::Markdoc => format!("{{% /{name} %}}"),
        TagSyntax::HtmlComment => format!("<!-- /{name} -->"),
    }
}

fn attr(key: &str, value: &serde_json::Value) -> String {
    format!("{key}={value}")
}

fn str_attr(key: &str, value: &str) -> String {
    attr(key, &json!(value))
}

fn options_value(options: &[SelectOption]) -> serde_json::Value {
    if options.iter().all(|opt| opt.label.is_none()) {
        json!(options.iter().map(|opt| opt.id.as_str()).collect::<Vec<_>>())
    } else {
        json!(options)
    }
}

fn columns_value(columns: &[TableColumn]) -> serde_json::Value {
    if columns.iter().all(|col| col.label.is_none()) {
        json!(columns.iter().map(|col| col.id.as_str()).collect::<Vec<_>>())
    } else {
        json!(columns)
    }
}

fn push_opt<T: serde::Serialize>(attrs: &mut Vec<String>, key: &str, value: &Option<T>) {
    if let Some(value) = value {
        attrs.push(attr(key, &json!(value)));
    }
}

pub fn render_form_open(syntax: TagSyntax, id: &str) -> String {
    open_tag(syntax, "form", &str_attr("id", id))
}

pub fn render_form_close(syntax: TagSyntax) -> String {
    close_tag(syntax, "form")
}

pub fn render_group_open(syntax: TagSyntax, group: &Group) -> String {
    let mut attrs = vec![str_attr("id", &group.id)];
    if let Some(title) = &group.title {
        attrs.push(str_attr("title", title));
    }
    open_tag(syntax, "group", &attrs.join(" "))
}

pub fn render_group_close(syntax: TagSyntax) -> String {
    close_tag(syntax, "group")
}

pub fn render_note(syntax: TagSyntax, note: &Note) -> String {
    let attrs = [
        str_attr("id", &note.id),
        str_attr("ref", &note.ref_id),
        str_attr("role", &note.role),
    ]
    .join(" ");
    format!(
        "{}{}{}",
        open_tag(syntax, "note", &attrs),
        note.text,
        close_tag(syntax, "note")
    )
}

pub fn render_doc(syntax: TagSyntax, doc: &DocBlock) -> String {
    format!(
        "{}\n{}\n{}",
        open_tag(syntax, "doc", &str_attr("id", &doc.id)),
        doc.text,
        close_tag(syntax, "doc")
    )
}

/// Render a complete field tag: open tag, optional value fence, close tag.
pub fn render_field(syntax: TagSyntax, field: &Field, response: &FieldResponse) -> String {
    let open = open_tag(syntax, "field", &field_attrs(field, response).join(" "));
    let close = close_tag(syntax, "field");
    let body = match (&response.state, &response.value, &response.reason) {
        (AnswerState::Answered, Some(value), _) => Some(fence(&render_value(field, value))),
        (AnswerState::Skipped, _, Some(reason)) => Some(fence(&format!("|SKIP| ({reason})"))),
        (AnswerState::Aborted, _, Some(reason)) => Some(fence(&format!("|ABORT| ({reason})"))),
        _ => None,
    };
    match body {
        Some(body) => format!("{open}\n{body}\n{close}"),
        None => format!("{open}\n{close}"),
    }
}

/// Canonical attribute list: identity, flags, kind constraints, decorations,
/// then the state attribute (skipped/aborted only).
fn field_attrs(field: &Field, response: &FieldResponse) -> Vec<String> {
    let mut attrs = vec![
        str_attr("id", &field.id),
        str_attr("kind", field.kind.name()),
        str_attr("label", &field.label),
    ];
    if field.required {
        attrs.push("required=true".to_string());
    }
    if field.role != DEFAULT_ROLE {
        attrs.push(str_attr("role", &field.role));
    }
    if field.priority != 0 {
        attrs.push(attr("priority", &json!(field.priority)));
    }
    match &field.kind {
        FieldKind::String(text) => {
            push_opt(&mut attrs, "minLength", &text.min_length);
            push_opt(&mut attrs, "maxLength", &text.max_length);
            push_opt(&mut attrs, "pattern", &text.pattern);
        }
        FieldKind::Number(num) => {
            push_opt(&mut attrs, "min", &num.min);
            push_opt(&mut attrs, "max", &num.max);
        }
        FieldKind::Date(date) => {
            push_opt(
                &mut attrs,
                "min",
                &date.min.map(|d| d.format("%Y-%m-%d").to_string()),
            );
            push_opt(
                &mut attrs,
                "max",
                &date.max.map(|d| d.format("%Y-%m-%d").to_string()),
            );
        }
        FieldKind::Year(year) => {
            push_opt(&mut attrs, "min", &year.min);
            push_opt(&mut attrs, "max", &year.max);
        }
        FieldKind::StringList(list) | FieldKind::UrlList(list) => {
            push_opt(&mut attrs, "minItems", &list.min_items);
            push_opt(&mut attrs, "maxItems", &list.max_items);
            push_opt(&mut attrs, "minLength", &list.item.min_length);
            push_opt(&mut attrs, "maxLength", &list.item.max_length);
            push_opt(&mut attrs, "pattern", &list.item.pattern);
        }
        FieldKind::Url => {}
        FieldKind::SingleSelect(select) => {
            attrs.push(attr("options", &options_value(&select.options)));
        }
        FieldKind::MultiSelect(select) => {
            attrs.push(attr("options", &options_value(&select.options)));
            push_opt(&mut attrs, "minSelections", &select.min_selections);
            push_opt(&mut attrs, "maxSelections", &select.max_selections);
        }
        FieldKind::Checkboxes(boxes) => {
            attrs.push(attr("options", &options_value(&boxes.options)));
            if boxes.mode != CheckboxMode::Simple {
                attrs.push(str_attr("mode", boxes.mode.as_str()));
            }
        }
        FieldKind::Table(table) => {
            attrs.push(attr("columns", &columns_value(&table.columns)));
            push_opt(&mut attrs, "minRows", &table.min_rows);
            push_opt(&mut attrs, "maxRows", &table.max_rows);
        }
    }
    if let Some(placeholder) = &field.placeholder {
        attrs.push(str_attr("placeholder", placeholder));
    }
    if !field.examples.is_empty() {
        attrs.push(attr("examples", &json!(field.examples)));
    }
    if field.approval == ApprovalMode::Blocking {
        attrs.push(str_attr("approvalMode", "blocking"));
    }
    match response.state {
        AnswerState::Skipped => attrs.push(str_attr("state", "skipped")),
        AnswerState::Aborted => attrs.push(str_attr("state", "aborted")),
        AnswerState::Unanswered | AnswerState::Answered => {}
    }
    attrs
}

/// Wrap value text in a fence, widening the fence if the text contains one.
fn fence(text: &str) -> String {
    let longest = text
        .lines()
        .map(|line| line.chars().take_while(|&c| c == '`').count())
        .max()
        .unwrap_or(0);
    let ticks = "`".repeat((longest + 1).max(3));
    format!("{ticks}value\n{text}\n{ticks}")
}

/// Render the value text that goes inside the fence.
pub fn render_value(field: &Field, value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) => text.clone(),
        FieldValue::Number(n) => format!("{n}"),
        FieldValue::Date(date) => date.format("%Y-%m-%d").to_string(),
        FieldValue::Year(year) => format!("{year}"),
        FieldValue::List(items) => items
            .iter()
            .map(|item| format!("- {item}"))
            .collect::<Vec<_>>()
            .join("\n"),
        FieldValue::Checkboxes(states) => {
            let mut lines = Vec::new();
            // Known options first in declared order, then unknown keys.
            let declared: Vec<&str> = match &field.kind {
                FieldKind::Checkboxes(boxes) => {
                    boxes.options.iter().map(|opt| opt.id.as_str()).collect()
                }
                _ => Vec::new(),
            };
            for id in &declared {
                if let Some(state) = states.get(*id) {
                    lines.push(checkbox_line(id, *state));
                }
            }
            for (id, state) in states {
                if !declared.contains(&id.as_str()) {
                    lines.push(checkbox_line(id, *state));
                }
            }
            lines.join("\n")
        }
        FieldValue::Table(rows) => {
            let headers: Vec<String> = match &field.kind {
                FieldKind::Table(table) => {
                    table.columns.iter().map(|col| col.id.clone()).collect()
                }
                _ => (1..=rows.first().map_or(0, Vec::len))
                    .map(|i| format!("c{i}"))
                    .collect(),
            };
            let mut lines = vec![pipe_row(&headers), pipe_separator(headers.len())];
            for row in rows {
                lines.push(pipe_row(row));
            }
            lines.join("\n")
        }
    }
}

fn checkbox_line(id: &str, state: CheckState) -> String {
    let marker = match state {
        CheckState::Todo => "[ ]",
        CheckState::Done => "[x]",
        CheckState::Yes => "[yes]",
        CheckState::No => "[no]",
    };
    format!("{marker} {id}")
}

fn pipe_row<S: AsRef<str>>(cells: &[S]) -> String {
    let escaped: Vec<String> = cells
        .iter()
        .map(|cell| cell.as_ref().replace('|', "\\|"))
        .collect();
    format!("| {} |", escaped.join(" | "))
}

fn pipe_separator(columns: usize) -> String {
    format!("|{}", " --- |".repeat(columns))
}
