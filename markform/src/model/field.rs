//! Field schema definitions: kinds, constraints, and the `Field` record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::value::CheckboxMode;

/// Default role assigned to fields that declare none.
pub const DEFAULT_ROLE: &str = "agent";

/// Constraints shared by free-text kinds (`string`, list items).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextConstraints {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Regex applied with search semantics; anchor explicitly if needed.
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NumberConstraints {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DateConstraints {
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct YearConstraints {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

/// Constraints for list-shaped kinds (`string_list`, `url_list`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListConstraints {
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    /// Per-item text constraints (ignored for `url_list`, which checks URLs).
    #[serde(flatten)]
    pub item: TextConstraints,
}

/// One choosable option of a select or checkboxes field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SelectOption {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectConstraints {
    pub options: Vec<SelectOption>,
    /// Only meaningful for `multi_select`.
    pub min_selections: Option<usize>,
    pub max_selections: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckboxConstraints {
    pub options: Vec<SelectOption>,
    pub mode: CheckboxMode,
}

/// One column of a table field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableConstraints {
    pub columns: Vec<TableColumn>,
    pub min_rows: Option<usize>,
    pub max_rows: Option<usize>,
}

/// Closed set of field kinds, each carrying its constraints. Every subsystem
/// (parse, render, validate, coerce, patch dispatch) matches exhaustively so
/// adding a kind is a compile-time-visible change everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    String(TextConstraints),
    Number(NumberConstraints),
    Date(DateConstraints),
    Year(YearConstraints),
    StringList(ListConstraints),
    Url,
    UrlList(ListConstraints),
    SingleSelect(SelectConstraints),
    MultiSelect(SelectConstraints),
    Checkboxes(CheckboxConstraints),
    Table(TableConstraints),
}

impl FieldKind {
    /// Wire name of the kind, matching the `kind` tag attribute.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String(_) => "string",
            FieldKind::Number(_) => "number",
            FieldKind::Date(_) => "date",
            FieldKind::Year(_) => "year",
            FieldKind::StringList(_) => "string_list",
            FieldKind::Url => "url",
            FieldKind::UrlList(_) => "url_list",
            FieldKind::SingleSelect(_) => "single_select",
            FieldKind::MultiSelect(_) => "multi_select",
            FieldKind::Checkboxes(_) => "checkboxes",
            FieldKind::Table(_) => "table",
        }
    }

    /// The patch operation that answers a field of this kind.
    pub fn set_op(&self) -> &'static str {
        match self {
            FieldKind::String(_) => "set_string",
            FieldKind::Number(_) => "set_number",
            FieldKind::Date(_) => "set_date",
            FieldKind::Year(_) => "set_year",
            FieldKind::StringList(_) => "set_string_list",
            FieldKind::Url => "set_url",
            FieldKind::UrlList(_) => "set_url_list",
            FieldKind::SingleSelect(_) => "set_single_select",
            FieldKind::MultiSelect(_) => "set_multi_select",
            FieldKind::Checkboxes(_) => "set_checkboxes",
            FieldKind::Table(_) => "set_table",
        }
    }

    /// Chooser kinds carry option lists and reject `placeholder`/`examples`.
    pub fn is_chooser(&self) -> bool {
        matches!(
            self,
            FieldKind::SingleSelect(_) | FieldKind::MultiSelect(_) | FieldKind::Checkboxes(_)
        )
    }
}

/// Whether a checkboxes field acts as an approval gate for later fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    #[default]
    None,
    Blocking,
}

/// Schema-level field definition. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
    #[serde(default)]
    pub approval: ApprovalMode,
}

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

impl Field {
    pub fn new(id: impl Into<String>, kind: FieldKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            required: false,
            role: default_role(),
            priority: 0,
            placeholder: None,
            examples: Vec::new(),
            approval: ApprovalMode::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_set_ops() {
        let kind = FieldKind::Checkboxes(CheckboxConstraints::default());
        assert_eq!(kind.name(), "checkboxes");
        assert_eq!(kind.set_op(), "set_checkboxes");
    }

    #[test]
    fn choosers_are_the_option_kinds() {
        assert!(FieldKind::SingleSelect(SelectConstraints::default()).is_chooser());
        assert!(FieldKind::MultiSelect(SelectConstraints::default()).is_chooser());
        assert!(FieldKind::Checkboxes(CheckboxConstraints::default()).is_chooser());
        assert!(!FieldKind::Table(TableConstraints::default()).is_chooser());
        assert!(!FieldKind::Url.is_chooser());
    }

    #[test]
    fn new_field_defaults_to_agent_role() {
        let field = Field::new("name", FieldKind::String(TextConstraints::default()), "Name");
        assert_eq!(field.role, "agent");
        assert!(!field.required);
        assert_eq!(field.approval, ApprovalMode::None);
    }
}
