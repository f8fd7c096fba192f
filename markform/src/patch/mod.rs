//! The patch protocol: typed operations agents emit, plus the apply result
//! vocabulary.

pub mod apply;
pub mod coerce;

pub use apply::apply;

use serde::{Deserialize, Serialize};

use crate::model::ParsedForm;

/// One mutation request. Set operations are typed per field kind; structured
/// kinds take JSON payloads that the coercion layer narrows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Patch {
    SetString { field_id: String, value: String },
    SetNumber { field_id: String, value: f64 },
    SetDate { field_id: String, value: String },
    SetYear { field_id: String, value: i32 },
    SetUrl { field_id: String, value: String },
    SetSingleSelect { field_id: String, value: String },
    SetStringList { field_id: String, value: serde_json::Value },
    SetUrlList { field_id: String, value: serde_json::Value },
    SetMultiSelect { field_id: String, value: serde_json::Value },
    SetCheckboxes { field_id: String, value: serde_json::Value },
    SetTable { field_id: String, value: serde_json::Value },
    ClearField { field_id: String },
    SkipField {
        field_id: String,
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    AbortField {
        field_id: String,
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    AddNote {
        #[serde(rename = "ref")]
        ref_id: String,
        role: String,
        text: String,
    },
    RemoveNote { note_id: String },
}

impl Patch {
    pub fn op(&self) -> &'static str {
        match self {
            Patch::SetString { .. } => "set_string",
            Patch::SetNumber { .. } => "set_number",
            Patch::SetDate { .. } => "set_date",
            Patch::SetYear { .. } => "set_year",
            Patch::SetUrl { .. } => "set_url",
            Patch::SetSingleSelect { .. } => "set_single_select",
            Patch::SetStringList { .. } => "set_string_list",
            Patch::SetUrlList { .. } => "set_url_list",
            Patch::SetMultiSelect { .. } => "set_multi_select",
            Patch::SetCheckboxes { .. } => "set_checkboxes",
            Patch::SetTable { .. } => "set_table",
            Patch::ClearField { .. } => "clear_field",
            Patch::SkipField { .. } => "skip_field",
            Patch::AbortField { .. } => "abort_field",
            Patch::AddNote { .. } => "add_note",
            Patch::RemoveNote { .. } => "remove_note",
        }
    }

    /// The entity id this patch targets, for diagnostics.
    pub fn target(&self) -> &str {
        match self {
            Patch::SetString { field_id, .. }
            | Patch::SetNumber { field_id, .. }
            | Patch::SetDate { field_id, .. }
            | Patch::SetYear { field_id, .. }
            | Patch::SetUrl { field_id, .. }
            | Patch::SetSingleSelect { field_id, .. }
            | Patch::SetStringList { field_id, .. }
            | Patch::SetUrlList { field_id, .. }
            | Patch::SetMultiSelect { field_id, .. }
            | Patch::SetCheckboxes { field_id, .. }
            | Patch::SetTable { field_id, .. }
            | Patch::ClearField { field_id }
            | Patch::SkipField { field_id, .. }
            | Patch::AbortField { field_id, .. } => field_id,
            Patch::AddNote { ref_id, .. } => ref_id,
            Patch::RemoveNote { note_id } => note_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    UnknownField,
    WrongOperation,
    InvalidValue,
    ConstraintViolation,
    RequiredSkip,
    UnknownRef,
    UnknownRole,
}

/// A patch that did not apply. Rejections are per-patch; the rest of the
/// batch still applies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    /// Index of the patch within the submitted batch.
    pub index: usize,
    pub op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    pub code: RejectionCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    StringToList,
    BoolToCheckboxes,
    ArrayToCheckboxes,
    UnknownNote,
}

/// A patch that applied with a lossy or unusual interpretation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyWarning {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    /// At least one patch applied (or the batch was empty).
    Applied,
    /// Every patch in a non-empty batch was rejected.
    Rejected,
}

/// Outcome of applying a batch: the updated form plus a per-patch account.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub status: ApplyStatus,
    pub form: ParsedForm,
    /// Indexes of patches that applied.
    pub applied: Vec<usize>,
    pub rejections: Vec<Rejection>,
    pub warnings: Vec<ApplyWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_deserialize_from_tagged_json() {
        let json = r#"[
            {"op": "set_string", "fieldId": "name", "value": "Ada"},
            {"op": "set_number", "fieldId": "age", "value": 36},
            {"op": "skip_field", "fieldId": "fax", "role": "agent", "reason": "obsolete"},
            {"op": "add_note", "ref": "name", "role": "agent", "text": "verified"},
            {"op": "remove_note", "noteId": "n2"}
        ]"#;
        let patches: Vec<Patch> = serde_json::from_str(json).expect("deserialize");
        assert_eq!(patches.len(), 5);
        assert_eq!(patches[0].op(), "set_string");
        assert_eq!(patches[1].target(), "age");
        assert!(matches!(&patches[3], Patch::AddNote { ref_id, .. } if ref_id == "name"));
        assert!(matches!(&patches[4], Patch::RemoveNote { note_id } if note_id == "n2"));
    }

    #[test]
    fn unknown_op_fails_to_deserialize() {
        let json = r#"{"op": "set_everything", "fieldId": "x", "value": 1}"#;
        assert!(serde_json::from_str::<Patch>(json).is_err());
    }

    #[test]
    fn patch_serialization_round_trips() {
        let patch = Patch::SetDate {
            field_id: "due".to_string(),
            value: "2026-01-15".to_string(),
        };
        let json = serde_json::to_string(&patch).expect("serialize");
        assert!(json.contains("\"op\":\"set_date\""));
        assert!(json.contains("\"fieldId\":\"due\""));
        let back: Patch = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, patch);
    }

    #[test]
    fn warning_kind_serializes_snake_case() {
        let json = serde_json::to_string(&WarningKind::ArrayToCheckboxes).expect("serialize");
        assert_eq!(json, "\"array_to_checkboxes\"");
    }
}
