//! The in-memory document: schema, responses, notes, and position metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::field::Field;
use crate::model::response::{AnswerState, FieldResponse};

/// Declared run mode from frontmatter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Interactive,
    #[default]
    Fill,
    Research,
}

/// Harness budgets declared in frontmatter. All positive when present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HarnessDefaults {
    pub max_turns: Option<u32>,
    pub max_patches_per_turn: Option<u32>,
    pub max_issues_per_turn: Option<u32>,
}

/// A titled collection of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub fields: Vec<Field>,
}

/// Addressable free-prose block (`doc` tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocBlock {
    pub id: String,
    pub text: String,
}

/// Top-level body item of a form, in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormItem {
    Group(Group),
    Field(Field),
    Doc(DocBlock),
}

/// Parsed frontmatter plus the form body structure. Immutable once parsed;
/// patches only ever touch responses and notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub id: String,
    pub spec_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub run_mode: RunMode,
    pub roles: Vec<String>,
    #[serde(default)]
    pub role_instructions: BTreeMap<String, String>,
    #[serde(default)]
    pub harness: HarnessDefaults,
    pub items: Vec<FormItem>,
}

impl FormSchema {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            spec_version: crate::SPEC_VERSION.to_string(),
            title: None,
            description: None,
            run_mode: RunMode::default(),
            roles: default_roles(),
            role_instructions: BTreeMap::new(),
            harness: HarnessDefaults::default(),
            items: Vec::new(),
        }
    }

    /// All fields in document order, flattening groups.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.items.iter().flat_map(|item| match item {
            FormItem::Group(group) => group.fields.iter().collect::<Vec<_>>(),
            FormItem::Field(field) => vec![field],
            FormItem::Doc(_) => Vec::new(),
        })
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields().find(|field| field.id == id)
    }

    pub fn docs(&self) -> impl Iterator<Item = &DocBlock> {
        self.items.iter().filter_map(|item| match item {
            FormItem::Doc(doc) => Some(doc),
            _ => None,
        })
    }
}

pub fn default_roles() -> Vec<String> {
    vec!["agent".to_string(), "user".to_string()]
}

/// A free-standing annotation attached to a field, group, doc, or the form.
/// General-purpose: never auto-deleted as a side effect of other operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(rename = "ref")]
    pub ref_id: String,
    pub role: String,
    pub text: String,
}

/// Extract the numeric suffix of a note id (`n12` -> 12).
pub fn note_number(id: &str) -> Option<u64> {
    id.strip_prefix('n')?.parse().ok()
}

/// Entity class of an addressable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Form,
    Group,
    Field,
    Note,
    Documentation,
}

/// Which surface syntax the source document used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSyntax {
    #[default]
    Markdoc,
    HtmlComment,
}

/// Byte range in the body of `raw_source` that an entity's canonical
/// serialization replaces. `close_start` marks the close tag of container
/// tags (used to insert new notes before the form close).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRegion {
    pub tag_id: String,
    pub entity: EntityKind,
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_start: Option<usize>,
}

/// The full in-memory document. Created by the parser (or programmatically
/// via [`ParsedForm::from_schema`]), mutated only through the patch engine,
/// serialized back to text by the serializer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedForm {
    pub schema: FormSchema,
    /// Unified response map; absence means unanswered.
    pub responses: BTreeMap<String, FieldResponse>,
    pub notes: Vec<Note>,
    /// Document order of all addressable entity ids.
    pub order_index: Vec<String>,
    /// Entity class per id, for fast ref resolution.
    pub id_index: BTreeMap<String, EntityKind>,
    /// Body text (frontmatter excluded), syntax-normalized at parse time.
    /// Absent for programmatically built forms.
    pub raw_source: Option<String>,
    /// Original frontmatter block, reused verbatim by splice serialization.
    pub raw_frontmatter: Option<String>,
    pub tag_regions: Vec<TagRegion>,
    pub syntax: TagSyntax,
}

impl ParsedForm {
    /// Build a form directly from a schema (no raw source; serialization
    /// always regenerates from scratch).
    pub fn from_schema(schema: FormSchema) -> Self {
        let mut form = Self {
            schema,
            responses: BTreeMap::new(),
            notes: Vec::new(),
            order_index: Vec::new(),
            id_index: BTreeMap::new(),
            raw_source: None,
            raw_frontmatter: None,
            tag_regions: Vec::new(),
            syntax: TagSyntax::default(),
        };
        form.rebuild_indexes();
        form
    }

    /// Recompute `order_index` and `id_index` from schema and notes.
    pub fn rebuild_indexes(&mut self) {
        self.order_index.clear();
        self.id_index.clear();
        self.order_index.push(self.schema.id.clone());
        self.id_index
            .insert(self.schema.id.clone(), EntityKind::Form);
        for item in &self.schema.items {
            match item {
                FormItem::Group(group) => {
                    self.order_index.push(group.id.clone());
                    self.id_index.insert(group.id.clone(), EntityKind::Group);
                    for field in &group.fields {
                        self.order_index.push(field.id.clone());
                        self.id_index.insert(field.id.clone(), EntityKind::Field);
                    }
                }
                FormItem::Field(field) => {
                    self.order_index.push(field.id.clone());
                    self.id_index.insert(field.id.clone(), EntityKind::Field);
                }
                FormItem::Doc(doc) => {
                    self.order_index.push(doc.id.clone());
                    self.id_index
                        .insert(doc.id.clone(), EntityKind::Documentation);
                }
            }
        }
        let mut notes: Vec<&Note> = self.notes.iter().collect();
        notes.sort_by_key(|note| note_number(&note.id).unwrap_or(u64::MAX));
        for note in notes {
            self.order_index.push(note.id.clone());
            self.id_index.insert(note.id.clone(), EntityKind::Note);
        }
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.schema.field(id)
    }

    /// Response for a field; unanswered when absent from the map.
    pub fn response(&self, field_id: &str) -> FieldResponse {
        self.responses.get(field_id).cloned().unwrap_or_default()
    }

    pub fn answer_state(&self, field_id: &str) -> AnswerState {
        self.responses
            .get(field_id)
            .map(|response| response.state)
            .unwrap_or_default()
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    /// Next sequential note id: max existing numeric suffix + 1.
    pub fn next_note_id(&self) -> String {
        let max = self
            .notes
            .iter()
            .filter_map(|note| note_number(&note.id))
            .max()
            .unwrap_or(0);
        format!("n{}", max + 1)
    }

    /// Notes sorted ascending by numeric id suffix (`n1`, `n2`, ..., `n10`).
    pub fn notes_in_order(&self) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.notes.iter().collect();
        notes.sort_by_key(|note| note_number(&note.id).unwrap_or(u64::MAX));
        notes
    }
}
