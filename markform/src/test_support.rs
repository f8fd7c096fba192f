//! Test-only helpers for constructing forms and scripted agents.

use crate::harness::{Agent, AgentTurn};
use crate::model::{
    Field, FieldKind, FormItem, FormSchema, Group, NumberConstraints, ParsedForm, TextConstraints,
};
use crate::patch::Patch;

/// A deterministic string field.
pub fn string_field(id: &str) -> Field {
    Field::new(
        id,
        FieldKind::String(TextConstraints::default()),
        format!("{id} label"),
    )
}

/// A deterministic number field with an optional range.
pub fn number_field(id: &str, min: Option<f64>, max: Option<f64>) -> Field {
    Field::new(
        id,
        FieldKind::Number(NumberConstraints { min, max }),
        format!("{id} label"),
    )
}

/// A form with the given fields at top level.
pub fn form_with_fields(fields: Vec<Field>) -> ParsedForm {
    let mut schema = FormSchema::new("test-form");
    for field in fields {
        schema.items.push(FormItem::Field(field));
    }
    ParsedForm::from_schema(schema)
}

/// A form with one group containing the given fields.
pub fn form_with_group(group_id: &str, fields: Vec<Field>) -> ParsedForm {
    let mut schema = FormSchema::new("test-form");
    schema.items.push(FormItem::Group(Group {
        id: group_id.to_string(),
        title: Some(format!("{group_id} title")),
        fields,
    }));
    ParsedForm::from_schema(schema)
}

/// Agent that replays queued patch batches, one per turn, and fails once
/// the script runs out.
pub struct ScriptedAgent {
    batches: Vec<Vec<Patch>>,
    /// Turn numbers observed, for assertions on loop behavior.
    pub turns_seen: Vec<u32>,
}

impl ScriptedAgent {
    pub fn new(batches: Vec<Vec<Patch>>) -> Self {
        Self {
            batches,
            turns_seen: Vec::new(),
        }
    }
}

impl Agent for ScriptedAgent {
    fn propose(&mut self, turn: &AgentTurn<'_>) -> anyhow::Result<Vec<Patch>> {
        self.turns_seen.push(turn.turn);
        if self.batches.is_empty() {
            anyhow::bail!("scripted agent ran out of batches at turn {}", turn.turn);
        }
        Ok(self.batches.remove(0))
    }
}
