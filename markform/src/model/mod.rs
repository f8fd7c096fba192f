//! Pure document model: fields, values, responses, and the parsed form.
//!
//! No I/O and no dependencies on other subsystems; everything here is plain
//! data with deterministic ordering helpers.

mod field;
mod form;
mod response;
mod value;

pub use field::{
    ApprovalMode, CheckboxConstraints, DateConstraints, Field, FieldKind, ListConstraints,
    NumberConstraints, SelectConstraints, SelectOption, TableColumn, TableConstraints,
    TextConstraints, YearConstraints, DEFAULT_ROLE,
};
pub use form::{
    default_roles, note_number, DocBlock, EntityKind, FormItem, FormSchema, Group,
    HarnessDefaults, Note, ParsedForm, RunMode, TagRegion, TagSyntax,
};
pub use response::{AnswerState, FieldResponse};
pub use value::{CheckState, CheckboxMode, FieldValue};
