//! Batch application of patches.
//!
//! Patches apply sequentially against the evolving form, so later patches in
//! a batch see earlier results. Each patch succeeds or fails on its own; a
//! rejection never aborts the rest of the batch.

use crate::model::{EntityKind, Field, FieldResponse, Note, ParsedForm};
use crate::patch::coerce::coerce_value;
use crate::patch::{ApplyResult, ApplyStatus, ApplyWarning, Patch, Rejection, RejectionCode, WarningKind};
use crate::validate::validate_field_value;

pub fn apply(form: &ParsedForm, patches: &[Patch]) -> ApplyResult {
    let mut out = ApplyResult {
        status: ApplyStatus::Applied,
        form: form.clone(),
        applied: Vec::new(),
        rejections: Vec::new(),
        warnings: Vec::new(),
    };
    for (index, patch) in patches.iter().enumerate() {
        match apply_one(&mut out.form, index, patch, &mut out.warnings) {
            Ok(()) => out.applied.push(index),
            Err((code, message)) => out.rejections.push(Rejection {
                index,
                op: patch.op().to_string(),
                field_id: field_target(patch),
                code,
                message,
            }),
        }
    }
    if !patches.is_empty() && out.applied.is_empty() {
        out.status = ApplyStatus::Rejected;
    }
    out
}

fn field_target(patch: &Patch) -> Option<String> {
    match patch {
        Patch::AddNote { .. } | Patch::RemoveNote { .. } => None,
        other => Some(other.target().to_string()),
    }
}

type PatchFailure = (RejectionCode, String);

fn apply_one(
    form: &mut ParsedForm,
    index: usize,
    patch: &Patch,
    warnings: &mut Vec<ApplyWarning>,
) -> Result<(), PatchFailure> {
    match patch {
        Patch::ClearField { field_id } => {
            lookup_field(form, field_id)?;
            form.responses.remove(field_id);
            Ok(())
        }
        Patch::SkipField {
            field_id,
            role,
            reason,
        } => {
            let field = lookup_field(form, field_id)?;
            if field.required {
                return Err((
                    RejectionCode::RequiredSkip,
                    format!("required field '{field_id}' cannot be skipped"),
                ));
            }
            check_role(form, role)?;
            form.responses
                .insert(field_id.clone(), FieldResponse::skipped(opt(reason)));
            Ok(())
        }
        Patch::AbortField {
            field_id,
            role,
            reason,
        } => {
            lookup_field(form, field_id)?;
            check_role(form, role)?;
            form.responses
                .insert(field_id.clone(), FieldResponse::aborted(opt(reason)));
            Ok(())
        }
        Patch::AddNote { ref_id, role, text } => {
            match form.id_index.get(ref_id) {
                None => {
                    return Err((
                        RejectionCode::UnknownRef,
                        format!("note references unknown id '{ref_id}'"),
                    ));
                }
                Some(EntityKind::Note) => {
                    return Err((
                        RejectionCode::UnknownRef,
                        "notes cannot reference other notes".to_string(),
                    ));
                }
                Some(_) => {}
            }
            check_role(form, role)?;
            let note = Note {
                id: form.next_note_id(),
                ref_id: ref_id.clone(),
                role: role.clone(),
                text: text.clone(),
            };
            form.notes.push(note);
            form.rebuild_indexes();
            Ok(())
        }
        Patch::RemoveNote { note_id } => {
            let before = form.notes.len();
            form.notes.retain(|note| note.id != *note_id);
            if form.notes.len() == before {
                warnings.push(ApplyWarning {
                    index,
                    field_id: None,
                    kind: WarningKind::UnknownNote,
                    message: format!("note '{note_id}' does not exist"),
                });
                return Ok(());
            }
            form.rebuild_indexes();
            Ok(())
        }
        set_op => {
            let field_id = set_op.target().to_string();
            let field = lookup_field(form, &field_id)?.clone();
            let coerced = coerce_value(&field, set_op).map_err(|err| (err.code, err.message))?;
            let violations = validate_field_value(&field, &coerced.value);
            if !violations.is_empty() {
                return Err((RejectionCode::ConstraintViolation, violations.join("; ")));
            }
            if let Some(kind) = coerced.warning {
                warnings.push(ApplyWarning {
                    index,
                    field_id: Some(field_id.clone()),
                    kind,
                    message: format!("payload for '{field_id}' was coerced"),
                });
            }
            // Overwrites any previous state, including skipped or aborted.
            form.responses
                .insert(field_id, FieldResponse::answered(coerced.value));
            Ok(())
        }
    }
}

fn lookup_field<'a>(form: &'a ParsedForm, field_id: &str) -> Result<&'a Field, PatchFailure> {
    form.field(field_id).ok_or_else(|| {
        (
            RejectionCode::UnknownField,
            format!("no field with id '{field_id}'"),
        )
    })
}

fn check_role(form: &ParsedForm, role: &str) -> Result<(), PatchFailure> {
    if form.schema.roles.iter().any(|r| r == role) {
        return Ok(());
    }
    Err((
        RejectionCode::UnknownRole,
        format!("role '{role}' is not declared in roles"),
    ))
}

fn opt(reason: &Option<String>) -> Option<String> {
    reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}
