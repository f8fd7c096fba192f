//! Progress accounting and issue selection.
//!
//! An inspection distills a form into what an agent should do next: progress
//! counts, overall state, and a prioritized list of issues. Blocking
//! checkpoints gate everything that follows them in document order.

use serde::Serialize;

use crate::model::{
    AnswerState, ApprovalMode, CheckState, CheckboxMode, EntityKind, Field, FieldKind,
    FieldResponse, FieldValue, ParsedForm,
};
use crate::validate::{Severity, validate};

/// Answer-state and validity tallies over all fields.
///
/// `total = unanswered + answered + skipped + aborted`,
/// `answered = valid + invalid`, `empty = unanswered`, and
/// `filled = total - empty` always hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressCounts {
    pub total: usize,
    pub unanswered: usize,
    pub answered: usize,
    pub skipped: usize,
    pub aborted: usize,
    pub valid: usize,
    pub invalid: usize,
    pub empty: usize,
    pub filled: usize,
}

pub fn progress(form: &ParsedForm) -> ProgressCounts {
    let invalid_ids = invalid_field_ids(form);
    let mut counts = ProgressCounts::default();
    for field in form.schema.fields() {
        counts.total += 1;
        match form.answer_state(&field.id) {
            AnswerState::Unanswered => counts.unanswered += 1,
            AnswerState::Answered => {
                counts.answered += 1;
                if invalid_ids.contains(&field.id) {
                    counts.invalid += 1;
                } else {
                    counts.valid += 1;
                }
            }
            AnswerState::Skipped => counts.skipped += 1,
            AnswerState::Aborted => counts.aborted += 1,
        }
    }
    counts.empty = counts.unanswered;
    counts.filled = counts.total - counts.empty;
    counts
}

fn invalid_field_ids(form: &ParsedForm) -> Vec<String> {
    validate(form)
        .into_iter()
        .filter(|issue| issue.severity == Severity::Error)
        .filter_map(|issue| issue.field_id)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormState {
    Complete,
    Incomplete,
    Invalid,
}

/// A form is complete when every field is answered-valid or skipped and
/// nothing was aborted.
pub fn is_form_complete(form: &ParsedForm) -> bool {
    let counts = progress(form);
    counts.aborted == 0
        && counts.invalid == 0
        && counts.answered + counts.skipped == counts.total
}

pub fn compute_form_state(form: &ParsedForm) -> FormState {
    let counts = progress(form);
    if counts.aborted > 0 || counts.invalid > 0 {
        FormState::Invalid
    } else if counts.answered + counts.skipped == counts.total {
        FormState::Complete
    } else {
        FormState::Incomplete
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    /// Work on unanswered and invalid fields only.
    #[default]
    Continue,
    /// Revisit already-filled fields too.
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Unanswered,
    Invalid,
    Refill,
}

/// One actionable item for an agent turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "ref")]
    pub ref_id: String,
    pub entity: EntityKind,
    pub kind: IssueKind,
    pub priority: i64,
    pub role: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct InspectOptions {
    /// Roles whose fields are in scope. `"*"` matches every role.
    pub roles: Vec<String>,
    pub fill_mode: FillMode,
    pub max_issues: Option<usize>,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            roles: vec!["*".to_string()],
            fill_mode: FillMode::default(),
            max_issues: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureSummary {
    pub form_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub groups: usize,
    pub fields: usize,
    pub docs: usize,
    pub notes: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectReport {
    pub structure: StructureSummary,
    pub state: FormState,
    pub progress: ProgressCounts,
    pub issues: Vec<Issue>,
}

pub fn inspect(form: &ParsedForm, options: &InspectOptions) -> InspectReport {
    InspectReport {
        structure: summarize(form),
        state: compute_form_state(form),
        progress: progress(form),
        issues: issues(form, options),
    }
}

fn summarize(form: &ParsedForm) -> StructureSummary {
    let groups = form
        .schema
        .items
        .iter()
        .filter(|item| matches!(item, crate::model::FormItem::Group(_)))
        .count();
    StructureSummary {
        form_id: form.schema.id.clone(),
        title: form.schema.title.clone(),
        groups,
        fields: form.schema.fields().count(),
        docs: form.schema.docs().count(),
        notes: form.notes.len(),
    }
}

/// Collect issues in priority order. Fields after an incomplete blocking
/// checkpoint are withheld; the checkpoint itself remains fillable.
pub fn issues(form: &ParsedForm, options: &InspectOptions) -> Vec<Issue> {
    let wildcard = options.roles.iter().any(|role| role == "*");
    let invalid_ids = invalid_field_ids(form);

    let mut collected: Vec<(usize, Issue)> = Vec::new();
    for (position, field) in form.schema.fields().enumerate() {
        let response = form.response(&field.id);
        let in_scope = wildcard || options.roles.contains(&field.role);
        if in_scope {
            if let Some(issue) = field_issue(field, &response, &invalid_ids, options.fill_mode) {
                collected.push((position, issue));
            }
        }
        if blocks_following(field, &response) {
            break;
        }
    }

    collected.sort_by(|(pos_a, a), (pos_b, b)| {
        b.priority.cmp(&a.priority).then(pos_a.cmp(pos_b))
    });
    let mut issues: Vec<Issue> = collected.into_iter().map(|(_, issue)| issue).collect();
    if let Some(max) = options.max_issues {
        issues.truncate(max);
    }
    issues
}

fn field_issue(
    field: &Field,
    response: &FieldResponse,
    invalid_ids: &[String],
    mode: FillMode,
) -> Option<Issue> {
    let make = |kind: IssueKind, message: String| Issue {
        ref_id: field.id.clone(),
        entity: EntityKind::Field,
        kind,
        priority: field.priority,
        role: field.role.clone(),
        message,
    };
    match response.state {
        AnswerState::Unanswered => Some(make(
            IssueKind::Unanswered,
            format!("'{}' is unanswered", field.label),
        )),
        AnswerState::Answered if invalid_ids.contains(&field.id) => Some(make(
            IssueKind::Invalid,
            format!("'{}' has an invalid value", field.label),
        )),
        AnswerState::Answered | AnswerState::Skipped if mode == FillMode::Overwrite => Some(make(
            IssueKind::Refill,
            format!("'{}' can be refilled", field.label),
        )),
        _ => None,
    }
}

/// Whether this field is an approval checkpoint that has not been satisfied.
fn blocks_following(field: &Field, response: &FieldResponse) -> bool {
    if field.approval != ApprovalMode::Blocking {
        return false;
    }
    let FieldKind::Checkboxes(constraints) = &field.kind else {
        return false;
    };
    let states = match &response.value {
        Some(FieldValue::Checkboxes(states)) if response.state == AnswerState::Answered => states,
        _ => return true,
    };
    match constraints.mode {
        CheckboxMode::Simple => constraints
            .options
            .iter()
            .any(|opt| states.get(&opt.id) != Some(&CheckState::Done)),
        CheckboxMode::Multi => !states.values().any(|state| *state == CheckState::Done),
        CheckboxMode::Explicit => constraints.options.iter().any(|opt| {
            !matches!(states.get(&opt.id), Some(CheckState::Yes | CheckState::No))
        }),
    }
}
