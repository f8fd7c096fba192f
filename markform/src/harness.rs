//! The turn-based fill loop.
//!
//! Each turn: inspect the form, hand the issues to the agent, apply the
//! patches it proposes, repeat. The loop stops on completion, exhausted
//! budgets, cancellation, a stalled turn, or an agent failure. The form is
//! returned in every outcome, so a partial run can be serialized and resumed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::inspect::{FillMode, InspectOptions, Issue, is_form_complete, issues, progress};
use crate::model::{DEFAULT_ROLE, ParsedForm};
use crate::patch::{Patch, apply};
use crate::serialize::{SerializeOptions, serialize};

pub const DEFAULT_MAX_TURNS: u32 = 16;

/// Something that proposes patches for a turn. Implementations may shell out
/// to a subprocess, call a model, or replay a script in tests.
pub trait Agent {
    fn propose(&mut self, turn: &AgentTurn<'_>) -> anyhow::Result<Vec<Patch>>;
}

/// Everything an agent sees for one turn.
pub struct AgentTurn<'a> {
    /// 1-based turn number, counting across resumed runs.
    pub turn: u32,
    pub issues: Vec<Issue>,
    pub form: &'a ParsedForm,
    /// Current document text, for agents that read the whole form.
    pub form_text: String,
}

/// Cooperative cancellation shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Roles whose fields the agent works on.
    pub target_roles: Vec<String>,
    pub fill_mode: FillMode,
    /// Lifetime turn budget for the form, counting resumed runs.
    pub max_turns: u32,
    /// Optional tighter budget for this call; wins over `max_turns`.
    pub max_turns_this_call: Option<u32>,
    pub max_issues_per_turn: Option<usize>,
    pub max_patches_per_turn: Option<usize>,
    /// Turns already spent in earlier runs of this form.
    pub start_turn: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            target_roles: vec![DEFAULT_ROLE.to_string()],
            fill_mode: FillMode::default(),
            max_turns: DEFAULT_MAX_TURNS,
            max_turns_this_call: None,
            max_issues_per_turn: None,
            max_patches_per_turn: None,
            start_turn: 0,
        }
    }
}

impl HarnessConfig {
    /// Start from defaults, then let the form's frontmatter budgets override.
    pub fn from_form(form: &ParsedForm) -> Self {
        let defaults = form.schema.harness;
        Self {
            max_turns: defaults.max_turns.unwrap_or(DEFAULT_MAX_TURNS),
            max_issues_per_turn: defaults.max_issues_per_turn.map(|n| n as usize),
            max_patches_per_turn: defaults.max_patches_per_turn.map(|n| n as usize),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialReason {
    /// The lifetime turn budget ran out.
    MaxTurns,
    /// The per-call turn budget ran out.
    CallBudget,
    /// No issues remain but the form is not complete (aborted or
    /// out-of-scope fields).
    AbortedFields,
    /// A turn applied nothing, so another turn would see the same form.
    Stalled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStatus {
    Complete,
    Partial(PartialReason),
    Cancelled,
    Failed { error: String },
}

/// Result of a fill run. `form` carries whatever progress was made,
/// including on failure.
#[derive(Debug)]
pub struct FillOutcome {
    pub status: FillStatus,
    pub form: ParsedForm,
    pub turns_executed: u32,
    pub patches_applied: usize,
    pub patches_rejected: usize,
}

pub fn run_fill(
    form: ParsedForm,
    agent: &mut dyn Agent,
    config: &HarnessConfig,
    cancel: &CancelToken,
) -> FillOutcome {
    let mut form = form;
    let mut executed = 0u32;
    let mut patches_applied = 0usize;
    let mut patches_rejected = 0usize;

    let outcome = |status, form, executed, patches_applied, patches_rejected| FillOutcome {
        status,
        form,
        turns_executed: executed,
        patches_applied,
        patches_rejected,
    };

    let options = InspectOptions {
        roles: config.target_roles.clone(),
        fill_mode: config.fill_mode,
        max_issues: config.max_issues_per_turn,
    };

    loop {
        let turn_issues = issues(&form, &options);
        if turn_issues.is_empty() {
            let status = if is_form_complete(&form) {
                info!(turns = executed, "form complete");
                FillStatus::Complete
            } else {
                info!(turns = executed, "no issues remain but form is incomplete");
                FillStatus::Partial(PartialReason::AbortedFields)
            };
            return outcome(status, form, executed, patches_applied, patches_rejected);
        }
        if let Some(limit) = config.max_turns_this_call {
            if executed >= limit {
                return outcome(
                    FillStatus::Partial(PartialReason::CallBudget),
                    form,
                    executed,
                    patches_applied,
                    patches_rejected,
                );
            }
        }
        let turn_number = config.start_turn + executed + 1;
        if turn_number > config.max_turns {
            return outcome(
                FillStatus::Partial(PartialReason::MaxTurns),
                form,
                executed,
                patches_applied,
                patches_rejected,
            );
        }
        if cancel.is_cancelled() {
            return outcome(
                FillStatus::Cancelled,
                form,
                executed,
                patches_applied,
                patches_rejected,
            );
        }

        debug!(turn = turn_number, issues = turn_issues.len(), "starting turn");
        let turn = AgentTurn {
            turn: turn_number,
            issues: turn_issues,
            form: &form,
            form_text: serialize(&form, &SerializeOptions::default()),
        };
        let mut patches = match agent.propose(&turn) {
            Ok(patches) => patches,
            // The form keeps whatever earlier turns applied.
            Err(err) => {
                warn!(turn = turn_number, error = %err, "agent failed");
                return outcome(
                    FillStatus::Failed {
                        error: format!("{err:#}"),
                    },
                    form,
                    executed,
                    patches_applied,
                    patches_rejected,
                );
            }
        };
        if let Some(limit) = config.max_patches_per_turn {
            if patches.len() > limit {
                debug!(
                    turn = turn_number,
                    proposed = patches.len(),
                    limit,
                    "truncating patch batch"
                );
                patches.truncate(limit);
            }
        }
        executed += 1;

        let result = apply(&form, &patches);
        patches_applied += result.applied.len();
        patches_rejected += result.rejections.len();
        for rejection in &result.rejections {
            debug!(
                turn = turn_number,
                op = %rejection.op,
                code = ?rejection.code,
                "patch rejected: {}",
                rejection.message
            );
        }
        let stalled = result.applied.is_empty();
        form = result.form;
        if stalled {
            let counts = progress(&form);
            info!(
                turn = turn_number,
                filled = counts.filled,
                total = counts.total,
                "turn applied no patches, stopping"
            );
            return outcome(
                FillStatus::Partial(PartialReason::Stalled),
                form,
                executed,
                patches_applied,
                patches_rejected,
            );
        }
    }
}
