//! Answer state and per-field responses.
//!
//! `AnswerState` is orthogonal to the field kind: any kind can be in any
//! state. The response map is the complete representation of fill progress,
//! which is what makes harness runs resumable from serialized text alone.

use serde::{Deserialize, Serialize};

use crate::model::value::FieldValue;

/// Whether and how a field has been addressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerState {
    #[default]
    Unanswered,
    Answered,
    Skipped,
    Aborted,
}

impl AnswerState {
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerState::Unanswered => "unanswered",
            AnswerState::Answered => "answered",
            AnswerState::Skipped => "skipped",
            AnswerState::Aborted => "aborted",
        }
    }
}

/// Response attached to one field. Invariant: `value` is present iff
/// `state == Answered`; construct through the helpers to keep it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldResponse {
    pub state: AnswerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    /// Free text, conventionally used when state is skipped or aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FieldResponse {
    pub fn unanswered() -> Self {
        Self::default()
    }

    pub fn answered(value: FieldValue) -> Self {
        Self {
            state: AnswerState::Answered,
            value: Some(value),
            reason: None,
        }
    }

    pub fn skipped(reason: Option<String>) -> Self {
        Self {
            state: AnswerState::Skipped,
            value: None,
            reason,
        }
    }

    pub fn aborted(reason: Option<String>) -> Self {
        Self {
            state: AnswerState::Aborted,
            value: None,
            reason,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_present_only_when_answered() {
        assert!(FieldResponse::unanswered().value.is_none());
        assert!(FieldResponse::skipped(Some("n/a".into())).value.is_none());
        assert!(FieldResponse::aborted(None).value.is_none());

        let answered = FieldResponse::answered(FieldValue::Text("x".into()));
        assert_eq!(answered.state, AnswerState::Answered);
        assert!(answered.is_filled());
    }

    #[test]
    fn default_state_is_unanswered() {
        assert_eq!(AnswerState::default(), AnswerState::Unanswered);
        assert_eq!(AnswerState::Unanswered.as_str(), "unanswered");
    }
}
