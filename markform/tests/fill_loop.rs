//! End-to-end fill loop behavior over parsed documents.

use markform::harness::{
    CancelToken, FillStatus, HarnessConfig, PartialReason, run_fill,
};
use markform::inspect::{FillMode, InspectOptions, issues};
use markform::model::AnswerState;
use markform::parse::parse;
use markform::patch::Patch;
use markform::test_support::ScriptedAgent;
use serde_json::json;

const INTAKE: &str = r#"---
markform:
  spec: "0.1"
  title: Intake
  harness:
    max_turns: 8
---
{% form id="intake" %}

{% field id="name" kind="string" label="Name" required=true %}
{% /field %}

{% field id="email" kind="string" label="Email" %}
{% /field %}

{% field id="fax" kind="string" label="Fax" %}
{% /field %}

{% /form %}
"#;

fn set(field: &str, value: &str) -> Patch {
    Patch::SetString {
        field_id: field.to_string(),
        value: value.to_string(),
    }
}

#[test]
fn fill_runs_until_every_field_is_resolved() {
    let form = parse(INTAKE).expect("parse");
    let mut agent = ScriptedAgent::new(vec![
        vec![set("name", "Ada Lovelace")],
        vec![
            set("email", "ada@example.com"),
            Patch::SkipField {
                field_id: "fax".to_string(),
                role: "agent".to_string(),
                reason: Some("nobody has a fax".to_string()),
            },
        ],
    ]);
    let outcome = run_fill(form, &mut agent, &HarnessConfig::default(), &CancelToken::new());
    assert_eq!(outcome.status, FillStatus::Complete);
    assert_eq!(outcome.turns_executed, 2);
    assert_eq!(agent.turns_seen, vec![1, 2]);
    assert_eq!(outcome.form.answer_state("fax"), AnswerState::Skipped);
}

#[test]
fn frontmatter_budget_flows_into_the_harness_config() {
    let form = parse(INTAKE).expect("parse");
    let config = HarnessConfig::from_form(&form);
    assert_eq!(config.max_turns, 8);
}

#[test]
fn rejected_only_turn_stalls_with_progress_preserved() {
    let form = parse(INTAKE).expect("parse");
    let mut agent = ScriptedAgent::new(vec![
        vec![set("name", "Ada")],
        // Wrong operation for a string field, so the whole batch rejects.
        vec![Patch::SetNumber {
            field_id: "email".to_string(),
            value: 7.0,
        }],
    ]);
    let outcome = run_fill(form, &mut agent, &HarnessConfig::default(), &CancelToken::new());
    assert_eq!(outcome.status, FillStatus::Partial(PartialReason::Stalled));
    assert_eq!(outcome.form.answer_state("name"), AnswerState::Answered);
    assert_eq!(outcome.patches_rejected, 1);
}

#[test]
fn aborted_field_ends_the_run_as_partial() {
    let form = parse(INTAKE).expect("parse");
    let mut agent = ScriptedAgent::new(vec![vec![
        set("name", "Ada"),
        set("email", "ada@example.com"),
        Patch::AbortField {
            field_id: "fax".to_string(),
            role: "agent".to_string(),
            reason: Some("unreachable records".to_string()),
        },
    ]]);
    let outcome = run_fill(form, &mut agent, &HarnessConfig::default(), &CancelToken::new());
    assert_eq!(
        outcome.status,
        FillStatus::Partial(PartialReason::AbortedFields)
    );
    assert_eq!(outcome.form.answer_state("fax"), AnswerState::Aborted);
}

const CHECKPOINTED: &str = r#"{% form id="review" %}

{% field id="draft" kind="string" label="Draft" required=true %}
{% /field %}

{% field id="signoff" kind="checkboxes" label="Sign-off" options=["reviewed"] approvalMode="blocking" %}
{% /field %}

{% field id="publish_url" kind="url" label="Publish URL" %}
{% /field %}

{% /form %}
"#;

#[test]
fn blocking_checkpoint_gates_the_loop_until_satisfied() {
    let form = parse(CHECKPOINTED).expect("parse");

    // Before the checkpoint is done, the gated field is not an issue.
    let open = issues(&form, &InspectOptions::default());
    let ids: Vec<&str> = open.iter().map(|i| i.ref_id.as_str()).collect();
    assert_eq!(ids, vec!["draft", "signoff"]);

    let mut agent = ScriptedAgent::new(vec![
        vec![set("draft", "ready for review")],
        vec![Patch::SetCheckboxes {
            field_id: "signoff".to_string(),
            value: json!({"reviewed": "done"}),
        }],
        vec![Patch::SetUrl {
            field_id: "publish_url".to_string(),
            value: "https://example.com/post".to_string(),
        }],
    ]);
    let outcome = run_fill(form, &mut agent, &HarnessConfig::default(), &CancelToken::new());
    assert_eq!(outcome.status, FillStatus::Complete);
    assert_eq!(outcome.turns_executed, 3);
}

#[test]
fn overwrite_mode_revisits_filled_fields() {
    let mut form = parse(INTAKE).expect("parse");
    form.responses.insert(
        "name".to_string(),
        markform::model::FieldResponse::answered(markform::model::FieldValue::Text("old".into())),
    );
    let options = InspectOptions {
        fill_mode: FillMode::Overwrite,
        ..Default::default()
    };
    let all = issues(&form, &options);
    assert!(all.iter().any(|i| i.ref_id == "name"));
}

#[test]
fn resumed_run_continues_the_turn_count() {
    let form = parse(INTAKE).expect("parse");
    let mut agent = ScriptedAgent::new(vec![vec![set("name", "Ada")]]);
    let config = HarnessConfig {
        start_turn: 5,
        max_turns_this_call: Some(1),
        ..Default::default()
    };
    let outcome = run_fill(form, &mut agent, &config, &CancelToken::new());
    assert_eq!(agent.turns_seen, vec![6]);
    assert_eq!(
        outcome.status,
        FillStatus::Partial(PartialReason::CallBudget)
    );
}
