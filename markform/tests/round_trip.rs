//! Source-preservation and canonicalization behavior over full documents.

use markform::model::{FieldResponse, FieldValue, TagSyntax};
use markform::parse::parse;
use markform::serialize::{SerializeOptions, serialize};

const REPORT: &str = r#"---
markform:
  spec: "0.1"
  title: Incident report
  roles: [agent, user]
---
# Incident report

Fill this out from the pager timeline. The sections below alternate prose
and fields; all prose must survive edits untouched.

```text
this fenced block contains {% fake tags %} that the parser must ignore
```

{% form id="incident" %}

## Summary

{% field id="title" kind="string" label="Title" required=true %}
{% /field %}

Some guidance between fields, with *markdown* formatting.

{% field id="severity" kind="single_select" label="Severity" options=["sev1", "sev2", "sev3"] %}
{% /field %}

{% group id="timeline" title="Timeline" %}

{% field id="started" kind="date" label="Started" %}
{% /field %}

{% field id="impact_minutes" kind="number" label="Impact (minutes)" min=0 %}
{% /field %}

{% /group %}

{% /form %}

## Appendix

Trailing notes that are not part of the form.
"#;

fn roundtrip(text: &str) -> String {
    let form = parse(text).expect("parse");
    serialize(&form, &SerializeOptions::default())
}

#[test]
fn serialization_is_idempotent() {
    let once = roundtrip(REPORT);
    let twice = roundtrip(&once);
    assert_eq!(once, twice);
}

#[test]
fn prose_and_code_blocks_survive_a_field_edit_byte_for_byte() {
    let mut form = parse(REPORT).expect("parse");
    form.responses.insert(
        "title".to_string(),
        FieldResponse::answered(FieldValue::Text("Checkout outage".into())),
    );
    let out = serialize(&form, &SerializeOptions::default());

    assert!(out.contains("# Incident report"));
    assert!(out.contains("Some guidance between fields, with *markdown* formatting."));
    assert!(out.contains("this fenced block contains {% fake tags %} that the parser must ignore"));
    assert!(out.contains("Trailing notes that are not part of the form."));
    assert!(out.contains("```value\nCheckout outage\n```"));

    // Only the edited field's region may differ from a plain round trip.
    let baseline = roundtrip(REPORT);
    let changed: Vec<&str> = baseline
        .lines()
        .filter(|line| !out.contains(line))
        .collect();
    assert!(changed.is_empty(), "unexpected line changes: {changed:?}");
}

#[test]
fn reparse_after_edit_sees_the_new_value() {
    let mut form = parse(REPORT).expect("parse");
    form.responses.insert(
        "impact_minutes".to_string(),
        FieldResponse::answered(FieldValue::Number(42.0)),
    );
    let out = serialize(&form, &SerializeOptions::default());
    let reparsed = parse(&out).expect("reparse");
    assert_eq!(
        reparsed.response("impact_minutes").value,
        Some(FieldValue::Number(42.0))
    );
}

#[test]
fn messy_spacing_normalizes_to_one_canonical_form() {
    let messy = "{% form    id=\"f\"   %}\n{% field id=\"a\"    kind=\"string\" label=\"A\"%}\n{% /field %}\n{% /form %}\n";
    let tidy = "{% form id=\"f\" %}\n{% field id=\"a\" kind=\"string\" label=\"A\" %}\n{% /field %}\n{% /form %}\n";
    assert_eq!(roundtrip(messy), roundtrip(tidy));
}

#[test]
fn html_comment_documents_round_trip_in_their_own_syntax() {
    let doc = "<!-- form id=\"f\" -->\n<!-- field id=\"a\" kind=\"string\" label=\"A\" -->\n<!-- /field -->\n<!-- /form -->\n";
    let form = parse(doc).expect("parse");
    assert_eq!(form.syntax, TagSyntax::HtmlComment);
    let out = serialize(&form, &SerializeOptions::default());
    assert!(out.contains("<!-- field id=\"a\""));
    assert!(!out.contains("{%"));
}

#[test]
fn skip_then_answer_leaves_no_sentinel_residue() {
    let form = parse(REPORT).expect("parse");
    let skipped = {
        let mut f = form.clone();
        f.responses.insert(
            "severity".to_string(),
            FieldResponse::skipped(Some("unknown yet".into())),
        );
        serialize(&f, &SerializeOptions::default())
    };
    assert!(skipped.contains("|SKIP| (unknown yet)"));

    let mut reparsed = parse(&skipped).expect("reparse");
    reparsed.responses.insert(
        "severity".to_string(),
        FieldResponse::answered(FieldValue::Text("sev2".into())),
    );
    let answered = serialize(&reparsed, &SerializeOptions::default());
    assert!(!answered.contains("|SKIP|"));
    assert!(!answered.contains("state="));
    assert!(answered.contains("```value\nsev2\n```"));
}

#[test]
fn values_with_embedded_backticks_round_trip() {
    let mut form = parse(REPORT).expect("parse");
    form.responses.insert(
        "title".to_string(),
        FieldResponse::answered(FieldValue::Text("has a ```fence``` inside".into())),
    );
    let out = serialize(&form, &SerializeOptions::default());
    let reparsed = parse(&out).expect("reparse");
    assert_eq!(
        reparsed.response("title").value,
        Some(FieldValue::Text("has a ```fence``` inside".into()))
    );
}
