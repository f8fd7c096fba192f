//! Document parsing: frontmatter, tag scanning, structure walk, and
//! parse-time normalization.
//!
//! Parsing normalizes the retained source text: every tag span is replaced
//! with its canonical rendering and the result is reparsed. Prose outside tag
//! spans is never touched, and a second parse of normalized text is the
//! identity, which is what makes splice serialization idempotent.

pub mod fields;
pub mod frontmatter;
pub mod tags;

use std::collections::BTreeMap;

use crate::error::{FormError, Location, ParseError, ValidationError};
use crate::model::{
    DocBlock, EntityKind, FieldResponse, FormItem, FormSchema, Group, Note, ParsedForm, TagRegion,
    TagSyntax, note_number,
};
use crate::parse::tags::{RawTag, location_at};
use crate::serialize::render;

/// Parse a document into a [`ParsedForm`], normalizing its tag spans.
pub fn parse(text: &str) -> Result<ParsedForm, FormError> {
    let (form, rewrites, raw) = parse_internal(text)?;
    let body = form.raw_source.as_deref().unwrap_or_default();
    let normalized_body = apply_rewrites(body, rewrites);
    let normalized = format!("{}{normalized_body}", raw.unwrap_or_default());
    if normalized == text {
        return Ok(form);
    }
    let (form, _, _) = parse_internal(&normalized)?;
    Ok(form)
}

/// One tag span to replace with its canonical rendering.
struct Rewrite {
    start: usize,
    end: usize,
    text: String,
}

fn apply_rewrites(body: &str, mut rewrites: Vec<Rewrite>) -> String {
    rewrites.sort_by_key(|rewrite| rewrite.start);
    let mut out = body.to_string();
    for rewrite in rewrites.into_iter().rev() {
        out.replace_range(rewrite.start..rewrite.end, &rewrite.text);
    }
    out
}

type ParseOutput = (ParsedForm, Vec<Rewrite>, Option<String>);

fn parse_internal(text: &str) -> Result<ParseOutput, FormError> {
    let (fm, body, line_base) = frontmatter::extract(text)?;
    let (tag_list, syntax) = tags::scan(body, line_base)?;

    let mut walker = Walker {
        body,
        tags: &tag_list,
        index: 0,
        line_base,
        syntax,
        responses: BTreeMap::new(),
        notes: Vec::new(),
        regions: Vec::new(),
        rewrites: Vec::new(),
        seen_ids: BTreeMap::new(),
    };
    let schema = walker.walk_document(fm.as_ref().map(|fm| &fm.settings))?;

    let mut form = ParsedForm {
        schema,
        responses: walker.responses,
        notes: walker.notes,
        order_index: Vec::new(),
        id_index: BTreeMap::new(),
        raw_source: Some(body.to_string()),
        raw_frontmatter: fm.as_ref().map(|fm| fm.raw.clone()),
        tag_regions: walker.regions,
        syntax,
    };
    form.rebuild_indexes();
    check_refs_and_roles(&form)?;

    Ok((form, walker.rewrites, fm.map(|fm| fm.raw)))
}

struct Walker<'a> {
    body: &'a str,
    tags: &'a [RawTag],
    index: usize,
    line_base: usize,
    syntax: TagSyntax,
    responses: BTreeMap<String, FieldResponse>,
    notes: Vec<Note>,
    regions: Vec<TagRegion>,
    rewrites: Vec<Rewrite>,
    seen_ids: BTreeMap<String, EntityKind>,
}

impl<'a> Walker<'a> {
    fn location(&self, tag: &RawTag) -> Location {
        location_at(self.body, tag.start, self.line_base)
    }

    fn peek(&self) -> Option<&'a RawTag> {
        self.tags.get(self.index)
    }

    fn next_tag(&mut self) -> Option<&'a RawTag> {
        let tag = self.tags.get(self.index);
        if tag.is_some() {
            self.index += 1;
        }
        tag
    }

    fn claim_id(&mut self, id: &str, entity: EntityKind, loc: &Location) -> Result<(), FormError> {
        check_id(id, loc)?;
        if self.seen_ids.insert(id.to_string(), entity).is_some() {
            return Err(ParseError::new(format!("duplicate id '{id}'"), loc.clone()).into());
        }
        Ok(())
    }

    /// Top level: prose plus exactly one `form` tag pair.
    fn walk_document(
        &mut self,
        settings: Option<&frontmatter::FrontmatterSettings>,
    ) -> Result<FormSchema, FormError> {
        let Some(open) = self.next_tag() else {
            return Err(ParseError::new("document has no form tag", Location::default()).into());
        };
        if open.name != "form" || open.closing {
            return Err(ParseError::new(
                format!("expected form tag, found '{}'", open.name),
                self.location(open),
            )
            .into());
        }
        let loc = self.location(open);
        let id = require_string_attr(open, "id", &loc)?;
        reject_unknown_attrs(open, &["id"], &loc)?;

        let mut schema = FormSchema::new(&id);
        if let Some(settings) = settings {
            settings.apply_to(&mut schema);
        }
        self.claim_id(&id, EntityKind::Form, &loc)?;

        let close = self.walk_form_body(&mut schema)?;
        self.regions.push(TagRegion {
            tag_id: id.clone(),
            entity: EntityKind::Form,
            start: open.start,
            end: open.end,
            close_start: Some(close.start),
        });
        self.rewrites.push(Rewrite {
            start: open.start,
            end: open.end,
            text: render::render_form_open(self.syntax, &id),
        });
        self.rewrites.push(Rewrite {
            start: close.start,
            end: close.end,
            text: render::render_form_close(self.syntax),
        });

        if let Some(extra) = self.peek() {
            return Err(ParseError::new(
                format!("unexpected tag '{}' after form close", extra.name),
                self.location(extra),
            )
            .into());
        }
        Ok(schema)
    }

    /// Body of the form: groups, fields, docs, and notes until `/form`.
    fn walk_form_body(&mut self, schema: &mut FormSchema) -> Result<&'a RawTag, FormError> {
        loop {
            let Some(tag) = self.next_tag() else {
                return Err(
                    ParseError::new("unclosed form tag", Location::default()).into(),
                );
            };
            if tag.closing {
                if tag.name == "form" {
                    return Ok(tag);
                }
                return Err(ParseError::new(
                    format!("unexpected closing tag '/{}'", tag.name),
                    self.location(tag),
                )
                .into());
            }
            match tag.name.as_str() {
                "group" => {
                    let group = self.walk_group(tag)?;
                    schema.items.push(FormItem::Group(group));
                }
                "field" => {
                    let field = self.walk_field(tag)?;
                    schema.items.push(FormItem::Field(field));
                }
                "doc" => {
                    let doc = self.walk_doc(tag)?;
                    schema.items.push(FormItem::Doc(doc));
                }
                "note" => self.walk_note(tag)?,
                other => {
                    return Err(ParseError::new(
                        format!("unknown tag '{other}'"),
                        self.location(tag),
                    )
                    .into());
                }
            }
        }
    }

    fn walk_group(&mut self, open: &RawTag) -> Result<Group, FormError> {
        let loc = self.location(open);
        let id = require_string_attr(open, "id", &loc)?;
        let title = optional_string_attr(open, "title", &loc)?;
        reject_unknown_attrs(open, &["id", "title"], &loc)?;
        self.claim_id(&id, EntityKind::Group, &loc)?;

        let mut group = Group {
            id: id.clone(),
            title,
            fields: Vec::new(),
        };
        let close = loop {
            let Some(tag) = self.next_tag() else {
                return Err(ParseError::new(format!("unclosed group '{id}'"), loc).into());
            };
            if tag.closing {
                if tag.name == "group" {
                    break tag;
                }
                return Err(ParseError::new(
                    format!("unexpected closing tag '/{}' inside group '{id}'", tag.name),
                    self.location(tag),
                )
                .into());
            }
            match tag.name.as_str() {
                "field" => group.fields.push(self.walk_field(tag)?),
                "note" => self.walk_note(tag)?,
                other => {
                    return Err(ParseError::new(
                        format!("tag '{other}' is not allowed inside a group"),
                        self.location(tag),
                    )
                    .into());
                }
            }
        };
        self.regions.push(TagRegion {
            tag_id: id.clone(),
            entity: EntityKind::Group,
            start: open.start,
            end: open.end,
            close_start: Some(close.start),
        });
        self.rewrites.push(Rewrite {
            start: open.start,
            end: open.end,
            text: render::render_group_open(self.syntax, &group),
        });
        self.rewrites.push(Rewrite {
            start: close.start,
            end: close.end,
            text: render::render_group_close(self.syntax),
        });
        Ok(group)
    }

    /// A field pair. The body between the tags must be tag-free.
    fn walk_field(&mut self, open: &'a RawTag) -> Result<crate::model::Field, FormError> {
        let close = self.expect_close(open)?;
        let body = &self.body[open.end..close.start];
        let parsed = fields::parse_field_tag(open, body, self.location(open))?;
        let loc = Location::field(&parsed.field.id);
        self.claim_id(&parsed.field.id, EntityKind::Field, &loc)?;

        if parsed.response != FieldResponse::unanswered() {
            self.responses
                .insert(parsed.field.id.clone(), parsed.response.clone());
        }
        self.regions.push(TagRegion {
            tag_id: parsed.field.id.clone(),
            entity: EntityKind::Field,
            start: open.start,
            end: close.end,
            close_start: None,
        });
        self.rewrites.push(Rewrite {
            start: open.start,
            end: close.end,
            text: render::render_field(self.syntax, &parsed.field, &parsed.response),
        });
        Ok(parsed.field)
    }

    fn walk_doc(&mut self, open: &'a RawTag) -> Result<DocBlock, FormError> {
        let loc = self.location(open);
        let id = require_string_attr(open, "id", &loc)?;
        reject_unknown_attrs(open, &["id"], &loc)?;
        self.claim_id(&id, EntityKind::Documentation, &loc)?;

        let close = self.expect_close(open)?;
        let doc = DocBlock {
            id,
            text: self.body[open.end..close.start].trim().to_string(),
        };
        self.regions.push(TagRegion {
            tag_id: doc.id.clone(),
            entity: EntityKind::Documentation,
            start: open.start,
            end: close.end,
            close_start: None,
        });
        self.rewrites.push(Rewrite {
            start: open.start,
            end: close.end,
            text: render::render_doc(self.syntax, &doc),
        });
        Ok(doc)
    }

    fn walk_note(&mut self, open: &'a RawTag) -> Result<(), FormError> {
        let loc = self.location(open);
        let id = require_string_attr(open, "id", &loc)?;
        let note_loc = Location::note(&id);
        if note_number(&id).is_none() {
            return Err(ValidationError::new(
                format!("note id '{id}' must be 'n' followed by digits"),
                note_loc,
            )
            .into());
        }
        let ref_id = require_string_attr(open, "ref", &note_loc)?;
        let role = require_string_attr(open, "role", &note_loc)?;
        reject_unknown_attrs(open, &["id", "ref", "role"], &note_loc)?;
        self.claim_id(&id, EntityKind::Note, &note_loc)?;

        let close = self.expect_close(open)?;
        let text = self.body[open.end..close.start].trim().to_string();
        if text.is_empty() {
            return Err(ValidationError::new("note text must not be empty", note_loc).into());
        }
        let note = Note {
            id: id.clone(),
            ref_id,
            role,
            text,
        };
        self.regions.push(TagRegion {
            tag_id: id,
            entity: EntityKind::Note,
            start: open.start,
            end: close.end,
            close_start: None,
        });
        self.rewrites.push(Rewrite {
            start: open.start,
            end: close.end,
            text: render::render_note(self.syntax, &note),
        });
        self.notes.push(note);
        Ok(())
    }

    /// The next tag must be the close pair of `open` (these bodies are
    /// tag-free; value fences were already excluded by the scanner).
    fn expect_close(&mut self, open: &'a RawTag) -> Result<&'a RawTag, FormError> {
        let Some(tag) = self.next_tag() else {
            return Err(ParseError::new(
                format!("unclosed {} tag", open.name),
                self.location(open),
            )
            .into());
        };
        if !tag.closing || tag.name != open.name {
            return Err(ParseError::new(
                format!("unexpected tag '{}' inside {} body", tag.name, open.name),
                self.location(tag),
            )
            .into());
        }
        Ok(tag)
    }
}

/// Post-walk checks that need the assembled schema: note refs and role
/// membership.
fn check_refs_and_roles(form: &ParsedForm) -> Result<(), FormError> {
    let roles = &form.schema.roles;
    for field in form.schema.fields() {
        if !roles.contains(&field.role) {
            return Err(ValidationError::new(
                format!("role '{}' is not declared in roles", field.role),
                Location::field(&field.id),
            )
            .into());
        }
    }
    for note in &form.notes {
        let loc = Location::note(&note.id);
        if !roles.contains(&note.role) {
            return Err(ValidationError::new(
                format!("role '{}' is not declared in roles", note.role),
                loc,
            )
            .into());
        }
        match form.id_index.get(&note.ref_id) {
            None => {
                return Err(ValidationError::new(
                    format!("note references unknown id '{}'", note.ref_id),
                    loc,
                )
                .into());
            }
            Some(EntityKind::Note) => {
                return Err(ValidationError::new(
                    "notes cannot reference other notes",
                    loc,
                )
                .into());
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn check_id(id: &str, loc: &Location) -> Result<(), FormError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ParseError::new(
            format!("invalid id '{id}': use letters, digits, '_' or '-'"),
            loc.clone(),
        )
        .into());
    }
    Ok(())
}

fn require_string_attr(tag: &RawTag, key: &str, loc: &Location) -> Result<String, FormError> {
    match optional_string_attr(tag, key, loc)? {
        Some(value) => Ok(value),
        None => Err(ParseError::new(
            format!("{} tag missing '{key}'", tag.name),
            loc.clone(),
        )
        .into()),
    }
}

fn optional_string_attr(
    tag: &RawTag,
    key: &str,
    loc: &Location,
) -> Result<Option<String>, FormError> {
    match tag.attr(key) {
        None => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ParseError::new(
            format!("attribute '{key}' must be a string, got {other}"),
            loc.clone(),
        )
        .into()),
    }
}

fn reject_unknown_attrs(tag: &RawTag, allowed: &[&str], loc: &Location) -> Result<(), FormError> {
    for (key, _) in &tag.attrs {
        if !allowed.contains(&key.as_str()) {
            return Err(ParseError::new(
                format!("unknown attribute '{key}' on {} tag", tag.name),
                loc.clone(),
            )
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerState, FieldKind, FieldValue};

    const BASIC: &str = r#"---
markform:
  spec: "0.1"
  title: Intake
---
# Intake

Some prose before the form.

{% form id="intake" %}

{% group id="basics" title="Basics" %}

{% field id="name" kind="string" label="Full name" required=true %}
```value
Ada Lovelace
```
{% /field %}

{% field id="age" kind="number" label="Age" min=0 %}
{% /field %}

{% /group %}

{% doc id="guidance" %}
Answer from the case file only.
{% /doc %}

{% note id="n1" ref="name" role="user" %}Prefer the full legal name.{% /note %}

{% /form %}

Trailing prose.
"#;

    #[test]
    fn parses_structure_and_responses() {
        let form = parse(BASIC).expect("parse");
        assert_eq!(form.schema.id, "intake");
        assert_eq!(form.schema.title.as_deref(), Some("Intake"));
        assert_eq!(form.schema.fields().count(), 2);
        assert_eq!(form.answer_state("name"), AnswerState::Answered);
        assert_eq!(
            form.response("name").value,
            Some(FieldValue::Text("Ada Lovelace".to_string()))
        );
        assert_eq!(form.answer_state("age"), AnswerState::Unanswered);
        assert_eq!(form.notes.len(), 1);
        assert_eq!(form.notes[0].ref_id, "name");
        assert_eq!(form.schema.docs().count(), 1);
    }

    #[test]
    fn field_kinds_carry_constraints() {
        let form = parse(BASIC).expect("parse");
        let age = form.field("age").expect("age field");
        match &age.kind {
            FieldKind::Number(constraints) => assert_eq!(constraints.min, Some(0.0)),
            other => panic!("expected number, got {}", other.name()),
        }
    }

    #[test]
    fn prose_outside_tags_is_retained() {
        let form = parse(BASIC).expect("parse");
        let source = form.raw_source.expect("raw source");
        assert!(source.contains("Some prose before the form."));
        assert!(source.contains("Trailing prose."));
    }

    #[test]
    fn parse_is_idempotent_on_normalized_text() {
        let first = parse(BASIC).expect("first parse");
        let normalized = format!(
            "{}{}",
            first.raw_frontmatter.as_deref().unwrap_or_default(),
            first.raw_source.as_deref().unwrap_or_default()
        );
        let second = parse(&normalized).expect("second parse");
        assert_eq!(second.raw_source, first.raw_source);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let text = "{% form id=\"f\" %}\n{% field id=\"x\" kind=\"string\" label=\"A\" %}\n{% /field %}\n{% field id=\"x\" kind=\"string\" label=\"B\" %}\n{% /field %}\n{% /form %}\n";
        let err = parse(text).expect_err("should fail");
        assert!(err.to_string().contains("duplicate id 'x'"));
    }

    #[test]
    fn note_with_unknown_ref_is_rejected() {
        let text = "{% form id=\"f\" %}\n{% note id=\"n1\" ref=\"ghost\" role=\"user\" %}hm{% /note %}\n{% /form %}\n";
        let err = parse(text).expect_err("should fail");
        assert!(err.to_string().contains("unknown id 'ghost'"));
    }

    #[test]
    fn forward_note_refs_resolve() {
        let text = "{% form id=\"f\" %}\n{% note id=\"n1\" ref=\"later\" role=\"user\" %}see below{% /note %}\n{% field id=\"later\" kind=\"string\" label=\"L\" %}\n{% /field %}\n{% /form %}\n";
        let form = parse(text).expect("parse");
        assert_eq!(form.notes[0].ref_id, "later");
    }

    #[test]
    fn undeclared_role_is_rejected() {
        let text = "{% form id=\"f\" %}\n{% field id=\"x\" kind=\"string\" label=\"A\" role=\"reviewer\" %}\n{% /field %}\n{% /form %}\n";
        let err = parse(text).expect_err("should fail");
        assert!(err.to_string().contains("not declared in roles"));
    }

    #[test]
    fn html_comment_syntax_parses() {
        let text = "<!-- form id=\"f\" -->\n<!-- field id=\"x\" kind=\"string\" label=\"A\" -->\n<!-- /field -->\n<!-- /form -->\n";
        let form = parse(text).expect("parse");
        assert_eq!(form.syntax, TagSyntax::HtmlComment);
        assert_eq!(form.schema.fields().count(), 1);
    }

    #[test]
    fn two_forms_are_rejected() {
        let text = "{% form id=\"a\" %}{% /form %}\n{% form id=\"b\" %}{% /form %}\n";
        let err = parse(text).expect_err("should fail");
        assert!(err.to_string().contains("after form close"));
    }

    #[test]
    fn nested_tag_inside_field_body_is_rejected() {
        let text = "{% form id=\"f\" %}\n{% field id=\"x\" kind=\"string\" label=\"A\" %}\n{% note id=\"n1\" ref=\"x\" role=\"user\" %}no{% /note %}\n{% /field %}\n{% /form %}\n";
        let err = parse(text).expect_err("should fail");
        assert!(err.to_string().contains("inside field body"));
    }

    #[test]
    fn normalization_rewrites_tag_spacing() {
        let text = "{% form   id=\"f\" %}\n{% field id=\"x\"   kind=\"string\" label=\"A\" %}\n{% /field %}\n{% /form %}\n";
        let form = parse(text).expect("parse");
        let source = form.raw_source.expect("raw source");
        assert!(source.contains("{% form id=\"f\" %}"));
        assert!(source.contains("{% field id=\"x\" kind=\"string\" label=\"A\" %}"));
    }
}
