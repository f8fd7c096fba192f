//! Serialization back to text.
//!
//! Two paths: splice (default) rewrites only the tag regions recorded at
//! parse time and leaves all prose byte-identical; full regeneration builds
//! the canonical document from the schema alone. Splice falls back to
//! regeneration when the structure no longer matches the recorded regions.

pub mod render;

use crate::model::{EntityKind, FormItem, ParsedForm, TagRegion};
use crate::parse::frontmatter::{self, FrontmatterSettings};

#[derive(Debug, Clone, Copy)]
pub struct SerializeOptions {
    /// Preserve prose by splicing into the retained source when possible.
    pub preserve_content: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            preserve_content: true,
        }
    }
}

pub fn serialize(form: &ParsedForm, options: &SerializeOptions) -> String {
    if options.preserve_content {
        if let Some(text) = splice(form) {
            return text;
        }
    }
    regenerate(form)
}

/// Splice canonical renderings into the retained source. Returns `None` when
/// there is no retained source or the structure drifted from the recorded
/// regions (schema items added, removed, or reordered).
fn splice(form: &ParsedForm) -> Option<String> {
    let source = form.raw_source.as_deref()?;
    let form_region = form
        .tag_regions
        .iter()
        .find(|region| region.entity == EntityKind::Form)?;
    if form_region.tag_id != form.schema.id {
        return None;
    }
    let close_start = form_region.close_start?;
    if structure_drifted(form) {
        return None;
    }

    // (start, end, replacement); regions are disjoint, insertions are empty
    // ranges at the form close tag.
    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    for region in &form.tag_regions {
        match region.entity {
            EntityKind::Field => {
                let field = form.field(&region.tag_id)?;
                let response = form.response(&region.tag_id);
                edits.push((
                    region.start,
                    region.end,
                    render::render_field(form.syntax, field, &response),
                ));
            }
            EntityKind::Note => match form.note(&region.tag_id) {
                Some(note) => edits.push((
                    region.start,
                    region.end,
                    render::render_note(form.syntax, note),
                )),
                // Removed note: splice its span away.
                None => edits.push((region.start, region.end, String::new())),
            },
            EntityKind::Documentation => {
                let doc = form.schema.docs().find(|doc| doc.id == region.tag_id)?;
                edits.push((region.start, region.end, render::render_doc(form.syntax, doc)));
            }
            // Structure tags are already canonical from parse-time
            // normalization and the schema is immutable.
            EntityKind::Form | EntityKind::Group => {}
        }
    }

    // Notes added since parse have no region; insert them before the form
    // close tag in id order.
    let mut additions = String::new();
    for note in form.notes_in_order() {
        let has_region = form
            .tag_regions
            .iter()
            .any(|region| region.entity == EntityKind::Note && region.tag_id == note.id);
        if !has_region {
            additions.push_str(&render::render_note(form.syntax, note));
            additions.push_str("\n\n");
        }
    }
    if !additions.is_empty() {
        edits.push((close_start, close_start, additions));
    }

    edits.sort_by_key(|(start, _, _)| *start);
    let mut body = source.to_string();
    for (start, end, text) in edits.into_iter().rev() {
        body.replace_range(start..end, &text);
    }
    Some(format!(
        "{}{body}",
        form.raw_frontmatter.as_deref().unwrap_or_default()
    ))
}

/// The recorded field/group/doc regions must name exactly the schema's
/// current items, in the same relative order.
fn structure_drifted(form: &ParsedForm) -> bool {
    let is_structural = |entity: EntityKind| {
        matches!(
            entity,
            EntityKind::Field | EntityKind::Group | EntityKind::Documentation
        )
    };
    let mut regions: Vec<&TagRegion> = form
        .tag_regions
        .iter()
        .filter(|region| is_structural(region.entity))
        .collect();
    regions.sort_by_key(|region| region.start);
    let region_ids: Vec<&str> = regions.iter().map(|region| region.tag_id.as_str()).collect();
    let schema_ids: Vec<&str> = form
        .order_index
        .iter()
        .filter(|id| {
            form.id_index
                .get(*id)
                .copied()
                .is_some_and(is_structural)
        })
        .map(String::as_str)
        .collect();
    region_ids != schema_ids
}

/// Build the whole document from scratch: canonical frontmatter, then every
/// item in order, then notes, all separated by blank lines.
fn regenerate(form: &ParsedForm) -> String {
    let syntax = form.syntax;
    let mut blocks = vec![render::render_form_open(syntax, &form.schema.id)];
    for item in &form.schema.items {
        match item {
            FormItem::Group(group) => {
                blocks.push(render::render_group_open(syntax, group));
                for field in &group.fields {
                    blocks.push(render::render_field(syntax, field, &form.response(&field.id)));
                }
                blocks.push(render::render_group_close(syntax));
            }
            FormItem::Field(field) => {
                blocks.push(render::render_field(syntax, field, &form.response(&field.id)));
            }
            FormItem::Doc(doc) => blocks.push(render::render_doc(syntax, doc)),
        }
    }
    for note in form.notes_in_order() {
        blocks.push(render::render_note(syntax, note));
    }
    blocks.push(render::render_form_close(syntax));

    let fm = frontmatter::render(&FrontmatterSettings::from_schema(&form.schema));
    format!("{fm}\n{}\n", blocks.join("\n\n"))
}
