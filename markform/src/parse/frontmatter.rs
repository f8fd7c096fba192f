//! Frontmatter extraction and the namespaced `markform:` settings block.
//!
//! The serde structs here are the single mapping table between the document's
//! snake_case keys and the internal schema fields; no other code interprets
//! frontmatter keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Location, ParseError};
use crate::model::{FormSchema, HarnessDefaults, RunMode, default_roles};

/// Raw frontmatter block (delimiters included) plus parsed settings.
#[derive(Debug, Clone)]
pub struct Frontmatter {
    pub raw: String,
    pub settings: FrontmatterSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrontmatterDoc {
    pub markform: FrontmatterSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct FrontmatterSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub role_instructions: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_mode: Option<RunMode>,
    #[serde(skip_serializing_if = "HarnessSettings::is_empty")]
    pub harness: HarnessSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct HarnessSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_patches_per_turn: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_issues_per_turn: Option<u32>,
}

impl HarnessSettings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl FrontmatterSettings {
    /// Apply parsed settings onto a schema under construction.
    pub fn apply_to(&self, schema: &mut FormSchema) {
        if let Some(spec) = &self.spec {
            schema.spec_version = spec.clone();
        }
        schema.title = self.title.clone();
        schema.description = self.description.clone();
        if let Some(roles) = &self.roles {
            schema.roles = roles.clone();
        }
        schema.role_instructions = self.role_instructions.clone();
        if let Some(mode) = self.run_mode {
            schema.run_mode = mode;
        }
        schema.harness = HarnessDefaults {
            max_turns: self.harness.max_turns,
            max_patches_per_turn: self.harness.max_patches_per_turn,
            max_issues_per_turn: self.harness.max_issues_per_turn,
        };
    }

    /// Rebuild canonical settings from a schema (full regeneration path).
    pub fn from_schema(schema: &FormSchema) -> Self {
        Self {
            spec: Some(schema.spec_version.clone()),
            title: schema.title.clone(),
            description: schema.description.clone(),
            roles: if schema.roles == default_roles() {
                None
            } else {
                Some(schema.roles.clone())
            },
            role_instructions: schema.role_instructions.clone(),
            run_mode: if schema.run_mode == RunMode::default() {
                None
            } else {
                Some(schema.run_mode)
            },
            harness: HarnessSettings {
                max_turns: schema.harness.max_turns,
                max_patches_per_turn: schema.harness.max_patches_per_turn,
                max_issues_per_turn: schema.harness.max_issues_per_turn,
            },
        }
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(roles) = &self.roles {
            if roles.is_empty() {
                return Err("roles must be non-empty when present".to_string());
            }
            if roles.iter().any(|role| role.trim().is_empty()) {
                return Err("roles must be non-empty strings".to_string());
            }
        }
        for (key, value) in [
            ("max_turns", self.harness.max_turns),
            ("max_patches_per_turn", self.harness.max_patches_per_turn),
            ("max_issues_per_turn", self.harness.max_issues_per_turn),
        ] {
            if value == Some(0) {
                return Err(format!("harness.{key} must be a positive integer"));
            }
        }
        Ok(())
    }
}

/// Split an optional leading frontmatter block from the body.
///
/// Returns the parsed frontmatter (if any), the body text, and the number of
/// source lines the frontmatter occupies (for error locations in the body).
pub fn extract(text: &str) -> Result<(Option<Frontmatter>, &str, usize), ParseError> {
    if !text.starts_with("---\n") {
        return Ok((None, text, 0));
    }
    let after_open = &text[4..];
    let Some(close) = find_closing_delimiter(after_open) else {
        return Err(ParseError::new(
            "unterminated frontmatter block",
            Location::at(1, 1),
        ));
    };
    let yaml = &after_open[..close.yaml_end];
    let raw_end = 4 + close.block_end;
    let raw = &text[..raw_end];
    let body = &text[raw_end..];
    let line_base = raw.matches('\n').count();

    let doc: FrontmatterDoc = serde_yaml::from_str(yaml).map_err(|err| {
        let location = err
            .location()
            // +1: the opening delimiter line precedes the YAML text.
            .map(|loc| Location::at(loc.line() + 1, loc.column()))
            .unwrap_or_default();
        ParseError::new(format!("invalid frontmatter: {err}"), location)
    })?;
    doc.markform
        .validate()
        .map_err(|msg| ParseError::new(format!("invalid frontmatter: {msg}"), Location::at(1, 1)))?;

    Ok((
        Some(Frontmatter {
            raw: raw.to_string(),
            settings: doc.markform,
        }),
        body,
        line_base,
    ))
}

struct CloseOffsets {
    yaml_end: usize,
    block_end: usize,
}

fn find_closing_delimiter(after_open: &str) -> Option<CloseOffsets> {
    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line == "---\n" || line == "---" {
            return Some(CloseOffsets {
                yaml_end: offset,
                block_end: offset + line.len(),
            });
        }
        offset += line.len();
    }
    None
}

/// Render a canonical frontmatter block for full regeneration.
pub fn render(settings: &FrontmatterSettings) -> String {
    let doc = FrontmatterDoc {
        markform: settings.clone(),
    };
    // Settings structs are plain data; YAML serialization cannot fail.
    let yaml = serde_yaml::to_string(&doc).expect("serialize frontmatter");
    format!("---\n{yaml}---\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "---\nmarkform:\n  spec: \"0.1\"\n  title: Intake\n  roles: [agent, user]\n  harness:\n    max_turns: 10\n---\nbody text\n";

    #[test]
    fn extracts_settings_and_body() {
        let (front, body, line_base) = extract(DOC).expect("extract");
        let front = front.expect("frontmatter present");
        assert_eq!(front.settings.spec.as_deref(), Some("0.1"));
        assert_eq!(front.settings.title.as_deref(), Some("Intake"));
        assert_eq!(front.settings.harness.max_turns, Some(10));
        assert_eq!(body, "body text\n");
        assert_eq!(line_base, 8);
        assert!(front.raw.ends_with("---\n"));
    }

    #[test]
    fn document_without_frontmatter_passes_through() {
        let (front, body, line_base) = extract("# heading\n").expect("extract");
        assert!(front.is_none());
        assert_eq!(body, "# heading\n");
        assert_eq!(line_base, 0);
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let doc = "---\nmarkform:\n  bogus: 1\n---\n";
        let err = extract(doc).expect_err("should fail");
        assert!(err.message.contains("invalid frontmatter"));
    }

    #[test]
    fn zero_budgets_are_parse_errors() {
        let doc = "---\nmarkform:\n  harness:\n    max_turns: 0\n---\n";
        let err = extract(doc).expect_err("should fail");
        assert!(err.message.contains("max_turns"));
    }

    #[test]
    fn empty_roles_are_parse_errors() {
        let doc = "---\nmarkform:\n  roles: []\n---\n";
        let err = extract(doc).expect_err("should fail");
        assert!(err.message.contains("roles"));
    }

    #[test]
    fn unterminated_frontmatter_is_a_parse_error() {
        let err = extract("---\nmarkform:\n  title: x\n").expect_err("should fail");
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn render_then_extract_round_trips() {
        let settings = FrontmatterSettings {
            spec: Some("0.1".to_string()),
            title: Some("Intake".to_string()),
            roles: Some(vec!["agent".to_string()]),
            ..FrontmatterSettings::default()
        };
        let rendered = render(&settings);
        let (front, _, _) = extract(&rendered).expect("extract");
        assert_eq!(front.expect("frontmatter").settings, settings);
    }
}
