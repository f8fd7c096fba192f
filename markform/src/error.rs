//! Error taxonomy for the parse boundary.
//!
//! The parser distinguishes malformed markup ([`ParseError`]) from well-formed
//! markup that violates form-semantic constraints ([`ValidationError`]). Both
//! are fatal at parse time: parsing is all-or-nothing and never returns a
//! partial [`crate::model::ParsedForm`]. Value-level problems on an already
//! parsed form are reported as issues by [`crate::validate`], not as errors.

use thiserror::Error;

/// Optional source location attached to parse-time errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub field_id: Option<String>,
    pub note_id: Option<String>,
}

impl Location {
    pub fn at(line: usize, column: usize) -> Self {
        Self {
            line: Some(line),
            column: Some(column),
            ..Self::default()
        }
    }

    pub fn field(id: impl Into<String>) -> Self {
        Self {
            field_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn note(id: impl Into<String>) -> Self {
        Self {
            note_id: Some(id.into()),
            ..Self::default()
        }
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let (Some(line), Some(column)) = (self.line, self.column) {
            parts.push(format!("line {line}, column {column}"));
        } else if let Some(line) = self.line {
            parts.push(format!("line {line}"));
        }
        if let Some(field_id) = &self.field_id {
            parts.push(format!("field '{field_id}'"));
        }
        if let Some(note_id) = &self.note_id {
            parts.push(format!("note '{note_id}'"));
        }
        parts.join(", ")
    }
}

/// Malformed source syntax (unbalanced tags, bad attributes, bad frontmatter).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("parse error{}: {message}", fmt_location(.location))]
pub struct ParseError {
    pub message: String,
    pub location: Location,
}

impl ParseError {
    pub fn new(message: impl Into<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

/// Well-formed markup violating a form-semantic constraint (bad attribute
/// combination, unresolvable ref, duplicate id, unparseable typed content).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("validation error{}: {message}", fmt_location(.location))]
pub struct ValidationError {
    pub message: String,
    pub location: Location,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

/// Either parse-time failure; callers must handle this before obtaining a form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl FormError {
    pub fn location(&self) -> &Location {
        match self {
            FormError::Parse(err) => &err.location,
            FormError::Validation(err) => &err.location,
        }
    }
}

fn fmt_location(location: &Location) -> String {
    let described = location.describe();
    if described.is_empty() {
        String::new()
    } else {
        format!(" ({described})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_includes_line_and_column() {
        let err = ParseError::new("unbalanced tag", Location::at(4, 7));
        assert_eq!(err.to_string(), "parse error (line 4, column 7): unbalanced tag");
    }

    #[test]
    fn validation_error_includes_field_id() {
        let err = ValidationError::new("state not allowed on filled field", Location::field("name"));
        assert!(err.to_string().contains("field 'name'"));
    }

    #[test]
    fn form_error_preserves_variant() {
        let err: FormError = ParseError::new("bad", Location::default()).into();
        assert!(matches!(err, FormError::Parse(_)));
    }
}
