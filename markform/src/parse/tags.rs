//! Tag tokenizer for the two surface syntaxes.
//!
//! Scans the document body for `{% name ... %}` (Markdoc style) or
//! `<!-- name ... -->` (HTML-comment style) tokens, skipping fenced code
//! regions so prose examples containing tag-like text are left alone.
//! Attribute values are JSON literals; a streaming JSON reader finds the
//! extent of each value, so delimiters inside strings are handled correctly.

use serde_json::Value;

use crate::error::{Location, ParseError};
use crate::model::TagSyntax;

/// One scanned tag token with its byte span in the body.
#[derive(Debug, Clone)]
pub struct RawTag {
    pub name: String,
    pub closing: bool,
    pub attrs: Vec<(String, Value)>,
    pub start: usize,
    pub end: usize,
}

impl RawTag {
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }
}

/// 1-indexed line/column of a byte offset, shifted by `line_base` (the number
/// of frontmatter lines preceding the body).
pub fn line_col(text: &str, offset: usize, line_base: usize) -> (usize, usize) {
    let prefix = &text[..offset.min(text.len())];
    let line = prefix.matches('\n').count() + 1 + line_base;
    let column = prefix
        .rfind('\n')
        .map(|pos| offset - pos)
        .unwrap_or(offset + 1);
    (line, column)
}

pub fn location_at(text: &str, offset: usize, line_base: usize) -> Location {
    let (line, column) = line_col(text, offset, line_base);
    Location::at(line, column)
}

/// Scan the body for tag tokens. Returns tokens in document order and the
/// detected surface syntax; mixing syntaxes is a parse error.
pub fn scan(body: &str, line_base: usize) -> Result<(Vec<RawTag>, TagSyntax), ParseError> {
    let fences = fence_ranges(body);
    let mut tags = Vec::new();
    let mut syntax: Option<TagSyntax> = None;
    let mut pos = 0;

    while pos < body.len() {
        let markdoc = find_outside_fences(body, "{%", pos, &fences);
        let html = find_outside_fences(body, "<!--", pos, &fences);
        let (start, style) = match (markdoc, html) {
            (Some(m), Some(h)) if m <= h => (m, TagSyntax::Markdoc),
            (Some(_), Some(h)) => (h, TagSyntax::HtmlComment),
            (Some(m), None) => (m, TagSyntax::Markdoc),
            (None, Some(h)) => (h, TagSyntax::HtmlComment),
            (None, None) => break,
        };
        let tag = parse_tag(body, start, style, line_base)?;
        match syntax {
            None => syntax = Some(style),
            Some(expected) if expected != style => {
                return Err(ParseError::new(
                    "mixed tag syntaxes in one document",
                    location_at(body, start, line_base),
                ));
            }
            Some(_) => {}
        }
        pos = tag.end;
        tags.push(tag);
    }

    Ok((tags, syntax.unwrap_or_default()))
}

/// Byte ranges covered by fenced code blocks (including the fence lines).
fn fence_ranges(body: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut open: Option<usize> = None;
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        if line.trim_start().starts_with("```") {
            match open {
                None => open = Some(offset),
                Some(start) => {
                    ranges.push((start, offset + line.len()));
                    open = None;
                }
            }
        }
        offset += line.len();
    }
    if let Some(start) = open {
        ranges.push((start, body.len()));
    }
    ranges
}

fn find_outside_fences(
    body: &str,
    needle: &str,
    from: usize,
    fences: &[(usize, usize)],
) -> Option<usize> {
    let mut pos = from;
    while let Some(found) = body[pos..].find(needle).map(|i| i + pos) {
        if let Some(&(_, end)) = fences
            .iter()
            .find(|&&(start, end)| found >= start && found < end)
        {
            pos = end;
            continue;
        }
        return Some(found);
    }
    None
}

fn parse_tag(
    body: &str,
    start: usize,
    style: TagSyntax,
    line_base: usize,
) -> Result<RawTag, ParseError> {
    let (opener, terminator) = match style {
        TagSyntax::Markdoc => ("{%", "%}"),
        TagSyntax::HtmlComment => ("<!--", "-->"),
    };
    let mut cursor = start + opener.len();
    skip_ws(body, &mut cursor);

    let closing = body[cursor..].starts_with('/');
    if closing {
        cursor += 1;
    }

    let name_start = cursor;
    while body[cursor..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        cursor += 1;
    }
    if cursor == name_start {
        return Err(ParseError::new(
            "expected tag name",
            location_at(body, cursor, line_base),
        ));
    }
    let name = body[name_start..cursor].to_string();

    let mut attrs = Vec::new();
    loop {
        skip_ws(body, &mut cursor);
        if body[cursor..].starts_with(terminator) {
            cursor += terminator.len();
            break;
        }
        if cursor >= body.len() {
            return Err(ParseError::new(
                format!("unterminated tag '{name}'"),
                location_at(body, start, line_base),
            ));
        }
        if closing {
            return Err(ParseError::new(
                format!("closing tag '/{name}' must not carry attributes"),
                location_at(body, cursor, line_base),
            ));
        }
        let (key, value, next) = parse_attr(body, cursor, &name, line_base)?;
        if attrs.iter().any(|(existing, _)| *existing == key) {
            return Err(ParseError::new(
                format!("duplicate attribute '{key}' on tag '{name}'"),
                location_at(body, cursor, line_base),
            ));
        }
        attrs.push((key, value));
        cursor = next;
    }

    Ok(RawTag {
        name,
        closing,
        attrs,
        start,
        end: cursor,
    })
}

fn parse_attr(
    body: &str,
    start: usize,
    tag_name: &str,
    line_base: usize,
) -> Result<(String, Value, usize), ParseError> {
    let mut cursor = start;
    let key_start = cursor;
    while body[cursor..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        cursor += 1;
    }
    if cursor == key_start {
        return Err(ParseError::new(
            format!("expected attribute name in tag '{tag_name}'"),
            location_at(body, cursor, line_base),
        ));
    }
    let key = body[key_start..cursor].to_string();
    if !body[cursor..].starts_with('=') {
        return Err(ParseError::new(
            format!("expected '=' after attribute '{key}'"),
            location_at(body, cursor, line_base),
        ));
    }
    cursor += 1;

    let mut stream = serde_json::Deserializer::from_str(&body[cursor..]).into_iter::<Value>();
    let value = match stream.next() {
        Some(Ok(value)) => value,
        Some(Err(err)) => {
            return Err(ParseError::new(
                format!("invalid value for attribute '{key}': {err}"),
                location_at(body, cursor, line_base),
            ));
        }
        None => {
            return Err(ParseError::new(
                format!("missing value for attribute '{key}'"),
                location_at(body, cursor, line_base),
            ));
        }
    };
    let consumed = stream.byte_offset();
    Ok((key, value, cursor + consumed))
}

fn skip_ws(body: &str, cursor: &mut usize) {
    while let Some(c) = body[*cursor..].chars().next() {
        if !c.is_whitespace() {
            break;
        }
        *cursor += c.len_utf8();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_markdoc_tags_with_json_attrs() {
        let body = "{% field id=\"x\" min=0 required=true options=[\"a\",\"b\"] %}\n{% /field %}\n";
        let (tags, syntax) = scan(body, 0).expect("scan");
        assert_eq!(syntax, TagSyntax::Markdoc);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "field");
        assert!(!tags[0].closing);
        assert_eq!(tags[0].attr("id"), Some(&Value::String("x".into())));
        assert_eq!(tags[0].attr("min"), Some(&Value::from(0)));
        assert!(tags[1].closing);
    }

    #[test]
    fn scans_html_comment_tags() {
        let body = "<!-- form id=\"f\" -->\n<!-- /form -->\n";
        let (tags, syntax) = scan(body, 0).expect("scan");
        assert_eq!(syntax, TagSyntax::HtmlComment);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "form");
    }

    #[test]
    fn mixed_syntaxes_are_rejected() {
        let body = "{% form id=\"f\" %}\n<!-- /form -->\n";
        let err = scan(body, 0).expect_err("should fail");
        assert!(err.message.contains("mixed tag syntaxes"));
    }

    #[test]
    fn tag_like_text_inside_code_fences_is_ignored() {
        let body = "```\n{% not a tag %}\n```\n{% form id=\"f\" %}\n{% /form %}\n";
        let (tags, _) = scan(body, 0).expect("scan");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].start, body.find("{% form").expect("find"));
    }

    #[test]
    fn string_attr_containing_delimiter_is_handled() {
        let body = "{% field id=\"x\" label=\"uses %} inside\" %}{% /field %}";
        let (tags, _) = scan(body, 0).expect("scan");
        assert_eq!(
            tags[0].attr("label"),
            Some(&Value::String("uses %} inside".into()))
        );
    }

    #[test]
    fn multibyte_whitespace_inside_a_tag_is_skipped() {
        let body = "{%\u{a0}form id=\"f\" %}{% /form %}";
        let (tags, _) = scan(body, 0).expect("scan");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "form");
    }

    #[test]
    fn unterminated_tag_reports_location() {
        let body = "text\n{% field id=\"x\"\n";
        let err = scan(body, 0).expect_err("should fail");
        assert_eq!(err.location.line, Some(2));
    }

    #[test]
    fn line_col_accounts_for_frontmatter_offset() {
        let body = "ab\ncd";
        assert_eq!(line_col(body, 4, 3), (5, 2));
    }
}
