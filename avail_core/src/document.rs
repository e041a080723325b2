//! Schema and features documents are JSON that may carry `//` and `/* */`
//! comments. Comments are blanked out before handing the text to
//! `serde_json`, keeping byte offsets in parser errors meaningful.

use serde_json::Value;

/// Parser failure for a single document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MalformedDocument(String);

impl MalformedDocument {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Parse a commented JSON document.
///
/// # Errors
///
/// Returns [`MalformedDocument`] for invalid UTF-8, unterminated block
/// comments, or invalid JSON.
pub fn parse_json(bytes: &[u8]) -> Result<Value, MalformedDocument> {
    let text = std::str::from_utf8(bytes)
        .map_err(|err| MalformedDocument::new(format!("invalid UTF-8: {err}")))?;
    let stripped = strip_comments(text)?;
    serde_json::from_str(&stripped).map_err(|err| MalformedDocument::new(err.to_string()))
}

/// Replace comments with whitespace, leaving string literals untouched.
///
/// # Errors
///
/// Returns [`MalformedDocument`] if a block comment is never closed.
pub fn strip_comments(text: &str) -> Result<String, MalformedDocument> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(ch) = chars.next() {
        if in_string {
            out.push(ch);
            match ch {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (ch, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(ch);
            }
            ('/', Some('/')) => {
                // Keep the newline so line numbers in errors stay accurate.
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut closed = false;
                while let Some(skipped) = chars.next() {
                    if skipped == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        closed = true;
                        break;
                    }
                    out.push(if skipped == '\n' { '\n' } else { ' ' });
                }
                if !closed {
                    return Err(MalformedDocument::new("unterminated block comment"));
                }
            }
            _ => out.push(ch),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_removed_outside_strings() {
        let text = r#"// Copyright header
{
  /* block */ "url": "http://example.com", // trailing
  "pattern": "a/*b*/c"
}"#;
        let value = parse_json(text.as_bytes()).expect("parse commented json");
        assert_eq!(value["url"], "http://example.com");
        assert_eq!(value["pattern"], "a/*b*/c");
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let value = parse_json(br#"{"a": "say \"//hi\""}"#).expect("parse escaped");
        assert_eq!(value["a"], "say \"//hi\"");
    }

    #[test]
    fn unterminated_block_comment_is_malformed() {
        assert!(parse_json(b"{ /* nope }").is_err());
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_json(b"{\"a\": }").expect_err("invalid json");
        assert!(!err.to_string().is_empty());
    }
}
