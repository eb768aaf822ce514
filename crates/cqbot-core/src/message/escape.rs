//! Outbound CQ code construction and entity escaping.
//!
//! Inbound parsing never unescapes: [`extract_tags`](super::extract_tags)
//! returns values exactly as they appear on the wire. These helpers are for
//! bots that build outgoing messages and need a value containing `,` or `]`
//! to survive the trip.
//!
//! | Character | Entity |
//! |-----------|--------|
//! | `&` | `&amp;` |
//! | `[` | `&#91;` |
//! | `]` | `&#93;` |
//! | `,` | `&#44;` (values only) |

use std::fmt;

const ENTITIES: [(char, &str); 4] = [('&', "&amp;"), ('[', "&#91;"), (']', "&#93;"), (',', "&#44;")];

fn escape_with(text: &str, comma: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match ENTITIES.iter().find(|(raw, _)| *raw == c) {
            Some((',', _)) if !comma => out.push(c),
            Some((_, entity)) => out.push_str(entity),
            None => out.push(c),
        }
    }
    out
}

/// Escapes plain text so it cannot be mistaken for a CQ code.
pub fn escape_text(text: &str) -> String {
    escape_with(text, false)
}

/// Escapes a CQ code parameter value.
pub fn escape_value(value: &str) -> String {
    escape_with(value, true)
}

/// Reverses [`escape_text`] and [`escape_value`] in one pass, so an escaped
/// entity such as `&amp;#91;` comes back as the literal `&#91;`.
///
/// The parser never calls this. Handlers get argument text exactly as it
/// arrived so `raw` always matches the wire; a bot that wants the decoded
/// value of a parameter calls it itself.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        match ENTITIES.iter().find(|(_, entity)| rest.starts_with(entity)) {
            Some((raw, entity)) => {
                out.push(*raw);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Builder for a single outbound CQ code.
///
/// ```rust
/// use cqbot_core::message::CqCode;
///
/// let code = CqCode::new("at").param("qq", 10001000);
/// assert_eq!(code.to_string(), "[CQ:at,qq=10001000]");
///
/// let share = CqCode::new("share").param("title", "a,b");
/// assert_eq!(share.to_string(), "[CQ:share,title=a&#44;b]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CqCode {
    name: String,
    params: Vec<(String, String)>,
}

impl CqCode {
    /// Starts a code with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Appends a parameter. Values are escaped when rendered.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// `[CQ:at,qq=<user_id>]`
    pub fn at(user_id: i64) -> Self {
        Self::new("at").param("qq", user_id)
    }

    /// `[CQ:face,id=<id>]`
    pub fn face(id: i32) -> Self {
        Self::new("face").param("id", id)
    }

    /// `[CQ:image,file=<file>]`
    pub fn image(file: impl Into<String>) -> Self {
        Self::new("image").param("file", file.into())
    }
}

impl fmt::Display for CqCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[CQ:{}", self.name)?;
        for (key, value) in &self.params {
            write!(f, ",{}={}", key, escape_value(value))?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::extract_tags;

    #[test]
    fn test_escaping() {
        assert_eq!(escape_text("Hello [World]"), "Hello &#91;World&#93;");
        assert_eq!(escape_text("A & B"), "A &amp; B");
        assert_eq!(escape_value("a,b"), "a&#44;b");
        assert_eq!(unescape("&#91;x&#93; &amp; &#44;"), "[x] & ,");
    }

    #[test]
    fn test_unescape_is_single_pass() {
        assert_eq!(escape_text("&#91;"), "&amp;#91;");
        assert_eq!(unescape("&amp;#91;"), "&#91;");
        assert_eq!(unescape("a & b &c"), "a & b &c");
    }

    #[test]
    fn test_builder_output_is_parseable() {
        let code = CqCode::image("http://example.com/a.jpg?x=1,2").to_string();
        let tags = extract_tags(&code);
        assert_eq!(tags.len(), 1);
        assert_eq!(
            unescape(tags[0].param("file").unwrap()),
            "http://example.com/a.jpg?x=1,2"
        );
    }

    #[test]
    fn test_shortcuts() {
        assert_eq!(CqCode::at(42).to_string(), "[CQ:at,qq=42]");
        assert_eq!(CqCode::face(178).to_string(), "[CQ:face,id=178]");
        assert_eq!(CqCode::new("dice").to_string(), "[CQ:dice]");
    }
}
