//! Inline markup (CQ code) extraction.
//!
//! A CQ code is written as `[CQ:<name>,<key>=<value>,...]`. Names and keys are
//! one or more lowercase ASCII letters, values are any run of characters other
//! than `,` and `]`. There is no escape mechanism at this level, so a value can
//! never itself contain a comma or a closing bracket.
//!
//! ```rust
//! use cqbot_core::message::extract_tags;
//!
//! let tags = extract_tags("hi [CQ:face,id=178]");
//! assert_eq!(tags[0].name, "face");
//! assert_eq!(tags[0].param("id"), Some("178"));
//! assert_eq!((tags[0].begin, tags[0].end), (3, 19));
//! ```

use std::collections::BTreeMap;

/// Opening sequence of every CQ code.
const TAG_OPEN: &[u8] = b"[CQ:";

/// One inline markup occurrence found in a source string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Code name, e.g. `face` or `at`.
    pub name: String,
    /// Parameters in key order. A repeated key keeps its last value.
    pub params: BTreeMap<String, String>,
    /// Byte offset of the opening `[`.
    pub begin: usize,
    /// Byte offset one past the closing `]`.
    pub end: usize,
}

impl Tag {
    /// Returns the value of a parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Scans `source` left to right and returns every well-formed CQ code.
///
/// Matches never overlap. A `[CQ:` prefix that does not complete is skipped
/// one byte at a time, so a valid code that follows a broken one is still
/// found.
pub fn extract_tags(source: &str) -> Vec<Tag> {
    let bytes = source.as_bytes();
    let mut tags = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos..].starts_with(TAG_OPEN)
            && let Some(tag) = match_tag(source, pos)
        {
            pos = tag.end;
            tags.push(tag);
            continue;
        }
        pos += 1;
    }

    tags
}

/// Attempts to match a complete CQ code starting at `begin`.
fn match_tag(source: &str, begin: usize) -> Option<Tag> {
    let bytes = source.as_bytes();
    let mut pos = begin + TAG_OPEN.len();

    let name = take_lowercase(source, &mut pos)?.to_string();
    let mut params = BTreeMap::new();

    loop {
        match *bytes.get(pos)? {
            b']' => {
                return Some(Tag {
                    name,
                    params,
                    begin,
                    end: pos + 1,
                });
            }
            b',' => {
                pos += 1;
                let key = take_lowercase(source, &mut pos)?;
                if bytes.get(pos) != Some(&b'=') {
                    return None;
                }
                pos += 1;

                let value_start = pos;
                while pos < bytes.len() && !matches!(bytes[pos], b',' | b']') {
                    pos += 1;
                }
                if pos == value_start {
                    return None;
                }
                params.insert(key.to_string(), source[value_start..pos].to_string());
            }
            _ => return None,
        }
    }
}

/// Consumes one or more lowercase ASCII letters.
fn take_lowercase<'a>(source: &'a str, pos: &mut usize) -> Option<&'a str> {
    let bytes = source.as_bytes();
    let start = *pos;
    while bytes.get(*pos).is_some_and(u8::is_ascii_lowercase) {
        *pos += 1;
    }
    (*pos > start).then(|| &source[start..*pos])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tag_with_params() {
        let tags = extract_tags("[CQ:image,file=abc.jpg,url=http://x/y?a=1]");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "image");
        assert_eq!(tags[0].param("file"), Some("abc.jpg"));
        assert_eq!(tags[0].param("url"), Some("http://x/y?a=1"));
        assert_eq!(tags[0].begin, 0);
        assert_eq!(tags[0].end, 42);
    }

    #[test]
    fn test_tag_without_params() {
        let tags = extract_tags("roll [CQ:dice]!");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "dice");
        assert!(tags[0].params.is_empty());
        assert_eq!(&"roll [CQ:dice]!"[tags[0].begin..tags[0].end], "[CQ:dice]");
    }

    #[test]
    fn test_multiple_tags_in_order() {
        let source = "[CQ:at,qq=1] hi [CQ:at,qq=2]";
        let tags = extract_tags(source);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].param("qq"), Some("1"));
        assert_eq!(tags[1].param("qq"), Some("2"));
        assert!(tags[0].end <= tags[1].begin);
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let tags = extract_tags("[CQ:face,id=1,id=2]");
        assert_eq!(tags[0].param("id"), Some("2"));
        assert_eq!(tags[0].params.len(), 1);
    }

    #[test]
    fn test_uppercase_names_are_rejected() {
        assert!(extract_tags("[CQ:Face,id=1]").is_empty());
        assert!(extract_tags("[CQ:face,ID=1]").is_empty());
        assert!(extract_tags("[cq:face,id=1]").is_empty());
    }

    #[test]
    fn test_malformed_tags_are_ignored() {
        assert!(extract_tags("[CQ:face,id=1").is_empty());
        assert!(extract_tags("[CQ:face,id=]").is_empty());
        assert!(extract_tags("[CQ:face,id]").is_empty());
        assert!(extract_tags("[CQ:]").is_empty());
        assert!(extract_tags("[CQ:face id=1]").is_empty());
    }

    #[test]
    fn test_valid_tag_after_broken_prefix() {
        let source = "[CQ:broken [CQ:face,id=5]";
        let tags = extract_tags(source);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].begin, 11);
        assert_eq!(tags[0].param("id"), Some("5"));
    }

    #[test]
    fn test_multibyte_text_offsets() {
        let source = "你好[CQ:face,id=14]世界";
        let tags = extract_tags(source);
        assert_eq!(tags.len(), 1);
        assert_eq!(&source[..tags[0].begin], "你好");
        assert_eq!(&source[tags[0].end..], "世界");
    }

    #[test]
    fn test_value_keeps_non_ascii_characters() {
        let tags = extract_tags("[CQ:share,title=天气 晴]");
        assert_eq!(tags[0].param("title"), Some("天气 晴"));
    }
}
