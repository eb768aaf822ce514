//! The message breakdown engine.
//!
//! Turns a raw protocol string into an ordered list of [`MessagePart`]s.
//!
//! # Command grammar
//!
//! After trimming, a message is a command when it starts with `/` followed by
//! a non-whitespace character and the *whole* string has the shape
//!
//! ```text
//! /<ascii letters>( ?<non-whitespace run>)*
//! ```
//!
//! Arguments are the remainder split on single spaces. A message that starts
//! like a command but does not fit the grammar (two spaces in a row, a tab, a
//! digit right after the slash) is tokenized as plain text instead.
//!
//! Trimming and the grammar use one whitespace class throughout. It counts a
//! byte order mark (U+FEFF) as whitespace and NEXT LINE (U+0085) as an
//! ordinary character.
//!
//! ```rust
//! use cqbot_core::message::{MessagePart, breakdown};
//!
//! let parts = breakdown("/Ban 123 [CQ:at,qq=42]");
//! let MessagePart::Command { name, arguments } = &parts[0] else { panic!() };
//! assert_eq!(name, "ban");
//! assert_eq!(arguments[1].raw, "[CQ:at,qq=42]");
//! assert!(matches!(arguments[1].parts[0], MessagePart::InlineCode { .. }));
//! ```

use tracing::debug;

use super::part::{Argument, MessagePart};
use super::tag::extract_tags;

/// Whether command detection is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Try the command grammar first, fall back to plain tokenization.
    #[default]
    Command,
    /// Text and inline codes only.
    Plain,
}

/// Parses a message, recognizing commands.
pub fn breakdown(source: &str) -> Vec<MessagePart> {
    breakdown_with(source, ParseMode::Command)
}

/// Parses a message as text and inline codes only.
pub fn breakdown_plain(source: &str) -> Vec<MessagePart> {
    breakdown_with(source, ParseMode::Plain)
}

/// Parses a message in the given mode.
pub fn breakdown_with(source: &str, mode: ParseMode) -> Vec<MessagePart> {
    let text = source.trim_matches(is_message_whitespace);

    if mode == ParseMode::Command && looks_like_command(text) {
        if let Some(command) = parse_command(text) {
            return vec![command];
        }
        debug!(text = %text, "Slash prefix without command grammar, parsing as text");
    }

    tokenize(text)
}

/// `/` immediately followed by a non-whitespace character.
fn looks_like_command(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next() == Some('/') && chars.next().is_some_and(|c| !is_message_whitespace(c))
}

/// Matches the whole of `text` against the command grammar.
fn parse_command(text: &str) -> Option<MessagePart> {
    let body = text.strip_prefix('/')?;
    let name_len = body
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .count();
    if name_len == 0 {
        return None;
    }
    let (name, rest) = body.split_at(name_len);

    if !is_argument_tail(rest) {
        return None;
    }

    let arguments = rest
        .split(' ')
        .filter(|token| !is_blank(token))
        .map(|token| Argument {
            raw: token.to_string(),
            parts: breakdown_plain(token),
        })
        .collect();

    Some(MessagePart::Command {
        name: name.to_ascii_lowercase(),
        arguments,
    })
}

/// Checks `( ?\S+)*` against the full remainder: the only whitespace allowed
/// is a single ASCII space, and every space must be followed by a
/// non-whitespace character.
fn is_argument_tail(rest: &str) -> bool {
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if !is_message_whitespace(c) {
            continue;
        }
        if c != ' ' {
            return false;
        }
        match chars.peek() {
            Some(&next) if !is_message_whitespace(next) => {}
            _ => return false,
        }
    }
    true
}

/// Whitespace as chat clients count it: Unicode `White_Space` plus the byte
/// order mark U+FEFF, minus NEXT LINE U+0085.
fn is_message_whitespace(c: char) -> bool {
    c == '\u{FEFF}' || (c.is_whitespace() && c != '\u{85}')
}

fn is_blank(text: &str) -> bool {
    text.chars().all(is_message_whitespace)
}

/// Splits already-trimmed text into text and inline-code parts.
fn tokenize(text: &str) -> Vec<MessagePart> {
    let mut parts = Vec::new();
    let mut cursor = 0;

    for tag in extract_tags(text) {
        push_text(&mut parts, &text[cursor..tag.begin]);
        parts.push(MessagePart::InlineCode {
            name: tag.name,
            params: tag.params,
        });
        cursor = tag.end;
    }
    push_text(&mut parts, &text[cursor..]);

    parts
}

fn push_text(parts: &mut Vec<MessagePart>, content: &str) {
    if !is_blank(content) {
        parts.push(MessagePart::text(content));
    }
}
