//! Message representation and parsing.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`tag`] | Locate CQ codes in a raw string |
//! | [`breakdown`](mod@breakdown) | Turn a raw string into [`MessagePart`]s |
//! | [`part`] | The parsed representation and query helpers |
//! | [`escape`] | Build outbound CQ codes safely |
//!
//! ```text
//! "/kick [CQ:at,qq=42] spam"
//!        │
//!        ▼  breakdown
//! [Command { name: "kick", arguments: [
//!     Argument { raw: "[CQ:at,qq=42]", parts: [InlineCode { at, qq=42 }] },
//!     Argument { raw: "spam",          parts: [Text("spam")] },
//! ] }]
//! ```

pub mod breakdown;
pub mod escape;
pub mod part;
pub mod tag;

pub use breakdown::{ParseMode, breakdown, breakdown_plain, breakdown_with};
pub use escape::{CqCode, escape_text, escape_value, unescape};
pub use part::{Argument, MessagePart, MessageParts};
pub use tag::{Tag, extract_tags};
