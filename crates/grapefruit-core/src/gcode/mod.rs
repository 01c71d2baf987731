//! G-code line handling: comment sanitizing and motion formatting.

pub mod motion;
pub mod sanitizer;

pub use motion::{linear_move, rapid_move, MoveTarget};
pub use sanitizer::{is_comment, prepare, sanitize, InlineCommentPolicy, COMMENT_MARKERS};
