//! # Grapefruit Core
//!
//! Core types and utilities shared by the Grapefruit crates:
//! the error taxonomy, the G-code line sanitizer, and motion
//! command formatting.

pub mod error;
pub mod gcode;

pub use error::{ConnectionError, Error, GcodeError, LinkError, Result};

pub use gcode::{
    linear_move, prepare, rapid_move, sanitize, InlineCommentPolicy, MoveTarget, COMMENT_MARKERS,
};
