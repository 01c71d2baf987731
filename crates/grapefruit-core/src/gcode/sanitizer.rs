//! G-code line sanitizing
//!
//! Classifies a raw line as either nothing-to-send (blank or comment-only)
//! or a command to transmit, removing same-line comments according to the
//! configured [`InlineCommentPolicy`].

use serde::{Deserialize, Serialize};

/// Characters that open a comment.
///
/// A line starting with any of these is comment-only and never transmitted.
pub const COMMENT_MARKERS: [char; 3] = [':', '/', '('];

/// How comments that follow a command on the same line are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineCommentPolicy {
    /// Cut the line at the first comment marker
    #[default]
    Strip,
    /// Send the line as-is; only comment-only lines are suppressed
    Preserve,
}

impl std::fmt::Display for InlineCommentPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strip => write!(f, "strip"),
            Self::Preserve => write!(f, "preserve"),
        }
    }
}

/// Returns true when `line` (already trimmed) starts with a comment marker
pub fn is_comment(line: &str) -> bool {
    line.starts_with(COMMENT_MARKERS)
}

/// Sanitize one raw line.
///
/// Returns `None` when there is nothing to send: the line is blank or
/// starts with a comment marker. Otherwise returns the trimmed command,
/// with any inline comment removed under [`InlineCommentPolicy::Strip`].
pub fn sanitize(line: &str, policy: InlineCommentPolicy) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || is_comment(line) {
        return None;
    }

    match policy {
        InlineCommentPolicy::Preserve => Some(line.to_string()),
        InlineCommentPolicy::Strip => {
            let end = line.find(COMMENT_MARKERS).unwrap_or(line.len());
            // The first char is not a marker, so the remainder is never empty.
            Some(line[..end].trim_end().to_string())
        }
    }
}

/// Prepare a line for transmission.
///
/// With `run_anyway` set the sanitizer is bypassed and the trimmed line is
/// forwarded verbatim, comment markers included. An empty line is never
/// transmitted.
pub fn prepare(line: &str, run_anyway: bool, policy: InlineCommentPolicy) -> Option<String> {
    if run_anyway {
        let line = line.trim();
        return (!line.is_empty()).then(|| line.to_string());
    }
    sanitize(line, policy)
}
