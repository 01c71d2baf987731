//! Text buffer implementation using rope data structure for efficient text manipulation

use ropey::Rope;
use std::fmt;

/// Editable text buffer backed by a rope.
///
/// Holds either a loaded G-code file or the free-form command batch the
/// operator typed; [`TextBuffer::command_lines`] yields the lines to stream.
#[derive(Clone, Default)]
pub struct TextBuffer {
    rope: Rope,
}

impl TextBuffer {
    /// Create a new empty text buffer
    pub fn new() -> Self {
        Self { rope: Rope::new() }
    }

    fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// Lines without their terminators, in order.
    ///
    /// Only `\n` and `\r\n` end a line; other Unicode line breaks stay part
    /// of the command. The empty line after a final newline is not included.
    pub fn command_lines(&self) -> Vec<String> {
        let text = self.rope.to_string();
        let mut lines: Vec<String> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();

        if text.is_empty() || text.ends_with('\n') {
            lines.pop();
        }
        lines
    }

    /// Append a line, adding a newline separator when needed
    pub fn push_line(&mut self, line: &str) {
        let len = self.len_chars();
        if len > 0 && self.rope.char(len - 1) != '\n' {
            self.rope.insert(len, "\n");
        }
        let len = self.len_chars();
        self.rope.insert(len, line);
    }
}

impl From<&str> for TextBuffer {
    fn from(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }
}

impl fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rope)
    }
}

impl fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextBuffer")
            .field("lines", &self.len_lines())
            .field("chars", &self.len_chars())
            .finish()
    }
}
