//! G-code file input
//!
//! Opens the plain-text files the operator can stream (`.txt`, `.nc`,
//! `.gc`, `.TAP`) and lists the candidates in a directory.

use crate::text_buffer::TextBuffer;
use grapefruit_core::{GcodeError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A file type offered by the file browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcodeFileType {
    /// Label shown to the operator
    pub name: &'static str,
    /// Extension without the dot; matched case-sensitively
    pub extension: &'static str,
}

/// Accepted G-code file types
pub const GCODE_FILE_TYPES: [GcodeFileType; 4] = [
    GcodeFileType {
        name: "Text Files",
        extension: "txt",
    },
    GcodeFileType {
        name: "Numerical Control Files",
        extension: "nc",
    },
    GcodeFileType {
        name: "G-code Files",
        extension: "gc",
    },
    GcodeFileType {
        name: "Tape Files",
        extension: "TAP",
    },
];

/// The accepted file type for `path`, if any
pub fn file_type_of(path: &Path) -> Option<GcodeFileType> {
    let ext = path.extension()?.to_str()?;
    GCODE_FILE_TYPES.iter().copied().find(|t| t.extension == ext)
}

/// Check if `path` has an accepted G-code extension
pub fn is_gcode_file(path: &Path) -> bool {
    file_type_of(path).is_some()
}

/// List the G-code files directly inside `dir`, sorted by path
pub fn list_gcode_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_gcode_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// A G-code file loaded into a text buffer
#[derive(Debug, Clone)]
pub struct GcodeFile {
    path: PathBuf,
    file_type: GcodeFileType,
    buffer: TextBuffer,
}

impl GcodeFile {
    /// Open and read a G-code file.
    ///
    /// # Errors
    /// [`GcodeError::UnsupportedFileType`] when the extension is not accepted,
    /// [`GcodeError::FileError`] when the file cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file_type = file_type_of(&path).ok_or_else(|| GcodeError::UnsupportedFileType {
            path: path.display().to_string(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })?;

        let bytes = fs::read(&path).map_err(|e| GcodeError::FileError {
            reason: format!("{}: {}", path.display(), e),
        })?;
        let text = String::from_utf8_lossy(&bytes);
        let buffer = TextBuffer::from(text.as_ref());

        tracing::debug!("Read {} ({}, {:?})", path.display(), file_type.name, buffer);

        Ok(Self {
            path,
            file_type,
            buffer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_type(&self) -> GcodeFileType {
        self.file_type
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    /// Mutable access for in-place edits before streaming
    pub fn buffer_mut(&mut self) -> &mut TextBuffer {
        &mut self.buffer
    }

    /// Lines to stream, in file order
    pub fn lines(&self) -> Vec<String> {
        self.buffer.command_lines()
    }

    /// Write the buffer back to its file
    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, self.buffer.to_string()).map_err(|e| GcodeError::FileError {
            reason: format!("{}: {}", self.path.display(), e),
        })?;
        Ok(())
    }
}
