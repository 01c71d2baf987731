//! # Grapefruit G-Code Editor
//!
//! Text handling for the two sources a batch can be streamed from:
//!
//! - **GcodeFile**: a `.txt`/`.nc`/`.gc`/`.TAP` file loaded from disk
//! - **TextBuffer**: rope-based buffer, also used for free-form command batches
//!
//! ```rust,ignore
//! use grapefruit_gcodeeditor::GcodeFile;
//!
//! let file = GcodeFile::open("job.nc")?;
//! for line in file.lines() {
//!     println!("{line}");
//! }
//! ```

pub mod file_io;
mod text_buffer;

pub use file_io::{
    file_type_of, is_gcode_file, list_gcode_files, GcodeFile, GcodeFileType, GCODE_FILE_TYPES,
};
pub use text_buffer::TextBuffer;
