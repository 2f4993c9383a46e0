//! scoresplit: split MusicXML scores into single-page fragments.
//!
//! Each part is cut into runs of measures that fit on one rendered page,
//! as measured by an external renderer. Every run is written as a
//! standalone score with the tempo, dynamics, key, time, clef and
//! divisions it inherits made explicit on its first measure, together
//! with a rendered PDF of just that page.
//!
//! Supports both uncompressed MusicXML (.musicxml) and compressed MXL (.mxl) files.
//!
//! # Example
//! ```no_run
//! use scoresplit::{MuseScore, SplitOptions, Splitter};
//!
//! let splitter = Splitter::new(MuseScore::default(), SplitOptions::default()).unwrap();
//! let report = splitter.split_file("path/to/score.musicxml", "out").unwrap();
//! println!("{}", report.summary());
//! ```

pub mod assemble;
pub mod carry;
pub mod error;
pub mod fit;
pub mod model;
pub mod mxl;
pub mod options;
pub mod parser;
pub mod pdf;
pub mod render;
pub mod split;
pub mod writer;

use std::path::Path;

pub use assemble::{Assembled, Assembler};
pub use carry::{ClefMode, Snapshot};
pub use error::{Result, SplitError};
pub use fit::largest_fit;
pub use model::*;
pub use mxl::parse_mxl;
pub use options::SplitOptions;
pub use parser::parse_musicxml;
pub use render::{MuseScore, Renderer};
pub use split::{collect_scores, FailedPart, FailedWork, FlaggedPage, PageRecord, SplitReport, Splitter};
pub use writer::to_musicxml;

/// Load a score from a file path.
/// Automatically detects format based on file extension:
/// - `.musicxml` or `.xml` → uncompressed MusicXML
/// - `.mxl` → compressed MXL (ZIP archive)
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Score> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    load_bytes(&data, path.extension().and_then(|e| e.to_str()))
}

/// Load a score from raw bytes with an optional format hint.
/// If `extension` is None, tries to auto-detect the format.
pub fn load_bytes(data: &[u8], extension: Option<&str>) -> Result<Score> {
    match extension {
        Some("mxl") => parse_mxl(data),
        Some("musicxml") | Some("xml") => parse_musicxml(utf8(data)?),
        _ => {
            // Auto-detect: try as XML first, then as MXL
            if let Ok(xml) = std::str::from_utf8(data) {
                if xml.trim_start().starts_with('<') {
                    return parse_musicxml(xml);
                }
            }
            parse_mxl(data)
        }
    }
}

fn utf8(data: &[u8]) -> Result<&str> {
    std::str::from_utf8(data)
        .map_err(|e| SplitError::Parse(format!("Invalid UTF-8 in MusicXML file: {e}")))
}
