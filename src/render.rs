//! Renderer adapter: the external layout engine used as a page-count oracle.
//!
//! The splitter never looks inside the renderer; it only needs a
//! deterministic, monotonic answer to "how many pages does this document
//! take?". [`MuseScore`] shells out to the MuseScore command line and reads
//! the page count back from the PDF it writes.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{Result, SplitError};
use crate::pdf;

pub trait Renderer {
    /// Lay out `document`, write the paginated artifact to `artifact`
    /// and return its page count. Blocks until the artifact exists.
    fn render(&self, document: &Path, artifact: &Path) -> Result<usize>;
}

impl<R: Renderer + ?Sized> Renderer for &R {
    fn render(&self, document: &Path, artifact: &Path) -> Result<usize> {
        (**self).render(document, artifact)
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&self, document: &Path, artifact: &Path) -> Result<usize> {
        (**self).render(document, artifact)
    }
}

/// MuseScore command-line renderer (`mscore3 <in> -o <out.pdf>`).
#[derive(Debug, Clone)]
pub struct MuseScore {
    program: PathBuf,
}

impl MuseScore {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for MuseScore {
    fn default() -> Self {
        Self::new("mscore3")
    }
}

impl Renderer for MuseScore {
    fn render(&self, document: &Path, artifact: &Path) -> Result<usize> {
        debug!(program = %self.program.display(), document = %document.display(), "rendering");

        let output = Command::new(&self.program)
            .arg(document)
            .arg("-o")
            .arg(artifact)
            .output()
            .map_err(|e| {
                SplitError::render(
                    document,
                    format!("failed to start '{}': {e}", self.program.display()),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SplitError::render(
                document,
                format!("{} ({})", output.status, stderr.trim()),
            ));
        }
        if !artifact.is_file() {
            return Err(SplitError::render(document, "no output file was produced"));
        }

        pdf::page_count(artifact)
    }
}
