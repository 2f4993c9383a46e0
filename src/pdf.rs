//! Page counting and padding removal for rendered PDF artifacts.

use std::path::Path;

use lopdf::Document;
use tracing::debug;

use crate::error::Result;

/// What [`trim`] did to an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimOutcome {
    /// Padding removed; `pages` content pages remain.
    Trimmed { pages: usize },
    /// Too few pages to strip the padding; the file was not touched.
    Unchanged { pages: usize },
}

/// Number of pages in a PDF file.
pub fn page_count<P: AsRef<Path>>(path: P) -> Result<usize> {
    let doc = Document::load(path)?;
    Ok(doc.get_pages().len())
}

/// Remove `leading` pages from the front and `trailing` pages from the
/// back of the PDF at `path`, rewriting it in place.
///
/// At least one page must survive; otherwise the file is left as it was.
pub fn trim<P: AsRef<Path>>(path: P, leading: usize, trailing: usize) -> Result<TrimOutcome> {
    let path = path.as_ref();
    let mut doc = Document::load(path)?;
    let total = doc.get_pages().len();

    if total <= leading + trailing {
        debug!(path = %path.display(), total, leading, trailing, "too few pages to trim");
        return Ok(TrimOutcome::Unchanged { pages: total });
    }

    let front = 1..=leading;
    let back = (total - trailing + 1)..=total;
    let drop: Vec<u32> = front.chain(back).map(|n| n as u32).collect();

    doc.delete_pages(&drop);
    doc.prune_objects();
    doc.save(path)?;

    let pages = total - drop.len();
    debug!(path = %path.display(), total, kept = pages, "trimmed padding pages");
    Ok(TrimOutcome::Trimmed { pages })
}
