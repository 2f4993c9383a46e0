//! Error taxonomy for loading, fitting and emitting score fragments.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SplitError {
    /// The input is not a well-formed `score-partwise` document.
    #[error("parse error: {0}")]
    Parse(String),

    /// The renderer failed to produce an artifact for a document.
    #[error("renderer failed on '{}': {reason}", document.display())]
    Render { document: PathBuf, reason: String },

    /// Not even a single measure fits within the page budget.
    #[error("measure {measure} of part '{part}' does not fit on one page")]
    MeasureDoesNotFit { part: String, measure: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML write error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("MXL archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("report serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SplitError {
    pub(crate) fn render(document: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SplitError::Render {
            document: document.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SplitError>;
