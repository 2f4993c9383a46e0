//! Split configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::carry::ClefMode;
use crate::error::{Result, SplitError};

/// Knobs for one split run. Every field has a default, so a config file
/// only needs the values it changes:
///
/// ```toml
/// page_budget = 3
/// clef_mode = "single"
/// renderer = "/usr/bin/mscore3"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitOptions {
    /// Maximum rendered pages for a padded candidate (leading pad,
    /// content, trailing pad). At least 3, since both pads take a page.
    pub page_budget: usize,
    pub clef_mode: ClefMode,
    /// Renderer executable.
    pub renderer: PathBuf,
    /// Keep `*.padded.musicxml` after a page has been verified.
    pub keep_padded: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            page_budget: 3,
            clef_mode: ClefMode::PerStaff,
            renderer: PathBuf::from("mscore3"),
            keep_padded: false,
        }
    }
}

impl SplitOptions {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: Self = toml::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_budget < 3 {
            return Err(SplitError::Config(format!(
                "page_budget must be at least 3 (two padding pages plus content), got {}",
                self.page_budget
            )));
        }
        if self.renderer.as_os_str().is_empty() {
            return Err(SplitError::Config("renderer must not be empty".to_string()));
        }
        Ok(())
    }
}
