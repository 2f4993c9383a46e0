//! Page-by-page splitting of whole scores.
//!
//! For each part, pages are fitted strictly in order: the fit search asks
//! the renderer how many pages a padded candidate takes, the accepted run
//! is assembled and rendered once more for verification, and the padding
//! pages are cut from the artifact. The state resolved over each accepted
//! run is carried into the next page.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use crate::assemble::{expected_pages, Assembler};
use crate::carry::Snapshot;
use crate::error::{Result, SplitError};
use crate::fit::largest_fit;
use crate::model::{Part, Score};
use crate::options::SplitOptions;
use crate::pdf::{self, TrimOutcome};
use crate::render::Renderer;
use crate::writer;

/// One emitted page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRecord {
    pub work: String,
    /// Page number within the work (1-based, in part order)
    pub page: usize,
    pub part: String,
    /// Part-relative number of the first measure on the page (1-based)
    pub first_measure: usize,
    pub measure_count: usize,
    pub content: PathBuf,
    pub artifact: PathBuf,
}

/// A page whose verification render did not have the expected shape.
/// Its padded document and artifact are left on disk untrimmed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedPage {
    pub work: String,
    pub page: usize,
    pub part: String,
    pub artifact: PathBuf,
    pub rendered_pages: usize,
    pub expected_min: usize,
    pub expected_max: usize,
}

/// A part whose pagination stopped on an error. Pages accepted before
/// the failure are kept and reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedPart {
    pub work: String,
    pub part: String,
    pub error: String,
}

/// A work that could not be split at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedWork {
    pub work: String,
    pub error: String,
}

/// Outcome of splitting one or more works.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SplitReport {
    /// Works attempted
    pub works: usize,
    pub pages: Vec<PageRecord>,
    pub flagged_pages: Vec<FlaggedPage>,
    /// Works with at least one flagged page
    pub flagged_works: Vec<String>,
    pub failed_parts: Vec<FailedPart>,
    pub failed_works: Vec<FailedWork>,
}

impl SplitReport {
    pub fn merge(&mut self, other: SplitReport) {
        self.works += other.works;
        self.pages.extend(other.pages);
        self.flagged_pages.extend(other.flagged_pages);
        self.flagged_works.extend(other.flagged_works);
        self.failed_parts.extend(other.failed_parts);
        self.failed_works.extend(other.failed_works);
    }

    pub fn summary(&self) -> String {
        format!(
            "works processed: {}, pages emitted: {}, pages flagged: {}, works flagged: {}, parts failed: {}, works failed: {}",
            self.works,
            self.pages.len(),
            self.flagged_pages.len(),
            self.flagged_works.len(),
            self.failed_parts.len(),
            self.failed_works.len()
        )
    }

    /// Whether any part or work stopped on an error.
    pub fn has_failures(&self) -> bool {
        !self.failed_parts.is_empty() || !self.failed_works.is_empty()
    }

    /// Write the report as pretty JSON.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Drives the page-fit search and page emission with a given renderer.
pub struct Splitter<R> {
    renderer: R,
    options: SplitOptions,
}

enum PageOutcome {
    Emitted(PageRecord),
    Flagged(FlaggedPage),
}

impl<R: Renderer> Splitter<R> {
    pub fn new(renderer: R, options: SplitOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { renderer, options })
    }

    pub fn options(&self) -> &SplitOptions {
        &self.options
    }

    /// Load the score at `path` and split it into `out_dir`.
    pub fn split_file<P: AsRef<Path>, Q: AsRef<Path>>(&self, path: P, out_dir: Q) -> Result<SplitReport> {
        let path = path.as_ref();
        let score = crate::load_file(path)?;
        self.split_score(score, &work_name(path), out_dir.as_ref())
    }

    /// Split every work in `inputs`, each into `out_dir/<stem>/`.
    ///
    /// A work that fails is recorded and skipped; the others still run.
    pub fn split_corpus<P: AsRef<Path>>(&self, inputs: &[PathBuf], out_dir: P) -> SplitReport {
        let mut report = SplitReport::default();
        for input in inputs {
            let work = work_name(input);
            match self.split_file(input, out_dir.as_ref().join(&work)) {
                Ok(r) => report.merge(r),
                Err(e) => {
                    error!(work = %work, error = %e, "work failed");
                    report.works += 1;
                    report.failed_works.push(FailedWork {
                        work,
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Split every part of `score` into pages written to `out_dir`.
    ///
    /// A part that fails keeps the pages it already emitted; the failure
    /// is recorded and the next part is split as usual.
    pub fn split_score(&self, mut score: Score, work: &str, out_dir: &Path) -> Result<SplitReport> {
        let _span = info_span!("work", name = %work).entered();
        fs::create_dir_all(out_dir)?;

        let stripped = score.strip_layout_hints();
        debug!(stripped, "removed layout hints");

        let mut report = SplitReport {
            works: 1,
            ..SplitReport::default()
        };
        let mut page = 1;
        for part in &score.parts {
            let mut outcomes = Vec::new();
            let result = self.split_part(&score, part, work, page, out_dir, &mut outcomes);
            page += outcomes.len();
            for outcome in outcomes {
                match outcome {
                    PageOutcome::Emitted(record) => report.pages.push(record),
                    PageOutcome::Flagged(flagged) => report.flagged_pages.push(flagged),
                }
            }
            if let Err(e) = result {
                warn!(part = %part.id, error = %e, "part failed, continuing with the next one");
                report.failed_parts.push(FailedPart {
                    work: work.to_string(),
                    part: part.id.clone(),
                    error: e.to_string(),
                });
            }
        }

        if !report.flagged_pages.is_empty() {
            report.flagged_works.push(work.to_string());
        }
        info!(
            pages = report.pages.len(),
            flagged = report.flagged_pages.len(),
            failed_parts = report.failed_parts.len(),
            "work split"
        );
        Ok(report)
    }

    fn split_part(
        &self,
        score: &Score,
        part: &Part,
        work: &str,
        first_page: usize,
        out_dir: &Path,
        outcomes: &mut Vec<PageOutcome>,
    ) -> Result<()> {
        let _span = info_span!("part", id = %part.id).entered();
        let assembler = Assembler::new(score, self.options.clef_mode);
        let measures = &part.measures;
        let budget = self.options.page_budget;

        let mut carry = Snapshot::default();
        let mut index = 0;

        while index < measures.len() {
            let remaining = &measures[index..];
            let fit = largest_fit(remaining.len(), budget, |k| {
                let run = assembler.prepare_run(&remaining[..k], index, &carry);
                let candidate = assembler.candidate(&part.id, &run, &carry);
                self.probe(&candidate, out_dir)
            })?;

            if fit == 0 {
                return Err(SplitError::MeasureDoesNotFit {
                    part: part.id.clone(),
                    measure: index + 1,
                });
            }

            let run = assembler.prepare_run(&remaining[..fit], index, &carry);
            let page_state = Snapshot::resolve(&run, self.options.clef_mode);
            let is_final = index + fit == measures.len();
            let page = first_page + outcomes.len();
            info!(page, first_measure = index + 1, measures = fit, is_final, "page fitted");

            let assembled = assembler.assemble(&part.id, run, &page_state, is_final);
            let stem = format!("section_{page}_part_{}", file_safe(&part.id));
            let target = PageTarget {
                work,
                page,
                part: &part.id,
                first_measure: index + 1,
                measure_count: fit,
                is_final,
            };
            outcomes.push(self.emit(&target, &assembled.content, &assembled.padded, &stem, out_dir)?);

            carry = page_state;
            index += fit;
        }

        Ok(())
    }

    /// Render one candidate in a scratch directory and return its page count.
    /// The directory is removed when this returns, whatever the outcome.
    fn probe(&self, candidate: &Score, out_dir: &Path) -> Result<usize> {
        let scratch = tempfile::Builder::new().prefix(".probe-").tempdir_in(out_dir)?;
        let document = scratch.path().join("candidate.musicxml");
        let artifact = scratch.path().join("candidate.pdf");
        writer::write_file(candidate, &document)?;
        self.renderer.render(&document, &artifact)
    }

    fn emit(
        &self,
        target: &PageTarget<'_>,
        content: &Score,
        padded: &Score,
        stem: &str,
        out_dir: &Path,
    ) -> Result<PageOutcome> {
        let content_path = out_dir.join(format!("{stem}.musicxml"));
        let padded_path = out_dir.join(format!("{stem}.padded.musicxml"));
        let artifact = out_dir.join(format!("{stem}.pdf"));

        writer::write_file(content, &content_path)?;
        writer::write_file(padded, &padded_path)?;
        let rendered = self.renderer.render(&padded_path, &artifact)?;

        let expected = expected_pages(target.is_final, self.options.page_budget);
        let trailing = usize::from(!target.is_final);
        let outcome = if expected.contains(&rendered) {
            pdf::trim(&artifact, 1, trailing)?
        } else {
            TrimOutcome::Unchanged { pages: rendered }
        };

        if let TrimOutcome::Unchanged { pages } = outcome {
            warn!(
                page = target.page,
                artifact = %artifact.display(),
                rendered = pages,
                expected = ?expected,
                "unexpected page count, leaving artifact untrimmed"
            );
            return Ok(PageOutcome::Flagged(FlaggedPage {
                work: target.work.to_string(),
                page: target.page,
                part: target.part.to_string(),
                artifact,
                rendered_pages: pages,
                expected_min: *expected.start(),
                expected_max: *expected.end(),
            }));
        }

        if !self.options.keep_padded {
            fs::remove_file(&padded_path)?;
        }

        Ok(PageOutcome::Emitted(PageRecord {
            work: target.work.to_string(),
            page: target.page,
            part: target.part.to_string(),
            first_measure: target.first_measure,
            measure_count: target.measure_count,
            content: content_path,
            artifact,
        }))
    }
}

struct PageTarget<'a> {
    work: &'a str,
    page: usize,
    part: &'a str,
    first_measure: usize,
    measure_count: usize,
    is_final: bool,
}

/// Score files directly inside `dir`, sorted by name.
pub fn collect_scores<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("musicxml") | Some("xml") | Some("mxl")
            )
        })
        .collect();
    files.sort();
    Ok(files)
}

fn work_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(file_safe)
        .unwrap_or_else(|| "score".to_string())
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
