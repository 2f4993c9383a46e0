//! Fragment assembly: turning a run of measures into standalone documents.
//!
//! Every document handed to the renderer is padded: a blank leading
//! measure fills page 1 and, for interior runs, a blank trailing measure
//! behind a forced page break fills the last page. Content therefore
//! always lands on its own page(s) in the middle, which is what the fit
//! search measures and what trimming later cuts out.

use std::ops::RangeInclusive;

use crate::carry::{ClefMode, Snapshot};
use crate::model::{Measure, Score};

/// The two documents emitted for one accepted page.
#[derive(Debug, Clone)]
pub struct Assembled {
    /// Metadata plus exactly the page's measures.
    pub content: Score,
    /// `content` wrapped in padding measures, for rendering only.
    pub padded: Score,
}

/// Builds fragments of one source score.
#[derive(Debug, Clone, Copy)]
pub struct Assembler<'a> {
    score: &'a Score,
    clef_mode: ClefMode,
}

impl<'a> Assembler<'a> {
    pub fn new(score: &'a Score, clef_mode: ClefMode) -> Self {
        Self { score, clef_mode }
    }

    /// Copy `measures` (starting at `first_index` within the part) as a
    /// page run: renumbered from the part position, the carried-in state
    /// materialized on the first measure, which also gets a page break.
    pub fn prepare_run(&self, measures: &[Measure], first_index: usize, carry_in: &Snapshot) -> Vec<Measure> {
        let mut run: Vec<Measure> = measures.to_vec();
        for (offset, measure) in run.iter_mut().enumerate() {
            measure.set_number((first_index + offset + 1).to_string());
        }
        if let Some(first) = run.first_mut() {
            carry_in.apply(first, self.clef_mode);
            first.add_page_break();
        }
        run
    }

    /// The document probed during the fit search: always padded on both
    /// sides.
    pub fn candidate(&self, part_id: &str, run: &[Measure], carry_in: &Snapshot) -> Score {
        self.padded(part_id, run.to_vec(), carry_in, true)
    }

    /// Build the content and padded documents for an accepted run.
    ///
    /// `snapshot` is the state resolved over the run; it is attached to
    /// the leading pad and to the first measure wherever that measure
    /// still lacks a value. A final run gets a closing barline and no
    /// trailing pad.
    pub fn assemble(&self, part_id: &str, mut run: Vec<Measure>, snapshot: &Snapshot, is_final: bool) -> Assembled {
        if let Some(first) = run.first_mut() {
            snapshot.apply(first, self.clef_mode);
        }
        if is_final {
            if let Some(last) = run.last_mut() {
                last.set_final_barline();
            }
        }

        let padded = self.padded(part_id, run.clone(), snapshot, !is_final);
        let content = self.score.fragment(part_id, run);
        Assembled { content, padded }
    }

    fn padded(&self, part_id: &str, run: Vec<Measure>, snapshot: &Snapshot, trailing: bool) -> Score {
        let mut leading = Measure::blank(snapshot.divisions);
        snapshot.apply(&mut leading, self.clef_mode);
        leading.add_page_break();

        let end_divisions = Snapshot::resolve(&run, self.clef_mode)
            .divisions
            .or(snapshot.divisions);
        let next_number = run
            .last()
            .and_then(|m| m.number())
            .and_then(|n| n.parse::<usize>().ok())
            .map_or(1, |n| n + 1);

        let mut measures = Vec::with_capacity(run.len() + 2);
        measures.push(leading);
        measures.extend(run);
        if trailing {
            let mut pad = Measure::blank(end_divisions);
            pad.set_number(next_number.to_string());
            pad.add_page_break();
            measures.push(pad);
        }

        self.score.fragment(part_id, measures)
    }
}

/// Page counts a verified padded render may have under `budget`.
///
/// Interior pages render as pad + content + pad, final pages as
/// pad + content; with the default budget of 3 that is exactly 3 and 2.
pub fn expected_pages(is_final: bool, budget: usize) -> RangeInclusive<usize> {
    if is_final {
        2..=budget.saturating_sub(1).max(2)
    } else {
        3..=budget.max(3)
    }
}
