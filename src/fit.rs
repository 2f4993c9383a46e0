//! Page-fit search: the largest run of measures that stays within a page
//! budget, found by binary search over an expensive page-count oracle.
//!
//! The search relies on the oracle being deterministic and monotonic
//! (adding measures never lowers the page count). A run of zero measures
//! is never probed; it always fits trivially.

use tracing::debug;

use crate::error::Result;

/// Largest `k` in `0..=remaining` for which `pages(k) <= budget`.
///
/// `pages` is called once per probe with the candidate measure count and
/// returns the rendered page count; any error it raises aborts the search.
pub fn largest_fit<F>(remaining: usize, budget: usize, mut pages: F) -> Result<usize>
where
    F: FnMut(usize) -> Result<usize>,
{
    let mut low = 1;
    let mut high = remaining;
    let mut best = 0;

    while low <= high {
        let mid = low + (high - low) / 2;
        let count = pages(mid)?;
        debug!(measures = mid, pages = count, budget, "probed candidate");

        if count <= budget {
            best = mid;
            low = mid + 1;
        } else {
            high = mid - 1;
        }
    }

    Ok(best)
}
