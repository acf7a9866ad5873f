//! Per-magnitude-bin selection bookkeeping
//!
//! An [`Aggregate`] holds one [`SelectionTally`] per selector and magnitude
//! bin. Aggregates built on different threads merge by plain addition, so
//! the result never depends on how rows were distributed.

mod report;

pub use report::{format_percent, format_table, BinSummary};

use crate::catalog::Label;
use crate::error::{Result, StargalError};
use crate::training::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper limit on the number of magnitude bins
pub const MAX_BINS: usize = 10_000;

/// Half-open equal-width magnitude bins `[lo + k*width, lo + (k+1)*width)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeBins {
    pub lo: f64,
    pub hi: f64,
    pub width: f64,
}

impl Default for MagnitudeBins {
    fn default() -> Self {
        Self {
            lo: 14.0,
            hi: 23.0,
            width: 1.0,
        }
    }
}

impl MagnitudeBins {
    pub fn new(lo: f64, hi: f64, width: f64) -> Result<Self> {
        let bins = Self { lo, hi, width };
        bins.validate()?;
        Ok(bins)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.lo.is_finite() && self.hi.is_finite() && self.hi > self.lo) {
            return Err(StargalError::InvalidParameter {
                name: "magnitude range".to_string(),
                value: format!("[{}, {})", self.lo, self.hi),
                reason: "upper edge must exceed lower edge".to_string(),
            });
        }
        if !(self.width > 0.0) {
            return Err(StargalError::InvalidParameter {
                name: "mag_width".to_string(),
                value: self.width.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let count = (self.hi - self.lo) / self.width;
        if !count.is_finite() || count > MAX_BINS as f64 {
            return Err(StargalError::InvalidParameter {
                name: "mag_width".to_string(),
                value: self.width.to_string(),
                reason: format!("gives more than {} bins over [{}, {})", MAX_BINS, self.lo, self.hi),
            });
        }
        Ok(())
    }

    pub fn n_bins(&self) -> usize {
        // A trailing partial bin still counts
        (((self.hi - self.lo) / self.width) - 1e-9).ceil().max(1.0) as usize
    }

    /// Bin holding `mag`, or `None` outside `[lo, hi)`
    pub fn bin_index(&self, mag: f64) -> Option<usize> {
        if !(mag >= self.lo && mag < self.hi) {
            return None;
        }
        let k = ((mag - self.lo) / self.width).floor() as usize;
        Some(k.min(self.n_bins() - 1))
    }

    /// Edges of bin `k`; the last bin is clipped to `hi`
    pub fn edges(&self, k: usize) -> (f64, f64) {
        let lo = self.lo + k as f64 * self.width;
        (lo, (lo + self.width).min(self.hi))
    }
}

/// Counters of one selector in one magnitude bin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionTally {
    pub true_galaxies: u64,
    pub true_stars: u64,
    pub selected_galaxies: u64,
    pub selected_stars: u64,
}

impl SelectionTally {
    pub fn record(&mut self, label: Label, selected: bool) {
        match (label, selected) {
            (Label::Galaxy, true) => {
                self.true_galaxies += 1;
                self.selected_galaxies += 1;
            }
            (Label::Galaxy, false) => self.true_galaxies += 1,
            (Label::Star, true) => {
                self.true_stars += 1;
                self.selected_stars += 1;
            }
            (Label::Star, false) => self.true_stars += 1,
        }
    }

    pub fn selected(&self) -> u64 {
        self.selected_galaxies + self.selected_stars
    }

    /// Selected galaxies over true galaxies, in percent
    pub fn efficiency(&self) -> Option<f64> {
        percent(self.selected_galaxies, self.true_galaxies)
    }

    /// Selected stars over everything selected, in percent
    pub fn impurity(&self) -> Option<f64> {
        percent(self.selected_stars, self.selected())
    }

    pub fn merge(&mut self, other: &SelectionTally) {
        self.true_galaxies += other.true_galaxies;
        self.true_stars += other.true_stars;
        self.selected_galaxies += other.selected_galaxies;
        self.selected_stars += other.selected_stars;
    }
}

fn percent(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64 * 100.0)
    }
}

/// Why a row was left out of the per-bin counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Binning magnitude outside the configured range
    OutOfRange,
    /// A feature input was missing
    MissingValues,
    /// No star/galaxy label
    Unlabeled,
}

/// Rows skipped, per reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub out_of_range: u64,
    pub missing_values: u64,
    pub unlabeled: u64,
}

impl SkipCounts {
    pub fn add(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::OutOfRange => self.out_of_range += 1,
            SkipReason::MissingValues => self.missing_values += 1,
            SkipReason::Unlabeled => self.unlabeled += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.out_of_range + self.missing_values + self.unlabeled
    }

    pub fn merge(&mut self, other: &SkipCounts) {
        self.out_of_range += other.out_of_range;
        self.missing_values += other.missing_values;
        self.unlabeled += other.unlabeled;
    }
}

/// Something that decides whether a row is a galaxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// `psfmag_r - modelmag_r` above a fixed cut
    StandardCut,
    /// Classifier score above the threshold
    Method(Method),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::StandardCut => f.write_str("standard cut"),
            Selector::Method(m) => write!(f, "{}", m),
        }
    }
}

/// All counters of one application run
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    bins: MagnitudeBins,
    selectors: Vec<Selector>,
    /// `tallies[selector][bin]`
    tallies: Vec<Vec<SelectionTally>>,
    pub skipped: SkipCounts,
    /// Rows that received a score
    pub scored: u64,
}

impl Aggregate {
    pub fn new(bins: MagnitudeBins, selectors: Vec<Selector>) -> Self {
        let n_bins = bins.n_bins();
        Self {
            bins,
            tallies: vec![vec![SelectionTally::default(); n_bins]; selectors.len()],
            selectors,
            skipped: SkipCounts::default(),
            scored: 0,
        }
    }

    pub fn bins(&self) -> &MagnitudeBins {
        &self.bins
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Record one labelled row for the selector at position `selector`.
    pub fn record(&mut self, selector: usize, bin: usize, label: Label, selected: bool) {
        self.tallies[selector][bin].record(label, selected);
    }

    pub fn tally(&self, selector: Selector, bin: usize) -> Option<&SelectionTally> {
        let s = self.selectors.iter().position(|&x| x == selector)?;
        self.tallies[s].get(bin)
    }

    /// Tallies of one selector, one per bin
    pub fn tallies(&self, selector: Selector) -> Option<&[SelectionTally]> {
        let s = self.selectors.iter().position(|&x| x == selector)?;
        Some(&self.tallies[s])
    }

    /// Element-wise sum; both sides must share bins and selectors.
    pub fn merge(mut self, other: Aggregate) -> Aggregate {
        debug_assert_eq!(self.selectors, other.selectors);
        for (mine, theirs) in self.tallies.iter_mut().zip(other.tallies.iter()) {
            for (a, b) in mine.iter_mut().zip(theirs.iter()) {
                a.merge(b);
            }
        }
        self.skipped.merge(&other.skipped);
        self.scored += other.scored;
        self
    }

    /// Per-bin rows of one selector, for printing or JSON output
    pub fn summaries(&self, selector: Selector) -> Vec<BinSummary> {
        self.tallies(selector)
            .map(|tallies| {
                tallies
                    .iter()
                    .enumerate()
                    .map(|(k, t)| BinSummary::new(self.bins.edges(k), t))
                    .collect()
            })
            .unwrap_or_default()
    }
}
