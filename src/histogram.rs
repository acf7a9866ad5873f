//! Fixed-binning histograms
//!
//! Bins are half-open, `[lo + k*w, lo + (k+1)*w)`. Values below `lo` go to the
//! underflow counter, values at or above `hi` to the overflow counter.
//! Non-finite values are not booked.

use crate::error::{Result, StargalError};
use serde::{Deserialize, Serialize};

/// Equal-width binning of one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub n_bins: usize,
    pub lo: f64,
    pub hi: f64,
}

/// Where a value falls on an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Underflow,
    Bin(usize),
    Overflow,
}

impl Axis {
    pub fn new(n_bins: usize, lo: f64, hi: f64) -> Self {
        Self { n_bins, lo, hi }
    }

    pub fn width(&self) -> f64 {
        (self.hi - self.lo) / self.n_bins as f64
    }

    pub fn slot(&self, value: f64) -> Option<Slot> {
        if !value.is_finite() {
            return None;
        }
        if value < self.lo {
            return Some(Slot::Underflow);
        }
        if value >= self.hi {
            return Some(Slot::Overflow);
        }
        let k = ((value - self.lo) / self.width()) as usize;
        Some(Slot::Bin(k.min(self.n_bins - 1)))
    }

    /// Lower edge of bin `k`
    pub fn bin_low_edge(&self, k: usize) -> f64 {
        self.lo + k as f64 * self.width()
    }

    pub fn bin_center(&self, k: usize) -> f64 {
        self.lo + (k as f64 + 0.5) * self.width()
    }
}

/// One-dimensional histogram
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    pub name: String,
    pub axis: Axis,
    pub counts: Vec<u64>,
    pub underflow: u64,
    pub overflow: u64,
}

impl Histogram1D {
    pub fn new(name: impl Into<String>, n_bins: usize, lo: f64, hi: f64) -> Self {
        Self {
            name: name.into(),
            axis: Axis::new(n_bins, lo, hi),
            counts: vec![0; n_bins],
            underflow: 0,
            overflow: 0,
        }
    }

    pub fn fill(&mut self, value: f64) {
        match self.axis.slot(value) {
            Some(Slot::Underflow) => self.underflow += 1,
            Some(Slot::Overflow) => self.overflow += 1,
            Some(Slot::Bin(k)) => self.counts[k] += 1,
            None => {}
        }
    }

    /// Booked values, including underflow and overflow
    pub fn entries(&self) -> u64 {
        self.counts.iter().sum::<u64>() + self.underflow + self.overflow
    }

    /// Booked values inside the axis range
    pub fn integral(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Bin contents scaled to unit integral; all zeros for an empty histogram
    pub fn normalized(&self) -> Vec<f64> {
        let total = self.integral();
        if total == 0 {
            return vec![0.0; self.counts.len()];
        }
        self.counts.iter().map(|&c| c as f64 / total as f64).collect()
    }

    /// Add another histogram bin by bin; the binning must match.
    pub fn merge(&mut self, other: &Histogram1D) -> Result<()> {
        if self.axis != other.axis {
            return Err(StargalError::Data(format!(
                "cannot merge histogram {} into {}: binning differs",
                other.name, self.name
            )));
        }
        for (a, b) in self.counts.iter_mut().zip(other.counts.iter()) {
            *a += b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        Ok(())
    }
}

/// Two-dimensional histogram, row-major in `x`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram2D {
    pub name: String,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub counts: Vec<u64>,
    /// Values outside the range on either axis
    pub outside: u64,
}

impl Histogram2D {
    pub fn new(name: impl Into<String>, x_axis: Axis, y_axis: Axis) -> Self {
        Self {
            name: name.into(),
            x_axis,
            y_axis,
            counts: vec![0; x_axis.n_bins * y_axis.n_bins],
            outside: 0,
        }
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        match (self.x_axis.slot(x), self.y_axis.slot(y)) {
            (Some(Slot::Bin(i)), Some(Slot::Bin(j))) => {
                self.counts[i * self.y_axis.n_bins + j] += 1;
            }
            (Some(_), Some(_)) => self.outside += 1,
            _ => {}
        }
    }

    pub fn get(&self, i: usize, j: usize) -> u64 {
        self.counts[i * self.y_axis.n_bins + j]
    }

    pub fn entries(&self) -> u64 {
        self.counts.iter().sum::<u64>() + self.outside
    }

    pub fn merge(&mut self, other: &Histogram2D) -> Result<()> {
        if self.x_axis != other.x_axis || self.y_axis != other.y_axis {
            return Err(StargalError::Data(format!(
                "cannot merge histogram {} into {}: binning differs",
                other.name, self.name
            )));
        }
        for (a, b) in self.counts.iter_mut().zip(other.counts.iter()) {
            *a += b;
        }
        self.outside += other.outside;
        Ok(())
    }
}

/// Separation `<S^2> = 1/2 sum (s - b)^2 / (s + b)` of two normalized
/// histograms with the same binning; 0 for identical shapes, 1 for disjoint.
pub fn separation(signal: &Histogram1D, background: &Histogram1D) -> Result<f64> {
    if signal.axis != background.axis {
        return Err(StargalError::Data(
            "separation needs histograms with the same binning".to_string(),
        ));
    }
    let s = signal.normalized();
    let b = background.normalized();
    Ok(0.5
        * s.iter()
            .zip(b.iter())
            .filter(|(s, b)| **s + **b > 0.0)
            .map(|(s, b)| (s - b).powi(2) / (s + b))
            .sum::<f64>())
}
