//! Diagnostic histograms booked during application

use serde::{Deserialize, Serialize};

use crate::catalog::Label;
use crate::error::Result;
use crate::histogram::{Axis, Histogram1D, Histogram2D};
use crate::training::Method;

const SCORE_BINS: usize = 100;
const MAG_BINS: usize = 100;
const MAG_RANGE: (f64, f64) = (13.0, 22.0);
const STD_CUT_RANGE: (f64, f64) = (-0.8, 3.0);

fn mag_axis() -> Axis {
    Axis::new(MAG_BINS, MAG_RANGE.0, MAG_RANGE.1)
}

/// Score distributions of one method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodHistograms {
    pub method: Method,
    pub all: Histogram1D,
    pub stars: Histogram1D,
    pub galaxies: Histogram1D,
    /// Magnitude vs score
    pub stars_vs_mag: Histogram2D,
    pub galaxies_vs_mag: Histogram2D,
}

impl MethodHistograms {
    pub fn new(method: Method) -> Self {
        let (lo, hi) = method.score_range();
        let name = format!("MVA_{}", method.name());
        let score_axis = Axis::new(SCORE_BINS, lo, hi);
        Self {
            method,
            all: Histogram1D::new(name.clone(), SCORE_BINS, lo, hi),
            stars: Histogram1D::new(format!("{}_sta", name), SCORE_BINS, lo, hi),
            galaxies: Histogram1D::new(format!("{}_gal", name), SCORE_BINS, lo, hi),
            stars_vs_mag: Histogram2D::new(format!("{}_sta_modelmag", name), mag_axis(), score_axis),
            galaxies_vs_mag: Histogram2D::new(format!("{}_gal_modelmag", name), mag_axis(), score_axis),
        }
    }

    pub fn fill(&mut self, label: Option<Label>, mag: f64, score: f64) {
        self.all.fill(score);
        match label {
            Some(Label::Star) => {
                self.stars.fill(score);
                self.stars_vs_mag.fill(mag, score);
            }
            Some(Label::Galaxy) => {
                self.galaxies.fill(score);
                self.galaxies_vs_mag.fill(mag, score);
            }
            None => {}
        }
    }

    fn merge(&mut self, other: &MethodHistograms) -> Result<()> {
        self.all.merge(&other.all)?;
        self.stars.merge(&other.stars)?;
        self.galaxies.merge(&other.galaxies)?;
        self.stars_vs_mag.merge(&other.stars_vs_mag)?;
        self.galaxies_vs_mag.merge(&other.galaxies_vs_mag)
    }
}

/// Distributions of `psfmag_r - modelmag_r` per true class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdCutHistograms {
    pub stars: Histogram1D,
    pub galaxies: Histogram1D,
    pub stars_vs_mag: Histogram2D,
    pub galaxies_vs_mag: Histogram2D,
}

impl Default for StdCutHistograms {
    fn default() -> Self {
        let (lo, hi) = STD_CUT_RANGE;
        let axis = Axis::new(SCORE_BINS, lo, hi);
        Self {
            stars: Histogram1D::new("MVA_stdcut_sta", SCORE_BINS, lo, hi),
            galaxies: Histogram1D::new("MVA_stdcut_gal", SCORE_BINS, lo, hi),
            stars_vs_mag: Histogram2D::new("MVA_stdcut_sta_modelmag", mag_axis(), axis),
            galaxies_vs_mag: Histogram2D::new("MVA_stdcut_gal_modelmag", mag_axis(), axis),
        }
    }
}

impl StdCutHistograms {
    pub fn fill(&mut self, label: Label, mag: f64, value: f64) {
        match label {
            Label::Star => {
                self.stars.fill(value);
                self.stars_vs_mag.fill(mag, value);
            }
            Label::Galaxy => {
                self.galaxies.fill(value);
                self.galaxies_vs_mag.fill(mag, value);
            }
        }
    }

    fn merge(&mut self, other: &StdCutHistograms) -> Result<()> {
        self.stars.merge(&other.stars)?;
        self.galaxies.merge(&other.galaxies)?;
        self.stars_vs_mag.merge(&other.stars_vs_mag)?;
        self.galaxies_vs_mag.merge(&other.galaxies_vs_mag)
    }
}

/// Every histogram of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSet {
    pub methods: Vec<MethodHistograms>,
    pub std_cut: StdCutHistograms,
}

impl HistogramSet {
    pub fn new(methods: &[Method]) -> Self {
        Self {
            methods: methods.iter().map(|&m| MethodHistograms::new(m)).collect(),
            std_cut: StdCutHistograms::default(),
        }
    }

    pub fn method(&self, method: Method) -> Option<&MethodHistograms> {
        self.methods.iter().find(|h| h.method == method)
    }

    /// Bin-wise sum of two sets booked for the same methods
    pub fn merge(mut self, other: HistogramSet) -> Result<HistogramSet> {
        for (mine, theirs) in self.methods.iter_mut().zip(other.methods.iter()) {
            mine.merge(theirs)?;
        }
        self.std_cut.merge(&other.std_cut)?;
        Ok(self)
    }
}
