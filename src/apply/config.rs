//! Application configuration

use serde::{Deserialize, Serialize};

use crate::analysis::MagnitudeBins;
use crate::error::{Result, StargalError};
use crate::training::Method;
use crate::utils::ParallelConfig;

/// Settings of an application run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Rows scoring strictly above this are selected as galaxies
    pub threshold: f64,
    /// `psfmag_r - modelmag_r` above this is a galaxy for the standard cut
    pub std_cut: f64,
    pub mag_min: f64,
    pub mag_max: f64,
    pub mag_width: f64,
    /// Methods to evaluate
    pub methods: Vec<Method>,
    /// Worker threads (None = all cores)
    pub threads: Option<usize>,
    /// Rows per parallel work item
    pub chunk_size: usize,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        let bins = MagnitudeBins::default();
        Self {
            threshold: 0.05,
            std_cut: 0.145,
            mag_min: bins.lo,
            mag_max: bins.hi,
            mag_width: bins.width,
            methods: vec![Method::Bdtd],
            threads: None,
            chunk_size: 1000,
        }
    }
}

impl ApplyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_std_cut(mut self, cut: f64) -> Self {
        self.std_cut = cut;
        self
    }

    /// Set the magnitude binning
    pub fn with_bins(mut self, lo: f64, hi: f64, width: f64) -> Self {
        self.mag_min = lo;
        self.mag_max = hi;
        self.mag_width = width;
        self
    }

    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = methods;
        self
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.threads = Some(n);
        self
    }

    pub fn bins(&self) -> Result<MagnitudeBins> {
        MagnitudeBins::new(self.mag_min, self.mag_max, self.mag_width)
    }

    pub fn parallel(&self) -> ParallelConfig {
        let config = ParallelConfig::new().with_chunk_size(self.chunk_size.max(1));
        match self.threads {
            Some(n) => config.with_threads(n),
            None => config,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.bins()?;
        if self.methods.is_empty() {
            return Err(StargalError::Config("no method selected for application".to_string()));
        }
        if !self.threshold.is_finite() {
            return Err(StargalError::InvalidParameter {
                name: "threshold".to_string(),
                value: self.threshold.to_string(),
                reason: "must be finite".to_string(),
            });
        }
        if !self.std_cut.is_finite() {
            return Err(StargalError::InvalidParameter {
                name: "std_cut".to_string(),
                value: self.std_cut.to_string(),
                reason: "must be finite".to_string(),
            });
        }
        if self.threads == Some(0) {
            return Err(StargalError::InvalidParameter {
                name: "threads".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
