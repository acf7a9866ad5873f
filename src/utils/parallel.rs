//! Parallel processing utilities

use crate::error::{Result, StargalError};
use serde::{Deserialize, Serialize};

/// Configuration for parallel processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of threads (None = use all available)
    pub n_threads: Option<usize>,
    /// Minimum items handed to one worker at a time
    pub chunk_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            n_threads: None,
            chunk_size: 1000,
        }
    }
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Set chunk size
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads.unwrap_or_else(rayon::current_num_threads)
    }

    /// Run `op` inside a dedicated pool when a thread count is set,
    /// otherwise on the global pool.
    pub fn install<R, F>(&self, op: F) -> Result<R>
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match self.n_threads {
            None => Ok(op()),
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| StargalError::Config(format!("cannot start {} worker threads: {}", n, e)))?;
                Ok(pool.install(op))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_parallel_config() {
        let config = ParallelConfig::new()
            .with_threads(4)
            .with_chunk_size(500);

        assert_eq!(config.n_threads, Some(4));
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.num_threads(), 4);
    }

    #[test]
    fn test_install_uses_requested_threads() {
        let config = ParallelConfig::new().with_threads(2);
        let n = config.install(rayon::current_num_threads).unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn test_install_runs_parallel_work() {
        let items: Vec<i32> = (0..1000).collect();
        let results: Vec<i32> = ParallelConfig::new()
            .with_threads(3)
            .install(|| items.par_iter().map(|x| x * 2).collect())
            .unwrap();
        assert_eq!(results.len(), 1000);
        assert_eq!(results[500], 1000);
    }
}
