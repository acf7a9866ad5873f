//! Utility functions and types

mod parallel;

pub use parallel::ParallelConfig;
