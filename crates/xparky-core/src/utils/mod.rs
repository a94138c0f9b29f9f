//! Utility functions for string matching and CSV export.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{cmp_ignore_case, contains_ignore_case, entries_to_csv};
