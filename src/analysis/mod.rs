//! Analysis modules.
//!
//! The pivot aggregator turns table rows into a normalized heatmap matrix.

pub mod aggregator;

pub use aggregator::*;
