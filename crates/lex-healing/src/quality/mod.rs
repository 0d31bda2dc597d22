//! Data quality analysis module.
//!
//! This module measures missingness per column and turns it into a scalar
//! drift score with a severity band.

mod drift;
mod missing;

pub use drift::DriftScorer;
pub use missing::MissingValueAnalyzer;
