//! Imputation strategies for filling missing values.
//!
//! Only statistical imputation is applied automatically, and only to numeric
//! columns with a low share of nulls. Everything else is flagged or skipped by
//! the [`HealingEngine`](crate::healing::HealingEngine).

mod statistical;

pub use statistical::StatisticalImputer;
