//! Streaming micro-batch monitoring.
//!
//! A [`BatchSource`] produces batches, the [`BatchAnalyzer`] scores each one
//! and the [`StreamController`] keeps a bounded rolling history of the
//! outcomes.

mod analyzer;
mod controller;
mod history;
mod signals;
mod source;

pub use analyzer::BatchAnalyzer;
pub use controller::{StreamController, StreamState};
pub use history::StreamHistory;
pub use signals::{AlertReason, AlertSink, ClosureAlertSink, StopToken, StreamAlert};
pub use source::{Batch, BatchSource, SyntheticBatchSource, TableReplaySource};
