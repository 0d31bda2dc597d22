//! Three-tier repair of missing values.

mod engine;

pub use engine::HealingEngine;
