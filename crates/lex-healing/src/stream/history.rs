use crate::types::{HistoryEntry, StreamSummary};
use std::collections::VecDeque;

/// Bounded FIFO of recent batch outcomes.
#[derive(Debug, Clone)]
pub struct StreamHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl StreamHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, returning the oldest one if it was evicted.
    pub fn push(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn contains_batch(&self, batch_num: usize) -> bool {
        self.entries.iter().any(|e| e.batch_num == batch_num)
    }

    /// Aggregate the retained entries.
    ///
    /// Lifetime counters cover evicted batches too, so the caller supplies them.
    pub fn summarize(&self, batches_processed: usize, alerts_raised: usize) -> StreamSummary {
        let batches = self.entries.len();
        let (mean_health_score, mean_drift_score) = if batches == 0 {
            (0.0, 0.0)
        } else {
            let n = batches as f64;
            (
                self.entries.iter().map(|e| e.health_score).sum::<f64>() / n,
                self.entries.iter().map(|e| e.drift_score).sum::<f64>() / n,
            )
        };

        StreamSummary {
            batches,
            mean_health_score,
            mean_drift_score,
            total_anomalies: self.entries.iter().map(|e| e.anomaly_count).sum(),
            batches_processed,
            alerts_raised,
        }
    }
}
