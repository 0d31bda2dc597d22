//! Online stream loop.
//!
//! The controller moves between three states:
//!
//! - `Idle`: constructed, never started.
//! - `Running`: every [`tick`](StreamController::tick) pulls one batch,
//!   analyzes it and appends the outcome to the bounded history.
//! - `Stopped`: reached through an explicit stop, a [`StopToken`] request or
//!   the configured batch limit. History stays readable until the next start.
//!
//! Starting again from `Stopped` clears the history and counters.

use super::analyzer::BatchAnalyzer;
use super::history::StreamHistory;
use super::signals::{AlertSink, ClosureAlertSink, StopToken, StreamAlert};
use super::source::BatchSource;
use crate::config::StreamConfig;
use crate::error::{HealingError, Result};
use crate::types::{BatchResult, HistoryEntry, StreamSummary};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Lifecycle state of a [`StreamController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Idle,
    Running,
    Stopped,
}

impl StreamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives a [`BatchSource`] through the [`BatchAnalyzer`].
pub struct StreamController<S: BatchSource> {
    source: S,
    analyzer: BatchAnalyzer,
    config: StreamConfig,
    state: StreamState,
    history: StreamHistory,
    batches_processed: usize,
    alerts_raised: usize,
    stop_token: StopToken,
    alert_sinks: Vec<Box<dyn AlertSink>>,
}

impl<S: BatchSource> StreamController<S> {
    pub fn new(source: S, analyzer: BatchAnalyzer, config: StreamConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| HealingError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            source,
            analyzer,
            history: StreamHistory::new(config.history_capacity),
            config,
            state: StreamState::Idle,
            batches_processed: 0,
            alerts_raised: 0,
            stop_token: StopToken::new(),
            alert_sinks: Vec::new(),
        })
    }

    /// Register a closure called for every alert.
    pub fn on_alert<F>(mut self, callback: F) -> Self
    where
        F: Fn(&StreamAlert) + Send + Sync + 'static,
    {
        self.alert_sinks
            .push(Box::new(ClosureAlertSink::new(callback)));
        self
    }

    /// Register an alert sink.
    pub fn alert_sink(mut self, sink: Box<dyn AlertSink>) -> Self {
        self.alert_sinks.push(sink);
        self
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == StreamState::Running
    }

    pub fn history(&self) -> &StreamHistory {
        &self.history
    }

    pub fn batches_processed(&self) -> usize {
        self.batches_processed
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Handle for stopping the stream from elsewhere, e.g. another thread.
    pub fn stop_token(&self) -> StopToken {
        self.stop_token.clone()
    }

    /// Aggregate over the retained history plus lifetime counters.
    pub fn summary(&self) -> StreamSummary {
        self.history
            .summarize(self.batches_processed, self.alerts_raised)
    }

    /// Transition to `Running`, clearing history and counters.
    pub fn start(&mut self) -> Result<()> {
        if self.state == StreamState::Running {
            return Err(self.invalid("start"));
        }

        self.history.clear();
        self.batches_processed = 0;
        self.alerts_raised = 0;
        self.stop_token.reset();
        self.state = StreamState::Running;

        info!(
            "Stream started (history capacity {}, batch limit {})",
            self.history.capacity(),
            self.config
                .max_batches
                .map_or_else(|| "none".to_string(), |n| n.to_string())
        );
        Ok(())
    }

    /// Transition to `Stopped`. Stopping a stopped stream is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            StreamState::Running => {
                self.state = StreamState::Stopped;
                info!(
                    "Stream stopped after {} batches ({} alerts)",
                    self.batches_processed, self.alerts_raised
                );
                Ok(())
            }
            StreamState::Stopped => Ok(()),
            StreamState::Idle => Err(self.invalid("stop")),
        }
    }

    /// Process one batch.
    ///
    /// Returns `Ok(None)` when a pending stop request ended the stream
    /// instead. A failing source or analysis yields a neutral result; the
    /// stream keeps going.
    pub fn tick(&mut self) -> Result<Option<BatchResult>> {
        if self.state != StreamState::Running {
            return Err(self.invalid("tick"));
        }
        if self.stop_token.is_stop_requested() {
            self.stop()?;
            return Ok(None);
        }

        let result = match self.source.next_batch() {
            Ok(batch) => self.analyzer.analyze(&batch),
            Err(e) => {
                warn!("Batch source failed, using neutral result: {}", e);
                BatchResult::neutral(e.to_string())
            }
        };

        self.batches_processed += 1;
        let batch_num = self.batches_processed;
        if let Some(evicted) = self
            .history
            .push(HistoryEntry::from_result(batch_num, &result))
        {
            debug!("Evicted batch #{} from history", evicted.batch_num);
        }

        if result.alert {
            self.raise_alert(batch_num, &result);
        }

        if let Some(limit) = self.config.max_batches
            && self.batches_processed >= limit
        {
            info!("Batch limit of {} reached", limit);
            self.stop()?;
        }

        Ok(Some(result))
    }

    /// Start if needed and tick until the stream stops.
    ///
    /// Without a batch limit this only returns once the [`StopToken`] is used.
    pub fn run(&mut self) -> Result<StreamSummary> {
        if self.state != StreamState::Running {
            self.start()?;
        }

        while self.is_running() {
            self.tick()?;
            if self.is_running() && !self.config.tick_delay.is_zero() {
                std::thread::sleep(self.config.tick_delay);
            }
        }

        Ok(self.summary())
    }

    fn raise_alert(&mut self, batch_num: usize, result: &BatchResult) {
        self.alerts_raised += 1;
        let alert = StreamAlert {
            batch_num,
            reasons: self.analyzer.reasons_for(result),
            result: result.clone(),
        };
        warn!("Stream alert: {}", alert.summary());
        for sink in &self.alert_sinks {
            sink.on_alert(&alert);
        }
    }

    fn invalid(&self, action: &str) -> HealingError {
        HealingError::InvalidStreamState {
            action: action.to_string(),
            state: self.state.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::source::Batch;
    use polars::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn clean_batch() -> Result<Batch> {
        Ok(Batch::new(df!["a" => [1.0, 2.0, 3.0]].unwrap()))
    }

    fn controller<S: BatchSource>(source: S, config: StreamConfig) -> StreamController<S> {
        StreamController::new(source, BatchAnalyzer::default(), config).unwrap()
    }

    #[test]
    fn test_lifecycle() {
        let mut stream = controller(clean_batch, StreamConfig::default());
        assert_eq!(stream.state(), StreamState::Idle);
        assert!(stream.tick().is_err());
        assert!(stream.stop().is_err());

        stream.start().unwrap();
        assert_eq!(stream.state(), StreamState::Running);
        let err = stream.start().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STREAM_STATE");

        stream.tick().unwrap().unwrap();
        stream.stop().unwrap();
        assert_eq!(stream.state(), StreamState::Stopped);
        assert_eq!(stream.history().len(), 1);
        stream.stop().unwrap();
    }

    #[test]
    fn test_history_is_bounded() {
        let config = StreamConfig::builder().unbounded().build().unwrap();
        let mut stream = controller(clean_batch, config);
        stream.start().unwrap();

        for _ in 0..51 {
            stream.tick().unwrap();
        }

        assert_eq!(stream.history().len(), 50);
        assert_eq!(stream.history().capacity(), 50);
        assert!(!stream.history().contains_batch(1));
        assert!(stream.history().contains_batch(2));
        assert!(stream.history().contains_batch(51));
        assert_eq!(stream.summary().batches_processed, 51);
    }

    #[test]
    fn test_self_stops_at_batch_limit() {
        let mut stream = controller(clean_batch, StreamConfig::default());
        let summary = stream.run().unwrap();

        assert_eq!(stream.state(), StreamState::Stopped);
        assert_eq!(summary.batches, 20);
        assert_eq!(summary.batches_processed, 20);
        assert_eq!(summary.mean_health_score, 1.0);
    }

    #[test]
    fn test_restart_clears_history() {
        let config = StreamConfig::builder().max_batches(3).build().unwrap();
        let mut stream = controller(clean_batch, config);

        stream.run().unwrap();
        assert_eq!(stream.history().len(), 3);

        stream.start().unwrap();
        assert!(stream.history().is_empty());
        assert_eq!(stream.batches_processed(), 0);
    }

    #[test]
    fn test_stop_token_takes_effect_at_tick_boundary() {
        let config = StreamConfig::builder().unbounded().build().unwrap();
        let mut stream = controller(clean_batch, config);
        stream.start().unwrap();
        stream.tick().unwrap();

        stream.stop_token().request_stop();

        assert!(stream.tick().unwrap().is_none());
        assert_eq!(stream.state(), StreamState::Stopped);
        assert_eq!(stream.history().len(), 1);
    }

    #[test]
    fn test_failing_source_yields_neutral_result() {
        let mut calls = 0;
        let source = move || {
            calls += 1;
            if calls % 2 == 0 {
                Err(HealingError::Compute("source offline".to_string()))
            } else {
                clean_batch()
            }
        };
        let config = StreamConfig::builder().max_batches(4).build().unwrap();
        let mut stream = controller(source, config);
        stream.start().unwrap();

        let results: Vec<BatchResult> = (0..4).map(|_| stream.tick().unwrap().unwrap()).collect();

        assert!(!results[0].is_error());
        assert!(results[1].is_error());
        assert_eq!(results[1].health_score, 1.0);
        assert!(!results[1].alert);
        assert_eq!(stream.state(), StreamState::Stopped);
    }

    #[test]
    fn test_alerts_reach_sinks() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let source = || Ok::<_, HealingError>(Batch::with_drift_event(df!["a" => [1.0, 2.0]].unwrap()));
        let config = StreamConfig::builder().max_batches(5).build().unwrap();

        let mut stream = controller(source, config).on_alert(move |alert| {
            assert!(alert.result.has_drift_event);
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });
        let summary = stream.run().unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert_eq!(summary.alerts_raised, 5);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = StreamConfig {
            history_capacity: 0,
            ..StreamConfig::default()
        };
        let result = StreamController::new(clean_batch, BatchAnalyzer::default(), config);
        assert!(result.is_err());
    }
}
