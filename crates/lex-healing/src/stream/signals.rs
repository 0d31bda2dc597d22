//! Stop requests and alert delivery for the stream controller.
//!
//! [`StopToken`] lets another thread ask a running controller to stop. The
//! request takes effect at the next tick boundary. [`AlertSink`] receives one
//! [`StreamAlert`] per batch whose analysis raised an alert.

use crate::types::BatchResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable handle for requesting that a stream stops.
///
/// All clones share one flag. The controller clears it on every start.
///
/// ```
/// use lex_healing::StopToken;
///
/// let token = StopToken::new();
/// let remote = token.clone();
/// remote.request_stop();
/// assert!(token.is_stop_requested());
/// ```
#[derive(Debug, Clone)]
pub struct StopToken {
    requested: Arc<AtomicBool>,
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

// Tokens are handed to other threads while the controller keeps ticking
static_assertions::assert_impl_all!(StopToken: Send, Sync);

impl StopToken {
    #[must_use]
    pub fn new() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Ask the stream to stop at the next tick boundary.
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Clear a pending request.
    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

/// Why a batch raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    /// The batch source marked the batch as a drift event.
    DriftEvent,
    /// The drift score crossed the critical threshold.
    CriticalDrift,
    /// The health score fell below the alert threshold.
    LowHealth,
}

impl AlertReason {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DriftEvent => "drift event",
            Self::CriticalDrift => "critical drift",
            Self::LowHealth => "low health",
        }
    }
}

/// Alert raised for one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamAlert {
    /// 1-based batch number since the last start.
    pub batch_num: usize,
    pub reasons: Vec<AlertReason>,
    pub result: BatchResult,
}

impl StreamAlert {
    /// One-line description for logs.
    pub fn summary(&self) -> String {
        let reasons: Vec<&str> = self.reasons.iter().map(|r| r.display_name()).collect();
        format!(
            "batch #{}: {} (health {:.2}, drift {:.2}, {} anomalies)",
            self.batch_num,
            reasons.join(", "),
            self.result.health_score,
            self.result.drift_score,
            self.result.anomaly_count
        )
    }
}

/// Receives alerts from a [`StreamController`](crate::stream::StreamController).
///
/// Implementations must be `Send + Sync` so a controller can be moved to a
/// worker thread while alerts are forwarded elsewhere.
pub trait AlertSink: Send + Sync {
    fn on_alert(&self, alert: &StreamAlert);
}

/// Wrapper that implements [`AlertSink`] using a closure.
pub struct ClosureAlertSink<F>
where
    F: Fn(&StreamAlert) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureAlertSink<F>
where
    F: Fn(&StreamAlert) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> AlertSink for ClosureAlertSink<F>
where
    F: Fn(&StreamAlert) + Send + Sync,
{
    fn on_alert(&self, alert: &StreamAlert) {
        (self.callback)(alert);
    }
}
