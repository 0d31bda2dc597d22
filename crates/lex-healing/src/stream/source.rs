//! Batch sources for the stream controller.

use crate::config::StreamConfig;
use crate::error::{HealingError, Result, ResultExt};
use chrono::Utc;
use polars::prelude::*;
use rand::prelude::*;
use rand_distr::{Normal, Uniform};

/// One micro-batch handed to the analyzer.
#[derive(Debug, Clone)]
pub struct Batch {
    pub data: DataFrame,
    /// Set by the source when it knowingly injected drift into this batch.
    pub has_drift_event: bool,
}

impl Batch {
    pub fn new(data: DataFrame) -> Self {
        Self {
            data,
            has_drift_event: false,
        }
    }

    pub fn with_drift_event(data: DataFrame) -> Self {
        Self {
            data,
            has_drift_event: true,
        }
    }
}

/// Produces micro-batches on demand.
pub trait BatchSource {
    fn next_batch(&mut self) -> Result<Batch>;
}

impl<F> BatchSource for F
where
    F: FnMut() -> Result<Batch>,
{
    fn next_batch(&mut self) -> Result<Batch> {
        self()
    }
}

// =============================================================================
// Synthetic transactions
// =============================================================================

const CENTER_LATITUDE: f64 = 40.7128;
const CENTER_LONGITUDE: f64 = -74.0060;
/// Roughly 1km of scatter around the center.
const COORDINATE_STD: f64 = 0.01;

const AMOUNT_MEAN: f64 = 100.0;
const AMOUNT_STD: f64 = 25.0;
const FEE_RATE: f64 = 0.02;
const FEE_NULL_PROBABILITY: f64 = 0.05;
const DRIFT_MULTIPLIER: f64 = 6.0;
const SPAM_REVIEW_PROBABILITY: f64 = 0.6;

const STATUSES: [&str; 3] = ["completed", "pending", "failed"];
const CATEGORIES: [&str; 4] = ["payment", "transfer", "withdrawal", "deposit"];

const NORMAL_REVIEWS: [&str; 10] = [
    "Great service, highly recommend!",
    "Fast and efficient app",
    "Excellent customer support",
    "Very satisfied with the transaction",
    "Quick processing time",
    "User-friendly interface",
    "Reliable and secure platform",
    "Best payment app I've used",
    "Smooth transaction experience",
    "Professional and trustworthy",
];

const SPAM_REVIEWS: [&str; 10] = [
    "Buy crypto now! Limited offer!",
    "'; DROP TABLE users; --",
    "Click here for free money!!!",
    "<script>alert('XSS')</script>",
    "URGENT: Your account has been compromised",
    "1=1 OR 1=1; DELETE FROM transactions",
    "*** SPAM *** Earn $1000 today!",
    "admin'--",
    "Contact us at fake-phishing-site.com",
    "Investment opportunity! Act now!",
];

/// Generates transaction micro-batches, occasionally with injected drift.
///
/// A drift batch multiplies `amount` and `fee` in its second half, raises
/// `risk_score` into `[0.7, 1.0]`, never reports `failed` transactions and
/// fills most reviews with spam or injection text.
pub struct SyntheticBatchSource {
    rng: StdRng,
    batch_size: usize,
    drift_probability: f64,
    amount: Normal<f64>,
    latitude: Normal<f64>,
    longitude: Normal<f64>,
}

impl SyntheticBatchSource {
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let normal = |mean: f64, std: f64| {
            Normal::new(mean, std).map_err(|e| HealingError::InvalidConfig(e.to_string()))
        };

        Ok(Self {
            rng: match config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
            batch_size: config.batch_size,
            drift_probability: config.drift_probability,
            amount: normal(AMOUNT_MEAN, AMOUNT_STD)?,
            latitude: normal(CENTER_LATITUDE, COORDINATE_STD)?,
            longitude: normal(CENTER_LONGITUDE, COORDINATE_STD)?,
        })
    }

    /// Build one batch, forcing the drift decision.
    pub fn generate(&mut self, has_drift: bool) -> Result<Batch> {
        let n = self.batch_size;
        let base_ms = Utc::now().timestamp_millis();
        let risk = if has_drift {
            Uniform::new(0.7, 1.0)
        } else {
            Uniform::new(0.0, 1.0)
        };
        let statuses: &[&str] = if has_drift {
            &STATUSES[..2]
        } else {
            &STATUSES
        };

        let mut timestamps = Vec::with_capacity(n);
        let mut ids = Vec::with_capacity(n);
        let mut amounts = Vec::with_capacity(n);
        let mut fees: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut latitudes = Vec::with_capacity(n);
        let mut longitudes = Vec::with_capacity(n);
        let mut status = Vec::with_capacity(n);
        let mut category = Vec::with_capacity(n);
        let mut risk_scores = Vec::with_capacity(n);
        let mut reviews = Vec::with_capacity(n);

        for i in 0..n {
            let mut amount = self.amount.sample(&mut self.rng);
            let mut fee = amount * FEE_RATE;
            if has_drift && i > n / 2 {
                amount *= DRIFT_MULTIPLIER;
                fee *= DRIFT_MULTIPLIER;
            }

            timestamps.push(base_ms + i as i64 * 20);
            ids.push(format!("TXN_{}", base_ms + i as i64));
            amounts.push(amount.max(0.0));
            fees.push(if self.rng.gen_bool(FEE_NULL_PROBABILITY) {
                None
            } else {
                Some(fee.max(0.0))
            });
            latitudes.push(self.latitude.sample(&mut self.rng));
            longitudes.push(self.longitude.sample(&mut self.rng));
            status.push(statuses[self.rng.gen_range(0..statuses.len())]);
            category.push(CATEGORIES[self.rng.gen_range(0..CATEGORIES.len())]);
            risk_scores.push(risk.sample(&mut self.rng));

            let pool = if has_drift && self.rng.gen_bool(SPAM_REVIEW_PROBABILITY) {
                &SPAM_REVIEWS
            } else {
                &NORMAL_REVIEWS
            };
            reviews.push(pool[self.rng.gen_range(0..pool.len())]);
        }

        let timestamp = Series::new("timestamp".into(), timestamps)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .context("Building timestamp column")?;

        let data = DataFrame::new(vec![
            timestamp.into(),
            Column::new("transaction_id".into(), ids),
            Column::new("amount".into(), amounts),
            Column::new("fee".into(), fees),
            Column::new("latitude".into(), latitudes),
            Column::new("longitude".into(), longitudes),
            Column::new("status".into(), status),
            Column::new("category".into(), category),
            Column::new("risk_score".into(), risk_scores),
            Column::new("user_review".into(), reviews),
        ])
        .context("Building synthetic batch")?;

        Ok(Batch {
            data,
            has_drift_event: has_drift,
        })
    }
}

impl BatchSource for SyntheticBatchSource {
    fn next_batch(&mut self) -> Result<Batch> {
        let has_drift = self.rng.gen_bool(self.drift_probability);
        self.generate(has_drift)
    }
}

// =============================================================================
// Table replay
// =============================================================================

/// Replays a loaded table as consecutive fixed-size slices, wrapping around.
///
/// The last slice before wrapping may be shorter than `batch_size`.
pub struct TableReplaySource {
    data: DataFrame,
    batch_size: usize,
    offset: usize,
}

impl TableReplaySource {
    pub fn new(data: DataFrame, batch_size: usize) -> Result<Self> {
        if data.height() == 0 {
            return Err(HealingError::InvalidConfig(
                "cannot replay a table without rows".to_string(),
            ));
        }
        if batch_size == 0 {
            return Err(HealingError::InvalidConfig(
                "replay batch size must be positive".to_string(),
            ));
        }
        Ok(Self {
            data,
            batch_size,
            offset: 0,
        })
    }
}

impl BatchSource for TableReplaySource {
    fn next_batch(&mut self) -> Result<Batch> {
        let slice = self.data.slice(self.offset as i64, self.batch_size);
        self.offset = (self.offset + slice.height()) % self.data.height();
        Ok(Batch::new(slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(batch_size: usize, drift_probability: f64) -> SyntheticBatchSource {
        let config = StreamConfig::builder()
            .batch_size(batch_size)
            .drift_probability(drift_probability)
            .seed(7)
            .build()
            .unwrap();
        SyntheticBatchSource::new(&config).unwrap()
    }

    #[test]
    fn test_synthetic_batch_shape() {
        let batch = seeded(50, 0.0).next_batch().unwrap();

        assert!(!batch.has_drift_event);
        assert_eq!(batch.data.height(), 50);
        let names: Vec<&str> = batch
            .data
            .get_column_names()
            .iter()
            .map(|s| s.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "timestamp",
                "transaction_id",
                "amount",
                "fee",
                "latitude",
                "longitude",
                "status",
                "category",
                "risk_score",
                "user_review",
            ]
        );
        assert!(matches!(
            batch.data.column("timestamp").unwrap().dtype(),
            DataType::Datetime(_, _)
        ));
    }

    #[test]
    fn test_drift_batch_effects() {
        let mut source = seeded(200, 1.0);
        let batch = source.next_batch().unwrap();
        assert!(batch.has_drift_event);

        let risk = batch.data.column("risk_score").unwrap().f64().unwrap().clone();
        assert!(risk.into_iter().flatten().all(|r| (0.7..1.0).contains(&r)));

        let status = batch.data.column("status").unwrap().str().unwrap().clone();
        assert!(status.into_iter().flatten().all(|s| s != "failed"));

        let amounts: Vec<f64> = batch
            .data
            .column("amount")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        let first_half = amounts[..100].iter().sum::<f64>() / 100.0;
        let second_half = amounts[101..].iter().sum::<f64>() / 99.0;
        assert!(second_half > first_half * 3.0);
    }

    #[test]
    fn test_seeded_sources_repeat_values() {
        let a = seeded(20, 0.5).generate(false).unwrap();
        let b = seeded(20, 0.5).generate(false).unwrap();
        let amount = |batch: &Batch| {
            batch
                .data
                .column("amount")
                .unwrap()
                .as_materialized_series()
                .clone()
        };
        assert!(amount(&a).equals_missing(&amount(&b)));
    }

    #[test]
    fn test_replay_wraps_around() {
        let df = df!["v" => [1, 2, 3, 4, 5]].unwrap();
        let mut source = TableReplaySource::new(df, 2).unwrap();

        let heights: Vec<usize> = (0..4)
            .map(|_| source.next_batch().unwrap().data.height())
            .collect();
        assert_eq!(heights, vec![2, 2, 1, 2]);

        let first = source.next_batch().unwrap();
        let v = first.data.column("v").unwrap().get(0).unwrap();
        assert_eq!(v.try_extract::<i32>().unwrap(), 3);
    }

    #[test]
    fn test_replay_rejects_empty_table() {
        let df = df!["v" => Vec::<i32>::new()].unwrap();
        assert!(TableReplaySource::new(df, 10).is_err());
    }

    #[test]
    fn test_closure_source() {
        let mut calls = 0;
        let mut source = || {
            calls += 1;
            Ok::<_, HealingError>(Batch::new(df!["x" => [1.0]].unwrap()))
        };
        assert_eq!(source.next_batch().unwrap().data.height(), 1);
        assert_eq!(source.next_batch().unwrap().data.height(), 1);
        drop(source);
        assert_eq!(calls, 2);
    }
}
