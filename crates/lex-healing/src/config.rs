//! Configuration types for the healing engine and the stream controller.
//!
//! This module provides configuration options using the builder pattern.
//! The execution mode is resolved once at process start (see
//! [`ExecutionMode::detect`]) and threaded through [`EngineConfig`]; nothing
//! in the engine reads the environment on its own.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variables that indicate a managed cloud host.
pub const CLOUD_ENV_INDICATORS: [&str; 6] = [
    "RENDER",
    "RENDER_SERVICE_ID",
    "RENDER_INSTANCE_ID",
    "IS_PULL_REQUEST",
    "DYNO",
    "PORT",
];

/// Where the engine is running, which decides how tables are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Managed cloud host with limited memory: tables are read in full from
    /// small uploads.
    Cloud,
    /// Local machine: large files on disk are reservoir-sampled for scans.
    #[default]
    Local,
}

impl ExecutionMode {
    /// Detect the execution mode from the process environment.
    pub fn detect() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Map an environment lookup to an execution mode.
    ///
    /// Any non-empty cloud indicator selects [`ExecutionMode::Cloud`].
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_cloud = CLOUD_ENV_INDICATORS
            .iter()
            .any(|key| lookup(key).is_some_and(|value| !value.is_empty()));

        if is_cloud { Self::Cloud } else { Self::Local }
    }

    /// Memory budget hint in megabytes for this mode.
    pub fn memory_limit_mb(&self) -> u64 {
        match self {
            Self::Cloud => 512,
            Self::Local => 8192,
        }
    }

    /// Whether path sources are sampled rather than read in full during scans.
    pub fn samples_large_files(&self) -> bool {
        matches!(self, Self::Local)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Local => "local",
        }
    }
}

/// Configuration for scanning, healing and batch analysis.
///
/// Use [`EngineConfig::builder()`] to create a validated configuration.
///
/// # Example
///
/// ```rust,ignore
/// use lex_healing::config::{EngineConfig, ExecutionMode};
///
/// let config = EngineConfig::builder()
///     .execution_mode(ExecutionMode::detect())
///     .drop_threshold(60.0)
///     .critical_drift_threshold(0.25)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Execution mode resolved at startup.
    /// Default: Local
    pub execution_mode: ExecutionMode,

    /// Columns with a null percentage strictly above this value are dropped.
    /// Expressed in percent (0 - 100). Default: 50.0
    pub drop_threshold: f64,

    /// Numeric columns with a null percentage strictly between 0 and this value
    /// are median-imputed; columns at or above it (and not dropped) are flagged.
    /// Expressed in percent (0 - 100). Default: 5.0
    pub impute_threshold: f64,

    /// Drift scores strictly above this value are critical: they raise batch
    /// alerts and mark a scan as requiring healing. Default: 0.3
    pub critical_drift_threshold: f64,

    /// Drift scores above this value are reported with medium severity.
    /// Default: 0.1
    pub watch_drift_threshold: f64,

    /// Drift scores above this value are reported with critical severity.
    /// Default: 0.5
    pub severe_drift_threshold: f64,

    /// Cells whose z-score exceeds this value count as anomalies. Default: 3.0
    pub anomaly_z_threshold: f64,

    /// Weight of the anomaly rate in the batch health score. Default: 0.5
    pub anomaly_weight: f64,

    /// Batches with a health score strictly below this value raise an alert.
    /// Default: 0.7
    pub health_alert_threshold: f64,

    /// Maximum number of rows read when sampling a large file. Default: 100_000
    pub sample_rows: usize,

    /// Seed for reservoir sampling. `None` draws from entropy. Default: None
    pub sample_seed: Option<u64>,

    /// Output path used when healing an in-memory buffer without an explicit
    /// output path. Default: "data/raw/cleaned_data.csv"
    pub fallback_output_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::default(),
            drop_threshold: 50.0,
            impute_threshold: 5.0,
            critical_drift_threshold: 0.3,
            watch_drift_threshold: 0.1,
            severe_drift_threshold: 0.5,
            anomaly_z_threshold: 3.0,
            anomaly_weight: 0.5,
            health_alert_threshold: 0.7,
            sample_rows: 100_000,
            sample_seed: None,
            fallback_output_path: PathBuf::from("data/raw/cleaned_data.csv"),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, value) in [
            ("drop_threshold", self.drop_threshold),
            ("impute_threshold", self.impute_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigValidationError::InvalidPercentage {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.impute_threshold > self.drop_threshold {
            return Err(ConfigValidationError::InvertedBands {
                lower: "impute_threshold".to_string(),
                upper: "drop_threshold".to_string(),
            });
        }

        for (field, value) in [
            ("critical_drift_threshold", self.critical_drift_threshold),
            ("watch_drift_threshold", self.watch_drift_threshold),
            ("severe_drift_threshold", self.severe_drift_threshold),
            ("health_alert_threshold", self.health_alert_threshold),
            ("anomaly_weight", self.anomaly_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.watch_drift_threshold > self.critical_drift_threshold {
            return Err(ConfigValidationError::InvertedBands {
                lower: "watch_drift_threshold".to_string(),
                upper: "critical_drift_threshold".to_string(),
            });
        }

        if self.critical_drift_threshold > self.severe_drift_threshold {
            return Err(ConfigValidationError::InvertedBands {
                lower: "critical_drift_threshold".to_string(),
                upper: "severe_drift_threshold".to_string(),
            });
        }

        if !(self.anomaly_z_threshold > 0.0) {
            return Err(ConfigValidationError::InvalidZThreshold(
                self.anomaly_z_threshold,
            ));
        }

        if self.sample_rows == 0 {
            return Err(ConfigValidationError::InvalidCount {
                field: "sample_rows".to_string(),
                value: self.sample_rows,
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid percentage for '{field}': {value} (must be between 0 and 100)")]
    InvalidPercentage { field: String, value: f64 },

    #[error("'{lower}' must not exceed '{upper}'")]
    InvertedBands { lower: String, upper: String },

    #[error("Invalid z-score threshold: {0} (must be positive)")]
    InvalidZThreshold(f64),

    #[error("Invalid value for '{field}': {value} (must be at least 1)")]
    InvalidCount { field: String, value: usize },
}

/// Builder for [`EngineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    execution_mode: Option<ExecutionMode>,
    drop_threshold: Option<f64>,
    impute_threshold: Option<f64>,
    critical_drift_threshold: Option<f64>,
    watch_drift_threshold: Option<f64>,
    severe_drift_threshold: Option<f64>,
    anomaly_z_threshold: Option<f64>,
    anomaly_weight: Option<f64>,
    health_alert_threshold: Option<f64>,
    sample_rows: Option<usize>,
    sample_seed: Option<u64>,
    fallback_output_path: Option<PathBuf>,
}

impl EngineConfigBuilder {
    /// Set the execution mode (usually [`ExecutionMode::detect()`]).
    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = Some(mode);
        self
    }

    /// Set the null percentage above which columns are dropped.
    ///
    /// # Arguments
    /// * `percent` - Value between 0 and 100 (e.g., 50.0 = 50%)
    pub fn drop_threshold(mut self, percent: f64) -> Self {
        self.drop_threshold = Some(percent);
        self
    }

    /// Set the null percentage below which numeric columns are imputed.
    ///
    /// # Arguments
    /// * `percent` - Value between 0 and 100 (e.g., 5.0 = 5%)
    pub fn impute_threshold(mut self, percent: f64) -> Self {
        self.impute_threshold = Some(percent);
        self
    }

    /// Set the drift score above which drift is critical.
    pub fn critical_drift_threshold(mut self, threshold: f64) -> Self {
        self.critical_drift_threshold = Some(threshold);
        self
    }

    /// Set the drift score above which drift is worth watching.
    pub fn watch_drift_threshold(mut self, threshold: f64) -> Self {
        self.watch_drift_threshold = Some(threshold);
        self
    }

    /// Set the drift score above which drift is severe.
    pub fn severe_drift_threshold(mut self, threshold: f64) -> Self {
        self.severe_drift_threshold = Some(threshold);
        self
    }

    /// Set the z-score above which a numeric cell is an anomaly.
    pub fn anomaly_z_threshold(mut self, z: f64) -> Self {
        self.anomaly_z_threshold = Some(z);
        self
    }

    /// Set the weight of the anomaly rate in the health score.
    pub fn anomaly_weight(mut self, weight: f64) -> Self {
        self.anomaly_weight = Some(weight);
        self
    }

    /// Set the health score below which a batch raises an alert.
    pub fn health_alert_threshold(mut self, threshold: f64) -> Self {
        self.health_alert_threshold = Some(threshold);
        self
    }

    /// Set the maximum number of rows read when sampling large files.
    pub fn sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = Some(rows);
        self
    }

    /// Seed reservoir sampling for reproducible scans.
    pub fn sample_seed(mut self, seed: u64) -> Self {
        self.sample_seed = Some(seed);
        self
    }

    /// Set the output path used when healing in-memory buffers.
    pub fn fallback_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_output_path = Some(path.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `EngineConfig` or an error if validation fails.
    pub fn build(self) -> Result<EngineConfig, ConfigValidationError> {
        let defaults = EngineConfig::default();
        let config = EngineConfig {
            execution_mode: self.execution_mode.unwrap_or_default(),
            drop_threshold: self.drop_threshold.unwrap_or(defaults.drop_threshold),
            impute_threshold: self.impute_threshold.unwrap_or(defaults.impute_threshold),
            critical_drift_threshold: self
                .critical_drift_threshold
                .unwrap_or(defaults.critical_drift_threshold),
            watch_drift_threshold: self
                .watch_drift_threshold
                .unwrap_or(defaults.watch_drift_threshold),
            severe_drift_threshold: self
                .severe_drift_threshold
                .unwrap_or(defaults.severe_drift_threshold),
            anomaly_z_threshold: self
                .anomaly_z_threshold
                .unwrap_or(defaults.anomaly_z_threshold),
            anomaly_weight: self.anomaly_weight.unwrap_or(defaults.anomaly_weight),
            health_alert_threshold: self
                .health_alert_threshold
                .unwrap_or(defaults.health_alert_threshold),
            sample_rows: self.sample_rows.unwrap_or(defaults.sample_rows),
            sample_seed: self.sample_seed,
            fallback_output_path: self
                .fallback_output_path
                .unwrap_or(defaults.fallback_output_path),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration for the [`StreamController`](crate::stream::StreamController).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Maximum number of entries kept in the rolling history. Default: 50
    pub history_capacity: usize,

    /// Number of ticks after which the controller stops on its own.
    /// `None` runs until an external stop request. Default: Some(20)
    pub max_batches: Option<usize>,

    /// Pause between ticks when driven by [`run`](crate::stream::StreamController::run).
    /// Presentation pacing only. Default: 0ms
    #[serde(with = "duration_millis")]
    pub tick_delay: Duration,

    /// Rows per generated batch. Default: 50
    pub batch_size: usize,

    /// Probability that a generated batch carries a drift event. Default: 0.1
    pub drift_probability: f64,

    /// Seed for the synthetic generator. `None` draws from entropy. Default: None
    pub seed: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            max_batches: Some(20),
            tick_delay: Duration::ZERO,
            batch_size: 50,
            drift_probability: 0.1,
            seed: None,
        }
    }
}

impl StreamConfig {
    /// Create a new configuration builder.
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.history_capacity == 0 {
            return Err(ConfigValidationError::InvalidCount {
                field: "history_capacity".to_string(),
                value: self.history_capacity,
            });
        }

        if self.max_batches == Some(0) {
            return Err(ConfigValidationError::InvalidCount {
                field: "max_batches".to_string(),
                value: 0,
            });
        }

        if self.batch_size == 0 {
            return Err(ConfigValidationError::InvalidCount {
                field: "batch_size".to_string(),
                value: self.batch_size,
            });
        }

        if !(0.0..=1.0).contains(&self.drift_probability) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "drift_probability".to_string(),
                value: self.drift_probability,
            });
        }

        Ok(())
    }
}

/// Builder for [`StreamConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct StreamConfigBuilder {
    history_capacity: Option<usize>,
    max_batches: Option<Option<usize>>,
    tick_delay: Option<Duration>,
    batch_size: Option<usize>,
    drift_probability: Option<f64>,
    seed: Option<u64>,
}

impl StreamConfigBuilder {
    /// Set the rolling history capacity.
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }

    /// Stop automatically after this many ticks.
    pub fn max_batches(mut self, batches: usize) -> Self {
        self.max_batches = Some(Some(batches));
        self
    }

    /// Run until an external stop request.
    pub fn unbounded(mut self) -> Self {
        self.max_batches = Some(None);
        self
    }

    /// Set the pause between ticks.
    pub fn tick_delay(mut self, delay: Duration) -> Self {
        self.tick_delay = Some(delay);
        self
    }

    /// Set the rows per generated batch.
    pub fn batch_size(mut self, rows: usize) -> Self {
        self.batch_size = Some(rows);
        self
    }

    /// Set the probability of a drift event per generated batch.
    pub fn drift_probability(mut self, probability: f64) -> Self {
        self.drift_probability = Some(probability);
        self
    }

    /// Seed the synthetic generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<StreamConfig, ConfigValidationError> {
        let defaults = StreamConfig::default();
        let config = StreamConfig {
            history_capacity: self.history_capacity.unwrap_or(defaults.history_capacity),
            max_batches: self.max_batches.unwrap_or(defaults.max_batches),
            tick_delay: self.tick_delay.unwrap_or(defaults.tick_delay),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            drift_probability: self
                .drift_probability
                .unwrap_or(defaults.drift_probability),
            seed: self.seed,
        };

        config.validate()?;
        Ok(config)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.drop_threshold, 50.0);
        assert_eq!(config.impute_threshold, 5.0);
        assert_eq!(config.critical_drift_threshold, 0.3);
        assert_eq!(config.anomaly_z_threshold, 3.0);
        assert_eq!(config.health_alert_threshold, 0.7);
        assert_eq!(config.sample_rows, 100_000);
        assert_eq!(config.execution_mode, ExecutionMode::Local);
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let config = EngineConfig::builder().build().unwrap();
        assert_eq!(config.drop_threshold, EngineConfig::default().drop_threshold);
        assert_eq!(
            config.fallback_output_path,
            PathBuf::from("data/raw/cleaned_data.csv")
        );
    }

    #[test]
    fn test_builder_custom_values() {
        let config = EngineConfig::builder()
            .execution_mode(ExecutionMode::Cloud)
            .drop_threshold(70.0)
            .impute_threshold(10.0)
            .critical_drift_threshold(0.25)
            .anomaly_z_threshold(2.5)
            .sample_seed(7)
            .build()
            .unwrap();

        assert_eq!(config.execution_mode, ExecutionMode::Cloud);
        assert_eq!(config.drop_threshold, 70.0);
        assert_eq!(config.impute_threshold, 10.0);
        assert_eq!(config.critical_drift_threshold, 0.25);
        assert_eq!(config.anomaly_z_threshold, 2.5);
        assert_eq!(config.sample_seed, Some(7));
    }

    #[test]
    fn test_validation_rejects_out_of_range_percentage() {
        let result = EngineConfig::builder().drop_threshold(150.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidPercentage { .. }
        ));
    }

    #[test]
    fn test_validation_rejects_inverted_bands() {
        let result = EngineConfig::builder()
            .drop_threshold(4.0)
            .impute_threshold(5.0)
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvertedBands { .. }
        ));

        let result = EngineConfig::builder()
            .critical_drift_threshold(0.6)
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvertedBands { .. }
        ));
    }

    #[test]
    fn test_validation_rejects_non_positive_z() {
        let result = EngineConfig::builder().anomaly_z_threshold(0.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidZThreshold(_)
        ));
    }

    #[test]
    fn test_execution_mode_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([("RENDER_SERVICE_ID", "srv-123")]);
        let mode = ExecutionMode::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(mode, ExecutionMode::Cloud);

        let mode = ExecutionMode::from_lookup(|_| None);
        assert_eq!(mode, ExecutionMode::Local);
    }

    #[test]
    fn test_execution_mode_ignores_empty_values() {
        let mode = ExecutionMode::from_lookup(|key| (key == "PORT").then(String::new));
        assert_eq!(mode, ExecutionMode::Local);

        let mode = ExecutionMode::from_lookup(|key| (key == "PORT").then(|| "8080".to_string()));
        assert_eq!(mode, ExecutionMode::Cloud);
    }

    #[test]
    fn test_execution_mode_memory_limit() {
        assert_eq!(ExecutionMode::Cloud.memory_limit_mb(), 512);
        assert_eq!(ExecutionMode::Local.memory_limit_mb(), 8192);
        assert!(ExecutionMode::Local.samples_large_files());
        assert!(!ExecutionMode::Cloud.samples_large_files());
    }

    #[test]
    fn test_stream_config_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.max_batches, Some(20));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.tick_delay, Duration::ZERO);
    }

    #[test]
    fn test_stream_config_builder() {
        let config = StreamConfig::builder()
            .unbounded()
            .history_capacity(5)
            .seed(42)
            .build()
            .unwrap();
        assert_eq!(config.max_batches, None);
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.seed, Some(42));

        assert!(StreamConfig::builder().max_batches(0).build().is_err());
        assert!(StreamConfig::builder().drift_probability(1.5).build().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "execution_mode": "cloud",
            "drop_threshold": 60.0,
            "impute_threshold": 2.0,
            "critical_drift_threshold": 0.4,
            "watch_drift_threshold": 0.1,
            "severe_drift_threshold": 0.6,
            "anomaly_z_threshold": 2.0,
            "anomaly_weight": 0.5,
            "health_alert_threshold": 0.8,
            "sample_rows": 500,
            "sample_seed": null,
            "fallback_output_path": "out/cleaned.csv"
        }"#;

        let config: EngineConfig = serde_json::from_str(json).expect("Should deserialize");
        assert_eq!(config.execution_mode, ExecutionMode::Cloud);
        assert_eq!(config.drop_threshold, 60.0);
        assert_eq!(config.sample_rows, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stream_config_serializes_delay_as_millis() {
        let config = StreamConfig::builder()
            .tick_delay(Duration::from_millis(250))
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"tick_delay\":250"));
    }
}
