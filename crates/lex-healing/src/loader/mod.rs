//! Table loading from CSV sources.
//!
//! Tables arrive either as a path on the local filesystem or as an in-memory
//! buffer (uploads). In [`ExecutionMode::Local`] scans of path sources read a
//! reservoir sample of at most `sample_rows` rows so very large files never
//! have to be materialized; every other combination reads the table in full.

mod reservoir;

pub use reservoir::ReservoirSampler;

use crate::config::{EngineConfig, ExecutionMode};
use crate::error::{HealingError, Result};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where a table comes from.
#[derive(Debug, Clone)]
pub enum TableSource {
    /// CSV file on the local filesystem.
    Path(PathBuf),
    /// CSV content held in memory.
    Bytes(Vec<u8>),
}

impl TableSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Name used in logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes(bytes) => format!("<in-memory buffer, {} bytes>", bytes.len()),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Bytes(_) => None,
        }
    }
}

/// A loaded table plus how it was obtained.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub data: DataFrame,
    /// True when `data` holds a strict subset of the source rows.
    pub sampled: bool,
    /// Data rows in the source, when known.
    pub source_rows: usize,
}

/// Reads [`TableSource`]s into DataFrames.
#[derive(Debug, Clone)]
pub struct TableLoader {
    mode: ExecutionMode,
    sample_rows: usize,
    sample_seed: Option<u64>,
}

impl TableLoader {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            mode: config.execution_mode,
            sample_rows: config.sample_rows,
            sample_seed: config.sample_seed,
        }
    }

    /// Load a table for scanning, sampling large files in local mode.
    pub fn load_for_scan(&self, source: &TableSource) -> Result<LoadedTable> {
        match source {
            TableSource::Path(path) if self.mode.samples_large_files() => {
                info!("Big data mode: sampling up to {} rows from {}", self.sample_rows, path.display());
                self.load_sampled(path)
            }
            _ => {
                let data = self.load_full(source)?;
                let source_rows = data.height();
                Ok(LoadedTable {
                    data,
                    sampled: false,
                    source_rows,
                })
            }
        }
    }

    /// Load every row of a table.
    pub fn load_full(&self, source: &TableSource) -> Result<DataFrame> {
        let df = match source {
            TableSource::Path(path) => {
                ensure_exists(path)?;
                read_csv_path_with_fallbacks(path)
            }
            TableSource::Bytes(bytes) => read_csv_bytes(bytes.clone()),
        }
        .map_err(|e| HealingError::load(source.describe(), e))?;

        info!("Loaded {} rows, {} columns from {}", df.height(), df.width(), source.describe());
        Ok(df)
    }

    fn load_sampled(&self, path: &Path) -> Result<LoadedTable> {
        ensure_exists(path)?;

        let sampler = ReservoirSampler::new(self.sample_rows, self.sample_seed);
        let sample = sampler
            .sample_csv(path)
            .map_err(|e| HealingError::load(path.display().to_string(), e))?;

        let data = read_csv_bytes(sample.csv)
            .map_err(|e| HealingError::load(path.display().to_string(), e))?;

        info!(
            "Loaded {} of {} rows, {} columns from {}",
            data.height(),
            sample.rows_seen,
            data.width(),
            path.display()
        );

        Ok(LoadedTable {
            sampled: sample.rows_seen > data.height(),
            source_rows: sample.rows_seen,
            data,
        })
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(HealingError::SourceNotFound(path.to_path_buf()))
    }
}

/// Parse CSV bytes held in memory, inferring types from every row.
fn read_csv_bytes(bytes: Vec<u8>) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
}

/// Load a CSV file with multiple fallback strategies.
///
/// Types are always inferred from every row, so a numeric column whose
/// values only start late in the file is still read as numeric.
fn read_csv_path_with_fallbacks(path: &Path) -> PolarsResult<DataFrame> {
    // Strategy 1: quoted parse
    match CsvReadOptions::default()
        .with_infer_schema_length(None)
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Standard loading failed: {}", e),
    }

    // Strategy 2: tolerate rows with extra fields
    match CsvReadOptions::default()
        .with_infer_schema_length(None)
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_truncate_ragged_lines(true))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Loading with ragged lines failed: {}", e),
    }

    // Strategy 3: pre-clean content
    let content = std::fs::read_to_string(path)?;
    read_csv_bytes(clean_csv_content(&content).into_bytes())
}

/// Collapse doubled quotes and drop blank lines.
fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CSV: &str = "id,value,category\n1,10,A\n2,,B\n3,30,\n4,40,C\n";

    fn loader(mode: ExecutionMode) -> TableLoader {
        let config = EngineConfig::builder()
            .execution_mode(mode)
            .sample_seed(11)
            .build()
            .unwrap();
        TableLoader::new(&config)
    }

    fn write_temp_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_bytes_infers_types_and_nulls() {
        let df = loader(ExecutionMode::Cloud)
            .load_full(&TableSource::bytes(SAMPLE_CSV))
            .unwrap();

        assert_eq!(df.shape(), (4, 3));
        assert_eq!(df.column("value").unwrap().null_count(), 1);
        assert_eq!(df.column("category").unwrap().null_count(), 1);
        assert!(crate::utils::is_numeric_dtype(df.column("value").unwrap().dtype()));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = loader(ExecutionMode::Local)
            .load_full(&TableSource::path("/definitely/not/here.csv"))
            .unwrap_err();
        assert!(err.is_load_error());
        assert_eq!(err.error_code(), "SOURCE_NOT_FOUND");
    }

    #[test]
    fn test_empty_buffer_is_load_error() {
        let err = loader(ExecutionMode::Cloud)
            .load_full(&TableSource::bytes(Vec::new()))
            .unwrap_err();
        assert!(err.is_load_error());
    }

    #[test]
    fn test_local_scan_of_small_file_is_not_sampled() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp_csv(dir.path(), "small.csv", SAMPLE_CSV);

        let loaded = loader(ExecutionMode::Local)
            .load_for_scan(&TableSource::path(&path))
            .unwrap();

        assert!(!loaded.sampled);
        assert_eq!(loaded.source_rows, 4);
        assert_eq!(loaded.data.height(), 4);
        assert_eq!(loaded.data.column("value").unwrap().null_count(), 1);
    }

    #[test]
    fn test_local_scan_samples_large_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = String::from("id,value\n");
        for i in 0..500 {
            content.push_str(&format!("{},{}\n", i, i * 2));
        }
        let path = write_temp_csv(dir.path(), "large.csv", &content);

        let config = EngineConfig::builder()
            .execution_mode(ExecutionMode::Local)
            .sample_rows(100)
            .sample_seed(3)
            .build()
            .unwrap();
        let loaded = TableLoader::new(&config)
            .load_for_scan(&TableSource::path(&path))
            .unwrap();

        assert!(loaded.sampled);
        assert_eq!(loaded.source_rows, 500);
        assert_eq!(loaded.data.height(), 100);
    }

    #[test]
    fn test_cloud_scan_reads_path_in_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp_csv(dir.path(), "cloud.csv", SAMPLE_CSV);

        let loaded = loader(ExecutionMode::Cloud)
            .load_for_scan(&TableSource::path(&path))
            .unwrap();
        assert!(!loaded.sampled);
        assert_eq!(loaded.data.height(), 4);
    }

    /// 3000 rows where `v` is empty for the first 100 and integer after.
    fn late_numeric_csv() -> String {
        let mut content = String::from("id,v\n");
        for i in 0..3000 {
            if i < 100 {
                content.push_str(&format!("{},\n", i));
            } else {
                content.push_str(&format!("{},{}\n", i, i % 17));
            }
        }
        content
    }

    #[test]
    fn test_late_numeric_values_are_typed_numeric() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp_csv(dir.path(), "late.csv", &late_numeric_csv());

        let from_path = loader(ExecutionMode::Local)
            .load_full(&TableSource::path(&path))
            .unwrap();
        let from_bytes = loader(ExecutionMode::Cloud)
            .load_full(&TableSource::bytes(late_numeric_csv()))
            .unwrap();

        for df in [&from_path, &from_bytes] {
            let v = df.column("v").unwrap();
            assert!(crate::utils::is_numeric_dtype(v.dtype()));
            assert_eq!(v.null_count(), 100);
        }
    }

    #[test]
    fn test_sampled_late_numeric_values_are_typed_numeric() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp_csv(dir.path(), "late.csv", &late_numeric_csv());
        let config = EngineConfig::builder()
            .execution_mode(ExecutionMode::Local)
            .sample_rows(2000)
            .sample_seed(5)
            .build()
            .unwrap();

        let loaded = TableLoader::new(&config)
            .load_for_scan(&TableSource::path(&path))
            .unwrap();

        assert!(loaded.sampled);
        assert!(crate::utils::is_numeric_dtype(
            loaded.data.column("v").unwrap().dtype()
        ));
    }

    #[test]
    fn test_clean_csv_content() {
        let cleaned = clean_csv_content("a,b\n\n\"\"x\"\",1\n");
        assert_eq!(cleaned, "a,b\n\"x\",1");
    }
}
