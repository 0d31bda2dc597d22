//! Reservoir sampling of CSV rows.
//!
//! Streams a CSV file record by record and keeps a uniform random sample of at
//! most `capacity` rows (Algorithm R). Memory is bounded by the sample, not by
//! the file. Sampled rows keep their original relative order.

use rand::prelude::*;
use std::convert::Infallible;
use std::path::Path;

/// Uniform fixed-size row sampler.
#[derive(Debug, Clone)]
pub struct ReservoirSampler {
    capacity: usize,
    seed: Option<u64>,
}

/// Re-serialized sample ready for CSV parsing.
#[derive(Debug, Clone)]
pub struct CsvSample {
    /// Header plus sampled rows as CSV bytes.
    pub csv: Vec<u8>,
    /// Data rows read from the source.
    pub rows_seen: usize,
}

impl ReservoirSampler {
    pub fn new(capacity: usize, seed: Option<u64>) -> Self {
        Self { capacity, seed }
    }

    /// Sample a stream of `items`.
    ///
    /// Returns `(original_index, item)` pairs sorted by original index, plus
    /// the number of items seen.
    pub fn sample<T, I>(&self, items: I) -> (Vec<(usize, T)>, usize)
    where
        I: IntoIterator<Item = T>,
    {
        match self.try_sample(items.into_iter().map(Ok::<T, Infallible>)) {
            Ok(sampled) => sampled,
            Err(never) => match never {},
        }
    }

    /// Sample a stream of fallible items, stopping at the first error.
    pub fn try_sample<T, E, I>(&self, items: I) -> Result<(Vec<(usize, T)>, usize), E>
    where
        I: IntoIterator<Item = Result<T, E>>,
    {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut reservoir: Vec<(usize, T)> = Vec::with_capacity(self.capacity.min(4096));
        let mut seen = 0usize;

        for (index, item) in items.into_iter().enumerate() {
            let item = item?;
            seen = index + 1;
            if reservoir.len() < self.capacity {
                reservoir.push((index, item));
            } else {
                let slot = rng.gen_range(0..=index);
                if slot < self.capacity {
                    reservoir[slot] = (index, item);
                }
            }
        }

        reservoir.sort_by_key(|(index, _)| *index);
        Ok((reservoir, seen))
    }

    /// Sample data rows of a CSV file, keeping the header.
    pub fn sample_csv(&self, path: &Path) -> Result<CsvSample, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_path(path)?;
        let headers = reader.headers()?.clone();

        let (sampled, rows_seen) = self.try_sample(reader.records())?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&headers)?;
        for (_, record) in &sampled {
            writer.write_record(record)?;
        }
        let csv = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;

        Ok(CsvSample { csv, rows_seen })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sample_keeps_everything_under_capacity() {
        let sampler = ReservoirSampler::new(10, Some(1));
        let (sampled, seen) = sampler.sample(0..4);
        assert_eq!(seen, 4);
        assert_eq!(
            sampled.into_iter().map(|(_, v)| v).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_sample_is_bounded_and_ordered() {
        let sampler = ReservoirSampler::new(25, Some(9));
        let (sampled, seen) = sampler.sample(0..10_000);
        assert_eq!(seen, 10_000);
        assert_eq!(sampled.len(), 25);
        assert!(sampled.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(sampled.iter().all(|(index, value)| index == value));
    }

    #[test]
    fn test_seeded_sample_is_reproducible() {
        let a = ReservoirSampler::new(5, Some(42)).sample(0..1000).0;
        let b = ReservoirSampler::new(5, Some(42)).sample(0..1000).0;
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_csv_preserves_header_and_quoting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quoted.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "name,note").unwrap();
        writeln!(file, "a,\"hello, world\"").unwrap();
        writeln!(file, "b,").unwrap();

        let sample = ReservoirSampler::new(10, Some(0)).sample_csv(&path).unwrap();
        let text = String::from_utf8(sample.csv).unwrap();

        assert_eq!(sample.rows_seen, 2);
        assert!(text.starts_with("name,note\n"));
        assert!(text.contains("\"hello, world\""));
    }
}
