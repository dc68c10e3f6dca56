//! Settings for a detection run.

use crate::anomaly::DEFAULT_SPEED_THRESHOLD_KMH;
use std::{
    fmt::{self, Display},
    time::Duration,
};
use strum::{Display as StrumDisplay, EnumString};

/// Timestamp layout of the Danish Maritime Authority AIS exports.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// How the dataset is cut into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Partitioning {
    /// Equal row counts. A vessel's reports may end up in two chunks, and the step between them is
    /// never checked.
    RowCount,
    /// Rows are grouped by vessel first and chunk boundaries are moved so no vessel is split.
    VesselAware,
}

/// Configuration consumed by the partitioner and the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Speeds above this (km/h) are flagged.
    pub speed_threshold_kmh: f64,
    /// Number of chunks to cut the dataset into.
    pub chunk_count: usize,
    /// Number of worker threads.
    pub worker_count: usize,
    /// Give up on a chunk that has been running longer than this.
    pub chunk_timeout: Option<Duration>,
    /// chrono format string for the timestamp column.
    pub timestamp_format: String,
    pub partitioning: Partitioning,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let workers = default_worker_count();

        DetectorConfig {
            speed_threshold_kmh: DEFAULT_SPEED_THRESHOLD_KMH,
            chunk_count: workers,
            worker_count: workers,
            chunk_timeout: None,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_owned(),
            partitioning: Partitioning::RowCount,
        }
    }
}

impl Display for DetectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "      Threshold: {:.1} km/h", self.speed_threshold_kmh)?;
        writeln!(f, "         Chunks: {}", self.chunk_count)?;
        writeln!(f, "        Workers: {}", self.worker_count)?;
        match self.chunk_timeout {
            Some(timeout) => writeln!(f, "  Chunk timeout: {:.1} s", timeout.as_secs_f64())?,
            None => writeln!(f, "  Chunk timeout: none")?,
        }
        writeln!(f, "  Timestamp fmt: {}", self.timestamp_format)?;
        writeln!(f, "   Partitioning: {}", self.partitioning)
    }
}

/// One less than the number of CPUs so the coordinating thread has a core, but never zero.
pub fn default_worker_count() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults() {
        let config = DetectorConfig::default();
        assert_eq!(config.speed_threshold_kmh, 50.0);
        assert!(config.worker_count >= 1);
        assert_eq!(config.chunk_count, config.worker_count);
        assert_eq!(config.chunk_timeout, None);
        assert_eq!(config.partitioning, Partitioning::RowCount);
        assert_eq!(config.timestamp_format, "%d/%m/%Y %H:%M:%S");
    }

    #[test]
    fn test_partitioning_names() {
        assert_eq!(
            Partitioning::from_str("vessel-aware").unwrap(),
            Partitioning::VesselAware
        );
        assert_eq!(Partitioning::RowCount.to_string(), "row-count");
        assert!(Partitioning::from_str("random").is_err());
    }
}
