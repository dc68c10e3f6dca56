use std::{
    error::Error,
    fmt::{Display, Formatter},
    path::PathBuf,
};

/// Result type used throughout the crate.
///
/// The error is `Send + Sync` so it can be returned out of worker threads.
pub type SpoofResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// The things that can go wrong while detecting spoofing.
///
/// Only `DatasetUnavailable` and `MissingColumn` end a run. The row level errors cause a row to be
/// dropped, and the chunk level errors cause a single chunk to be marked as failed.
#[derive(Debug, Clone, PartialEq)]
pub enum SpoofError {
    /// A timestamp that could not be parsed with the configured format. The row is dropped.
    MalformedTimestamp { value: String },
    /// A vessel identity that is not an integer. The row is dropped.
    MalformedIdentity { value: String },
    /// A coordinate that is present but not a number. This fails the whole chunk.
    NonNumericCoordinate { column: &'static str, value: String },
    /// The dataset is missing a column we cannot work without.
    MissingColumn { column: &'static str },
    /// There is no dataset to read.
    DatasetUnavailable { path: PathBuf, reason: String },
    /// A worker panicked while processing a chunk.
    ChunkPanicked { chunk: usize, msg: String },
    /// A worker did not report back within the time limit.
    ChunkTimedOut { chunk: usize, secs: f64 },
    /// All the workers went away before the chunk was processed.
    WorkerUnavailable { chunk: usize },
}

impl Display for SpoofError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        use SpoofError::*;

        match self {
            MalformedTimestamp { value } => write!(f, "malformed timestamp: '{}'", value),
            MalformedIdentity { value } => write!(f, "malformed vessel identity: '{}'", value),
            NonNumericCoordinate { column, value } => {
                write!(f, "non-numeric {}: '{}'", column, value)
            }
            MissingColumn { column } => write!(f, "dataset is missing the '{}' column", column),
            DatasetUnavailable { path, reason } => {
                write!(f, "unable to read dataset {}: {}", path.display(), reason)
            }
            ChunkPanicked { chunk, msg } => write!(f, "chunk {} panicked: {}", chunk, msg),
            ChunkTimedOut { chunk, secs } => {
                write!(f, "chunk {} timed out after {:.1} seconds", chunk, secs)
            }
            WorkerUnavailable { chunk } => write!(f, "no worker available for chunk {}", chunk),
        }
    }
}

impl Error for SpoofError {}
