pub use anomaly::{
    AnomalyClassifier, AnomalyReason, AnomalyRecord, ChunkAnomalies, VesselAnomalies,
    DEFAULT_SPEED_THRESHOLD_KMH, OUTPUT_TIME_FORMAT,
};
pub use chunk::{order_by_vessel, partition_rows, partition_rows_by_vessel};
pub use config::{default_worker_count, DetectorConfig, Partitioning, DEFAULT_TIMESTAMP_FORMAT};
pub use dataset::Dataset;
pub use error::{SpoofError, SpoofResult};
pub use executor::{
    ChunkFindings, ChunkJob, ChunkOutcome, ChunkProcessor, ChunkResult, ChunkStats,
    ParallelExecutor, RunSummary, SpeedAnomalyProcessor,
};
pub use geo::{great_circle_distance, great_circle_distances, EARTH_RADIUS_KM};
pub use output::AnomalyReport;
pub use report::{Mmsi, PositionReport, RawReport};
pub use speed::{derive_speed, estimate_speeds, SpeedEstimate, SpeedSample};
pub use track::{group_into_tracks, VesselTrack};

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod anomaly;
mod chunk;
mod config;
mod dataset;
mod error;
mod executor;
mod geo;
mod output;
mod report;
mod speed;
mod track;
