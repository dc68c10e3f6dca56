/*!
 * Run the detection over a whole dataset with a pool of worker threads.
 *
 * The dataset is cut into chunks, each chunk is an independent unit of work, and the results are
 * gathered back together in chunk order. Workers share the rows read-only and never talk to each
 * other. A chunk that fails, panics, or runs past the timeout is recorded as failed and does not
 * stop the other chunks.
 */

use crate::{
    anomaly::{AnomalyClassifier, ChunkAnomalies, VesselAnomalies},
    chunk::{order_by_vessel, partition_rows, partition_rows_by_vessel},
    config::{DetectorConfig, Partitioning},
    dataset::Dataset,
    error::{SpoofError, SpoofResult},
    output::AnomalyReport,
    report::{PositionReport, RawReport},
    speed::{estimate_speeds, SpeedEstimate},
    track::group_into_tracks,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use std::{
    fmt::{self, Display},
    ops::Range,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

const CHANNEL_SIZE: usize = 100;

/// Counts describing what happened inside a chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkStats {
    /// Rows handed to the chunk.
    pub rows: usize,
    /// Distinct vessels among the rows that were kept.
    pub vessels: usize,
    /// Rows thrown out for a malformed timestamp or identity.
    pub dropped_rows: usize,
    /// Rows kept, but missing a coordinate.
    pub missing_coordinate_rows: usize,
    /// Consecutive pairs with identical timestamps.
    pub zero_elapsed_pairs: usize,
    /// Consecutive pairs whose speed came out infinite or NaN.
    pub non_finite_pairs: usize,
    pub anomalies: usize,
}

impl std::ops::AddAssign for ChunkStats {
    fn add_assign(&mut self, other: Self) {
        self.rows += other.rows;
        self.vessels += other.vessels;
        self.dropped_rows += other.dropped_rows;
        self.missing_coordinate_rows += other.missing_coordinate_rows;
        self.zero_elapsed_pairs += other.zero_elapsed_pairs;
        self.non_finite_pairs += other.non_finite_pairs;
        self.anomalies += other.anomalies;
    }
}

/// What a chunk produced when it ran to completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkFindings {
    pub anomalies: ChunkAnomalies,
    pub stats: ChunkStats,
}

/// Anything that can turn a slice of rows into findings.
///
/// Implementations are shared between all the worker threads.
pub trait ChunkProcessor: Send + Sync {
    fn process(&self, index: usize, rows: &[RawReport]) -> Result<ChunkFindings, SpoofError>;
}

/// Group by vessel, derive speeds, and apply the speed threshold.
#[derive(Debug, Clone)]
pub struct SpeedAnomalyProcessor {
    classifier: AnomalyClassifier,
    timestamp_format: String,
}

impl SpeedAnomalyProcessor {
    pub fn new(config: &DetectorConfig) -> Self {
        SpeedAnomalyProcessor {
            classifier: AnomalyClassifier::new(config.speed_threshold_kmh),
            timestamp_format: config.timestamp_format.clone(),
        }
    }
}

impl ChunkProcessor for SpeedAnomalyProcessor {
    fn process(&self, index: usize, rows: &[RawReport]) -> Result<ChunkFindings, SpoofError> {
        let mut stats = ChunkStats {
            rows: rows.len(),
            ..ChunkStats::default()
        };

        let mut reports = Vec::with_capacity(rows.len());
        for raw in rows {
            match PositionReport::parse(raw, &self.timestamp_format) {
                Ok(report) => {
                    if report.is_missing_coordinate() {
                        stats.missing_coordinate_rows += 1;
                    }
                    reports.push(report);
                }
                Err(
                    err @ (SpoofError::MalformedTimestamp { .. }
                    | SpoofError::MalformedIdentity { .. }),
                ) => {
                    debug!(target: "chunk", "chunk {} dropping row: {}", index, err);
                    stats.dropped_rows += 1;
                }
                Err(err) => return Err(err),
            }
        }

        if stats.dropped_rows > 0 {
            warn!(target: "chunk",
                "chunk {} dropped {} malformed rows", index, stats.dropped_rows
            );
        }

        let mut anomalies = ChunkAnomalies::new();
        for track in group_into_tracks(reports) {
            stats.vessels += 1;

            let estimates = estimate_speeds(&track);
            for estimate in &estimates {
                match estimate {
                    SpeedEstimate::ZeroElapsed { .. } => stats.zero_elapsed_pairs += 1,
                    SpeedEstimate::NonFinite { .. } => stats.non_finite_pairs += 1,
                    _ => {}
                }
            }

            let found = self.classifier.classify(&track, &estimates);
            if !found.is_empty() {
                stats.anomalies += found.len();
                anomalies
                    .entry(track.mmsi)
                    .or_insert_with(VesselAnomalies::default)
                    .anomalies
                    .extend(found);
            }
        }

        Ok(ChunkFindings { anomalies, stats })
    }
}

/// How a chunk ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Completed(ChunkFindings),
    Failed(SpoofError),
}

/// The outcome of one chunk, along with which rows it covered.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub index: usize,
    pub rows: Range<usize>,
    pub outcome: ChunkOutcome,
}

impl ChunkResult {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ChunkOutcome::Failed(_))
    }

    pub fn findings(&self) -> Option<&ChunkFindings> {
        match &self.outcome {
            ChunkOutcome::Completed(findings) => Some(findings),
            ChunkOutcome::Failed(_) => None,
        }
    }
}

/// Everything from a run, one entry per chunk in chunk order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub chunks: Vec<ChunkResult>,
    /// Rows the dataset reader had to skip before chunking.
    pub unreadable_rows: usize,
}

impl RunSummary {
    /// Totals over all the chunks that completed.
    pub fn totals(&self) -> ChunkStats {
        let mut totals = ChunkStats::default();
        for findings in self.chunks.iter().filter_map(ChunkResult::findings) {
            totals += findings.stats;
        }
        totals
    }

    /// Every row that was handed to a chunk, whether the chunk completed or not.
    pub fn rows_processed(&self) -> usize {
        self.chunks.iter().map(|c| c.rows.len()).sum()
    }

    pub fn anomaly_count(&self) -> usize {
        self.totals().anomalies
    }

    pub fn failed_chunks(&self) -> impl Iterator<Item = &ChunkResult> {
        self.chunks.iter().filter(|c| c.is_failed())
    }

    /// The merged report: per chunk anomalies concatenated in chunk order, no deduplication.
    pub fn anomaly_report(&self) -> AnomalyReport {
        AnomalyReport {
            chunks: self
                .chunks
                .iter()
                .map(|c| c.findings().map(|f| f.anomalies.clone()))
                .collect(),
        }
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let totals = self.totals();
        let failed = self.failed_chunks().count();

        writeln!(f, "      Rows processed: {:>10}", self.rows_processed())?;
        writeln!(f, "    Unreadable rows: {:>10}", self.unreadable_rows)?;
        writeln!(f, "        Dropped rows: {:>10}", totals.dropped_rows)?;
        writeln!(f, "  Missing coordinate: {:>10}", totals.missing_coordinate_rows)?;
        writeln!(f, "             Vessels: {:>10}", totals.vessels)?;
        writeln!(f, "   Zero elapsed time: {:>10}", totals.zero_elapsed_pairs)?;
        writeln!(f, "   Non-finite speeds: {:>10}", totals.non_finite_pairs)?;
        writeln!(f, "     Anomalies found: {:>10}", totals.anomalies)?;
        write!(f, "       Chunks failed: {:>10} of {}", failed, self.chunks.len())
    }
}

/// A chunk of rows to be processed by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkJob {
    pub index: usize,
    pub rows: Range<usize>,
}

enum WorkerMessage {
    Started { index: usize, worker: usize, at: Instant },
    Finished { index: usize, outcome: ChunkOutcome },
}

/**
 * Runs chunks across a fixed size pool of threads.
 *
 * Nothing is streamed back early, [ParallelExecutor::run] blocks until every chunk has either
 * finished or been given up on.
 */
pub struct ParallelExecutor {
    config: DetectorConfig,
    processor: Arc<dyn ChunkProcessor>,
}

impl ParallelExecutor {
    /// An executor that applies the speed check from the configuration.
    pub fn new(config: DetectorConfig) -> Self {
        let processor = Arc::new(SpeedAnomalyProcessor::new(&config));
        ParallelExecutor { config, processor }
    }

    /// An executor that runs something other than the speed check on each chunk.
    pub fn with_processor(config: DetectorConfig, processor: Arc<dyn ChunkProcessor>) -> Self {
        ParallelExecutor { config, processor }
    }

    /// Cut the dataset into chunks, process them all, and gather the results in chunk order.
    pub fn run(&self, dataset: Dataset) -> SpoofResult<RunSummary> {
        let Dataset {
            mut rows,
            unreadable_rows,
        } = dataset;

        let ranges = match self.config.partitioning {
            Partitioning::RowCount => partition_rows(rows.len(), self.config.chunk_count),
            Partitioning::VesselAware => {
                order_by_vessel(&mut rows);
                partition_rows_by_vessel(&rows, self.config.chunk_count)
            }
        };

        let jobs: Vec<ChunkJob> = ranges
            .into_iter()
            .enumerate()
            .map(|(index, rows)| ChunkJob { index, rows })
            .collect();

        info!(target: "executor",
            "Processing {} rows in {} chunks with {} workers, flagging speeds over {:.1} km/h.",
            rows.len(),
            jobs.len(),
            self.config.worker_count.max(1).min(jobs.len().max(1)),
            self.config.speed_threshold_kmh
        );

        let chunks = self.run_jobs(Arc::new(rows), jobs)?;

        Ok(RunSummary {
            chunks,
            unreadable_rows,
        })
    }

    /// Process already partitioned jobs. The ranges must be within `rows`.
    pub fn run_jobs(
        &self,
        rows: Arc<Vec<RawReport>>,
        jobs: Vec<ChunkJob>,
    ) -> SpoofResult<Vec<ChunkResult>> {
        if jobs.is_empty() {
            return Ok(vec![]);
        }

        let (to_workers, from_coordinator) = bounded(jobs.len());
        let (to_coordinator, from_workers) = bounded(CHANNEL_SIZE);

        let ranges: Vec<Range<usize>> = jobs.iter().map(|job| job.rows.clone()).collect();
        for job in jobs {
            to_workers.send(job)?;
        }
        drop(to_workers);

        let num_workers = self.config.worker_count.max(1).min(ranges.len());
        let mut workers: Vec<(JoinHandle<()>, Arc<AtomicBool>)> = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            let abandoned = Arc::new(AtomicBool::new(false));
            let jh = self.start_worker_thread(
                id,
                from_coordinator.clone(),
                to_coordinator.clone(),
                Arc::clone(&rows),
                Arc::clone(&abandoned),
            )?;
            workers.push((jh, abandoned));
        }

        // Only hold on to a sender when we may need to start replacement workers, otherwise all
        // the workers exiting shows up as a disconnect.
        let to_coordinator = self.config.chunk_timeout.map(|_| to_coordinator);

        let mut outcomes: Vec<Option<ChunkOutcome>> = vec![None; ranges.len()];
        let mut in_flight: Vec<Option<(usize, Instant)>> = vec![None; ranges.len()];
        let mut remaining = ranges.len();

        while remaining > 0 {
            let deadline = self.config.chunk_timeout.and_then(|timeout| {
                in_flight
                    .iter()
                    .flatten()
                    .filter_map(|(_, started)| started.checked_add(timeout))
                    .min()
            });

            let msg = match deadline {
                Some(deadline) => from_workers.recv_deadline(deadline),
                None => from_workers.recv().map_err(RecvTimeoutError::from),
            };

            match msg {
                Ok(WorkerMessage::Started { index, worker, at }) => {
                    debug!(target: "executor", "worker {} started chunk {}", worker, index);
                    if outcomes[index].is_none() {
                        in_flight[index] = Some((worker, at));
                    }
                }
                Ok(WorkerMessage::Finished { index, outcome }) => {
                    if outcomes[index].is_some() {
                        debug!(target: "executor", "discarding late result for chunk {}", index);
                        continue;
                    }

                    if let ChunkOutcome::Failed(ref err) = outcome {
                        error!(target: "executor", "chunk {} failed: {}", index, err);
                    }

                    in_flight[index] = None;
                    outcomes[index] = Some(outcome);
                    remaining -= 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    let (timeout, to_coordinator) =
                        match (self.config.chunk_timeout, &to_coordinator) {
                            (Some(timeout), Some(to_coordinator)) => (timeout, to_coordinator),
                            _ => continue,
                        };

                    let now = Instant::now();
                    for index in 0..in_flight.len() {
                        let (worker, started) = match in_flight[index] {
                            Some((worker, started))
                                if started
                                    .checked_add(timeout)
                                    .map_or(false, |deadline| now >= deadline) =>
                            {
                                (worker, started)
                            }
                            _ => continue,
                        };

                        let err = SpoofError::ChunkTimedOut {
                            chunk: index,
                            secs: (now - started).as_secs_f64(),
                        };
                        error!(target: "executor", "{}, abandoning worker {}", err, worker);

                        in_flight[index] = None;
                        outcomes[index] = Some(ChunkOutcome::Failed(err));
                        remaining -= 1;

                        // The hung thread quits once it wakes up, replace it now.
                        if let Some((_, abandoned)) = workers.get(worker) {
                            abandoned.store(true, Ordering::SeqCst);
                        }
                        let id = workers.len();
                        let abandoned = Arc::new(AtomicBool::new(false));
                        let jh = self.start_worker_thread(
                            id,
                            from_coordinator.clone(),
                            to_coordinator.clone(),
                            Arc::clone(&rows),
                            Arc::clone(&abandoned),
                        )?;
                        workers.push((jh, abandoned));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        drop(from_workers);

        for (jh, abandoned) in workers {
            if abandoned.load(Ordering::SeqCst) {
                continue;
            }

            if let Err(err) = jh.join() {
                error!(target: "executor", "error joining worker thread: {:?}", err);
            }
        }

        let results = ranges
            .into_iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (rows, outcome))| ChunkResult {
                index,
                rows,
                // Anything left never got a worker.
                outcome: outcome.unwrap_or_else(|| {
                    let err = SpoofError::WorkerUnavailable { chunk: index };
                    error!(target: "executor", "{}", err);
                    ChunkOutcome::Failed(err)
                }),
            })
            .collect();

        Ok(results)
    }

    fn start_worker_thread(
        &self,
        id: usize,
        from_coordinator: Receiver<ChunkJob>,
        to_coordinator: Sender<WorkerMessage>,
        rows: Arc<Vec<RawReport>>,
        abandoned: Arc<AtomicBool>,
    ) -> SpoofResult<JoinHandle<()>> {
        let processor = Arc::clone(&self.processor);

        let jh = thread::Builder::new()
            .name(format!("spoofwatch-worker-{}", id))
            .spawn(move || {
                while !abandoned.load(Ordering::SeqCst) {
                    let ChunkJob { index, rows: range } = match from_coordinator.recv() {
                        Ok(job) => job,
                        Err(_) => return,
                    };

                    let started = WorkerMessage::Started {
                        index,
                        worker: id,
                        at: Instant::now(),
                    };
                    if to_coordinator.send(started).is_err() {
                        // Nobody is listening any more.
                        return;
                    }

                    let outcome = match rows.get(range.clone()) {
                        Some(chunk_rows) => run_chunk(processor.as_ref(), index, chunk_rows),
                        None => ChunkOutcome::Failed(SpoofError::ChunkPanicked {
                            chunk: index,
                            msg: format!("row range {:?} is out of bounds", range),
                        }),
                    };

                    if to_coordinator.send(WorkerMessage::Finished { index, outcome }).is_err() {
                        return;
                    }
                }
            })?;

        Ok(jh)
    }
}

/// Run the processor on one chunk, turning errors and panics into a failed outcome.
fn run_chunk(processor: &dyn ChunkProcessor, index: usize, rows: &[RawReport]) -> ChunkOutcome {
    let start = Instant::now();

    match panic::catch_unwind(AssertUnwindSafe(|| processor.process(index, rows))) {
        Ok(Ok(findings)) => {
            info!(target: "chunk",
                "chunk {} done in {:.2}s: {} rows, {} vessels, {} anomalies",
                index,
                start.elapsed().as_secs_f64(),
                findings.stats.rows,
                findings.stats.vessels,
                findings.stats.anomalies
            );
            ChunkOutcome::Completed(findings)
        }
        Ok(Err(err)) => ChunkOutcome::Failed(err),
        Err(payload) => {
            let msg = if let Some(msg) = payload.downcast_ref::<&str>() {
                msg.to_string()
            } else if let Some(msg) = payload.downcast_ref::<String>() {
                msg.clone()
            } else {
                "unknown panic".to_owned()
            };

            ChunkOutcome::Failed(SpoofError::ChunkPanicked { chunk: index, msg })
        }
    }
}
