//! Documentation for the binary is with the definition of `SpoofWatchOptionsInit` below.

use clap::Parser;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use spoofwatch::{
    default_worker_count, Dataset, DetectorConfig, ParallelExecutor, Partitioning, SpoofResult,
    DEFAULT_SPEED_THRESHOLD_KMH, DEFAULT_TIMESTAMP_FORMAT,
};
use std::{
    fmt::{self, Display},
    path::PathBuf,
    time::{Duration, Instant},
};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Flag likely GPS spoofing in AIS position reports.
///
/// Every pair of consecutive reports from the same vessel is checked, and if the speed needed to
/// get from one to the other is not believable the pair is written to a JSON report.
///
#[derive(Debug, Parser)]
#[clap(name = "spoofwatch")]
#[clap(author, version, about)]
struct SpoofWatchOptionsInit {
    /// The path to the CSV file with the position reports.
    ///
    /// If this is not specified, then the program will check for it in the "AIS_CSV" environment
    /// variable.
    #[clap(short, long)]
    #[clap(env = "AIS_CSV")]
    input: PathBuf,

    /// The path to the JSON report to produce from this run.
    ///
    /// If this is not specified, then "anomalies.json" in the same directory as the input is used.
    /// An existing file is overwritten.
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Speeds above this many km/h are flagged.
    #[clap(short, long)]
    #[clap(default_value_t=DEFAULT_SPEED_THRESHOLD_KMH)]
    threshold: f64,

    /// Number of chunks to split the dataset into. Defaults to the number of workers.
    #[clap(short, long)]
    chunks: Option<usize>,

    /// Number of worker threads. Defaults to one less than the number of CPUs.
    #[clap(short, long)]
    workers: Option<usize>,

    /// Give up on a chunk after this many seconds. By default chunks can take as long as they
    /// need.
    #[clap(long)]
    timeout: Option<f64>,

    /// chrono style format of the timestamp column.
    #[clap(long)]
    #[clap(default_value=DEFAULT_TIMESTAMP_FORMAT)]
    timestamp_format: String,

    /// How to split the dataset, "row-count" or "vessel-aware".
    ///
    /// With row-count a vessel's reports can be split between two chunks, and the step between
    /// the chunks is never checked. Vessel-aware keeps every vessel in a single chunk.
    #[clap(short, long)]
    #[clap(default_value = "row-count")]
    partitioning: Partitioning,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct SpoofWatchOptionsChecked {
    /// The path to the CSV file.
    input: PathBuf,

    /// The path to the JSON report.
    output: PathBuf,

    /// Everything the detection itself needs.
    config: DetectorConfig,

    /// Verbose output
    verbose: bool,
}

impl Display for SpoofWatchOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "          Input: {}", self.input.display())?;
        writeln!(f, "         Output: {}", self.output.display())?;
        write!(f, "{}", self.config)?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables and defaults.
fn parse_args() -> SpoofResult<SpoofWatchOptionsChecked> {
    check_args(SpoofWatchOptionsInit::parse())
}

fn check_args(init: SpoofWatchOptionsInit) -> SpoofResult<SpoofWatchOptionsChecked> {
    let SpoofWatchOptionsInit {
        input,
        output,
        threshold,
        chunks,
        workers,
        timeout,
        timestamp_format,
        partitioning,
        verbose,
    } = init;

    let output = match output {
        Some(v) => v,
        None => input.with_file_name("anomalies.json"),
    };

    if !threshold.is_finite() || threshold < 0.0 {
        return Err(format!("Invalid speed threshold: {}", threshold).into());
    }

    let chunk_timeout = match timeout {
        Some(secs) if secs > 0.0 => match Duration::try_from_secs_f64(secs) {
            Ok(timeout) => Some(timeout),
            Err(err) => return Err(format!("Invalid chunk timeout {}: {}", secs, err).into()),
        },
        Some(secs) => return Err(format!("Invalid chunk timeout: {}", secs).into()),
        None => None,
    };

    let worker_count = workers.unwrap_or_else(default_worker_count).max(1);
    let chunk_count = chunks.unwrap_or(worker_count).max(1);

    let config = DetectorConfig {
        speed_threshold_kmh: threshold,
        chunk_count,
        worker_count,
        chunk_timeout,
        timestamp_format,
        partitioning,
    };

    Ok(SpoofWatchOptionsChecked {
        input,
        output,
        config,
        verbose,
    })
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> SpoofResult<()> {
    // Debug messages are only let through once we know --verbose was given.
    SimpleLogger::new().with_level(LevelFilter::Debug).init()?;
    log::set_max_level(LevelFilter::Info);

    let opts = match parse_args() {
        Ok(opts) => opts,
        Err(err) => {
            error!(target: "startup", "Terminated early, bad options: {}", err);
            return Err(err);
        }
    };

    if opts.verbose {
        log::set_max_level(LevelFilter::Debug);
        info!(target: "startup", "{}", opts);
    }

    let start = Instant::now();
    let res = run(&opts);
    let total_time = start.elapsed().as_secs_f64();

    match res {
        Ok(()) => {
            info!(target: "summary", "Total execution time: {:.2} seconds.", total_time);
            Ok(())
        }
        Err(err) => {
            error!(target: "summary", "Terminated early after {:.2} seconds: {}", total_time, err);
            Err(err)
        }
    }
}

fn run(opts: &SpoofWatchOptionsChecked) -> SpoofResult<()> {
    info!(target: "startup", "Reading {}", opts.input.display());
    let dataset = Dataset::from_csv_path(&opts.input)?;

    let executor = ParallelExecutor::new(opts.config.clone());

    info!(target: "startup", "Starting data processing and anomaly detection...");
    let start = Instant::now();
    let summary = executor.run(dataset)?;
    info!(target: "summary",
        "Data processing completed in {:.2} seconds.",
        start.elapsed().as_secs_f64()
    );

    for failed in summary.failed_chunks() {
        if let spoofwatch::ChunkOutcome::Failed(ref err) = failed.outcome {
            error!(target: "summary",
                "chunk {} (rows {}..{}) FAILED: {}",
                failed.index, failed.rows.start, failed.rows.end, err
            );
        }
    }

    summary.anomaly_report().write_json(&opts.output)?;

    info!(target: "summary", "");
    for line in summary.to_string().lines() {
        info!(target: "summary", "{}", line);
    }
    info!(target: "summary", "");

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn init() -> SpoofWatchOptionsInit {
        SpoofWatchOptionsInit {
            input: PathBuf::from("/data/aisdk-2024-12-28.csv"),
            output: None,
            threshold: DEFAULT_SPEED_THRESHOLD_KMH,
            chunks: None,
            workers: Some(3),
            timeout: None,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_owned(),
            partitioning: Partitioning::RowCount,
            verbose: false,
        }
    }

    #[test]
    fn test_defaults_filled_in() {
        let checked = check_args(init()).unwrap();
        assert_eq!(checked.output, PathBuf::from("/data/anomalies.json"));
        assert_eq!(checked.config.worker_count, 3);
        assert_eq!(checked.config.chunk_count, 3);
        assert_eq!(checked.config.chunk_timeout, None);
    }

    #[test]
    fn test_timeouts() {
        let checked = check_args(SpoofWatchOptionsInit {
            timeout: Some(2.5),
            ..init()
        })
        .unwrap();
        assert_eq!(checked.config.chunk_timeout, Some(Duration::from_millis(2500)));

        for bad in [1.0e20, f64::INFINITY, f64::NAN, 0.0, -1.0] {
            let res = check_args(SpoofWatchOptionsInit {
                timeout: Some(bad),
                ..init()
            });
            assert!(res.is_err(), "timeout {}", bad);
        }
    }

    #[test]
    fn test_bad_threshold() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let res = check_args(SpoofWatchOptionsInit {
                threshold: bad,
                ..init()
            });
            assert!(res.is_err(), "threshold {}", bad);
        }
    }
}
