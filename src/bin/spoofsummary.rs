//! Documentation for the binary is with the definition of `SummaryOptionsInit` below.

use clap::Parser;
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use spoofwatch::{AnomalyReport, Mmsi, SpoofResult};
use std::{collections::HashMap, path::PathBuf};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Summarize a JSON report written by spoofwatch.
///
/// Lists the vessels with the most anomalies along with their fastest implied speed.
///
#[derive(Debug, Parser)]
#[clap(name = "spoofsummary")]
#[clap(author, version, about)]
struct SummaryOptionsInit {
    /// The path to the JSON report.
    #[clap(short, long)]
    #[clap(env = "SPOOFWATCH_REPORT")]
    report: PathBuf,

    /// How many vessels to list.
    #[clap(short, long)]
    #[clap(default_value_t = 10)]
    num: usize,
}

struct VesselTally {
    mmsi: Mmsi,
    anomalies: usize,
    max_speed: f64,
    first_seen: String,
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> SpoofResult<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).init()?;

    let SummaryOptionsInit { report, num } = SummaryOptionsInit::parse();

    let anomalies = AnomalyReport::read_json(&report)?;
    info!(
        "{} anomalies in {} chunks from {}",
        anomalies.anomaly_count(),
        anomalies.chunks.len(),
        report.display()
    );

    let failed = anomalies.failed_chunk_count();
    if failed > 0 {
        warn!("{} chunks failed, their vessels are not included", failed);
    }

    // A vessel can turn up in more than one chunk with row count partitioning.
    let mut tallies: HashMap<Mmsi, VesselTally> = HashMap::new();
    for (mmsi, vessel) in anomalies.chunks.iter().flatten().flat_map(|c| c.iter()) {
        for record in &vessel.anomalies {
            let tally = tallies.entry(*mmsi).or_insert_with(|| VesselTally {
                mmsi: *mmsi,
                anomalies: 0,
                max_speed: 0.0,
                first_seen: record.previous_timestamp.clone(),
            });

            tally.anomalies += 1;
            tally.max_speed = tally.max_speed.max(record.speed);
            if record.previous_timestamp < tally.first_seen {
                tally.first_seen = record.previous_timestamp.clone();
            }
        }
    }

    let mut tallies: Vec<VesselTally> = tallies.into_values().collect();
    tallies.sort_by(|a, b| {
        b.anomalies
            .cmp(&a.anomalies)
            .then_with(|| b.max_speed.total_cmp(&a.max_speed))
            .then_with(|| a.mmsi.cmp(&b.mmsi))
    });

    println!(
        "{:>10} {:>9} {:>16} {:>20}",
        "MMSI", "Anomalies", "Max Speed (km/h)", "First Seen"
    );
    for tally in tallies.iter().take(num) {
        println!(
            "{:>10} {:>9} {:>16.1} {:>20}",
            tally.mmsi.0, tally.anomalies, tally.max_speed, tally.first_seen
        );
    }

    Ok(())
}
