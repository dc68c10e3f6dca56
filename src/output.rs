/*!
 * Writing (and reading back) the anomaly report.
 *
 * The file is a pretty printed JSON list with one entry per chunk, in chunk order. A chunk that
 * completed is an object mapping MMSI to `{"Anomalies": [...]}`, and is `{}` if it found nothing.
 * A chunk that failed is `null`.
 */

use crate::{anomaly::ChunkAnomalies, error::SpoofResult};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Anomalies gathered from every chunk of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnomalyReport {
    /// `None` for chunks that failed.
    pub chunks: Vec<Option<ChunkAnomalies>>,
}

impl AnomalyReport {
    pub fn anomaly_count(&self) -> usize {
        self.chunks
            .iter()
            .flatten()
            .flat_map(|chunk| chunk.values())
            .map(|vessel| vessel.anomalies.len())
            .sum()
    }

    pub fn failed_chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_none()).count()
    }

    /// Overwrite `path` with this report.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> SpoofResult<()> {
        let path = path.as_ref();

        let f = File::create(path)?;
        let mut writer = BufWriter::new(f);
        self.write_json_to(&mut writer)?;
        writer.flush()?;

        info!(target: "output",
            "Saved {} anomalies from {} chunks to {}",
            self.anomaly_count(),
            self.chunks.len(),
            path.display()
        );

        Ok(())
    }

    /// Write the report to anything.
    pub fn write_json_to<W: Write>(&self, writer: W) -> SpoofResult<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Load a report written by [AnomalyReport::write_json].
    pub fn read_json<P: AsRef<Path>>(path: P) -> SpoofResult<Self> {
        let f = File::open(path)?;
        let mut report: AnomalyReport = serde_json::from_reader(BufReader::new(f))?;

        // The identity isn't repeated inside each record, put it back.
        for chunk in report.chunks.iter_mut().flatten() {
            for (mmsi, vessel) in chunk.iter_mut() {
                for record in vessel.anomalies.iter_mut() {
                    record.mmsi = *mmsi;
                }
            }
        }

        Ok(report)
    }
}
