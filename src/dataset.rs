/*!
 * Loading the tabular dataset of position reports.
 */

use crate::{
    error::{SpoofError, SpoofResult},
    report::RawReport,
};
use log::{info, warn};
use std::{io::Read, path::Path};

/// The columns every dataset must have, the timestamp may be called either of two things.
const TIMESTAMP_COLUMNS: [&str; 2] = ["# Timestamp", "Timestamp"];
const REQUIRED_COLUMNS: [&str; 3] = ["MMSI", "Latitude", "Longitude"];

/// All the rows of a dataset, unparsed, in file order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub rows: Vec<RawReport>,
    /// Records the CSV reader itself could not make sense of (e.g. the wrong number of fields).
    pub unreadable_rows: usize,
}

impl Dataset {
    /// Read a CSV file with a header row.
    ///
    /// Failing to open the file, or the file lacking a required column, is an error. Individual
    /// records that can't be read are logged, counted and skipped.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> SpoofResult<Self> {
        let path = path.as_ref();

        let file = std::fs::File::open(path).map_err(|err| SpoofError::DatasetUnavailable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        let dataset = Self::from_reader(file)?;
        info!(target: "dataset",
            "Loaded {} rows from {} ({} unreadable).",
            dataset.rows.len(),
            path.display(),
            dataset.unreadable_rows
        );

        Ok(dataset)
    }

    /// Read CSV data with a header row from anything readable.
    pub fn from_reader<R: Read>(rdr: R) -> SpoofResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(rdr);

        let headers = reader.headers()?.clone();
        if !TIMESTAMP_COLUMNS.iter().any(|col| headers.iter().any(|h| h == *col)) {
            return Err(SpoofError::MissingColumn {
                column: TIMESTAMP_COLUMNS[0],
            }
            .into());
        }

        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(SpoofError::MissingColumn { column }.into());
            }
        }

        let mut rows = vec![];
        let mut unreadable_rows = 0;
        for (i, record) in reader.deserialize::<RawReport>().enumerate() {
            match record {
                Ok(row) => rows.push(row),
                Err(err) => {
                    // Line numbers start at 1 and the header is line 1.
                    warn!(target: "dataset", "Skipping record {}: {}", i + 2, err);
                    unreadable_rows += 1;
                }
            }
        }

        Ok(Dataset {
            rows,
            unreadable_rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
