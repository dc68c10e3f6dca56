/*!
 * Flag implausible speeds and describe them.
 */

use crate::{
    report::{Mmsi, PositionReport},
    speed::SpeedEstimate,
    track::VesselTrack,
};
use chrono::NaiveDateTime;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::Display;

/// Format used for every timestamp written in an [AnomalyRecord].
pub const OUTPUT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Anything faster than this (km/h) is not a believable vessel speed.
pub const DEFAULT_SPEED_THRESHOLD_KMH: f64 = 50.0;

/// Why a pair of reports was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum AnomalyReason {
    #[serde(rename = "Implausible speed")]
    #[strum(serialize = "Implausible speed")]
    ImplausibleSpeed,
}

/**
 * A pair of consecutive reports from one vessel that can't both be right.
 *
 * Field names are written out in PascalCase, e.g. `PreviousTimestamp` and `DistanceKm`.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnomalyRecord {
    /// Not written out, the report is keyed by identity already.
    #[serde(skip)]
    pub mmsi: Mmsi,
    pub previous_timestamp: String,
    pub current_timestamp: String,
    pub previous_latitude: f64,
    pub previous_longitude: f64,
    pub current_latitude: f64,
    pub current_longitude: f64,
    pub distance_km: f64,
    pub reason: AnomalyReason,
    /// Derived speed in km/h.
    pub speed: f64,
}

/// The anomalies for one vessel in detection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VesselAnomalies {
    #[serde(rename = "Anomalies")]
    pub anomalies: Vec<AnomalyRecord>,
}

/// Everything a single chunk found, keyed by vessel so it iterates in identity order.
pub type ChunkAnomalies = BTreeMap<Mmsi, VesselAnomalies>;

/// Applies the speed threshold to a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyClassifier {
    speed_threshold_kmh: f64,
}

impl Default for AnomalyClassifier {
    fn default() -> Self {
        AnomalyClassifier::new(DEFAULT_SPEED_THRESHOLD_KMH)
    }
}

impl AnomalyClassifier {
    pub fn new(speed_threshold_kmh: f64) -> Self {
        AnomalyClassifier {
            speed_threshold_kmh,
        }
    }

    /**
     * Check every estimate in a track against the threshold.
     *
     * #Arguments
     * * track - the time ordered reports for one vessel.
     * * estimates - the output of [estimate_speeds](crate::estimate_speeds) for that track, one
     *   per report.
     *
     * #Returns
     * The anomalies in the order they occur in the track.
     */
    pub fn classify(
        &self,
        track: &VesselTrack,
        estimates: &[SpeedEstimate],
    ) -> Vec<AnomalyRecord> {
        debug_assert_eq!(track.reports.len(), estimates.len());

        let mut anomalies = vec![];

        for (i, estimate) in estimates.iter().enumerate() {
            if let SpeedEstimate::NonFinite {
                distance_km,
                elapsed_hours,
            } = estimate
            {
                warn!(target: "anomaly",
                    "Non-finite speed for MMSI {} at index {} ({:.3} km in {:e} h), skipping.",
                    track.mmsi, i, distance_km, elapsed_hours
                );
                continue;
            }

            let sample = match estimate.sample() {
                Some(sample) => sample,
                None => continue,
            };

            if sample.speed_kmh <= self.speed_threshold_kmh {
                continue;
            }

            // An index of 0 never has a valid sample, but don't count on it.
            let prev = match i.checked_sub(1).and_then(|p| track.reports.get(p)) {
                Some(prev) => prev,
                None => continue,
            };
            let curr = &track.reports[i];

            let record = build_record(track.mmsi, prev, curr, sample.distance_km, sample.speed_kmh);
            if let Some(record) = record {
                info!(target: "anomaly",
                    "Detected anomaly for MMSI {} at {}: Speed {:.1} km/h",
                    record.mmsi, record.current_timestamp, record.speed
                );
                anomalies.push(record);
            }
        }

        anomalies
    }
}

fn build_record(
    mmsi: Mmsi,
    prev: &PositionReport,
    curr: &PositionReport,
    distance_km: f64,
    speed: f64,
) -> Option<AnomalyRecord> {
    let (prev_time, prev_lat, prev_lon) = prev.fix()?;
    let (curr_time, curr_lat, curr_lon) = curr.fix()?;

    Some(AnomalyRecord {
        mmsi,
        previous_timestamp: format_timestamp(prev_time),
        current_timestamp: format_timestamp(curr_time),
        previous_latitude: prev_lat,
        previous_longitude: prev_lon,
        current_latitude: curr_lat,
        current_longitude: curr_lon,
        distance_km,
        reason: AnomalyReason::ImplausibleSpeed,
        speed,
    })
}

fn format_timestamp(time: NaiveDateTime) -> String {
    time.format(OUTPUT_TIME_FORMAT).to_string()
}
