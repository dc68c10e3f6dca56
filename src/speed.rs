/*!
 * Derived speed between consecutive reports of a track.
 */

use crate::{geo::great_circle_distances, track::VesselTrack};

/// Distance, elapsed time, and the speed derived from them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSample {
    /// Great circle distance in kilometers.
    pub distance_km: f64,
    /// Time between the reports in hours.
    pub elapsed_hours: f64,
    /// Derived speed in kilometers per hour.
    pub speed_kmh: f64,
}

/**
 * The outcome of deriving a speed for one report from its predecessor.
 *
 * Only [SpeedEstimate::Valid] carries a sample, every other variant is a reason there isn't one.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedEstimate {
    /// The first report in a track has nothing to compare against.
    NoPredecessor,
    /// A timestamp or coordinate is missing on one of the two reports.
    Missing,
    /// Both reports have the same timestamp, so no division was attempted.
    ZeroElapsed { distance_km: f64 },
    /// The division happened but did not produce a finite number.
    NonFinite { distance_km: f64, elapsed_hours: f64 },
    Valid(SpeedSample),
}

impl SpeedEstimate {
    pub fn sample(&self) -> Option<&SpeedSample> {
        match self {
            SpeedEstimate::Valid(sample) => Some(sample),
            _ => None,
        }
    }
}

/// Convert a (possibly zero) elapsed time and a distance into an estimate.
pub fn derive_speed(distance_km: f64, elapsed_hours: f64) -> SpeedEstimate {
    if elapsed_hours == 0.0 {
        return SpeedEstimate::ZeroElapsed { distance_km };
    }

    let speed_kmh = distance_km / elapsed_hours;
    if !speed_kmh.is_finite() || !distance_km.is_finite() {
        return SpeedEstimate::NonFinite {
            distance_km,
            elapsed_hours,
        };
    }

    SpeedEstimate::Valid(SpeedSample {
        distance_km,
        elapsed_hours,
        speed_kmh,
    })
}

/**
 * Estimate the speed for every report in a time ordered track.
 *
 * All the pairs with complete data have their distances computed in a single batch.
 *
 * #Returns
 * One estimate per report, in the same order as the reports in the track. The first one is always
 * [SpeedEstimate::NoPredecessor].
 */
pub fn estimate_speeds(track: &VesselTrack) -> Vec<SpeedEstimate> {
    let n = track.reports.len();
    let mut estimates = vec![SpeedEstimate::Missing; n];
    if n == 0 {
        return estimates;
    }
    estimates[0] = SpeedEstimate::NoPredecessor;

    let mut pairs: Vec<(usize, f64)> = Vec::with_capacity(n - 1);
    let mut lats1 = Vec::with_capacity(n - 1);
    let mut lons1 = Vec::with_capacity(n - 1);
    let mut lats2 = Vec::with_capacity(n - 1);
    let mut lons2 = Vec::with_capacity(n - 1);

    for (i, window) in track.reports.windows(2).enumerate() {
        let (prev, curr) = match (window[0].fix(), window[1].fix()) {
            (Some(prev), Some(curr)) => (prev, curr),
            _ => continue,
        };

        let elapsed = curr.0 - prev.0;
        let elapsed_hours = match elapsed.num_nanoseconds() {
            Some(ns) => ns as f64 / 3.6e12,
            None => elapsed.num_seconds() as f64 / 3600.0,
        };

        pairs.push((i + 1, elapsed_hours));
        lats1.push(prev.1);
        lons1.push(prev.2);
        lats2.push(curr.1);
        lons2.push(curr.2);
    }

    let distances = great_circle_distances(&lats1, &lons1, &lats2, &lons2);
    for ((idx, elapsed_hours), distance_km) in pairs.into_iter().zip(distances) {
        estimates[idx] = derive_speed(distance_km, elapsed_hours);
    }

    estimates
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::report::{Mmsi, PositionReport};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 12, 28)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    fn report(offset: Duration, lat: Option<f64>, lon: Option<f64>) -> PositionReport {
        PositionReport {
            mmsi: Mmsi(219000001),
            timestamp: Some(start() + offset),
            lat,
            lon,
            sog: None,
            cog: None,
        }
    }

    fn track(reports: Vec<PositionReport>) -> VesselTrack {
        VesselTrack {
            mmsi: Mmsi(219000001),
            reports,
        }
    }

    #[test]
    fn test_one_hour_reference() {
        let t = track(vec![
            report(Duration::zero(), Some(55.6761), Some(12.5683)),
            report(Duration::hours(1), Some(55.6861), Some(12.5783)),
        ]);

        let estimates = estimate_speeds(&t);
        assert_eq!(estimates.len(), 2);
        assert_eq!(estimates[0], SpeedEstimate::NoPredecessor);

        let sample = estimates[1].sample().unwrap();
        assert!((sample.elapsed_hours - 1.0).abs() < 1.0e-12);
        assert!(sample.distance_km > 1.2 && sample.distance_km < 1.3);
        assert!((sample.speed_kmh - sample.distance_km).abs() < 1.0e-9);
    }

    #[test]
    fn test_single_report_has_no_samples() {
        let t = track(vec![report(Duration::zero(), Some(1.0), Some(1.0))]);
        let estimates = estimate_speeds(&t);
        assert_eq!(estimates, vec![SpeedEstimate::NoPredecessor]);
        assert!(estimate_speeds(&track(vec![])).is_empty());
    }

    #[test]
    fn test_zero_elapsed_is_guarded() {
        let t = track(vec![
            report(Duration::zero(), Some(55.0), Some(12.0)),
            report(Duration::zero(), Some(60.0), Some(20.0)),
        ]);

        let estimates = estimate_speeds(&t);
        match estimates[1] {
            SpeedEstimate::ZeroElapsed { distance_km } => assert!(distance_km > 0.0),
            other => panic!("unexpected estimate {:?}", other),
        }
        assert!(estimates[1].sample().is_none());
    }

    #[test]
    fn test_missing_fields_are_not_errors() {
        let mut no_time = report(Duration::minutes(2), Some(55.0), Some(12.0));
        no_time.timestamp = None;

        let t = track(vec![
            report(Duration::zero(), Some(55.0), Some(12.0)),
            report(Duration::minutes(1), None, Some(12.0)),
            report(Duration::minutes(1), Some(55.0), Some(12.1)),
            no_time,
        ]);

        let estimates = estimate_speeds(&t);
        assert_eq!(estimates[1], SpeedEstimate::Missing);
        assert_eq!(estimates[2], SpeedEstimate::Missing);
        assert_eq!(estimates[3], SpeedEstimate::Missing);
    }

    #[test]
    fn test_non_finite_is_detected() {
        // A subnormal elapsed time turns any real distance into infinity.
        match derive_speed(500.0, f64::MIN_POSITIVE / 1.0e10) {
            SpeedEstimate::NonFinite { distance_km, .. } => assert_eq!(distance_km, 500.0),
            other => panic!("unexpected estimate {:?}", other),
        }

        assert!(matches!(
            derive_speed(f64::NAN, 1.0),
            SpeedEstimate::NonFinite { .. }
        ));
    }
}
