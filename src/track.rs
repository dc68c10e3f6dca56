/*!
 * Grouping position reports into per vessel tracks.
 */

use crate::report::{Mmsi, PositionReport};
use std::cmp::Ordering;

/**
 * All the reports for a single vessel within one chunk, in time order.
 *
 * Reports without a timestamp sort after all the others. A vessel whose reports are split across
 * chunks gets one track per chunk and nothing connects them.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct VesselTrack {
    pub mmsi: Mmsi,
    pub reports: Vec<PositionReport>,
}

impl VesselTrack {
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

/// Order by identity, then by timestamp with missing timestamps last.
fn track_order(left: &PositionReport, right: &PositionReport) -> Ordering {
    left.mmsi.cmp(&right.mmsi).then_with(|| match (left.timestamp, right.timestamp) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}

/**
 * Sort the reports of a chunk and split them into tracks.
 *
 * The sort is stable, so reports with identical timestamps keep the order they had in the file.
 *
 * #Returns
 * The tracks in ascending order of vessel identity.
 */
pub fn group_into_tracks(mut reports: Vec<PositionReport>) -> Vec<VesselTrack> {
    reports.sort_by(track_order);

    let mut tracks: Vec<VesselTrack> = vec![];
    for report in reports {
        match tracks.last_mut() {
            Some(track) if track.mmsi == report.mmsi => track.reports.push(report),
            _ => tracks.push(VesselTrack {
                mmsi: report.mmsi,
                reports: vec![report],
            }),
        }
    }

    tracks
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    fn report(mmsi: u32, minute: Option<u32>, lat: f64) -> PositionReport {
        PositionReport {
            mmsi: Mmsi(mmsi),
            timestamp: minute.map(|m| {
                NaiveDate::from_ymd_opt(2024, 12, 28)
                    .and_then(|d| d.and_hms_opt(10, m, 0))
                    .unwrap()
            }),
            lat: Some(lat),
            lon: Some(0.0),
            sog: None,
            cog: None,
        }
    }

    #[test]
    fn test_grouping_and_ordering() {
        let reports = vec![
            report(300, Some(5), 1.0),
            report(100, None, 2.0),
            report(100, Some(9), 3.0),
            report(300, Some(1), 4.0),
            report(100, Some(2), 5.0),
            report(200, Some(0), 6.0),
        ];

        let tracks = group_into_tracks(reports);
        let ids: Vec<u32> = tracks.iter().map(|t| t.mmsi.0).collect();
        assert_eq!(ids, vec![100, 200, 300]);

        let lats: Vec<f64> = tracks[0].reports.iter().filter_map(|r| r.lat).collect();
        assert_eq!(lats, vec![5.0, 3.0, 2.0]);
        assert_eq!(tracks[1].len(), 1);

        let lats: Vec<f64> = tracks[2].reports.iter().filter_map(|r| r.lat).collect();
        assert_eq!(lats, vec![4.0, 1.0]);
    }

    #[test]
    fn test_duplicate_timestamps_keep_file_order() {
        let reports = vec![report(7, Some(3), 1.0), report(7, Some(3), 2.0)];
        let tracks = group_into_tracks(reports);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].reports[0].lat, Some(1.0));
        assert_eq!(tracks[0].reports[1].lat, Some(2.0));
    }

    #[test]
    fn test_empty_chunk() {
        assert!(group_into_tracks(vec![]).is_empty());
    }
}
