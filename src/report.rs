/*!
 * Vessel position reports.
 *
 * A [RawReport] is a row exactly as it was read from the dataset, every field still text. Turning
 * it into a [PositionReport] happens inside the chunk workers so that a bad row only affects the
 * chunk it lives in.
 */

use crate::error::SpoofError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// AIS uses this latitude when the position is not available.
pub const LATITUDE_NOT_AVAILABLE: f64 = 91.0;
/// AIS uses this longitude when the position is not available.
pub const LONGITUDE_NOT_AVAILABLE: f64 = 181.0;

/// Vessel identity (the MMSI of the transmitter).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Mmsi(pub u32);

impl Display for Mmsi {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.0)
    }
}

/// One row of the dataset before any parsing.
///
/// Column names follow the Danish Maritime Authority AIS exports. Any other columns in the file
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawReport {
    #[serde(rename = "# Timestamp", alias = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "MMSI")]
    pub mmsi: String,
    #[serde(rename = "Latitude")]
    pub latitude: String,
    #[serde(rename = "Longitude")]
    pub longitude: String,
    #[serde(rename = "SOG", default)]
    pub sog: Option<String>,
    #[serde(rename = "COG", default)]
    pub cog: Option<String>,
}

/// A parsed position report.
///
/// Missing values are kept as `None` so they can be handled explicitly further down the line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionReport {
    pub mmsi: Mmsi,
    pub timestamp: Option<NaiveDateTime>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Reported speed over ground in knots, passed through but not used for detection.
    pub sog: Option<f64>,
    /// Reported course over ground in degrees, passed through but not used for detection.
    pub cog: Option<f64>,
}

impl PositionReport {
    /// Parse a raw row.
    ///
    /// Empty fields become `None`. So do the AIS "not available" coordinates. A coordinate that is
    /// there but isn't a number is an error, as is an unparseable identity or timestamp.
    pub fn parse(raw: &RawReport, timestamp_format: &str) -> Result<Self, SpoofError> {
        let mmsi = raw
            .mmsi
            .trim()
            .parse::<u32>()
            .map(Mmsi)
            .map_err(|_| SpoofError::MalformedIdentity {
                value: raw.mmsi.clone(),
            })?;

        let timestamp = match raw.timestamp.trim() {
            "" => None,
            ts => Some(NaiveDateTime::parse_from_str(ts, timestamp_format).map_err(|_| {
                SpoofError::MalformedTimestamp {
                    value: raw.timestamp.clone(),
                }
            })?),
        };

        let lat = parse_coordinate(&raw.latitude, "latitude")?
            .filter(|&lat| lat != LATITUDE_NOT_AVAILABLE);
        let lon = parse_coordinate(&raw.longitude, "longitude")?
            .filter(|&lon| lon != LONGITUDE_NOT_AVAILABLE);

        // These are never used, so don't fail over them.
        let sog = raw.sog.as_deref().and_then(|v| v.trim().parse().ok());
        let cog = raw.cog.as_deref().and_then(|v| v.trim().parse().ok());

        Ok(PositionReport {
            mmsi,
            timestamp,
            lat,
            lon,
            sog,
            cog,
        })
    }

    /// The timestamp and both coordinates, if they are all present.
    pub fn fix(&self) -> Option<(NaiveDateTime, f64, f64)> {
        Some((self.timestamp?, self.lat?, self.lon?))
    }

    /// True if either coordinate is missing.
    pub fn is_missing_coordinate(&self) -> bool {
        self.lat.is_none() || self.lon.is_none()
    }
}

fn parse_coordinate(value: &str, column: &'static str) -> Result<Option<f64>, SpoofError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(v) if v.is_nan() => Ok(None),
        _ => Err(SpoofError::NonNumericCoordinate {
            column,
            value: value.to_owned(),
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const FMT: &str = "%d/%m/%Y %H:%M:%S";

    fn raw(ts: &str, mmsi: &str, lat: &str, lon: &str) -> RawReport {
        RawReport {
            timestamp: ts.to_owned(),
            mmsi: mmsi.to_owned(),
            latitude: lat.to_owned(),
            longitude: lon.to_owned(),
            sog: None,
            cog: None,
        }
    }

    #[test]
    fn test_parse_complete_row() {
        let mut row = raw("28/12/2024 10:15:30", "219000123", "55.6761", "12.5683");
        row.sog = Some("12.3".to_owned());
        row.cog = Some("".to_owned());

        let report = PositionReport::parse(&row, FMT).unwrap();
        assert_eq!(report.mmsi, Mmsi(219000123));
        assert_eq!(
            report.timestamp,
            Some(NaiveDateTime::parse_from_str("28/12/2024 10:15:30", FMT).unwrap())
        );
        assert_eq!(report.lat, Some(55.6761));
        assert_eq!(report.lon, Some(12.5683));
        assert_eq!(report.sog, Some(12.3));
        assert_eq!(report.cog, None);
        assert!(report.fix().is_some());
    }

    #[test]
    fn test_missing_values_are_none() {
        let report = PositionReport::parse(&raw("", "1", " ", ""), FMT).unwrap();
        assert_eq!(report.timestamp, None);
        assert_eq!(report.lat, None);
        assert_eq!(report.lon, None);
        assert!(report.is_missing_coordinate());
        assert!(report.fix().is_none());

        let row = raw("28/12/2024 10:15:30", "1", "NaN", "3.0");
        let report = PositionReport::parse(&row, FMT).unwrap();
        assert_eq!(report.lat, None);
        assert_eq!(report.lon, Some(3.0));
    }

    #[test]
    fn test_not_available_sentinels() {
        let report =
            PositionReport::parse(&raw("28/12/2024 10:15:30", "1", "91.0", "181"), FMT).unwrap();
        assert_eq!(report.lat, None);
        assert_eq!(report.lon, None);
    }

    #[test]
    fn test_malformed_fields() {
        let row = raw("2024-12-28T10:15", "1", "1.0", "1.0");
        let err = PositionReport::parse(&row, FMT).unwrap_err();
        assert!(matches!(err, SpoofError::MalformedTimestamp { .. }));

        let err = PositionReport::parse(&raw("", "abc", "1.0", "1.0"), FMT).unwrap_err();
        assert!(matches!(err, SpoofError::MalformedIdentity { .. }));

        let err = PositionReport::parse(&raw("", "1", "north", "1.0"), FMT).unwrap_err();
        assert_eq!(
            err,
            SpoofError::NonNumericCoordinate {
                column: "latitude",
                value: "north".to_owned()
            }
        );
    }
}
