/*!
 * Geographic calculations.
 *
 * Only the great circle distance is needed for checking position reports, so it is implemented
 * here with the haversine formula on a spherical Earth.
 */

/// Mean radius of the Earth used for all distance calculations.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const DEG2RAD: f64 = std::f64::consts::PI / 180.0;

/**
 * The haversine great circle distance.
 *
 * No validation is done on the inputs, keeping them in range is up to the caller.
 *
 * #Arguments
 * * lat1 - the latitude of the first point in degrees.
 * * lon1 - the longitude of the first point in degrees.
 * * lat2 - the latitude of the second point in degrees.
 * * lon2 - the longitude of the second point in degrees.
 *
 * #Returns
 * The distance between the points in kilometers.
 */
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_r = lat1 * DEG2RAD;
    let lat2_r = lat2 * DEG2RAD;

    let dlat2 = (lat2_r - lat1_r) / 2.0;
    let dlon2 = (lon2 - lon1) * DEG2RAD / 2.0;

    let sin2_dlat = f64::powi(f64::sin(dlat2), 2);
    let sin2_dlon = f64::powi(f64::sin(dlon2), 2);

    // Rounding can push this a hair past 1 for antipodal points.
    let a = (sin2_dlat + f64::cos(lat1_r) * f64::cos(lat2_r) * sin2_dlon).clamp(0.0, 1.0);

    let arc = 2.0 * f64::atan2(f64::sqrt(a), f64::sqrt(1.0 - a));

    arc * EARTH_RADIUS_KM
}

/**
 * Element-wise great circle distance over parallel slices.
 *
 * All four slices should be the same length, if they are not the output is only as long as the
 * shortest of them.
 *
 * #Returns
 * A vector where element `i` is the distance in kilometers from `(lats1[i], lons1[i])` to
 * `(lats2[i], lons2[i])`.
 */
pub fn great_circle_distances(
    lats1: &[f64],
    lons1: &[f64],
    lats2: &[f64],
    lons2: &[f64],
) -> Vec<f64> {
    debug_assert!(
        lats1.len() == lons1.len() && lats1.len() == lats2.len() && lats1.len() == lons2.len()
    );

    lats1
        .iter()
        .zip(lons1)
        .zip(lats2.iter().zip(lons2))
        .map(|((&lat1, &lon1), (&lat2, &lon2))| great_circle_distance(lat1, lon1, lat2, lon2))
        .collect()
}
