//! Great-circle distance helpers.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Calculate the great-circle distance between two positions.
///
/// Uses the haversine formula for accuracy over short distances.
///
/// # Arguments
///
/// * `from` - First position as (latitude, longitude) in degrees
/// * `to` - Second position as (latitude, longitude) in degrees
///
/// # Returns
///
/// Distance in meters.
///
/// # Example
///
/// ```
/// use shiftgps::tracking::distance_meters;
///
/// // One degree of latitude is roughly 111 km
/// let dist = distance_meters((0.0, 0.0), (1.0, 0.0));
/// assert!((dist - 111_195.0).abs() < 10.0);
/// ```
pub fn distance_meters(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1 * DEG_TO_RAD;
    let lat2_rad = lat2 * DEG_TO_RAD;
    let delta_lat = (lat2 - lat1) * DEG_TO_RAD;
    let delta_lon = (lon2 - lon1) * DEG_TO_RAD;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Offset a position due north by `meters`.
///
/// Inverse of [`distance_meters`] along a meridian; handy for building
/// synthetic traces.
pub fn offset_north(from: (f64, f64), meters: f64) -> (f64, f64) {
    (from.0 + meters / (EARTH_RADIUS_M * DEG_TO_RAD), from.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        assert_eq!(distance_meters((48.85, 2.35), (48.85, 2.35)), 0.0);
    }

    #[test]
    fn test_offset_north_round_trips_through_distance() {
        let origin = (52.52, 13.405);
        for meters in [1.0, 40.0, 60.0, 1_500.0] {
            let moved = offset_north(origin, meters);
            let measured = distance_meters(origin, moved);
            assert!(
                (measured - meters).abs() < 0.01,
                "expected {meters}m, measured {measured}m"
            );
        }
    }

    #[test]
    fn test_known_city_pair() {
        // Berlin to Hamburg is roughly 255 km
        let berlin = (52.5200, 13.4050);
        let hamburg = (53.5511, 9.9937);
        let dist = distance_meters(berlin, hamburg);
        assert!((dist - 255_000.0).abs() < 3_000.0, "got {dist}");
    }

    #[test]
    fn test_symmetric() {
        let a = (40.7128, -74.0060);
        let b = (34.0522, -118.2437);
        assert!((distance_meters(a, b) - distance_meters(b, a)).abs() < 1e-6);
    }
}
