//! Great-circle helpers on a spherical earth

/// Mean earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two WGS84 coordinates given in degrees
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Coordinate reached by travelling `distance` meters from a start point on an
/// initial bearing (degrees clockwise from north)
///
/// Returns `(latitude, longitude)` in degrees.
pub fn destination(lat: f64, lon: f64, bearing_degrees: f64, distance: f64) -> (f64, f64) {
    let angular = distance / EARTH_RADIUS_METERS;
    let bearing = bearing_degrees.to_radians();
    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

    (lat2.to_degrees(), lon2.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_one_degree_of_longitude_at_equator() {
        let dist = haversine_distance(0.0, 0.0, 0.0, 1.0);
        assert!((dist - 111_195.0).abs() < 200.0);
    }

    #[test]
    fn test_haversine_same_point_is_zero() {
        assert_eq!(haversine_distance(51.5, -0.12, 51.5, -0.12), 0.0);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = haversine_distance(52.2053, 0.1218, 52.2043, 0.1149);
        let b = haversine_distance(52.2043, 0.1149, 52.2053, 0.1218);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_destination_round_trips_distance() {
        let (lat, lon) = destination(52.2053, 0.1218, 90.0, 500.0);
        let dist = haversine_distance(52.2053, 0.1218, lat, lon);
        assert!((dist - 500.0).abs() < 0.01);

        let (lat, lon) = destination(-33.86, 151.21, 0.0, 1200.0);
        assert!(lat > -33.86);
        assert!((lon - 151.21).abs() < 1e-9);
    }
}
