use crate::error::AppError;
use crate::models::location::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Assumed average courier speed in city traffic.
pub const AVERAGE_SPEED_KMH: f64 = 20.0;

/// Fixed time added to every ETA for handover at the store.
pub const PREPARATION_BUFFER_MINUTES: u32 = 10;

/// Upper bound (inclusive, km) and fee for each tier. Anything past the last
/// bound is charged the last fee.
const FEE_TIERS: [(f64, u32); 4] = [(5.0, 30), (10.0, 50), (20.0, 80), (30.0, 100)];
const MAX_FEE: u32 = 100;

pub fn validate_point(point: &GeoPoint) -> Result<(), AppError> {
    if !point.lat.is_finite() || !point.lng.is_finite() {
        return Err(AppError::InvalidCoordinate(format!(
            "non-finite coordinate ({}, {})",
            point.lat, point.lng
        )));
    }
    if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lng) {
        return Err(AppError::InvalidCoordinate(format!(
            "coordinate out of range ({}, {})",
            point.lat, point.lng
        )));
    }
    Ok(())
}

fn validate_distance(km: f64) -> Result<(), AppError> {
    if !km.is_finite() || km < 0.0 {
        return Err(AppError::InvalidCoordinate(format!("invalid distance {km}")));
    }
    Ok(())
}

/// Great-circle distance using the haversine formula.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> Result<f64, AppError> {
    validate_point(a)?;
    validate_point(b)?;

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.clamp(0.0, 1.0).sqrt().asin();

    Ok(EARTH_RADIUS_KM * central_angle)
}

pub fn fee_for_distance(km: f64) -> Result<u32, AppError> {
    validate_distance(km)?;

    let fee = FEE_TIERS
        .iter()
        .find(|(bound, _)| km <= *bound)
        .map(|(_, fee)| *fee)
        .unwrap_or(MAX_FEE);

    Ok(fee)
}

pub fn eta_minutes(km: f64) -> Result<u32, AppError> {
    validate_distance(km)?;

    let travel = (km / AVERAGE_SPEED_KMH * 60.0).ceil();
    if travel > f64::from(u32::MAX - PREPARATION_BUFFER_MINUTES) {
        return Err(AppError::InvalidCoordinate(format!(
            "distance {km} km is too far to estimate"
        )));
    }
    Ok(travel as u32 + PREPARATION_BUFFER_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::{distance_km, eta_minutes, fee_for_distance, PREPARATION_BUFFER_MINUTES};
    use crate::error::AppError;
    use crate::models::location::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(53.5511, 9.9937);
        let distance = distance_km(&p, &p).unwrap();
        assert!(distance < 1e-9);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let distance = distance_km(&london, &paris).unwrap();
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (GeoPoint::new(12.9716, 77.5946), GeoPoint::new(13.0827, 80.2707)),
            (GeoPoint::new(-33.8688, 151.2093), GeoPoint::new(40.7128, -74.0060)),
            (GeoPoint::new(0.0, 179.9), GeoPoint::new(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            let ab = distance_km(&a, &b).unwrap();
            let ba = distance_km(&b, &a).unwrap();
            assert!((ab - ba).abs() < 1e-9, "{ab} != {ba}");
        }
    }

    #[test]
    fn nan_coordinate_is_rejected() {
        let good = GeoPoint::new(10.0, 10.0);
        let bad = GeoPoint::new(f64::NAN, 10.0);
        assert!(matches!(
            distance_km(&good, &bad),
            Err(AppError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            distance_km(&GeoPoint::new(91.0, 0.0), &good),
            Err(AppError::InvalidCoordinate(_))
        ));
    }

    #[test]
    fn fee_tiers_match_documented_scenarios() {
        assert_eq!(fee_for_distance(4.2).unwrap(), 30);
        assert_eq!(fee_for_distance(5.0).unwrap(), 30);
        assert_eq!(fee_for_distance(7.5).unwrap(), 50);
        assert_eq!(fee_for_distance(12.0).unwrap(), 80);
        assert_eq!(fee_for_distance(25.0).unwrap(), 100);
        assert_eq!(fee_for_distance(45.0).unwrap(), 100);
    }

    #[test]
    fn fee_is_non_decreasing_and_capped() {
        let mut previous = 0;
        for step in 0..1_000 {
            let km = step as f64 * 0.1;
            let fee = fee_for_distance(km).unwrap();
            assert!(fee >= previous, "fee dropped at {km} km");
            assert!(fee <= 100);
            previous = fee;
        }
    }

    #[test]
    fn fee_rejects_invalid_distance() {
        assert!(fee_for_distance(f64::NAN).is_err());
        assert!(fee_for_distance(f64::INFINITY).is_err());
        assert!(fee_for_distance(-1.0).is_err());
    }

    #[test]
    fn eta_adds_preparation_buffer() {
        assert_eq!(eta_minutes(0.0).unwrap(), PREPARATION_BUFFER_MINUTES);
        // 10 km at 20 km/h is 30 minutes of travel.
        assert_eq!(eta_minutes(10.0).unwrap(), 30 + PREPARATION_BUFFER_MINUTES);
        assert_eq!(eta_minutes(0.1).unwrap(), 1 + PREPARATION_BUFFER_MINUTES);
    }

    #[test]
    fn eta_rejects_distances_past_the_minute_range() {
        assert!(matches!(eta_minutes(1.0e12), Err(AppError::InvalidCoordinate(_))));
        assert!(matches!(eta_minutes(f64::MAX), Err(AppError::InvalidCoordinate(_))));
        // Half way round the planet still has a plain answer.
        assert_eq!(eta_minutes(20_000.0).unwrap(), 60_000 + PREPARATION_BUFFER_MINUTES);
    }
}
