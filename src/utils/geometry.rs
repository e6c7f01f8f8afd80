use crate::models::Bounds;
use crate::traits::CameraPose;
use std::time::Duration;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Closest the orbit camera gets, in metres.
pub const MIN_ORBIT_RANGE_M: f64 = 1_500.0;
const ORBIT_RANGE_FACTOR: f64 = 1.8;
pub const ORBIT_PITCH_DEG: f64 = -35.0;

/// Great-circle distance in metres between two lon/lat points (degrees).
pub fn haversine_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let rlat1 = lat1.to_radians();
    let rlat2 = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + rlat1.cos() * rlat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Camera distance that keeps the whole of `bounds` in view while orbiting.
pub fn orbit_range(bounds: &Bounds) -> f64 {
    let sw = bounds.south_west();
    let ne = bounds.north_east();
    let diagonal = haversine_m(sw.lon, sw.lat, ne.lon, ne.lat);
    diagonal.max(MIN_ORBIT_RANGE_M) * ORBIT_RANGE_FACTOR
}

/// Pose `elapsed` into an orbit of `bounds` lasting `period`: one full turn
/// of heading per period, starting north.
pub fn orbit_pose(bounds: &Bounds, elapsed: Duration, period: Duration) -> CameraPose {
    let fraction = if period.is_zero() {
        0.0
    } else {
        elapsed.as_secs_f64() / period.as_secs_f64()
    };
    CameraPose {
        target: bounds.center(),
        heading_deg: (fraction * 360.0).rem_euclid(360.0),
        pitch_deg: ORBIT_PITCH_DEG,
        range_m: orbit_range(bounds),
    }
}
