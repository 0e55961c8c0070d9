// geolog/src/geo/distance.rs
//
// Great-circle distance (haversine) and the meridian switch used to average
// longitudes in a frame centred on the dateline.
//
// The sphere radius is 6378 km. Anomaly thresholds are in the hundreds to
// thousands of km, so a spherical model is sufficient.

/// Sphere radius used by [`distance_km`], in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6378.0;

// haversin(θ) = sin²(θ/2)
fn hav(theta: f64) -> f64 {
    (theta / 2.0).sin().powi(2)
}

/// Great-circle distance in km between two points given in decimal degrees.
///
/// Inputs are expected to be valid WGS84 coordinates. Out-of-range input
/// yields a finite but meaningless result rather than a panic or NaN.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let la1 = lat1.to_radians();
    let lo1 = lon1.to_radians();
    let la2 = lat2.to_radians();
    let lo2 = lon2.to_radians();

    let h = hav(la2 - la1) + la1.cos() * la2.cos() * hav(lo2 - lo1);
    // Rounding can push h just past 1 for near-antipodal points.
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Re-express a longitude in the frame shifted by 180°.
///
/// Self-inverse on `[-180, 180)`. At the boundary `0 → -180`, `-180 → 0`
/// and `180 → 0`, so `180` round-trips to `-180` (the same meridian).
pub fn switch_meridian(lon: f64) -> f64 {
    if lon < 0.0 {
        lon + 180.0
    } else {
        lon - 180.0
    }
}
