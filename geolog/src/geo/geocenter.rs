// geolog/src/geo/geocenter.rs
//
// Weighted geocenter estimation across the antimeridian.
//
// A plain weighted mean of longitudes breaks at ±180°: 179° and -179° are 2°
// apart but average to 0°. Two candidate longitudes are therefore computed:
//
//   greenwich  — Σ(lon·w) / Σw
//   dateline   — switch(Σ(switch(lon)·w) / Σw)
//
// and the one whose weighted mean distance to the history is smaller wins.
// The wrong frame is pulled toward the discontinuity and always has the
// larger residual. Equal residuals resolve to greenwich.

use crate::error::AnalysisError;
use crate::events::{Geocenter, Location, MeridianFrame};
use crate::geo::distance::{distance_km, switch_meridian};

/// Estimate the weighted center of a non-empty, positively weighted history.
pub fn estimate_geocenter(locations: &[Location]) -> Result<Geocenter, AnalysisError> {
    if locations.is_empty() {
        return Err(AnalysisError::EmptyHistory);
    }

    // ── Pass 1: centroids in both frames ──────────────────────────────────────
    let mut total   = 0.0f64;
    let mut lat_sum = 0.0f64;
    let mut gw_sum  = 0.0f64;
    let mut dl_sum  = 0.0f64;

    for loc in locations {
        let w = loc.weight();
        total   += w;
        lat_sum += loc.latitude() * w;
        gw_sum  += loc.longitude() * w;
        dl_sum  += switch_meridian(loc.longitude()) * w;
    }

    if total <= 0.0 {
        return Err(AnalysisError::ZeroWeight(locations.len()));
    }

    let lat_c  = lat_sum / total;
    let lon_gw = gw_sum / total;
    let lon_dl = switch_meridian(dl_sum / total);

    if ![total, lat_c, lon_gw, lon_dl].iter().all(|v| v.is_finite()) {
        return Err(AnalysisError::NonFiniteWeight(locations.len()));
    }

    // ── Pass 2: pick the frame with the smaller mean residual ─────────────────
    let avg_gw = mean_distance(locations, lat_c, lon_gw, total);
    let avg_dl = mean_distance(locations, lat_c, lon_dl, total);

    let (longitude, avg_dist, frame) = if avg_dl < avg_gw {
        (lon_dl, avg_dl, MeridianFrame::Dateline)
    } else {
        (lon_gw, avg_gw, MeridianFrame::Greenwich)
    };
    if !avg_dist.is_finite() {
        return Err(AnalysisError::NonFiniteWeight(locations.len()));
    }

    Ok(Geocenter {
        latitude: lat_c,
        longitude,
        weight: total,
        avg_dist,
        frame,
        locality: None,
    })
}

fn mean_distance(locations: &[Location], lat: f64, lon: f64, total: f64) -> f64 {
    locations
        .iter()
        .map(|l| distance_km(l.latitude(), l.longitude(), lat, lon) * l.weight())
        .sum::<f64>()
        / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn loc(lat: f64, lon: f64, w: f64) -> Location {
        Location::new(
            "198.51.100.7".parse().unwrap(),
            NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            lat,
            lon,
            w,
            None,
        )
        .unwrap()
    }

    #[test]
    fn empty_history_is_rejected() {
        assert_eq!(estimate_geocenter(&[]), Err(AnalysisError::EmptyHistory));
    }

    #[test]
    fn zero_total_weight_is_rejected() {
        let locs = [loc(10.0, 10.0, 0.0), loc(20.0, 20.0, 0.0)];
        assert_eq!(estimate_geocenter(&locs), Err(AnalysisError::ZeroWeight(2)));
    }

    #[test]
    fn overflowing_weights_are_rejected() {
        assert_eq!(
            estimate_geocenter(&[loc(45.0, 100.0, 1e307)]),
            Err(AnalysisError::NonFiniteWeight(1))
        );
        let locs = [loc(37.77, -122.4, 1e308), loc(48.85, 2.35, 1e308), loc(-33.9, 151.2, 1.0)];
        assert_eq!(estimate_geocenter(&locs), Err(AnalysisError::NonFiniteWeight(3)));
    }

    #[test]
    fn single_location_is_its_own_center() {
        let gc = estimate_geocenter(&[loc(37.5, -122.25, 42.0)]).unwrap();
        assert_eq!(gc.latitude, 37.5);
        assert_eq!(gc.longitude, -122.25);
        assert_eq!(gc.avg_dist, 0.0);
        assert_eq!(gc.weight, 42.0);
    }

    #[test]
    fn identical_locations_collapse_to_that_point() {
        let locs = [loc(37.77, -122.4, 1.0), loc(37.77, -122.4, 2.0), loc(37.77, -122.4, 3.0)];
        let gc = estimate_geocenter(&locs).unwrap();
        assert!((gc.latitude - 37.77).abs() < 1e-9);
        assert!((gc.longitude + 122.4).abs() < 1e-9);
        assert!(gc.avg_dist < 1e-6);
        assert_eq!(gc.weight, 6.0);
    }

    #[test]
    fn zero_weight_points_do_not_pull_the_center() {
        let locs = [loc(40.0, -74.0, 5.0), loc(-33.0, 151.0, 0.0)];
        let gc = estimate_geocenter(&locs).unwrap();
        assert_eq!(gc.latitude, 40.0);
        assert_eq!(gc.longitude, -74.0);
    }

    #[test]
    fn straddling_the_antimeridian_selects_dateline_frame() {
        let gc = estimate_geocenter(&[loc(0.0, 179.0, 1.0), loc(0.0, -179.0, 1.0)]).unwrap();
        assert_eq!(gc.frame, MeridianFrame::Dateline);
        assert!(gc.longitude.abs() > 179.0, "got {}", gc.longitude);
        assert!(gc.avg_dist < 120.0, "got {}", gc.avg_dist);
    }

    #[test]
    fn dateline_cluster_in_the_pacific() {
        // Fiji, Tonga, Samoa
        let locs = [loc(-18.1, 178.4, 10.0), loc(-21.1, -175.2, 5.0), loc(-13.8, -171.8, 5.0)];
        let gc = estimate_geocenter(&locs).unwrap();
        assert_eq!(gc.frame, MeridianFrame::Dateline);
        assert!(gc.longitude > 170.0 || gc.longitude < -170.0, "got {}", gc.longitude);
    }

    #[test]
    fn europe_stays_in_greenwich_frame() {
        let locs = [loc(48.85, 2.35, 10.0), loc(51.5, -0.12, 10.0), loc(52.52, 13.4, 1.0)];
        let gc = estimate_geocenter(&locs).unwrap();
        assert_eq!(gc.frame, MeridianFrame::Greenwich);
        assert!((0.0..5.0).contains(&gc.longitude), "got {}", gc.longitude);
    }

    #[test]
    fn weights_pull_toward_the_heavy_location() {
        let locs = [loc(37.77, -122.4, 100.0), loc(48.85, 2.35, 1.0)];
        let gc = estimate_geocenter(&locs).unwrap();
        assert!((gc.latitude - 37.88).abs() < 0.1, "got {}", gc.latitude);
        assert!(gc.longitude < -115.0, "got {}", gc.longitude);
        assert!(gc.avg_dist > 0.0);
    }

    #[test]
    fn equal_residuals_prefer_greenwich() {
        // Both frames land on the same longitude, so the residuals tie.
        let locs = [loc(10.0, 45.0, 2.0), loc(10.0, 45.0, 2.0)];
        let gc = estimate_geocenter(&locs).unwrap();
        assert_eq!(gc.frame, MeridianFrame::Greenwich);
        assert_eq!(gc.longitude, 45.0);
    }

    #[test]
    fn estimation_is_idempotent() {
        let locs = [loc(35.7, 139.7, 3.0), loc(-33.9, 151.2, 7.0), loc(1.35, 103.8, 2.0)];
        let a = estimate_geocenter(&locs).unwrap();
        let b = estimate_geocenter(&locs).unwrap();
        assert_eq!(a.latitude.to_bits(), b.latitude.to_bits());
        assert_eq!(a.longitude.to_bits(), b.longitude.to_bits());
        assert_eq!(a.avg_dist.to_bits(), b.avg_dist.to_bits());
    }
}
