// geolog/src/engine/scorer.rs
//
// Distance-threshold anomaly scoring.
//
// Every location of a traveler is measured against the traveler's geocenter.
// A location strictly farther than the alert distance becomes an Anomaly.
// Records come out in history order; the history itself is never touched.

use chrono::Utc;

use crate::error::AnalysisError;
use crate::events::{Anomaly, Traveler};
use crate::geo::distance::distance_km;

/// Score `traveler` against its geocenter. The alert list is replaced, so
/// rescoring never duplicates alerts. Returns the anomalies found.
pub fn score(traveler: &mut Traveler, threshold_km: f64) -> Result<Vec<Anomaly>, AnalysisError> {
    let geocenter = traveler.geocenter.as_ref().ok_or(AnalysisError::MissingGeocenter)?;
    let now = Utc::now();

    let found: Vec<Anomaly> = traveler
        .locations
        .iter()
        .filter_map(|loc| {
            let d = distance_km(loc.latitude(), loc.longitude(), geocenter.latitude, geocenter.longitude);
            (d > threshold_km).then(|| Anomaly {
                traveler_id:  traveler.id.clone(),
                period:       traveler.period,
                location:     loc.clone(),
                distance_km:  d,
                geocenter:    geocenter.clone(),
                threshold_km,
                detected_at:  now,
            })
        })
        .collect();

    traveler.alert_distance = threshold_km;
    traveler.alerts = found.clone();
    Ok(found)
}
