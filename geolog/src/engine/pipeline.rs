// geolog/src/engine/pipeline.rs
//
// Per-traveler analysis: estimate geocenter → reverse geocode (optional) → score.
//
// Travelers share nothing, so each one runs on its own tokio task that owns
// it outright. A semaphore caps how many are in flight. Outcomes are sent
// down an mpsc channel as soon as each traveler finishes, so alerts surface
// in completion order while the rest of the batch is still running.
//
// A traveler that cannot be estimated (empty history, zero total weight)
// becomes a Skipped outcome. It never aborts the batch.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::DetectionSection;
use crate::engine::scorer;
use crate::error::AnalysisError;
use crate::events::{Skipped, Traveler, TravelerOutcome};
use crate::geo::estimate_geocenter;
use crate::geocode::ReverseGeocoder;

pub struct Pipeline {
    threshold_km: f64,
    workers:      usize,
    geocoder:     Option<Arc<dyn ReverseGeocoder>>,
}

impl Pipeline {
    pub fn new(detection: &DetectionSection, geocoder: Option<Arc<dyn ReverseGeocoder>>) -> Self {
        Self {
            threshold_km: detection.alert_distance_km,
            workers:      detection.workers.max(1),
            geocoder,
        }
    }

    pub fn threshold_km(&self) -> f64 { self.threshold_km }

    fn estimate(&self, traveler: &mut Traveler) -> Result<(), AnalysisError> {
        let gc = estimate_geocenter(&traveler.locations)?;
        debug!(
            "{}: geocenter ({:.4}, {:.4}) frame={} avg_dist={:.0}km weight={}",
            traveler.key(), gc.latitude, gc.longitude, gc.frame, gc.avg_dist, gc.weight
        );
        traveler.geocenter = Some(gc);
        Ok(())
    }

    fn skipped(traveler: &Traveler, err: AnalysisError) -> TravelerOutcome {
        warn!("skipping {}: {}", traveler.key(), err);
        TravelerOutcome::Skipped(Skipped {
            key:       traveler.key(),
            reason:    err.to_string(),
            locations: traveler.locations.len(),
        })
    }

    fn score(&self, mut traveler: Traveler) -> TravelerOutcome {
        match scorer::score(&mut traveler, self.threshold_km) {
            Ok(_) => TravelerOutcome::Analyzed(traveler),
            Err(e) => Self::skipped(&traveler, e),
        }
    }

    /// Estimate and score one traveler without reverse geocoding.
    pub fn analyze(&self, mut traveler: Traveler) -> TravelerOutcome {
        match self.estimate(&mut traveler) {
            Ok(()) => self.score(traveler),
            Err(e) => Self::skipped(&traveler, e),
        }
    }

    /// Estimate, name the geocenter if a geocoder is configured, then score.
    pub async fn process(&self, mut traveler: Traveler) -> TravelerOutcome {
        if let Err(e) = self.estimate(&mut traveler) {
            return Self::skipped(&traveler, e);
        }
        if let Some(geocoder) = &self.geocoder {
            self.name_geocenter(geocoder.as_ref(), &mut traveler).await;
        }
        self.score(traveler)
    }

    // Failure leaves the locality empty; detection carries on.
    async fn name_geocenter(&self, geocoder: &dyn ReverseGeocoder, traveler: &mut Traveler) {
        let key = traveler.key();
        let Some(gc) = traveler.geocenter.as_mut() else { return };
        match geocoder.reverse_geocode(gc.latitude, gc.longitude).await {
            Ok(name) if !name.is_empty() => gc.locality = Some(name),
            Ok(_) => debug!("{}: no locality for geocenter", key),
            Err(e) => warn!("{}: reverse geocoding failed: {}", key, e),
        }
    }

    /// Analyze a batch concurrently, sending each outcome as it completes.
    /// Returns the number of outcomes produced.
    pub async fn run(self: Arc<Self>, travelers: Vec<Traveler>, tx: mpsc::Sender<TravelerOutcome>) -> usize {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for traveler in travelers {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else { break };
            let pipeline = Arc::clone(&self);
            let tx = tx.clone();
            tasks.spawn(async move {
                let outcome = pipeline.process(traveler).await;
                drop(permit);
                tx.send(outcome).await.is_ok()
            });
        }
        drop(tx);

        let mut produced = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => produced += 1,
                Ok(false) => debug!("outcome receiver closed"),
                Err(e) => warn!("traveler task failed: {}", e),
            }
        }
        produced
    }
}
