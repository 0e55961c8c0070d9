// geolog/src/report.rs
//
// Human-readable alert lines and the end-of-run summary (markdown or JSON).

use serde::Serialize;

use crate::events::{Anomaly, Skipped, TravelerOutcome};

/// One line per anomaly, in the report's historical wording.
pub fn alert_line(anomaly: &Anomaly) -> String {
    let loc = &anomaly.location;
    let month = anomaly.period.unwrap_or_else(|| loc.timestamp());
    let mut line = format!(
        "in {}, {} connected from {} {:.0} times; src ip {} was {:.0}km away from usual connection center",
        month.format("%Y/%m"),
        anomaly.traveler_id,
        loc.locality().unwrap_or(""),
        loc.weight(),
        loc.ip(),
        anomaly.distance_km,
    );
    if let Some(center) = anomaly.geocenter.locality.as_deref().filter(|c| !c.is_empty()) {
        line.push_str(" in ");
        line.push_str(center);
    }
    line
}

pub fn skipped_line(skipped: &Skipped) -> String {
    format!("skipped {}: {}", skipped.key, skipped.reason)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub travelers:          usize,
    pub analyzed:           usize,
    pub skipped:            usize,
    pub flagged_travelers:  usize,
    pub anomalies:          usize,
    pub records_accepted:   u64,
    pub records_rejected:   u64,
    pub threshold_km:       f64,
}

impl RunSummary {
    pub fn new(threshold_km: f64) -> Self {
        Self { threshold_km, ..Self::default() }
    }

    pub fn record(&mut self, outcome: &TravelerOutcome) {
        self.travelers += 1;
        match outcome {
            TravelerOutcome::Analyzed(t) => {
                self.analyzed += 1;
                self.anomalies += t.alerts.len();
                if !t.alerts.is_empty() {
                    self.flagged_travelers += 1;
                }
            }
            TravelerOutcome::Skipped(_) => self.skipped += 1,
        }
    }

    pub fn print_markdown(&self) {
        println!("# geolog run summary");
        println!();
        println!("**Threshold**: {:.0} km", self.threshold_km);
        println!();
        println!("| Metric            | Value  |");
        println!("|-------------------|--------|");
        println!("| Travelers         | {:<6} |", self.travelers);
        println!("| Analyzed          | {:<6} |", self.analyzed);
        println!("| Skipped           | {:<6} |", self.skipped);
        println!("| Flagged travelers | {:<6} |", self.flagged_travelers);
        println!("| Anomalies         | {:<6} |", self.anomalies);
        println!("| Records accepted  | {:<6} |", self.records_accepted);
        println!("| Records rejected  | {:<6} |", self.records_rejected);
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
