// geolog/src/engine/dispatcher.rs
//
// Writes outcomes to JSONL files under the output directory:
//
//   anomalies.jsonl  — one Anomaly per line
//   travelers.jsonl  — every analyzed Traveler (history, geocenter, alerts); map renderers read this
//   skipped.jsonl    — travelers that could not be analyzed, with the reason
//   summary.json     — run totals, rewritten at the end of the run
//
// Files are appended to, so consecutive runs into the same directory accumulate.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::events::TravelerOutcome;
use crate::report::RunSummary;

pub const ANOMALIES_FILE: &str = "anomalies.jsonl";
pub const TRAVELERS_FILE: &str = "travelers.jsonl";
pub const SKIPPED_FILE:   &str = "skipped.jsonl";
pub const SUMMARY_FILE:   &str = "summary.json";

pub struct Dispatcher {
    out: PathBuf,
}

impl Dispatcher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let out: PathBuf = output_dir.into();
        std::fs::create_dir_all(&out)
            .with_context(|| format!("creating output directory {}", out.display()))?;
        Ok(Self { out })
    }

    pub fn dir(&self) -> &Path { &self.out }

    pub async fn dispatch(&self, outcome: &TravelerOutcome) -> Result<()> {
        match outcome {
            TravelerOutcome::Analyzed(traveler) => {
                if !traveler.alerts.is_empty() {
                    let lines: String = traveler.alerts.iter().map(|a| a.to_jsonl() + "\n").collect();
                    self.write(ANOMALIES_FILE, &lines).await?;
                }
                self.write(TRAVELERS_FILE, &(traveler.to_jsonl() + "\n")).await?;
                debug!("dispatched {} ({} alerts)", traveler.key(), traveler.alerts.len());
            }
            TravelerOutcome::Skipped(skipped) => {
                self.write(SKIPPED_FILE, &(serde_json::to_string(skipped)? + "\n")).await?;
            }
        }
        Ok(())
    }

    pub async fn write_summary(&self, summary: &RunSummary) -> Result<()> {
        let body = serde_json::to_string_pretty(summary)?;
        tokio::fs::write(self.out.join(SUMMARY_FILE), body).await?;
        Ok(())
    }

    async fn write(&self, file: &str, content: &str) -> Result<()> {
        let mut f = OpenOptions::new().create(true).append(true)
            .open(self.out.join(file)).await?;
        f.write_all(content.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Location, Skipped, Traveler, TravelerKey};
    use crate::geo::estimate_geocenter;
    use crate::engine::scorer;
    use chrono::NaiveDate;

    fn analyzed() -> TravelerOutcome {
        let month = NaiveDate::from_ymd_opt(2015, 3, 1).unwrap();
        let mk = |ip: &str, lat, lon, w| Location::new(ip.parse().unwrap(), month, lat, lon, w, None).unwrap();
        let mut t = Traveler::new("alice", Some(month))
            .with_locations(vec![mk("203.0.113.10", 37.77, -122.4, 100.0), mk("198.51.100.20", 48.85, 2.35, 1.0)]);
        t.geocenter = Some(estimate_geocenter(&t.locations).unwrap());
        scorer::score(&mut t, 5000.0).unwrap();
        TravelerOutcome::Analyzed(t)
    }

    #[tokio::test]
    async fn writes_one_file_per_stream() {
        let dir = tempfile::tempdir().unwrap();
        let d = Dispatcher::new(dir.path().join("out")).unwrap();

        d.dispatch(&analyzed()).await.unwrap();
        d.dispatch(&TravelerOutcome::Skipped(Skipped {
            key:       TravelerKey { user: "ghost".into(), period: None },
            reason:    "empty location history".into(),
            locations: 0,
        }))
        .await
        .unwrap();

        let anomalies = std::fs::read_to_string(d.dir().join(ANOMALIES_FILE)).unwrap();
        assert_eq!(anomalies.lines().count(), 1);
        let v: serde_json::Value = serde_json::from_str(anomalies.trim()).unwrap();
        assert_eq!(v["traveler_id"], "alice");
        assert_eq!(v["location"]["ip"], "198.51.100.20");

        let travelers = std::fs::read_to_string(d.dir().join(TRAVELERS_FILE)).unwrap();
        let v: serde_json::Value = serde_json::from_str(travelers.trim()).unwrap();
        assert_eq!(v["locations"].as_array().unwrap().len(), 2);
        assert_eq!(v["geocenter"]["frame"], "Greenwich");

        let skipped = std::fs::read_to_string(d.dir().join(SKIPPED_FILE)).unwrap();
        assert!(skipped.contains("ghost"));
    }

    #[tokio::test]
    async fn appends_across_dispatches() {
        let dir = tempfile::tempdir().unwrap();
        let d = Dispatcher::new(dir.path()).unwrap();
        d.dispatch(&analyzed()).await.unwrap();
        d.dispatch(&analyzed()).await.unwrap();
        let travelers = std::fs::read_to_string(d.dir().join(TRAVELERS_FILE)).unwrap();
        assert_eq!(travelers.lines().count(), 2);
    }
}
