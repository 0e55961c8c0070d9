// geolog/src/state/travelers.rs
//
// Concurrent traveler store filled during ingestion.
// DashMap = sharded concurrent HashMap, so every input file can be ingested
// on its own tokio task without a global mutex.
//
// Grouping:
//   group_by_month = true   → one traveler per (user, month)
//   group_by_month = false  → one traveler per user, whole history
//
// A repeated (ip, month) inside a traveler folds its hits into the existing
// location instead of overwriting it.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, NaiveDate};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::events::{Location, LoginRecord, Traveler, TravelerKey};

/// First day of the month containing `date`.
pub fn month_of(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub struct TravelerStore {
    travelers:      DashMap<TravelerKey, Traveler>,
    group_by_month: bool,
    rejections:     Mutex<Vec<String>>,
    accepted:       AtomicU64,
    rejected:       AtomicU64,
}

impl TravelerStore {
    pub fn new(group_by_month: bool) -> Self {
        Self {
            travelers: DashMap::new(),
            group_by_month,
            rejections: Mutex::new(Vec::new()),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn key_for(&self, record: &LoginRecord) -> TravelerKey {
        TravelerKey {
            user:   record.user.clone(),
            period: self.group_by_month.then(|| month_of(record.date)),
        }
    }

    /// Append a resolved location to the record's traveler.
    pub fn ingest(&self, record: &LoginRecord, location: Location) -> Result<(), IngestError> {
        let key = self.key_for(record);
        let mut entry = self
            .travelers
            .entry(key.clone())
            .or_insert_with(|| Traveler::new(key.user.clone(), key.period));

        let existing = entry
            .locations
            .iter()
            .position(|l| l.ip() == location.ip() && l.timestamp() == location.timestamp());

        match existing {
            Some(pos) => {
                let merged = entry.locations[pos].merged(location.weight())?;
                debug!("{}: merged repeated {} ({} hits)", key, location.ip(), merged.weight());
                entry.locations[pos] = merged;
            }
            None => entry.locations.push(location),
        }

        self.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Record a rejected input line. `source` names where it came from.
    pub fn reject(&self, source: &str, err: &IngestError) {
        warn!("rejected record from {}: {}", source, err);
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.rejections.lock().push(format!("{}: {}", source, err));
    }

    pub fn rejections(&self) -> Vec<String> {
        self.rejections.lock().clone()
    }

    pub fn n_travelers(&self) -> usize { self.travelers.len() }
    pub fn n_accepted(&self) -> u64 { self.accepted.load(Ordering::Relaxed) }
    pub fn n_rejected(&self) -> u64 { self.rejected.load(Ordering::Relaxed) }

    /// Move every traveler out of the store, sorted by key.
    pub fn drain(&self) -> Vec<Traveler> {
        let keys: Vec<TravelerKey> = self.travelers.iter().map(|e| e.key().clone()).collect();
        let mut out: Vec<Traveler> = keys
            .into_iter()
            .filter_map(|k| self.travelers.remove(&k).map(|(_, t)| t))
            .collect();
        out.sort_by_key(Traveler::key);
        out
    }
}
