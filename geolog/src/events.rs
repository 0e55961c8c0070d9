// geolog/src/events.rs
//
// Domain types flowing through geolog.
//
//   LoginRecord  — one (date, user, ip, hits) observation as produced by ingestion
//   Location     — a resolved, validated, weighted point owned by one traveler
//   Traveler     — the identity under analysis: history + geocenter + alerts
//   Geocenter    — weighted center of a traveler's history
//   Anomaly      — one location farther than the alert distance from the geocenter

use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

// ── Ingestion record ──────────────────────────────────────────────────────────

/// A raw login observation. Coordinates are optional: when both are present
/// the record bypasses the IP resolver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginRecord {
    pub date: NaiveDate,
    pub user: String,
    pub ip:   IpAddr,
    pub hits: f64,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub locality: Option<String>,
}

impl LoginRecord {
    pub fn new(date: NaiveDate, user: impl Into<String>, ip: IpAddr, hits: f64) -> Self {
        Self {
            date,
            user: user.into(),
            ip,
            hits,
            latitude: None,
            longitude: None,
            locality: None,
        }
    }
}

// ── Location ──────────────────────────────────────────────────────────────────

/// WGS84 domain check shared by locations and the geolocation table.
pub fn check_coordinates(latitude: f64, longitude: f64) -> Result<(), IngestError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(IngestError::InvalidLatitude(latitude));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(IngestError::InvalidLongitude(longitude));
    }
    Ok(())
}

/// An immutable weighted observation. Construction enforces the coordinate
/// and weight domains so the numeric core never sees invalid input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    ip:        IpAddr,
    timestamp: NaiveDate,
    latitude:  f64,
    longitude: f64,
    weight:    f64,
    locality:  Option<String>,
}

impl Location {
    pub fn new(
        ip: IpAddr,
        timestamp: NaiveDate,
        latitude: f64,
        longitude: f64,
        weight: f64,
        locality: Option<String>,
    ) -> Result<Self, IngestError> {
        check_coordinates(latitude, longitude)?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(IngestError::InvalidWeight(weight));
        }
        let locality = locality.filter(|l| !l.trim().is_empty());
        Ok(Self { ip, timestamp, latitude, longitude, weight, locality })
    }

    /// Same observation with additional hits folded in.
    pub fn merged(&self, extra_weight: f64) -> Result<Self, IngestError> {
        Self::new(
            self.ip,
            self.timestamp,
            self.latitude,
            self.longitude,
            self.weight + extra_weight,
            self.locality.clone(),
        )
    }

    pub fn ip(&self) -> IpAddr { self.ip }
    pub fn timestamp(&self) -> NaiveDate { self.timestamp }
    pub fn latitude(&self) -> f64 { self.latitude }
    pub fn longitude(&self) -> f64 { self.longitude }
    pub fn weight(&self) -> f64 { self.weight }
    pub fn locality(&self) -> Option<&str> { self.locality.as_deref() }
}

// ── Geocenter ─────────────────────────────────────────────────────────────────

/// Reference frame the winning longitude centroid was computed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeridianFrame {
    Greenwich, // plain weighted mean of longitudes
    Dateline,  // mean taken with longitudes shifted by 180°
}

impl std::fmt::Display for MeridianFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Greenwich => write!(f, "greenwich"),
            Self::Dateline => write!(f, "dateline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geocenter {
    pub latitude:  f64,
    pub longitude: f64,
    /// Sum of contributing weights. Display only.
    pub weight:    f64,
    /// Weighted mean distance (km) of the history from this center.
    pub avg_dist:  f64,
    pub frame:     MeridianFrame,
    pub locality:  Option<String>,
}

// ── Anomaly ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub traveler_id:  String,
    pub period:       Option<NaiveDate>,
    pub location:     Location,
    pub distance_km:  f64,
    pub geocenter:    Geocenter,
    pub threshold_km: f64,
    pub detected_at:  DateTime<Utc>,
}

impl Anomaly {
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ── Traveler ──────────────────────────────────────────────────────────────────

/// Grouping key. `period` is set when histories are split per month.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TravelerKey {
    pub user:   String,
    pub period: Option<NaiveDate>,
}

impl std::fmt::Display for TravelerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.period {
            Some(p) => write!(f, "{} {}", p.format("%Y/%m"), self.user),
            None => write!(f, "{}", self.user),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Traveler {
    pub id:             String,
    pub period:         Option<NaiveDate>,
    pub locations:      Vec<Location>,
    pub geocenter:      Option<Geocenter>,
    pub alerts:         Vec<Anomaly>,
    pub alert_distance: f64,
}

impl Traveler {
    pub fn new(id: impl Into<String>, period: Option<NaiveDate>) -> Self {
        Self {
            id: id.into(),
            period,
            locations: Vec::new(),
            geocenter: None,
            alerts: Vec::new(),
            alert_distance: 0.0,
        }
    }

    pub fn with_locations(mut self, locations: Vec<Location>) -> Self {
        self.locations = locations;
        self
    }

    pub fn key(&self) -> TravelerKey {
        TravelerKey { user: self.id.clone(), period: self.period }
    }

    pub fn total_weight(&self) -> f64 {
        self.locations.iter().map(Location::weight).sum()
    }

    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A traveler that could not be analyzed, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skipped {
    pub key:       TravelerKey,
    pub reason:    String,
    pub locations: usize,
}

/// What the pipeline yields per traveler.
#[derive(Debug, Clone)]
pub enum TravelerOutcome {
    Analyzed(Traveler),
    Skipped(Skipped),
}
