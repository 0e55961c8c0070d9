// geolog/src/ingest/geoip.rs
//
// IP → coordinates resolution.
//
// The resolver is a seam: anything that can answer `resolve(ip)` plugs in.
// GeoTable is the bundled implementation, an exact-match table loaded from a
// local file, either a JSON array or one JSON object per line:
//
//   {"ip": "203.0.113.10", "latitude": 37.77, "longitude": -122.4,
//    "city": "San Francisco", "country": "United States"}
//
// Unknown addresses are an error for the caller to surface, never a default.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use crate::error::IngestError;
use crate::events::check_coordinates;

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub latitude:  f64,
    pub longitude: f64,
    pub locality:  Option<String>,
}

pub trait IpResolver: Send + Sync {
    fn resolve(&self, ip: IpAddr) -> Result<Resolved, IngestError>;
}

#[derive(Debug, Deserialize)]
struct GeoEntry {
    ip:        IpAddr,
    latitude:  f64,
    longitude: f64,
    #[serde(default)]
    city:      Option<String>,
    #[serde(default)]
    country:   Option<String>,
}

impl GeoEntry {
    // "<city> <country>", either part optional
    fn locality(&self) -> Option<String> {
        let joined = [self.city.as_deref(), self.country.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!joined.is_empty()).then_some(joined)
    }
}

#[derive(Debug, Default)]
pub struct GeoTable {
    entries: HashMap<IpAddr, Resolved>,
}

impl GeoTable {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, ip: IpAddr, resolved: Resolved) -> Result<(), IngestError> {
        check_coordinates(resolved.latitude, resolved.longitude)?;
        self.entries.insert(ip, resolved);
        Ok(())
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Parse table content. A leading `[` selects JSON-array mode.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let entries: Vec<GeoEntry> = if content.trim_start().starts_with('[') {
            serde_json::from_str(content)?
        } else {
            content
                .lines()
                .enumerate()
                .filter(|(_, l)| !l.trim().is_empty())
                .map(|(i, l)| {
                    serde_json::from_str::<GeoEntry>(l.trim())
                        .with_context(|| format!("geo table line {}", i + 1))
                })
                .collect::<anyhow::Result<_>>()?
        };

        let mut table = Self::new();
        for e in entries {
            let resolved = Resolved { latitude: e.latitude, longitude: e.longitude, locality: e.locality() };
            table
                .insert(e.ip, resolved)
                .with_context(|| format!("geo table entry for {}", e.ip))?;
        }
        Ok(table)
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading geo table {}", path.display()))?;
        let table = Self::parse(&content)?;
        info!("Loaded {} geolocation entries from {}", table.len(), path.display());
        Ok(table)
    }
}

impl IpResolver for GeoTable {
    fn resolve(&self, ip: IpAddr) -> Result<Resolved, IngestError> {
        self.entries.get(&ip).cloned().ok_or(IngestError::UnresolvedIp(ip))
    }
}
