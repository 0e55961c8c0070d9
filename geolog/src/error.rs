// geolog/src/error.rs
//
// Error taxonomy.
//
//   IngestError   — malformed or out-of-range input, rejected before analysis
//   AnalysisError — a traveler that cannot produce a geocenter (skipped, never fatal to the run)
//   GeocodeError  — reverse geocoding failure (logged, locality falls back to "")
//
// Structural failures (unreadable input, bad config, unwritable output) are
// not modelled here; they travel as anyhow::Error up to main.

use std::net::IpAddr;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IngestError {
    #[error("latitude {0} outside [-90, 90]")]
    InvalidLatitude(f64),

    #[error("longitude {0} outside [-180, 180]")]
    InvalidLongitude(f64),

    #[error("weight {0} must be finite and non-negative")]
    InvalidWeight(f64),

    #[error("unparsable ip address {0:?}")]
    InvalidIp(String),

    #[error("no geolocation entry for {0}")]
    UnresolvedIp(IpAddr),

    #[error("{0}")]
    Malformed(String),

    #[error("line {line}: {source}")]
    AtLine {
        line:   usize,
        #[source]
        source: Box<IngestError>,
    },
}

impl IngestError {
    pub fn at_line(self, line: usize) -> Self {
        Self::AtLine { line, source: Box::new(self) }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("empty location history")]
    EmptyHistory,

    #[error("total weight is zero across {0} locations")]
    ZeroWeight(usize),

    #[error("weighted sums overflow across {0} locations")]
    NonFiniteWeight(usize),

    #[error("geocenter has not been estimated")]
    MissingGeocenter,
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoding api returned HTTP {0}")]
    Status(u16),

    #[error("geocoding api refused the query: {0}")]
    Api(String),

    #[error("invalid geocoding response: {0}")]
    Decode(#[from] serde_json::Error),
}
