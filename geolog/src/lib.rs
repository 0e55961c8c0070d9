// geolog/src/lib.rs
//
// geolog: flags logins that originate unusually far from a user's usual
// connection center.
//
//   ingest   — report / JSONL parsing, IP resolution, traveler grouping
//   geo      — great-circle distance and the two-frame weighted geocenter
//   engine   — per-traveler pipeline, anomaly scoring, JSONL output
//   geocode  — optional reverse geocoding of geocenters

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod geo;
pub mod geocode;
pub mod ingest;
pub mod report;
pub mod state;
