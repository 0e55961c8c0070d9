// geolog/src/ingest/mod.rs
//
// Ingestion: input files → login records → resolved locations → TravelerStore.
//
// Each input file is read whole and ingested on its own tokio task. Bad
// records are rejected into the store (logged + counted) unless the run is
// strict, in which case the first rejection fails the run. A file that
// cannot be read at all is always fatal.

pub mod geoip;
pub mod jsonl;
pub mod logfile;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::info;

use crate::config::{IngestSection, InputFormat};
use crate::error::IngestError;
use crate::events::{Location, LoginRecord};
use crate::state::travelers::{month_of, TravelerStore};

pub use geoip::{GeoTable, IpResolver, Resolved};

/// Turn a record into a validated location, resolving its IP unless the
/// record already carries coordinates.
pub fn locate(record: &LoginRecord, resolver: Option<&dyn IpResolver>) -> Result<Location, IngestError> {
    let resolved = match (record.latitude, record.longitude) {
        (Some(latitude), Some(longitude)) => Resolved { latitude, longitude, locality: record.locality.clone() },
        (None, None) => {
            let resolver = resolver.ok_or(IngestError::UnresolvedIp(record.ip))?;
            let mut r = resolver.resolve(record.ip)?;
            if record.locality.is_some() {
                r.locality = record.locality.clone();
            }
            r
        }
        _ => {
            return Err(IngestError::Malformed(
                "latitude and longitude must be given together".into(),
            ))
        }
    };

    Location::new(
        record.ip,
        month_of(record.date),
        resolved.latitude,
        resolved.longitude,
        record.hits,
        resolved.locality,
    )
}

pub fn parse(format: InputFormat, content: &str) -> Vec<(usize, Result<LoginRecord, IngestError>)> {
    match format {
        InputFormat::Logfile => logfile::LogfileParser::parse_str(content),
        InputFormat::Jsonl => jsonl::parse_str(content),
    }
}

/// Ingest already-loaded content. Returns the number of accepted records.
pub fn ingest_str(
    source:   &str,
    content:  &str,
    format:   InputFormat,
    store:    &TravelerStore,
    resolver: Option<&dyn IpResolver>,
    strict:   bool,
) -> Result<usize, IngestError> {
    let mut accepted = 0usize;
    for (line, parsed) in parse(format, content) {
        let outcome = parsed
            .and_then(|rec| locate(&rec, resolver).map(|loc| (rec, loc)))
            .and_then(|(rec, loc)| store.ingest(&rec, loc));
        match outcome {
            Ok(()) => accepted += 1,
            Err(e) => {
                let e = e.at_line(line);
                store.reject(source, &e);
                if strict {
                    return Err(e);
                }
            }
        }
    }
    Ok(accepted)
}

pub async fn ingest_file(
    path:     &Path,
    format:   InputFormat,
    store:    &TravelerStore,
    resolver: Option<&dyn IpResolver>,
    strict:   bool,
) -> Result<usize> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let source = path.display().to_string();
    let accepted = ingest_str(&source, &content, format, store, resolver, strict)
        .with_context(|| format!("strict ingest of {}", source))?;
    info!("Ingested {} records from {}", accepted, source);
    Ok(accepted)
}

/// Ingest every configured input concurrently, one task per file.
pub async fn ingest_all(
    cfg:      &IngestSection,
    store:    Arc<TravelerStore>,
    resolver: Option<Arc<dyn IpResolver>>,
) -> Result<usize> {
    let mut tasks = JoinSet::new();
    for path in cfg.inputs.iter().cloned() {
        let store    = Arc::clone(&store);
        let resolver = resolver.clone();
        let format   = cfg.format;
        let strict   = cfg.strict;
        tasks.spawn(async move {
            ingest_file(&path, format, &store, resolver.as_deref(), strict).await
        });
    }

    let mut total = 0usize;
    while let Some(joined) = tasks.join_next().await {
        total += joined.context("ingest task panicked")??;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    fn table() -> GeoTable {
        GeoTable::parse(
            r#"{"ip":"203.0.113.10","latitude":37.77,"longitude":-122.4,"city":"San Francisco","country":"US"}
{"ip":"198.51.100.20","latitude":48.85,"longitude":2.35,"city":"Paris","country":"France"}"#,
        )
        .unwrap()
    }

    fn rec(ip: &str) -> LoginRecord {
        LoginRecord::new(NaiveDate::from_ymd_opt(2015, 3, 14).unwrap(), "alice", ip.parse().unwrap(), 3.0)
    }

    #[test]
    fn locate_uses_the_resolver_and_truncates_to_month() {
        let t = table();
        let loc = locate(&rec("203.0.113.10"), Some(&t)).unwrap();
        assert_eq!(loc.latitude(), 37.77);
        assert_eq!(loc.locality(), Some("San Francisco US"));
        assert_eq!(loc.timestamp(), NaiveDate::from_ymd_opt(2015, 3, 1).unwrap());
        assert_eq!(loc.weight(), 3.0);
    }

    #[test]
    fn locate_prefers_record_coordinates() {
        let mut r = rec("192.0.2.1");
        r.latitude = Some(-33.9);
        r.longitude = Some(151.2);
        let loc = locate(&r, None).unwrap();
        assert_eq!(loc.longitude(), 151.2);
    }

    #[test]
    fn locate_surfaces_resolution_failures() {
        let t = table();
        let ip = "192.0.2.200".parse().unwrap();
        assert_eq!(locate(&rec("192.0.2.200"), Some(&t)), Err(IngestError::UnresolvedIp(ip)));
        assert_eq!(locate(&rec("192.0.2.200"), None), Err(IngestError::UnresolvedIp(ip)));

        let mut half = rec("192.0.2.1");
        half.latitude = Some(1.0);
        assert!(matches!(locate(&half, None), Err(IngestError::Malformed(_))));

        let mut bad = rec("192.0.2.1");
        bad.latitude = Some(95.0);
        bad.longitude = Some(0.0);
        assert_eq!(locate(&bad, None), Err(IngestError::InvalidLatitude(95.0)));
    }

    const REPORT: &str = "2015/03\n  alice\n    12 203.0.113.10\n     1 198.51.100.20\n     2 192.0.2.77\n";

    #[test]
    fn lenient_ingest_rejects_and_continues() {
        let store = TravelerStore::new(true);
        let t = table();
        let accepted = ingest_str("report", REPORT, InputFormat::Logfile, &store, Some(&t), false).unwrap();
        assert_eq!(accepted, 2);
        assert_eq!(store.n_rejected(), 1);
        assert!(store.rejections()[0].starts_with("report: line 5:"));
    }

    #[test]
    fn strict_ingest_stops_at_first_rejection() {
        let store = TravelerStore::new(true);
        let t = table();
        let err = ingest_str("report", REPORT, InputFormat::Logfile, &store, Some(&t), true).unwrap_err();
        assert!(matches!(err, IngestError::AtLine { line: 5, .. }));
    }

    #[tokio::test]
    async fn ingest_all_reads_files_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        writeln!(std::fs::File::create(&a).unwrap(), "2015/03\n  alice\n    12 203.0.113.10").unwrap();
        writeln!(std::fs::File::create(&b).unwrap(), "2015/03\n  alice\n     1 198.51.100.20").unwrap();

        let cfg = IngestSection { inputs: vec![a, b], ..IngestSection::default() };
        let store = Arc::new(TravelerStore::new(true));
        let resolver: Arc<dyn IpResolver> = Arc::new(table());
        let total = ingest_all(&cfg, Arc::clone(&store), Some(resolver)).await.unwrap();

        assert_eq!(total, 2);
        let travelers = store.drain();
        assert_eq!(travelers.len(), 1);
        assert_eq!(travelers[0].locations.len(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let cfg = IngestSection { inputs: vec!["/nonexistent/geolog.log".into()], ..IngestSection::default() };
        let store = Arc::new(TravelerStore::new(true));
        assert!(ingest_all(&cfg, store, None).await.is_err());
    }
}
