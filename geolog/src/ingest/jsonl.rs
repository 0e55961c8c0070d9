// geolog/src/ingest/jsonl.rs
//
// JSONL login records, one per line:
//
//   {"date":"2015-03-14","user":"alice","ip":"203.0.113.10","hits":12}
//   {"date":"2015-03-14","user":"alice","ip":"198.51.100.20","hits":1,
//    "latitude":48.85,"longitude":2.35,"locality":"Paris"}
//
// Blank lines are skipped. A line that does not decode is rejected with its
// line number; the rest of the file still loads.

use crate::error::IngestError;
use crate::events::LoginRecord;

pub fn parse_str(content: &str) -> Vec<(usize, Result<LoginRecord, IngestError>)> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let parsed = serde_json::from_str::<LoginRecord>(line.trim())
                .map_err(|e| IngestError::Malformed(e.to_string()));
            (i + 1, parsed)
        })
        .collect()
}
