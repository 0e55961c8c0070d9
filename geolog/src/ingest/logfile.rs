// geolog/src/ingest/logfile.rs
//
// Parser for the monthly connection report:
//
//   2015/03
//     alice@example.net
//           12 203.0.113.10
//            1 198.51.100.20
//     bob@example.net
//            4 192.0.2.7
//
// Line kinds, tried in this order:
//   month  ^(\d{4}/\d{2})$            sets the current month
//   user   ^  ([0-9a-zA-Z].+)$        exactly two spaces of indent; sets the current user
//   hits   \s+([0-9]{1,10})\s([0-9].+)$   hit count + source ip for (month, user)
// Anything else is ignored.

use std::net::IpAddr;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::IngestError;
use crate::events::LoginRecord;

pub struct LogfileParser {
    month_re: Regex,
    user_re:  Regex,
    hits_re:  Regex,
    month:    Option<NaiveDate>,
    user:     Option<String>,
}

impl LogfileParser {
    pub fn new() -> Self {
        Self {
            month_re: Regex::new(r"^(\d{4}/\d{2})$").expect("static regex"),
            user_re:  Regex::new(r"^  ([0-9a-zA-Z].+)$").expect("static regex"),
            hits_re:  Regex::new(r"\s+([0-9]{1,10})\s([0-9].+)$").expect("static regex"),
            month:    None,
            user:     None,
        }
    }

    /// Feed one line. Returns a record for hits lines, `None` for headers
    /// and noise.
    pub fn parse_line(&mut self, line: &str) -> Option<Result<LoginRecord, IngestError>> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(c) = self.month_re.captures(line) {
            let raw = &c[1];
            match NaiveDate::parse_from_str(&format!("{}/01", raw), "%Y/%m/%d") {
                Ok(m) => self.month = Some(m),
                Err(_) => {
                    self.month = None;
                    return Some(Err(IngestError::Malformed(format!("invalid month header {:?}", raw))));
                }
            }
            return None;
        }

        if let Some(c) = self.user_re.captures(line) {
            self.user = Some(c[1].trim().to_string());
            return None;
        }

        let c = self.hits_re.captures(line)?;
        Some(self.hits(&c[1], c[2].trim()))
    }

    fn hits(&self, count: &str, ip: &str) -> Result<LoginRecord, IngestError> {
        let month = self
            .month
            .ok_or_else(|| IngestError::Malformed("hits line before any month header".into()))?;
        let user = self
            .user
            .as_deref()
            .ok_or_else(|| IngestError::Malformed("hits line before any user line".into()))?;
        let hits: f64 = count
            .parse()
            .map_err(|_| IngestError::Malformed(format!("bad hit count {:?}", count)))?;
        let ip: IpAddr = ip.parse().map_err(|_| IngestError::InvalidIp(ip.to_string()))?;
        Ok(LoginRecord::new(month, user, ip, hits))
    }

    /// Parse a whole report. Each result carries its 1-based line number.
    pub fn parse_str(content: &str) -> Vec<(usize, Result<LoginRecord, IngestError>)> {
        let mut parser = Self::new();
        content
            .lines()
            .enumerate()
            .filter_map(|(i, line)| parser.parse_line(line).map(|r| (i + 1, r)))
            .collect()
    }
}

impl Default for LogfileParser {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
2015/03
  alice@example.net
        12 203.0.113.10
         1 198.51.100.20
  bob@example.net
         4 192.0.2.7
2015/04
  alice@example.net
       300 203.0.113.10
";

    fn month(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn parses_a_monthly_report() {
        let parsed = LogfileParser::parse_str(REPORT);
        let records: Vec<LoginRecord> = parsed.iter().map(|(_, r)| r.clone().unwrap()).collect();
        assert_eq!(records.len(), 4);

        assert_eq!(records[0], LoginRecord::new(month(2015, 3), "alice@example.net", "203.0.113.10".parse().unwrap(), 12.0));
        assert_eq!(records[1].hits, 1.0);
        assert_eq!(records[2].user, "bob@example.net");
        assert_eq!(records[3].date, month(2015, 4));
        assert_eq!(records[3].hits, 300.0);
        assert_eq!(parsed[0].0, 3);
        assert_eq!(parsed[3].0, 9);
    }

    #[test]
    fn hits_before_headers_is_malformed() {
        let parsed = LogfileParser::parse_str("     5 192.0.2.1\n");
        assert_eq!(parsed.len(), 1);
        assert!(matches!(parsed[0].1, Err(IngestError::Malformed(_))));
    }

    #[test]
    fn bad_ip_is_reported() {
        let parsed = LogfileParser::parse_str("2015/01\n  carol\n     5 999.1.1.1\n");
        assert_eq!(parsed[0].0, 3);
        assert_eq!(parsed[0].1, Err(IngestError::InvalidIp("999.1.1.1".into())));
    }

    #[test]
    fn invalid_month_header_is_reported() {
        let parsed = LogfileParser::parse_str("2015/13\n  carol\n     5 192.0.2.1\n");
        assert_eq!(parsed.len(), 2);
        assert!(matches!(parsed[0].1, Err(IngestError::Malformed(_))));
        // No month in effect afterwards.
        assert!(matches!(parsed[1].1, Err(IngestError::Malformed(_))));
    }

    #[test]
    fn noise_lines_are_ignored() {
        let parsed = LogfileParser::parse_str("report generated by cron\n\n2015/02\n  dave\n# end\n");
        assert!(parsed.is_empty());
    }

    #[test]
    fn windows_line_endings() {
        let parsed = LogfileParser::parse_str("2015/02\r\n  dave\r\n     7 192.0.2.44\r\n");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].1.as_ref().unwrap().ip.to_string(), "192.0.2.44");
    }
}
