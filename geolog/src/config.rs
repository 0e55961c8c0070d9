// geolog/src/config.rs
//
// Run configuration.
//
// Precedence, lowest first:
//   1. built-in defaults
//   2. TOML file (--config, or ./geolog.toml when present)
//   3. environment: GEOLOG_ALERT_DISTANCE_KM, GEOLOG_GOOGLE_API_KEY, GEOLOG_GEO_TABLE
//   4. command-line flags (applied by main)
//
// Example:
//
//   [detection]
//   alert_distance_km = 5000.0
//   group_by_month = true
//
//   [ingest]
//   format = "logfile"
//   inputs = ["logfile.txt"]
//   geo_table = "geo_table.json"
//
//   [geocoding]
//   api_key = "..."

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "geolog.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionSection,
    pub ingest:    IngestSection,
    pub geocoding: GeocodingSection,
    pub output:    OutputSection,
    pub logging:   LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSection {
    /// Distance (km) from the geocenter beyond which a connection alerts.
    pub alert_distance_km: f64,
    /// One traveler per (user, month) instead of one per user.
    pub group_by_month: bool,
    /// Maximum travelers analyzed concurrently.
    pub workers: usize,
}

impl Default for DetectionSection {
    fn default() -> Self {
        Self { alert_distance_km: 5000.0, group_by_month: true, workers: 8 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Month / user / "hits ip" text report
    Logfile,
    /// One JSON login record per line
    Jsonl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    pub format:    InputFormat,
    pub inputs:    Vec<PathBuf>,
    /// Local ip → coordinates table (JSON array or JSONL).
    pub geo_table: Option<PathBuf>,
    /// Abort the run on the first rejected record.
    pub strict:    bool,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            format:    InputFormat::Logfile,
            inputs:    vec![PathBuf::from("logfile.txt")],
            geo_table: None,
            strict:    false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingSection {
    /// Google Geocoding API key. Reverse geocoding is enabled when set.
    #[serde(skip_serializing)]
    pub api_key:         Option<String>,
    pub endpoint:        String,
    /// Minimum spacing between two API calls.
    pub min_interval_ms: u64,
    pub timeout_ms:      u64,
}

impl Default for GeocodingSection {
    fn default() -> Self {
        Self {
            api_key:         None,
            endpoint:        "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            min_interval_ms: 222,
            timeout_ms:      5000,
        }
    }
}

impl GeocodingSection {
    pub fn enabled(&self) -> bool {
        self.api_key.as_deref().map(|k| !k.is_empty()).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Directory for anomalies.jsonl / travelers.jsonl / skipped.jsonl / summary.json.
    pub dir:  Option<PathBuf>,
    /// Print the run summary as JSON instead of markdown.
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// trace, debug, info, warn, error. RUST_LOG directives still apply on top.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// The file `load` reads: `path`, or ./geolog.toml if it exists.
    pub fn source(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(p) => Some(p.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
        }
    }

    /// Load from `source(path)`, else defaults. Environment overrides are
    /// always applied.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match Self::source(path) {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply GEOLOG_* overrides from `lookup`. An unparsable distance is an
    /// error, never silently dropped.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(v) = lookup("GEOLOG_ALERT_DISTANCE_KM") {
            self.detection.alert_distance_km = v
                .trim()
                .parse::<f64>()
                .with_context(|| format!("GEOLOG_ALERT_DISTANCE_KM={:?} is not a number", v))?;
        }
        if let Some(key) = lookup("GEOLOG_GOOGLE_API_KEY") {
            self.geocoding.api_key = Some(key);
        }
        if let Some(path) = lookup("GEOLOG_GEO_TABLE") {
            self.ingest.geo_table = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let km = self.detection.alert_distance_km;
        if !km.is_finite() || km <= 0.0 {
            anyhow::bail!("alert_distance_km must be a positive number, got {}", km);
        }
        if self.detection.workers == 0 {
            anyhow::bail!("detection.workers must be at least 1");
        }
        if self.ingest.inputs.is_empty() {
            anyhow::bail!("no input files configured");
        }
        if self.geocoding.enabled() && self.geocoding.timeout_ms == 0 {
            anyhow::bail!("geocoding.timeout_ms must be non-zero when geocoding is enabled");
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("Invalid log level: {}. Must be one of: {:?}", self.logging.level, valid_levels);
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
