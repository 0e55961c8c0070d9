// geolog/src/main.rs
//
// geolog: flag logins far from a user's usual connection center.
//
// Pipeline:
//   inputs ─► ingest (one task per file) ─► TravelerStore
//          ─► Pipeline (one task per traveler, bounded) ─► mpsc ─► alerts + JSONL sink
//
// Usage:
//   geolog -i logfile.txt -m geo_table.json
//   geolog -i logins.jsonl -f jsonl -d 3000 --no-per-month -o /tmp/geolog_output
//   GEOLOG_GOOGLE_API_KEY=... geolog -c geolog.toml --json

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use geolog::config::{Config, InputFormat};
use geolog::engine::{dispatcher::Dispatcher, pipeline::Pipeline};
use geolog::events::TravelerOutcome;
use geolog::geocode::{GoogleGeocoder, ReverseGeocoder};
use geolog::ingest::{self, GeoTable, IpResolver};
use geolog::report::{self, RunSummary};
use geolog::state::travelers::TravelerStore;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "geolog",
    about   = "Flag logins that originate far from a user's usual connection center",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[arg(short, long, help = "TOML config file (default: ./geolog.toml when present)")]
    config: Option<PathBuf>,

    #[arg(short, long = "input", help = "Input file; repeat for several")]
    inputs: Vec<PathBuf>,

    #[arg(short, long, value_enum, help = "Input format")]
    format: Option<InputFormat>,

    #[arg(short = 'm', long, help = "IP geolocation table (JSON array or JSONL)")]
    geo_table: Option<PathBuf>,

    #[arg(short = 'd', long, help = "Alert distance from the geocenter, in km")]
    distance: Option<f64>,

    #[arg(short = 'k', long, help = "Google geocoding API key; enables naming geocenters")]
    api_key: Option<String>,

    #[arg(long, conflicts_with = "no_per_month", help = "One traveler per (user, month)")]
    per_month: bool,

    #[arg(long, help = "One traveler per user across the whole history")]
    no_per_month: bool,

    #[arg(short, long, help = "Directory for the JSONL output files")]
    output: Option<PathBuf>,

    #[arg(long, help = "Print anomalies and the summary as JSON")]
    json: bool,

    #[arg(long, help = "Fail on the first rejected record")]
    strict: bool,

    #[arg(long, help = "Travelers analyzed concurrently")]
    workers: Option<usize>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if !self.inputs.is_empty() {
            config.ingest.inputs = self.inputs;
        }
        if let Some(f) = self.format {
            config.ingest.format = f;
        }
        if let Some(p) = self.geo_table {
            config.ingest.geo_table = Some(p);
        }
        if let Some(km) = self.distance {
            config.detection.alert_distance_km = km;
        }
        if let Some(k) = self.api_key {
            config.geocoding.api_key = Some(k);
        }
        if self.per_month {
            config.detection.group_by_month = true;
        }
        if self.no_per_month {
            config.detection.group_by_month = false;
        }
        if let Some(dir) = self.output {
            config.output.dir = Some(dir);
        }
        if let Some(n) = self.workers {
            config.detection.workers = n;
        }
        config.output.json |= self.json;
        config.ingest.strict |= self.strict;
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_outcome(outcome: &TravelerOutcome, json: bool) {
    match outcome {
        TravelerOutcome::Analyzed(t) => {
            for alert in &t.alerts {
                if json {
                    println!("{}", alert.to_jsonl());
                } else {
                    println!("{}", report::alert_line(alert));
                }
            }
        }
        TravelerOutcome::Skipped(s) if !json => println!("{}", report::skipped_line(s)),
        TravelerOutcome::Skipped(_) => {}
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cli_config = cli.config.clone();
    let mut config = Config::load(cli_config.as_deref())?;
    cli.apply(&mut config);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive(format!("geolog={}", config.logging.level.to_lowercase()).parse()?))
        .with_writer(std::io::stderr)
        .compact().init();

    match Config::source(cli_config.as_deref()) {
        Some(p) => info!("Loaded configuration from {}", p.display()),
        None => info!("No configuration file, using defaults"),
    }
    config.validate()?;

    // Ingest
    let resolver: Option<Arc<dyn IpResolver>> = match &config.ingest.geo_table {
        Some(path) => {
            let table: Arc<dyn IpResolver> = Arc::new(GeoTable::load(path).await?);
            Some(table)
        }
        None => None,
    };
    let store = Arc::new(TravelerStore::new(config.detection.group_by_month));
    ingest::ingest_all(&config.ingest, Arc::clone(&store), resolver).await?;
    info!(
        "{} records accepted, {} rejected, {} travelers",
        store.n_accepted(), store.n_rejected(), store.n_travelers()
    );

    // Analyze
    let geocoder: Option<Arc<dyn ReverseGeocoder>> = match config.geocoding.api_key.as_deref() {
        Some(key) if config.geocoding.enabled() => {
            let client = GoogleGeocoder::new(&config.geocoding, key).context("building geocoding client")?;
            info!("Reverse geocoding enabled via {}", config.geocoding.endpoint);
            Some(Arc::new(client) as Arc<dyn ReverseGeocoder>)
        }
        _ => None,
    };
    let dispatcher = config.output.dir.as_ref().map(Dispatcher::new).transpose()?;
    let pipeline = Arc::new(Pipeline::new(&config.detection, geocoder));
    let mut summary = RunSummary::new(pipeline.threshold_km());

    let (tx, mut rx) = mpsc::channel::<TravelerOutcome>(256);
    let runner = tokio::spawn(Arc::clone(&pipeline).run(store.drain(), tx));

    while let Some(outcome) = rx.recv().await {
        print_outcome(&outcome, config.output.json);
        summary.record(&outcome);
        if let Some(d) = &dispatcher {
            if let Err(e) = d.dispatch(&outcome).await {
                error!("Dispatch failed: {}", e);
            }
        }
    }
    let produced = runner.await.context("pipeline task panicked")?;
    info!("Analyzed {} travelers", produced);

    // Summary
    summary.records_accepted = store.n_accepted();
    summary.records_rejected = store.n_rejected();
    if let Some(d) = &dispatcher {
        d.write_summary(&summary).await?;
        info!("Wrote results to {}", d.dir().display());
    }
    if config.output.json {
        println!("{}", summary.to_json());
    } else {
        println!();
        summary.print_markdown();
    }
    Ok(())
}
