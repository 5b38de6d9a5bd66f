//! tsindex CLI
//!
//! Command-line front-end over the time-series database:
//! - Insert, update and delete readings
//! - Retrieve readings in a time range
//! - Aggregate and downsample a metric
//! - Load demo data or import a CSV file

use anyhow::{anyhow, Context};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tsindex::db::{AggregationType, Bucket, DbError, Interval};
use tsindex::service::{IndexHandle, IndexService, DEFAULT_QUEUE_DEPTH};
use tsindex::storage::{format_timestamp, parse_timestamp, Reading, Record, RecordFilter, RecordId};
use tsindex::{config, import, logging, Config, SqliteStore, TimeSeriesDb};

#[derive(Parser)]
#[command(name = "tsindex")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Climate reading store with a B+Tree timestamp index")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Insert a reading
    Insert {
        station_id: String,
        metric_name: String,
        value: f64,
        /// Timestamp (default: now). "YYYY-MM-DD HH:MM:SS", RFC 3339 or Unix millis
        #[arg(short, long)]
        time: Option<String>,
        #[arg(short, long)]
        location: Option<String>,
        /// Comma separated tags
        #[arg(short = 'T', long)]
        tags: Option<String>,
    },

    /// Retrieve readings with start <= timestamp <= end
    Retrieve {
        start: String,
        end: String,
        #[arg(short, long)]
        station: Option<String>,
        #[arg(short, long)]
        metric: Option<String>,
    },

    /// Overwrite the value of a stored reading
    Update { id: i64, value: f64 },

    /// Delete a stored reading
    Delete { id: i64 },

    /// Aggregate a metric over a time range
    Aggregate {
        metric: String,
        start: String,
        end: String,
        /// avg, sum, min or max
        #[arg(short, long, default_value = "avg")]
        aggregation: String,
    },

    /// Average a metric into hourly or daily buckets
    Downsample {
        metric: String,
        start: String,
        end: String,
        /// hourly or daily
        #[arg(short, long, default_value = "hourly")]
        interval: String,
    },

    /// Insert randomly generated readings, one minute apart
    Demo {
        #[arg(short = 'n', long, default_value = "100")]
        count: usize,
        /// Seed for reproducible data
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Import readings from a CSV file
    Import {
        path: PathBuf,
        /// Parse and report without inserting
        #[arg(long)]
        dry_run: bool,
    },

    /// Show index and store statistics
    Stats,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_ref());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    logging::init(&config.logging);

    let db_path = config.storage.resolved_db_path();
    tracing::info!("tsindex v{} using {:?}", env!("CARGO_PKG_VERSION"), db_path);

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {:?}", db_path))?;
    let db = TimeSeriesDb::open(store, &config.index)?;

    let service = IndexService::spawn(db, DEFAULT_QUEUE_DEPTH);
    let result = run(cli.command, cli.format, service.handle()).await;
    service.shutdown().await?;
    result
}

async fn run(command: Commands, format: OutputFormat, handle: IndexHandle) -> anyhow::Result<()> {
    match command {
        Commands::Insert {
            station_id,
            metric_name,
            value,
            time,
            location,
            tags,
        } => {
            let timestamp = match time.as_deref() {
                None | Some("now") => Utc::now().timestamp_millis(),
                Some(s) => parse_time(s)?,
            };

            let mut reading = Reading::new(timestamp, station_id, metric_name, value);
            reading.location = location;
            reading.tags = tags;

            let id = handle.record(reading).await?;
            println!("Inserted record {} at {}", id, format_timestamp(timestamp));
        }

        Commands::Retrieve {
            start,
            end,
            station,
            metric,
        } => {
            let filter = RecordFilter {
                station_id: station,
                metric_name: metric,
            };
            let mut records = handle
                .query_filtered(parse_time(&start)?, parse_time(&end)?, filter)
                .await?;
            records.sort_by_key(|r| (r.reading.timestamp, r.id));

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
                OutputFormat::Table => print_records(&records),
            }
        }

        Commands::Update { id, value } => {
            if handle.update_value(RecordId(id), value).await? {
                println!("Updated record {}", id);
            } else {
                return Err(anyhow!("No record with id {}", id));
            }
        }

        Commands::Delete { id } => {
            if handle.delete(RecordId(id)).await? {
                println!("Deleted record {}", id);
            } else {
                return Err(anyhow!("No record with id {}", id));
            }
        }

        Commands::Aggregate {
            metric,
            start,
            end,
            aggregation,
        } => {
            let aggregation: AggregationType = aggregation.parse()?;
            let value = handle
                .aggregate(parse_time(&start)?, parse_time(&end)?, metric.as_str(), aggregation)
                .await?;

            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "metric": metric,
                        "aggregation": aggregation,
                        "value": value,
                    })
                ),
                OutputFormat::Table => println!("{}({}) = {:.2}", aggregation, metric, value),
            }
        }

        Commands::Downsample {
            metric,
            start,
            end,
            interval,
        } => {
            let interval: Interval = interval.parse()?;
            let buckets = handle
                .downsample(parse_time(&start)?, parse_time(&end)?, metric.as_str(), interval)
                .await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&buckets)?),
                OutputFormat::Table => print_buckets(&metric, &buckets),
            }
        }

        Commands::Demo { count, seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let base = Utc::now();

            for i in 0..count {
                let timestamp = (base + Duration::minutes(i as i64)).timestamp_millis();
                let station = format!("Station_{}", rng.random_range(1..=5));
                let metric = if rng.random_bool(0.5) {
                    "temperature"
                } else {
                    "humidity"
                };
                let value = (rng.random_range(15.0..35.0_f64) * 100.0).round() / 100.0;

                let reading = Reading::new(timestamp, station, metric, value)
                    .location("New York")
                    .tags("urban");
                handle.record(reading).await?;
            }
            println!("Inserted {} demo readings", count);
        }

        Commands::Import { path, dry_run } => {
            let result = import::import_path(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;

            println!("Import results:");
            println!("  Rows parsed: {}", result.readings.len());
            println!("  Rows failed: {}", result.rows_failed);

            if !result.errors.is_empty() {
                println!();
                println!("Errors (first 10):");
                for error in result.errors.iter().take(10) {
                    println!("  {}", error);
                }
            }

            if dry_run {
                println!();
                println!("(Dry run - no data was imported)");
            } else {
                let total = result.readings.len();
                for reading in result.readings {
                    handle.record(reading).await?;
                }
                println!("  Imported: {}", total);
            }
        }

        Commands::Stats => {
            let stats = handle.stats().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Table => {
                    println!("Records: {}", stats.records);
                    println!(
                        "Last timestamp: {}",
                        stats
                            .last_timestamp
                            .map(format_timestamp)
                            .unwrap_or_else(|| "-".to_string())
                    );
                    println!("Index: {}", stats.index);
                }
            }
        }

        // Handled before the database is opened
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn parse_time(input: &str) -> Result<i64, DbError> {
    parse_timestamp(input).ok_or_else(|| DbError::InvalidTimestamp(input.to_string()))
}

fn write_default_config(output: Option<&PathBuf>) -> anyhow::Result<()> {
    let content = config::generate_default_config();

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &content)?;
            println!("Config written to {:?}", path);
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn print_records(records: &[Record]) {
    if records.is_empty() {
        println!("No readings in the selected time range");
        return;
    }

    println!(
        "{:<8} {:<20} {:<12} {:<12} {:>8}  {}",
        "ID", "Timestamp", "Station", "Metric", "Value", "Location"
    );
    println!("{}", "-".repeat(76));

    for record in records {
        let r = &record.reading;
        println!(
            "{:<8} {:<20} {:<12} {:<12} {:>8.2}  {}",
            record.id,
            format_timestamp(r.timestamp),
            r.station_id,
            r.metric_name,
            r.value,
            r.location.as_deref().unwrap_or("-")
        );
    }
}

fn print_buckets(metric: &str, buckets: &[Bucket]) {
    println!("{:<20} | {:<10} | {}", "Bucket", metric, "Count");
    println!("{}", "-".repeat(42));

    for bucket in buckets {
        println!(
            "{:<20} | {:<10.2} | {}",
            bucket.timestamp, bucket.value, bucket.count
        );
    }
}
