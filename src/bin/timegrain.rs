#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use rand::Rng;
use rust_decimal::Decimal;
use timegrain::{FieldType, Point, Storage, StoreError, TableSchema, Value};

const DESCRIPTIONS: [&str; 3] = ["SUNNY", "CLOUDY", "SNOWY"];

#[derive(Debug, Parser)]
#[command(name = "timegrain", about = "Generate and query weather time-series data")]
struct Cli {
    /// Log verbosity for the console appender
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Persist random weather points spread over the past day
    Generate {
        #[arg(long, default_value = "Sao Paulo")]
        city: String,

        #[arg(long, default_value_t = 20)]
        count: u32,
    },
    /// Print every stored point for a city within a time range
    Query {
        #[arg(long, default_value = "Sao Paulo")]
        city: String,

        /// RFC 3339 instant; defaults to the epoch
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// RFC 3339 instant; open-ended when absent
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },
}

fn weather_schema() -> Result<Arc<TableSchema>, StoreError> {
    let schema = TableSchema::builder("weather")
        .dimension("city", FieldType::text(32))
        .attribute("temperature", FieldType::decimal(10, 2))
        .attribute("rainfall", FieldType::Integer)
        .attribute(
            "description",
            FieldType::enumeration(DESCRIPTIONS.iter().enumerate().map(|(index, name)| (*name, index as u16))),
        )
        .build()?;
    Ok(Arc::new(schema))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    timegrain::logger::init(cli.log_level)?;

    let schema = weather_schema()?;
    let mut storage = Storage::open()?;
    storage.prepare_type(&schema)?;

    match cli.command {
        Command::Generate { city, count } => {
            let mut rng = rand::rng();
            let now = Utc::now();
            for _ in 0..count {
                let timestamp = now - TimeDelta::seconds(rng.random_range(0..24 * 3600));
                let point = Point::new(&schema, timestamp)
                    .with("city", Value::Text(city.clone()))
                    .with("temperature", Value::Decimal(Decimal::new(rng.random_range(-300..500), 1)))
                    .with("rainfall", Value::Integer(rng.random_range(0..200)))
                    .with(
                        "description",
                        Value::Enum(DESCRIPTIONS[rng.random_range(0..DESCRIPTIONS.len())].to_string()),
                    );
                storage.add(&point)?;
            }
        }
        Command::Query { city, start, end } => {
            let mut dimensions = HashMap::new();
            dimensions.insert("city".to_string(), Value::Text(city));
            let start = start.unwrap_or(DateTime::UNIX_EPOCH);
            for point in storage.query(&schema, &dimensions, start, end)? {
                println!("{}", point?);
            }
        }
    }

    storage.commit()?;
    Ok(())
}
