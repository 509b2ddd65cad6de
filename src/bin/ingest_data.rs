//! Standalone ingestion script: downloads a trips CSV (optionally gzip-compressed)
//! and a zones reference CSV, replace-writes the zones table, then chunk-ingests the
//! trips into a Postgres table.

use std::path::PathBuf;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use taxi_etl::download::download_file;
use taxi_etl::exceptions::TaxiEtlResult;
use taxi_etl::ingest::{load_fact_table, load_reference_table};
use taxi_etl::settings::{DatabaseSettings, DEFAULT_BATCH_SIZE};

/// Ingest CSV data to Postgres.
#[derive(Debug, Parser)]
#[command(name = "ingest-data")]
struct Args {
    /// User name for Postgres.
    #[arg(long)]
    user: String,
    /// Password for Postgres.
    #[arg(long)]
    password: String,
    /// Host for Postgres.
    #[arg(long)]
    host: String,
    /// Port for Postgres.
    #[arg(long)]
    port: u16,
    /// Database name for Postgres.
    #[arg(long)]
    db: String,
    /// Name of the table where the trip data will be written.
    #[arg(long)]
    table_name: String,
    /// URL of the trips CSV file.
    #[arg(long)]
    url: String,
    /// URL of the zones reference CSV file.
    #[arg(long)]
    zones_url: String,
}

#[tokio::main]
async fn main() -> TaxiEtlResult<()> {
    let args = Args::parse();

    let settings = DatabaseSettings {
        user: args.user,
        password: args.password,
        host: args.host,
        port: args.port,
        database: args.db,
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.url())
        .await?;

    let trips_path = if args.url.ends_with(".csv.gz") {
        PathBuf::from("output.csv.gz")
    } else {
        PathBuf::from("output.csv")
    };
    let zones_path = PathBuf::from("zones.csv");

    download_file(&args.zones_url, &zones_path).await?;
    load_reference_table(&pool, &zones_path, "zones").await?;

    download_file(&args.url, &trips_path).await?;
    load_fact_table(&pool, &trips_path, &args.table_name, DEFAULT_BATCH_SIZE).await?;

    Ok(())
}
