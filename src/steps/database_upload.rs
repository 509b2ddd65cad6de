//! ## Database Upload Step
//!
//! Chunk-ingests the transformed dataset into Postgres. Unlike the standalone
//! ingestion script, this step ensures the target schema/namespace exists and wraps
//! the whole chunked write (schema-creating first write plus all appends) in a single
//! transaction, committed once after the final chunk succeeds.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::database::PostgresSink;
use crate::exceptions::TaxiEtlResult;
use crate::ingest::{copy_batches, CsvBatchSource};
use crate::pipeline::Step;
use crate::schema::transformed_trip_schema;
use crate::settings::DatabaseSettings;

pub struct UploadToDatabase {
    src: PathBuf,
    database: DatabaseSettings,
    table: String,
    schema: String,
    batch_size: usize,
}

impl UploadToDatabase {
    pub fn new(
        src: PathBuf,
        database: DatabaseSettings,
        table: &str,
        schema: &str,
        batch_size: usize,
    ) -> Self {
        Self {
            src,
            database,
            table: table.to_string(),
            schema: schema.to_string(),
            batch_size,
        }
    }
}

#[async_trait]
impl Step for UploadToDatabase {
    async fn run(&self) -> TaxiEtlResult<()> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&self.database.url())
            .await?;

        let mut sink = PostgresSink::new(pool, &self.table).with_schema(&self.schema);
        sink.begin().await?;
        sink.ensure_schema().await?;

        let source =
            CsvBatchSource::open_with_schema(&self.src, transformed_trip_schema(), self.batch_size)?;
        let rows = copy_batches(source, &mut sink).await?;

        sink.commit().await?;
        info!(rows, table = %self.table, schema = %self.schema, "uploaded trips to database");
        Ok(())
    }
}
