//! ## Chunked CSV Ingestion
//!
//! This module implements the chunked ingestion path shared by both pipelines:
//!
//! - [`CsvBatchSource`]: a finite, non-restartable lazy sequence of fixed-size
//!   [`RecordBatch`] values read from a CSV file (transparently gunzipped when the
//!   path ends in `.gz`), optionally coercing named columns to timestamps per batch.
//! - [`BatchSink`]: the seam between batch production and the destination store.
//! - [`copy_batches`]: the first-create-then-append copy loop. The destination schema
//!   is established exactly once, from the first batch's column types, avoiding a
//!   separate DDL step.
//!
//! There is no transactional wrapping here; the orchestrated database upload opens a
//! transaction on its sink before copying (see [`crate::database::PostgresSink`]).

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::compute::cast;
use arrow::csv::reader::Format;
use arrow::csv::{Reader, ReaderBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::database::PostgresSink;
use crate::exceptions::{TaxiEtlError, TaxiEtlResult};
use crate::schema::TIMESTAMP_COLUMNS;

/// Rows scanned when inferring a schema from a CSV prefix.
const INFER_MAX_RECORDS: usize = 1000;

/// Batch size used when a bounded reference file is read as a single batch.
const REFERENCE_BATCH_SIZE: usize = 1 << 20;

/// A destination for a sequence of record batches.
///
/// `create` carries replace semantics: the destination table is dropped and recreated
/// (zero rows) from the given schema. `append` inserts rows without altering existing
/// contents.
#[async_trait]
pub trait BatchSink {
    async fn create(&mut self, schema: &SchemaRef) -> TaxiEtlResult<()>;
    async fn append(&mut self, batch: &RecordBatch) -> TaxiEtlResult<()>;
}

/// A lazy sequence of row batches read from a CSV file with a fixed batch size.
pub struct CsvBatchSource {
    reader: Reader<Box<dyn Read + Send>>,
    timestamp_columns: Vec<String>,
}

impl CsvBatchSource {
    /// Opens `path` with a schema inferred from a bounded prefix scan. The file is
    /// opened twice: once for inference, once for the data pass.
    pub fn open(path: &Path, batch_size: usize) -> TaxiEtlResult<Self> {
        let format = Format::default().with_header(true);
        let (schema, _) = format.infer_schema(open_raw(path)?, Some(INFER_MAX_RECORDS))?;
        Self::open_with_schema(path, Arc::new(schema), batch_size)
    }

    /// Opens `path` with a known schema, skipping the inference pass.
    pub fn open_with_schema(
        path: &Path,
        schema: SchemaRef,
        batch_size: usize,
    ) -> TaxiEtlResult<Self> {
        let reader = ReaderBuilder::new(schema)
            .with_header(true)
            .with_batch_size(batch_size)
            .build(open_raw(path)?)?;
        Ok(Self {
            reader,
            timestamp_columns: Vec::new(),
        })
    }

    /// Coerce the named columns to `Timestamp(Microsecond)` in every batch.
    /// A named column missing from the file surfaces as [`TaxiEtlError::MissingColumn`].
    pub fn with_timestamp_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamp_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

impl Iterator for CsvBatchSource {
    type Item = TaxiEtlResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = match self.reader.next()? {
            Ok(batch) => batch,
            Err(e) => return Some(Err(e.into())),
        };
        Some(coerce_timestamps(batch, &self.timestamp_columns))
    }
}

/// Opens a file for reading, gunzipping transparently when the extension is `.gz`.
fn open_raw(path: &Path) -> TaxiEtlResult<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Casts each named column of `batch` to `Timestamp(Microsecond)`.
fn coerce_timestamps(batch: RecordBatch, columns: &[String]) -> TaxiEtlResult<RecordBatch> {
    if columns.is_empty() {
        return Ok(batch);
    }
    let target = DataType::Timestamp(TimeUnit::Microsecond, None);
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut arrays = batch.columns().to_vec();
    for name in columns {
        let idx = schema
            .index_of(name)
            .map_err(|_| TaxiEtlError::MissingColumn(name.clone()))?;
        arrays[idx] = cast(&arrays[idx], &target)?;
        fields[idx] = fields[idx].clone().with_data_type(target.clone());
    }
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).map_err(TaxiEtlError::from)
}

/// Copies every batch from `source` into `sink`: the first batch establishes the
/// destination schema via `create` (replace semantics), then every batch, the first
/// included, is appended. Returns the total number of rows written.
pub async fn copy_batches<S>(source: CsvBatchSource, sink: &mut S) -> TaxiEtlResult<u64>
where
    S: BatchSink + ?Sized,
{
    let mut total: u64 = 0;
    let mut first = true;
    for batch in source {
        let batch = batch?;
        if first {
            sink.create(&batch.schema()).await?;
            first = false;
        }
        let start = Instant::now();
        sink.append(&batch).await?;
        total += batch.num_rows() as u64;
        debug!(
            rows = batch.num_rows(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "inserted another chunk"
        );
    }
    if first {
        warn!("source produced no batches; destination left untouched");
    }
    Ok(total)
}

/// Loads a small reference CSV fully into memory and replace-writes it to `table`.
/// No chunking: the table is small and bounded.
pub async fn load_reference_table(pool: &PgPool, path: &Path, table: &str) -> TaxiEtlResult<u64> {
    let source = CsvBatchSource::open(path, REFERENCE_BATCH_SIZE)?;
    let mut sink = PostgresSink::new(pool.clone(), table);
    let rows = copy_batches(source, &mut sink).await?;
    info!(table, rows, "loaded reference table");
    Ok(rows)
}

/// Chunk-ingests a trips CSV into `table`, coercing the pickup/dropoff datetime
/// columns to timestamps per batch. Each chunk is committed as it lands: a failure
/// mid-stream leaves a partially populated table.
pub async fn load_fact_table(
    pool: &PgPool,
    path: &Path,
    table: &str,
    batch_size: usize,
) -> TaxiEtlResult<u64> {
    let source = CsvBatchSource::open(path, batch_size)?.with_timestamp_columns(TIMESTAMP_COLUMNS);
    let mut sink = PostgresSink::new(pool.clone(), table);
    let rows = copy_batches(source, &mut sink).await?;
    info!(table, rows, "finished ingesting trip data");
    Ok(rows)
}
