//! ## Postgres Batch Sink
//!
//! [`PostgresSink`] writes record batches to a Postgres table through `sqlx`:
//!
//! - `create` drops and recreates the destination table from the batch schema
//!   (replace-on-write), mapping Arrow types to Postgres column types.
//! - `append` renders bounded multi-row `INSERT` statements from each batch.
//! - `ensure_schema` idempotently creates the target schema/namespace.
//! - `begin`/`commit` optionally wrap all writes in a single transaction, committed
//!   once after the final chunk (the orchestrated upload uses this; the standalone
//!   ingestion script does not).

use arrow::array::{
    Array, BooleanArray, Date32Array, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use arrow::temporal_conversions::{date32_to_datetime, timestamp_us_to_datetime};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::Postgres;
use sqlx::{PgPool, Transaction};
use tracing::debug;

use crate::exceptions::{TaxiEtlError, TaxiEtlResult};
use crate::ingest::BatchSink;

/// Rows rendered into a single `INSERT` statement.
const ROWS_PER_INSERT: usize = 1000;

/// A [`BatchSink`] writing to a Postgres table, optionally namespaced and optionally
/// transactional.
pub struct PostgresSink {
    pool: PgPool,
    table: String,
    schema: Option<String>,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresSink {
    pub fn new(pool: PgPool, table: &str) -> Self {
        Self {
            pool,
            table: table.to_string(),
            schema: None,
            tx: None,
        }
    }

    /// Target an explicit schema/namespace instead of the connection default.
    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    /// Opens a transaction; every subsequent write runs inside it until [`commit`].
    ///
    /// [`commit`]: PostgresSink::commit
    pub async fn begin(&mut self) -> TaxiEtlResult<()> {
        if self.tx.is_some() {
            return Err(TaxiEtlError::InvalidParameter(
                "transaction already open".to_string(),
            ));
        }
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    /// Commits the open transaction.
    pub async fn commit(&mut self) -> TaxiEtlResult<()> {
        match self.tx.take() {
            Some(tx) => {
                tx.commit().await?;
                Ok(())
            }
            None => Err(TaxiEtlError::InvalidParameter(
                "no open transaction to commit".to_string(),
            )),
        }
    }

    /// Idempotently creates the target schema/namespace, if one is configured.
    pub async fn ensure_schema(&mut self) -> TaxiEtlResult<()> {
        if let Some(schema) = self.schema.clone() {
            let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&schema));
            self.execute(&sql).await?;
        }
        Ok(())
    }

    fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.table)),
            None => quote_ident(&self.table),
        }
    }

    async fn execute(&mut self, sql: &str) -> TaxiEtlResult<()> {
        match &mut self.tx {
            Some(tx) => {
                sqlx::query(sql).execute(&mut **tx).await?;
            }
            None => {
                sqlx::query(sql).execute(&self.pool).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BatchSink for PostgresSink {
    async fn create(&mut self, schema: &SchemaRef) -> TaxiEtlResult<()> {
        let table = self.qualified_table();
        self.execute(&format!("DROP TABLE IF EXISTS {}", table)).await?;
        let ddl = create_table_sql(&table, schema)?;
        debug!(%table, "creating destination table");
        self.execute(&ddl).await
    }

    async fn append(&mut self, batch: &RecordBatch) -> TaxiEtlResult<()> {
        let table = self.qualified_table();
        for statement in insert_statements(&table, batch, ROWS_PER_INSERT)? {
            self.execute(&statement).await?;
        }
        Ok(())
    }
}

/// Quotes an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Maps an Arrow data type to a Postgres column type.
pub fn pg_type(data_type: &DataType) -> TaxiEtlResult<&'static str> {
    match data_type {
        DataType::Boolean => Ok("BOOLEAN"),
        DataType::Int8 | DataType::Int16 | DataType::Int32 => Ok("INTEGER"),
        DataType::Int64 | DataType::UInt32 | DataType::UInt64 => Ok("BIGINT"),
        DataType::Float32 => Ok("REAL"),
        DataType::Float64 => Ok("DOUBLE PRECISION"),
        DataType::Utf8 | DataType::LargeUtf8 => Ok("TEXT"),
        DataType::Timestamp(_, _) => Ok("TIMESTAMP"),
        DataType::Date32 | DataType::Date64 => Ok("DATE"),
        DataType::Null => Ok("TEXT"),
        other => Err(TaxiEtlError::InvalidParameter(format!(
            "no Postgres column type for Arrow type {:?}",
            other
        ))),
    }
}

/// Renders the `CREATE TABLE` statement for a batch schema.
pub fn create_table_sql(qualified_table: &str, schema: &Schema) -> TaxiEtlResult<String> {
    let columns = schema
        .fields()
        .iter()
        .map(|f| Ok(format!("{} {}", quote_ident(f.name()), pg_type(f.data_type())?)))
        .collect::<TaxiEtlResult<Vec<_>>>()?;
    Ok(format!(
        "CREATE TABLE {} ({})",
        qualified_table,
        columns.join(", ")
    ))
}

/// Renders the multi-row `INSERT` statements for a batch, bounded to
/// `rows_per_insert` rows per statement.
pub fn insert_statements(
    qualified_table: &str,
    batch: &RecordBatch,
    rows_per_insert: usize,
) -> TaxiEtlResult<Vec<String>> {
    let schema = batch.schema();
    let column_list = schema
        .fields()
        .iter()
        .map(|f| quote_ident(f.name()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut statements = Vec::new();
    let mut row = 0;
    while row < batch.num_rows() {
        let end = (row + rows_per_insert).min(batch.num_rows());
        let mut tuples = Vec::with_capacity(end - row);
        for r in row..end {
            let values = batch
                .columns()
                .iter()
                .map(|array| sql_literal(array.as_ref(), r))
                .collect::<TaxiEtlResult<Vec<_>>>()?;
            tuples.push(format!("({})", values.join(", ")));
        }
        statements.push(format!(
            "INSERT INTO {} ({}) VALUES {}",
            qualified_table,
            column_list,
            tuples.join(", ")
        ));
        row = end;
    }
    Ok(statements)
}

/// Renders a single array element as an SQL literal.
pub fn sql_literal(array: &dyn Array, row: usize) -> TaxiEtlResult<String> {
    if array.is_null(row) {
        return Ok("NULL".to_string());
    }
    match array.data_type() {
        DataType::Boolean => {
            let a = downcast::<BooleanArray>(array)?;
            Ok(if a.value(row) { "TRUE" } else { "FALSE" }.to_string())
        }
        DataType::Int32 => Ok(downcast::<Int32Array>(array)?.value(row).to_string()),
        DataType::Int64 => Ok(downcast::<Int64Array>(array)?.value(row).to_string()),
        DataType::Float32 => Ok(downcast::<Float32Array>(array)?.value(row).to_string()),
        DataType::Float64 => Ok(downcast::<Float64Array>(array)?.value(row).to_string()),
        DataType::Utf8 => {
            let a = downcast::<StringArray>(array)?;
            Ok(format!("'{}'", a.value(row).replace('\'', "''")))
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let a = downcast::<TimestampMicrosecondArray>(array)?;
            let dt: NaiveDateTime = timestamp_us_to_datetime(a.value(row)).ok_or_else(|| {
                TaxiEtlError::InvalidParameter(format!(
                    "timestamp value {} out of range",
                    a.value(row)
                ))
            })?;
            Ok(format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.6f")))
        }
        DataType::Date32 => {
            let a = downcast::<Date32Array>(array)?;
            let dt = date32_to_datetime(a.value(row)).ok_or_else(|| {
                TaxiEtlError::InvalidParameter(format!("date value {} out of range", a.value(row)))
            })?;
            Ok(format!("'{}'", dt.format("%Y-%m-%d")))
        }
        other => Err(TaxiEtlError::InvalidParameter(format!(
            "cannot render Arrow type {:?} as an SQL literal",
            other
        ))),
    }
}

fn downcast<T: 'static>(array: &dyn Array) -> TaxiEtlResult<&T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        TaxiEtlError::InvalidParameter(format!(
            "array/type mismatch for Arrow type {:?}",
            array.data_type()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::Field;
    use std::sync::Arc;

    fn trip_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("VendorID", DataType::Int64, true),
            Field::new("trip_distance", DataType::Float64, true),
            Field::new("store_and_fwd_flag", DataType::Utf8, true),
            Field::new(
                "lpep_pickup_datetime",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                true,
            ),
            Field::new("lpep_pickup_date", DataType::Date32, true),
        ]));
        // 2020-10-01 00:05:30 UTC in microseconds.
        let ts = 1_601_510_730_000_000i64;
        // 2020-10-01 in days since the epoch.
        let date = 18536i32;
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![Some(2), None])),
                Arc::new(Float64Array::from(vec![Some(1.5), Some(3.0)])),
                Arc::new(StringArray::from(vec![Some("N"), Some("it's")])),
                Arc::new(TimestampMicrosecondArray::from(vec![Some(ts), None])),
                Arc::new(Date32Array::from(vec![Some(date), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("green_taxi"), "\"green_taxi\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_create_table_sql() {
        let batch = trip_batch();
        let ddl = create_table_sql("\"green_taxi\"", &batch.schema()).unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE \"green_taxi\" (\"VendorID\" BIGINT, \
             \"trip_distance\" DOUBLE PRECISION, \"store_and_fwd_flag\" TEXT, \
             \"lpep_pickup_datetime\" TIMESTAMP, \"lpep_pickup_date\" DATE)"
        );
    }

    #[test]
    fn test_insert_statement_literals() {
        let batch = trip_batch();
        let statements = insert_statements("\"green_taxi\"", &batch, 1000).unwrap();
        assert_eq!(statements.len(), 1);
        let sql = &statements[0];
        assert!(sql.starts_with("INSERT INTO \"green_taxi\" (\"VendorID\","));
        // First row: all values present, string untouched, timestamp/date rendered.
        assert!(sql.contains("(2, 1.5, 'N', '2020-10-01 00:05:30.000000', '2020-10-01')"));
        // Second row: NULLs render bare, embedded quote is doubled.
        assert!(sql.contains("(NULL, 3, 'it''s', NULL, NULL)"));
    }

    #[test]
    fn test_insert_statements_are_bounded() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, false)]));
        let values: Vec<i64> = (0..25).collect();
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap();
        let statements = insert_statements("\"t\"", &batch, 10).unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0].matches('(').count(), 11); // column list + 10 tuples
        assert_eq!(statements[2].matches('(').count(), 6); // column list + 5 tuples
    }

    #[test]
    fn test_pg_type_mapping() {
        assert_eq!(pg_type(&DataType::Int64).unwrap(), "BIGINT");
        assert_eq!(pg_type(&DataType::Float64).unwrap(), "DOUBLE PRECISION");
        assert_eq!(pg_type(&DataType::Utf8).unwrap(), "TEXT");
        assert_eq!(
            pg_type(&DataType::Timestamp(TimeUnit::Microsecond, None)).unwrap(),
            "TIMESTAMP"
        );
        assert_eq!(pg_type(&DataType::Date32).unwrap(), "DATE");
        assert!(pg_type(&DataType::Binary).is_err());
    }
}
