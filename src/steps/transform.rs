//! ## Transform Step
//!
//! Cleans and validates the intermediate trip dataset:
//!
//! 1. data-quality gate: any incoming row with a passenger count of 0 or a trip
//!    distance of 0 raises the typed [`TaxiEtlError::DataQuality`] failure, so no
//!    downstream step runs;
//! 2. rows with non-positive passenger count or trip distance are dropped;
//! 3. `lpep_pickup_date` is derived from the pickup timestamp;
//! 4. all columns are renamed to snake case;
//! 5. vendor ids are checked against the set of values observed in this same batch.
//!
//! The vendor check is self-referential (the validity set is derived from the batch
//! being checked) and only guards against a later code path introducing foreign
//! values. It is a known weak invariant, not cross-batch validation.

use std::path::PathBuf;

use arrow::array::{Array, Int64Array};
use arrow::datatypes::DataType;
use async_trait::async_trait;
use datafusion::prelude::{col, ident, lit, CsvReadOptions, DataFrame, SessionContext};
use datafusion_expr::cast;
use tracing::info;

use super::write_csv_file;
use crate::exceptions::{TaxiEtlError, TaxiEtlResult};
use crate::pipeline::Step;
use crate::schema::{to_snake_case, trip_schema, PICKUP_DATE_COLUMN};

pub struct TransformData {
    /// Path of the intermediate CSV, read and rewritten in place.
    src: PathBuf,
}

impl TransformData {
    pub fn new(src: PathBuf) -> Self {
        Self { src }
    }
}

#[async_trait]
impl Step for TransformData {
    async fn run(&self) -> TaxiEtlResult<()> {
        let schema = trip_schema();
        let ctx = SessionContext::new();
        let df = ctx
            .read_csv(
                self.src.to_string_lossy().into_owned(),
                CsvReadOptions::new().schema(schema.as_ref()),
            )
            .await?;

        let transformed = transform_dataset(df).await?;
        let batches = transformed.collect().await?;
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();

        write_csv_file(&self.src, &batches)?;
        info!(rows, src = %self.src.display(), "rewrote intermediate dataset");
        Ok(())
    }
}

/// Applies the full transform to a trip DataFrame (raw column names) and returns the
/// cleaned, renamed DataFrame with the derived pickup-date column appended.
pub async fn transform_dataset(df: DataFrame) -> TaxiEtlResult<DataFrame> {
    // The data-quality gate runs against the incoming rows, so a zero-valued row
    // fails the run instead of being silently dropped by the filters below.
    let zero_passengers = df
        .clone()
        .filter(col("passenger_count").eq(lit(0_i64)))?
        .count()
        .await?;
    if zero_passengers > 0 {
        return Err(TaxiEtlError::DataQuality(format!(
            "passenger count is not greater than 0 for {} row(s)",
            zero_passengers
        )));
    }
    let zero_distance = df
        .clone()
        .filter(col("trip_distance").eq(lit(0.0_f64)))?
        .count()
        .await?;
    if zero_distance > 0 {
        return Err(TaxiEtlError::DataQuality(format!(
            "trip distance is not greater than 0 for {} row(s)",
            zero_distance
        )));
    }

    // Drop the remaining non-positive rows (negative values, NULL comparisons).
    let df = df
        .filter(col("passenger_count").gt(lit(0_i64)))?
        .filter(col("trip_distance").gt(lit(0.0_f64)))?;

    // Derive the partition-key date column from the pickup timestamp.
    let df = df.with_column(
        PICKUP_DATE_COLUMN,
        cast(col("lpep_pickup_datetime"), DataType::Date32),
    )?;

    // Rename every column from mixed/camel case to snake case.
    let renames = df
        .schema()
        .fields()
        .iter()
        .map(|f| ident(f.name()).alias(to_snake_case(f.name())))
        .collect::<Vec<_>>();
    let df = df.select(renames)?;

    // Vendor self-consistency check over the renamed frame.
    let vendors = distinct_vendor_ids(&df).await?;
    if !vendors.is_empty() {
        let valid = vendors.iter().map(|v| lit(*v)).collect::<Vec<_>>();
        let foreign = df
            .clone()
            .filter(col("vendor_id").in_list(valid, true))?
            .count()
            .await?;
        if foreign > 0 {
            return Err(TaxiEtlError::DataQuality(format!(
                "vendor_id is not one of the existing values for {} row(s)",
                foreign
            )));
        }
    }

    Ok(df)
}

/// Collects the distinct non-null vendor ids observed in the dataset.
async fn distinct_vendor_ids(df: &DataFrame) -> TaxiEtlResult<Vec<i64>> {
    let batches = df
        .clone()
        .select(vec![col("vendor_id")])?
        .distinct()?
        .collect()
        .await?;
    let mut values = Vec::new();
    for batch in batches {
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| {
                TaxiEtlError::InvalidParameter(format!(
                    "vendor_id must be Int64, found {:?}",
                    batch.column(0).data_type()
                ))
            })?;
        for i in 0..array.len() {
            if !array.is_null(i) {
                values.push(array.value(i));
            }
        }
    }
    Ok(values)
}
