use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::memory::MemTable;
use datafusion::prelude::*;
use tempfile::TempDir;

use taxi_etl::exceptions::TaxiEtlResult;
use taxi_etl::schema::PICKUP_DATE_COLUMN;
use taxi_etl::steps::object_store_upload::write_partitioned;

// 2020-10-01..2020-10-03 in days since the epoch.
const DAYS: [i32; 3] = [18536, 18537, 18538];

async fn create_dataframe() -> DataFrame {
    let schema = Arc::new(Schema::new(vec![
        Field::new("vendor_id", DataType::Int64, true),
        Field::new("trip_distance", DataType::Float64, true),
        Field::new(PICKUP_DATE_COLUMN, DataType::Date32, true),
    ]));

    // Five rows over three distinct pickup dates.
    let vendor: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 2, 1, 2]));
    let distance: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 2.5, 0.7, 3.3, 9.9]));
    let dates: ArrayRef = Arc::new(Date32Array::from(vec![
        DAYS[0], DAYS[0], DAYS[1], DAYS[2], DAYS[2],
    ]));

    let batch = RecordBatch::try_new(schema.clone(), vec![vendor, distance, dates]).unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table("trips", Arc::new(mem_table)).unwrap();
    ctx.table("trips").await.unwrap()
}

#[tokio::test]
async fn test_one_partition_directory_per_distinct_date() -> TaxiEtlResult<()> {
    let df = create_dataframe().await;
    let dir = TempDir::new()?;
    let root = format!("{}/", dir.path().display());

    write_partitioned(df, &root).await?;

    let mut partitions: Vec<String> = std::fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(&format!("{}=", PICKUP_DATE_COLUMN)))
        .collect();
    partitions.sort();

    assert_eq!(
        partitions,
        vec![
            "lpep_pickup_date=2020-10-01",
            "lpep_pickup_date=2020-10-02",
            "lpep_pickup_date=2020-10-03",
        ]
    );

    // Each partition directory holds at least one Parquet file.
    for partition in &partitions {
        let files = std::fs::read_dir(dir.path().join(partition))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .count();
        assert!(files > 0, "partition '{}' is empty", partition);
    }
    Ok(())
}
