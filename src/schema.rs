//! ## Trip Dataset Schema
//!
//! The fixed column set of NYC green taxi trip CSVs and the column-name conventions
//! applied by the transform stage. Categorical/ID columns are nullable `Int64`,
//! money/distance fields are `Float64`, and the two datetime columns are microsecond
//! timestamps. The raw files use mixed camel-case headers (`VendorID`, `PULocationID`);
//! [`to_snake_case`] produces the snake-case names used everywhere downstream.

use std::sync::{Arc, LazyLock};

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use regex::Regex;

/// The two datetime columns coerced to timestamps during ingestion.
pub const TIMESTAMP_COLUMNS: [&str; 2] = ["lpep_pickup_datetime", "lpep_dropoff_datetime"];

/// Column derived from the pickup timestamp, used as the partition key for the
/// columnar upload.
pub const PICKUP_DATE_COLUMN: &str = "lpep_pickup_date";

fn timestamp() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, None)
}

/// Schema of the raw trip CSVs, with the original mixed-case headers.
pub fn trip_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("VendorID", DataType::Int64, true),
        Field::new("lpep_pickup_datetime", timestamp(), true),
        Field::new("lpep_dropoff_datetime", timestamp(), true),
        Field::new("store_and_fwd_flag", DataType::Utf8, true),
        Field::new("RatecodeID", DataType::Int64, true),
        Field::new("PULocationID", DataType::Int64, true),
        Field::new("DOLocationID", DataType::Int64, true),
        Field::new("passenger_count", DataType::Int64, true),
        Field::new("trip_distance", DataType::Float64, true),
        Field::new("fare_amount", DataType::Float64, true),
        Field::new("extra", DataType::Float64, true),
        Field::new("mta_tax", DataType::Float64, true),
        Field::new("tip_amount", DataType::Float64, true),
        Field::new("tolls_amount", DataType::Float64, true),
        Field::new("ehail_fee", DataType::Float64, true),
        Field::new("improvement_surcharge", DataType::Float64, true),
        Field::new("total_amount", DataType::Float64, true),
        Field::new("payment_type", DataType::Int64, true),
        Field::new("trip_type", DataType::Int64, true),
        Field::new("congestion_surcharge", DataType::Float64, true),
    ]))
}

/// Schema of the intermediate dataset after the transform stage: snake-cased
/// column names plus the derived pickup-date column appended at the end.
pub fn transformed_trip_schema() -> SchemaRef {
    let mut fields: Vec<Field> = trip_schema()
        .fields()
        .iter()
        .map(|f| Field::new(to_snake_case(f.name()), f.data_type().clone(), f.is_nullable()))
        .collect();
    fields.push(Field::new(PICKUP_DATE_COLUMN, DataType::Date32, true));
    Arc::new(Schema::new(fields))
}

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"));

/// Converts a camel-case column name to snake case by inserting an underscore
/// between a lower/digit character and an upper character, then lowercasing.
/// Idempotent; names that are already snake case pass through unchanged.
pub fn to_snake_case(name: &str) -> String {
    CAMEL_BOUNDARY
        .replace_all(name, "${1}_${2}")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_renames() {
        assert_eq!(to_snake_case("VendorID"), "vendor_id");
        assert_eq!(to_snake_case("RatecodeID"), "ratecode_id");
        // Leading upper-case runs have no lower/digit boundary to split on.
        assert_eq!(to_snake_case("PULocationID"), "pulocation_id");
        assert_eq!(to_snake_case("DOLocationID"), "dolocation_id");
    }

    #[test]
    fn test_snake_case_passthrough() {
        assert_eq!(to_snake_case("passenger_count"), "passenger_count");
        assert_eq!(to_snake_case("lpep_pickup_datetime"), "lpep_pickup_datetime");
    }

    #[test]
    fn test_snake_case_idempotent() {
        for name in ["VendorID", "PULocationID", "trip_distance", "ehail_fee"] {
            let once = to_snake_case(name);
            let twice = to_snake_case(&once);
            assert_eq!(once, twice, "rename of '{}' is not idempotent", name);
        }
    }

    #[test]
    fn test_transformed_schema_shape() {
        let raw = trip_schema();
        let transformed = transformed_trip_schema();
        assert_eq!(transformed.fields().len(), raw.fields().len() + 1);
        assert!(transformed.field_with_name("vendor_id").is_ok());
        assert!(transformed.field_with_name("pulocation_id").is_ok());
        assert_eq!(
            transformed.fields().last().map(|f| f.name().as_str()),
            Some(PICKUP_DATE_COLUMN)
        );
    }
}
