//! ## Custom Errors for Taxi ETL
//!
//! This module defines custom error types for the taxi-etl crate.
//! It uses the `thiserror` crate to derive the `Error` trait for custom error types.
//! The `TaxiEtlError` enum includes variants representing different error scenarios
//! encountered throughout the pipelines, making error handling straightforward and clear.
//!
//! The `TaxiEtlResult` type alias simplifies error handling by providing a convenient
//! alias for results returned by the crate.
//!
//! The only error kind callers are expected to inspect is [`TaxiEtlError::DataQuality`]:
//! it marks a business-rule failure (an explicit data-quality check) as opposed to an
//! infrastructure failure. Behaviorally both abort the run.
//!
//! ### Example
//!
//! ```rust
//! use taxi_etl::exceptions::{TaxiEtlError, TaxiEtlResult};
//!
//! fn check_rows() -> TaxiEtlResult<()> {
//!     Err(TaxiEtlError::DataQuality("passenger count is not greater than 0".into()))
//! }
//! ```

use thiserror::Error;

/// Errors specific to the taxi-etl pipelines.
#[derive(Debug, Error)]
pub enum TaxiEtlError {
    /// Wraps underlying I/O errors.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wraps errors from DataFusion.
    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] datafusion::error::DataFusionError),

    /// Wraps errors from Arrow.
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Wraps errors from Parquet.
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Wraps transfer errors from the HTTP client.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Wraps errors from the database driver.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Wraps errors from the object store.
    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    /// Indicates that an invalid parameter was provided (e.g., a malformed port or URL).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Indicates that the specified column does not exist in the dataset.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Indicates that a required environment variable is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A data-quality check failed. This is the typed business-rule failure raised by
    /// the transform stage so callers can distinguish it from infrastructure errors.
    #[error("Data quality check failed: {0}")]
    DataQuality(String),
}

/// A convenient result type for taxi-etl operations.
pub type TaxiEtlResult<T> = std::result::Result<T, TaxiEtlError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        // Create a simple I/O error.
        let io_err = io::Error::new(io::ErrorKind::Other, "test io error");
        let err: TaxiEtlError = io_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("I/O error:"));
        assert!(err_msg.contains("test io error"));
    }

    #[test]
    fn test_datafusion_error() {
        // Create a DataFusion error.
        let df_err = datafusion::error::DataFusionError::Plan("test plan error".into());
        let err: TaxiEtlError = df_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("DataFusion error:"));
        assert!(err_msg.contains("test plan error"));
    }

    #[test]
    fn test_arrow_error() {
        // Create an Arrow error.
        let arrow_err = arrow::error::ArrowError::ComputeError("test compute error".into());
        let err: TaxiEtlError = arrow_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Arrow error:"));
        assert!(err_msg.contains("test compute error"));
    }

    #[test]
    fn test_invalid_parameter_error() {
        let err = TaxiEtlError::InvalidParameter("bad port".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Invalid parameter:"));
        assert!(err_msg.contains("bad port"));
    }

    #[test]
    fn test_missing_column_error() {
        let err = TaxiEtlError::MissingColumn("lpep_pickup_datetime".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Missing column:"));
        assert!(err_msg.contains("lpep_pickup_datetime"));
    }

    #[test]
    fn test_missing_env_var_error() {
        let err = TaxiEtlError::MissingEnvVar("LOCAL_POSTGRES_USER".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Missing environment variable:"));
        assert!(err_msg.contains("LOCAL_POSTGRES_USER"));
    }

    #[test]
    fn test_data_quality_error() {
        let err = TaxiEtlError::DataQuality("trip distance is not greater than 0".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Data quality check failed:"));
        assert!(err_msg.contains("trip distance"));
        assert!(matches!(err, TaxiEtlError::DataQuality(_)));
    }
}
