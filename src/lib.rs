//! # Taxi ETL
//!
//! Batch ETL pipelines for NYC green taxi trip data, built on Apache DataFusion.
//!
//! The crate implements two linear pipelines:
//!
//! - **Standalone ingestion** (`ingest-data` binary): download a trips CSV and a
//!   zones reference CSV, replace-write the zones table, then chunk-ingest the trips
//!   into Postgres in fixed-size batches.
//! - **Orchestrated ETL** (`green-taxi-etl` binary): download the monthly trip files,
//!   concatenate them into a local intermediate CSV, clean/derive/rename/validate the
//!   rows, upload the result both as a partitioned Parquet dataset in a cloud object
//!   store and into a Postgres table (single transaction), then delete the
//!   intermediate file.
//!
//! Both pipelines are strictly sequential; every failure propagates to the process
//! boundary and aborts the run. The one distinguished failure is
//! [`exceptions::TaxiEtlError::DataQuality`], raised by the transform stage when an
//! explicit data-quality check fails.

pub mod database;
pub mod download;
pub mod exceptions;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod schema;
pub mod settings;
pub mod steps;
