//! # Pipeline Step Implementations
//!
//! The submodules contain the step implementations for the orchestrated green-taxi
//! ETL pipeline: load, transform, the two uploads, and cleanup.

pub mod cleanup;
pub mod database_upload;
pub mod load;
pub mod object_store_upload;
pub mod transform;

use std::fs::File;
use std::path::Path;

use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;

use crate::exceptions::TaxiEtlResult;

/// Writes batches as a single headered CSV file, replacing any prior file at `path`.
pub(crate) fn write_csv_file(path: &Path, batches: &[RecordBatch]) -> TaxiEtlResult<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    for batch in batches {
        writer.write(batch)?;
    }
    Ok(())
}
