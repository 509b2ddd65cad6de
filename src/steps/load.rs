//! ## Load Step
//!
//! Downloads the configured monthly trip files, reads them as one CSV scan with the
//! fixed trip schema (gzip-compressed inputs), and writes the concatenated dataset to
//! the local intermediate CSV.

use std::path::PathBuf;

use async_trait::async_trait;
use datafusion::datasource::file_format::file_compression_type::FileCompressionType;
use datafusion::prelude::{CsvReadOptions, SessionContext};
use tracing::info;

use super::write_csv_file;
use crate::download::download_file;
use crate::exceptions::{TaxiEtlError, TaxiEtlResult};
use crate::pipeline::Step;
use crate::schema::trip_schema;

pub struct LoadData {
    urls: Vec<String>,
    /// Directory the monthly files are downloaded into.
    download_dir: PathBuf,
    /// Path of the intermediate CSV this step produces.
    dest: PathBuf,
}

impl LoadData {
    pub fn new(urls: Vec<String>, download_dir: PathBuf, dest: PathBuf) -> Self {
        Self {
            urls,
            download_dir,
            dest,
        }
    }

    fn local_path(&self, url: &str) -> TaxiEtlResult<PathBuf> {
        let name = url.rsplit('/').next().filter(|n| !n.is_empty()).ok_or_else(|| {
            TaxiEtlError::InvalidParameter(format!("cannot derive a file name from URL '{}'", url))
        })?;
        Ok(self.download_dir.join(name))
    }
}

#[async_trait]
impl Step for LoadData {
    async fn run(&self) -> TaxiEtlResult<()> {
        let mut paths = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            let path = self.local_path(url)?;
            download_file(url, &path).await?;
            paths.push(path.to_string_lossy().into_owned());
        }

        let schema = trip_schema();
        let options = CsvReadOptions::new()
            .schema(schema.as_ref())
            .file_extension(".csv.gz")
            .file_compression_type(FileCompressionType::GZIP);
        let ctx = SessionContext::new();
        let df = ctx.read_csv(paths, options).await?;
        let batches = df.collect().await?;

        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        write_csv_file(&self.dest, &batches)?;
        info!(rows, dest = %self.dest.display(), "wrote intermediate dataset");
        Ok(())
    }
}
