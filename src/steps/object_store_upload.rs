//! ## Object-Store Upload Step
//!
//! Loads the transformed dataset and writes it as a Parquet dataset under the cloud
//! bucket, partitioned by the derived pickup-date column: one directory per distinct
//! date. Conflicts with files from prior runs follow the Parquet writer's default
//! policy; this step does not compact or protect overlapping partitions.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::prelude::{CsvReadOptions, DataFrame, SessionContext};
use object_store::gcp::GoogleCloudStorageBuilder;
use tracing::info;
use url::Url;

use crate::exceptions::{TaxiEtlError, TaxiEtlResult};
use crate::pipeline::Step;
use crate::schema::{transformed_trip_schema, PICKUP_DATE_COLUMN};
use crate::settings::{ObjectStoreSettings, OBJECT_STORE_TABLE};

pub struct UploadToObjectStore {
    src: PathBuf,
    settings: ObjectStoreSettings,
}

impl UploadToObjectStore {
    pub fn new(src: PathBuf, settings: ObjectStoreSettings) -> Self {
        Self { src, settings }
    }
}

#[async_trait]
impl Step for UploadToObjectStore {
    async fn run(&self) -> TaxiEtlResult<()> {
        let ctx = SessionContext::new();

        // Credentials come from the environment (application default credentials).
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&self.settings.bucket)
            .build()?;
        let bucket_url = Url::parse(&format!("gs://{}", self.settings.bucket))
            .map_err(|e| TaxiEtlError::InvalidParameter(format!("bad bucket URL: {}", e)))?;
        ctx.register_object_store(&bucket_url, Arc::new(store));

        let schema = transformed_trip_schema();
        let df = ctx
            .read_csv(
                self.src.to_string_lossy().into_owned(),
                CsvReadOptions::new().schema(schema.as_ref()),
            )
            .await?;

        let root = format!("gs://{}/{}/", self.settings.bucket, OBJECT_STORE_TABLE);
        info!(
            bucket = %self.settings.bucket,
            project_id = %self.settings.project_id,
            root = %root,
            "uploading partitioned dataset"
        );
        write_partitioned(df, &root).await
    }
}

/// Writes `df` as a Parquet dataset under `root`, partitioned by the derived
/// pickup-date column. Works against any registered object store or a local path.
pub async fn write_partitioned(df: DataFrame, root: &str) -> TaxiEtlResult<()> {
    df.write_parquet(
        root,
        DataFrameWriteOptions::new().with_partition_by(vec![PICKUP_DATE_COLUMN.to_string()]),
        None,
    )
    .await?;
    Ok(())
}
