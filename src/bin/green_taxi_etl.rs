//! Orchestrated green-taxi ETL: load → transform → upload to object store → upload to
//! database → cleanup. Configuration comes from the environment (see
//! [`taxi_etl::settings::EtlSettings`]); scheduling and step retries belong to the
//! environment invoking this binary, which runs the chain exactly once.

use taxi_etl::exceptions::TaxiEtlResult;
use taxi_etl::make_pipeline;
use taxi_etl::settings::{EtlSettings, DATASET_URLS, DEFAULT_DB_SCHEMA, DEFAULT_DB_TABLE};
use taxi_etl::steps::cleanup::Cleanup;
use taxi_etl::steps::database_upload::UploadToDatabase;
use taxi_etl::steps::load::LoadData;
use taxi_etl::steps::object_store_upload::UploadToObjectStore;
use taxi_etl::steps::transform::TransformData;

#[tokio::main]
async fn main() -> TaxiEtlResult<()> {
    let settings = EtlSettings::from_env()?;
    let intermediate = settings.intermediate_path();

    let urls = DATASET_URLS.iter().map(|u| u.to_string()).collect();
    let pipeline = make_pipeline!(
        true,
        (
            "load_data",
            LoadData::new(urls, settings.home.clone(), intermediate.clone())
        ),
        ("transform_data", TransformData::new(intermediate.clone())),
        (
            "upload_to_object_store",
            UploadToObjectStore::new(intermediate.clone(), settings.object_store.clone())
        ),
        (
            "upload_to_database",
            UploadToDatabase::new(
                intermediate.clone(),
                settings.database.clone(),
                DEFAULT_DB_TABLE,
                DEFAULT_DB_SCHEMA,
                settings.batch_size,
            )
        ),
        ("cleanup", Cleanup::new(intermediate)),
    );

    pipeline.run().await
}
