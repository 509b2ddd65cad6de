//! ## Cleanup Step
//!
//! Deletes the local intermediate file once both uploads have completed. Never runs
//! after a failure: the pipeline runner skips downstream steps on the first error.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::exceptions::TaxiEtlResult;
use crate::pipeline::Step;

pub struct Cleanup {
    path: PathBuf,
}

impl Cleanup {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Step for Cleanup {
    async fn run(&self) -> TaxiEtlResult<()> {
        tokio::fs::remove_file(&self.path).await?;
        info!(path = %self.path.display(), "removed local intermediate file");
        Ok(())
    }
}
