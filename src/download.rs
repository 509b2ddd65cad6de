//! ## File Downloader
//!
//! Fetches a remote file and stores it at a known local path, overwriting any prior
//! file. There is no retry logic and no integrity check beyond the transfer status of
//! the HTTP client; a failed transfer aborts the run.

use std::path::Path;

use tracing::info;

use crate::exceptions::TaxiEtlResult;

/// Downloads `url` to `dest`, creating parent directories as needed.
pub async fn download_file(url: &str, dest: &Path) -> TaxiEtlResult<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let response = reqwest::get(url).await?.error_for_status()?;
    let body = response.bytes().await?;
    tokio::fs::write(dest, &body).await?;

    info!(url, dest = %dest.display(), bytes = body.len(), "downloaded file");
    Ok(())
}
