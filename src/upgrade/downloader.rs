use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::RequestOptions;
use crate::core::UpdateError;
use crate::upgrade::layout::InstallLayout;
use crate::upgrade::manifest::UpdateManifest;
use crate::upgrade::transport::Transport;

/// Fetches the offered package into the fixed staging file.
///
/// The package is written to [`InstallLayout::staged_package`], overwriting
/// any leftover from an earlier attempt. The installed package is never
/// touched here.
pub struct PackageDownloader<'a, T: Transport> {
    layout: &'a InstallLayout,
    options: &'a RequestOptions,
    transport: &'a T,
}

impl<'a, T: Transport> PackageDownloader<'a, T> {
    /// Create a downloader that stages into `layout`.
    pub fn new(layout: &'a InstallLayout, options: &'a RequestOptions, transport: &'a T) -> Self {
        Self {
            layout,
            options,
            transport,
        }
    }

    /// Download `manifest.source_url()` and record the staged path on success.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::UpdateFileNotFound`] when the server answers 404
    /// - [`UpdateError::FailedToDownloadUpdate`] on any other transport failure
    /// - [`UpdateError::FailedToApplyUpdate`] when the bytes cannot be written
    ///
    /// On error `manifest.local_file_path()` stays unset.
    pub async fn download(&self, manifest: &mut UpdateManifest) -> Result<PathBuf, UpdateError> {
        let Some(url) = manifest.source_url().map(str::to_owned) else {
            return Err(UpdateError::FailedToDownloadUpdate {
                url: String::new(),
                reason: "no source URL recorded".to_string(),
            });
        };

        info!("Downloading update from {}", url);
        let bytes = self.transport.get_bytes(&url, self.options).await.map_err(|e| {
            warn!("Download from {} failed: {}", url, e);
            if e.is_not_found() {
                UpdateError::UpdateFileNotFound {
                    url: url.clone(),
                }
            } else {
                UpdateError::FailedToDownloadUpdate {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;
        debug!("Downloaded {} bytes", bytes.len());

        let staged = self.layout.staged_package();
        fs::write(&staged, &bytes).await.map_err(|e| {
            warn!("Could not write {}: {}", staged.display(), e);
            UpdateError::FailedToApplyUpdate {
                reason: format!("cannot write {}: {e}", staged.display()),
            }
        })?;

        info!("Update staged at {}", staged.display());
        manifest.record_download(staged.clone());
        Ok(staged)
    }
}
