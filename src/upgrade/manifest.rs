use serde::Serialize;
use std::path::{Path, PathBuf};

/// What the current update attempt has discovered so far.
///
/// Fields are filled strictly in order: `latest_version`, then `source_url`
/// (both by a successful check), then `local_file_path` (by a successful
/// download). Each transitions once from `None`; a fresh check starts from a
/// fresh manifest.
///
/// The manifest is owned by the attempt that produced it. Hosts only ever
/// see it through a shared reference or a clone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateManifest {
    latest_version: Option<String>,
    source_url: Option<String>,
    local_file_path: Option<PathBuf>,
}

impl UpdateManifest {
    /// Manifest for a release the endpoint offered.
    pub(crate) fn offered(latest_version: String, source_url: String) -> Self {
        Self {
            latest_version: Some(latest_version),
            source_url: Some(source_url),
            local_file_path: None,
        }
    }

    /// Record where the package was written.
    pub(crate) fn record_download(&mut self, path: PathBuf) {
        debug_assert!(self.source_url.is_some(), "download recorded before a source URL");
        debug_assert!(self.local_file_path.is_none(), "download recorded twice");
        self.local_file_path = Some(path);
    }

    /// Newest version the endpoint reported.
    #[must_use]
    pub fn latest_version(&self) -> Option<&str> {
        self.latest_version.as_deref()
    }

    /// Where the package can be downloaded from.
    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    /// Where the package was written locally.
    #[must_use]
    pub fn local_file_path(&self) -> Option<&Path> {
        self.local_file_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_fill_in_order() {
        let empty = UpdateManifest::default();
        assert!(empty.latest_version().is_none());
        assert!(empty.source_url().is_none());
        assert!(empty.local_file_path().is_none());

        let mut manifest =
            UpdateManifest::offered("1.2.0".to_string(), "https://host/pkg".to_string());
        assert_eq!(manifest.latest_version(), Some("1.2.0"));
        assert_eq!(manifest.source_url(), Some("https://host/pkg"));
        assert!(manifest.local_file_path().is_none());

        manifest.record_download(PathBuf::from("/opt/app/update.asar"));
        assert_eq!(manifest.local_file_path(), Some(Path::new("/opt/app/update.asar")));
    }
}
