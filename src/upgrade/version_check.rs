use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::RequestOptions;
use crate::core::UpdateError;
use crate::upgrade::manifest::UpdateManifest;
use crate::upgrade::transport::Transport;

/// Payload of the version-check endpoint.
///
/// Both fields are optional on the wire. Older servers spell them
/// `last` and `source`; some send both spellings, in which case the
/// descriptive `latestVersion` / `sourceURL` win.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default, rename = "latestVersion")]
    latest_version: Option<String>,
    #[serde(default)]
    last: Option<String>,
    #[serde(default, rename = "sourceURL")]
    source_url: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

impl ApiResponse {
    fn latest_version(&mut self) -> Option<String> {
        non_empty(self.latest_version.take()).or_else(|| non_empty(self.last.take()))
    }

    fn source_url(&mut self) -> Option<String> {
        non_empty(self.source_url.take()).or_else(|| non_empty(self.source.take()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Asks the version-check endpoint whether a newer package exists.
///
/// One request per [`check`](Self::check), no retries. The answer is one of:
///
/// | Outcome | Result |
/// |---------|--------|
/// | no current version | [`UpdateError::VersionNotSpecified`] (no request made) |
/// | request failed | [`UpdateError::CannotConnectToApi`] |
/// | empty/malformed body, no `latestVersion` | [`UpdateError::ApiResponseNotValid`] |
/// | `latestVersion` but no `sourceURL` | [`UpdateError::NoUpdateAvailable`] |
/// | both fields | `Ok(manifest)` |
///
/// # Examples
///
/// ```rust,no_run
/// use pkgswap::config::RequestOptions;
/// use pkgswap::upgrade::{HttpTransport, VersionChecker};
///
/// # async fn example() -> anyhow::Result<()> {
/// let transport = HttpTransport::new()?;
/// let options = RequestOptions::default();
/// let checker = VersionChecker::new("https://updates.example.com/check", &options, &transport);
///
/// match checker.check(Some("1.0.0")).await {
///     Ok(manifest) => println!("Update available: {:?}", manifest.latest_version()),
///     Err(e) if e.is_up_to_date() => println!("Up to date"),
///     Err(e) => eprintln!("Check failed: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct VersionChecker<'a, T: Transport> {
    endpoint: &'a str,
    options: &'a RequestOptions,
    transport: &'a T,
}

impl<'a, T: Transport> VersionChecker<'a, T> {
    /// Create a checker for `endpoint` that sends `options` with every request.
    pub fn new(endpoint: &'a str, options: &'a RequestOptions, transport: &'a T) -> Self {
        Self {
            endpoint,
            options,
            transport,
        }
    }

    /// Report `current_version` to the endpoint and interpret the answer.
    ///
    /// # Errors
    ///
    /// See the table on [`VersionChecker`]; every failure is one of the four
    /// check-stage [`UpdateError`] variants.
    pub async fn check(&self, current_version: Option<&str>) -> Result<UpdateManifest, UpdateError> {
        let Some(current_version) = current_version.map(str::trim).filter(|v| !v.is_empty()) else {
            warn!("The current version was not specified; not contacting {}", self.endpoint);
            return Err(UpdateError::VersionNotSpecified);
        };

        debug!("Checking for updates at {} (current version {})", self.endpoint, current_version);
        let options = self.options.with_current_version(current_version);

        let body = match self.transport.post_form(self.endpoint, &options).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not connect to {}: {}", self.endpoint, e);
                return Err(UpdateError::CannotConnectToApi {
                    endpoint: self.endpoint.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        debug!("Connected to {}", self.endpoint);

        let manifest = interpret_response(&body).inspect_err(|e| match e {
            UpdateError::NoUpdateAvailable {
                ..
            } => info!("No updates available"),
            other => warn!("{other}"),
        })?;

        if let Some(latest) = manifest.latest_version() {
            info!("Update available: {} -> {}", current_version, latest);
            warn_if_not_newer(current_version, latest);
        }
        Ok(manifest)
    }
}

/// Classify a version-check response body.
pub(crate) fn interpret_response(body: &str) -> Result<UpdateManifest, UpdateError> {
    if body.trim().is_empty() {
        return Err(UpdateError::ApiResponseNotValid {
            reason: "empty response".to_string(),
        });
    }

    let mut response: ApiResponse =
        serde_json::from_str(body).map_err(|e| UpdateError::ApiResponseNotValid {
            reason: format!("{e} in {:?}", truncate(body)),
        })?;

    let Some(latest_version) = response.latest_version() else {
        return Err(UpdateError::ApiResponseNotValid {
            reason: "missing `latestVersion`".to_string(),
        });
    };

    match response.source_url() {
        Some(source_url) => Ok(UpdateManifest::offered(latest_version, source_url)),
        None => Err(UpdateError::NoUpdateAvailable {
            latest_version,
        }),
    }
}

/// The endpoint decides what to offer; a downgrade is logged, not refused.
fn warn_if_not_newer(current: &str, latest: &str) {
    let (Ok(current), Ok(latest)) = (
        semver::Version::parse(current.trim_start_matches('v')),
        semver::Version::parse(latest.trim_start_matches('v')),
    ) else {
        return;
    };

    if latest <= current {
        warn!("Endpoint offered {} which is not newer than the current {}", latest, current);
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 120;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    fn kind_of(body: &str) -> Option<ErrorKind> {
        interpret_response(body).err().and_then(|e| e.kind())
    }

    #[test]
    fn test_interpret_update_available() {
        let manifest =
            interpret_response(r#"{"latestVersion":"1.2.0","sourceURL":"https://host/pkg"}"#)
                .unwrap();
        assert_eq!(manifest.latest_version(), Some("1.2.0"));
        assert_eq!(manifest.source_url(), Some("https://host/pkg"));
        assert!(manifest.local_file_path().is_none());
    }

    #[test]
    fn test_interpret_accepts_short_field_names() {
        let manifest = interpret_response(r#"{"last":"2.0.0","source":"https://host/2"}"#).unwrap();
        assert_eq!(manifest.latest_version(), Some("2.0.0"));
        assert_eq!(manifest.source_url(), Some("https://host/2"));

        let manifest = interpret_response(
            r#"{"last":"1.2.0","latestVersion":"1.2.0","source":"https://h/p","sourceURL":"https://h/p"}"#,
        )
        .unwrap();
        assert_eq!(manifest.latest_version(), Some("1.2.0"));
        assert_eq!(manifest.source_url(), Some("https://h/p"));

        let manifest =
            interpret_response(r#"{"latestVersion":"","last":"3.0.0","sourceURL":"https://h/3"}"#)
                .unwrap();
        assert_eq!(manifest.latest_version(), Some("3.0.0"));
    }

    #[test]
    fn test_interpret_no_source_is_up_to_date() {
        let err = interpret_response(r#"{"latestVersion":"1.2.0"}"#).unwrap_err();
        assert_eq!(
            err,
            UpdateError::NoUpdateAvailable {
                latest_version: "1.2.0".to_string()
            }
        );

        assert_eq!(
            kind_of(r#"{"latestVersion":"1.2.0","sourceURL":""}"#),
            Some(ErrorKind::NoUpdateAvailable)
        );
    }

    #[test]
    fn test_interpret_malformed_bodies() {
        for body in [
            "",
            "   ",
            "not json",
            "<html>502 Bad Gateway</html>",
            "[]",
            "null",
            "{}",
            r#"{"sourceURL":"https://host/pkg"}"#,
            r#"{"latestVersion":""}"#,
            r#"{"latestVersion":12}"#,
        ] {
            assert_eq!(kind_of(body), Some(ErrorKind::ApiResponseNotValid), "body {body:?}");
        }
    }

    #[test]
    fn test_truncate_long_bodies() {
        let long = "x".repeat(500);
        let short = truncate(&long);
        assert_eq!(short.len(), 123);
        assert!(short.ends_with("..."));
        assert_eq!(truncate("short"), "short");
    }
}
