//! Update pipeline over real HTTP against a mock endpoint.

use std::sync::{Arc, Mutex};

use mockito::{Matcher, Server};
use pkgswap::core::{ErrorKind, UpdateError};
use pkgswap::test_utils::{InstallFixture, RecordingSpawner, init_test_logging};
use pkgswap::upgrade::{PlatformFamily, ReplaceOutcome, UpdateManifest, Updater};

type Calls = Arc<Mutex<Vec<(Option<ErrorKind>, UpdateManifest)>>>;

fn record_calls(updater: &Updater) -> Calls {
    let calls: Calls = Arc::default();
    let sink = Arc::clone(&calls);
    updater.set_completion_callback(move |error, manifest| {
        sink.lock().unwrap().push((error.and_then(UpdateError::kind), manifest.clone()));
    });
    calls
}

fn offer(server: &Server, path: &str) -> String {
    format!(r#"{{"latestVersion":"1.2.0","sourceURL":"{}{}"}}"#, server.url(), path)
}

#[tokio::test]
async fn test_scenario_up_to_date_blocks_download() {
    init_test_logging(None);
    let mut server = Server::new_async().await;
    let check = server
        .mock("POST", "/check")
        .match_body(Matcher::UrlEncoded("current".into(), "1.0.0".into()))
        .with_status(200)
        .with_body(r#"{"latestVersion":"1.2.0"}"#)
        .create_async()
        .await;
    let download = server.mock("GET", Matcher::Any).expect(0).create_async().await;

    let fixture = InstallFixture::new().unwrap();
    fixture.write_installed(b"v1").unwrap();
    let updater =
        Updater::initialize(fixture.config(&format!("{}/check", server.url()))).unwrap();
    let calls = record_calls(&updater);

    let err = updater.check(Some("1.0.0")).await.err().unwrap();
    assert_eq!(err.kind(), Some(ErrorKind::NoUpdateAvailable));

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, Some(ErrorKind::NoUpdateAvailable));
    assert!(calls[0].1.latest_version().is_none());
    assert!(calls[0].1.local_file_path().is_none());
    assert_eq!(fixture.installed().unwrap(), b"v1");

    check.assert_async().await;
    download.assert_async().await;
}

#[tokio::test]
async fn test_scenario_update_offered_then_installed() {
    let mut server = Server::new_async().await;
    let _check = server
        .mock("POST", "/check")
        .with_status(200)
        .with_body(offer(&server, "/pkg"))
        .create_async()
        .await;
    let _pkg = server
        .mock("GET", "/pkg")
        .with_status(200)
        .with_body(b"new package bytes".to_vec())
        .create_async()
        .await;

    let fixture = InstallFixture::new().unwrap();
    fixture.write_installed(b"old package bytes").unwrap();
    let updater =
        Updater::initialize(fixture.config(&format!("{}/check", server.url()))).unwrap();
    let calls = record_calls(&updater);

    let attempt = updater.check(Some("1.0.0")).await.unwrap();
    assert_eq!(attempt.manifest().latest_version(), Some("1.2.0"));
    assert_eq!(attempt.manifest().source_url(), Some(format!("{}/pkg", server.url()).as_str()));

    let applied = attempt.download().await.unwrap();
    assert!(!applied.report.needs_platform_replace());
    assert_eq!(
        applied.manifest.local_file_path(),
        Some(fixture.layout().staged_package().as_path())
    );
    assert_eq!(fixture.installed().unwrap(), b"new package bytes");
    assert!(!fixture.has_staged());
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_scenario_download_connection_error() {
    let mut server = Server::new_async().await;
    // Nothing listens on port 1
    let _check = server
        .mock("POST", "/check")
        .with_status(200)
        .with_body(r#"{"latestVersion":"1.2.0","sourceURL":"http://127.0.0.1:1/pkg"}"#)
        .create_async()
        .await;

    let fixture = InstallFixture::new().unwrap();
    fixture.write_installed(b"v1").unwrap();
    let updater =
        Updater::initialize(fixture.config(&format!("{}/check", server.url()))).unwrap();
    let calls = record_calls(&updater);

    let err = updater.check(Some("1.0.0")).await.unwrap().download().await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::FailedToDownloadUpdate));

    let calls = calls.lock().unwrap();
    assert_eq!(calls.last().unwrap().0, Some(ErrorKind::FailedToDownloadUpdate));
    assert!(calls.last().unwrap().1.local_file_path().is_none());
    assert_eq!(fixture.installed().unwrap(), b"v1");
    assert!(!fixture.has_staged());
}

#[tokio::test]
async fn test_scenario_evict_fails_promote_succeeds() {
    let mut server = Server::new_async().await;
    let _check = server
        .mock("POST", "/check")
        .with_status(200)
        .with_body(offer(&server, "/pkg"))
        .create_async()
        .await;
    let _pkg = server.mock("GET", "/pkg").with_status(200).with_body("v2").create_async().await;

    // No installed package: Evict has nothing to remove
    let fixture = InstallFixture::new().unwrap();
    let updater = Updater::initialize(fixture.config(&format!("{}/check", server.url())))
        .unwrap()
        .with_platform_family(PlatformFamily::LockProne);

    let applied = updater.check(Some("1.0.0")).await.unwrap().download().await.unwrap();
    assert!(!applied.report.evict.is_completed());
    assert!(applied.report.promote.is_completed());

    let spawner = RecordingSpawner::default();
    assert_eq!(updater.apply_platform_replace(&spawner), ReplaceOutcome::NothingStaged);
    assert_eq!(updater.apply_platform_replace(&spawner), ReplaceOutcome::NothingStaged);
    assert!(spawner.requests().is_empty());
    assert_eq!(fixture.installed().unwrap(), b"v2");
}

#[tokio::test]
async fn test_scenario_lock_prone_helper_spawn() {
    let fixture = InstallFixture::named("Program Files/Example App").unwrap();
    fixture.write_installed(b"v1").unwrap();
    fixture.write_staged(b"v2").unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let updater = Updater::initialize(fixture.config("http://127.0.0.1:1/check"))
        .unwrap()
        .with_platform_family(PlatformFamily::LockProne)
        .with_spawn_audit(move |event| sink.lock().unwrap().push(event.clone()));

    let spawner = RecordingSpawner::default();
    let outcome = updater.apply_platform_replace(&spawner);
    assert_eq!(
        outcome,
        ReplaceOutcome::Spawned {
            pid: RecordingSpawner::PID
        }
    );

    let requests = spawner.requests();
    assert_eq!(requests.len(), 1);
    let layout = fixture.layout();
    assert_eq!(requests[0].program, "cmd");
    assert_eq!(requests[0].helper, layout.helper());
    assert_eq!(requests[0].staged, layout.staged_package());
    assert_eq!(requests[0].installed, layout.installed_package());
    assert_eq!(
        requests[0].args[2],
        format!(
            "\"\"{}\" \"{}\" \"{}\"\"",
            layout.helper().display(),
            layout.staged_package().display(),
            layout.installed_package().display()
        )
    );
    assert_eq!(events.lock().unwrap().len(), 1);
    // The helper does the swap, not the host
    assert_eq!(fixture.installed().unwrap(), b"v1");
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    let fixture = InstallFixture::new().unwrap();
    let updater = Updater::initialize(fixture.config("http://127.0.0.1:1/check")).unwrap();

    let err = updater.check(Some("1.0.0")).await.err().unwrap();
    assert_eq!(err.kind(), Some(ErrorKind::CannotConnectToApi));
    assert!(!updater.attempt_in_progress());
}

#[tokio::test]
async fn test_error_page_is_invalid_response() {
    let mut server = Server::new_async().await;
    let _check = server
        .mock("POST", "/check")
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;

    let fixture = InstallFixture::new().unwrap();
    let updater =
        Updater::initialize(fixture.config(&format!("{}/check", server.url()))).unwrap();

    let err = updater.check(Some("1.0.0")).await.err().unwrap();
    assert_eq!(err.kind(), Some(ErrorKind::ApiResponseNotValid));
}

#[tokio::test]
async fn test_empty_response_is_invalid() {
    let mut server = Server::new_async().await;
    let _check = server.mock("POST", "/check").with_status(200).create_async().await;

    let fixture = InstallFixture::new().unwrap();
    let updater =
        Updater::initialize(fixture.config(&format!("{}/check", server.url()))).unwrap();

    let err = updater.check(Some("1.0.0")).await.err().unwrap();
    assert_eq!(err.kind(), Some(ErrorKind::ApiResponseNotValid));
}

#[tokio::test]
async fn test_missing_package_file() {
    let mut server = Server::new_async().await;
    let _check = server
        .mock("POST", "/check")
        .with_status(200)
        .with_body(offer(&server, "/missing"))
        .create_async()
        .await;
    let _missing = server.mock("GET", "/missing").with_status(404).create_async().await;

    let fixture = InstallFixture::new().unwrap();
    fixture.write_installed(b"v1").unwrap();
    let updater =
        Updater::initialize(fixture.config(&format!("{}/check", server.url()))).unwrap();

    let err = updater.check(Some("1.0.0")).await.unwrap().download().await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::UpdateFileNotFound));
    assert_eq!(fixture.installed().unwrap(), b"v1");
}

#[tokio::test]
async fn test_request_options_reach_the_endpoint() {
    let mut server = Server::new_async().await;
    let check = server
        .mock("POST", "/check")
        .match_header("authorization", "Bearer token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("current".into(), "3.1.0".into()),
            Matcher::UrlEncoded("channel".into(), "beta".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"last":"3.1.0"}"#)
        .create_async()
        .await;

    let fixture = InstallFixture::new().unwrap();
    let mut config = fixture.config(&format!("{}/check", server.url()));
    config.request_options.headers.insert("Authorization".into(), "Bearer token".into());
    config.request_options.data.insert("channel".into(), "beta".into());
    config.request_options.data.insert("current".into(), "stale".into());
    config.request_options.timeout_secs = Some(5);
    let updater = Updater::initialize(config).unwrap();

    let err = updater.check(Some("3.1.0")).await.err().unwrap();
    assert!(err.is_up_to_date());
    check.assert_async().await;
}
