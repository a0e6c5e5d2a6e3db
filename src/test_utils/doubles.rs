//! Stand-ins for the network and the OS process table

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::config::RequestOptions;
use crate::upgrade::{ProcessSpawner, SpawnRequest, Transport, TransportError};

/// [`Transport`] that answers from a script and counts calls.
pub struct ScriptedTransport {
    check_response: Result<String, TransportError>,
    package: Result<Vec<u8>, TransportError>,
    check_calls: AtomicUsize,
    download_calls: AtomicUsize,
    sent_forms: Mutex<Vec<BTreeMap<String, String>>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// Transport where every request fails until scripted.
    pub fn new() -> Self {
        Self {
            check_response: Err(TransportError::Request("no check response scripted".into())),
            package: Err(TransportError::Request("no package scripted".into())),
            check_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            sent_forms: Mutex::new(Vec::new()),
        }
    }

    /// Answer version checks with `body`.
    #[must_use]
    pub fn respond_with(mut self, body: impl Into<String>) -> Self {
        self.check_response = Ok(body.into());
        self
    }

    /// Fail version checks with a connection error.
    #[must_use]
    pub fn refuse_check(mut self, reason: &str) -> Self {
        self.check_response = Err(TransportError::Request(reason.to_string()));
        self
    }

    /// Serve `bytes` for package downloads.
    #[must_use]
    pub fn serve_package(mut self, bytes: Vec<u8>) -> Self {
        self.package = Ok(bytes);
        self
    }

    /// Fail package downloads with `error`.
    #[must_use]
    pub fn fail_download(mut self, error: TransportError) -> Self {
        self.package = Err(error);
        self
    }

    /// Number of version-check requests made.
    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    /// Number of package requests made.
    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    /// Form data of every version-check request, in order.
    pub fn sent_forms(&self) -> Vec<BTreeMap<String, String>> {
        self.sent_forms.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Transport for ScriptedTransport {
    async fn post_form(&self, _url: &str, options: &RequestOptions) -> Result<String, TransportError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.sent_forms.lock().unwrap_or_else(PoisonError::into_inner).push(options.data.clone());
        self.check_response.clone()
    }

    async fn get_bytes(&self, _url: &str, _options: &RequestOptions) -> Result<Vec<u8>, TransportError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.package.clone()
    }
}

/// [`ProcessSpawner`] that records requests instead of launching anything.
#[derive(Default)]
pub struct RecordingSpawner {
    requests: Mutex<Vec<SpawnRequest>>,
    failure: Option<String>,
}

impl RecordingSpawner {
    /// Pid reported for every recorded launch.
    pub const PID: u32 = 4242;

    /// Spawner whose launches all fail with `reason`.
    pub fn failing(reason: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failure: Some(reason.to_string()),
        }
    }

    /// Successful launches so far.
    pub fn requests(&self) -> Vec<SpawnRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ProcessSpawner for RecordingSpawner {
    fn spawn_detached(&self, request: &SpawnRequest) -> io::Result<u32> {
        if let Some(reason) = &self.failure {
            return Err(io::Error::other(reason.clone()));
        }
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());
        Ok(Self::PID)
    }
}
