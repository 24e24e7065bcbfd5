//! In-memory collaborators for orchestrator tests

use async_trait::async_trait;
use hopper_update::error::FetchError;
use hopper_update::orchestrator::Relauncher;
use hopper_update::progress::DownloadListener;
use hopper_update::releases::{ReleaseInfo, ReleasePolicy, ReleaseSource};
use hopper_update::session_log::LogContinuation;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Release source returning a fixed answer and counting calls
pub struct FakeSource {
    release: Option<ReleaseInfo>,
    calls: AtomicUsize,
    policies: Mutex<Vec<ReleasePolicy>>,
}

impl FakeSource {
    pub fn returning(release: ReleaseInfo) -> Self {
        Self {
            release: Some(release),
            calls: AtomicUsize::new(0),
            policies: Mutex::new(Vec::new()),
        }
    }

    /// A source whose host is unreachable
    pub fn offline() -> Self {
        Self {
            release: None,
            calls: AtomicUsize::new(0),
            policies: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn policies(&self) -> Vec<ReleasePolicy> {
        self.policies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReleaseSource for FakeSource {
    async fn fetch_latest(&self, policy: ReleasePolicy) -> Result<ReleaseInfo, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.policies.lock().unwrap().push(policy);
        self.release
            .clone()
            .ok_or_else(|| FetchError::Unreachable("offline".to_string()))
    }
}

/// One recorded relaunch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Relauncher that records instead of spawning
#[derive(Default)]
pub struct RecordingRelauncher {
    launches: Mutex<Vec<Launch>>,
    fail: bool,
}

impl RecordingRelauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A relauncher whose spawn always fails
    pub fn failing() -> Self {
        Self {
            launches: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn launches(&self) -> Vec<Launch> {
        self.launches.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Launch> {
        self.launches.lock().unwrap().last().cloned()
    }
}

impl Relauncher for RecordingRelauncher {
    fn relaunch(&self, program: &Path, args: &[String]) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "spawn refused"));
        }
        self.launches.lock().unwrap().push(Launch {
            program: program.to_path_buf(),
            args: args.to_vec(),
        });
        Ok(())
    }
}

/// Listener that records every event in order
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn percentages(&self) -> Vec<u8> {
        self.events()
            .iter()
            .filter_map(|e| e.strip_suffix('%'))
            .filter_map(|p| p.parse().ok())
            .collect()
    }
}

impl DownloadListener for RecordingListener {
    fn on_download_progress(&self, percent: u8) {
        self.events.lock().unwrap().push(format!("{}%", percent));
    }

    fn on_download_complete(&self) {
        self.events.lock().unwrap().push("complete".to_string());
    }

    fn on_download_failed(&self) {
        self.events.lock().unwrap().push("failed".to_string());
    }
}

/// Log continuation with a fixed token
pub struct FixedLog(pub String);

impl LogContinuation for FixedLog {
    fn continuation_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
