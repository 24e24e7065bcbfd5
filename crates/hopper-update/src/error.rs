//! Error types for the update engine
//!
//! Every failure is caught at a stage boundary and turned into one of these
//! values; none of them is allowed to crash the relaunch chain.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::state::Stage;

/// Failure to fetch or interpret release metadata
///
/// Treated by the orchestrator exactly like "no update available".
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure or a non-success status
    #[error("release host unreachable: {0}")]
    Unreachable(String),

    /// The host refused the request because of rate limiting
    #[error("rate limited by release host (HTTP {status})")]
    RateLimited { status: u16 },

    /// The response body could not be deserialized
    #[error("malformed release response: {0}")]
    MalformedResponse(String),

    /// No release carried a parsable version tag
    #[error("no release with a valid version tag")]
    NoValidReleases,

    /// The selected release has no downloadable asset
    #[error("release {tag} has no assets")]
    MissingAsset { tag: String },
}

/// Failure while streaming an asset to disk
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("download request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("download failed with status {0}")]
    Status(u16),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// File replacement or removal that still failed after every retry
#[derive(Error, Debug)]
#[error("{operation} of {path} failed after {attempts} attempts: {source}")]
pub struct ReplaceError {
    pub operation: &'static str,
    pub path: PathBuf,
    pub attempts: u32,
    #[source]
    pub source: io::Error,
}

/// The working directory cannot hold the staging file
#[derive(Error, Debug)]
#[error("invalid working directory {path}: {reason}")]
pub struct ConfigError {
    pub path: PathBuf,
    pub reason: String,
}

/// Conditions that stop an update attempt outright
///
/// The host keeps running the version it already has when it sees one of
/// these.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Nothing to download: the latest release could not be resolved
    #[error("no release to download: {0}")]
    NoRelease(#[from] FetchError),

    /// The asset could not be downloaded
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The working directory is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A stage token arrived without the launcher path it needs
    #[error("{0} stage requested without a launcher path")]
    MissingLauncher(Stage),

    /// The next process in the chain could not be started
    #[error("failed to relaunch {program} for the {stage} stage: {source}")]
    Relaunch {
        stage: Stage,
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}
