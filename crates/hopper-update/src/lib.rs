//! Self-update engine for single-executable applications
//!
//! Provides:
//! - Release tag parsing and ordering with pre-release qualifiers
//! - Release selection from a GitHub-style releases API
//! - Streaming download with de-duplicated progress events
//! - Executable replacement with bounded retries
//! - A stage machine that survives process relaunches by carrying its
//!   state in argument tokens

pub mod download;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod releases;
pub mod replace;
pub mod session_log;
pub mod state;
pub mod version;

pub use download::Downloader;
pub use error::{ConfigError, DownloadError, FetchError, ReplaceError, UpdateError};
pub use orchestrator::{
    exit_if_relaunched, Orchestrator, ProcessRelauncher, Relauncher, StageOutcome, UpdateContext,
};
pub use progress::{
    ChannelDispatcher, Dispatcher, DownloadListener, InlineDispatcher, ProgressHub,
    ProgressTracker,
};
pub use releases::{ReleaseCatalog, ReleaseInfo, ReleasePolicy, ReleaseSource};
pub use replace::{FileOps, FileReplacer, StdFileOps};
pub use session_log::{LogContinuation, SessionLog};
pub use state::{Stage, UpdateState};
pub use version::Version;

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
