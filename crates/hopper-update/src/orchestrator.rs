//! The update stage machine
//!
//! Each process in an update chain runs at most one stage:
//!
//! ```text
//! none ──begin_update──▶ download ──▶ patch ──▶ clean
//!          (host exe)    (host exe)  (staging)  (installed exe)
//! ```
//!
//! The stage to run, the installed executable's path and the log
//! continuation token travel to the next process as argument tokens (see
//! [`UpdateState`]). After spawning the next process the current one must
//! exit without touching the staging file or the installed executable again.

use hopper_core::types::UpdaterConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::download::Downloader;
use crate::error::{ConfigError, DownloadError, FetchError, UpdateError};
use crate::progress::{Dispatcher, DownloadListener, InlineDispatcher, ProgressHub};
use crate::releases::{ReleaseInfo, ReleasePolicy, ReleaseSource};
use crate::replace::FileReplacer;
use crate::session_log::LogContinuation;
use crate::state::{Stage, UpdateState};
use crate::version::Version;

const PROBE_FILE_NAME: &str = ".hopper-write-probe";

/// Starts the next process of the chain
pub trait Relauncher: Send + Sync {
    /// Spawn `program` with `args` without waiting for it
    fn relaunch(&self, program: &Path, args: &[String]) -> io::Result<()>;
}

/// Spawns a real, detached child process
///
/// The child inherits this process's environment plus any variables added
/// with [`ProcessRelauncher::with_env`].
#[derive(Debug, Clone, Default)]
pub struct ProcessRelauncher {
    envs: Vec<(String, String)>,
}

impl ProcessRelauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an environment variable for every spawned process
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl Relauncher for ProcessRelauncher {
    fn relaunch(&self, program: &Path, args: &[String]) -> io::Result<()> {
        let child = Command::new(program)
            .args(args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .spawn()?;
        debug!(pid = child.id(), "Spawned {:?}", program);
        Ok(())
    }
}

/// What a process start did with the update chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// No stage token was present
    Idle,
    /// The next stage was handed to a freshly spawned process
    Relaunched { stage: Stage, program: PathBuf },
    /// The chain finished in this process
    Completed,
}

impl StageOutcome {
    /// The process has handed over and must terminate now
    pub fn must_exit(&self) -> bool {
        matches!(self, StageOutcome::Relaunched { .. })
    }
}

/// Terminate with exit code 0 if the chain moved to another process
pub fn exit_if_relaunched(outcome: &StageOutcome) {
    if let StageOutcome::Relaunched { stage, program } = outcome {
        info!("Handed the {} stage to {:?}, exiting", stage, program);
        std::process::exit(0);
    }
}

/// Everything the orchestrator needs to know about the running program
pub struct UpdateContext {
    config: UpdaterConfig,
    current_version: String,
    current_exe: PathBuf,
    log: Option<Arc<dyn LogContinuation>>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl UpdateContext {
    pub fn new(
        config: UpdaterConfig,
        current_version: impl Into<String>,
        current_exe: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            current_version: current_version.into(),
            current_exe: current_exe.into(),
            log: None,
            dispatcher: Arc::new(InlineDispatcher),
        }
    }

    /// Context for the running process, using its own executable path
    pub fn for_current_process(
        config: UpdaterConfig,
        current_version: impl Into<String>,
    ) -> io::Result<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self::new(config, current_version, exe))
    }

    pub fn with_log_continuation(mut self, log: Arc<dyn LogContinuation>) -> Self {
        self.log = Some(log);
        self
    }

    /// Where download listener callbacks run
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn current_exe(&self) -> &Path {
        &self.current_exe
    }

    /// Fixed location the downloaded executable is written to
    pub fn staging_path(&self) -> PathBuf {
        self.config
            .update
            .working_dir
            .join(&self.config.update.staging_file_name)
    }

    fn log_token(&self) -> Option<String> {
        self.log.as_ref().and_then(|log| log.continuation_token())
    }

    /// Make sure the working directory exists and accepts new files
    pub fn validate_working_dir(&self) -> Result<(), ConfigError> {
        let dir = &self.config.update.working_dir;
        let invalid = |reason: String| ConfigError {
            path: dir.clone(),
            reason,
        };

        fs::create_dir_all(dir).map_err(|e| invalid(format!("cannot create: {}", e)))?;

        let metadata = fs::metadata(dir).map_err(|e| invalid(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(invalid("not a directory".to_string()));
        }
        if metadata.permissions().readonly() {
            return Err(invalid("read-only".to_string()));
        }

        let probe = dir.join(PROBE_FILE_NAME);
        fs::write(&probe, b"").map_err(|e| invalid(format!("not writable: {}", e)))?;
        let _ = fs::remove_file(&probe);

        Ok(())
    }
}

/// Drives one process's share of an update
pub struct Orchestrator {
    context: UpdateContext,
    source: Arc<dyn ReleaseSource>,
    relauncher: Arc<dyn Relauncher>,
    progress: ProgressHub,
    policy: ReleasePolicy,
    latest: Option<ReleaseInfo>,
}

impl Orchestrator {
    pub fn new(
        context: UpdateContext,
        source: Arc<dyn ReleaseSource>,
        relauncher: Arc<dyn Relauncher>,
    ) -> Self {
        let progress = ProgressHub::new(Arc::clone(&context.dispatcher));
        let policy = ReleasePolicy::from_include_prerelease(context.config.update.include_prerelease);

        Self {
            context,
            source,
            relauncher,
            progress,
            policy,
            latest: None,
        }
    }

    /// Override the release policy taken from the configuration
    pub fn with_policy(mut self, policy: ReleasePolicy) -> Self {
        if policy != self.policy {
            self.latest = None;
        }
        self.policy = policy;
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn DownloadListener>) {
        self.progress.add_listener(listener);
    }

    pub fn context(&self) -> &UpdateContext {
        &self.context
    }

    pub fn policy(&self) -> ReleasePolicy {
        self.policy
    }

    /// Latest release, fetched once per orchestrator
    pub async fn latest_release(&mut self) -> Result<&ReleaseInfo, FetchError> {
        let release = match self.latest.take() {
            Some(release) => release,
            None => self.source.fetch_latest(self.policy).await?,
        };
        Ok(&*self.latest.insert(release))
    }

    /// Drop the cached release and query the source again
    pub async fn refresh(&mut self) -> Result<&ReleaseInfo, FetchError> {
        self.latest = None;
        self.latest_release().await
    }

    /// Whether the latest release differs from the running version
    ///
    /// Every failure along the way (disabled updates, unusable working
    /// directory, unreachable release host) reads as "no update". A current
    /// version that does not parse is considered out of date.
    pub async fn is_update_available(&mut self) -> bool {
        if !self.context.config.update.enabled {
            debug!("Update checks are disabled");
            return false;
        }

        if let Err(e) = self.context.validate_working_dir() {
            warn!("Cannot check for updates: {}", e);
            return false;
        }

        let current = Version::parse(&self.context.current_version);

        let latest = match self.latest_release().await {
            Ok(release) => release,
            Err(e) => {
                warn!("Update check failed, continuing without update: {}", e);
                return false;
            }
        };

        if !current.is_valid() {
            warn!(
                current = %current.raw(),
                latest = %latest.tag,
                "Current version is not a valid tag, treating it as out of date"
            );
            return true;
        }

        // Canonical forms make `1.0.0` and `v1.0.0` the same version
        let latest_tag = if latest.version.is_valid() {
            latest.version.to_string()
        } else {
            latest.tag.clone()
        };
        let available = latest_tag != current.to_string();

        if available {
            info!(current = %current, latest = %latest_tag, "Update available");
        } else {
            debug!("Already on the latest version {}", current);
        }
        available
    }

    /// Start an update by relaunching the running executable into the download stage
    pub async fn begin_update(&mut self) -> Result<StageOutcome, UpdateError> {
        self.context.validate_working_dir()?;

        let launcher = self.context.current_exe.clone();
        let state = UpdateState::begin(launcher.clone(), self.context.log_token());
        self.relaunch(&launcher, state)
    }

    /// Decode the argument tokens and run the stage they name, if any
    pub async fn resume<I, S>(&mut self, args: I) -> Result<StageOutcome, UpdateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let state = UpdateState::decode(args);
        if state.stage == Stage::None {
            return Ok(StageOutcome::Idle);
        }

        info!(
            stage = %state.stage,
            launcher = ?state.launcher_path(),
            "Resuming update"
        );

        match state.stage {
            Stage::None => Ok(StageOutcome::Idle),
            Stage::Download => self.run_download(&state).await,
            Stage::Patch => self.run_patch(&state).await,
            Stage::Clean => Ok(self.run_clean().await),
        }
    }

    async fn run_download(&mut self, state: &UpdateState) -> Result<StageOutcome, UpdateError> {
        let launcher = state
            .launcher_path()
            .ok_or(UpdateError::MissingLauncher(Stage::Download))?
            .to_path_buf();

        self.context.validate_working_dir()?;

        let release = self.latest_release().await?.clone();
        let staging = self.context.staging_path();

        info!(
            tag = %release.tag,
            asset = %release.asset_file_name,
            "Downloading update"
        );

        let downloader = Downloader::new(&self.context.config, self.progress.clone())?;
        downloader.download(&release.download_url, &staging).await?;

        make_executable(&staging).map_err(|source| DownloadError::Io {
            path: staging.clone(),
            source,
        })?;

        let next = self.carry(state, launcher);
        self.relaunch(&staging, next)
    }

    async fn run_patch(&mut self, state: &UpdateState) -> Result<StageOutcome, UpdateError> {
        let launcher = state
            .launcher_path()
            .ok_or(UpdateError::MissingLauncher(Stage::Patch))?
            .to_path_buf();

        let staging = self.context.staging_path();
        let replacer = FileReplacer::from_config(&self.context.config);

        match replacer.replace(&staging, &launcher).await {
            Ok(()) => info!("Installed update at {:?}", launcher),
            // The clean stage still runs so the staging file does not linger
            Err(e) => error!("Failed to install update, keeping the current version: {}", e),
        }

        let next = self.carry(state, launcher.clone());
        self.relaunch(&launcher, next)
    }

    async fn run_clean(&mut self) -> StageOutcome {
        let staging = self.context.staging_path();
        let replacer = FileReplacer::from_config(&self.context.config);

        match replacer.remove(&staging).await {
            Ok(()) => info!("Update finished"),
            Err(e) => warn!("Update finished, but the staging file remains: {}", e),
        }

        StageOutcome::Completed
    }

    /// State for the following stage: same launcher, fresh log token when we have one
    fn carry(&self, state: &UpdateState, launcher: PathBuf) -> UpdateState {
        let mut next = state.with_stage(state.stage.next().unwrap_or_default());
        next.launcher_path = Some(launcher);
        if let Some(token) = self.context.log_token() {
            next.log_token = Some(token);
        }
        next
    }

    fn relaunch(&self, program: &Path, state: UpdateState) -> Result<StageOutcome, UpdateError> {
        let args = state.encode();
        info!(stage = %state.stage, "Relaunching {:?}", program);

        self.relauncher
            .relaunch(program, &args)
            .map_err(|source| UpdateError::Relaunch {
                stage: state.stage,
                program: program.to_path_buf(),
                source,
            })?;

        Ok(StageOutcome::Relaunched {
            stage: state.stage,
            program: program.to_path_buf(),
        })
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
