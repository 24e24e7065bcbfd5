//! Update state carried across relaunches
//!
//! The state never touches disk. Each process in the chain decodes it from
//! its argument vector and encodes the successor's state into the arguments
//! of the process it spawns.
//!
//! Wire tokens (order is not significant):
//! - `download` | `patch` | `clean`: the stage to run
//! - `launcher:<absolute path>`: the installed executable
//! - `logfile:<path>`: opaque log continuation token
//!
//! Anything else in the argument vector belongs to the host and is ignored.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::session_log::LOG_TOKEN_PREFIX;

/// Prefix of the token carrying the installed executable's path
pub const LAUNCHER_TOKEN_PREFIX: &str = "launcher:";

/// One step of the update chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// No update in progress
    #[default]
    None,
    /// Fetch the latest asset into the staging file
    Download,
    /// Copy the staging file over the installed executable
    Patch,
    /// Remove the staging file
    Clean,
}

impl Stage {
    /// Wire token for this stage; `None` has no token
    pub fn token(self) -> Option<&'static str> {
        match self {
            Stage::None => None,
            Stage::Download => Some("download"),
            Stage::Patch => Some("patch"),
            Stage::Clean => Some("clean"),
        }
    }

    /// Stage that follows a successful run of this one
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::None => Some(Stage::Download),
            Stage::Download => Some(Stage::Patch),
            Stage::Patch => Some(Stage::Clean),
            Stage::Clean => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token().unwrap_or("none"))
    }
}

impl FromStr for Stage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download" => Ok(Stage::Download),
            "patch" => Ok(Stage::Patch),
            "clean" => Ok(Stage::Clean),
            _ => Err(()),
        }
    }
}

/// State of an in-flight update, reconstructed on every process start
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateState {
    pub stage: Stage,
    /// Absolute path of the executable being updated
    pub launcher_path: Option<PathBuf>,
    /// Opaque token that lets the next process continue the session log
    pub log_token: Option<String>,
}

impl UpdateState {
    /// Fresh state for the first relaunch of an update
    pub fn begin(launcher_path: impl Into<PathBuf>, log_token: Option<String>) -> Self {
        Self {
            stage: Stage::Download,
            launcher_path: Some(launcher_path.into()),
            log_token,
        }
    }

    /// Decode the state from a process argument vector
    ///
    /// The first stage token wins; unrecognised arguments are skipped.
    pub fn decode<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = UpdateState::default();

        for arg in args {
            let arg = arg.as_ref();
            if let Some(path) = arg.strip_prefix(LAUNCHER_TOKEN_PREFIX) {
                if state.launcher_path.is_none() && !path.is_empty() {
                    state.launcher_path = Some(PathBuf::from(path));
                }
            } else if arg.starts_with(LOG_TOKEN_PREFIX) {
                if state.log_token.is_none() {
                    state.log_token = Some(arg.to_string());
                }
            } else if let Ok(stage) = arg.parse::<Stage>() {
                if state.stage == Stage::None {
                    state.stage = stage;
                }
            }
        }

        state
    }

    /// Encode the state as argument tokens for the next process
    pub fn encode(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(3);
        if let Some(token) = self.stage.token() {
            args.push(token.to_string());
        }
        if let Some(path) = &self.launcher_path {
            args.push(format!("{}{}", LAUNCHER_TOKEN_PREFIX, path.display()));
        }
        if let Some(token) = &self.log_token {
            args.push(token.clone());
        }
        args
    }

    /// Same launcher and log session, different stage
    pub fn with_stage(&self, stage: Stage) -> Self {
        Self {
            stage,
            ..self.clone()
        }
    }

    pub fn launcher_path(&self) -> Option<&Path> {
        self.launcher_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_args() {
        let state = UpdateState::decode(Vec::<String>::new());
        assert_eq!(state, UpdateState::default());
        assert_eq!(state.stage, Stage::None);
    }

    #[test]
    fn test_decode_ignores_order_and_host_args() {
        let state = UpdateState::decode([
            "--verbose",
            "logfile:/var/log/hopper/log_1.txt",
            "launcher:/opt/app/app",
            "patch",
        ]);

        assert_eq!(state.stage, Stage::Patch);
        assert_eq!(state.launcher_path(), Some(Path::new("/opt/app/app")));
        assert_eq!(
            state.log_token.as_deref(),
            Some("logfile:/var/log/hopper/log_1.txt")
        );
    }

    #[test]
    fn test_decode_keeps_first_stage_token() {
        let state = UpdateState::decode(["clean", "download"]);
        assert_eq!(state.stage, Stage::Clean);
    }

    #[test]
    fn test_launcher_path_with_colons() {
        let state = UpdateState::decode([r"launcher:C:\Program Files\App\app.exe", "download"]);
        assert_eq!(
            state.launcher_path(),
            Some(Path::new(r"C:\Program Files\App\app.exe"))
        );
    }

    #[test]
    fn test_encode_then_decode() {
        let state = UpdateState::begin("/opt/app/app", Some("logfile:/tmp/log.txt".to_string()));
        assert_eq!(
            state.encode(),
            vec!["download", "launcher:/opt/app/app", "logfile:/tmp/log.txt"]
        );

        let next = state.with_stage(Stage::Patch);
        assert_eq!(UpdateState::decode(next.encode()), next);
    }

    #[test]
    fn test_stage_sequence() {
        assert_eq!(Stage::None.next(), Some(Stage::Download));
        assert_eq!(Stage::Download.next(), Some(Stage::Patch));
        assert_eq!(Stage::Patch.next(), Some(Stage::Clean));
        assert_eq!(Stage::Clean.next(), None);
        assert_eq!(Stage::Patch.to_string(), "patch");
        assert!("PATCH".parse::<Stage>().is_err());
    }
}
