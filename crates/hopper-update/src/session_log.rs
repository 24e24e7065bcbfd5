//! Session log that stays contiguous across relaunches
//!
//! The first process of a session creates `logs/log_<timestamp>.txt` in the
//! working directory. Every process it relaunches receives a
//! `logfile:<path>` token and appends to the same file, so one update
//! produces one readable log no matter how many processes took part.
//!
//! The log is wired into `tracing` by the host through [`SessionLog::make_writer`].

use chrono::{Local, NaiveDateTime};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Prefix of the continuation token handed to relaunched processes
pub const LOG_TOKEN_PREFIX: &str = "logfile:";

const LOG_SUBDIR: &str = "logs";
const FILE_PREFIX: &str = "log_";
const FILE_EXTENSION: &str = ".txt";
const FILE_TIMESTAMP: &str = "%Y-%m-%d_%Hh%Mm%Ss";
const LINE_TIMESTAMP: &str = "%Y/%m/%d %H:%M:%S";

/// Session files kept when a new session starts
const MAX_LOG_FILES: usize = 5;

/// Upper bound on deletions per pruning pass
const MAX_DELETIONS: usize = 20;

/// Supplies the token that lets the next process continue this log
pub trait LogContinuation: Send + Sync {
    fn continuation_token(&self) -> Option<String>;
}

/// An open session log file
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
    continued: bool,
}

impl SessionLog {
    /// Open the session log under `<working_dir>/logs`
    ///
    /// Continues the file named by a `logfile:` token in `args` if there is
    /// one; otherwise starts a new file and prunes old sessions.
    pub fn open<I, S>(working_dir: &Path, args: I) -> io::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let log_dir = working_dir.join(LOG_SUBDIR);
        fs::create_dir_all(&log_dir)?;

        let continued_path = args.into_iter().find_map(|arg| {
            arg.as_ref()
                .strip_prefix(LOG_TOKEN_PREFIX)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
        });

        let (path, continued) = match continued_path {
            Some(path) => (path, true),
            None => {
                let name = format!(
                    "{}{}{}",
                    FILE_PREFIX,
                    Local::now().format(FILE_TIMESTAMP),
                    FILE_EXTENSION
                );
                (log_dir.join(name), false)
            }
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let log = Self {
            path,
            file: Arc::new(Mutex::new(file)),
            continued,
        };

        if !continued {
            log.prune(&log_dir);
        }

        Ok(log)
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this process appended to a log started by an earlier process
    pub fn is_continuation(&self) -> bool {
        self.continued
    }

    /// Append one timestamped line
    pub fn log(&self, message: &str) {
        let line = format!("{} | {}\n", Local::now().format(LINE_TIMESTAMP), message);
        // A broken log must never take the update chain down with it
        let _ = self.writer().write_all(line.as_bytes());
    }

    /// Write the closing marker of this process
    pub fn close(&self) {
        self.log("Program closed.");
        let _ = self.writer().write_all(b"\n");
    }

    /// A writer appending to the session file
    pub fn writer(&self) -> SessionWriter {
        SessionWriter {
            file: Arc::clone(&self.file),
        }
    }

    /// Writer factory for `tracing_subscriber::fmt::layer().with_writer(..)`
    pub fn make_writer(&self) -> impl Fn() -> SessionWriter + Send + Sync + 'static {
        let file = Arc::clone(&self.file);
        move || SessionWriter {
            file: Arc::clone(&file),
        }
    }

    /// Delete the oldest session files beyond `MAX_LOG_FILES`
    fn prune(&self, log_dir: &Path) {
        let entries = match fs::read_dir(log_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list log directory {:?}: {}", log_dir, e);
                return;
            }
        };

        let mut sessions: Vec<(NaiveDateTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let stamp = name
                    .strip_prefix(FILE_PREFIX)?
                    .strip_suffix(FILE_EXTENSION)?;
                let time = NaiveDateTime::parse_from_str(stamp, FILE_TIMESTAMP).ok()?;
                Some((time, entry.path()))
            })
            .collect();

        if sessions.len() <= MAX_LOG_FILES {
            return;
        }

        sessions.sort_by(|a, b| a.0.cmp(&b.0));

        let excess = sessions.len() - MAX_LOG_FILES;
        for (_, path) in sessions.into_iter().take(excess.min(MAX_DELETIONS)) {
            if path == self.path {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => self.log(&format!("Deleted old log file: {}", path.display())),
                Err(e) => self.log(&format!(
                    "Failed to delete log file {}: {}",
                    path.display(),
                    e
                )),
            }
        }
    }
}

impl LogContinuation for SessionLog {
    fn continuation_token(&self) -> Option<String> {
        Some(format!("{}{}", LOG_TOKEN_PREFIX, self.path.display()))
    }
}

/// `io::Write` handle onto a shared session file
#[derive(Debug)]
pub struct SessionWriter {
    file: Arc<Mutex<File>>,
}

impl Write for SessionWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("session log lock poisoned"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("session log lock poisoned"))?;
        file.flush()
    }
}
