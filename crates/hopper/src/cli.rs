//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser};

/// Environment variable that carries `--config` to relaunched processes
pub const CONFIG_DIR_ENV: &str = "HOPPER_CONFIG_DIR";

/// Hopper - a self-updating application
#[derive(Parser, Debug)]
#[command(name = "hopper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Directory containing hopper.yaml
    #[arg(short, long, env = CONFIG_DIR_ENV)]
    pub config: Option<Utf8PathBuf>,

    /// Only report whether an update is available
    #[arg(long)]
    pub check: bool,

    /// Consider pre-releases when looking for updates
    #[arg(long)]
    pub prerelease: bool,

    /// Skip the update check for this run
    #[arg(long, conflicts_with = "check")]
    pub no_update: bool,

    /// Update chain tokens handed over by a previous process
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub tokens: Vec<String>,
}
