//! Update flow of the host program

use anyhow::{Context, Result};
use hopper_core::types::UpdaterConfig;
use hopper_update::orchestrator::{
    exit_if_relaunched, Orchestrator, ProcessRelauncher, StageOutcome, UpdateContext,
};
use hopper_update::releases::ReleaseCatalog;
use hopper_update::session_log::SessionLog;
use hopper_update::state::{Stage, UpdateState};
use hopper_update::version::Version;
use std::sync::Arc;
use tracing::{error, info};

use crate::cli::{Cli, CONFIG_DIR_ENV};
use crate::output;

/// Version of the running program
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn run(cli: &Cli, config: UpdaterConfig, session: Option<Arc<SessionLog>>) -> Result<()> {
    let mut orchestrator = build_orchestrator(cli, config, session.clone())?;

    // A failed stage falls back to running the version already installed
    let outcome = match orchestrator.resume(&cli.tokens).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Update chain stopped: {}", e);
            output::error(&format!("Update failed: {}", e));
            StageOutcome::Idle
        }
    };
    hand_over(&outcome, session.as_deref());

    if outcome == StageOutcome::Completed {
        output::success("Update finished");
    }

    if cli.check {
        return check(&mut orchestrator).await;
    }

    if may_begin_update(&cli.tokens, &outcome) && orchestrator.is_update_available().await {
        let tag = orchestrator
            .latest_release()
            .await
            .map(|release| release.tag.clone())
            .unwrap_or_default();

        if !cli.quiet {
            output::info(&format!("Updating v{} -> {}", VERSION, tag));
        }

        match orchestrator.begin_update().await {
            Ok(outcome) => hand_over(&outcome, session.as_deref()),
            Err(e) => output::warning(&format!("Could not start update: {}", e)),
        }
    }

    run_application(cli);
    Ok(())
}

fn build_orchestrator(
    cli: &Cli,
    config: UpdaterConfig,
    session: Option<Arc<SessionLog>>,
) -> Result<Orchestrator> {
    let source =
        Arc::new(ReleaseCatalog::new(&config).context("Failed to create release client")?);

    // Relaunched processes only receive chain tokens, so flags that shape
    // the configuration travel as environment variables
    let mut relauncher = ProcessRelauncher::new();
    if let Some(dir) = &cli.config {
        relauncher = relauncher.with_env(CONFIG_DIR_ENV, dir.as_str());
    }
    if cli.prerelease {
        relauncher = relauncher.with_env("HOPPER_INCLUDE_PRERELEASE", "true");
    }

    let mut context = UpdateContext::for_current_process(config, VERSION)
        .context("Failed to locate the running executable")?;
    if let Some(log) = session {
        context = context.with_log_continuation(log);
    }

    let mut orchestrator = Orchestrator::new(context, source, Arc::new(relauncher));
    if !cli.quiet {
        orchestrator.add_listener(Arc::new(output::ProgressBarListener::new("hopper")));
    }
    Ok(orchestrator)
}

/// Exit if the chain moved on to another process
fn hand_over(outcome: &StageOutcome, session: Option<&SessionLog>) {
    if outcome.must_exit() {
        if let Some(log) = session {
            log.close();
        }
        exit_if_relaunched(outcome);
    }
}

async fn check(orchestrator: &mut Orchestrator) -> Result<()> {
    output::info(&format!("Current version: v{}", VERSION));

    let spinner = output::spinner("Checking for updates...");
    let available = orchestrator.is_update_available().await;
    spinner.finish_and_clear();

    if !available {
        output::success("Already on the latest version");
        return Ok(());
    }

    let release = orchestrator
        .latest_release()
        .await
        .context("Failed to fetch the latest release")?;

    output::success(&format!("Update available: {}", release.tag));
    output::kv("Asset", &release.asset_file_name);
    if release.is_pre_release {
        output::kv("Channel", "pre-release");
    }
    if !release.release_notes.is_empty() {
        output::header("Release notes");
        println!("{}", release.release_notes);
    }
    Ok(())
}

fn run_application(cli: &Cli) {
    info!("Running hopper v{}", VERSION);
    if cli.quiet {
        return;
    }

    output::header(&format!("hopper {}", Version::parse(VERSION)));
    let extra: Vec<&String> = cli.tokens.iter().filter(|t| !is_chain_token(t)).collect();
    if !extra.is_empty() {
        output::kv(
            "Arguments",
            &extra.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" "),
        );
    }
}

/// Only a plain start may look for a new update
///
/// A process started with a stage token ran its share of an update chain,
/// successful or not, and must not start another one.
fn may_begin_update(tokens: &[String], outcome: &StageOutcome) -> bool {
    *outcome == StageOutcome::Idle && UpdateState::decode(tokens).stage == Stage::None
}

/// Tokens consumed by the update chain rather than the application
fn is_chain_token(token: &str) -> bool {
    UpdateState::decode([token]) != UpdateState::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_tokens_are_recognised() {
        assert!(is_chain_token("clean"));
        assert!(is_chain_token("launcher:/opt/hopper/hopper"));
        assert!(is_chain_token("logfile:/tmp/log.txt"));
        assert!(!is_chain_token("report.csv"));
        assert!(!is_chain_token("launcher:"));
    }

    fn tokens(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plain_start_may_begin_update() {
        assert!(may_begin_update(&[], &StageOutcome::Idle));
        assert!(may_begin_update(&tokens(&["report.csv"]), &StageOutcome::Idle));
    }

    #[test]
    fn test_failed_stage_does_not_restart_the_chain() {
        // A failed stage is reported as idle so the installed version keeps running
        let args = tokens(&["download", "launcher:/opt/hopper/hopper"]);
        assert!(!may_begin_update(&args, &StageOutcome::Idle));

        let args = tokens(&["patch", "launcher:/opt/hopper/hopper"]);
        assert!(!may_begin_update(&args, &StageOutcome::Idle));
    }

    #[test]
    fn test_finished_chain_does_not_restart() {
        let args = tokens(&["clean", "launcher:/opt/hopper/hopper"]);
        assert!(!may_begin_update(&args, &StageOutcome::Completed));
    }

    #[test]
    fn test_running_version_parses() {
        assert!(Version::parse(VERSION).is_valid());
    }
}
