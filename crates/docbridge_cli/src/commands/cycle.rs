//! One-shot cycle and single-phase commands.

use super::Settings;
use crate::error::{CliError, CliResult};
use docbridge_sync_engine::{PullReport, PushReport, SyncCycleResult};

/// Runs one pull-then-push cycle.
pub fn once(settings: &Settings) -> CliResult<()> {
    let engine = settings.engine()?;
    let result = engine.sync()?;
    print_cycle(&result);
    if result.success {
        Ok(())
    } else {
        Err(CliError::CycleFailed(failure_summary(&result)))
    }
}

/// Runs only the pull phase.
pub fn pull(settings: &Settings) -> CliResult<()> {
    let report = settings.engine()?.pull()?;
    print_pull(&report);
    Ok(())
}

/// Runs only the push phase.
pub fn push(settings: &Settings) -> CliResult<()> {
    let report = settings.engine()?.push()?;
    print_push(&report);
    Ok(())
}

/// Prints a cycle summary.
pub fn print_cycle(result: &SyncCycleResult) {
    if let Some(report) = &result.pull {
        print_pull(report);
    }
    if let Some(report) = &result.push {
        print_push(report);
    }
    println!(
        "Cycle {} in {:.1}s",
        if result.success { "completed" } else { "failed" },
        result.duration.as_secs_f64()
    );
}

pub(crate) fn failure_summary(result: &SyncCycleResult) -> String {
    [("pull", &result.pull_error), ("push", &result.push_error)]
        .into_iter()
        .filter_map(|(phase, error)| error.as_ref().map(|e| format!("{phase}: {e}")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn print_pull(report: &PullReport) {
    println!(
        "Pull: {} listed, {} written, {} merged, {} moved, {} unchanged, {} failed",
        report.listed,
        report.written,
        report.merged,
        report.moved,
        report.unchanged,
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  {}: {}", failure.subject, failure.message);
    }
}

fn print_push(report: &PushReport) {
    println!(
        "Push: {} candidates, {} updated, {} children, {} records, {} originals skipped, {} degraded, {} failed",
        report.candidates,
        report.updated,
        report.created_children,
        report.created_records,
        report.skipped_original,
        report.degraded,
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  {}: {}", failure.subject, failure.message);
    }
}
