//! Detect command implementation.

use super::Settings;
use crate::error::CliResult;
use docbridge_core::{ChangeDetector, DetectionReport};

/// Runs change detection over the pulled tree.
///
/// With `mark`, changed documents are flagged pending for the next push.
pub fn run(settings: &Settings, mark: bool) -> CliResult<()> {
    let vault = settings.open_vault()?;
    let detector = ChangeDetector::new(&vault);
    let report = if mark {
        detector.process()?
    } else {
        detector.detect()?
    };
    print!("{}", render(&report, mark));
    Ok(())
}

fn render(report: &DetectionReport, mark: bool) -> String {
    let mut out = format!(
        "Scanned {} documents, {} changed, {} unreadable\n",
        report.scanned,
        report.changed(),
        report.skipped
    );
    for change in &report.changes {
        out.push_str(&format!("  {} ({})\n", change.path, change.reason.as_str()));
    }
    if mark {
        out.push_str(&format!("Marked {} pending\n", report.marked));
    }
    out
}
