//! Status command implementation.

use super::Settings;
use crate::error::{CliError, CliResult};
use docbridge_core::{ChangeDetector, CycleLedger, VaultDir};
use serde::Serialize;

/// Vault status.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Vault root.
    pub vault: String,
    /// Persisted cycle ledger.
    pub ledger: CycleLedger,
    /// Documents with a change-detection state entry.
    pub tracked: usize,
    /// Documents waiting to be pushed.
    pub pending: usize,
}

/// Runs the status command.
pub fn run(settings: &Settings, format: &str) -> CliResult<()> {
    let vault = settings.open_vault()?;
    let report = collect(&vault)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print!("{}", render_text(&report)),
        other => return Err(CliError::Format(other.to_string())),
    }
    Ok(())
}

fn collect(vault: &VaultDir) -> CliResult<StatusReport> {
    let detector = ChangeDetector::new(vault);
    Ok(StatusReport {
        vault: vault.root().display().to_string(),
        ledger: vault.ledger_store().load(),
        tracked: detector.state().len(),
        pending: detector.pending_count()?,
    })
}

fn render_text(report: &StatusReport) -> String {
    let ledger = &report.ledger;
    let when = |at: &Option<docbridge_core::Timestamp>| {
        at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".to_string())
    };
    let mut out = String::new();
    out.push_str(&format!("Vault:            {}\n", report.vault));
    out.push_str(&format!("Cycles:           {}\n", ledger.cycle_count));
    out.push_str(&format!("Failed phases:    {}\n", ledger.error_count));
    out.push_str(&format!("Last pull:        {}\n", when(&ledger.last_pull)));
    out.push_str(&format!("Last push:        {}\n", when(&ledger.last_push)));
    out.push_str(&format!("Last full cycle:  {}\n", when(&ledger.last_full_cycle)));
    out.push_str(&format!("Tracked docs:     {}\n", report.tracked));
    out.push_str(&format!("Pending docs:     {}\n", report.pending));
    if let Some(error) = &ledger.last_error {
        out.push_str(&format!("Last error:       [{}] {}\n", error.phase, error.message));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_testkit::{DocBuilder, TestVault};

    #[test]
    fn counts_pending_documents() {
        let test_vault = TestVault::new();
        test_vault.write_doc(&DocBuilder::new("from-local/a.md").pending().build());
        test_vault.write_doc(&DocBuilder::new("from-local/b.md").build());

        let vault = test_vault.open();
        let report = collect(&vault).unwrap();
        assert_eq!(report.pending, 1);
        assert_eq!(report.tracked, 0);
        assert_eq!(report.ledger.cycle_count, 0);

        let text = render_text(&report);
        assert!(text.contains("Last pull:        never"));
        assert!(text.contains("Pending docs:     1"));
    }
}
