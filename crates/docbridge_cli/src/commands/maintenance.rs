//! Vault maintenance: state reset and archive cleanup.

use super::Settings;
use crate::error::CliResult;
use docbridge_core::{ChangeDetector, Timestamp};
use std::time::Duration;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Clears change-detection state. The next detection pass treats every
/// pulled document as new.
pub fn reset(settings: &Settings) -> CliResult<()> {
    let vault = settings.open_vault()?;
    if ChangeDetector::new(&vault).reset()? {
        println!("Change-detection state cleared");
    } else {
        println!("No change-detection state to clear");
    }
    Ok(())
}

/// Deletes archive records older than `days`.
pub fn cleanup(settings: &Settings, days: u64) -> CliResult<()> {
    let vault = settings.open_vault()?;
    let max_age = Duration::from_secs(days.saturating_mul(SECS_PER_DAY));
    let removed = vault.cleanup_archive(max_age, Timestamp::now())?;
    println!("Removed {removed} archive records older than {days} days");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbridge_sync_engine::RemoteConfig;
    use docbridge_testkit::{DocBuilder, TestVault};
    use std::time::SystemTime;

    fn settings(vault: &TestVault) -> Settings {
        Settings {
            vault: vault.root().to_path_buf(),
            local_author: "local".into(),
            remote: RemoteConfig::new(),
            interval: Duration::from_secs(60),
            cycle_timeout: Duration::from_secs(60),
            page_size: 25,
        }
    }

    #[test]
    fn cleanup_removes_only_old_records() {
        let vault = TestVault::new();
        vault.write_doc(&DocBuilder::new("archive/old.md").body("old\n").build());
        vault.write_doc(&DocBuilder::new("archive/new.md").body("new\n").build());
        let long_ago = SystemTime::now() - Duration::from_secs(40 * SECS_PER_DAY);
        vault.set_modified("archive/old.md", long_ago);

        cleanup(&settings(&vault), 30).unwrap();
        assert!(!vault.exists("archive/old.md"));
        assert!(vault.exists("archive/new.md"));
    }

    #[test]
    fn engine_requires_token() {
        let vault = TestVault::new();
        assert!(settings(&vault).engine().is_err());
    }

    #[test]
    fn engine_uses_configured_page_size() {
        let vault = TestVault::new();
        let mut settings = settings(&vault);
        settings.remote = RemoteConfig::new().with_token("t").with_record_database("db");
        let engine = settings.engine().unwrap();
        assert_eq!(engine.config().page_size, 25);
        assert_eq!(engine.remote().page_size(), 25);
    }
}
