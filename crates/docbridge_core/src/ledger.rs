//! Per-vault cycle ledger.
//!
//! Records when each phase last completed and the most recent failure.
//! Like the change-detection state, a corrupt ledger loads as empty.

use crate::error::CoreResult;
use crate::persist;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Ledger file name at the vault root.
pub const LEDGER_FILE: &str = ".sync_state.json";

/// The most recent failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerError {
    /// Phase that failed (`pull`, `push`, `cycle`).
    pub phase: String,
    /// Error text.
    pub message: String,
    /// When it happened.
    pub at: Timestamp,
}

/// Persisted cycle counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleLedger {
    /// Last successful pull.
    pub last_pull: Option<Timestamp>,
    /// Last successful push.
    pub last_push: Option<Timestamp>,
    /// Last cycle in which both phases succeeded.
    pub last_full_cycle: Option<Timestamp>,
    /// Completed cycles.
    pub cycle_count: u64,
    /// Failed phases, all time.
    pub error_count: u64,
    /// Most recent failure.
    pub last_error: Option<LedgerError>,
}

impl CycleLedger {
    /// Records a successful pull.
    pub fn record_pull(&mut self, at: Timestamp) {
        self.last_pull = Some(at);
    }

    /// Records a successful push.
    pub fn record_push(&mut self, at: Timestamp) {
        self.last_push = Some(at);
    }

    /// Records the end of a cycle.
    pub fn record_cycle(&mut self, at: Timestamp, clean: bool) {
        self.cycle_count += 1;
        if clean {
            self.last_full_cycle = Some(at);
        }
    }

    /// Records a failed phase.
    pub fn record_error(&mut self, phase: &str, message: impl Into<String>, at: Timestamp) {
        self.error_count += 1;
        self.last_error = Some(LedgerError {
            phase: phase.to_string(),
            message: message.into(),
            at,
        });
    }
}

/// Persistent store for [`CycleLedger`].
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the ledger, failing open to an empty one.
    pub fn load(&self) -> CycleLedger {
        match persist::read_json(&self.path) {
            Ok(ledger) => ledger.unwrap_or_default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ledger unreadable, starting fresh");
                CycleLedger::default()
            }
        }
    }

    /// Saves the ledger atomically.
    pub fn save(&self, ledger: &CycleLedger) -> CoreResult<()> {
        persist::write_json(&self.path, ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn counters() {
        let mut ledger = CycleLedger::default();
        let now = Timestamp::now();
        ledger.record_pull(now);
        ledger.record_error("push", "remote unavailable", now);
        ledger.record_cycle(now, false);
        assert_eq!(ledger.cycle_count, 1);
        assert_eq!(ledger.error_count, 1);
        assert!(ledger.last_full_cycle.is_none());
        assert_eq!(ledger.last_error.as_ref().unwrap().phase, "push");

        ledger.record_cycle(now, true);
        assert_eq!(ledger.last_full_cycle, Some(now));
    }

    #[test]
    fn persist_round_trip() {
        let temp = tempdir().unwrap();
        let store = LedgerStore::new(temp.path().join(LEDGER_FILE));
        assert_eq!(store.load(), CycleLedger::default());

        let mut ledger = CycleLedger::default();
        ledger.record_cycle(Timestamp::now(), true);
        store.save(&ledger).unwrap();
        assert_eq!(store.load(), ledger);
    }

    #[test]
    fn corrupt_ledger_fails_open() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(LEDGER_FILE);
        std::fs::write(&path, "garbage").unwrap();
        assert_eq!(LedgerStore::new(path).load(), CycleLedger::default());
    }
}
