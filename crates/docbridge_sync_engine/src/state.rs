//! Sync engine state machine.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::guard::CycleGuard;
use crate::pull::PullPhase;
use crate::push::PushPhase;
use crate::remote::RemoteStore;
use crate::report::{PullReport, PushReport};
use docbridge_core::{CycleLedger, Timestamp, VaultDir};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Engine is idle, not syncing.
    Idle,
    /// Engine is pulling remote pages into the vault.
    Pulling,
    /// Engine is pushing local edits.
    Pushing,
    /// Engine has completed a sync cycle.
    Synced,
    /// The last cycle or phase failed.
    Error,
}

impl SyncState {
    /// Returns true if the engine is in an active sync state.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Pulling | SyncState::Pushing)
    }

    /// Returns true if the engine can start a new sync.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Synced | SyncState::Error)
    }
}

/// Statistics about sync operations since the engine was created.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles in which both phases succeeded.
    pub cycles_completed: u64,
    /// Cycles with a failed phase or an interruption.
    pub cycles_failed: u64,
    /// Documents written by pulls.
    pub documents_pulled: u64,
    /// Documents marked synced by pushes.
    pub documents_pushed: u64,
    /// Conflicts resolved by merge.
    pub conflicts_merged: u64,
    /// Retried remote calls.
    pub retries: u64,
    /// Last successful cycle.
    pub last_sync_time: Option<Timestamp>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of a sync cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncCycleResult {
    /// Pull outcome, if the phase succeeded.
    pub pull: Option<PullReport>,
    /// Push outcome, if the phase succeeded.
    pub push: Option<PushReport>,
    /// Pull failure, if any.
    pub pull_error: Option<String>,
    /// Push failure, if any.
    pub push_error: Option<String>,
    /// Whether both phases succeeded.
    pub success: bool,
    /// Duration of the sync cycle.
    pub duration: Duration,
}

/// The sync engine keeps one vault and one remote store consistent.
///
/// A cycle pulls first, then pushes. Phases are independent: a failed pull
/// is recorded and the push still runs. `cancel()` may be called from
/// another thread; the running cycle stops at the next document boundary.
pub struct SyncEngine<R: RemoteStore> {
    config: SyncConfig,
    vault: VaultDir,
    remote: Arc<R>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cancelled: AtomicBool,
}

impl<R: RemoteStore> SyncEngine<R> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, vault: VaultDir, remote: R) -> Self {
        Self::with_shared_remote(config, vault, Arc::new(remote))
    }

    /// Creates a new sync engine over a shared remote store.
    pub fn with_shared_remote(config: SyncConfig, vault: VaultDir, remote: Arc<R>) -> Self {
        Self {
            config,
            vault,
            remote,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the vault.
    pub fn vault(&self) -> &VaultDir {
        &self.vault
    }

    /// Returns the remote store.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Cancels any ongoing sync operation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Resets the cancelled flag.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Returns true if a cancel is pending.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Moves from a resting state into `target`, atomically.
    fn begin(&self, target: SyncState) -> SyncResult<()> {
        let mut state = self.state.write();
        if !state.can_start_sync() {
            return Err(SyncError::InvalidStateTransition {
                from: format!("{:?}", *state),
                to: format!("{target:?}"),
            });
        }
        *state = target;
        drop(state);
        self.reset_cancel();
        Ok(())
    }

    fn guard(&self) -> CycleGuard<'_> {
        CycleGuard::new(&self.cancelled, self.config.cycle_timeout, &self.config.retry)
    }

    fn pull_phase(&self, guard: &CycleGuard<'_>) -> SyncResult<PullReport> {
        PullPhase {
            vault: &self.vault,
            remote: self.remote.as_ref(),
            guard,
        }
        .run()
    }

    fn push_phase(&self, guard: &CycleGuard<'_>) -> SyncResult<PushReport> {
        PushPhase {
            vault: &self.vault,
            remote: self.remote.as_ref(),
            config: &self.config,
            guard,
        }
        .run()
    }

    /// Performs a full sync cycle: pull then push.
    ///
    /// Phase failures are reported in the result. Cancellation and the
    /// cycle deadline abandon the cycle and return an error.
    pub fn sync(&self) -> SyncResult<SyncCycleResult> {
        self.begin(SyncState::Pulling)?;
        let start = Instant::now();
        let guard = self.guard();
        let mut ledger = self.vault.ledger_store().load();
        let mut result = SyncCycleResult::default();

        match self.pull_phase(&guard) {
            Ok(report) => {
                ledger.record_pull(Timestamp::now());
                result.pull = Some(report);
            }
            Err(e) if e.is_interrupt() => return Err(self.abort(e, "pull", &mut ledger, &guard)),
            Err(e) => {
                error!(error = %e, "pull phase failed");
                ledger.record_error("pull", e.to_string(), Timestamp::now());
                result.pull_error = Some(e.to_string());
            }
        }

        self.set_state(SyncState::Pushing);
        match self.push_phase(&guard) {
            Ok(report) => {
                ledger.record_push(Timestamp::now());
                result.push = Some(report);
            }
            Err(e) if e.is_interrupt() => return Err(self.abort(e, "push", &mut ledger, &guard)),
            Err(e) => {
                error!(error = %e, "push phase failed");
                ledger.record_error("push", e.to_string(), Timestamp::now());
                result.push_error = Some(e.to_string());
            }
        }

        result.success = result.pull_error.is_none() && result.push_error.is_none();
        result.duration = start.elapsed();
        let now = Timestamp::now();
        ledger.record_cycle(now, result.success);
        self.save_ledger(&ledger);

        {
            let mut stats = self.stats.write();
            if let Some(pull) = &result.pull {
                stats.documents_pulled += pull.materialized() as u64;
                stats.conflicts_merged += pull.merged as u64;
            }
            if let Some(push) = &result.push {
                stats.documents_pushed += push.pushed() as u64;
            }
            stats.retries += guard.retries();
            if result.success {
                stats.cycles_completed += 1;
                stats.last_sync_time = Some(now);
                stats.last_error = None;
            } else {
                stats.cycles_failed += 1;
                stats.last_error = result.pull_error.clone().or_else(|| result.push_error.clone());
            }
        }

        self.set_state(if result.success {
            SyncState::Synced
        } else {
            SyncState::Error
        });
        info!(
            success = result.success,
            duration_ms = result.duration.as_millis() as u64,
            "sync cycle finished"
        );
        Ok(result)
    }

    /// Runs only the pull phase.
    pub fn pull(&self) -> SyncResult<PullReport> {
        self.begin(SyncState::Pulling)?;
        let guard = self.guard();
        let outcome = self.pull_phase(&guard);
        self.finish_phase("pull", &outcome, &guard, CycleLedger::record_pull);
        if let Ok(report) = &outcome {
            let mut stats = self.stats.write();
            stats.documents_pulled += report.materialized() as u64;
            stats.conflicts_merged += report.merged as u64;
        }
        outcome
    }

    /// Runs only the push phase.
    pub fn push(&self) -> SyncResult<PushReport> {
        self.begin(SyncState::Pushing)?;
        let guard = self.guard();
        let outcome = self.push_phase(&guard);
        self.finish_phase("push", &outcome, &guard, CycleLedger::record_push);
        if let Ok(report) = &outcome {
            self.stats.write().documents_pushed += report.pushed() as u64;
        }
        outcome
    }

    fn finish_phase<T>(
        &self,
        phase: &str,
        outcome: &SyncResult<T>,
        guard: &CycleGuard<'_>,
        record: fn(&mut CycleLedger, Timestamp),
    ) {
        let mut ledger = self.vault.ledger_store().load();
        let now = Timestamp::now();
        self.stats.write().retries += guard.retries();
        match outcome {
            Ok(_) => {
                record(&mut ledger, now);
                self.set_state(SyncState::Synced);
            }
            Err(e) => {
                error!(phase, error = %e, "phase failed");
                ledger.record_error(phase, e.to_string(), now);
                self.stats.write().last_error = Some(e.to_string());
                self.set_state(SyncState::Error);
            }
        }
        self.save_ledger(&ledger);
    }

    fn abort(&self, e: SyncError, phase: &str, ledger: &mut CycleLedger, guard: &CycleGuard<'_>) -> SyncError {
        warn!(phase, error = %e, "sync cycle abandoned");
        let now = Timestamp::now();
        ledger.record_error(phase, e.to_string(), now);
        ledger.record_cycle(now, false);
        self.save_ledger(ledger);
        {
            let mut stats = self.stats.write();
            stats.cycles_failed += 1;
            stats.retries += guard.retries();
            stats.last_error = Some(e.to_string());
        }
        self.set_state(SyncState::Error);
        e
    }

    fn save_ledger(&self, ledger: &CycleLedger) {
        if let Err(e) = self.vault.ledger_store().save(ledger) {
            warn!(error = %e, "failed to save cycle ledger");
        }
    }
}
