//! Interval daemon.
//!
//! The engine is blocking, so each cycle runs on a blocking task. The tokio
//! runtime only drives the interval timer, the per-cycle time bound and
//! Ctrl-C. A cycle that overruns its bound is cancelled and awaited; it
//! stops at the next document boundary.

use super::cycle::{failure_summary, print_cycle};
use super::{Engine, Settings};
use crate::error::CliResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Runs cycles until interrupted.
pub fn run(settings: &Settings) -> CliResult<()> {
    let engine = Arc::new(settings.engine()?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    info!(
        interval_secs = settings.interval.as_secs(),
        cycle_timeout_secs = settings.cycle_timeout.as_secs(),
        "daemon started"
    );
    runtime.block_on(run_loop(Arc::clone(&engine), settings.interval, settings.cycle_timeout));
    drop(runtime);
    info!(stats = ?engine.stats(), "daemon stopped");
    Ok(())
}

async fn run_loop(engine: Arc<Engine>, interval: Duration, cycle_timeout: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut failed = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
        }
        if !run_cycle(&engine, cycle_timeout).await {
            failed += 1;
        }
    }
    info!(failed_cycles = failed, "daemon loop finished");
}

async fn run_cycle(engine: &Arc<Engine>, cycle_timeout: Duration) -> bool {
    let worker = Arc::clone(engine);
    let mut handle = tokio::task::spawn_blocking(move || worker.sync());

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = tokio::time::sleep(cycle_timeout) => {
            warn!(timeout_secs = cycle_timeout.as_secs(), "cycle overran its time bound, cancelling");
            engine.cancel();
            handle.await
        }
    };

    match joined {
        Ok(Ok(result)) => {
            print_cycle(&result);
            if !result.success {
                warn!(errors = %failure_summary(&result), "cycle finished with a failed phase");
            }
            result.success
        }
        Ok(Err(e)) => {
            error!(error = %e, "sync cycle abandoned");
            false
        }
        Err(e) => {
            error!(error = %e, "sync worker stopped unexpectedly");
            false
        }
    }
}
