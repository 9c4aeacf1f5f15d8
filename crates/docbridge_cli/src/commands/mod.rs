//! CLI command implementations.

pub mod cycle;
pub mod daemon;
pub mod detect;
pub mod maintenance;
pub mod status;

use crate::client::ReqwestClient;
use crate::error::CliResult;
use docbridge_core::{VaultConfig, VaultDir};
use docbridge_sync_engine::{HttpRemote, RemoteConfig, SyncConfig, SyncEngine};
use std::path::PathBuf;
use std::time::Duration;

/// The engine as driven from the command line.
pub type Engine = SyncEngine<HttpRemote<ReqwestClient>>;

/// Settings resolved from arguments and environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Vault root.
    pub vault: PathBuf,
    /// Author marker of local tools.
    pub local_author: String,
    /// Remote access.
    pub remote: RemoteConfig,
    /// Daemon interval.
    pub interval: Duration,
    /// Wall-clock bound for one cycle.
    pub cycle_timeout: Duration,
    /// Items requested per remote listing page.
    pub page_size: u32,
}

impl Settings {
    fn vault_config(&self) -> VaultConfig {
        VaultConfig::new(self.vault.clone()).with_local_author(self.local_author.as_str())
    }

    /// Opens the vault without touching the remote side.
    pub fn open_vault(&self) -> CliResult<VaultDir> {
        Ok(VaultDir::open(self.vault_config())?)
    }

    /// Validates access and builds an engine over the HTTP adapter.
    pub fn engine(&self) -> CliResult<Engine> {
        self.remote.validate()?;
        let client = ReqwestClient::new(&self.remote)?;
        let config = SyncConfig::new()
            .with_cycle_timeout(self.cycle_timeout)
            .with_page_size(self.page_size);
        let remote = HttpRemote::new(self.remote.clone(), client).with_page_size(config.page_size);
        Ok(SyncEngine::new(config, self.open_vault()?, remote))
    }
}
