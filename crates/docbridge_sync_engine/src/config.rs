//! Configuration for the sync engine and the remote adapter.

use crate::error::{SyncError, SyncResult};
use docbridge_core::NodeId;
use std::time::Duration;

/// Configuration for sync cycles.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Retry configuration for remote calls.
    pub retry: RetryConfig,
    /// Page size requested from paginated listings.
    pub page_size: u32,
    /// Wall-clock bound for one cycle.
    pub cycle_timeout: Option<Duration>,
    /// Failed pushes in a row before the push phase degrades.
    pub max_consecutive_failures: u32,
    /// Source label on synchronization records for documents without an
    /// author marker.
    pub record_source: String,
    /// Name of the title property of the record collection.
    pub record_title_property: String,
}

impl SyncConfig {
    /// Creates a sync configuration with defaults.
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            page_size: 100,
            cycle_timeout: None,
            max_consecutive_failures: 5,
            record_source: "local".to_string(),
            record_title_property: "Title".to_string(),
        }
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Sets the cycle timeout.
    #[must_use]
    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = Some(timeout);
        self
    }

    /// Sets how many failed pushes in a row degrade the push phase.
    #[must_use]
    pub fn with_max_consecutive_failures(mut self, count: u32) -> Self {
        self.max_consecutive_failures = count.max(1);
        self
    }

    /// Sets the fallback source label for synchronization records.
    #[must_use]
    pub fn with_record_source(mut self, source: impl Into<String>) -> Self {
        self.record_source = source.into();
        self
    }

    /// Sets the title property name of the record collection.
    #[must_use]
    pub fn with_record_title_property(mut self, name: impl Into<String>) -> Self {
        self.record_title_property = name.into();
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.add_jitter = enabled;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% on top.
            let jitter = delay_secs * 0.25 * jitter_fraction();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Uniform value in `[0, 1)` drawn from the v4 uuid generator.
fn jitter_fraction() -> f64 {
    let bits = uuid::Uuid::new_v4().as_u128() % 1000;
    bits as f64 / 1000.0
}

/// Access configuration for the HTTP remote adapter.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// API base URL, including the version prefix.
    pub base_url: String,
    /// API token.
    pub token: Option<String>,
    /// Value of the API version header.
    pub api_version: String,
    /// Collection holding synchronization records.
    pub record_database: Option<NodeId>,
    /// Title used to discover the record collection when no id is set.
    pub record_database_title: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl RemoteConfig {
    /// Default API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.notion.com/v1";

    /// Default API version header.
    pub const DEFAULT_API_VERSION: &'static str = "2022-06-28";

    /// Creates a remote configuration with defaults and no token.
    pub fn new() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            token: None,
            api_version: Self::DEFAULT_API_VERSION.to_string(),
            record_database: None,
            record_database_title: "Obsidian Sync".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the base URL. A trailing slash is dropped.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the API token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the API version header.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Sets the record collection id.
    #[must_use]
    pub fn with_record_database(mut self, id: impl Into<NodeId>) -> Self {
        self.record_database = Some(id.into());
        self
    }

    /// Sets the title used to discover the record collection.
    #[must_use]
    pub fn with_record_database_title(mut self, title: impl Into<String>) -> Self {
        self.record_database_title = title.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Checks that the access configuration is usable.
    pub fn validate(&self) -> SyncResult<()> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => {}
            _ => return Err(SyncError::missing_credential("api token")),
        }
        if self.base_url.is_empty() {
            return Err(SyncError::missing_credential("api base url"));
        }
        Ok(())
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::new()
    }
}
