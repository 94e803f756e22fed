//! Scheduler constants and timings for ledger sync.

use std::time::Duration;

/// Quiet period after the last local mutation before a push fires.
pub const PUSH_DEBOUNCE_MS: u64 = 2_000;

/// Pull cadence while the remote link is active.
pub const PULL_INTERVAL_SECS: u64 = 30;

/// Credential check cadence. Shorter than the refresh window so a check always lands inside it.
pub const CREDENTIAL_CHECK_INTERVAL_SECS: u64 = 240;

/// How long the remote-update flag stays raised after a pulled snapshot was applied.
pub const REMOTE_UPDATE_SETTLE_MS: u64 = 500;

/// Base delay of the linear push retry backoff.
pub const PUSH_RETRY_BASE_DELAY_MS: u64 = 3_000;

/// Automatic push retries before a network failure becomes terminal.
pub const MAX_PUSH_RETRIES: u32 = 3;

/// Timer configuration for the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimings {
    pub push_debounce: Duration,
    pub pull_interval: Duration,
    pub credential_check_interval: Duration,
    pub remote_update_settle: Duration,
    pub retry_base_delay: Duration,
    pub max_push_retries: u32,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            push_debounce: Duration::from_millis(PUSH_DEBOUNCE_MS),
            pull_interval: Duration::from_secs(PULL_INTERVAL_SECS),
            credential_check_interval: Duration::from_secs(CREDENTIAL_CHECK_INTERVAL_SECS),
            remote_update_settle: Duration::from_millis(REMOTE_UPDATE_SETTLE_MS),
            retry_base_delay: Duration::from_millis(PUSH_RETRY_BASE_DELAY_MS),
            max_push_retries: MAX_PUSH_RETRIES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::TOKEN_REFRESH_WINDOW_SECS;

    #[test]
    fn credential_check_lands_inside_refresh_window() {
        let timings = SyncTimings::default();
        assert!(timings.credential_check_interval.as_secs() < TOKEN_REFRESH_WINDOW_SECS as u64);
    }
}
