//! Credential refresher: keep the access token ahead of its expiry.

use std::sync::Arc;

use homeledger_core::secrets::AccessToken;
use homeledger_core::sync::{RemoteCallError, RemoteLinkConfig};
use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::EngineInner;

/// Token for the next remote call. Refreshes silently when missing or inside the refresh
/// window; a failed refresh falls back to the current token while it is still valid.
pub(crate) async fn current_token(
    inner: &EngineInner,
    config: &RemoteLinkConfig,
) -> Result<AccessToken, RemoteCallError> {
    let saved = inner.credentials.get_saved_token();
    if let Some(token) = &saved {
        if !inner.credentials.is_within_refresh_window() {
            return Ok(token.clone());
        }
    }

    match inner.provider.acquire_silent(config).await {
        Ok(token) => {
            if let Err(err) = inner.credentials.save_token(&token) {
                warn!("[LedgerSync] Failed to persist refreshed token: {}", err);
            }
            Ok(token)
        }
        Err(err) => match saved {
            Some(token) => {
                warn!("[LedgerSync] Token refresh failed, using current token: {}", err);
                Ok(token)
            }
            None => Err(err),
        },
    }
}

async fn refresh_tick(inner: &EngineInner) {
    if !inner.coordinator().is_linked() {
        return;
    }
    if !inner.credentials.is_within_refresh_window() {
        if let Some(remaining) = inner.credentials.time_remaining() {
            debug!(
                "[LedgerSync] Token valid for another {}s",
                remaining.num_seconds()
            );
        }
        return;
    }
    let Some(config) = inner.link_config() else {
        return;
    };
    match inner.provider.acquire_silent(&config).await {
        Ok(token) => {
            if let Err(err) = inner.credentials.save_token(&token) {
                warn!("[LedgerSync] Failed to persist refreshed token: {}", err);
            }
            debug!("[LedgerSync] Token refreshed, expires {}", token.expires_at);
        }
        Err(err) => warn!("[LedgerSync] Scheduled token refresh failed: {}", err),
    }
}

pub(crate) fn spawn_refresher(inner: &Arc<EngineInner>) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    let period = inner.timings.credential_check_interval;

    inner.handle.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The link was just established with a fresh token.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            refresh_tick(&inner).await;
        }
    })
}
