//! Push cycle: write the whole ledger snapshot to the remote tables.

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use homeledger_core::ledger::encode_snapshot;
use homeledger_core::sync::{
    PushFailureAction, RemoteCallError, RemoteTarget, SyncCycleTrigger, SyncFailure,
};
use log::{debug, error, info, warn};

use crate::engine::EngineInner;
use crate::refresher::current_token;

async fn push_snapshot(inner: &EngineInner) -> Result<usize, RemoteCallError> {
    let config = inner
        .link_config()
        .ok_or_else(|| RemoteCallError::unauthenticated("Sync is not connected"))?;

    if inner.credentials.get_saved_token().is_none() {
        return Err(RemoteCallError::unauthenticated("No access token available"));
    }
    let token = current_token(inner, &config).await?;

    let target = RemoteTarget::new(&config, token.access_token);
    let tables = encode_snapshot(&inner.ledger.snapshot());
    let rows: usize = tables.iter().map(|t| t.rows.len().saturating_sub(1)).sum();

    try_join_all(
        tables
            .into_iter()
            .map(|table| inner.remote.write_table(&target, table.name, table.rows)),
    )
    .await?;
    Ok(rows)
}

/// Run one push if the push slot is free. Failures are classified and handled here.
pub(crate) async fn run_push(inner: Arc<EngineInner>, trigger: SyncCycleTrigger) {
    if !inner.coordinator().try_begin_push() {
        debug!("[LedgerSync] Push ({:?}) not started: unlinked or already in flight", trigger);
        inner.publish();
        return;
    }
    inner.publish();
    debug!("[LedgerSync] Push started ({:?})", trigger);

    let action = match push_snapshot(&inner).await {
        Ok(rows) => {
            inner.coordinator().push_succeeded(Utc::now());
            info!("[LedgerSync] Push complete: {} records", rows);
            None
        }
        Err(err) => {
            let failure = SyncFailure::new(err.classify(), err.user_message());
            let action = inner.coordinator().push_failed(failure);
            Some((err, action))
        }
    };

    let rearm = inner.coordinator().end_push();

    match action {
        None => {}
        Some((err, PushFailureAction::Disconnect)) => {
            error!("[LedgerSync] Push rejected: {}", err);
            inner.tear_down_after_auth_failure();
        }
        Some((err, PushFailureAction::Retry { attempt, delay })) => {
            warn!(
                "[LedgerSync] Push failed (attempt {}), retrying in {:?}: {}",
                attempt, delay, err
            );
            if !rearm {
                inner.coordinator().schedule_retry(attempt);
                inner.arm_push(delay, SyncCycleTrigger::Retry);
            }
        }
        Some((err, PushFailureAction::Terminal)) => {
            error!("[LedgerSync] Push failed: {}", err);
        }
    }

    if rearm {
        debug!("[LedgerSync] Changes arrived during push; re-arming");
        inner.arm_push_debounce(SyncCycleTrigger::LocalMutation);
    }
    inner.publish();
}
