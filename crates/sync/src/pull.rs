//! Pull cycle: read the remote tables and replace the local ledger with them.

use std::sync::Arc;

use chrono::Utc;
use homeledger_core::ledger::{decode_snapshot, LedgerSnapshot, TableRow, LEDGER_TABLES};
use homeledger_core::sync::{
    PullDecision, PullTicket, PullVerdict, RemoteCallError, RemoteLinkConfig, RemoteTarget,
    SyncCycleTrigger, SyncErrorKind, SyncFailure,
};
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::EngineInner;
use crate::refresher::current_token;

/// What a single pull tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PullOutcome {
    /// Guard refused to start: unlinked, local edits pending, or another pull running.
    Skipped,
    /// Local state moved during the fetch; remote data dropped.
    Discarded,
    /// Remote already matches local.
    Unchanged,
    /// Remote was empty while local was not; a push was armed instead.
    Seeded,
    Applied,
    /// Logged and left for the next tick.
    Failed,
    /// Credentials rejected; link dropped.
    Revoked,
}

enum FetchError {
    Auth(RemoteCallError),
    Other(RemoteCallError),
}

fn is_auth(err: &RemoteCallError) -> bool {
    err.classify() == SyncErrorKind::AuthExpired
}

async fn read_remote(
    inner: &EngineInner,
    config: &RemoteLinkConfig,
) -> Result<Vec<Vec<TableRow>>, FetchError> {
    let token = current_token(inner, config).await.map_err(|err| {
        if is_auth(&err) {
            FetchError::Auth(err)
        } else {
            FetchError::Other(err)
        }
    })?;
    let target = RemoteTarget::new(config, token.access_token);

    match inner.remote.read_tables(&target, &LEDGER_TABLES).await {
        Ok(tables) => return Ok(tables),
        Err(err) if !is_auth(&err) => return Err(FetchError::Other(err)),
        Err(err) => debug!("[LedgerSync] Pull rejected ({}), refreshing once", err),
    }

    // The saved token may look fresh locally yet be revoked remotely.
    if let Err(err) = inner.credentials.clear_token() {
        warn!("[LedgerSync] Failed to clear rejected token: {}", err);
    }
    let token = inner
        .provider
        .acquire_silent(config)
        .await
        .map_err(FetchError::Auth)?;
    if let Err(err) = inner.credentials.save_token(&token) {
        warn!("[LedgerSync] Failed to persist refreshed token: {}", err);
    }
    let target = RemoteTarget::new(config, token.access_token);

    inner
        .remote
        .read_tables(&target, &LEDGER_TABLES)
        .await
        .map_err(|err| {
            if is_auth(&err) {
                FetchError::Auth(err)
            } else {
                FetchError::Other(err)
            }
        })
}

fn release(inner: &EngineInner, ticket: PullTicket) {
    inner.coordinator().abandon_pull(ticket);
    inner.publish();
}

/// Run one pull tick, honouring the push/pull guards.
pub(crate) async fn run_pull_tick(inner: &Arc<EngineInner>) -> PullOutcome {
    let revision = inner.ledger.revision();
    let decision = inner.coordinator().try_begin_pull(revision);
    let ticket = match decision {
        PullDecision::Begin(ticket) => ticket,
        other => {
            debug!("[LedgerSync] Pull skipped: {:?}", other);
            return PullOutcome::Skipped;
        }
    };
    inner.publish();

    let Some(config) = inner.link_config() else {
        release(inner, ticket);
        return PullOutcome::Skipped;
    };

    let tables = match read_remote(inner, &config).await {
        Ok(tables) => tables,
        Err(FetchError::Auth(err)) => {
            error!("[LedgerSync] Pull unauthorized after refresh: {}", err);
            inner.coordinator().revoke(SyncFailure::new(
                SyncErrorKind::AuthExpired,
                err.user_message(),
            ));
            inner.tear_down_after_auth_failure();
            inner.publish();
            return PullOutcome::Revoked;
        }
        Err(FetchError::Other(err)) => {
            warn!("[LedgerSync] Pull failed, retrying next tick: {}", err);
            release(inner, ticket);
            return PullOutcome::Failed;
        }
    };

    let remote = match decode_snapshot(&tables) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!("[LedgerSync] Remote tables could not be decoded: {}", err);
            release(inner, ticket);
            return PullOutcome::Failed;
        }
    };

    let verdict = inner
        .coordinator()
        .finish_pull(ticket, inner.ledger.revision());
    if verdict == PullVerdict::Discard {
        debug!("[LedgerSync] Local changes during fetch; discarding pulled data");
        inner.publish();
        return PullOutcome::Discarded;
    }

    apply_remote(inner, remote)
}

fn apply_remote(inner: &Arc<EngineInner>, remote: LedgerSnapshot) -> PullOutcome {
    let local = inner.ledger.snapshot();

    if remote == local {
        inner.coordinator().pull_applied(Utc::now());
        inner.publish();
        return PullOutcome::Unchanged;
    }

    if remote.is_empty() && !local.is_empty() {
        info!("[LedgerSync] Remote spreadsheet is empty; seeding it from the local ledger");
        inner.schedule_push(SyncCycleTrigger::Seed);
        return PullOutcome::Seeded;
    }

    inner.coordinator().begin_remote_update();
    if let Err(err) = inner.ledger.replace_snapshot(remote) {
        error!("[LedgerSync] Failed to apply pulled snapshot: {}", err);
        inner.coordinator().end_remote_update();
        inner.publish();
        return PullOutcome::Failed;
    }
    let applied_revision = inner.ledger.revision();
    inner.coordinator().pull_applied(Utc::now());
    inner.publish();
    info!("[LedgerSync] Applied remote snapshot (revision {})", applied_revision);

    inner
        .runtime()
        .set_settle_task(spawn_settle(inner, applied_revision));
    PullOutcome::Applied
}

/// Lower the remote-update flag after the settle delay. Edits that landed while it was up
/// were ignored by the push trigger, so they are scheduled now.
fn spawn_settle(inner: &Arc<EngineInner>, applied_revision: u64) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    let delay = inner.timings.remote_update_settle;
    inner.handle.spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        inner.coordinator().end_remote_update();
        if inner.ledger.revision() != applied_revision {
            debug!("[LedgerSync] Edits arrived while applying remote data; scheduling push");
            inner.schedule_push(SyncCycleTrigger::LocalMutation);
        }
        inner.publish();
    })
}

pub(crate) fn spawn_pull_loop(inner: &Arc<EngineInner>) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    let period = inner.timings.pull_interval;

    inner.handle.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let outcome = run_pull_tick(&inner).await;
            debug!("[LedgerSync] Pull tick: {:?}", outcome);
            if outcome == PullOutcome::Revoked {
                break;
            }
        }
    })
}
