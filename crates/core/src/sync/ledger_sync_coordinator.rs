//! Push/pull coordination state for ledger sync.
//!
//! The coordinator owns every flag that keeps pushes and pulls from stepping on each other.
//! It performs no I/O and never awaits; the engine holds it behind a mutex and asks it for a
//! decision at each scheduling point.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::ledger_sync_model::{LinkState, SyncFailure, SyncReport, SyncStatus};
use super::ledger_sync_policy::{can_retry, push_retry_delay, SyncErrorKind};
use super::ledger_sync_scheduler::SyncTimings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    Idle,
    /// Debounce timer armed.
    Pending,
    /// Waiting on the retry timer after a transient failure.
    AwaitingRetry { attempt: u32 },
    /// Writes issued. `rearm` records mutations observed meanwhile.
    InFlight { rearm: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullState {
    Idle,
    Fetching { generation: u64 },
}

/// What to do with a local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationDecision {
    /// Arm (or re-arm) the debounce timer.
    Schedule,
    SkipUnlinked,
    /// Mutation came from applying a pulled snapshot.
    SkipRemoteOrigin,
    /// A push is in flight; a fresh debounce is armed when it ends.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushFailureAction {
    /// Credentials are gone. Tear down timers and wait for `connect()`.
    Disconnect,
    Retry { attempt: u32, delay: Duration },
    Terminal,
}

/// Issued when a pull starts; handed back when it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullTicket {
    pub generation: u64,
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullDecision {
    Begin(PullTicket),
    SkipUnlinked,
    /// A push is pending, waiting on retry, or in flight.
    SkipLocalEdits,
    SkipInProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullVerdict {
    Apply,
    Discard,
}

#[derive(Debug, Clone)]
pub struct SyncCoordinator {
    link: LinkState,
    push: PushState,
    pull: PullState,
    remote_update_in_flight: bool,
    retry_count: u32,
    max_retries: u32,
    retry_base_delay: Duration,
    generation: u64,
    last_synced_at: Option<DateTime<Utc>>,
    last_failure: Option<SyncFailure>,
}

impl Default for SyncCoordinator {
    fn default() -> Self {
        Self::new(&SyncTimings::default())
    }
}

impl SyncCoordinator {
    pub fn new(timings: &SyncTimings) -> Self {
        Self {
            link: LinkState::Unlinked,
            push: PushState::Idle,
            pull: PullState::Idle,
            remote_update_in_flight: false,
            retry_count: 0,
            max_retries: timings.max_push_retries,
            retry_base_delay: timings.retry_base_delay,
            generation: 0,
            last_synced_at: None,
            last_failure: None,
        }
    }

    pub fn link_state(&self) -> LinkState {
        self.link
    }

    pub fn is_linked(&self) -> bool {
        self.link == LinkState::Linked
    }

    pub fn push_state(&self) -> PushState {
        self.push
    }

    pub fn pull_state(&self) -> PullState {
        self.pull
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_failure(&self) -> Option<&SyncFailure> {
        self.last_failure.as_ref()
    }

    pub fn is_remote_update_in_flight(&self) -> bool {
        self.remote_update_in_flight
    }

    /// Activate the link. Any pull started under a previous link is invalidated.
    pub fn link(&mut self) {
        self.link = LinkState::Linked;
        self.retry_count = 0;
        self.last_failure = None;
        self.pull = PullState::Idle;
        // A settle task aborted by the relink can no longer lower the flag.
        self.remote_update_in_flight = false;
        self.generation += 1;
        self.cancel_pending();
    }

    /// User-initiated disconnect.
    pub fn unlink(&mut self) {
        self.link = LinkState::Unlinked;
        self.drop_link_state();
    }

    /// Drop the link after an auth failure. Status stays `Error` until the next `link()`.
    pub fn revoke(&mut self, failure: SyncFailure) {
        self.link = LinkState::Revoked;
        self.last_failure = Some(failure);
        self.drop_link_state();
    }

    fn drop_link_state(&mut self) {
        self.retry_count = 0;
        self.pull = PullState::Idle;
        self.remote_update_in_flight = false;
        self.generation += 1;
        self.cancel_pending();
    }

    pub fn on_local_mutation(&mut self) -> MutationDecision {
        if !self.is_linked() {
            return MutationDecision::SkipUnlinked;
        }
        if self.remote_update_in_flight {
            return MutationDecision::SkipRemoteOrigin;
        }
        match self.push {
            PushState::InFlight { .. } => {
                self.push = PushState::InFlight { rearm: true };
                MutationDecision::Deferred
            }
            PushState::Idle | PushState::Pending | PushState::AwaitingRetry { .. } => {
                self.push = PushState::Pending;
                MutationDecision::Schedule
            }
        }
    }

    /// Record that a retry timer is armed for `attempt`.
    pub fn schedule_retry(&mut self, attempt: u32) {
        if self.is_linked() && self.push == PushState::Idle {
            self.push = PushState::AwaitingRetry { attempt };
        }
    }

    /// Claim the push slot. Returns false if unlinked or another push holds it.
    pub fn try_begin_push(&mut self) -> bool {
        if !self.is_linked() {
            return false;
        }
        match self.push {
            PushState::InFlight { .. } => {
                self.push = PushState::InFlight { rearm: true };
                false
            }
            _ => {
                self.push = PushState::InFlight { rearm: false };
                true
            }
        }
    }

    /// Release the push slot. Returns true when a fresh debounce must be armed.
    pub fn end_push(&mut self) -> bool {
        let rearm = matches!(self.push, PushState::InFlight { rearm: true }) && self.is_linked();
        self.push = if rearm {
            PushState::Pending
        } else {
            PushState::Idle
        };
        rearm
    }

    pub fn push_succeeded(&mut self, at: DateTime<Utc>) {
        self.retry_count = 0;
        self.last_synced_at = Some(at);
        self.last_failure = None;
    }

    pub fn push_failed(&mut self, failure: SyncFailure) -> PushFailureAction {
        match failure.kind {
            SyncErrorKind::AuthExpired => {
                self.revoke(failure);
                PushFailureAction::Disconnect
            }
            SyncErrorKind::NetworkTransient if can_retry(self.retry_count, self.max_retries) => {
                self.retry_count += 1;
                self.last_failure = Some(failure);
                PushFailureAction::Retry {
                    attempt: self.retry_count,
                    delay: push_retry_delay(self.retry_count, self.retry_base_delay),
                }
            }
            SyncErrorKind::NetworkTransient
            | SyncErrorKind::RemoteNotFound
            | SyncErrorKind::Unclassified => {
                self.last_failure = Some(failure);
                PushFailureAction::Terminal
            }
        }
    }

    /// `revision` is the ledger revision observed before the fetch starts.
    pub fn try_begin_pull(&mut self, revision: u64) -> PullDecision {
        if !self.is_linked() {
            return PullDecision::SkipUnlinked;
        }
        if self.push != PushState::Idle {
            return PullDecision::SkipLocalEdits;
        }
        if matches!(self.pull, PullState::Fetching { .. }) || self.remote_update_in_flight {
            return PullDecision::SkipInProgress;
        }
        self.pull = PullState::Fetching {
            generation: self.generation,
        };
        PullDecision::Begin(PullTicket {
            generation: self.generation,
            revision,
        })
    }

    /// Post-fetch guard. Releases the pull slot and decides whether the data may be applied.
    pub fn finish_pull(&mut self, ticket: PullTicket, current_revision: u64) -> PullVerdict {
        self.abandon_pull(ticket);
        let stale = ticket.generation != self.generation
            || !self.is_linked()
            || self.push != PushState::Idle
            || current_revision != ticket.revision;
        if stale {
            PullVerdict::Discard
        } else {
            PullVerdict::Apply
        }
    }

    /// Release the pull slot without applying anything.
    pub fn abandon_pull(&mut self, ticket: PullTicket) {
        if self.pull == (PullState::Fetching { generation: ticket.generation }) {
            self.pull = PullState::Idle;
        }
    }

    pub fn pull_applied(&mut self, at: DateTime<Utc>) {
        self.last_synced_at = Some(at);
        self.retry_count = 0;
        self.last_failure = None;
    }

    pub fn begin_remote_update(&mut self) {
        self.remote_update_in_flight = true;
    }

    pub fn end_remote_update(&mut self) {
        self.remote_update_in_flight = false;
    }

    pub fn reset_retries(&mut self) {
        self.retry_count = 0;
    }

    /// Forget an armed debounce or retry. An in-flight push is left alone.
    pub fn cancel_pending(&mut self) {
        if matches!(
            self.push,
            PushState::Pending | PushState::AwaitingRetry { .. }
        ) {
            self.push = PushState::Idle;
        }
    }

    /// Record a failure that does not go through the push path (e.g. a missing token).
    pub fn record_failure(&mut self, failure: SyncFailure) {
        self.last_failure = Some(failure);
    }

    pub fn status(&self) -> SyncStatus {
        match self.link {
            LinkState::Unlinked => SyncStatus::Offline,
            LinkState::Revoked => SyncStatus::Error,
            LinkState::Linked => match (self.push, self.pull) {
                (PushState::Pending | PushState::InFlight { .. }, _) => SyncStatus::Saving,
                (PushState::AwaitingRetry { .. }, _) => SyncStatus::Error,
                (PushState::Idle, PullState::Fetching { .. }) => SyncStatus::Fetching,
                (PushState::Idle, PullState::Idle) if self.last_failure.is_some() => {
                    SyncStatus::Error
                }
                (PushState::Idle, PullState::Idle) => SyncStatus::Synced,
            },
        }
    }

    pub fn report(&self) -> SyncReport {
        SyncReport {
            status: self.status(),
            link: self.link,
            last_synced_at: self.last_synced_at,
            last_error: self.last_failure.as_ref().map(|f| f.message.clone()),
            last_error_kind: self.last_failure.as_ref().map(|f| f.kind),
            retry_count: self.retry_count,
        }
    }
}
