//! Sync engine: link lifecycle, background intervals and the public surface.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Duration;

use homeledger_core::ledger::{LedgerChange, LedgerObserver, LedgerStore};
use homeledger_core::secrets::{AccessToken, CredentialStore};
use homeledger_core::settings::AppPreferences;
use homeledger_core::sync::{
    CredentialProvider, MutationDecision, RemoteLinkConfig, RemoteTableClient, SyncCoordinator,
    SyncCycleTrigger, SyncReport, SyncTimings,
};
use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::debounce::Debouncer;
use crate::error::{Result, SyncEngineError};
use crate::runtime::SyncRuntimeState;
use crate::{pull, push, refresher};

pub(crate) struct EngineInner {
    pub(crate) ledger: Arc<LedgerStore>,
    pub(crate) prefs: AppPreferences,
    pub(crate) remote: Arc<dyn RemoteTableClient>,
    pub(crate) provider: Arc<dyn CredentialProvider>,
    pub(crate) credentials: Arc<dyn CredentialStore>,
    pub(crate) timings: SyncTimings,
    pub(crate) handle: Handle,
    coordinator: Mutex<SyncCoordinator>,
    link_config: RwLock<Option<RemoteLinkConfig>>,
    report_tx: watch::Sender<SyncReport>,
    runtime: SyncRuntimeState,
    push_timer: Debouncer,
}

impl EngineInner {
    /// Never hold the returned guard across an `.await` or a ledger mutation.
    pub(crate) fn coordinator(&self) -> MutexGuard<'_, SyncCoordinator> {
        self.coordinator.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn link_config(&self) -> Option<RemoteLinkConfig> {
        self.link_config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_link_config(&self, config: Option<RemoteLinkConfig>) {
        *self.link_config.write().unwrap_or_else(|e| e.into_inner()) = config;
    }

    pub(crate) fn runtime(&self) -> &SyncRuntimeState {
        &self.runtime
    }

    /// Push the coordinator's current projection to subscribers.
    pub(crate) fn publish(&self) {
        let report = self.coordinator().report();
        self.report_tx.send_if_modified(|current| {
            if *current == report {
                false
            } else {
                debug!(
                    "[LedgerSync] Status {} -> {}",
                    current.status.as_str(),
                    report.status.as_str()
                );
                *current = report;
                true
            }
        });
    }

    /// Arm (or re-arm) the push timer.
    pub(crate) fn arm_push(self: &Arc<Self>, delay: Duration, trigger: SyncCycleTrigger) {
        let weak = Arc::downgrade(self);
        self.push_timer.trigger_after(delay, move || async move {
            if let Some(inner) = weak.upgrade() {
                push::run_push(inner, trigger).await;
            }
        });
    }

    pub(crate) fn arm_push_debounce(self: &Arc<Self>, trigger: SyncCycleTrigger) {
        self.arm_push(self.push_timer.quiet_period(), trigger);
    }

    pub(crate) fn cancel_push_timer(&self) {
        if self.push_timer.cancel() {
            debug!("[LedgerSync] Pending push timer cancelled");
        }
    }

    /// Treat a change as a local edit: schedule a debounced push when allowed.
    pub(crate) fn schedule_push(self: &Arc<Self>, trigger: SyncCycleTrigger) -> MutationDecision {
        let decision = self.coordinator().on_local_mutation();
        match decision {
            MutationDecision::Schedule => self.arm_push_debounce(trigger),
            MutationDecision::Deferred => {
                debug!("[LedgerSync] Push in flight; re-arming when it ends")
            }
            MutationDecision::SkipRemoteOrigin => {
                debug!("[LedgerSync] Ignoring change applied from remote")
            }
            MutationDecision::SkipUnlinked => {}
        }
        self.publish();
        decision
    }

    /// Drop the link after an auth failure: clear the token and stop every timer.
    pub(crate) fn tear_down_after_auth_failure(&self) {
        if let Err(err) = self.credentials.clear_token() {
            warn!("[LedgerSync] Failed to clear access token: {}", err);
        }
        self.cancel_push_timer();
        self.runtime.stop_all();
        warn!("[LedgerSync] Credentials rejected. Sync disconnected until reconnect.");
    }

    fn start_background_tasks(self: &Arc<Self>) {
        if self.runtime.pull_running() {
            return;
        }
        self.runtime.set_pull_task(pull::spawn_pull_loop(self));
        self.runtime
            .set_refresher_task(refresher::spawn_refresher(self));
    }

    fn activate(self: &Arc<Self>, config: RemoteLinkConfig) {
        self.runtime.stop_all();
        self.cancel_push_timer();
        self.set_link_config(Some(config));
        self.coordinator().link();
        self.start_background_tasks();
        self.publish();
    }

    fn save_token(&self, token: &AccessToken) {
        if let Err(err) = self.credentials.save_token(token) {
            warn!("[LedgerSync] Failed to persist access token: {}", err);
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.runtime.stop_all();
    }
}

/// Forwards ledger mutations to the push scheduler.
struct PushTrigger {
    inner: Weak<EngineInner>,
}

impl LedgerObserver for PushTrigger {
    fn on_ledger_changed(&self, change: &LedgerChange) {
        if let Some(inner) = self.inner.upgrade() {
            debug!("[LedgerSync] Ledger revision {} changed", change.revision);
            inner.schedule_push(SyncCycleTrigger::LocalMutation);
        }
    }
}

/// Keeps the local ledger mirrored to the remote spreadsheet.
#[derive(Clone)]
pub struct SyncEngine {
    pub(crate) inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Must be called from within a Tokio runtime; timers are spawned on it.
    pub fn new(
        ledger: Arc<LedgerStore>,
        prefs: AppPreferences,
        remote: Arc<dyn RemoteTableClient>,
        provider: Arc<dyn CredentialProvider>,
        credentials: Arc<dyn CredentialStore>,
        timings: SyncTimings,
    ) -> Result<Self> {
        let handle = Handle::try_current().map_err(|_| SyncEngineError::NoRuntime)?;
        let coordinator = SyncCoordinator::new(&timings);
        let (report_tx, _) = watch::channel(coordinator.report());

        let inner = Arc::new(EngineInner {
            ledger,
            prefs,
            remote,
            provider,
            credentials,
            timings,
            push_timer: Debouncer::new(timings.push_debounce, handle.clone()),
            handle,
            coordinator: Mutex::new(coordinator),
            link_config: RwLock::new(None),
            report_tx,
            runtime: SyncRuntimeState::new(),
        });

        inner.ledger.add_observer(Arc::new(PushTrigger {
            inner: Arc::downgrade(&inner),
        }));

        Ok(Self { inner })
    }

    pub fn ledger(&self) -> Arc<LedgerStore> {
        Arc::clone(&self.inner.ledger)
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncReport> {
        self.inner.report_tx.subscribe()
    }

    pub fn report(&self) -> SyncReport {
        self.inner.coordinator().report()
    }

    /// Link to the remote spreadsheet, prompting for consent.
    pub async fn connect(&self, config: RemoteLinkConfig) -> Result<SyncReport> {
        let config = RemoteLinkConfig::new(config.client_id, config.api_key, config.spreadsheet_id);
        if !config.is_complete() {
            return Err(SyncEngineError::IncompleteConfig);
        }

        let token = self
            .inner
            .provider
            .acquire_interactive(&config)
            .await
            .map_err(SyncEngineError::Credential)?;
        self.inner.save_token(&token);

        self.inner.prefs.save_remote_link_config(&config)?;
        self.inner.prefs.set_sync_enabled(true)?;

        info!(
            "[LedgerSync] Connected to spreadsheet {}",
            config.spreadsheet_id
        );
        self.inner.activate(config);
        Ok(self.report())
    }

    /// Re-link at startup from the persisted configuration without prompting.
    pub async fn resume(&self) -> Result<SyncReport> {
        if !self.inner.prefs.is_sync_enabled() {
            return Ok(self.report());
        }
        let Some(config) = self
            .inner
            .prefs
            .remote_link_config()
            .filter(RemoteLinkConfig::is_complete)
        else {
            debug!("[LedgerSync] Sync enabled but link configuration is incomplete");
            return Ok(self.report());
        };

        if self.inner.credentials.get_saved_token().is_none() {
            match self.inner.provider.acquire_silent(&config).await {
                Ok(token) => self.inner.save_token(&token),
                Err(err) => {
                    info!(
                        "[LedgerSync] No usable credentials at startup, staying offline: {}",
                        err
                    );
                    return Ok(self.report());
                }
            }
        }

        info!("[LedgerSync] Resumed link to spreadsheet {}", config.spreadsheet_id);
        self.inner.activate(config);
        Ok(self.report())
    }

    /// Drop the link. Local data and the saved configuration are kept.
    pub fn disconnect(&self) -> Result<()> {
        self.inner.runtime.stop_all();
        self.inner.cancel_push_timer();
        self.inner.coordinator().unlink();
        self.inner.set_link_config(None);
        self.inner.credentials.clear_token()?;
        self.inner.prefs.set_sync_enabled(false)?;
        self.inner.publish();
        info!("[LedgerSync] Disconnected");
        Ok(())
    }

    /// Push now, bypassing the debounce, then pull. Re-enables automatic retries.
    pub async fn manual_sync(&self) -> Result<SyncReport> {
        {
            let mut coordinator = self.inner.coordinator();
            if !coordinator.is_linked() {
                return Err(SyncEngineError::NotLinked);
            }
            coordinator.reset_retries();
            coordinator.cancel_pending();
        }
        self.inner.cancel_push_timer();

        push::run_push(Arc::clone(&self.inner), SyncCycleTrigger::Manual).await;
        let outcome = pull::run_pull_tick(&self.inner).await;
        debug!("[LedgerSync] Manual sync pull outcome: {:?}", outcome);
        Ok(self.report())
    }
}
