use std::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

type TaskSlot = Mutex<Option<JoinHandle<()>>>;

fn lock(slot: &TaskSlot) -> MutexGuard<'_, Option<JoinHandle<()>>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Background tasks that live only while the remote link is active.
#[derive(Debug, Default)]
pub(crate) struct SyncRuntimeState {
    pull_task: TaskSlot,
    refresher_task: TaskSlot,
    settle_task: TaskSlot,
}

impl SyncRuntimeState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn replace(slot: &TaskSlot, handle: JoinHandle<()>) {
        if let Some(previous) = lock(slot).replace(handle) {
            previous.abort();
        }
    }

    fn is_running(slot: &TaskSlot) -> bool {
        lock(slot).as_ref().is_some_and(|h| !h.is_finished())
    }

    pub(crate) fn pull_running(&self) -> bool {
        Self::is_running(&self.pull_task)
    }

    pub(crate) fn set_pull_task(&self, handle: JoinHandle<()>) {
        Self::replace(&self.pull_task, handle);
    }

    pub(crate) fn set_refresher_task(&self, handle: JoinHandle<()>) {
        Self::replace(&self.refresher_task, handle);
    }

    pub(crate) fn set_settle_task(&self, handle: JoinHandle<()>) {
        Self::replace(&self.settle_task, handle);
    }

    /// Abort every interval. A tick already past its last await completes; its result is
    /// dropped by the coordinator's guards.
    pub(crate) fn stop_all(&self) {
        for slot in [&self.pull_task, &self.refresher_task, &self.settle_task] {
            if let Some(handle) = lock(slot).take() {
                handle.abort();
            }
        }
    }
}
