//! Cancel-on-supersede timer.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Runs an action once no new trigger arrived for the quiet period.
///
/// The timer and the action run in separate tasks: cancelling or superseding a timer never
/// aborts an action that already started.
pub struct Debouncer {
    quiet_period: Duration,
    handle: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(quiet_period: Duration, handle: Handle) -> Self {
        Self {
            quiet_period,
            handle,
            pending: Mutex::new(None),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    fn slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn trigger<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.trigger_after(self.quiet_period, action);
    }

    /// Arm the timer with an explicit delay, replacing any pending one.
    pub fn trigger_after<F, Fut>(&self, delay: Duration, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot();
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let spawner = self.handle.clone();
        *slot = Some(self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            spawner.spawn(action());
        }));
    }

    /// Drop the pending timer. Returns true if one was still waiting.
    pub fn cancel(&self) -> bool {
        match self.slot().take() {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot().as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_action(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> futures::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_triggers_fire_once() {
        let debouncer = Debouncer::new(Duration::from_millis(2000), Handle::current());
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            debouncer.trigger(counting_action(&fired));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(debouncer.is_pending());
        tokio::time::sleep(Duration::from_millis(1700)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let debouncer = Debouncer::new(Duration::from_millis(2000), Handle::current());
        let fired = Arc::new(AtomicUsize::new(0));

        debouncer.trigger(counting_action(&fired));
        assert!(debouncer.cancel());
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!debouncer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_does_not_abort_started_action() {
        let debouncer = Debouncer::new(Duration::from_millis(100), Handle::current());
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&finished);

        debouncer.trigger(move || async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            flag.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(150)).await;
        debouncer.cancel();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
