//! Quiet-window debouncing on the tokio timer.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::trace;

/// Runs the most recently scheduled action once input has been quiet for
/// the configured window.
///
/// Must be used from within a tokio runtime.
pub struct Debouncer {
    window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
        }
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Run `action` after the window unless another call comes first.
    pub fn schedule<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let window = self.window;
        let task = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            action();
        });
        if let Some(previous) = self.pending.lock().replace(task) {
            trace!("Restarting debounce window");
            previous.abort();
        }
    }

    /// Drop the pending action, if any.
    pub fn cancel(&self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
    }

    /// Whether an action is waiting for the window to pass.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
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
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_millis(100);

    fn recorder() -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        (Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_quiet_window() {
        let debouncer = Debouncer::new(WINDOW);
        let (fired, _) = recorder();
        let counter = fired.clone();
        debouncer.schedule(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_calls_coalesce_to_last() {
        let debouncer = Debouncer::new(WINDOW);
        let (fired, last) = recorder();

        for value in [10, 20, 30] {
            let (fired, last) = (fired.clone(), last.clone());
            debouncer.schedule(move || {
                fired.fetch_add(1, Ordering::SeqCst);
                last.store(value, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(40)).await;
        }

        tokio::time::sleep(WINDOW).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_action() {
        let debouncer = Debouncer::new(WINDOW);
        let (fired, _) = recorder();
        let counter = fired.clone();
        debouncer.schedule(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();
        debouncer.cancel();

        tokio::time::sleep(WINDOW * 2).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (fired, _) = recorder();
        {
            let debouncer = Debouncer::new(WINDOW);
            let counter = fired.clone();
            debouncer.schedule(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(WINDOW * 2).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
