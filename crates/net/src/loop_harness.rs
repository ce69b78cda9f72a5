//! Cooperative single-task loop harness.

use crate::NetError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Runs exactly one long-lived task with cooperative cancellation.
///
/// `run` is idempotent under concurrent calls — exactly one task starts,
/// later calls while it is still running are no-ops. `stop` signals
/// cancellation without blocking and is safe to call any number of times.
/// `close` stops the current task (if any) and prevents further `run`
/// calls.
pub struct LoopHarness {
    handle: Mutex<Option<JoinHandle<()>>>,
    cancel: Mutex<Option<CancellationToken>>,
    closed: AtomicBool,
}

impl Default for LoopHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopHarness {
    /// Creates a harness with no task running.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handle: Mutex::new(None),
            cancel: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Starts `body` as the harness's task if one is not already running.
    ///
    /// `body` receives a [`CancellationToken`] it must observe promptly at
    /// natural suspension points.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Disposed`] if the harness has been closed.
    pub fn run<F, Fut>(&self, body: F) -> Result<(), NetError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NetError::Disposed);
        }

        let mut handle_guard = self.handle.lock().expect("loop harness mutex poisoned");
        if let Some(handle) = handle_guard.as_ref() {
            if !handle.is_finished() {
                return Ok(());
            }
        }

        let cancel = CancellationToken::new();
        *self.cancel.lock().expect("loop harness mutex poisoned") = Some(cancel.clone());
        *handle_guard = Some(tokio::spawn(body(cancel)));
        Ok(())
    }

    /// Signals cancellation to the running task, if any. Does not block.
    pub fn stop(&self) {
        if let Some(cancel) = self.cancel.lock().expect("loop harness mutex poisoned").as_ref() {
            cancel.cancel();
        }
    }

    /// Signals cancellation, releases the cancellation source, and prevents
    /// further `run` calls.
    pub fn close(&self) {
        self.stop();
        self.closed.store(true, Ordering::SeqCst);
        *self.cancel.lock().expect("loop harness mutex poisoned") = None;
    }

    /// Returns whether the harness has a task that has not yet finished.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .expect("loop harness mutex poisoned")
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn run_is_idempotent_under_concurrent_calls() {
        let harness = Arc::new(LoopHarness::new());
        let starts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let started = Arc::new(Notify::new());

        for _ in 0..8 {
            let starts = starts.clone();
            let started = started.clone();
            harness
                .run(move |cancel| async move {
                    starts.fetch_add(1, Ordering::SeqCst);
                    started.notify_one();
                    cancel.cancelled().await;
                })
                .unwrap();
        }

        started.notified().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        harness.stop();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!harness.is_running());
    }

    #[tokio::test]
    async fn close_rejects_further_run_calls() {
        let harness = LoopHarness::new();
        harness.close();

        let err = harness.run(|cancel| async move { cancel.cancelled().await }).unwrap_err();
        assert!(matches!(err, NetError::Disposed));
    }

    #[tokio::test]
    async fn stop_is_safe_to_call_repeatedly() {
        let harness = LoopHarness::new();
        harness.run(|cancel| async move { cancel.cancelled().await }).unwrap();
        harness.stop();
        harness.stop();
        harness.stop();
    }
}
