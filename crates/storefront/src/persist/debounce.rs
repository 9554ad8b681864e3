//! Cancellable delayed actions.
//!
//! A [`Debouncer`] holds at most one pending action. Scheduling a new action
//! aborts the pending one and restarts the quiet-period timer, so only the
//! last action of a burst runs. Actions run on Tokio's blocking pool and may
//! do blocking I/O.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

/// Coalesces repeated triggers into a single delayed action.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Default quiet period for cart persistence.
    pub const DEFAULT_WINDOW: Duration = Duration::from_millis(300);

    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Cancel any pending action and run `action` once the window elapses
    /// without another call to `schedule`.
    ///
    /// Outside a Tokio runtime there is no timer to wait on, so `action` runs
    /// immediately.
    pub fn schedule<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        let Ok(runtime) = Handle::try_current() else {
            action();
            return;
        };

        let window = self.window;
        self.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(window).await;
            // Aborting this task no longer stops an action that has started.
            if let Err(e) = tokio::task::spawn_blocking(action).await {
                warn!(error = %e, "Debounced action failed");
            }
        }));
    }

    /// Abort the pending action. Returns `true` if one was still waiting.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Whether an action is scheduled and has not run yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}
