//! Generic periodic task runner, built on the tick/cancel shape the rest of
//! this codebase uses for background workers: a `tokio::time::interval`
//! raced against a `CancellationToken` inside `tokio::select!`.
//!
//! Each sync task (split sync, segment sync, impression flush, the three
//! metrics flushes) is one [`PeriodicTask`] wrapping a callback; the
//! callback's own errors are logged and swallowed so one bad tick never
//! kills the loop.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::SyncResult;

struct RunningState {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// A named, tick-driven background task with start/stop/is-running
/// lifecycle. `start` is idempotent: calling it while already running is a
/// no-op rather than spawning a second loop.
pub struct PeriodicTask {
    name: String,
    period: Duration,
    state: Mutex<Option<RunningState>>,
}

impl PeriodicTask {
    pub fn new(name: impl Into<String>, period: Duration) -> Self {
        Self {
            name: name.into(),
            period,
            state: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start the tick loop, spawning `callback` once per period until
    /// `stop` is called. Each tick runs to completion before the next is
    /// considered, so at most one invocation of `callback` is ever in
    /// flight.
    pub fn start<F, Fut>(&self, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SyncResult<()>> + Send + 'static,
    {
        let mut guard = self.state.lock().expect("periodic task lock poisoned");
        if guard.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let period = self.period;
        let name = self.name.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Run the tick on its own task so a panicking callback
                        // unwinds that task alone, not this loop.
                        match tokio::spawn(callback()).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                sync_warn!(sync, task = %name, error = %e, "periodic task callback failed");
                            }
                            Err(join_err) => {
                                sync_warn!(sync, task = %name, error = %join_err, "periodic task callback panicked");
                            }
                        }
                    }
                    _ = task_cancel.cancelled() => break,
                }
            }
        });

        *guard = Some(RunningState { cancel, handle });
    }

    /// Signal cancellation and wait for the in-flight tick (if any) to
    /// finish. A no-op if the task isn't running.
    pub async fn stop(&self) {
        let state = self
            .state
            .lock()
            .expect("periodic task lock poisoned")
            .take();
        if let Some(state) = state {
            state.cancel.cancel();
            let _ = state.handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().expect("periodic task lock poisoned").is_some()
    }
}
