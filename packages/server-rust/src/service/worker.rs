//! Periodic upkeep jobs bound to the server's lifetime.
//!
//! A [`BackgroundWorker`] owns one spawned task that runs a
//! [`BackgroundRunnable`] every `interval` until stopped or dropped.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// A job run on every tick of a [`BackgroundWorker`].
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    /// Short name used in log events.
    fn name(&self) -> &'static str;

    async fn on_tick(&mut self);

    /// Runs once after the last tick. No-op unless overridden.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Handle to a spawned periodic job.
///
/// The first tick happens one full `interval` after start. A tick that runs
/// late is not made up with a burst; the schedule shifts instead. Once a stop
/// is requested no further tick starts, and `shutdown()` runs before the task
/// exits. Dropping the handle requests a stop without waiting for it.
pub struct BackgroundWorker {
    name: &'static str,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<u64>>,
}

impl BackgroundWorker {
    /// Spawns the worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is zero.
    pub fn start<R: BackgroundRunnable>(mut runnable: R, interval: Duration) -> Self {
        let name = runnable.name();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks = 0_u64;

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        runnable.on_tick().await;
                        ticks += 1;
                    }
                }
            }

            runnable.shutdown().await;
            tracing::debug!(worker = name, ticks, "background worker stopped");
            ticks
        });

        #[allow(clippy::cast_possible_truncation)]
        let interval_ms = interval.as_millis() as u64;
        tracing::debug!(worker = name, interval_ms, "background worker started");

        Self {
            name,
            stop_tx: Some(stop_tx),
            task: Some(task),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `true` until [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Requests a stop and waits for the task to finish. Returns the number of
    /// ticks run, or 0 if the worker was already stopped.
    pub async fn stop(&mut self) -> u64 {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let Some(task) = self.task.take() else {
            return 0;
        };
        match task.await {
            Ok(ticks) => ticks,
            Err(e) => {
                tracing::warn!(worker = self.name, error = %e, "background worker task failed");
                0
            }
        }
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
