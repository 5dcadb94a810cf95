//! Synthetic upload progress.
//!
//! The multipart request exposes no transfer callbacks, so progress is
//! simulated: 0 when the request starts, `+step` every `interval` up to
//! `ceiling`, then forced to 100 when the request settles.

use crate::config::ProgressConfig;
use crate::state::AppState;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct ProgressSimulator {
    interval: Duration,
    step: u8,
    ceiling: u8,
}

impl Default for ProgressSimulator {
    fn default() -> Self {
        Self::from_config(&ProgressConfig::default())
    }
}

impl ProgressSimulator {
    pub fn from_config(config: &ProgressConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            step: config.step,
            ceiling: config.ceiling,
        }
    }

    /// Set progress to 0 for `attempt` and start ticking.
    pub fn start(&self, state: &AppState, attempt: u64, cancel: CancellationToken) -> ProgressTicker {
        state.commit(attempt, |tx| tx.set_progress(Some(0)));

        let task_state = state.clone();
        let token = cancel.clone();
        let Self { interval, step, ceiling } = *self;
        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + interval, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => {
                        if !task_state.bump_progress(attempt, step, ceiling) {
                            break;
                        }
                    }
                }
            }
        });

        ProgressTicker {
            state: state.clone(),
            attempt,
            cancel,
            task: Some(task),
        }
    }
}

/// A running progress timer. Stopped exactly once: by [`finish`],
/// [`abandon`], or on drop.
///
/// [`finish`]: ProgressTicker::finish
/// [`abandon`]: ProgressTicker::abandon
pub struct ProgressTicker {
    state: AppState,
    attempt: u64,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    /// The request settled: stop ticking and show 100.
    pub fn finish(mut self) {
        self.stop();
        self.state.commit(self.attempt, |tx| tx.set_progress(Some(100)));
    }

    /// The request was superseded: stop ticking, leave the value alone.
    pub fn abandon(mut self) {
        self.stop();
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            self.cancel.cancel();
            task.abort();
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
