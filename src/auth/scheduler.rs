//! Proactive credential renewal timer.
//!
//! At most one timer is live at a time. Every timer is tagged with the
//! session epoch active when it was armed; the tick callback returns `false`
//! to stop the loop, which is how stale-epoch ticks and failed renewals
//! terminate it.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

enum SchedulerState {
    Idle,
    Armed { epoch: u64, handle: JoinHandle<()> },
}

pub struct RefreshScheduler {
    state: Mutex<SchedulerState>,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Mutex::new(SchedulerState::Idle),
            interval,
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(*self.state.lock().unwrap(), SchedulerState::Armed { .. })
    }

    pub fn armed_epoch(&self) -> Option<u64> {
        match *self.state.lock().unwrap() {
            SchedulerState::Armed { epoch, .. } => Some(epoch),
            SchedulerState::Idle => None,
        }
    }

    /// Arm the recurring timer for `epoch`.
    ///
    /// No-op when already armed for the same epoch; a timer armed for an
    /// older epoch is cancelled and replaced. `tick(epoch)` fires after each
    /// interval and keeps the timer alive by returning `true`.
    pub fn start<F, Fut>(&self, epoch: u64, tick: F)
    where
        F: Fn(u64) -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let mut state = self.state.lock().unwrap();
        if let SchedulerState::Armed { epoch: armed, .. } = &*state {
            if *armed == epoch {
                return;
            }
        }
        if let SchedulerState::Armed { handle, .. } =
            std::mem::replace(&mut *state, SchedulerState::Idle)
        {
            handle.abort();
        }

        let interval = self.interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !tick(epoch).await {
                    break;
                }
            }
        });
        debug!(epoch, interval_secs = interval.as_secs(), "refresh timer armed");
        *state = SchedulerState::Armed { epoch, handle };
    }

    /// Cancel any pending timer. Safe to call repeatedly, from any state,
    /// and from inside the tick callback itself.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        if let SchedulerState::Armed { epoch, handle } =
            std::mem::replace(&mut *state, SchedulerState::Idle)
        {
            handle.abort();
            debug!(epoch, "refresh timer stopped");
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let SchedulerState::Armed { handle, .. } = &*self.state.lock().unwrap() {
            handle.abort();
        }
    }
}
