//! Cancellable background tasks

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Shared flag async work checks before applying a result.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn kill(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns a spawned task; dropping the handle aborts it and flips its liveness.
#[derive(Debug)]
pub struct TaskHandle {
    liveness: Liveness,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn spawn<F>(liveness: Liveness, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self { liveness, join: tokio::spawn(future) }
    }

    pub fn cancel(&self) {
        self.liveness.kill();
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive() && !self.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs `start` once, then `tick` every `period` for as long as `start`
/// reported success and the liveness flag holds. Ticks run sequentially, a
/// slow tick delays the next one instead of overlapping it.
pub fn spawn_periodic<S, T, TF>(liveness: Liveness, period: Duration, start: S, mut tick: T) -> TaskHandle
where
    S: Future<Output = bool> + Send + 'static,
    T: FnMut() -> TF + Send + 'static,
    TF: Future<Output = ()> + Send + 'static,
{
    let flag = liveness.clone();
    TaskHandle::spawn(liveness, async move {
        if !start.await {
            return;
        }
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while flag.is_alive() {
            ticker.tick().await;
            if !flag.is_alive() {
                break;
            }
            tick().await;
        }
    })
}

/// Runs `work` once in the background.
pub fn spawn_once<F>(liveness: Liveness, work: F) -> TaskHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    TaskHandle::spawn(liveness, work)
}
