use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Background poll; no loading indicator, failures only logged.
    Silent,
    /// User-triggered refresh; forces scroll-to-bottom and clears the badge.
    Manual,
}

#[async_trait]
pub trait PollTarget: Send + Sync {
    async fn poll(&self, kind: FetchKind);
}

/// Owns the fixed-interval fetch loop. All fetches, scheduled or manual, run
/// under one gate so a slow silent poll and a pull-to-refresh cannot race
/// and resolve out of call order.
pub struct PollingScheduler {
    interval: Duration,
    gate: Arc<Mutex<()>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            gate: Arc::new(Mutex::new(())),
            task: Mutex::new(None),
        }
    }

    /// Spawns the tick loop. Idempotent while a loop is already running.
    /// The first interval elapses before the first poll, since callers do
    /// their own blocking initial fetch.
    pub async fn start(&self, target: Arc<dyn PollTarget>) {
        let mut slot = self.task.lock().await;
        if slot.is_some() {
            return;
        }
        let gate = Arc::clone(&self.gate);
        let interval = self.interval;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let _in_flight = gate.lock().await;
                target.poll(FetchKind::Silent).await;
            }
        }));
    }

    /// Aborts the tick loop. Must run on teardown; an orphaned loop keeps
    /// polling a dead screen.
    pub async fn stop(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Out-of-band fetch through the same single-flight gate.
    pub async fn run_now(&self, target: &dyn PollTarget, kind: FetchKind) {
        let _in_flight = self.gate.lock().await;
        target.poll(kind).await;
    }
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;
