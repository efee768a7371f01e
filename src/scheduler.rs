use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

/// Runs a body at a fixed interval until cancelled. The first run happens
/// immediately.
pub struct Poller {
    interval: Duration,
}

/// Handle that stops a running [`Poller`].
#[derive(Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

pub fn cancel_pair() -> (CancelHandle, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, rx)
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Run `body` every interval until `cancel` flips to true or its sender is
    /// dropped. Returns the number of completed runs. A run in progress is
    /// allowed to finish.
    pub async fn run<F, Fut>(&self, mut cancel: watch::Receiver<bool>, mut body: F) -> u64
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut runs = 0u64;

        loop {
            if *cancel.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    body().await;
                    runs += 1;
                }
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(runs, "poller stopped");
        runs
    }
}
