use crate::log_source::LogSource;
use log::{error, info};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Drives `LogSource::refresh` from a timer task. The task stops on
/// `shutdown` or when the scheduler is dropped. A refresh already under
/// way runs to completion in its own task.
pub struct RefreshScheduler {
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Refreshes once right away, then every `period` if one is given.
    pub fn start(source: Arc<LogSource>, period: Option<Duration>) -> Self {
        let handle = tokio::spawn(async move {
            match period {
                Some(period) => {
                    info!("Auto refresh every {:?}", period);
                    let mut ticker = interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        // first tick completes immediately
                        ticker.tick().await;
                        run_detached(&source).await;
                    }
                }
                None => {
                    info!("Auto refresh disabled");
                    run_detached(&source).await;
                }
            }
        });

        Self {
            handle: Some(handle),
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Refresh scheduler stopped");
        }
    }
}

/// Aborting the timer task drops the join handle, which detaches the
/// refresh instead of cancelling it.
async fn run_detached(source: &Arc<LogSource>) {
    let source = Arc::clone(source);
    if let Err(e) = tokio::spawn(async move { source.refresh().await }).await {
        error!("Refresh task failed: {}", e);
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
