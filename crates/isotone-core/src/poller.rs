use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::orchestrator::ServiceOrchestrator;

/// Drives [`ServiceOrchestrator::refresh`] on a fixed interval.
///
/// Refreshes run inline, so at most one is in flight; ticks missed while a
/// refresh is slow are skipped rather than queued.
#[derive(Debug, Clone, Copy)]
pub struct StatusPoller {
    interval: Duration,
}

impl StatusPoller {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Start polling. The first refresh happens immediately.
    pub fn spawn(
        self,
        orchestrator: Arc<ServiceOrchestrator>,
        cancel: CancellationToken,
    ) -> PollerHandle {
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::debug!(interval = ?self.interval, "status poller started");

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    report = orchestrator.refresh() => {
                        if report.changed > 0 || report.failed > 0 {
                            tracing::debug!(?report, "poll tick");
                        }
                    }
                }
            }
            tracing::debug!("status poller stopped");
        });

        PollerHandle { cancel, task }
    }
}

pub struct PollerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Cancel the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            tracing::error!("status poller task failed: {err}");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
