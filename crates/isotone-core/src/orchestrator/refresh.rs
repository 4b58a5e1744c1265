use futures::future::join_all;
use isotone_types::Phase;

use crate::{deadline::with_deadline, orchestrator::ServiceOrchestrator, Result};

/// What one [`ServiceOrchestrator::refresh`] pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Services whose phase changed.
    pub changed: usize,
    /// Services left alone because a command was in flight.
    pub skipped: usize,
    /// Services whose probe failed.
    pub failed: usize,
}

enum Reconciled {
    Changed,
    Unchanged,
    Skipped,
}

impl ServiceOrchestrator {
    /// Probe every idle service in parallel and fold the results into its
    /// state. Services with a command in flight are skipped, both before
    /// probing and when the result comes back.
    pub async fn refresh(&self) -> RefreshReport {
        let mut report = RefreshReport::default();

        let mut idle = Vec::with_capacity(self.slots.len());
        for (idx, slot) in self.slots.iter().enumerate() {
            let inner = slot.lock();
            if inner.in_flight.is_some() {
                report.skipped += 1;
            } else {
                idle.push((idx, inner.epoch));
            }
        }

        let probes = join_all(
            idle.into_iter()
                .map(|(idx, epoch)| async move { (idx, epoch, self.probe(idx).await) }),
        )
        .await;

        for (idx, epoch, probe) in probes {
            if probe.is_err() {
                report.failed += 1;
            }
            match self.reconcile(idx, epoch, probe) {
                Reconciled::Changed => report.changed += 1,
                Reconciled::Unchanged => {}
                Reconciled::Skipped => report.skipped += 1,
            }
        }

        tracing::trace!(?report, "refresh done");
        report
    }

    async fn probe(&self, idx: usize) -> Result<Phase> {
        let descriptor = self.descriptor(idx);
        let installed = with_deadline(
            &descriptor.name,
            "probe",
            self.timeouts.probe,
            self.control.is_installed(&descriptor.unit),
        )
        .await?;
        if !installed {
            return Ok(Phase::NotInstalled);
        }

        Ok(if self.probe_running(idx).await? {
            Phase::Running
        } else {
            Phase::Stopped
        })
    }

    fn reconcile(&self, idx: usize, epoch: u64, probe: Result<Phase>) -> Reconciled {
        let mut outcome = Reconciled::Skipped;
        self.update_slot(idx, |inner| {
            if inner.in_flight.is_some() || inner.epoch != epoch {
                return;
            }

            let before = inner.state.phase;
            match probe {
                Ok(phase) => {
                    inner.state.phase = phase;
                    inner.state.is_installed = phase != Phase::NotInstalled;
                    inner.state.last_error = None;
                }
                Err(err) => {
                    tracing::warn!(
                        service = %self.descriptor(idx).name,
                        "probe failed: {err}"
                    );
                    inner.state.phase = Phase::Error;
                    inner.state.last_error = Some(err.to_string());
                }
            }
            outcome = if inner.state.phase == before {
                Reconciled::Unchanged
            } else {
                Reconciled::Changed
            };
        });
        outcome
    }
}
