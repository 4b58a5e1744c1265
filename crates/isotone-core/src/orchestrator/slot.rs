use std::{sync::Arc, time::SystemTime};

use isotone_types::{Operation, Phase, ServiceState};
use parking_lot::{Mutex, MutexGuard};

use crate::{orchestrator::ServiceOrchestrator, Error, Result};

#[derive(Debug)]
pub(super) struct SlotInner {
    pub state: ServiceState,
    pub in_flight: Option<Operation>,
    /// Bumped whenever a command begins; probes taken under an older epoch
    /// are stale.
    pub epoch: u64,
}

#[derive(Debug)]
pub(super) struct Slot(Mutex<SlotInner>);

impl Slot {
    pub fn new(now: SystemTime) -> Self {
        Self(Mutex::new(SlotInner {
            state: ServiceState::unknown(now),
            in_flight: None,
            epoch: 0,
        }))
    }

    pub fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.0.lock()
    }
}

/// Holds a service's exclusivity guard. Dropping it without calling
/// [`FlightGuard::complete`] releases the guard and, if the service is still
/// in a transient phase, moves it to `Error`.
pub(super) struct FlightGuard<'a> {
    orchestrator: &'a ServiceOrchestrator,
    idx: usize,
}

impl FlightGuard<'_> {
    /// Apply the outcome of the operation and release the guard in one step.
    pub fn complete(self, settle: impl FnOnce(&mut ServiceState)) {
        self.orchestrator.update_slot(self.idx, |inner| {
            settle(&mut inner.state);
            inner.in_flight = None;
        });
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.update_slot(self.idx, |inner| {
            if inner.in_flight.take().is_some() && inner.state.phase.is_transient() {
                inner.state.phase = Phase::Error;
                inner.state.last_error = Some("operation cancelled".to_owned());
            }
        });
    }
}

impl ServiceOrchestrator {
    /// Claim the exclusivity guard of service `idx` and enter the transient
    /// phase of `operation`.
    pub(super) fn begin(&self, idx: usize, operation: Operation) -> Result<FlightGuard<'_>> {
        let name = &self.descriptor(idx).name;
        let mut inner = self.slots[idx].lock();

        if let Some(current) = inner.in_flight {
            return Err(Error::OperationInProgress {
                service: name.clone(),
                operation: current,
            });
        }
        // until the first probe answers, the installed flag means nothing
        if inner.state.phase != Phase::Unknown {
            match (operation, inner.state.is_installed) {
                (Operation::Install, true) => {
                    return Err(Error::AlreadyInstalled(name.clone()));
                }
                (Operation::Install, false) | (_, true) => {}
                (_, false) => return Err(Error::NotInstalled(name.clone())),
            }
        }

        let previous = inner.state.clone();
        inner.in_flight = Some(operation);
        inner.epoch += 1;
        if let Some(phase) = operation.transient_phase() {
            inner.state.phase = phase;
        }
        self.commit(idx, &mut *inner, &previous);
        drop(inner);

        tracing::debug!(service = %name, %operation, "operation began");
        Ok(FlightGuard {
            orchestrator: self,
            idx,
        })
    }

    /// Mutate service `idx` under its lock, then publish the result.
    pub(super) fn update_slot(&self, idx: usize, f: impl FnOnce(&mut SlotInner)) {
        let mut inner = self.slots[idx].lock();
        let previous = inner.state.clone();
        f(&mut *inner);
        self.commit(idx, &mut *inner, &previous);
    }

    /// Stamp a phase change, mirror the slot into the snapshot and notify
    /// subscribers. Runs with the slot lock held so that events of one
    /// service are published in order.
    fn commit(&self, idx: usize, inner: &mut SlotInner, previous: &ServiceState) {
        let changed = inner.state.phase != previous.phase;
        if changed {
            inner.state.last_transition_at = SystemTime::now();
        }

        {
            let mut snapshot = self.snapshot.write();
            let entry = &mut Arc::make_mut(&mut snapshot)[idx];
            entry.state = inner.state.clone();
            entry.in_flight = inner.in_flight;
        }

        if changed {
            tracing::debug!(
                service = %self.descriptor(idx).name,
                from = %previous.phase,
                to = %inner.state.phase,
                "phase changed"
            );
            self.publisher
                .publish(&self.descriptor(idx).name, previous, &inner.state);
        }
    }
}
