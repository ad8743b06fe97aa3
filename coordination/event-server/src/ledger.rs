use std::{
    collections::HashSet,
    sync::{Arc, PoisonError, RwLock},
    time::{Duration, Instant},
};

use interleave_core::Deployment;
use tracing::info;

use crate::resolver::{self, Received as _};

struct LedgerState {
    received: HashSet<String>,
    last_receipt: Instant,
}

/// Monotonic set of received events for one deployment run.
///
/// A receipt and the cascade it triggers happen under one write lock, so
/// readers never observe a receipt whose implied scheduling events are
/// still missing.
pub struct EventLedger {
    deployment: Arc<Deployment>,
    state: RwLock<LedgerState>,
}

impl EventLedger {
    #[must_use]
    pub fn new(deployment: Arc<Deployment>) -> Self {
        let mut received = HashSet::new();
        cascade(&deployment, &mut received);
        Self {
            deployment,
            state: RwLock::new(LedgerState {
                received,
                last_receipt: Instant::now(),
            }),
        }
    }

    #[must_use]
    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    #[must_use]
    pub fn has_received(&self, name: &str) -> bool {
        self.read(|state| state.received.has_received(name))
    }

    /// Records `name`. Returns `false` when it had already been received.
    pub fn receive(&self, name: &str) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.received.insert(name.to_owned()) {
            return false;
        }
        state.last_receipt = Instant::now();
        info!(event = name, "event received");
        cascade(&self.deployment, &mut state.received);
        true
    }

    #[must_use]
    pub fn dependencies_met(&self, name: &str, include_self: bool) -> bool {
        self.read(|state| {
            resolver::dependencies_met(&self.deployment, &state.received, name, include_self)
        })
    }

    #[must_use]
    pub fn blocking_dependencies_met(&self, name: &str) -> bool {
        self.read(|state| {
            resolver::blocking_dependencies_met(&self.deployment, &state.received, name)
        })
    }

    #[must_use]
    pub fn is_sequence_complete(&self) -> bool {
        self.read(|state| resolver::is_sequence_complete(&self.deployment, &state.received))
    }

    /// Time since the last explicit receipt. Scheduling events completed by
    /// the cascade do not count as progress.
    #[must_use]
    pub fn time_since_last_receipt(&self) -> Duration {
        self.read(|state| state.last_receipt.elapsed())
    }

    /// True once nothing was received for longer than `timeout` while the
    /// run sequence is still incomplete. Never stalls without a timeout.
    #[must_use]
    pub fn is_stalled(&self, timeout: Option<Duration>) -> bool {
        let Some(timeout) = timeout else {
            return false;
        };
        !self.is_sequence_complete() && self.time_since_last_receipt() > timeout
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read(|state| state.received.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Received event names, sorted.
    #[must_use]
    pub fn received(&self) -> Vec<String> {
        let mut names = self.read(|state| state.received.iter().cloned().collect::<Vec<_>>());
        names.sort_unstable();
        names
    }

    fn read<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&*state)
    }
}

/// Marks every scheduling event whose prerequisites are met, until nothing
/// changes. Scheduling events are gates no code reports, so this is the only
/// way they complete.
fn cascade(deployment: &Deployment, received: &mut HashSet<String>) {
    loop {
        let eligible = deployment
            .scheduling_events()
            .map(|(name, _)| name.as_str())
            .filter(|name| {
                !received.contains(*name)
                    && resolver::dependencies_met(deployment, &*received, name, false)
            })
            .map(ToOwned::to_owned)
            .collect::<Vec<_>>();
        if eligible.is_empty() {
            return;
        }
        for name in eligible {
            info!(event = %name, "scheduling event implicitly received");
            received.insert(name);
        }
    }
}
