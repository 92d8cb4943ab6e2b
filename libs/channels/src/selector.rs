//! Multi-channel selection
//!
//! [`Selector::select`] takes an ordered list of `(endpoint, action)` cases,
//! waits until at least one endpoint is ready and runs the action of the
//! first ready one in list order. Earlier cases win ties, so callers encode
//! priority by ordering.
//!
//! ## Wakeups
//!
//! While selecting, the selector installs itself as the observer of every
//! endpoint. Listener threads call that observer when an endpoint becomes
//! ready. The scan and the wait both happen under the selector's lock and
//! the observer takes the same lock before notifying, so a readiness change
//! during a scan is never lost.
//!
//! An endpoint holds one observer slot. Selecting on the same endpoint from
//! two selectors at once leaves only the most recent one installed.

use crate::endpoint::{deadline_after, Observer, Selectable};
use crate::error::{ChannelError, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// One candidate of a select: an endpoint and what to do when it is ready
pub struct SelectCase<'a, R> {
    endpoint: &'a dyn Selectable,
    action: Box<dyn FnOnce() -> R + 'a>,
}

impl<'a, R> SelectCase<'a, R> {
    pub fn new<F>(endpoint: &'a dyn Selectable, action: F) -> Self
    where
        F: FnOnce() -> R + 'a,
    {
        Self {
            endpoint,
            action: Box::new(action),
        }
    }
}

/// Counters kept across select calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectorStats {
    /// Completed selects
    pub selects: u64,
    /// Scans that found no ready endpoint
    pub idle_scans: u64,
    /// Time spent scanning, ready or not
    pub scan_time: Duration,
}

#[derive(Debug, Default)]
struct State {
    generation: u64,
    stats: SelectorStats,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    changed: Condvar,
}

impl Shared {
    fn wake(&self) {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        drop(state);
        self.changed.notify_all();
    }
}

#[derive(Debug, Default)]
pub struct Selector {
    shared: Arc<Shared>,
}

/// Clears the observers it installed, including on unwind
struct ObserverGuard<'s, 'a> {
    endpoints: &'s [&'a dyn Selectable],
}

impl<'s, 'a> ObserverGuard<'s, 'a> {
    fn install(endpoints: &'s [&'a dyn Selectable], observer: &Observer) -> Self {
        for endpoint in endpoints {
            endpoint.set_observer(Some(Arc::clone(observer)));
        }
        Self { endpoints }
    }
}

impl Drop for ObserverGuard<'_, '_> {
    fn drop(&mut self) {
        for endpoint in self.endpoints {
            endpoint.set_observer(None);
        }
    }
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until a case is ready, then run its action and return its result
    pub fn select<R>(&self, cases: Vec<SelectCase<'_, R>>) -> Result<R> {
        self.select_until(cases, None)?
            .ok_or_else(|| ChannelError::timeout("select", u64::MAX))
    }

    /// Like [`select`](Self::select) but returns `Ok(None)` if nothing became
    /// ready within `timeout`
    pub fn select_timeout<R>(
        &self,
        cases: Vec<SelectCase<'_, R>>,
        timeout: Duration,
    ) -> Result<Option<R>> {
        match deadline_after(timeout) {
            Some(deadline) => self.select_until(cases, Some(deadline)),
            None => self.select(cases).map(Some),
        }
    }

    pub fn stats(&self) -> SelectorStats {
        self.shared.state.lock().stats
    }

    fn select_until<R>(
        &self,
        cases: Vec<SelectCase<'_, R>>,
        deadline: Option<Instant>,
    ) -> Result<Option<R>> {
        if cases.is_empty() {
            return Err(ChannelError::NothingToSelect);
        }

        let (endpoints, mut actions): (Vec<&dyn Selectable>, Vec<_>) = cases
            .into_iter()
            .map(|case| (case.endpoint, Some(case.action)))
            .unzip();

        let observer: Observer = {
            let shared = Arc::clone(&self.shared);
            Arc::new(move || shared.wake())
        };
        let guard = ObserverGuard::install(&endpoints, &observer);

        let mut state = self.shared.state.lock();
        let ready = loop {
            let scan_started = Instant::now();
            let found = endpoints.iter().position(|endpoint| endpoint.probe());
            state.stats.scan_time += scan_started.elapsed();

            if found.is_some() {
                break found;
            }
            state.stats.idle_scans += 1;

            match deadline {
                None => self.shared.changed.wait(&mut state),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        break None;
                    }
                    // A timed-out wait still gets one more scan above
                    let _ = self.shared.changed.wait_until(&mut state, deadline);
                }
            }
        };
        if ready.is_some() {
            state.stats.selects += 1;
        }
        drop(state);
        drop(guard);

        let Some(index) = ready else {
            trace!("Select timed out");
            return Ok(None);
        };
        trace!(endpoint = %endpoints[index].name(), index, "Select picked endpoint");
        let action = actions[index].take().ok_or(ChannelError::NothingToSelect)?;
        Ok(Some(action()))
    }
}
