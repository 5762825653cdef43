//! Flight Table Module
//!
//! Per-key coordination of cache-miss loads. The first caller to miss on a
//! key claims its flight and becomes the owner responsible for running the
//! loader; every other caller missing on the same key joins the existing
//! flight and blocks until it resolves. Keys never contend with each other.

use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

// == Flight State ==
/// Lifecycle of one in-flight load.
///
/// `Pending` while the owner works; `Complete` once a fresh entry is in the
/// store (or was found already fresh on the owner's re-check); `Failed` when
/// the owner's loader errored or panicked and nothing was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    Pending,
    Complete,
    Failed,
}

// == Flight ==
/// Completion latch shared by the owner and joiners of one load.
///
/// Carries no value: joiners wake and re-read the entry store themselves,
/// which keeps loader errors out of shared state and makes a failed flight
/// naturally retryable by whoever claims next.
#[derive(Debug)]
pub struct Flight {
    state: Mutex<FlightState>,
    done: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Pending),
            done: Condvar::new(),
        }
    }

    // == Wait ==
    /// Blocks until the flight resolves, returning the final state.
    ///
    /// Returns immediately if the flight already resolved.
    pub fn wait(&self) -> FlightState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while *state == FlightState::Pending {
            state = self
                .done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *state
    }

    /// Current state without blocking.
    #[allow(dead_code)]
    pub fn state(&self) -> FlightState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, outcome: FlightState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = outcome;
        self.done.notify_all();
    }
}

// == Claim ==
/// Outcome of [`FlightTable::claim`].
pub enum Claim<'a, K>
where
    K: Eq + Hash + Clone,
{
    /// This caller opened the flight and must run the load.
    Owner(FlightGuard<'a, K>),
    /// Another caller already owns the key's flight; wait on it.
    Joined(Arc<Flight>),
}

// == Flight Table ==
/// Maps keys to their live flights.
///
/// A key has at most one live flight; the flight leaves the table the
/// moment it resolves, so the next miss opens a fresh one.
#[derive(Debug)]
pub struct FlightTable<K>
where
    K: Eq + Hash + Clone,
{
    flights: DashMap<K, Arc<Flight>>,
}

impl<K> FlightTable<K>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            flights: DashMap::new(),
        }
    }

    // == Claim ==
    /// Claims the flight for `key`, or joins the one already open.
    ///
    /// Exactly one concurrent caller per key receives [`Claim::Owner`]; the
    /// shard lock inside the map makes the occupancy check and insert
    /// atomic.
    pub fn claim(&self, key: &K) -> Claim<'_, K> {
        match self.flights.entry(key.clone()) {
            Entry::Occupied(occupied) => Claim::Joined(Arc::clone(occupied.get())),
            Entry::Vacant(vacant) => {
                let flight = Arc::new(Flight::new());
                vacant.insert(Arc::clone(&flight));
                Claim::Owner(FlightGuard {
                    table: self,
                    key: key.clone(),
                    flight,
                    resolved: false,
                })
            }
        }
    }

    // == Length ==
    /// Number of loads currently in flight.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

// == Flight Guard ==
/// Owner's handle on a claimed flight.
///
/// The flight must resolve on every exit path, so the guard fails the
/// flight from `Drop` unless [`complete`](Self::complete) or
/// [`fail`](Self::fail) ran first; a loader panic therefore releases
/// waiters instead of stranding them.
pub struct FlightGuard<'a, K>
where
    K: Eq + Hash + Clone,
{
    table: &'a FlightTable<K>,
    key: K,
    flight: Arc<Flight>,
    resolved: bool,
}

impl<K> FlightGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    // == Complete ==
    /// Resolves the flight as successful: a fresh entry is observable.
    pub fn complete(mut self) {
        self.retire(FlightState::Complete);
    }

    // == Fail ==
    /// Resolves the flight as failed: nothing was published and the key is
    /// open for the next claimer.
    pub fn fail(mut self) {
        self.retire(FlightState::Failed);
    }

    /// Removes the flight from the table, then wakes waiters with the
    /// outcome. A claim landing between those two steps opens a fresh
    /// flight, which is the correct behavior for a resolved key.
    fn retire(&mut self, outcome: FlightState) {
        if self.resolved {
            return;
        }
        self.resolved = true;
        self.table.flights.remove(&self.key);
        self.flight.resolve(outcome);
    }
}

impl<K> Drop for FlightGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        self.retire(FlightState::Failed);
    }
}
