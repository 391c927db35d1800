//! Per-key de-duplication of in-flight work.
//!
//! [`SingleFlight`] guarantees that at most one unit of work per key is
//! running at a time. The first caller for a key (the leader) spawns the
//! work onto the runtime; callers arriving while it runs (followers) attach
//! to the same shared handle and receive a clone of its outcome.
//!
//! The work runs as its own task, so it keeps going if every caller waiting
//! on it is dropped. Its key is released only when the task finishes, after
//! the work future has completed its side effects (such as populating a
//! cache).

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};

type Call<T> = Shared<BoxFuture<'static, Option<T>>>;

/// How a caller's outcome was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum Flight<T> {
    /// This caller started the work. `None` if the task panicked.
    Leader(Option<T>),
    /// Another caller's work was already running and its outcome is shared.
    /// `None` if that task panicked.
    Follower(Option<T>),
    /// The re-check found a settled value; no work was started.
    Settled(T),
}

impl<T> Flight<T> {
    /// The outcome, if one was produced.
    pub fn into_inner(self) -> Option<T> {
        match self {
            Flight::Leader(v) | Flight::Follower(v) => v,
            Flight::Settled(v) => Some(v),
        }
    }
}

/// Registry of in-flight calls keyed on `K`.
pub struct SingleFlight<K, T> {
    calls: Mutex<HashMap<K, Call<T>>>,
}

impl<K, T> Default for SingleFlight<K, T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn calls(&self) -> MutexGuard<'_, HashMap<K, Call<T>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of keys with work currently running.
    pub fn in_flight(&self) -> usize {
        self.calls().len()
    }

    /// Run `work` for `key` unless an identical call is already running.
    ///
    /// `recheck` runs under the registry lock when no call is in flight. If
    /// it returns a value, that value is returned and `work` is dropped
    /// unstarted. This closes the gap between a caller's own cache miss and
    /// a previous leader publishing its result and releasing the key.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn run<R, F>(self: &Arc<Self>, key: K, recheck: R, work: F) -> Flight<T>
    where
        R: FnOnce() -> Option<T>,
        F: Future<Output = T> + Send + 'static,
    {
        let (call, leader) = {
            let mut calls = self.calls();
            if let Some(call) = calls.get(&key) {
                (call.clone(), false)
            } else {
                if let Some(settled) = recheck() {
                    return Flight::Settled(settled);
                }
                let release = Release {
                    flights: Arc::clone(self),
                    key: key.clone(),
                };
                // The task cannot release the key before it is registered:
                // releasing takes the lock held here.
                let handle = tokio::spawn(async move {
                    let _release = release;
                    work.await
                });
                let call = async move { handle.await.ok() }.boxed().shared();
                calls.insert(key, call.clone());
                (call, true)
            }
        };

        let outcome = call.await;
        if leader {
            Flight::Leader(outcome)
        } else {
            Flight::Follower(outcome)
        }
    }
}

/// Removes the key when the work task ends, including by panic.
struct Release<K, T>
where
    K: Hash + Eq,
{
    flights: Arc<SingleFlight<K, T>>,
    key: K,
}

impl<K, T> Drop for Release<K, T>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        self.flights
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
