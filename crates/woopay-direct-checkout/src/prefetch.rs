//! Prefetch Cache
//!
//! Single-slot cache for a value fetched ahead of time. Starting a prefetch
//! spawns the fetch immediately; a later read either awaits that in-flight
//! fetch or, when nothing was prefetched, runs its own.

use std::future::Future;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::AbortHandle;

use crate::error::{CheckoutError, Result};
use crate::lock;

/// Observable state of the slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefetchStatus {
    Empty,
    Pending,
    Invalidated,
}

enum Slot<T: Clone> {
    Empty,
    Pending {
        result: Shared<BoxFuture<'static, Result<T>>>,
        abort: AbortHandle,
    },
    Invalidated,
}

/// Single-slot prefetch cache
pub struct PrefetchCache<T: Clone> {
    slot: Mutex<Slot<T>>,
}

impl<T: Clone> Default for PrefetchCache<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
        }
    }
}

impl<T> PrefetchCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> PrefetchStatus {
        match &*lock(&self.slot) {
            Slot::Empty => PrefetchStatus::Empty,
            Slot::Pending { .. } => PrefetchStatus::Pending,
            Slot::Invalidated => PrefetchStatus::Invalidated,
        }
    }

    pub fn is_prefetched(&self) -> bool {
        self.status() == PrefetchStatus::Pending
    }

    /// Spawn `fetch` now and keep its result for the next read
    ///
    /// Returns `false` without spawning when a prefetch is already in flight.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, fetch: BoxFuture<'static, Result<T>>) -> bool {
        let mut slot = lock(&self.slot);
        if matches!(*slot, Slot::Pending { .. }) {
            return false;
        }

        let handle = tokio::spawn(fetch);
        let abort = handle.abort_handle();
        let result = async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => Err(CheckoutError::Prefetch(err.to_string())),
            }
        }
        .boxed()
        .shared();

        *slot = Slot::Pending { result, abort };
        true
    }

    /// Drop any prefetched value, cancelling a fetch still in flight
    pub fn invalidate(&self) {
        let previous = std::mem::replace(&mut *lock(&self.slot), Slot::Invalidated);
        if let Slot::Pending { abort, .. } = previous {
            abort.abort();
        }
    }

    /// Consume the prefetched value, or run `fetch` when there is none
    pub async fn read_or_fetch<F>(&self, fetch: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let prefetched = {
            let mut slot = lock(&self.slot);
            match std::mem::replace(&mut *slot, Slot::Empty) {
                Slot::Pending { result, .. } => Some(result),
                other => {
                    *slot = other;
                    None
                }
            }
        };

        match prefetched {
            Some(result) => result.await,
            None => fetch.await,
        }
    }
}
