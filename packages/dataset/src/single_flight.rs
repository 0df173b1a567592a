//! Load-once cell with single-flight initialization.
//!
//! The first caller starts the load; callers that arrive while it is in
//! flight await the same shared future and observe the same value or the
//! same error. A successful value is published once and read without
//! locking afterwards. A failure is handed to every waiter and then
//! forgotten, so the next caller starts a fresh load.

use std::{
    future::Future,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use futures::{
    FutureExt as _, TryFutureExt as _,
    future::{BoxFuture, Shared},
};

type SharedLoad<V, E> = Shared<BoxFuture<'static, Result<Arc<V>, E>>>;

/// A value that is loaded at most once at a time and kept after the first
/// success.
pub struct SingleFlight<V, E> {
    ready: OnceLock<Arc<V>>,
    in_flight: Mutex<Option<SharedLoad<V, E>>>,
}

impl<V, E> Default for SingleFlight<V, E> {
    fn default() -> Self {
        Self {
            ready: OnceLock::new(),
            in_flight: Mutex::new(None),
        }
    }
}

impl<V, E> std::fmt::Debug for SingleFlight<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("ready", &self.ready.get().is_some())
            .finish_non_exhaustive()
    }
}

impl<V, E> SingleFlight<V, E>
where
    V: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the loaded value, if a load has succeeded.
    #[must_use]
    pub fn get(&self) -> Option<Arc<V>> {
        self.ready.get().cloned()
    }

    /// Returns the loaded value, running `load` if nothing is loaded and no
    /// load is in flight.
    ///
    /// `load` is only called by the caller that starts a load.
    ///
    /// # Errors
    ///
    /// Returns the error of the load this call observed.
    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(value) = self.ready.get() {
            return Ok(Arc::clone(value));
        }

        let shared = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = self.ready.get() {
                return Ok(Arc::clone(value));
            }
            if let Some(pending) = in_flight.as_ref() {
                pending.clone()
            } else {
                let pending = load().map_ok(Arc::new).boxed().shared();
                *in_flight = Some(pending.clone());
                pending
            }
        };

        let result = shared.clone().await;

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.as_ref().is_some_and(|pending| pending.ptr_eq(&shared)) {
            if let Ok(value) = &result {
                // Only the settling caller publishes, so this cannot race.
                let _ = self.ready.set(Arc::clone(value));
            }
            *in_flight = None;
        }
        drop(in_flight);

        result
    }
}
