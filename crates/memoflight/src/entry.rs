// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The per-key cache entry and its perform cycle.
//!
//! An entry owns the last fetched value for one argument set, the instant its last fetch
//! settled, and two in-flight handles:
//!
//! - the *fetch*: the running invocation of the fetch function. It is spawned as a
//!   background task and always runs to completion.
//! - the *cycle*: the result that callers are currently waiting for. Callers that arrive
//!   while a cycle is in flight join it and observe exactly its outcome.
//!
//! A cycle that does not have to wait for its fetch resolves on the spot and is never
//! recorded, so only waiting cycles ever occupy the cycle slot. The slot is cleared when the
//! fetch settles, not when a caller observes the cycle.

use std::{
    fmt,
    panic::AssertUnwindSafe,
    sync::{Arc, Weak},
    time::Instant,
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use parking_lot::Mutex;

use crate::{
    Error, MaxAge, MemoTelemetry, WaitPolicy,
    error::panic_message,
    fn_wrapper::{FetchFn, OnError},
    runtime::Runtime,
    telemetry::{MemoActivity, MemoOperation, MemoTelemetryExt},
};

type SharedFetch<E> = Shared<BoxFuture<'static, Result<(), Error<E>>>>;
type SharedCycle<V, E> = Shared<BoxFuture<'static, Result<V, Error<E>>>>;

/// Everything an entry needs to know to run a perform cycle.
///
/// Shared by all entries of one memoized function.
#[derive(Debug)]
pub(crate) struct Settings<A, V, E> {
    pub(crate) name: &'static str,
    pub(crate) fetch: FetchFn<A, V, E>,
    pub(crate) on_error: Option<OnError<E>>,
    pub(crate) max_age: MaxAge,
    pub(crate) wait_policy: WaitPolicy,
    pub(crate) runtime: Runtime,
    pub(crate) telemetry: Option<MemoTelemetry>,
}

impl<A, V, E> Settings<A, V, E> {
    fn record(&self, operation: MemoOperation, activity: MemoActivity) {
        self.telemetry.record(self.name, operation, activity, None);
    }
}

/// The cache entry for one canonical key.
pub(crate) struct CacheEntry<V, E> {
    state: Mutex<EntryState<V, E>>,
}

struct EntryState<V, E> {
    /// `None` until a value has been fetched or a default was supplied.
    value: Option<V>,
    first_cycle: bool,
    /// When the most recent fetch settled. Never moves backwards.
    fetched_at: Option<Instant>,
    fetch: Option<SharedFetch<E>>,
    cycle: Option<SharedCycle<V, E>>,
    /// Failure of the most recent fetch under [`WaitPolicy::Wait`], replayed while it is fresh
    /// and no value exists.
    last_failure: Option<Error<E>>,
}

/// How a fetch attempt went wrong.
enum FetchFailure<E> {
    Failed(E),
    Panicked(Arc<str>),
}

impl<V, E> CacheEntry<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub(crate) fn new(default: Option<V>) -> Self {
        Self {
            state: Mutex::new(EntryState {
                value: default,
                first_cycle: true,
                fetched_at: None,
                fetch: None,
                cycle: None,
                last_failure: None,
            }),
        }
    }

    /// Returns the value currently held, without fetching.
    pub(crate) fn peek(&self) -> Option<V> {
        self.state.lock().value.clone()
    }

    /// Resolves the value of this entry for `args`, fetching if needed.
    ///
    /// `args` is only handed to the fetch function when this call starts a new fetch.
    pub(crate) async fn perform<A>(self: &Arc<Self>, settings: &Arc<Settings<A, V, E>>, args: A) -> Result<V, Error<E>>
    where
        A: Send + 'static,
    {
        let cycle = {
            let mut state = self.state.lock();

            if let Some(cycle) = &state.cycle {
                settings.record(MemoOperation::Call, MemoActivity::Joined);
                cycle.clone()
            } else if state.is_fresh(settings.max_age, settings.runtime.now()) {
                settings.record(MemoOperation::Call, MemoActivity::Fresh);
                return state.fresh_outcome();
            } else {
                settings.record(MemoOperation::Call, MemoActivity::CycleStarted);

                let fetch = match state.fetch.clone() {
                    Some(fetch) => fetch,
                    None => self.start_fetch(&mut state, settings, args),
                };

                let must_wait = (state.first_cycle && state.value.is_none()) || settings.wait_policy == WaitPolicy::Wait;
                state.first_cycle = false;

                if !must_wait {
                    return match &state.value {
                        Some(value) => {
                            settings.record(MemoOperation::Call, MemoActivity::StaleServed);
                            Ok(value.clone())
                        }
                        None => {
                            settings.record(MemoOperation::Call, MemoActivity::Unavailable);
                            Err(Error::Unavailable)
                        }
                    };
                }

                let cycle = Self::waiting_cycle(Arc::downgrade(self), Arc::clone(settings), fetch);
                state.cycle = Some(cycle.clone());
                cycle
            }
        };

        cycle.await
    }

    /// Builds a cycle that waits for `fetch`, then hands out whatever the entry holds.
    fn waiting_cycle<A>(entry: Weak<Self>, settings: Arc<Settings<A, V, E>>, fetch: SharedFetch<E>) -> SharedCycle<V, E>
    where
        A: Send + 'static,
    {
        async move {
            let outcome = fetch.await;

            outcome?;

            let entry = entry.upgrade().ok_or(Error::Unavailable)?;
            let value = entry.state.lock().value.clone();
            value.ok_or_else(|| {
                settings.record(MemoOperation::Call, MemoActivity::Unavailable);
                Error::Unavailable
            })
        }
        .boxed()
        .shared()
    }

    /// Starts a background fetch and records it as the in-flight fetch.
    fn start_fetch<A>(self: &Arc<Self>, state: &mut EntryState<V, E>, settings: &Arc<Settings<A, V, E>>, args: A) -> SharedFetch<E>
    where
        A: Send + 'static,
    {
        settings.record(MemoOperation::Fetch, MemoActivity::FetchStarted);

        let entry = Arc::downgrade(self);
        let task_settings = Arc::clone(settings);
        let fetch_fn = settings.fetch.clone();
        let started = settings.runtime.now();

        let fetch = async move {
            // The fetch function is invoked inside the task so that a panic while building the
            // future is caught like a panic while polling it.
            let outcome = AssertUnwindSafe(async move { fetch_fn.call(args).await })
                .catch_unwind()
                .await
                .map_err(|payload| FetchFailure::Panicked(panic_message(&*payload).into()))
                .and_then(|result| result.map_err(FetchFailure::Failed));

            match entry.upgrade() {
                Some(entry) => entry.settle(&task_settings, outcome, started),
                None => Ok(()),
            }
        }
        .boxed()
        .shared();

        settings.runtime.spawn(fetch.clone().map(drop));
        state.fetch = Some(fetch.clone());
        fetch
    }

    /// Applies the outcome of a fetch to the entry.
    fn settle<A>(&self, settings: &Settings<A, V, E>, outcome: Result<V, FetchFailure<E>>, started: Instant) -> Result<(), Error<E>> {
        let now = settings.runtime.now();
        let elapsed = now.saturating_duration_since(started);

        let mut state = self.state.lock();
        state.fetched_at = Some(state.fetched_at.map_or(now, |previous| previous.max(now)));
        state.fetch = None;
        // A recorded cycle always waits for this fetch, so it settles here even when all of
        // its callers are gone.
        state.cycle = None;

        let failure = match outcome {
            Ok(value) => {
                state.value = Some(value);
                state.last_failure = None;
                drop(state);
                settings
                    .telemetry
                    .record(settings.name, MemoOperation::Fetch, MemoActivity::FetchOk, Some(elapsed));
                return Ok(());
            }
            Err(failure) => failure,
        };

        settings
            .telemetry
            .record(settings.name, MemoOperation::Fetch, MemoActivity::FetchError, Some(elapsed));

        match settings.wait_policy {
            WaitPolicy::Wait => {
                let error = match failure {
                    FetchFailure::Failed(error) => Error::Fetch(Arc::new(error)),
                    FetchFailure::Panicked(message) => Error::Panicked(message),
                };
                state.last_failure = Some(error.clone());
                Err(error)
            }
            WaitPolicy::NoWait => {
                drop(state);
                report_failure(settings, failure);
                Ok(())
            }
        }
    }
}

impl<V, E> fmt::Debug for CacheEntry<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CacheEntry")
            .field("has_value", &state.value.is_some())
            .field("fetched_at", &state.fetched_at)
            .field("fetching", &state.fetch.is_some())
            .field("waiting", &state.cycle.is_some())
            .finish_non_exhaustive()
    }
}

impl<V: Clone, E> EntryState<V, E> {
    fn is_fresh(&self, max_age: MaxAge, now: Instant) -> bool {
        self.fetched_at
            .is_some_and(|fetched_at| max_age.is_fresh(now.saturating_duration_since(fetched_at)))
    }

    fn fresh_outcome(&self) -> Result<V, Error<E>> {
        match (&self.value, &self.last_failure) {
            (Some(value), _) => Ok(value.clone()),
            (None, Some(failure)) => Err(failure.clone()),
            (None, None) => Err(Error::Unavailable),
        }
    }
}

/// Routes a swallowed fetch failure to the error handler.
///
/// Neither the handler nor a panic raised by it reaches any caller.
fn report_failure<A, V, E>(settings: &Settings<A, V, E>, failure: FetchFailure<E>) {
    match failure {
        FetchFailure::Failed(error) => {
            let Some(on_error) = &settings.on_error else {
                return;
            };

            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| on_error.call(&error))) {
                tracing::error!(memo.name = settings.name, panic = panic_message(&*payload), "error handler panicked");
                settings
                    .telemetry
                    .record(settings.name, MemoOperation::Fetch, MemoActivity::HandlerPanicked, None);
            }
        }
        FetchFailure::Panicked(message) => {
            tracing::error!(memo.name = settings.name, panic = &*message, "background fetch panicked");
        }
    }
}
