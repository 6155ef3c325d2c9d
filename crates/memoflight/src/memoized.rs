// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The memoized function type.

use std::{fmt, sync::Arc};

use serde::Serialize;
use tick::Clock;

use crate::{
    Error, MaxAge, WaitPolicy,
    builder::FetchBuilder,
    entry::Settings,
    key::encode,
    store::EntryStore,
    telemetry::MemoTelemetryExt,
};

/// An async function wrapped with a per-argument-set cache.
///
/// Every distinct argument list (after canonicalization, see [`crate::key`]) owns one cache
/// entry. Calls for the same argument list are coalesced: at most one fetch is in flight per
/// entry, and callers that arrive while a caller is already waiting for that fetch receive the
/// very same outcome.
///
/// Cloning is cheap and all clones share the same entries.
///
/// # Examples
///
/// ```
/// use std::{
///     sync::{
///         Arc,
///         atomic::{AtomicUsize, Ordering},
///     },
///     time::Duration,
/// };
///
/// use memoflight::Memoized;
/// use tick::Clock;
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
///
/// let fetches = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&fetches);
///
/// let square = Memoized::builder(Clock::new_frozen())
///     .fetch(move |(n,): (u64,)| {
///         counter.fetch_add(1, Ordering::SeqCst);
///         async move { Ok::<_, std::io::Error>(n * n) }
///     })
///     .max_age(Duration::from_secs(60))
///     .build();
///
/// assert_eq!(square.call((4,)).await?, 16);
/// assert_eq!(square.call((4,)).await?, 16);
/// assert_eq!(fetches.load(Ordering::SeqCst), 1);
/// # Ok::<(), memoflight::Error<std::io::Error>>(())
/// # }).unwrap();
/// ```
pub struct Memoized<A, V, E> {
    inner: Arc<Inner<A, V, E>>,
}

struct Inner<A, V, E> {
    settings: Arc<Settings<A, V, E>>,
    store: EntryStore<V, E>,
    default: Option<V>,
}

impl Memoized<(), (), ()> {
    /// Creates a builder for a memoized function.
    ///
    /// The `clock` is used to judge whether fetched values are still fresh.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoflight::Memoized;
    /// use tick::Clock;
    ///
    /// let memo = Memoized::builder(Clock::new_frozen())
    ///     .fetch(|(a, b): (i32, i32)| async move { Ok::<_, std::io::Error>(a + b) })
    ///     .build();
    /// # let _ = memo;
    /// ```
    #[must_use]
    pub fn builder(clock: Clock) -> FetchBuilder {
        FetchBuilder::new(clock)
    }
}

impl<A, V, E> Memoized<A, V, E>
where
    A: Serialize + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub(crate) fn new(settings: Arc<Settings<A, V, E>>, default: Option<V>) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                store: EntryStore::new(),
                default,
            }),
        }
    }

    /// Returns the value for `args`, fetching it if needed.
    ///
    /// - If a call for the same arguments is already waiting for a fetch, this call joins it and
    ///   receives the same value or the same error.
    /// - If the last fetch for these arguments settled within the max age, the held value is
    ///   returned without fetching.
    /// - Otherwise a fetch is started (unless one is already running) and the wait policy decides
    ///   whether this call waits for it.
    ///
    /// # Errors
    ///
    /// - [`Error::Serialization`] if `args` cannot be encoded into a cache key. No entry is
    ///   touched.
    /// - [`Error::Fetch`] or [`Error::Panicked`] if this call waited for a fetch that failed.
    /// - [`Error::Unavailable`] if no value exists yet and the fetch that would have produced one
    ///   failed under [`WaitPolicy::NoWait`].
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime, since fetches are spawned as Tokio tasks.
    pub async fn call(&self, args: A) -> Result<V, Error<E>> {
        let key = encode(&args)?;
        let entry = self.inner.store.get_or_create(key, self.inner.default.as_ref());
        self.record_entries();

        entry.perform(&self.inner.settings, args).await
    }

    /// Returns the value currently held for `args` without fetching.
    ///
    /// For arguments that were never called, this is the default value, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if `args` cannot be encoded into a cache key.
    pub fn peek(&self, args: &A) -> Result<Option<V>, Error<E>> {
        let key = encode(args)?;

        Ok(self
            .inner
            .store
            .get(&key)
            .map_or_else(|| self.inner.default.clone(), |entry| entry.peek()))
    }

    /// Returns the number of argument lists that have a cache entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// Returns `true` if no call has been made yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record_entries(&self) {
        let settings = &self.inner.settings;
        if settings.telemetry.is_some() {
            let entries = u64::try_from(self.len()).unwrap_or(u64::MAX);
            settings.telemetry.record_entries(settings.name, entries);
        }
    }
}

impl<A, V, E> Memoized<A, V, E> {
    /// Returns the name used in telemetry output.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.settings.name
    }

    /// Returns the clock used to judge freshness.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        self.inner.settings.runtime.clock()
    }

    /// Returns the configured max age.
    #[must_use]
    pub fn max_age(&self) -> MaxAge {
        self.inner.settings.max_age
    }

    /// Returns the configured wait policy.
    #[must_use]
    pub fn wait_policy(&self) -> WaitPolicy {
        self.inner.settings.wait_policy
    }
}

impl<A, V, E> Clone for Memoized<A, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, V, E> fmt::Debug for Memoized<A, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("name", &self.inner.settings.name)
            .field("max_age", &self.inner.settings.max_age)
            .field("wait_policy", &self.inner.settings.wait_policy)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use serde::Serializer;

    use super::*;
    use crate::{
        MemoTelemetry,
        telemetry::{attributes, testing::LogCapture},
    };

    fn echo() -> Memoized<(String,), String, std::io::Error> {
        Memoized::builder(Clock::new_frozen())
            .fetch(|(s,): (String,)| async move { Ok(s.to_uppercase()) })
            .build()
    }

    #[test]
    fn static_assertions() {
        static_assertions::assert_impl_all!(Memoized<(String,), String, std::io::Error>: Send, Sync, Clone, fmt::Debug);
    }

    #[tokio::test]
    async fn call_fetches_with_exact_args() {
        let memo = echo();

        assert_eq!(memo.call(("abc".to_string(),)).await.unwrap(), "ABC");
        assert_eq!(memo.len(), 1);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let memo = echo();
        let clone = memo.clone();

        memo.call(("a".to_string(),)).await.unwrap();

        assert_eq!(clone.len(), 1);
        assert_eq!(clone.peek(&("a".to_string(),)).unwrap(), Some("A".to_string()));
    }

    #[tokio::test]
    async fn serialization_failure_touches_nothing() {
        struct Handle;

        impl Serialize for Handle {
            fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("live handle"))
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let memo = Memoized::builder(Clock::new_frozen())
            .fetch(move |_: (Handle,)| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, std::io::Error>(1) }
            })
            .build();

        let error = memo.call((Handle,)).await.unwrap_err();

        assert!(error.is_serialization());
        assert!(memo.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(memo.peek(&(Handle,)).unwrap_err().is_serialization());
    }

    #[tokio::test]
    async fn reordered_mapping_args_share_an_entry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let memo = Memoized::builder(Clock::new_frozen())
            .fetch(move |(query,): (HashMap<String, u32>,)| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, std::io::Error>(query.values().sum::<u32>()) }
            })
            .build();

        let first: HashMap<String, u32> = [("a".to_string(), 1), ("b".to_string(), 2)].into();
        let second: HashMap<String, u32> = [("b".to_string(), 2), ("a".to_string(), 1)].into();

        assert_eq!(memo.call((first,)).await.unwrap(), 3);
        assert_eq!(memo.call((second,)).await.unwrap(), 3);
        assert_eq!(memo.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn peek_falls_back_to_default() {
        let memo = Memoized::builder(Clock::new_frozen())
            .fetch(|(): ()| async { Ok::<_, std::io::Error>(true) })
            .default_value(false)
            .build();

        assert_eq!(memo.peek(&()).unwrap(), Some(false));
        assert!(memo.is_empty());
    }

    #[tokio::test]
    async fn telemetry_logs_activities() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let memo = Memoized::builder(Clock::new_frozen())
            .fetch(|(): ()| async { Ok::<_, std::io::Error>(1) })
            .telemetry(MemoTelemetry::new().with_logs(), "answers")
            .build();

        memo.call(()).await.unwrap();
        memo.call(()).await.unwrap();

        capture.assert_contains(attributes::MEMO_EVENT);
        capture.assert_contains("answers");
        capture.assert_contains("memo.cycle_started");
        capture.assert_contains("memo.fetch_started");
        capture.assert_contains("memo.fetch_ok");
        capture.assert_contains("memo.fresh");
    }

    #[test]
    fn debug_output() {
        let debug = format!("{:?}", echo());

        assert!(debug.contains("Memoized"));
        assert!(debug.contains("memoized"));
        assert!(debug.contains("EntryStore"));
    }
}
