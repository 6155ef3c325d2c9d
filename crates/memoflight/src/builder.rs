// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder types for constructing memoized functions.
//!
//! Construction happens in two stages. [`Memoized::builder`](crate::Memoized::builder) returns a
//! [`FetchBuilder`] whose only job is to receive the fetch function; supplying it fixes the
//! argument, value and error types and yields a [`MemoizedBuilder`] on which everything else is
//! configured. A memoized function without a fetch function cannot be built.

use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tick::Clock;

use crate::{
    MaxAge, MemoTelemetry, MemoizeOptions, Memoized, WaitPolicy,
    entry::Settings,
    fn_wrapper::{FetchFn, OnError},
    runtime::Runtime,
};

const DEFAULT_NAME: &str = "memoized";

/// The first builder stage, waiting for a fetch function.
///
/// Created by [`Memoized::builder`](crate::Memoized::builder).
#[derive(Debug)]
pub struct FetchBuilder {
    clock: Clock,
}

impl FetchBuilder {
    pub(crate) fn new(clock: Clock) -> Self {
        Self { clock }
    }

    /// Sets the source operation that produces values.
    ///
    /// The function receives the exact argument list passed to
    /// [`Memoized::call`](crate::Memoized::call). It is invoked at most once at a time per
    /// distinct argument list.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoflight::Memoized;
    /// use tick::Clock;
    ///
    /// let lengths = Memoized::builder(Clock::new_frozen())
    ///     .fetch(|(text,): (String,)| async move { Ok::<_, std::io::Error>(text.len()) })
    ///     .build();
    /// # let _ = lengths;
    /// ```
    pub fn fetch<A, V, E, F, Fut>(self, fetch: F) -> MemoizedBuilder<A, V, E>
    where
        A: Serialize + Send + 'static,
        V: Clone + Send + Sync + 'static,
        E: Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        MemoizedBuilder {
            name: None,
            clock: self.clock,
            fetch: FetchFn::new(move |args| fetch(args).boxed()),
            default: None,
            max_age: MaxAge::Unbounded,
            wait_policy: WaitPolicy::Wait,
            on_error: None,
            telemetry: None,
        }
    }

    /// Returns a reference to the builder's clock.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}

/// Builder for a memoized function with a known fetch function.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use memoflight::Memoized;
/// use tick::Clock;
///
/// let prices = Memoized::builder(Clock::new_frozen())
///     .fetch(|(symbol,): (String,)| async move { Ok::<_, std::io::Error>(symbol.len() as f64) })
///     .default_value(0.0)
///     .max_age(Duration::from_secs(30))
///     .no_wait()
///     .on_error(|error| eprintln!("price refresh failed: {error}"))
///     .build();
/// # let _ = prices;
/// ```
#[derive(Debug)]
pub struct MemoizedBuilder<A, V, E> {
    name: Option<&'static str>,
    clock: Clock,
    fetch: FetchFn<A, V, E>,
    default: Option<V>,
    max_age: MaxAge,
    wait_policy: WaitPolicy,
    on_error: Option<OnError<E>>,
    telemetry: Option<MemoTelemetry>,
}

impl<A, V, E> MemoizedBuilder<A, V, E>
where
    A: Serialize + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Seeds every new entry with `value` before its first fetch completes.
    ///
    /// With a default, the first call under [`WaitPolicy::NoWait`] returns immediately.
    #[must_use]
    pub fn default_value(mut self, value: V) -> Self {
        self.default = Some(value);
        self
    }

    /// Sets how long a fetched value is served without fetching again.
    ///
    /// The window starts when a fetch settles, whether it succeeded or failed. By default
    /// values never go stale.
    #[must_use]
    pub fn max_age(mut self, max_age: impl Into<MaxAge>) -> Self {
        self.max_age = max_age.into();
        self
    }

    /// Sets whether calls block for a fresh fetch.
    #[must_use]
    pub fn wait_policy(mut self, wait_policy: WaitPolicy) -> Self {
        self.wait_policy = wait_policy;
        self
    }

    /// Shorthand for `wait_policy(WaitPolicy::NoWait)`.
    #[must_use]
    pub fn no_wait(self) -> Self {
        self.wait_policy(WaitPolicy::NoWait)
    }

    /// Sets the sink for fetch failures under [`WaitPolicy::NoWait`].
    ///
    /// The handler runs once per failed fetch. It is never invoked under
    /// [`WaitPolicy::Wait`], where failures are returned to the callers instead. A panic raised by
    /// the handler is logged and otherwise ignored.
    #[must_use]
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.on_error = Some(OnError::new(on_error));
        self
    }

    /// Sets the telemetry and the name that identifies this function in telemetry output.
    #[must_use]
    pub fn telemetry(mut self, telemetry: MemoTelemetry, name: &'static str) -> Self {
        self.telemetry = Some(telemetry);
        self.name = Some(name);
        self
    }

    /// Applies loaded options, replacing both the max age and the wait policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoflight::{MemoizeOptions, Memoized, WaitPolicy};
    /// use tick::Clock;
    ///
    /// let options: MemoizeOptions = serde_json::from_str(r#"{ "wait_policy": "no_wait" }"#)?;
    ///
    /// let memo = Memoized::builder(Clock::new_frozen())
    ///     .fetch(|(): ()| async { Ok::<_, std::io::Error>(1) })
    ///     .options(options)
    ///     .build();
    ///
    /// assert_eq!(memo.wait_policy(), WaitPolicy::NoWait);
    /// # Ok::<(), serde_json::Error>(())
    /// ```
    #[must_use]
    pub fn options(self, options: MemoizeOptions) -> Self {
        self.max_age(options.max_age()).wait_policy(options.wait_policy)
    }

    /// Returns a reference to the builder's clock.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Builds the memoized function.
    #[must_use]
    pub fn build(self) -> Memoized<A, V, E> {
        let settings = Settings {
            name: self.name.unwrap_or(DEFAULT_NAME),
            fetch: self.fetch,
            on_error: self.on_error,
            max_age: self.max_age,
            wait_policy: self.wait_policy,
            runtime: Runtime::new_tokio(self.clock),
            telemetry: self.telemetry,
        };

        Memoized::new(Arc::new(settings), self.default)
    }
}
