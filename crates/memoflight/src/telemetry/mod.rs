// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Telemetry for memoized calls.
//!
//! Activities are emitted as structured `tracing` events when logs are enabled, and as
//! OpenTelemetry metrics when the `metrics` feature is enabled and a meter provider is
//! configured.

use std::{sync::Arc, time::Duration};

#[cfg(any(feature = "metrics", test))]
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Gauge, Histogram, MeterProvider},
};

pub(crate) mod attributes;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

/// Telemetry sink for a memoized function.
///
/// Construct it, enable logs and/or metrics, and pass it to
/// [`MemoizedBuilder::telemetry`](crate::MemoizedBuilder::telemetry).
///
/// # Examples
///
/// ```
/// use memoflight::{MemoTelemetry, Memoized};
/// use tick::Clock;
///
/// let telemetry = MemoTelemetry::new().with_logs();
///
/// let memo = Memoized::builder(Clock::new_frozen())
///     .fetch(|(): ()| async { Ok::<_, std::io::Error>(1) })
///     .telemetry(telemetry, "answers")
///     .build();
///
/// assert_eq!(memo.name(), "answers");
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoTelemetry {
    inner: Arc<TelemetryInner>,
}

#[derive(Clone, Debug, Default)]
struct TelemetryInner {
    logs_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    event_counter: Option<Counter<u64>>,
    #[cfg(any(feature = "metrics", test))]
    fetch_duration: Option<Histogram<f64>>,
    #[cfg(any(feature = "metrics", test))]
    entry_count: Option<Gauge<u64>>,
}

impl MemoTelemetry {
    /// Creates a telemetry sink with logs and metrics disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables one structured `tracing` event per memoization activity.
    #[must_use]
    pub fn with_logs(mut self) -> Self {
        Arc::make_mut(&mut self.inner).logs_enabled = true;
        self
    }

    /// Enables OpenTelemetry metrics recorded through the given provider.
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn with_metrics(mut self, provider: &dyn MeterProvider) -> Self {
        let meter = metrics::create_meter(provider);
        let inner = Arc::make_mut(&mut self.inner);
        inner.event_counter = Some(metrics::create_event_counter(&meter));
        inner.fetch_duration = Some(metrics::create_fetch_duration_histogram(&meter));
        inner.entry_count = Some(metrics::create_entry_count_gauge(&meter));
        self
    }

    /// Records one activity of the memoized function `name`.
    pub(crate) fn record(&self, name: &'static str, operation: MemoOperation, activity: MemoActivity, duration: Option<Duration>) {
        #[cfg(any(feature = "metrics", test))]
        {
            let attrs = [
                KeyValue::new(attributes::MEMO_NAME, name),
                KeyValue::new(attributes::MEMO_OPERATION, operation.as_str()),
                KeyValue::new(attributes::MEMO_ACTIVITY, activity.as_str()),
            ];

            if let Some(counter) = &self.inner.event_counter {
                counter.add(1, &attrs);
            }

            if let (Some(d), Some(histogram)) = (duration, &self.inner.fetch_duration) {
                histogram.record(d.as_secs_f64(), &attrs);
            }
        }

        if self.inner.logs_enabled {
            Self::emit(name, operation, activity, duration);
        }
    }

    /// Records the number of entries held by the memoized function `name`.
    #[cfg_attr(
        not(any(feature = "metrics", test)),
        expect(unused_variables, clippy::unused_self, reason = "no-op without metrics")
    )]
    pub(crate) fn record_entries(&self, name: &'static str, entries: u64) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(gauge) = &self.inner.entry_count {
            gauge.record(entries, &[KeyValue::new(attributes::MEMO_NAME, name)]);
        }
    }

    fn emit(name: &'static str, operation: MemoOperation, activity: MemoActivity, duration: Option<Duration>) {
        let op = operation.as_str();
        let act = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());

        // Tracing levels must be constants, hence one macro arm per level.
        // Field names must match the constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    memo.name = name,
                    memo.operation = op,
                    memo.activity = act,
                    memo.duration_ns = ?duration_ns,
                    "memo.event"
                )
            };
        }

        match activity.severity() {
            Severity::Debug => emit_event!(debug),
            Severity::Info => emit_event!(info),
            Severity::Warn => emit_event!(warn),
            Severity::Error => emit_event!(error),
        }
    }
}

/// Extension for optional telemetry so call sites need not check for `None`.
pub(crate) trait MemoTelemetryExt {
    fn record(&self, name: &'static str, operation: MemoOperation, activity: MemoActivity, duration: Option<Duration>);

    fn record_entries(&self, name: &'static str, entries: u64);
}

impl MemoTelemetryExt for Option<MemoTelemetry> {
    fn record(&self, name: &'static str, operation: MemoOperation, activity: MemoActivity, duration: Option<Duration>) {
        if let Some(t) = self {
            t.record(name, operation, activity, duration);
        }
    }

    fn record_entries(&self, name: &'static str, entries: u64) {
        if let Some(t) = self {
            t.record_entries(name, entries);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemoOperation {
    Call,
    Fetch,
}

impl MemoOperation {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Call => "memo.call",
            Self::Fetch => "memo.fetch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemoActivity {
    /// Served from a value within its max age.
    Fresh,
    /// Joined a perform cycle that was already running.
    Joined,
    /// Started a new perform cycle.
    CycleStarted,
    /// Started a new fetch.
    FetchStarted,
    /// Returned the current value without waiting for the running fetch.
    StaleServed,
    FetchOk,
    FetchError,
    /// Resolved with no value to hand out.
    Unavailable,
    /// The error handler panicked.
    HandlerPanicked,
}

impl MemoActivity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "memo.fresh",
            Self::Joined => "memo.joined",
            Self::CycleStarted => "memo.cycle_started",
            Self::FetchStarted => "memo.fetch_started",
            Self::StaleServed => "memo.stale_served",
            Self::FetchOk => "memo.fetch_ok",
            Self::FetchError => "memo.fetch_error",
            Self::Unavailable => "memo.unavailable",
            Self::HandlerPanicked => "memo.handler_panicked",
        }
    }

    fn severity(self) -> Severity {
        match self {
            Self::Fresh | Self::Joined => Severity::Debug,
            Self::CycleStarted | Self::FetchStarted | Self::StaleServed | Self::FetchOk => Severity::Info,
            Self::Unavailable => Severity::Warn,
            Self::FetchError | Self::HandlerPanicked => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}
