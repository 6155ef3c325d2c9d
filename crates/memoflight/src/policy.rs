// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Freshness and refresh policies.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Governs whether a call blocks for a fresh fetch.
///
/// # Examples
///
/// ```
/// use memoflight::WaitPolicy;
///
/// let policy: WaitPolicy = serde_json::from_str(r#""no_wait""#)?;
/// assert_eq!(policy, WaitPolicy::NoWait);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Callers wait for the fetch. Fetch failures are returned to every waiting caller.
    #[default]
    Wait,
    /// Callers receive the current value (or the default) immediately while the fetch runs
    /// in the background. Fetch failures go to the error handler only.
    ///
    /// The very first call for an argument set still waits when there is no default value.
    NoWait,
}

/// How long a fetched value counts as fresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MaxAge {
    /// Values never go stale; each argument set is fetched once.
    #[default]
    Unbounded,
    /// Values go stale once this much time has passed since their fetch settled.
    Bounded(Duration),
}

impl MaxAge {
    /// Returns `true` if a fetch that settled `age` ago is still fresh.
    ///
    /// The boundary is inclusive: a value exactly `max_age` old is fresh.
    #[must_use]
    pub fn is_fresh(self, age: Duration) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Bounded(max_age) => age <= max_age,
        }
    }
}

impl From<Duration> for MaxAge {
    fn from(max_age: Duration) -> Self {
        Self::Bounded(max_age)
    }
}

impl From<Option<Duration>> for MaxAge {
    fn from(max_age: Option<Duration>) -> Self {
        max_age.map_or(Self::Unbounded, Self::Bounded)
    }
}

/// The data-only part of a memoization configuration.
///
/// Everything that is not code (the fetch function, default value and error handler) can be
/// loaded from configuration files through this type and applied with
/// [`MemoizedBuilder::options`](crate::MemoizedBuilder::options).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use memoflight::{MaxAge, MemoizeOptions, WaitPolicy};
///
/// let options: MemoizeOptions = serde_json::from_str(
///     r#"{ "max_age": { "secs": 30, "nanos": 0 }, "wait_policy": "no_wait" }"#,
/// )?;
///
/// assert_eq!(options.max_age(), MaxAge::Bounded(Duration::from_secs(30)));
/// assert_eq!(options.wait_policy, WaitPolicy::NoWait);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct MemoizeOptions {
    /// Freshness window. `None` means values never go stale.
    pub max_age: Option<Duration>,
    /// Refresh discipline.
    pub wait_policy: WaitPolicy,
}

impl MemoizeOptions {
    /// Creates options with an unbounded max age and [`WaitPolicy::Wait`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the freshness window.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Sets the refresh discipline.
    #[must_use]
    pub fn with_wait_policy(mut self, wait_policy: WaitPolicy) -> Self {
        self.wait_policy = wait_policy;
        self
    }

    /// Returns the freshness window as a [`MaxAge`].
    #[must_use]
    pub fn max_age(&self) -> MaxAge {
        self.max_age.into()
    }
}
