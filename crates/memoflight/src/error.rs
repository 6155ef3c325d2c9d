// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for memoized calls.

use std::{any::Any, sync::Arc};

use thiserror::Error;

/// An error returned by a memoized call.
///
/// `E` is the error type of the wrapped fetch function. Fetch errors are shared between all
/// callers coalesced into the same fetch cycle, so they are held behind an [`Arc`]: every
/// caller receives the very same error instance.
///
/// # Thread safety
///
/// This type is thread-safe when `E` is.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error<E> {
    /// The call's arguments could not be turned into a canonical cache key.
    ///
    /// Raised before any cache entry is touched. Never cached and never retried.
    #[error("arguments cannot be encoded as a cache key: {0}")]
    Serialization(Arc<serde_json::Error>),

    /// The fetch function failed while the call was waiting for it.
    #[error("fetch failed: {0}")]
    Fetch(#[source] Arc<E>),

    /// The fetch function panicked.
    #[error("fetch panicked: {0}")]
    Panicked(Arc<str>),

    /// No value has been produced yet and there is no default to fall back on.
    ///
    /// Returned under [`WaitPolicy::NoWait`](crate::WaitPolicy::NoWait) when the fetch that
    /// would have produced the first value failed; the failure itself was routed to the
    /// configured error handler.
    #[error("no value is available yet")]
    Unavailable,
}

impl<E> Error<E> {
    /// Returns `true` if the arguments could not be encoded into a cache key.
    #[must_use]
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }

    /// Returns the fetch error, if this error was produced by the fetch function.
    #[must_use]
    pub fn fetch_error(&self) -> Option<&Arc<E>> {
        match self {
            Self::Fetch(error) => Some(error),
            _ => None,
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

impl<E> Clone for Error<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Serialization(error) => Self::Serialization(Arc::clone(error)),
            Self::Fetch(error) => Self::Fetch(Arc::clone(error)),
            Self::Panicked(message) => Self::Panicked(Arc::clone(message)),
            Self::Unavailable => Self::Unavailable,
        }
    }
}

impl<E> From<serde_json::Error> for Error<E> {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(error))
    }
}

/// A specialized [`Result`](std::result::Result) type for memoized calls.
pub type Result<T, E> = std::result::Result<T, Error<E>>;
