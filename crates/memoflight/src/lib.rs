// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Memoizes async fetch operations per argument set.
//!
//! [`Memoized`] wraps an arbitrary, possibly slow and possibly failing, async fetch function
//! with a per-argument-set cache. Each distinct argument list maps to one cache entry that:
//!
//! - Coalesces concurrent callers into a single fetch cycle (at most one fetch is in flight
//!   per argument set)
//! - Serves the cached value without fetching while it is younger than the configured max age
//! - Either blocks callers until fresh data arrives ([`WaitPolicy::Wait`]) or hands out
//!   stale/default data immediately while refreshing in the background
//!   ([`WaitPolicy::NoWait`])
//!
//! Argument lists are addressed by a [`CanonicalKey`]: a deterministic encoding that ignores
//! field order inside nested mappings but preserves the order of positional arguments and
//! sequence elements.
//!
//! # Examples
//!
//! ## Block until fresh
//!
//! ```
//! use std::time::Duration;
//!
//! use memoflight::Memoized;
//! use tick::Clock;
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//!
//! let greet = Memoized::builder(Clock::new_frozen())
//!     .fetch(|(name,): (String,)| async move { Ok::<_, std::io::Error>(format!("hello {name}")) })
//!     .max_age(Duration::from_secs(60))
//!     .build();
//!
//! let value = greet.call(("world".to_string(),)).await?;
//! assert_eq!(value, "hello world");
//! # Ok::<(), memoflight::Error<std::io::Error>>(())
//! # }).unwrap();
//! ```
//!
//! ## Serve defaults while refreshing
//!
//! ```
//! use memoflight::Memoized;
//! use tick::Clock;
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//!
//! let flag = Memoized::builder(Clock::new_frozen())
//!     .fetch(|(): ()| async { Ok::<_, std::io::Error>(true) })
//!     .default_value(false)
//!     .no_wait()
//!     .build();
//!
//! // The first call returns the default without waiting for the fetch.
//! assert!(!flag.call(()).await?);
//! # Ok::<(), memoflight::Error<std::io::Error>>(())
//! # }).unwrap();
//! ```
//!
//! # Runtime
//!
//! Fetches run as Tokio tasks so that they always run to completion, even when the caller
//! that triggered them stops waiting. Calls must therefore be made from within a Tokio runtime.

pub mod builder;
mod entry;
mod error;
mod fn_wrapper;
pub mod key;
mod memoized;
pub mod policy;
mod runtime;
mod store;
mod telemetry;

#[doc(inline)]
pub use builder::{FetchBuilder, MemoizedBuilder};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use key::{ArgValue, CanonicalKey};
#[doc(inline)]
pub use memoized::Memoized;
#[doc(inline)]
pub use policy::{MaxAge, MemoizeOptions, WaitPolicy};
#[doc(inline)]
pub use telemetry::MemoTelemetry;
