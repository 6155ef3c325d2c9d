// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Keep in sync with the field names of the `tracing` events in mod.rs.

#[cfg(any(feature = "metrics", test))]
pub(crate) const MEMO_NAME: &str = "memo.name";

#[cfg(any(feature = "metrics", test))]
pub(crate) const MEMO_OPERATION: &str = "memo.operation";

#[cfg(any(feature = "metrics", test))]
pub(crate) const MEMO_ACTIVITY: &str = "memo.activity";

#[cfg(test)]
pub(crate) const MEMO_DURATION: &str = "memo.duration_ns";

#[cfg(test)]
pub(crate) const MEMO_EVENT: &str = "memo.event";
