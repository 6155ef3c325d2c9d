// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Runtime access for background fetches.
//!
//! Fetches are spawned as detached Tokio tasks so that they always run to completion, no
//! matter whether the caller that started them is still waiting.

use std::time::Instant;

use tick::Clock;

#[derive(Debug, Clone)]
pub(crate) struct Runtime {
    clock: Clock,
}

impl Runtime {
    #[must_use]
    pub(crate) fn new_tokio(clock: Clock) -> Self {
        Self { clock }
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }

    pub(crate) fn now(&self) -> Instant {
        self.clock.instant()
    }

    /// Spawns `work` as a detached task.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    #[expect(clippy::unused_self, reason = "spawning stays tied to the runtime handle")]
    pub(crate) fn spawn<T>(&self, work: T)
    where
        T: Future<Output = ()> + Send + 'static,
    {
        // The join handle is dropped on purpose: the task is detached, not cancelled.
        drop(tokio::spawn(work));
    }
}
