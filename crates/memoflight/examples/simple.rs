// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Simple Memoization Example
//!
//! Wraps a slow lookup so that repeated calls with the same arguments are served from the
//! cache until the max age expires.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use memoflight::Memoized;
use tick::Clock;

#[tokio::main]
async fn main() -> Result<(), memoflight::Error<std::io::Error>> {
    let clock = Clock::new_tokio();
    let lookups = Arc::new(AtomicU32::new(0));

    let user_name = Memoized::builder(clock.clone())
        .fetch({
            let lookups = Arc::clone(&lookups);
            let clock = clock.clone();
            move |(id,): (u32,)| {
                lookups.fetch_add(1, Ordering::Relaxed);
                let clock = clock.clone();
                async move {
                    clock.delay(Duration::from_millis(100)).await;
                    Ok::<_, std::io::Error>(format!("user-{id}"))
                }
            }
        })
        .max_age(Duration::from_millis(500))
        .build();

    // The first call waits for the lookup, the second one is served from the cache.
    println!("{}", user_name.call((1,)).await?);
    println!("{}", user_name.call((1,)).await?);

    // Different arguments have their own entry.
    println!("{}", user_name.call((2,)).await?);

    // Once the max age has passed the value is looked up again.
    clock.delay(Duration::from_millis(600)).await;
    println!("{}", user_name.call((1,)).await?);

    println!("lookups: {}, entries: {}", lookups.load(Ordering::Relaxed), user_name.len());
    Ok(())
}
