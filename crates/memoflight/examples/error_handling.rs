// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error handling under both wait policies.
//!
//! With `WaitPolicy::Wait` every waiting caller receives the fetch error. With
//! `WaitPolicy::NoWait` callers keep receiving the previous value and failures go to the error
//! handler instead.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use memoflight::{Error, Memoized};
use tick::Clock;

#[derive(Debug, thiserror::Error)]
#[error("quote service is down")]
struct ServiceDown;

#[tokio::main]
async fn main() {
    let clock = Clock::new_tokio();
    let healthy = Arc::new(AtomicBool::new(false));

    let fetch_quote = {
        let healthy = Arc::clone(&healthy);
        move |(symbol,): (String,)| {
            let healthy = healthy.load(Ordering::Relaxed);
            async move {
                if healthy {
                    Ok(format!("{symbol}: 42.00"))
                } else {
                    Err(ServiceDown)
                }
            }
        }
    };

    let waiting = Memoized::builder(clock.clone())
        .fetch(fetch_quote.clone())
        .max_age(Duration::from_millis(100))
        .build();

    match waiting.call(("MSFT".to_string(),)).await {
        Ok(quote) => println!("wait: {quote}"),
        Err(Error::Fetch(error)) => println!("wait: fetch failed: {error}"),
        Err(error) => println!("wait: {error}"),
    }

    let background = Memoized::builder(clock.clone())
        .fetch(fetch_quote)
        .default_value("MSFT: n/a".to_string())
        .max_age(Duration::from_millis(100))
        .no_wait()
        .on_error(|error| eprintln!("no_wait: refresh failed: {error}"))
        .build();

    match background.call(("MSFT".to_string(),)).await {
        Ok(quote) => println!("no_wait: {quote}"),
        Err(error) => println!("no_wait: {error}"),
    }

    // Once the service recovers and the window expires, the next refresh succeeds.
    healthy.store(true, Ordering::Relaxed);
    clock.delay(Duration::from_millis(150)).await;

    if let Ok(quote) = background.call(("MSFT".to_string(),)).await {
        println!("no_wait: {quote} (stale, refreshing)");
    }
    clock.delay(Duration::from_millis(10)).await;
    if let Ok(quote) = background.call(("MSFT".to_string(),)).await {
        println!("no_wait: {quote}");
    }
}
