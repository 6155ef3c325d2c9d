// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Stale-while-refresh: return the default or the previous value immediately and refresh in
//! the background. Callers never wait for the source once a value is available.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use memoflight::{MemoTelemetry, Memoized};
use tick::Clock;

#[tokio::main]
async fn main() -> Result<(), memoflight::Error<std::io::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let clock = Clock::new_tokio();
    let version = Arc::new(AtomicU32::new(0));

    let feature_flag = Memoized::builder(clock.clone())
        .fetch({
            let version = Arc::clone(&version);
            let clock = clock.clone();
            move |(flag,): (String,)| {
                let v = version.fetch_add(1, Ordering::Relaxed) + 1;
                let clock = clock.clone();
                async move {
                    clock.delay(Duration::from_millis(200)).await;
                    Ok::<_, std::io::Error>(format!("{flag}=v{v}"))
                }
            }
        })
        .default_value("unknown".to_string())
        .max_age(Duration::from_millis(300))
        .no_wait()
        .telemetry(MemoTelemetry::new().with_logs(), "feature_flags")
        .build();

    let flag = || ("dark_mode".to_string(),);

    // Returns the default right away while the first fetch runs.
    println!("first call:  {}", feature_flag.call(flag()).await?);

    clock.delay(Duration::from_millis(250)).await;
    println!("after fetch: {}", feature_flag.call(flag()).await?);

    // The value went stale: it is still returned immediately, and a refresh starts.
    clock.delay(Duration::from_millis(400)).await;
    println!("stale:       {}", feature_flag.call(flag()).await?);

    clock.delay(Duration::from_millis(250)).await;
    println!("refreshed:   {}", feature_flag.call(flag()).await?);

    Ok(())
}
