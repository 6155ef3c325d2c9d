// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use opentelemetry::{
    InstrumentationScope,
    metrics::{Counter, Gauge, Histogram, Meter, MeterProvider},
};

const METER_NAME: &str = "memoflight";
const VERSION: &str = "v0.1.0";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";
const MEMO_EVENT_COUNT_NAME: &str = "memo.event.count";
const MEMO_FETCH_DURATION_NAME: &str = "memo.fetch.duration";
const MEMO_ENTRIES_NAME: &str = "memo.entries";

pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

pub(crate) fn create_event_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter(MEMO_EVENT_COUNT_NAME)
        .with_description("Memoization activities")
        .with_unit("{event}")
        .build()
}

pub(crate) fn create_fetch_duration_histogram(meter: &Meter) -> Histogram<f64> {
    meter
        .f64_histogram(MEMO_FETCH_DURATION_NAME)
        .with_description("Time from fetch start to settlement")
        .with_unit("s")
        .build()
}

pub(crate) fn create_entry_count_gauge(meter: &Meter) -> Gauge<u64> {
    meter
        .u64_gauge(MEMO_ENTRIES_NAME)
        .with_description("Number of argument sets with a cache entry")
        .with_unit("{entry}")
        .build()
}
