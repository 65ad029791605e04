// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Page Cache Example
//!
//! Caches rendered pages in a group, flushes the group when content changes, and shows
//! how stale serving hands regeneration to exactly one caller.

use cachegen::{Cache, CacheTelemetry, Entry};
use tick::Clock;

fn render(id: u32, revision: u32) -> String {
    format!("<html>post {id}, revision {revision}</html>")
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let cache = Cache::builder(Clock::new_tokio())
        .memory()
        .name("pages")
        .allow_stale(true)
        .telemetry(CacheTelemetry::new().with_logs())
        .build();

    // Cache two pages under the "posts" group
    for id in [1, 2] {
        cache.set(&format!("post:{id}"), &Entry::new(render(id, 1)), None, "posts").await;
    }

    // A post was edited: one flush invalidates every page of the group
    cache.flush("posts").await;

    // The first reader is told to regenerate (entry is None, flag is true)
    let (entry, must_regenerate) = cache.get_with_old::<String>("post:1", "posts").await;
    assert!(entry.is_none() && must_regenerate);

    // Everybody else keeps getting the old page while regeneration is in progress
    let (entry, must_regenerate) = cache.get_with_old::<String>("post:1", "posts").await;
    println!("served stale: {:?} (regenerate: {must_regenerate})", entry.map(Entry::into_content));

    // The regenerating caller stores the new page under the current version
    cache.set("post:1", &Entry::new(render(1, 2)), None, "posts").await;
    let fresh = cache.get::<String>("post:1", "posts").await.map(Entry::into_content);
    println!("fresh: {fresh:?}");

    // Counters live alongside entries and ignore flushes
    cache.counter_add("renders", 3).await;
    println!("renders: {}", cache.counter_get("renders").await);
}
