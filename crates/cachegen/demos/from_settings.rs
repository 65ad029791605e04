// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Settings Example
//!
//! Builds a cache from flat, dotted settings as they would come from an application's
//! configuration store, then prepares content ahead of a flush.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use cachegen::{Cache, CacheConfig, Entry};
use tick::Clock;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), cachegen::Error> {
    let settings = HashMap::from([
        ("objectcache.engine".to_owned(), "memory".to_owned()),
        ("objectcache.host".to_owned(), "example.com".to_owned()),
        ("objectcache.module".to_owned(), "object".to_owned()),
        ("objectcache.allow_stale".to_owned(), "yes".to_owned()),
    ]);

    let config = CacheConfig::from_settings(&settings, "objectcache")?;
    let cache = Cache::connect(&config, Clock::new_tokio()).await?;
    println!("engine available: {}", cache.available());

    // Produce the next generation of the menu before anyone sees it
    let extension = cache.get_ahead_generation_extension("menus").await;
    cache
        .set("main-menu", &Entry::new(vec!["Home", "Blog"]).with_ahead_generation(&extension), None, "menus")
        .await;

    // Activate it: the group moves to the prepared version in one step
    cache.flush_group_after_ahead_generation("menus", &extension).await;
    println!("menus at version {}", cache.version("menus").await);

    let stats = cache.get_stats_size(SystemTime::now() + Duration::from_secs(1)).await;
    println!("{stats:?}");

    Ok(())
}
