// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Group versions: flushes, ahead generation and reconciliation.

use cachegen::{Cache, Entry};
use cachegen_backend::testing::MockBackend;
use futures::executor::block_on;
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use tick::Clock;

fn build(mock: &MockBackend) -> Cache<MockBackend> {
    Cache::builder(Clock::new_frozen()).backend(mock.clone()).build()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Post {
    id: u32,
    title: String,
    tags: Vec<String>,
}

#[test]
fn flushes_count_up_from_one() {
    let mock = MockBackend::new();
    let cache = build(&mock);

    block_on(async {
        assert_eq!(cache.version("posts").await, 1);
        for _ in 0..5 {
            assert!(cache.flush("posts").await);
        }
        assert_eq!(cache.version("posts").await, 6);
    });

    // a fresh instance reads the persisted version
    assert_eq!(block_on(build(&mock).version("posts")), 6);
}

#[test]
fn flush_invalidates_group() {
    let mock = MockBackend::new();
    let cache = build(&mock);
    let post = Post {
        id: 1,
        title: "Hello".to_owned(),
        tags: vec!["news".to_owned()],
    };

    block_on(async {
        cache.set("post:1", &Entry::new(post.clone()), None, "posts").await;
        cache.set("page:about", &Entry::new("About".to_owned()), None, "pages").await;
        assert_eq!(cache.get::<Post>("post:1", "posts").await.map(Entry::into_content), Some(post));

        cache.flush("posts").await;

        assert!(cache.get::<Post>("post:1", "posts").await.is_none());
        assert!(cache.get::<String>("page:about", "pages").await.is_some());
        // the outdated entry stays in the backend
        assert!(mock.raw(&cache.namespace().item_key("post:1")).is_some());
    });
}

#[test]
fn other_instances_see_flushes_once_they_look_up_the_group() {
    let mock = MockBackend::new();
    let writer = build(&mock);

    block_on(async {
        writer.set("k", &Entry::new(1), None, "g").await;
        writer.flush("g").await;

        let reader = build(&mock);
        assert!(reader.get::<i32>("k", "g").await.is_none());
    });
}

#[test]
fn ahead_generation_becomes_current_after_activation() {
    let mock = MockBackend::new();
    let cache = build(&mock);

    block_on(async {
        cache.set("menu", &Entry::new("v1".to_owned()), None, "menus").await;

        let extension = cache.get_ahead_generation_extension("menus").await;
        assert_eq!((extension.key_version, extension.key_version_at_creation), (2, 1));
        cache
            .set("menu", &Entry::new("v2".to_owned()).with_ahead_generation(&extension), None, "menus")
            .await;

        // visible, but the group is not moved before activation
        assert_eq!(cache.get::<String>("menu", "menus").await.map(Entry::into_content).as_deref(), Some("v2"));
        assert_eq!(cache.version("menus").await, 1);

        cache.flush_group_after_ahead_generation("menus", &extension).await;
        assert_eq!(cache.version("menus").await, 2);
        assert_eq!(build(&mock).version("menus").await, 2);
    });
}

#[derive(Debug, Clone)]
enum Step {
    Flush,
    Ahead,
    ActivateOldest,
    WriteNewer(u64),
    Read,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Flush),
        Just(Step::Ahead),
        Just(Step::ActivateOldest),
        (1_u64..5).prop_map(Step::WriteNewer),
        Just(Step::Read),
    ]
}

proptest! {
    #[test]
    fn version_never_decreases(steps in prop::collection::vec(step(), 1..30)) {
        let mock = MockBackend::new();
        let cache = build(&mock);
        let observer = build(&mock);
        let mut extensions = Vec::new();
        let mut last = 1;

        for step in steps {
            block_on(async {
                match step {
                    Step::Flush => {
                        cache.flush("g").await;
                    }
                    Step::Ahead => extensions.push(cache.get_ahead_generation_extension("g").await),
                    Step::ActivateOldest => {
                        if !extensions.is_empty() {
                            let extension = extensions.remove(0);
                            cache.flush_group_after_ahead_generation("g", &extension).await;
                        }
                    }
                    Step::WriteNewer(ahead) => {
                        let version = cache.version("g").await + ahead;
                        cache.set("k", &Entry::new(0).with_key_version(version), None, "g").await;
                    }
                    Step::Read => {
                        let _ = observer.get::<i32>("k", "g").await;
                    }
                }
            });

            let now = block_on(cache.version("g"));
            prop_assert!(now >= last, "version went from {} to {}", last, now);
            last = now;
        }
    }
}

#[test]
fn round_trip_preserves_content() {
    let mock = MockBackend::new();
    let cache = build(&mock);
    let post = Post {
        id: 42,
        title: "Ünïcödé \"quoted\"".to_owned(),
        tags: Vec::new(),
    };

    block_on(async {
        assert!(cache.add("p", &Entry::new(post.clone()), None, "posts").await);
        assert_eq!(cache.get::<Post>("p", "posts").await.as_deref(), Some(&post));

        let updated = Post { id: 43, ..post };
        assert!(cache.replace("p", &Entry::new(updated.clone()), None, "posts").await);
        let entry = cache.get::<Post>("p", "posts").await.unwrap();
        assert_eq!(entry.content(), &updated);
        assert_eq!(entry.key_version(), Some(1));
    });
}
