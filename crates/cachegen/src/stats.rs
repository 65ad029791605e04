// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Size accounting by keyspace enumeration.

use std::time::SystemTime;

use cachegen_backend::Backend;
use tick::Clock;

use crate::connector::Connector;

/// The deadline is checked once per this many enumerated items.
const DEADLINE_CHECK_INTERVAL: u64 = 10;

/// Aggregate size of the entries stored under one cache instance's namespace.
///
/// `bytes` and `items` are `None` when listing or dumping failed and nothing was counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeStats {
    /// Total size of the values, in bytes.
    pub bytes: Option<u64>,
    /// Number of entries.
    pub items: Option<u64>,
    /// Whether the deadline expired and the totals are partial.
    pub timeout_occurred: bool,
}

#[derive(Debug, Default)]
struct Totals {
    bytes: u64,
    items: u64,
    enumerated: u64,
    error: bool,
}

impl Totals {
    fn into_stats(self, timeout_occurred: bool) -> SizeStats {
        if self.error && self.items == 0 {
            return SizeStats {
                bytes: None,
                items: None,
                timeout_occurred,
            };
        }
        SizeStats {
            bytes: Some(self.bytes),
            items: Some(self.items),
            timeout_occurred,
        }
    }
}

/// Walks every server's storage units and sums the entries whose key starts with `prefix`.
pub(crate) async fn collect<B: Backend>(connector: &Connector<B>, prefix: &str, clock: &Clock, timeout_at: SystemTime) -> SizeStats {
    let mut totals = Totals::default();

    for server in connector.servers() {
        let Some(units) = connector.storage_units(&server).await else {
            totals.error = true;
            continue;
        };

        for unit in units {
            let Some(items) = connector.dump_unit(&unit, prefix).await else {
                totals.error = true;
                continue;
            };

            for item in items {
                totals.enumerated += 1;
                if totals.enumerated % DEADLINE_CHECK_INTERVAL == 0 && clock.system_time() >= timeout_at {
                    tracing::debug!(
                        enumerated = totals.enumerated,
                        items = totals.items,
                        "size enumeration deadline reached"
                    );
                    return totals.into_stats(true);
                }

                if item.key.starts_with(prefix) {
                    totals.bytes += item.size;
                    totals.items += 1;
                }
            }
        }
    }

    totals.into_stats(false)
}
