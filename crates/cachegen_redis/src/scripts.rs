// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::LazyLock;

use redis::Script;

/// `KEYS[1]`, `ARGV[1] = delta`. Returns the new value, or nil when the key is absent.
pub(crate) static INCREMENT_EXISTING: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return redis.call('INCRBY', KEYS[1], ARGV[1])
end
return false
",
    )
});

/// `KEYS[1]`, `ARGV[1] = expected`, `ARGV[2] = replacement`, `ARGV[3] = ttl seconds (0 = none)`.
/// Returns 1 when the value was replaced.
pub(crate) static COMPARE_AND_SWAP: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local current = redis.call('GET', KEYS[1])
if current == false or current ~= ARGV[1] then
    return 0
end
local ttl = tonumber(ARGV[3])
if ttl > 0 then
    redis.call('SET', KEYS[1], ARGV[2], 'EX', ttl)
else
    redis.call('SET', KEYS[1], ARGV[2])
end
return 1
",
    )
});
