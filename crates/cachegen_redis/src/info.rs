// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Parsing of `INFO` replies.

use std::collections::BTreeMap;

/// Parses the `field:value` lines of an `INFO` reply, skipping section headers.
pub(crate) fn parse_info(reply: &str) -> BTreeMap<String, String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(field, value)| (field.to_owned(), value.to_owned()))
        .collect()
}
