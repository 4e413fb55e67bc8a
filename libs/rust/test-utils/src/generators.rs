//! Shared proptest generators.

use proptest::prelude::*;
use rust_instrumentation::{Identity, RequestContext};
use std::time::Duration;

/// Generate HTTP status codes from 100 to 599.
pub fn status_code_strategy() -> impl Strategy<Value = u16> {
    100u16..600
}

/// Generate inclusive status ranges `(min, max)` with `min <= max`.
pub fn status_range_strategy() -> impl Strategy<Value = (u16, u16)> {
    (100u16..600, 0u16..200).prop_map(|(min, width)| (min, min.saturating_add(width).min(599)))
}

/// Generate non-empty lists of distinct status codes.
pub fn status_set_strategy() -> impl Strategy<Value = Vec<u16>> {
    prop::collection::btree_set(status_code_strategy(), 1..6).prop_map(|set| set.into_iter().collect())
}

/// Generate tracked field names such as `invoice.paid`.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    "[a-z]{3,10}\\.[a-z]{3,10}"
}

/// Generate header-safe identifier values.
pub fn header_value_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9=;-]{1,40}"
}

/// Generate optional identity triples as outbound header pairs.
pub fn identity_headers_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    (
        proptest::option::of(header_value_strategy()),
        proptest::option::of(header_value_strategy()),
        proptest::option::of(header_value_strategy()),
    )
        .prop_map(|(request_id, trace_id, session_id)| {
            [
                ("X-Request-ID", request_id),
                ("X-Amzn-Trace-Id", trace_id),
                ("X-Session-ID", session_id),
            ]
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
            .collect()
        })
}

/// Generate identities with any combination of known values.
pub fn identity_strategy() -> impl Strategy<Value = Identity> {
    identity_headers_strategy().prop_map(|pairs| {
        let mut ctx = RequestContext::background();
        for (name, value) in pairs {
            ctx = match name.as_str() {
                "X-Request-ID" => ctx.with_request_id(value),
                "X-Amzn-Trace-Id" => ctx.with_trace_id(value),
                _ => ctx.with_session_id(value),
            };
        }
        ctx.identity().clone()
    })
}

/// Generate retry attempt limits, `None` included.
pub fn retry_count_strategy() -> impl Strategy<Value = Option<u32>> {
    proptest::option::of(0u32..8)
}

/// Generate backoff bases between 1ms and 1s.
pub fn backoff_strategy() -> impl Strategy<Value = Duration> {
    (1u64..1000).prop_map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_status_range_ordered((min, max) in status_range_strategy()) {
            prop_assert!(min <= max);
            prop_assert!(max < 600);
        }

        #[test]
        fn test_identity_headers_unique(pairs in identity_headers_strategy()) {
            let mut names: Vec<_> = pairs.iter().map(|(name, _)| name.clone()).collect();
            names.dedup();
            prop_assert_eq!(names.len(), pairs.len());
        }
    }
}
