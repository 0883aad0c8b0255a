//! ---
//! hm_section: "01-core"
//! hm_subsection: "module"
//! hm_type: "source"
//! hm_scope: "code"
//! hm_description: "Shared primitives and configuration for the coordinator runtime."
//! hm_version: "v0.1.0-alpha"
//! hm_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

/// Capture an instant suitable for scheduler comparisons.
pub fn monotonic_now() -> Instant {
    Instant::now()
}

/// Signed deviation of an observed tick duration from its schedule, in microseconds.
pub fn jitter_us(actual: Duration, expected: Duration) -> i64 {
    let actual_us = actual.as_secs_f64() * 1_000_000.0;
    let expected_us = expected.as_secs_f64() * 1_000_000.0;
    (actual_us - expected_us).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_is_signed() {
        assert!(jitter_us(Duration::from_millis(12), Duration::from_millis(10)) > 0);
        assert!(jitter_us(Duration::from_millis(8), Duration::from_millis(10)) < 0);
        assert_eq!(
            jitter_us(Duration::from_millis(10), Duration::from_millis(10)),
            0
        );
    }
}
