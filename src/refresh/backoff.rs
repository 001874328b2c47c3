use std::time::Duration;

/// Pause before the next background refresh attempt.
///
/// Zero while there are no errors; otherwise `base * 2^min(errors, max_exponent)`.
/// With the defaults (1s, 6) that is 2s, 4s, ... up to 64s.
pub fn backoff_delay(consecutive_errors: u32, base: Duration, max_exponent: u32) -> Duration {
    if consecutive_errors == 0 {
        return Duration::ZERO;
    }
    let exponent = consecutive_errors.min(max_exponent);
    base.saturating_mul(2u32.saturating_pow(exponent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_default_schedule() {
        let delays: Vec<u64> = (0..9)
            .map(|n| backoff_delay(n, SECOND, 6).as_secs())
            .collect();
        assert_eq!(delays, vec![0, 2, 4, 8, 16, 32, 64, 64, 64]);
    }

    #[test]
    fn test_zero_exponent_is_flat() {
        assert_eq!(backoff_delay(5, SECOND, 0), SECOND);
    }

    proptest! {
        #[test]
        fn prop_monotonic_and_capped(errors in 0u32..1_000, max_exp in 0u32..=31, base_ms in 1u64..5_000) {
            let base = Duration::from_millis(base_ms);
            let here = backoff_delay(errors, base, max_exp);
            let next = backoff_delay(errors + 1, base, max_exp);
            let cap = base.saturating_mul(2u32.saturating_pow(max_exp));

            prop_assert!(next >= here);
            prop_assert!(next <= cap);
        }
    }
}
