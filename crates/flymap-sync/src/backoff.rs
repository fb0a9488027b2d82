//! Reconnect backoff schedule.

use flymap_core::ReconnectPolicy;
use std::time::Duration;

/// Delay before reconnect attempt `attempt` (1-based):
/// `min(base * 2^(attempt - 1), cap)`.
pub fn reconnect_delay(attempt: u32, policy: &ReconnectPolicy) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63);
    let delay_ms = policy
        .base_delay_ms
        .saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX))
        .min(policy.max_delay_ms);
    Duration::from_millis(delay_ms)
}

/// Whether another reconnect attempt is allowed under the policy.
pub fn attempts_remaining(attempts_so_far: u32, policy: &ReconnectPolicy) -> bool {
    attempts_so_far < policy.max_attempts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            max_attempts: 5,
        }
    }

    #[test]
    fn test_exponential_ladder() {
        let p = policy();
        assert_eq!(reconnect_delay(1, &p), Duration::from_secs(1));
        assert_eq!(reconnect_delay(2, &p), Duration::from_secs(2));
        assert_eq!(reconnect_delay(3, &p), Duration::from_secs(4));
        assert_eq!(reconnect_delay(4, &p), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_is_capped() {
        let p = policy();
        assert_eq!(reconnect_delay(5, &p), Duration::from_secs(10));
        assert_eq!(reconnect_delay(30, &p), Duration::from_secs(10));
    }

    #[test]
    fn test_no_overflow_at_large_attempts() {
        let p = policy();
        assert_eq!(reconnect_delay(u32::MAX, &p), Duration::from_secs(10));
    }

    #[test]
    fn test_attempt_budget() {
        let p = policy();
        assert!(attempts_remaining(0, &p));
        assert!(attempts_remaining(4, &p));
        assert!(!attempts_remaining(5, &p));
        assert!(!attempts_remaining(6, &p));
    }
}
