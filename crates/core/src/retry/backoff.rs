use std::time::Duration;

use courier_domain::{BackoffKind, RetryPolicy};
use rand::Rng;

/// Delay before retry number `attempt + 1`, where `attempt` counts the
/// failures so far starting at zero.
pub fn delay_for(policy: &RetryPolicy, attempt: u32) -> Duration {
    delay_with_rng(policy, attempt, &mut rand::thread_rng())
}

/// [`delay_for`] with an explicit random source.
pub fn delay_with_rng<R: Rng + ?Sized>(policy: &RetryPolicy, attempt: u32, rng: &mut R) -> Duration {
    let clamped = base_delay(policy, attempt, rng).min(policy.max_delay);
    apply_jitter(clamped, policy.jitter_fraction, rng)
}

/// Delay before clamping and jitter.
fn base_delay<R: Rng + ?Sized>(policy: &RetryPolicy, attempt: u32, rng: &mut R) -> Duration {
    let base_ms = policy.base_delay.as_millis() as f64;
    let millis = match policy.backoff {
        BackoffKind::Fixed => base_ms,
        BackoffKind::Linear => base_ms * f64::from(attempt.saturating_add(1)),
        BackoffKind::ExponentialBackoff => {
            let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
            base_ms * policy.multiplier.powi(exponent)
        }
        BackoffKind::Random => {
            let max_ms = policy.max_delay.as_millis() as f64;
            if max_ms <= base_ms {
                base_ms
            } else {
                rng.gen_range(base_ms..=max_ms)
            }
        }
    };
    millis_to_duration(millis)
}

/// Add uniform jitter in `±fraction * delay`.
fn apply_jitter<R: Rng + ?Sized>(delay: Duration, fraction: f64, rng: &mut R) -> Duration {
    if fraction <= 0.0 || delay.is_zero() {
        return delay;
    }
    let delay_ms = delay.as_millis() as f64;
    let range = delay_ms * fraction.min(1.0);
    millis_to_duration(delay_ms + rng.gen_range(-range..=range))
}

fn millis_to_duration(millis: f64) -> Duration {
    if !millis.is_finite() || millis >= u64::MAX as f64 {
        return Duration::from_millis(u64::MAX);
    }
    Duration::from_millis(millis.max(0.0) as u64)
}
