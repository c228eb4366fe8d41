// src/search/backoff.rs
use rand::Rng;
use std::time::Duration;

/// Delay strategy applied between retry attempts.
///
/// `attempt` is the 1-based number of the attempt that just failed. The
/// transport calls `next_delay` once per retry, never after the final attempt.
pub trait Backoff: Send + Sync {
    fn next_delay(&self, attempt: u32) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn next_delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// Exponential backoff with jitter.
///
/// The delay is derived from the attempt number alone, so each new logical
/// request starts over at `initial`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
    pub max: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            multiplier: 1.5,
            randomization_factor: 0.5,
            max: Duration::from_secs(60),
        }
    }
}

impl ExponentialBackoff {
    /// Delay before jitter is applied
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        // NaN and overflow land on `max`, a negative multiplier on zero
        Duration::from_secs_f64(secs.min(self.max.as_secs_f64()).max(0.0))
    }
}

impl Backoff for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        // Factors outside [0, 1] would push the lower bound below zero
        let delta = base * self.randomization_factor.clamp(0.0, 1.0);
        if delta.is_nan() || delta <= 0.0 {
            return Duration::from_secs_f64(base);
        }
        let jittered = rand::thread_rng().gen_range((base - delta)..=(base + delta));
        Duration::from_secs_f64(jittered.min(self.max.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_delay_grows_and_caps() {
        let backoff = ExponentialBackoff::default();

        assert_eq!(backoff.base_delay(1), Duration::from_millis(500));
        assert_eq!(backoff.base_delay(2), Duration::from_millis(750));
        assert!(backoff.base_delay(3) > backoff.base_delay(2));
        assert_eq!(backoff.base_delay(100), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let backoff = ExponentialBackoff::default();

        for _ in 0..100 {
            let delay = backoff.next_delay(1);
            assert!(delay >= Duration::from_millis(250));
            assert!(delay <= Duration::from_millis(750));
        }
    }

    #[test]
    fn test_no_randomization_is_deterministic() {
        let backoff = ExponentialBackoff {
            randomization_factor: 0.0,
            ..Default::default()
        };

        assert_eq!(backoff.next_delay(2), Duration::from_millis(750));
    }

    #[test]
    fn test_out_of_range_parameters_do_not_panic() {
        let wide = ExponentialBackoff {
            randomization_factor: 1.5,
            ..Default::default()
        };
        for _ in 0..100 {
            assert!(wide.next_delay(1) <= Duration::from_secs(1));
        }

        let negative = ExponentialBackoff {
            randomization_factor: -0.5,
            ..Default::default()
        };
        assert_eq!(negative.next_delay(1), Duration::from_millis(500));

        let shrinking = ExponentialBackoff {
            multiplier: -2.0,
            randomization_factor: f64::NAN,
            ..Default::default()
        };
        assert_eq!(shrinking.next_delay(2), Duration::ZERO);
    }

    #[test]
    fn test_closure_backoff() {
        let backoff = |attempt: u32| Duration::from_secs(attempt as u64);
        assert_eq!(backoff.next_delay(3), Duration::from_secs(3));
    }
}
