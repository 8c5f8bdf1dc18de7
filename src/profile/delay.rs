use rand::Rng;
use std::thread;
use std::time::Duration;
use tracing::trace;

/// A configured pause with optional symmetric jitter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delay {
    pub base_us: i64,
    pub precision_us: i64,
}

impl Delay {
    pub fn new(base_us: i64, precision_us: i64) -> Self {
        Self {
            base_us,
            precision_us,
        }
    }

    /// Draw the actual pause. A zero base never sleeps, whatever the
    /// precision.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.base_us == 0 {
            return Duration::ZERO;
        }
        let factor = if self.precision_us != 0 {
            rng.gen_range(-1.0..1.0)
        } else {
            0.0
        };
        jittered_delay(self.base_us, self.precision_us, factor)
    }

    /// Sleep for a freshly drawn pause.
    pub fn apply<R: Rng + ?Sized>(&self, rng: &mut R) {
        let pause = self.sample(rng);
        if !pause.is_zero() {
            trace!("Sleeping for {:?}", pause);
            thread::sleep(pause);
        }
    }
}

/// `base + precision * factor` microseconds, floored at zero.
///
/// `factor` is clamped to `[-1, 1]`.
pub fn jittered_delay(base_us: i64, precision_us: i64, factor: f64) -> Duration {
    let micros = base_us as f64 + precision_us as f64 * factor.clamp(-1.0, 1.0);
    if micros <= 0.0 {
        Duration::ZERO
    } else {
        Duration::from_micros(micros.round() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_maximum_jitter() {
        assert_eq!(jittered_delay(2_000_000, 1_000_000, 1.0), Duration::from_secs(3));
        assert_eq!(jittered_delay(2_000_000, 1_000_000, -1.0), Duration::from_secs(1));
    }

    #[test]
    fn test_floored_at_zero() {
        assert_eq!(jittered_delay(1_000, 5_000, -1.0), Duration::ZERO);
        assert_eq!(jittered_delay(0, 0, 0.7), Duration::ZERO);
    }

    #[test]
    fn test_zero_precision_is_exact() {
        let mut rng = StdRng::seed_from_u64(1);
        let delay = Delay::new(250_000, 0);
        for _ in 0..50 {
            assert_eq!(delay.sample(&mut rng), Duration::from_millis(250));
        }
    }

    #[test]
    fn test_sample_within_bounds() {
        let mut rng = StdRng::seed_from_u64(9);
        let delay = Delay::new(2_000_000, 500_000);
        for _ in 0..200 {
            let pause = delay.sample(&mut rng);
            assert!(pause >= Duration::from_micros(1_500_000));
            assert!(pause <= Duration::from_micros(2_500_000));
        }
        assert_eq!(Delay::new(0, 500_000).sample(&mut rng), Duration::ZERO);
    }
}
