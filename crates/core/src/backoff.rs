//! Exponential backoff schedule with bounded jitter.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff: `min(initial * multiplier^attempt, max)` with
/// ±`jitter` relative noise so synchronized clients spread out.
#[derive(Debug, Clone)]
pub struct Backoff {
	pub initial: Duration,
	pub multiplier: f64,
	pub max: Duration,
	/// Relative jitter, e.g. `0.10` for ±10%.
	pub jitter: f64,
}

impl Default for Backoff {
	fn default() -> Self {
		Self {
			initial: Duration::from_secs(1),
			multiplier: 2.0,
			max: Duration::from_secs(30),
			jitter: 0.10,
		}
	}
}

impl Backoff {
	/// Nominal (jitter-free) delay for a 0-based attempt index.
	pub fn nominal(&self, attempt: u32) -> Duration {
		let scaled = self.initial.as_secs_f64() * self.multiplier.powi(attempt as i32);
		Duration::from_secs_f64(scaled.min(self.max.as_secs_f64()))
	}

	/// Jittered delay for a 0-based attempt index.
	pub fn delay(&self, attempt: u32) -> Duration {
		let nominal = self.nominal(attempt).as_secs_f64();
		let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
		Duration::from_secs_f64((nominal * factor).max(0.0))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn nominal_is_non_decreasing_up_to_cap() {
		let backoff = Backoff::default();
		let mut previous = Duration::ZERO;
		for attempt in 0..12 {
			let value = backoff.nominal(attempt);
			assert!(value >= previous, "attempt {attempt} decreased");
			assert!(value <= backoff.max);
			previous = value;
		}
		assert_eq!(backoff.nominal(11), backoff.max);
	}

	#[test]
	fn delay_stays_within_jitter_band() {
		let backoff = Backoff::default();
		for attempt in 0..6 {
			let nominal = backoff.nominal(attempt).as_secs_f64();
			for _ in 0..50 {
				let jittered = backoff.delay(attempt).as_secs_f64();
				assert!(jittered >= nominal * 0.89, "attempt {attempt}: {jittered} below band");
				assert!(jittered <= nominal * 1.11, "attempt {attempt}: {jittered} above band");
			}
		}
	}

	#[test]
	fn first_delay_starts_at_initial() {
		let backoff = Backoff {
			initial: Duration::from_millis(200),
			multiplier: 3.0,
			max: Duration::from_secs(5),
			jitter: 0.10,
		};
		assert_eq!(backoff.nominal(0), Duration::from_millis(200));
		assert_eq!(backoff.nominal(1), Duration::from_millis(600));
		assert_eq!(backoff.nominal(10), Duration::from_secs(5));
	}
}
