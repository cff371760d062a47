use rand::{Rng, SeedableRng};
use std::time::Duration;

use crate::consts::{MAX_ATTEMPTS, RETRY_BACKOFF};

/// Delay to wait before retry number `attempt` (1-based).
pub trait Backoff: Send {
	fn delay(&mut self, attempt: u32) -> Duration;
}

pub struct FixedBackoff(pub Duration);

impl Backoff for FixedBackoff {
	fn delay(&mut self, _attempt: u32) -> Duration {
		self.0
	}
}

/// Uniformly random delay in `[0, max]`.
pub struct JitterBackoff<R> {
	max: Duration,
	rng: R,
}

impl<R: Rng + Send> JitterBackoff<R> {
	pub fn new(max: Duration, rng: R) -> Self {
		Self { max, rng }
	}
}

impl<R: Rng + Send> Backoff for JitterBackoff<R> {
	fn delay(&mut self, _attempt: u32) -> Duration {
		let max_ms = self.max.as_millis() as u64;
		Duration::from_millis(self.rng.gen_range(0..=max_ms))
	}
}

pub struct RetryPolicy {
	pub max_attempts: u32,
	backoff: Box<dyn Backoff>,
}

impl RetryPolicy {
	pub fn new(max_attempts: u32, backoff: impl Backoff + 'static) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			backoff: Box::new(backoff),
		}
	}

	pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
		Self::new(max_attempts, FixedBackoff(delay))
	}

	pub fn jittered(max_attempts: u32, max_delay: Duration) -> Self {
		Self::new(
			max_attempts,
			JitterBackoff::new(max_delay, rand::rngs::StdRng::from_entropy()),
		)
	}

	pub fn delay(&mut self, attempt: u32) -> Duration {
		self.backoff.delay(attempt)
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::fixed(MAX_ATTEMPTS, RETRY_BACKOFF)
	}
}
