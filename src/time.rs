//! Sample index to timestamp mapping

use chrono::{DateTime, Utc};

use crate::error::TimeError;

/// Sampling interval in milliseconds for each firmware interval code.
pub const INTERVAL_TABLE_MS: [(u8, i64); 3] = [(0, 200), (1, 1_000), (2, 60_000)];

pub fn interval_ms(code: u8) -> Result<i64, TimeError> {
	INTERVAL_TABLE_MS
		.iter()
		.find(|(c, _)| *c == code)
		.map(|&(_, ms)| ms)
		.ok_or(TimeError::UnknownIntervalCode(code))
}

fn start_millis(start_time: i64) -> Result<i64, TimeError> {
	start_time
		.checked_mul(1000)
		.ok_or(TimeError::OutOfRange { start_time })
}

/// Exact timestamp of sample `index` in milliseconds since the epoch.
pub fn timestamp_millis_for(index: u64, start_time: i64, interval_code: u8) -> Result<i64, TimeError> {
	let interval = interval_ms(interval_code)?;
	i64::try_from(index)
		.ok()
		.and_then(|i| i.checked_mul(interval))
		.and_then(|offset| start_millis(start_time).ok()?.checked_add(offset))
		.ok_or(TimeError::OutOfRange { start_time })
}

/// `start_time + index * interval`, in seconds since the epoch.
pub fn timestamp_for(index: u64, start_time: i64, interval_code: u8) -> Result<f64, TimeError> {
	Ok(timestamp_millis_for(index, start_time, interval_code)? as f64 / 1000.0)
}

/// Timestamps for one session; the interval code is checked once up front.
#[derive(Debug, Clone, Copy)]
pub struct TimeReconstructor {
	start_ms: i64,
	interval_ms: i64,
}

impl TimeReconstructor {
	pub fn new(start_time: i64, interval_code: u8) -> Result<Self, TimeError> {
		Ok(Self {
			start_ms: start_millis(start_time)?,
			interval_ms: interval_ms(interval_code)?,
		})
	}

	/// Saturates instead of overflowing; a saturated value has no `datetime`.
	pub fn millis(&self, index: u64) -> i64 {
		let index = i64::try_from(index).unwrap_or(i64::MAX);
		self.start_ms.saturating_add(index.saturating_mul(self.interval_ms))
	}

	pub fn seconds(&self, index: u64) -> f64 {
		self.millis(index) as f64 / 1000.0
	}

	pub fn datetime(&self, index: u64) -> Option<DateTime<Utc>> {
		DateTime::from_timestamp_millis(self.millis(index))
	}
}
