use serde::{Deserialize, Serialize};
use std::fmt;

/// Reply to `is_logging`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingStatus {
	pub running: bool,
	pub current_page: u32,
	pub byte_index: u32,
}

impl LoggingStatus {
	/// Write indices still at zero: likely nothing recorded.
	pub fn indices_clean(&self) -> bool {
		self.current_page == 0 && self.byte_index == 0
	}
}

/// Reply to `get_logging_config`, as recorded in the logger's EEPROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingConfig {
	pub logging_start_time: i64,
	/// Zero while logging or after an abnormal stop.
	pub logging_stop_time: i64,
	pub logging_interval_code: u8,
	pub current_page: Option<u32>,
	pub byte_index: Option<u32>,
}

/// Session description stored next to a dump as `<flash_id>_<start>.config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
	#[serde(default)]
	pub logger_name: String,
	pub flash_id: String,
	pub logging_start_time: i64,
	#[serde(default)]
	pub logging_stop_time: i64,
	pub logging_interval_code: u8,
	/// Host time when the user stopped logging, if they did.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stop_logging_time: Option<f64>,
	/// Battery voltage read after retrieval.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub vbatt_post: Option<f64>,
	/// Index of the first sample in the dump; non-zero when the read started
	/// past page 0.
	#[serde(default, skip_serializing_if = "is_zero")]
	pub first_sample_index: u64,
	/// Keys written by other tools, kept as-is.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}

fn is_zero(n: &u64) -> bool {
	*n == 0
}

impl SessionMetadata {
	pub fn new(flash_id: &str, logger_name: &str, config: &LoggingConfig) -> Self {
		Self {
			logger_name: logger_name.to_string(),
			flash_id: flash_id.to_string(),
			logging_start_time: config.logging_start_time,
			logging_stop_time: config.logging_stop_time,
			logging_interval_code: config.logging_interval_code,
			stop_logging_time: None,
			vbatt_post: None,
			first_sample_index: 0,
			extra: serde_json::Map::new(),
		}
	}

	/// Refreshes the device-owned fields, keeping everything else.
	pub fn update_from(&mut self, flash_id: &str, logger_name: &str, config: &LoggingConfig) {
		self.flash_id = flash_id.to_string();
		self.logger_name = logger_name.to_string();
		self.logging_start_time = config.logging_start_time;
		self.logging_stop_time = config.logging_stop_time;
		self.logging_interval_code = config.logging_interval_code;
		self.stop_logging_time = None;
	}

	/// Whether the logger recorded a clean stop after it started.
	pub fn stopped_normally(&self) -> bool {
		self.logging_stop_time > self.logging_start_time
	}

	pub fn session_name(&self) -> String {
		format!("{}_{}", self.flash_id, self.logging_start_time)
	}
}

impl fmt::Display for SessionMetadata {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "Logger name:    {}", self.logger_name)?;
		writeln!(f, "Flash ID:       {}", self.flash_id)?;
		writeln!(f, "Logging start:  {}", self.logging_start_time)?;
		writeln!(f, "Logging stop:   {}", self.logging_stop_time)?;
		write!(f, "Interval code:  {}", self.logging_interval_code)
	}
}
