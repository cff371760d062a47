use std::fmt;

use crate::consts::*;
use crate::types::{ChecksumOrder, LoggingConfig, LoggingStatus};

/// A request understood by the logger firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	/// Inclusive byte range read, little-endian CRC.
	ReadRange { begin: usize, end: usize },
	/// Legacy inclusive page read, big-endian CRC.
	ReadPage { begin: usize, end: usize },
	IsLogging,
	LoggingConfig,
	FlashId,
	LoggerName,
	SysVolt,
}

impl Command {
	pub fn read_range(begin: usize, end: usize) -> Self {
		Command::ReadRange { begin, end }
	}

	pub fn verb(&self) -> &'static str {
		match self {
			Command::ReadRange { .. } => CMD_READ_RANGE,
			Command::ReadPage { .. } => CMD_READ_PAGE,
			Command::IsLogging => CMD_IS_LOGGING,
			Command::LoggingConfig => CMD_LOGGING_CONFIG,
			Command::FlashId => CMD_FLASH_ID,
			Command::LoggerName => CMD_LOGGER_NAME,
			Command::SysVolt => CMD_SYS_VOLT,
		}
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		match self {
			Command::ReadRange { begin, end } | Command::ReadPage { begin, end } => {
				format!("{}{begin:x},{end:x}\n", self.verb()).into_bytes()
			}
			_ => self.verb().as_bytes().to_vec(),
		}
	}

	pub fn checksum_order(&self) -> ChecksumOrder {
		match self {
			Command::ReadPage { .. } => ChecksumOrder::Big,
			_ => ChecksumOrder::Little,
		}
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Command::ReadRange { begin, end } | Command::ReadPage { begin, end } => {
				write!(f, "{} {begin:#08x}..={end:#08x}", self.verb())
			}
			_ => f.write_str(self.verb()),
		}
	}
}

/// Parser for one command's text reply. Lines arrive without the trailing newline.
pub type ReplyParser<T> = fn(&[u8]) -> Result<T, String>;

fn text(line: &[u8]) -> Result<&str, String> {
	std::str::from_utf8(line)
		.map(str::trim)
		.map_err(|e| format!("not UTF-8: {e}"))
}

fn fields<T: std::str::FromStr>(line: &str) -> Result<Vec<T>, String> {
	line.split(',')
		.map(|f| {
			f.trim()
				.parse()
				.map_err(|_| format!("bad field {f:?} in {line:?}"))
		})
		.collect()
}

pub fn parse_logging_status(line: &[u8]) -> Result<LoggingStatus, String> {
	let line = text(line)?;
	let v: Vec<u32> = fields(line)?;
	match v.as_slice() {
		[running @ (0 | 1), page, byte] => Ok(LoggingStatus {
			running: *running == 1,
			current_page: *page,
			byte_index: *byte,
		}),
		_ => Err(format!("expected running,page,byte_index, got {line:?}")),
	}
}

pub fn parse_logging_config(line: &[u8]) -> Result<LoggingConfig, String> {
	let line = text(line)?;
	let v: Vec<i64> = fields(line)?;
	if v.len() < 3 {
		return Err(format!("expected at least 3 fields, got {line:?}"));
	}
	let code = u8::try_from(v[2]).map_err(|_| format!("bad interval code {}", v[2]))?;
	let index = |i: usize| v.get(i).and_then(|&x| u32::try_from(x).ok());
	Ok(LoggingConfig {
		logging_start_time: v[0],
		logging_stop_time: v[1],
		logging_interval_code: code,
		current_page: index(3),
		byte_index: index(4),
	})
}

pub fn parse_flash_id(line: &[u8]) -> Result<String, String> {
	let line = text(line)?;
	if line.len() == FLASH_ID_LEN
		&& line.starts_with('E')
		&& line.chars().all(|c| c.is_ascii_hexdigit())
	{
		Ok(line.to_string())
	} else {
		Err(format!("not a flash ID: {line:?}"))
	}
}

/// An all-erased reply means no name was ever set.
pub fn parse_logger_name(line: &[u8]) -> Result<String, String> {
	let raw = line.strip_suffix(b"\r").unwrap_or(line);
	if !raw.is_empty() && raw.iter().all(|&b| b == ERASED_BYTE) {
		return Ok(String::new());
	}
	let name = text(raw)?;
	if name.is_empty() {
		return Err("empty reply".to_string());
	}
	Ok(name.chars().take(LOGGER_NAME_MAX_LEN).collect())
}

pub fn parse_sys_volt(line: &[u8]) -> Result<f64, String> {
	let line = text(line)?;
	let volts = line
		.split(',')
		.nth(1)
		.ok_or_else(|| format!("expected raw,volts, got {line:?}"))?;
	let v: f64 = volts
		.trim()
		.parse()
		.map_err(|_| format!("bad voltage {volts:?}"))?;
	Ok((v * 100.0).round() / 100.0)
}
