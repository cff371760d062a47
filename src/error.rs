//! Error types for logger communication and data reconstruction

use thiserror::Error;

/// Errors raised by a single framed or text exchange with the logger
#[derive(Debug, Error)]
pub enum ChannelError {
	/// Fewer bytes than expected arrived before the read deadline
	#[error("response length mismatch: expected {expected} bytes, received {received}")]
	LengthMismatch { expected: usize, received: usize },

	/// Response had the right length but the CRC-32 did not match
	#[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
	ChecksumFailure { expected: u32, actual: u32 },

	/// A text reply could not be parsed into the command's response type
	#[error("invalid response to {command}: {reason}")]
	InvalidResponse { command: String, reason: String },

	/// Retry budget exhausted
	#[error("logger unresponsive to {command} after {attempts} attempts (last error: {last})")]
	Unresponsive {
		command: String,
		attempts: u32,
		last: Box<ChannelError>,
	},

	/// I/O error during communication
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// Serial port error
	#[error("serial port error: {0}")]
	Serial(#[from] serialport::Error),
}

impl ChannelError {
	/// Whether the exchange may succeed if repeated.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			ChannelError::LengthMismatch { .. }
				| ChannelError::ChecksumFailure { .. }
				| ChannelError::InvalidResponse { .. }
		)
	}
}

/// A bulk read aborted on a chunk that could not be retrieved
#[derive(Debug, Error)]
pub enum ReadError {
	#[error("failed to read {begin:#08x}..={end:#08x}: {source}")]
	Chunk {
		begin: usize,
		end: usize,
		#[source]
		source: ChannelError,
	},
}

#[derive(Debug, Error, PartialEq)]
pub enum TimeError {
	#[error("unknown logging interval code: {0}")]
	UnknownIntervalCode(u8),

	#[error("start time {start_time} is outside the representable time range")]
	OutOfRange { start_time: i64 },
}
