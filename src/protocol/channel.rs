//! Request/response exchanges with checksum verification and bounded retry

use crate::consts::CRC_SIZE;
use crate::error::ChannelError;
use crate::protocol::commands::{Command, ReplyParser};
use crate::protocol::retry::RetryPolicy;
use crate::protocol::transport::Transport;
use crate::types::Frame;

/// How a channel handles failed exchanges. How long a read may stay silent is
/// the transport's own timeout.
#[derive(Default)]
pub struct ChannelConfig {
	pub retry: RetryPolicy,
}

/// Owns the transport for a retrieval session; one exchange at a time.
///
/// Every exchange starts by clearing the transport, so an exchange that
/// failed or was abandoned never leaks bytes into the next one.
pub struct FramedChannel<T: Transport> {
	transport: T,
	retry: RetryPolicy,
}

impl<T: Transport> FramedChannel<T> {
	pub fn new(transport: T, config: ChannelConfig) -> Self {
		Self {
			transport,
			retry: config.retry,
		}
	}

	pub fn transport(&self) -> &T {
		&self.transport
	}

	pub fn transport_mut(&mut self) -> &mut T {
		&mut self.transport
	}

	pub fn reset(&mut self) -> Result<(), ChannelError> {
		self.transport.clear()
	}

	/// Sends `command` and returns exactly `expected_len` verified payload bytes.
	pub fn send_and_receive(
		&mut self,
		command: &Command,
		expected_len: usize,
	) -> Result<Vec<u8>, ChannelError> {
		let order = command.checksum_order();
		self.with_retry(command, |ch| {
			let buf = ch.read_exact(expected_len + CRC_SIZE)?;
			Frame::from_bytes(buf, expected_len, order).map(Frame::into_payload)
		})
	}

	/// Sends a text command and parses its one-line reply.
	pub fn query<R>(&mut self, command: &Command, parse: ReplyParser<R>) -> Result<R, ChannelError> {
		self.with_retry(command, |ch| {
			let line = ch.read_line()?;
			parse(&line).map_err(|reason| ChannelError::InvalidResponse {
				command: command.to_string(),
				reason,
			})
		})
	}

	fn with_retry<R>(
		&mut self,
		command: &Command,
		mut receive: impl FnMut(&mut Self) -> Result<R, ChannelError>,
	) -> Result<R, ChannelError> {
		let wire = command.to_bytes();
		let max_attempts = self.retry.max_attempts;
		let mut attempt = 1;
		loop {
			log::debug!("{command}: attempt {attempt}/{max_attempts}");
			self.reset()?;
			self.transport.write_all(&wire)?;
			let err = match receive(self) {
				Ok(r) => return Ok(r),
				Err(e) if e.is_retryable() => e,
				Err(e) => return Err(e),
			};
			if attempt >= max_attempts {
				return Err(ChannelError::Unresponsive {
					command: command.to_string(),
					attempts: attempt,
					last: Box::new(err),
				});
			}
			log::warn!("{command}: {err}, retrying");
			let delay = self.retry.delay(attempt);
			if !delay.is_zero() {
				std::thread::sleep(delay);
			}
			attempt += 1;
		}
	}

	/// Reads until `len` bytes arrived or the transport went silent.
	fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, ChannelError> {
		let mut buf = vec![0u8; len];
		let mut pos = 0;
		while pos < len {
			match self.transport.read(&mut buf[pos..])? {
				0 => break,
				n => pos += n,
			}
		}
		log::trace!("received {pos}/{len} bytes");
		buf.truncate(pos);
		Ok(buf)
	}

	/// Reads one `\n`-terminated line, without the terminator.
	fn read_line(&mut self) -> Result<Vec<u8>, ChannelError> {
		let mut line = Vec::new();
		let mut byte = [0u8; 1];
		while self.transport.read(&mut byte)? == 1 {
			if byte[0] == b'\n' {
				break;
			}
			line.push(byte[0]);
		}
		log::trace!("received line {:?}", String::from_utf8_lossy(&line));
		Ok(line)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::protocol::commands::parse_flash_id;
	use crate::sim::{Fault, SimulatedLogger};
	use std::time::Duration;

	fn channel(sim: SimulatedLogger, attempts: u32) -> FramedChannel<SimulatedLogger> {
		FramedChannel::new(
			sim,
			ChannelConfig {
				retry: RetryPolicy::fixed(attempts, Duration::ZERO),
			},
		)
	}

	fn image() -> Vec<u8> {
		(0..1024).map(|i| (i % 251) as u8).collect()
	}

	#[test]
	fn returns_verified_payload() {
		let mut ch = channel(SimulatedLogger::new(image()), 3);
		let payload = ch
			.send_and_receive(&Command::read_range(256, 511), 256)
			.unwrap();
		assert_eq!(payload, image()[256..512]);
		assert_eq!(ch.transport().range_reads(), &[(256, 511)]);
	}

	#[test]
	fn legacy_page_read_uses_big_endian_checksum() {
		let mut ch = channel(SimulatedLogger::new(image()), 1);
		let cmd = Command::ReadPage { begin: 0, end: 255 };
		assert_eq!(ch.send_and_receive(&cmd, 256).unwrap(), image()[..256]);
	}

	#[test]
	fn retries_corrupted_and_truncated_responses() {
		let mut sim = SimulatedLogger::new(image());
		sim.inject(Fault::FlipBit { byte: 10, bit: 3 });
		sim.inject(Fault::Truncate(100));
		sim.inject(Fault::Silence);
		let mut ch = channel(sim, 4);
		let payload = ch.send_and_receive(&Command::read_range(0, 255), 256).unwrap();
		assert_eq!(payload, image()[..256]);
		assert_eq!(ch.transport().range_reads().len(), 4);
	}

	#[test]
	fn exhausted_retries_are_unresponsive() {
		let mut sim = SimulatedLogger::new(image());
		for _ in 0..3 {
			sim.inject(Fault::FlipBit { byte: 256, bit: 0 });
		}
		let mut ch = channel(sim, 3);
		match ch.send_and_receive(&Command::read_range(0, 255), 256) {
			Err(ChannelError::Unresponsive { attempts, last, .. }) => {
				assert_eq!(attempts, 3);
				assert!(matches!(*last, ChannelError::ChecksumFailure { .. }));
			}
			other => panic!("unexpected result: {other:?}"),
		}
	}

	#[test]
	fn clears_stale_bytes_before_each_attempt() {
		let mut sim = SimulatedLogger::new(image());
		sim.push_stale(b"leftover from an abandoned command");
		let mut ch = channel(sim, 1);
		let payload = ch.send_and_receive(&Command::read_range(0, 15), 16).unwrap();
		assert_eq!(payload, image()[..16]);
		assert!(ch.transport().clears() >= 1);
	}

	#[test]
	fn text_query_is_parsed_and_retried() {
		let mut sim = SimulatedLogger::new(image());
		sim.inject(Fault::Garble);
		let mut ch = channel(sim, 2);
		let id = ch.query(&Command::FlashId, parse_flash_id).unwrap();
		assert_eq!(id, crate::sim::FLASH_ID);
	}

	#[test]
	fn unparseable_text_exhausts_to_unresponsive() {
		let mut sim = SimulatedLogger::new(image());
		sim.inject(Fault::Garble);
		sim.inject(Fault::Garble);
		let mut ch = channel(sim, 2);
		let err = ch.query(&Command::FlashId, parse_flash_id).unwrap_err();
		match err {
			ChannelError::Unresponsive { last, .. } => {
				assert!(matches!(*last, ChannelError::InvalidResponse { .. }))
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[test]
	fn transport_silence_ends_the_read_short() {
		let mut sim = SimulatedLogger::new(image());
		sim.inject(Fault::Truncate(40));
		let mut ch = channel(sim, 1);
		match ch.send_and_receive(&Command::read_range(0, 255), 256) {
			Err(ChannelError::Unresponsive { last, .. }) => match *last {
				ChannelError::LengthMismatch { expected, received } => {
					assert_eq!((expected, received), (260, 40));
				}
				other => panic!("unexpected last error: {other:?}"),
			},
			other => panic!("unexpected result: {other:?}"),
		}
		assert_eq!(ChannelConfig::default().retry.max_attempts, crate::consts::MAX_ATTEMPTS);
	}
}
