//! Byte transport underneath the framed channel

use serialport::{ClearBuffer, SerialPort};

use crate::error::ChannelError;

/// Duplex byte stream to the logger.
pub trait Transport: Send {
	/// Write all of `data`.
	fn write_all(&mut self, data: &[u8]) -> Result<(), ChannelError>;

	/// Read up to `buf.len()` bytes. `Ok(0)` means the read timeout elapsed
	/// with nothing received.
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError>;

	/// Discard anything pending in either direction.
	fn clear(&mut self) -> Result<(), ChannelError>;
}

impl Transport for Box<dyn SerialPort> {
	fn write_all(&mut self, data: &[u8]) -> Result<(), ChannelError> {
		std::io::Write::write_all(self, data)?;
		std::io::Write::flush(self)?;
		Ok(())
	}

	fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
		match std::io::Read::read(self, buf) {
			Ok(n) => Ok(n),
			Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
			Err(e) => Err(e.into()),
		}
	}

	fn clear(&mut self) -> Result<(), ChannelError> {
		SerialPort::clear(self.as_ref(), ClearBuffer::All)?;
		Ok(())
	}
}
