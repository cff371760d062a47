use crate::consts::CRC_SIZE;
use crate::error::ChannelError;

/// Byte order of the trailing CRC-32 in a binary response.
///
/// `spi_flash_read_range` sends it little-endian, the older `read_page`
/// command big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumOrder {
	Big,
	Little,
}

impl ChecksumOrder {
	pub fn encode(self, crc: u32) -> [u8; CRC_SIZE] {
		match self {
			ChecksumOrder::Big => crc.to_be_bytes(),
			ChecksumOrder::Little => crc.to_le_bytes(),
		}
	}

	pub fn decode(self, bytes: [u8; CRC_SIZE]) -> u32 {
		match self {
			ChecksumOrder::Big => u32::from_be_bytes(bytes),
			ChecksumOrder::Little => u32::from_le_bytes(bytes),
		}
	}
}

/// A verified binary response: payload followed by its CRC-32.
#[derive(Debug)]
pub struct Frame {
	payload: Vec<u8>,
}

impl Frame {
	/// Builds the wire image of a response carrying `payload`.
	pub fn encode(payload: &[u8], order: ChecksumOrder) -> Vec<u8> {
		let mut buf = Vec::with_capacity(payload.len() + CRC_SIZE);
		buf.extend_from_slice(payload);
		buf.extend_from_slice(&order.encode(crc32fast::hash(payload)));
		buf
	}

	pub fn from_bytes(
		mut buf: Vec<u8>,
		payload_len: usize,
		order: ChecksumOrder,
	) -> Result<Self, ChannelError> {
		if buf.len() != payload_len + CRC_SIZE {
			return Err(ChannelError::LengthMismatch {
				expected: payload_len + CRC_SIZE,
				received: buf.len(),
			});
		}
		let expected = crc32fast::hash(&buf[..payload_len]);
		let actual = order.decode([
			buf[payload_len],
			buf[payload_len + 1],
			buf[payload_len + 2],
			buf[payload_len + 3],
		]);
		if expected != actual {
			return Err(ChannelError::ChecksumFailure { expected, actual });
		}
		buf.truncate(payload_len);
		Ok(Frame { payload: buf })
	}

	pub fn into_payload(self) -> Vec<u8> {
		self.payload
	}
}
