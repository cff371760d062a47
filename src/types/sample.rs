use crate::consts::SAMPLE_SIZE;

/// One sensor record as stored in flash.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
	pub temperature: f32,
	pub pressure: f32,
	pub ambient_light: u16,
	pub white_light: u16,
	pub red: u16,
	pub green: u16,
	pub blue: u16,
	pub white: u16,
}

impl Sample {
	/// Decodes one record. Returns `None` for the NaN end-of-data marker.
	pub fn from_bytes(b: &[u8; SAMPLE_SIZE]) -> Option<Self> {
		let temperature = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
		let pressure = f32::from_le_bytes([b[4], b[5], b[6], b[7]]);
		if temperature.is_nan() || pressure.is_nan() {
			return None;
		}
		Some(Sample {
			temperature,
			pressure,
			ambient_light: u16::from_le_bytes([b[8], b[9]]),
			white_light: u16::from_le_bytes([b[10], b[11]]),
			red: u16::from_le_bytes([b[12], b[13]]),
			green: u16::from_le_bytes([b[14], b[15]]),
			blue: u16::from_le_bytes([b[16], b[17]]),
			white: u16::from_le_bytes([b[18], b[19]]),
		})
	}

	pub fn to_bytes(&self) -> [u8; SAMPLE_SIZE] {
		let mut b = [0u8; SAMPLE_SIZE];
		b[0..4].copy_from_slice(&self.temperature.to_le_bytes());
		b[4..8].copy_from_slice(&self.pressure.to_le_bytes());
		let channels = [
			self.ambient_light,
			self.white_light,
			self.red,
			self.green,
			self.blue,
			self.white,
		];
		for (i, c) in channels.iter().enumerate() {
			let pos = 8 + 2 * i;
			b[pos..pos + 2].copy_from_slice(&c.to_le_bytes());
		}
		b
	}
}
