use crate::consts::{ERASED_BYTE, FLASH_SIZE, PAGE_SIZE, SAMPLE_SIZE};

/// Size and page layout of the logger's NOR flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
	pub size: usize,
	pub page_size: usize,
}

impl Default for FlashGeometry {
	fn default() -> Self {
		Self {
			size: FLASH_SIZE,
			page_size: PAGE_SIZE,
		}
	}
}

impl FlashGeometry {
	pub fn page_count(&self) -> usize {
		self.size / self.page_size
	}

	pub fn samples_per_page(&self) -> usize {
		self.page_size / SAMPLE_SIZE
	}

	/// Inclusive byte range of `page`.
	pub fn page_range(&self, page: usize) -> (usize, usize) {
		let begin = page * self.page_size;
		(begin, begin + self.page_size - 1)
	}
}

pub fn is_erased(data: &[u8]) -> bool {
	data.iter().all(|&b| b == ERASED_BYTE)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reference_device_layout() {
		let g = FlashGeometry::default();
		assert_eq!(g.page_count(), 65536);
		assert_eq!(g.samples_per_page(), 12);
		assert_eq!(g.page_range(2), (512, 767));
	}

	#[test]
	fn erased_detection() {
		assert!(is_erased(&[0xFF; 16]));
		assert!(!is_erased(&[0xFF, 0xFE, 0xFF]));
	}
}
