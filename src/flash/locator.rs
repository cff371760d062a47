use crate::decode::{decode, RecordLayout};
use crate::error::ChannelError;
use crate::protocol::channel::FramedChannel;
use crate::protocol::commands::Command;
use crate::protocol::transport::Transport;
use crate::types::{is_erased, FlashGeometry};

/// Finds how far the current session has written into flash.
pub struct FlashLocator<'a, T: Transport> {
	channel: &'a mut FramedChannel<T>,
	geometry: FlashGeometry,
	page_reads: usize,
}

impl<'a, T: Transport> FlashLocator<'a, T> {
	pub fn new(channel: &'a mut FramedChannel<T>, geometry: FlashGeometry) -> Self {
		Self {
			channel,
			geometry,
			page_reads: 0,
		}
	}

	/// Page reads issued so far.
	pub fn page_reads(&self) -> usize {
		self.page_reads
	}

	fn read_page(&mut self, page: usize) -> Result<Vec<u8>, ChannelError> {
		let (begin, end) = self.geometry.page_range(page);
		self.page_reads += 1;
		self.channel
			.send_and_receive(&Command::read_range(begin, end), self.geometry.page_size)
	}

	fn page_is_empty(&mut self, page: usize) -> Result<bool, ChannelError> {
		let empty = is_erased(&self.read_page(page)?);
		log::debug!("page {page}: {}", if empty { "empty" } else { "written" });
		Ok(empty)
	}

	/// Index of the last written page, or `None` if page 0 is empty.
	///
	/// Precondition: the logger fills pages in ascending order, so every page
	/// below a written page is written too. The search relies on this and
	/// does not check it; on an image that breaks it the result is
	/// meaningless.
	///
	/// Any failed page read aborts the search.
	pub fn find_write_frontier(&mut self) -> Result<Option<usize>, ChannelError> {
		if self.page_is_empty(0)? {
			return Ok(None);
		}
		// page `begin` is written; every page at or past `end` is empty
		let mut begin = 0;
		let mut end = self.geometry.page_count();
		while end - begin > 1 {
			let mid = begin + (end - begin) / 2;
			if self.page_is_empty(mid)? {
				end = mid;
			} else {
				begin = mid;
			}
		}
		log::info!("write frontier at page {begin} after {} page reads", self.page_reads);
		Ok(Some(begin))
	}

	/// Number of samples recorded in the current session.
	pub fn sample_count(&mut self) -> Result<usize, ChannelError> {
		let Some(last) = self.find_write_frontier()? else {
			return Ok(0);
		};
		let page = self.read_page(last)?;
		let layout = RecordLayout::Paged {
			page_size: self.geometry.page_size,
		};
		let in_last = decode(&page, layout).count();
		Ok(last * self.geometry.samples_per_page() + in_last)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::consts::PAGE_SIZE;
	use crate::protocol::channel::ChannelConfig;
	use crate::protocol::retry::RetryPolicy;
	use crate::sim::{paged_image, Fault, SimulatedLogger};
	use std::time::Duration;

	const PAGES: usize = 1024;

	fn geometry() -> FlashGeometry {
		FlashGeometry {
			size: PAGES * PAGE_SIZE,
			page_size: PAGE_SIZE,
		}
	}

	fn channel(image: Vec<u8>) -> FramedChannel<SimulatedLogger> {
		FramedChannel::new(
			SimulatedLogger::new(image),
			ChannelConfig {
				retry: RetryPolicy::fixed(2, Duration::ZERO),
			},
		)
	}

	fn image_with_pages_written(written: usize) -> Vec<u8> {
		let mut image = vec![0xFF; PAGES * PAGE_SIZE];
		for b in &mut image[..written * PAGE_SIZE] {
			*b = 0x00;
		}
		image
	}

	#[test]
	fn empty_flash_has_no_frontier() {
		let mut ch = channel(image_with_pages_written(0));
		let mut locator = FlashLocator::new(&mut ch, geometry());
		assert_eq!(locator.find_write_frontier().unwrap(), None);
		assert_eq!(locator.page_reads(), 1);
	}

	#[test]
	fn finds_last_written_page_in_logarithmic_reads() {
		let bound = (PAGES as f64).log2().ceil() as usize + 1;
		for k in [0, 1, 2, 11, 511, 512, 513, 1000, PAGES - 2, PAGES - 1] {
			let mut ch = channel(image_with_pages_written(k + 1));
			let mut locator = FlashLocator::new(&mut ch, geometry());
			assert_eq!(locator.find_write_frontier().unwrap(), Some(k), "k = {k}");
			assert!(locator.page_reads() <= bound, "k = {k}: {} reads", locator.page_reads());
		}
	}

	#[test]
	fn sample_count_includes_partial_last_page() {
		let mut ch = channel(paged_image(12 * 5 + 7, PAGES));
		let mut locator = FlashLocator::new(&mut ch, geometry());
		assert_eq!(locator.sample_count().unwrap(), 67);

		let mut ch = channel(paged_image(0, PAGES));
		assert_eq!(FlashLocator::new(&mut ch, geometry()).sample_count().unwrap(), 0);
	}

	#[test]
	fn failed_probe_aborts_search() {
		let mut ch = channel(image_with_pages_written(10));
		for _ in 0..2 {
			ch.transport_mut().inject(Fault::Silence);
		}
		let mut locator = FlashLocator::new(&mut ch, geometry());
		assert!(matches!(
			locator.find_write_frontier(),
			Err(ChannelError::Unresponsive { .. })
		));
	}
}
