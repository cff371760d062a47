use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ReadError;
use crate::protocol::channel::FramedChannel;
use crate::protocol::commands::Command;
use crate::protocol::transport::Transport;
use crate::types::is_erased;

/// Consecutive inclusive ranges of at most `chunk_size` bytes covering
/// `begin..=end`; the last one may be shorter.
pub fn split_range(begin: usize, end: usize, chunk_size: usize) -> Vec<(usize, usize)> {
	if end < begin || chunk_size == 0 {
		return Vec::new();
	}
	(begin..=end)
		.step_by(chunk_size)
		.map(|start| (start, (start + chunk_size - 1).min(end)))
		.collect()
}

#[derive(Debug)]
pub struct Chunk {
	pub begin: usize,
	pub end: usize,
	pub data: Vec<u8>,
}

/// Why a bulk read stopped yielding chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
	InProgress,
	Completed,
	/// The chunk starting here was entirely erased.
	ReachedEmpty { at: usize },
	Cancelled { at: usize },
	Failed { at: usize },
}

/// Lazy, single-pass chunked read of a flash address range.
pub struct BulkReader<'a, T: Transport> {
	channel: &'a mut FramedChannel<T>,
	plan: std::vec::IntoIter<(usize, usize)>,
	stop_on_empty: bool,
	cancel: Option<Arc<AtomicBool>>,
	outcome: ReadOutcome,
}

pub fn read_range<T: Transport>(
	channel: &mut FramedChannel<T>,
	begin: usize,
	end: usize,
	chunk_size: usize,
) -> BulkReader<'_, T> {
	BulkReader {
		channel,
		plan: split_range(begin, end, chunk_size).into_iter(),
		stop_on_empty: true,
		cancel: None,
		outcome: ReadOutcome::InProgress,
	}
}

impl<'a, T: Transport> BulkReader<'a, T> {
	/// Read the whole range even past erased chunks.
	pub fn stop_on_empty(mut self, stop: bool) -> Self {
		self.stop_on_empty = stop;
		self
	}

	/// Stop before the next chunk once `flag` is raised.
	pub fn cancel_on(mut self, flag: Arc<AtomicBool>) -> Self {
		self.cancel = Some(flag);
		self
	}

	pub fn outcome(&self) -> ReadOutcome {
		self.outcome
	}
}

impl<T: Transport> Iterator for BulkReader<'_, T> {
	type Item = Result<Chunk, ReadError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.outcome != ReadOutcome::InProgress {
			return None;
		}
		let Some((begin, end)) = self.plan.next() else {
			self.outcome = ReadOutcome::Completed;
			return None;
		};
		if self
			.cancel
			.as_ref()
			.is_some_and(|flag| flag.load(Ordering::SeqCst))
		{
			log::info!("read cancelled before {begin:#08x}");
			self.outcome = ReadOutcome::Cancelled { at: begin };
			return None;
		}
		log::debug!("reading {begin:#08x}..={end:#08x}");
		let data = match self
			.channel
			.send_and_receive(&Command::read_range(begin, end), end - begin + 1)
		{
			Ok(data) => data,
			Err(source) => {
				self.outcome = ReadOutcome::Failed { at: begin };
				return Some(Err(ReadError::Chunk { begin, end, source }));
			}
		};
		if self.stop_on_empty && is_erased(&data) {
			log::info!("reached erased memory at {begin:#08x}");
			self.outcome = ReadOutcome::ReachedEmpty { at: begin };
			return None;
		}
		Some(Ok(Chunk { begin, end, data }))
	}
}

impl<T: Transport> std::iter::FusedIterator for BulkReader<'_, T> {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::consts::PAGE_SIZE;
	use crate::protocol::channel::ChannelConfig;
	use crate::protocol::retry::RetryPolicy;
	use crate::sim::{paged_image, Fault, SimulatedLogger};
	use std::time::Duration;

	fn channel(image: Vec<u8>) -> FramedChannel<SimulatedLogger> {
		FramedChannel::new(
			SimulatedLogger::new(image),
			ChannelConfig {
				retry: RetryPolicy::fixed(3, Duration::ZERO),
			},
		)
	}

	#[test]
	fn split_range_covers_range_exactly() {
		assert_eq!(split_range(0, 9, 4), [(0, 3), (4, 7), (8, 9)]);
		assert_eq!(split_range(0, 255, 256), [(0, 255)]);
		assert_eq!(split_range(16, 16, 4), [(16, 16)]);
		assert!(split_range(5, 4, 4).is_empty());
	}

	#[test]
	fn stops_before_requesting_past_empty_page() {
		let image = paged_image(24, 3);
		let mut ch = channel(image.clone());
		let mut reader = read_range(&mut ch, 0, 3 * PAGE_SIZE - 1, PAGE_SIZE);
		let chunks: Vec<Chunk> = reader.by_ref().map(Result::unwrap).collect();
		assert_eq!(reader.outcome(), ReadOutcome::ReachedEmpty { at: 512 });

		let bytes: Vec<u8> = chunks.iter().flat_map(|c| c.data.clone()).collect();
		assert_eq!(bytes, image[..2 * PAGE_SIZE]);
		assert_eq!(ch.transport().range_reads(), &[(0, 255), (256, 511), (512, 767)]);
	}

	#[test]
	fn stops_at_first_empty_chunk_of_a_larger_range() {
		let image = paged_image(24, 64);
		let mut ch = channel(image);
		let reader = read_range(&mut ch, 0, 64 * PAGE_SIZE - 1, 4 * PAGE_SIZE);
		assert_eq!(reader.count(), 1);
		// chunk 0 holds the data, chunk 1 is erased, nothing after it is requested
		assert_eq!(ch.transport().range_reads().len(), 2);
	}

	#[test]
	fn reads_full_range_without_early_stop() {
		let mut ch = channel(paged_image(24, 3));
		let chunks: Vec<_> = read_range(&mut ch, 0, 3 * PAGE_SIZE - 1, PAGE_SIZE)
			.stop_on_empty(false)
			.collect::<Result<_, _>>()
			.unwrap();
		assert_eq!(chunks.len(), 3);
		assert_eq!(chunks[2].begin, 512);
		assert_eq!(chunks[2].end, 767);
	}

	#[test]
	fn final_chunk_may_be_short() {
		let mut ch = channel(vec![0u8; 1000]);
		let chunks: Vec<_> = read_range(&mut ch, 0, 999, 256)
			.map(Result::unwrap)
			.collect();
		assert_eq!(chunks.len(), 4);
		assert_eq!(chunks[3].data.len(), 1000 - 768);
	}

	#[test]
	fn failed_chunk_ends_the_read() {
		let mut ch = channel(vec![0u8; 4 * PAGE_SIZE]);
		for _ in 0..3 {
			ch.transport_mut().inject(Fault::Silence);
		}
		let mut reader = read_range(&mut ch, 0, 4 * PAGE_SIZE - 1, PAGE_SIZE);
		let first = reader.next().unwrap();
		match first {
			Err(ReadError::Chunk { begin, end, .. }) => assert_eq!((begin, end), (0, 255)),
			Ok(_) => panic!("expected failure"),
		}
		assert!(reader.next().is_none());
		assert_eq!(reader.outcome(), ReadOutcome::Failed { at: 0 });
	}

	#[test]
	fn cancellation_never_yields_partial_chunks() {
		let flag = Arc::new(AtomicBool::new(false));
		let mut ch = channel(vec![0u8; 8 * PAGE_SIZE]);
		ch.transport_mut().cancel_after(2, flag.clone());
		let mut reader = read_range(&mut ch, 0, 8 * PAGE_SIZE - 1, PAGE_SIZE).cancel_on(flag);
		let chunks: Vec<Chunk> = reader.by_ref().map(Result::unwrap).collect();
		assert_eq!(chunks.len(), 2);
		assert!(chunks.iter().all(|c| c.data.len() == PAGE_SIZE));
		assert_eq!(reader.outcome(), ReadOutcome::Cancelled { at: 512 });
	}
}
