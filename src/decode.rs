//! Turning raw flash bytes into samples

use std::iter::FusedIterator;

use crate::consts::{PAGE_SIZE, SAMPLE_SIZE};
use crate::types::Sample;

/// How records are placed in the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
	/// Back-to-back records.
	Packed,
	/// `page_size / SAMPLE_SIZE` records at the start of each page, the rest
	/// of the page is padding. This is how the firmware writes flash.
	Paged { page_size: usize },
}

impl Default for RecordLayout {
	fn default() -> Self {
		RecordLayout::Paged {
			page_size: PAGE_SIZE,
		}
	}
}

impl RecordLayout {
	fn records_per_page(self) -> usize {
		match self {
			RecordLayout::Packed => 1,
			RecordLayout::Paged { page_size } => page_size / SAMPLE_SIZE,
		}
	}

	fn stride(self) -> usize {
		match self {
			RecordLayout::Packed => SAMPLE_SIZE,
			RecordLayout::Paged { page_size } => page_size,
		}
	}

	/// Index of the record starting at byte `offset`, `None` if `offset` is
	/// not on a page boundary (`Paged`) or a record boundary (`Packed`).
	pub fn index_at(self, offset: usize) -> Option<u64> {
		let stride = self.stride();
		if stride == 0 || offset % stride != 0 {
			return None;
		}
		Some((offset / stride * self.records_per_page()) as u64)
	}

	fn offset(self, index: usize) -> usize {
		let per_page = self.records_per_page();
		(index / per_page) * self.stride() + (index % per_page) * SAMPLE_SIZE
	}
}

/// Lazy decoder over a byte buffer.
///
/// Ends at the first record whose temperature or pressure is NaN (the erased
/// or half-written tail of the session), or when fewer than `SAMPLE_SIZE`
/// bytes remain. Values are not range-checked.
pub struct Samples<'a> {
	bytes: &'a [u8],
	layout: RecordLayout,
	index: usize,
	done: bool,
}

pub fn decode(bytes: &[u8], layout: RecordLayout) -> Samples<'_> {
	Samples {
		bytes,
		layout,
		index: 0,
		done: layout.records_per_page() == 0,
	}
}

/// Starts decoding at a page boundary. Page `n` of a `Packed` buffer is
/// record `n`.
pub fn from_page(bytes: &[u8], layout: RecordLayout, page: usize) -> Samples<'_> {
	let start = (page * layout.stride()).min(bytes.len());
	decode(&bytes[start..], layout)
}

impl Iterator for Samples<'_> {
	type Item = Sample;

	fn next(&mut self) -> Option<Sample> {
		if self.done {
			return None;
		}
		let offset = self.layout.offset(self.index);
		let record = self
			.bytes
			.get(offset..offset + SAMPLE_SIZE)
			.and_then(|r| <&[u8; SAMPLE_SIZE]>::try_from(r).ok())
			.and_then(Sample::from_bytes);
		match record {
			Some(sample) => {
				self.index += 1;
				Some(sample)
			}
			None => {
				self.done = true;
				None
			}
		}
	}
}

impl FusedIterator for Samples<'_> {}

/// Incremental decoder fed chunk by chunk. Produces the same samples as
/// [`decode`] over the concatenated chunks.
pub struct StreamDecoder {
	layout: RecordLayout,
	carry: Vec<u8>,
	done: bool,
	decoded: usize,
}

impl StreamDecoder {
	pub fn new(layout: RecordLayout) -> Self {
		Self {
			layout,
			carry: Vec::new(),
			done: layout.records_per_page() == 0,
			decoded: 0,
		}
	}

	pub fn is_done(&self) -> bool {
		self.done
	}

	/// Samples decoded so far; also the index of the next one.
	pub fn decoded(&self) -> usize {
		self.decoded
	}

	/// Feeds `chunk` and returns the samples completed by it.
	pub fn push(&mut self, chunk: &[u8]) -> Vec<Sample> {
		if self.done {
			return Vec::new();
		}
		self.carry.extend_from_slice(chunk);
		let stride = self.layout.stride();
		let whole = self.carry.len() / stride * stride;
		let out = self.drain(whole);
		self.carry.drain(..whole);
		out
	}

	/// Decodes whatever partial page is left.
	pub fn finish(mut self) -> Vec<Sample> {
		if self.done {
			return Vec::new();
		}
		let len = self.carry.len();
		self.drain(len)
	}

	fn drain(&mut self, len: usize) -> Vec<Sample> {
		let out: Vec<Sample> = decode(&self.carry[..len], self.layout).collect();
		// a full page that ran to its last slot without a marker does not end the stream
		let per_page = self.layout.records_per_page();
		if out.len() < len / self.layout.stride() * per_page {
			self.done = true;
		}
		self.decoded += out.len();
		out
	}
}
