//! Bulk read on a worker thread, decode on the caller's thread

use anyhow::{anyhow, bail, Context, Result};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::Arc;

use crate::consts::{CHUNK_SIZE, FLASH_SIZE, PIPELINE_DEPTH};
use crate::decode::{RecordLayout, StreamDecoder};
use crate::flash::{read_range, ReadOutcome};
use crate::output::{self, SessionFiles};
use crate::protocol::channel::FramedChannel;
use crate::protocol::transport::Transport;
use crate::types::{Sample, SessionMetadata};

#[derive(Debug, Clone)]
pub struct RetrieveOptions {
	pub begin: usize,
	/// Inclusive.
	pub end: usize,
	pub chunk_size: usize,
	pub stop_on_empty: bool,
	pub layout: RecordLayout,
	pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for RetrieveOptions {
	fn default() -> Self {
		Self {
			begin: 0,
			end: FLASH_SIZE - 1,
			chunk_size: CHUNK_SIZE,
			stop_on_empty: true,
			layout: RecordLayout::default(),
			cancel: None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieveSummary {
	pub bytes: usize,
	pub samples: usize,
	pub outcome: ReadOutcome,
}

/// Streams `opts.begin..=opts.end` into `bin` and hands decoded samples to
/// `on_samples` in index order as chunks arrive.
///
/// Chunks reach `bin` whole and in address order. On a chunk failure the
/// chunks before it stay written and the error is returned.
pub fn retrieve<T, W, F>(
	channel: &mut FramedChannel<T>,
	opts: &RetrieveOptions,
	bin: &mut W,
	mut on_samples: F,
	progress: &ProgressBar,
) -> Result<RetrieveSummary>
where
	T: Transport,
	W: Write,
	F: FnMut(&[Sample]) -> Result<()>,
{
	let mut decoder = StreamDecoder::new(opts.layout);
	let mut bytes = 0;

	let (outcome, result) = std::thread::scope(|s| {
		let (tx, rx) = mpsc::sync_channel(PIPELINE_DEPTH);
		let worker = s.spawn(move || {
			let mut reader = read_range(channel, opts.begin, opts.end, opts.chunk_size)
				.stop_on_empty(opts.stop_on_empty);
			if let Some(flag) = &opts.cancel {
				reader = reader.cancel_on(flag.clone());
			}
			for item in reader.by_ref() {
				if tx.send(item).is_err() {
					break;
				}
			}
			reader.outcome()
		});

		let mut consume = || -> Result<()> {
			for item in rx.iter() {
				let chunk = item?;
				bin.write_all(&chunk.data)
					.with_context(|| format!("writing chunk {:#08x}..={:#08x}", chunk.begin, chunk.end))?;
				bytes += chunk.data.len();
				progress.set_position((chunk.end + 1 - opts.begin) as u64);
				let samples = decoder.push(&chunk.data);
				if !samples.is_empty() {
					on_samples(&samples)?;
				}
			}
			Ok(())
		};
		let result = consume();
		// a consumer error hangs up the channel, which stops the worker
		drop(rx);
		let outcome = worker
			.join()
			.map_err(|_| anyhow!("bulk reader thread panicked"));
		(outcome, result)
	});

	bin.flush()?;
	result?;
	let outcome = outcome?;
	let decoded = decoder.decoded();
	let tail = decoder.finish();
	if !tail.is_empty() {
		on_samples(&tail)?;
	}
	Ok(RetrieveSummary {
		bytes,
		samples: decoded + tail.len(),
		outcome,
	})
}

/// Reads one session into `files`: `.config` first, then the `.bin` dump
/// and its CSV side by side.
///
/// `opts.begin` must start a page (or a record for `Packed`) so the first
/// sample gets its session index. The `.config` is on disk before the first
/// chunk is requested, and every verified chunk reaches the `.bin` before
/// the next one is handled, so a run that fails part way still leaves a dump
/// that `bin_to_csv` can timestamp.
pub fn dump_session<T: Transport>(
	channel: &mut FramedChannel<T>,
	opts: &RetrieveOptions,
	files: &SessionFiles,
	meta: &mut SessionMetadata,
	progress: &ProgressBar,
) -> Result<RetrieveSummary> {
	let Some(first) = opts.layout.index_at(opts.begin) else {
		bail!("begin address {:#x} does not start a record page", opts.begin);
	};
	meta.first_sample_index = first;

	std::fs::create_dir_all(&files.dir)
		.with_context(|| format!("creating {}", files.dir.display()))?;
	output::save_metadata(&files.config, meta)?;
	let mut bin = File::create(&files.bin).with_context(|| format!("creating {}", files.bin.display()))?;
	let mut csv = output::create_csv(&files.csv, meta)?;

	let summary = retrieve(
		channel,
		opts,
		&mut bin,
		|samples| {
			for s in samples {
				csv.write_sample(s)?;
			}
			csv.flush()
		},
		progress,
	)
	.with_context(|| {
		format!("retrieval aborted, {} holds the chunks read so far", files.bin.display())
	})?;
	csv.finish()?;
	Ok(summary)
}
