//! In-memory logger that answers the firmware's commands from a flash image

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::consts::{CMD_READ_PAGE, CMD_READ_RANGE, ERASED_BYTE, PAGE_SIZE, SAMPLES_PER_PAGE};
use crate::error::ChannelError;
use crate::protocol::transport::Transport;
use crate::types::{ChecksumOrder, Frame, Sample};

pub const FLASH_ID: &str = "E46A1234ABCD5678";

/// Corruption applied to the next response.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
	/// Leave the response alone.
	Pass,
	FlipBit { byte: usize, bit: u8 },
	Truncate(usize),
	Silence,
	Garble,
}

pub struct SimulatedLogger {
	image: Vec<u8>,
	pub status: String,
	pub config: String,
	pub name: Vec<u8>,
	pub volts: String,
	pending: VecDeque<u8>,
	faults: VecDeque<Fault>,
	range_reads: Vec<(usize, usize)>,
	clears: usize,
	cancel: Option<(usize, Arc<AtomicBool>)>,
}

impl SimulatedLogger {
	pub fn new(image: Vec<u8>) -> Self {
		Self {
			image,
			status: "0,0,0".into(),
			config: "1000,2000,1,0,0".into(),
			name: b"dock".to_vec(),
			volts: "2900,3.21".into(),
			pending: VecDeque::new(),
			faults: VecDeque::new(),
			range_reads: Vec::new(),
			clears: 0,
			cancel: None,
		}
	}

	pub fn inject(&mut self, fault: Fault) {
		self.faults.push_back(fault);
	}

	pub fn push_stale(&mut self, bytes: &[u8]) {
		self.pending.extend(bytes);
	}

	/// Raises `flag` once `reads` range reads have been served.
	pub fn cancel_after(&mut self, reads: usize, flag: Arc<AtomicBool>) {
		self.cancel = Some((reads, flag));
	}

	pub fn range_reads(&self) -> &[(usize, usize)] {
		&self.range_reads
	}

	pub fn clears(&self) -> usize {
		self.clears
	}

	fn respond(&mut self, cmd: &[u8]) {
		let cmd = String::from_utf8_lossy(cmd).into_owned();
		let mut reply = if let Some(args) = cmd.strip_prefix(CMD_READ_RANGE) {
			self.read(args, ChecksumOrder::Little)
		} else if let Some(args) = cmd.strip_prefix(CMD_READ_PAGE) {
			self.read(args, ChecksumOrder::Big)
		} else {
			let text = match cmd.as_str() {
				"is_logging" => self.status.clone().into_bytes(),
				"get_logging_config" => self.config.clone().into_bytes(),
				"spi_flash_get_unique_id" => FLASH_ID.as_bytes().to_vec(),
				"get_logger_name" => self.name.clone(),
				"read_sys_volt" => self.volts.clone().into_bytes(),
				_ => return,
			};
			let mut line = text;
			line.extend_from_slice(b"\r\n");
			line
		};
		match self.faults.pop_front() {
			Some(Fault::FlipBit { byte, bit }) => reply[byte] ^= 1 << bit,
			Some(Fault::Truncate(n)) => reply.truncate(n),
			Some(Fault::Silence) => reply.clear(),
			Some(Fault::Garble) => reply = b"\x00\x17garbage\r\n".to_vec(),
			Some(Fault::Pass) | None => {}
		}
		self.pending.extend(reply);
	}

	fn read(&mut self, args: &str, order: ChecksumOrder) -> Vec<u8> {
		let mut parts = args.trim().split(',');
		let mut next = || usize::from_str_radix(parts.next().unwrap_or(""), 16).unwrap_or(0);
		let (begin, end) = (next(), next());
		self.range_reads.push((begin, end));
		if let Some((after, flag)) = &self.cancel {
			if self.range_reads.len() >= *after {
				flag.store(true, Ordering::SeqCst);
			}
		}
		let payload: Vec<u8> = (begin..=end)
			.map(|i| self.image.get(i).copied().unwrap_or(ERASED_BYTE))
			.collect();
		Frame::encode(&payload, order)
	}
}

impl Transport for SimulatedLogger {
	fn write_all(&mut self, data: &[u8]) -> Result<(), ChannelError> {
		self.respond(data);
		Ok(())
	}

	fn read(&mut self, buf: &mut [u8]) -> Result<usize, ChannelError> {
		let n = buf.len().min(self.pending.len());
		for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
			*dst = src;
		}
		Ok(n)
	}

	fn clear(&mut self) -> Result<(), ChannelError> {
		self.clears += 1;
		self.pending.clear();
		Ok(())
	}
}

pub fn sample(i: usize) -> Sample {
	Sample {
		temperature: 20.0 + i as f32 * 0.25,
		pressure: 101.0 + i as f32 * 0.01,
		ambient_light: i as u16,
		white_light: (i * 2) as u16,
		red: (i * 3) as u16,
		green: (i * 4) as u16,
		blue: (i * 5) as u16,
		white: (i * 6) as u16,
	}
}

/// Flash image holding `count` ascending samples laid out as the firmware
/// writes them, padded with erased bytes to `pages` pages.
pub fn paged_image(count: usize, pages: usize) -> Vec<u8> {
	let mut image = vec![ERASED_BYTE; pages * PAGE_SIZE];
	for i in 0..count {
		let page = i / SAMPLES_PER_PAGE;
		let offset = page * PAGE_SIZE + (i % SAMPLES_PER_PAGE) * crate::consts::SAMPLE_SIZE;
		image[offset..offset + crate::consts::SAMPLE_SIZE].copy_from_slice(&sample(i).to_bytes());
	}
	image
}
