use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::decode::{decode, RecordLayout};
use crate::time::TimeReconstructor;
use crate::types::{Sample, SessionMetadata};

pub const CSV_HEADER: &str = "UTC_datetime,posix_timestamp,T_DegC,P_kPa,ambient_light_hdr,white_light_hdr,red,green,blue,white";

/// Where one session's files live: `<data>/<flash_id>/<flash_id>_<start>.*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFiles {
	pub dir: PathBuf,
	pub bin: PathBuf,
	pub csv: PathBuf,
	pub config: PathBuf,
}

impl SessionFiles {
	pub fn new(data_dir: &Path, meta: &SessionMetadata) -> Self {
		let dir = data_dir.join(&meta.flash_id);
		let stem = meta.session_name();
		Self {
			bin: dir.join(format!("{stem}.bin")),
			csv: dir.join(format!("{stem}.csv")),
			config: dir.join(format!("{stem}.config")),
			dir,
		}
	}

	/// Files next to an existing dump.
	pub fn from_bin(bin: &Path) -> Self {
		Self {
			dir: bin.parent().map(Path::to_path_buf).unwrap_or_default(),
			bin: bin.to_path_buf(),
			csv: bin.with_extension("csv"),
			config: bin.with_extension("config"),
		}
	}
}

pub fn load_metadata(path: &Path) -> Result<Option<SessionMetadata>> {
	if !path.exists() {
		return Ok(None);
	}
	let text = std::fs::read_to_string(path)
		.with_context(|| format!("reading {}", path.display()))?;
	let meta = serde_json::from_str(&text)
		.with_context(|| format!("parsing {}", path.display()))?;
	Ok(Some(meta))
}

pub fn save_metadata(path: &Path, meta: &SessionMetadata) -> Result<()> {
	let json = serde_json::to_string(meta)?;
	std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
	Ok(())
}

/// Writes one CSV row per sample, in index order, with reconstructed time.
pub struct CsvWriter<W: Write> {
	out: W,
	time: TimeReconstructor,
	index: u64,
	rows: u64,
}

impl<W: Write> CsvWriter<W> {
	/// `first_index` is the session index of the first sample written.
	pub fn new(mut out: W, time: TimeReconstructor, first_index: u64) -> Result<Self> {
		writeln!(out, "{CSV_HEADER}")?;
		Ok(Self {
			out,
			time,
			index: first_index,
			rows: 0,
		})
	}

	pub fn write_sample(&mut self, s: &Sample) -> Result<()> {
		let datetime = self
			.time
			.datetime(self.index)
			.with_context(|| format!("sample {} is outside the representable time range", self.index))?;
		writeln!(
			self.out,
			"{},{},{},{},{},{},{},{},{},{}",
			datetime.format("%Y-%m-%d %H:%M:%S%.3f"),
			self.time.seconds(self.index),
			s.temperature,
			s.pressure,
			s.ambient_light,
			s.white_light,
			s.red,
			s.green,
			s.blue,
			s.white,
		)?;
		self.index += 1;
		self.rows += 1;
		Ok(())
	}

	pub fn rows(&self) -> u64 {
		self.rows
	}

	/// Pushes complete rows to the underlying writer.
	pub fn flush(&mut self) -> Result<()> {
		self.out.flush()?;
		Ok(())
	}

	pub fn finish(mut self) -> Result<W> {
		self.out.flush()?;
		Ok(self.out)
	}
}

pub fn create_csv(path: &Path, meta: &SessionMetadata) -> Result<CsvWriter<BufWriter<File>>> {
	let time = TimeReconstructor::new(meta.logging_start_time, meta.logging_interval_code)?;
	let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
	CsvWriter::new(BufWriter::new(file), time, meta.first_sample_index)
}

/// Converts a flash dump into CSV. Returns the number of samples written.
pub fn bin_to_csv(bin: &Path, csv: &Path, meta: &SessionMetadata, layout: RecordLayout) -> Result<u64> {
	let bytes = std::fs::read(bin).with_context(|| format!("reading {}", bin.display()))?;
	let mut writer = create_csv(csv, meta)?;
	for sample in decode(&bytes, layout) {
		writer.write_sample(&sample)?;
	}
	let rows = writer.rows();
	writer.finish()?;
	Ok(rows)
}
