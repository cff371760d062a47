mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serialport::{SerialPort, SerialPortType};
use std::path::Path;
use std::time::{Duration, Instant};

use cli::{Cli, Commands, ReadArgs};
use meshlog::consts::*;
use meshlog::decode::RecordLayout;
use meshlog::device::{self, Logger, PortConfig};
use meshlog::flash::ReadOutcome;
use meshlog::output::{self, SessionFiles};
use meshlog::pipeline::{self, RetrieveOptions};
use meshlog::protocol::retry::RetryPolicy;
use meshlog::settings::Settings;
use meshlog::time::{interval_ms, TimeReconstructor};
use meshlog::types::SessionMetadata;

fn main() -> Result<()> {
	let cli = Cli::parse();
	init_logging(cli.verbose);

	match &cli.command {
		Commands::Info => cmd_info(&mut connect(&cli)?),
		Commands::Count => cmd_count(&mut connect(&cli)?),
		Commands::Read(args) => cmd_read(&mut connect(&cli)?, args),
		Commands::Convert { bin, packed } => cmd_convert(bin, *packed),
		Commands::Ports => cmd_ports(),
	}
}

fn init_logging(verbose: u8) {
	let level = match verbose {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Opens the logger on `--port`, the last used port, or a detected one, and
/// remembers the port that worked.
fn connect(cli: &Cli) -> Result<Logger<Box<dyn SerialPort>>> {
	let settings_path = cli.settings.clone().unwrap_or_else(Settings::default_path);
	let mut settings = Settings::load(&settings_path);

	let path = match &cli.port {
		Some(p) => p.clone(),
		None => device::detect_port(settings.serial_port.as_deref())?,
	};
	let mut port = PortConfig::new(&path);
	port.timeout = Duration::from_millis(cli.timeout_ms);
	let retry = if cli.jitter {
		RetryPolicy::jittered(cli.retries, RETRY_BACKOFF)
	} else {
		RetryPolicy::fixed(cli.retries, RETRY_BACKOFF)
	};
	let logger = Logger::open(&port, retry)?;

	if settings.serial_port.as_deref() != Some(path.as_str()) {
		settings.serial_port = Some(path);
		if let Err(e) = settings.save(&settings_path) {
			log::warn!("could not remember port: {e:#}");
		}
	}
	Ok(logger)
}

fn spinner(msg: &str) -> Result<ProgressBar> {
	let spinner = ProgressBar::new_spinner();
	spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
	spinner.set_message(msg.to_string());
	spinner.enable_steady_tick(Duration::from_millis(100));
	Ok(spinner)
}

fn cmd_info(logger: &mut Logger<Box<dyn SerialPort>>) -> Result<()> {
	let meta = logger.metadata()?;
	let status = logger.logging_status()?;
	let volts = logger.battery_voltage()?;

	println!("MESH Lab logger");
	println!("{meta}");
	println!(
		"Logging:        {}",
		if status.running { "running" } else { "stopped" }
	);
	println!("Write index:    page {} byte {}", status.current_page, status.byte_index);
	println!("Battery:        {volts:.2} V");
	if !meta.stopped_normally() && !status.running {
		println!("Note: no stop time recorded, the session may have ended abnormally");
	}
	Ok(())
}

fn cmd_count(logger: &mut Logger<Box<dyn SerialPort>>) -> Result<()> {
	let config = logger.logging_config()?;
	let geometry = logger.geometry;
	if logger.probably_empty()? {
		println!("Samples:        0");
		return Ok(());
	}

	let spinner = spinner("Searching for the end of recorded data...")?;
	let mut locator = logger.locator();
	let count = locator.sample_count();
	let page_reads = locator.page_reads();
	spinner.finish_and_clear();
	let count = count.context("frontier search failed")?;

	println!("Samples:        {count}");
	println!("Pages used:     {}", count.div_ceil(geometry.samples_per_page()));
	println!("Page reads:     {page_reads}");
	if count > 0 {
		let time = TimeReconstructor::new(config.logging_start_time, config.logging_interval_code)?;
		if let Some(last) = time.datetime(count as u64 - 1) {
			println!("Last sample:    {}", last.format("%Y-%m-%d %H:%M:%S%.3f UTC"));
		}
	}
	Ok(())
}

fn cmd_read(logger: &mut Logger<Box<dyn SerialPort>>, args: &ReadArgs) -> Result<()> {
	if logger.logging_status()?.running {
		bail!("logger is still logging; stop the session before reading it");
	}
	if args.begin.is_none() && logger.probably_empty()? {
		println!("Logger is empty, nothing to read.");
		return Ok(());
	}
	let flash_id = logger.flash_id()?;
	let name = logger.logger_name()?;
	let config = logger.logging_config()?;

	let fresh = SessionMetadata::new(&flash_id, &name, &config);
	let files = SessionFiles::new(&args.data, &fresh);
	let mut meta = match output::load_metadata(&files.config)? {
		Some(mut existing) => {
			existing.update_from(&flash_id, &name, &config);
			existing
		}
		None => fresh,
	};
	if files.bin.exists() && !args.force {
		bail!("{} already exists (use --force to overwrite)", files.bin.display());
	}
	if !meta.stopped_normally() {
		log::warn!("no stop time recorded, the session may have ended abnormally");
	}

	let geometry = logger.geometry;
	let begin = args.begin.unwrap_or(0);
	let mut end = args.end.unwrap_or(geometry.size - 1);
	if args.scan {
		let spinner = spinner("Searching for the end of recorded data...")?;
		let frontier = logger.locator().find_write_frontier();
		spinner.finish_and_clear();
		match frontier.context("frontier search failed")? {
			Some(page) => end = end.min(geometry.page_range(page).1),
			None => {
				println!("Logger is empty, nothing to read.");
				return Ok(());
			}
		}
	}
	if begin > end || end >= geometry.size {
		bail!("invalid range {begin:#x}..={end:#x} for {} byte flash", geometry.size);
	}
	if args.chunk_pages == 0 {
		bail!("--chunk-pages must be at least 1");
	}

	let opts = RetrieveOptions {
		begin,
		end,
		chunk_size: args.chunk_pages * geometry.page_size,
		stop_on_empty: !args.no_stop_on_empty,
		layout: RecordLayout::Paged {
			page_size: geometry.page_size,
		},
		cancel: None,
	};

	eprintln!("Reading {} into {}", meta.session_name(), files.dir.display());
	let started = Instant::now();
	let pb = ProgressBar::new((end - begin + 1) as u64);
	pb.set_style(
		ProgressStyle::default_bar()
			.template("{spinner:.cyan} [{bar:40.cyan/dim}] {bytes}/{total_bytes} ({eta})")?
			.progress_chars("=> "),
	);
	let summary = pipeline::dump_session(logger.channel_mut(), &opts, &files, &mut meta, &pb);
	pb.finish_and_clear();
	let summary = summary?;

	match logger.battery_voltage() {
		Ok(v) => meta.vbatt_post = Some(v),
		Err(e) => log::warn!("could not read battery voltage: {e:#}"),
	}
	output::save_metadata(&files.config, &meta)?;

	match summary.outcome {
		ReadOutcome::ReachedEmpty { at } => eprintln!("Reached erased flash at {at:#08x}"),
		ReadOutcome::Completed => eprintln!("Read the full range"),
		other => log::warn!("read ended early: {other:?}"),
	}
	println!("Bytes:          {}", summary.bytes);
	println!("Samples:        {}", summary.samples);
	print_rate(&meta, summary.samples);
	println!("Saved {}", files.csv.display());
	println!("Done in {:.1}s", started.elapsed().as_secs_f64());
	Ok(())
}

/// Compares the samples retrieved with what the session length implies.
fn print_rate(meta: &SessionMetadata, samples: usize) {
	if !meta.stopped_normally() {
		println!("Effective rate: unknown (no stop time)");
		return;
	}
	let Ok(interval) = interval_ms(meta.logging_interval_code) else {
		log::warn!("unknown interval code {}", meta.logging_interval_code);
		return;
	};
	let duration = (meta.logging_stop_time - meta.logging_start_time) as f64;
	let expected = duration * 1000.0 / interval as f64;
	println!("Duration:       {duration:.0}s");
	println!(
		"Effective rate: {:.3} Hz ({:.1}% of expected)",
		samples as f64 / duration,
		100.0 * samples as f64 / expected
	);
}

fn cmd_convert(bin: &Path, packed: bool) -> Result<()> {
	let files = SessionFiles::from_bin(bin);
	let meta = output::load_metadata(&files.config)?
		.with_context(|| format!("{} not found, cannot timestamp samples", files.config.display()))?;
	let layout = if packed {
		RecordLayout::Packed
	} else {
		RecordLayout::Paged { page_size: PAGE_SIZE }
	};
	let rows = output::bin_to_csv(&files.bin, &files.csv, &meta, layout)?;
	println!("Wrote {rows} samples to {}", files.csv.display());
	Ok(())
}

fn cmd_ports() -> Result<()> {
	let ports = serialport::available_ports()?;
	if ports.is_empty() {
		println!("No serial ports found.");
	}
	for p in ports {
		let kind = match p.port_type {
			SerialPortType::UsbPort(usb) => format!(
				"USB {:04x}:{:04x} {}",
				usb.vid,
				usb.pid,
				usb.product.unwrap_or_default()
			),
			SerialPortType::PciPort => "PCI".into(),
			SerialPortType::BluetoothPort => "Bluetooth".into(),
			SerialPortType::Unknown => "unknown".into(),
		};
		println!("{:<20} {kind}", p.port_name);
	}
	Ok(())
}
