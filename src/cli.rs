use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use meshlog::consts::{CHUNK_SIZE, MAX_ATTEMPTS, NORMAL_TIMEOUT, PAGE_SIZE};

#[derive(Parser)]
#[command(name = "meshlog", about = "Retrieve sensor data from MESH Lab field loggers")]
pub struct Cli {
	#[arg(short, long, global = true, help = "Serial port path (last used or auto-detected if not specified)")]
	pub port: Option<String>,

	#[arg(short, long, global = true, action = clap::ArgAction::Count, help = "More log output (-v info, -vv debug, -vvv trace)")]
	pub verbose: u8,

	#[arg(long, global = true, default_value_t = MAX_ATTEMPTS, help = "Attempts per exchange before giving up")]
	pub retries: u32,

	#[arg(long, global = true, default_value_t = NORMAL_TIMEOUT.as_millis() as u64, help = "Serial read timeout in milliseconds")]
	pub timeout_ms: u64,

	#[arg(long, global = true, help = "Randomize the delay between retries")]
	pub jitter: bool,

	#[arg(long, global = true, help = "Settings file remembering the last used port")]
	pub settings: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
	#[command(about = "Show logger name, flash ID, logging state and battery voltage")]
	Info,
	#[command(about = "Locate the end of the recorded data and count samples")]
	Count,
	#[command(about = "Dump flash to <data>/<flash_id>/ and convert it to CSV")]
	Read(ReadArgs),
	#[command(about = "Convert an existing .bin dump to CSV using its .config")]
	Convert {
		#[arg(help = "Path to the .bin dump")]
		bin: PathBuf,

		#[arg(long, help = "Records are packed back to back instead of 12 per page")]
		packed: bool,
	},
	#[command(about = "List serial ports")]
	Ports,
}

#[derive(Args)]
pub struct ReadArgs {
	#[arg(short, long, default_value = "data", help = "Output data directory")]
	pub data: PathBuf,

	#[arg(long, help = "Overwrite an existing dump of the same session")]
	pub force: bool,

	#[arg(long, help = "Binary search for the last written page first and read only up to it")]
	pub scan: bool,

	#[arg(long, help = "Keep reading past erased chunks")]
	pub no_stop_on_empty: bool,

	#[arg(long, default_value_t = CHUNK_SIZE / PAGE_SIZE, help = "Pages per bulk read request")]
	pub chunk_pages: usize,

	#[arg(long, value_parser = parse_address, help = "First byte address (hex with 0x, or decimal)")]
	pub begin: Option<usize>,

	#[arg(long, value_parser = parse_address, help = "Last byte address, inclusive")]
	pub end: Option<usize>,
}

fn parse_address(s: &str) -> Result<usize, String> {
	let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
		Some(hex) => usize::from_str_radix(hex, 16),
		None => s.parse(),
	};
	parsed.map_err(|e| format!("invalid address {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn addresses_accept_hex_and_decimal() {
		assert_eq!(parse_address("0xff"), Ok(255));
		assert_eq!(parse_address("4096"), Ok(4096));
		assert!(parse_address("0xzz").is_err());
	}

	#[test]
	fn read_defaults() {
		let cli = Cli::parse_from(["meshlog", "read", "-vv"]);
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.retries, 16);
		let Commands::Read(args) = cli.command else {
			panic!("expected read");
		};
		assert_eq!(args.chunk_pages, 16);
		assert!(!args.scan && !args.force);
		assert_eq!(args.data, PathBuf::from("data"));
	}
}
