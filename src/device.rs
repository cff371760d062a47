use anyhow::{bail, Context, Result};
use serialport::{SerialPort, SerialPortType};
use std::time::Duration;

use crate::consts::*;
use crate::error::ChannelError;
use crate::flash::FlashLocator;
use crate::protocol::channel::{ChannelConfig, FramedChannel};
use crate::protocol::commands::*;
use crate::protocol::retry::RetryPolicy;
use crate::protocol::transport::Transport;
use crate::types::{is_erased, FlashGeometry, LoggingConfig, LoggingStatus, SessionMetadata};

/// How to open the serial link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
	pub path: String,
	pub baud_rate: u32,
	pub timeout: Duration,
}

impl PortConfig {
	pub fn new(path: &str) -> Self {
		Self {
			path: path.to_string(),
			baud_rate: SERIAL_BAUD_RATE,
			timeout: NORMAL_TIMEOUT,
		}
	}
}

/// Picks a port: `preferred` if it is still present, else the last USB
/// serial adapter, else the last port listed.
pub fn detect_port(preferred: Option<&str>) -> Result<String> {
	let ports = serialport::available_ports()?;
	log::debug!("available ports: {:?}", ports.iter().map(|p| &p.port_name).collect::<Vec<_>>());
	choose_port(
		ports
			.iter()
			.map(|p| (p.port_name.as_str(), matches!(p.port_type, SerialPortType::UsbPort(_)))),
		preferred,
	)
}

fn choose_port<'a>(ports: impl Iterator<Item = (&'a str, bool)> + Clone, preferred: Option<&str>) -> Result<String> {
	if let Some(want) = preferred {
		if ports.clone().any(|(name, _)| name.eq_ignore_ascii_case(want)) {
			return Ok(want.to_string());
		}
		log::warn!("last used port {want} is gone, detecting");
	}
	let usb = ports.clone().filter(|(_, usb)| *usb).last();
	match usb.or_else(|| ports.last()) {
		Some((name, _)) => Ok(name.to_string()),
		None => bail!("no serial ports found. Is the logger plugged in?"),
	}
}

/// A logger behind a framed channel.
pub struct Logger<T: Transport> {
	channel: FramedChannel<T>,
	pub geometry: FlashGeometry,
}

impl Logger<Box<dyn SerialPort>> {
	pub fn open(port: &PortConfig, retry: RetryPolicy) -> Result<Self> {
		let serial = serialport::new(&port.path, port.baud_rate)
			.data_bits(serialport::DataBits::Eight)
			.stop_bits(serialport::StopBits::One)
			.parity(serialport::Parity::None)
			.timeout(port.timeout)
			.open()
			.with_context(|| format!("opening {}", port.path))?;
		log::info!("opened {} at {} baud", port.path, port.baud_rate);

		let channel = FramedChannel::new(
			serial,
			ChannelConfig { retry },
		);
		let mut logger = Logger::new(channel, FlashGeometry::default());
		logger.wake()?;
		Ok(logger)
	}
}

impl<T: Transport> Logger<T> {
	pub fn new(channel: FramedChannel<T>, geometry: FlashGeometry) -> Self {
		Self { channel, geometry }
	}

	/// Flushes any half-typed command on the firmware side.
	pub fn wake(&mut self) -> Result<()> {
		self.channel.reset()?;
		self.channel.transport_mut().write_all(b"\n\n\n")?;
		Ok(())
	}

	pub fn channel_mut(&mut self) -> &mut FramedChannel<T> {
		&mut self.channel
	}

	pub fn locator(&mut self) -> FlashLocator<'_, T> {
		FlashLocator::new(&mut self.channel, self.geometry)
	}

	pub fn logging_status(&mut self) -> Result<LoggingStatus> {
		Ok(self.channel.query(&Command::IsLogging, parse_logging_status)?)
	}

	pub fn logging_config(&mut self) -> Result<LoggingConfig> {
		Ok(self.channel.query(&Command::LoggingConfig, parse_logging_config)?)
	}

	pub fn flash_id(&mut self) -> Result<String> {
		Ok(self.channel.query(&Command::FlashId, parse_flash_id)?)
	}

	/// Empty if the name was never set or the logger does not answer.
	pub fn logger_name(&mut self) -> Result<String> {
		match self.channel.query(&Command::LoggerName, parse_logger_name) {
			Ok(name) => Ok(name),
			Err(ChannelError::Unresponsive { .. }) => {
				log::warn!("no usable reply to {CMD_LOGGER_NAME}, treating name as unset");
				Ok(String::new())
			}
			Err(e) => Err(e.into()),
		}
	}

	pub fn battery_voltage(&mut self) -> Result<f64> {
		Ok(self.channel.query(&Command::SysVolt, parse_sys_volt)?)
	}

	pub fn metadata(&mut self) -> Result<SessionMetadata> {
		let flash_id = self.flash_id()?;
		let name = self.logger_name()?;
		let config = self.logging_config()?;
		Ok(SessionMetadata::new(&flash_id, &name, &config))
	}

	/// Cheap emptiness check: write indices at zero and page 0 erased.
	pub fn probably_empty(&mut self) -> Result<bool> {
		if !self.logging_status()?.indices_clean() {
			log::debug!("write indices not clean");
			return Ok(false);
		}
		let (begin, end) = self.geometry.page_range(0);
		let page = self
			.channel
			.send_and_receive(&Command::read_range(begin, end), self.geometry.page_size)?;
		Ok(is_erased(&page))
	}
}
