use std::time::Duration;

pub const FLASH_SIZE: usize = 16 * 1024 * 1024;
pub const PAGE_SIZE: usize = 256;
pub const PAGE_COUNT: usize = FLASH_SIZE / PAGE_SIZE;

pub const SAMPLE_SIZE: usize = 20;
pub const SAMPLES_PER_PAGE: usize = PAGE_SIZE / SAMPLE_SIZE;

pub const CRC_SIZE: usize = 4;
pub const ERASED_BYTE: u8 = 0xFF;

pub const CHUNK_SIZE: usize = 16 * PAGE_SIZE;

pub const CMD_READ_RANGE: &str = "spi_flash_read_range";
pub const CMD_READ_PAGE: &str = "read_page";
pub const CMD_IS_LOGGING: &str = "is_logging";
pub const CMD_LOGGING_CONFIG: &str = "get_logging_config";
pub const CMD_FLASH_ID: &str = "spi_flash_get_unique_id";
pub const CMD_LOGGER_NAME: &str = "get_logger_name";
pub const CMD_SYS_VOLT: &str = "read_sys_volt";

pub const LOGGER_NAME_MAX_LEN: usize = 15;
pub const FLASH_ID_LEN: usize = 16;

pub const SERIAL_BAUD_RATE: u32 = 115200;
pub const NORMAL_TIMEOUT: Duration = Duration::from_secs(1);
pub const MAX_ATTEMPTS: u32 = 16;
pub const RETRY_BACKOFF: Duration = Duration::from_millis(100);

pub const PIPELINE_DEPTH: usize = 8;
