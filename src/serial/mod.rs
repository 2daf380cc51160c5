pub mod interface;

pub use interface::{PortIo, QueryOutcome, SerialInterface};

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_TERMINATOR: &str = "\r\n";
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteSize {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<Parity> for serialport::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(s: StopBits) -> Self {
        match s {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

impl From<ByteSize> for serialport::DataBits {
    fn from(b: ByteSize) -> Self {
        match b {
            ByteSize::Five => serialport::DataBits::Five,
            ByteSize::Six => serialport::DataBits::Six,
            ByteSize::Seven => serialport::DataBits::Seven,
            ByteSize::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Line settings for one instrument profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_parity")]
    pub parity: Parity,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: StopBits,
    #[serde(default = "default_byte_size")]
    pub byte_size: ByteSize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_terminator")]
    pub terminator: String,
    #[serde(default = "default_max_response")]
    pub max_response_bytes: usize,
}

fn default_baud() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_parity() -> Parity {
    Parity::None
}

fn default_stop_bits() -> StopBits {
    StopBits::One
}

fn default_byte_size() -> ByteSize {
    ByteSize::Eight
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_terminator() -> String {
    DEFAULT_TERMINATOR.to_string()
}

fn default_max_response() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

impl SerialSettings {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud: default_baud(),
            parity: default_parity(),
            stop_bits: default_stop_bits(),
            byte_size: default_byte_size(),
            timeout_ms: default_timeout_ms(),
            terminator: default_terminator(),
            max_response_bytes: default_max_response(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Serial channel closed")]
    Closed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;
