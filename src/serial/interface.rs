use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::{Result, SerialError, SerialSettings};

/// Set while an OS serial handle is open in this process.
static CHANNEL_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Byte stream the channel talks through. Any `Read + Write + Send` qualifies,
/// including `Box<dyn serialport::SerialPort>`.
pub trait PortIo: Read + Write + Send {}

impl<T: Read + Write + Send> PortIo for T {}

/// Result of one write-then-read cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Bytes were captured inside the read window.
    Data(String),
    /// The port reported end of stream before any byte arrived.
    EmptyReply,
    /// The read window elapsed with nothing received.
    Timeout,
}

impl QueryOutcome {
    /// Collapse to the raw response text. Both empty cases become `""`.
    pub fn into_text(self) -> String {
        match self {
            QueryOutcome::Data(text) => text,
            QueryOutcome::EmptyReply | QueryOutcome::Timeout => String::new(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QueryOutcome::Data(_) => "data",
            QueryOutcome::EmptyReply => "empty",
            QueryOutcome::Timeout => "timeout",
        }
    }
}

/// Exclusive owner of one point-to-point serial link.
///
/// `query` is not internally synchronized; whoever shares the interface must
/// serialize calls so write/read windows never overlap.
pub struct SerialInterface {
    port: Option<Box<dyn PortIo>>,
    settings: SerialSettings,
    claimed: bool,
}

impl SerialInterface {
    /// Open the OS port described by `settings`.
    ///
    /// Fails with `DeviceUnavailable` when the port is missing, held elsewhere,
    /// rejects the line settings, or another channel is already open in this process.
    pub fn open(settings: &SerialSettings) -> Result<Self> {
        if CHANNEL_CLAIMED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SerialError::DeviceUnavailable(format!(
                "{}: a serial channel is already open in this process",
                settings.port
            )));
        }

        let opened = serialport::new(&settings.port, settings.baud)
            .parity(settings.parity.into())
            .stop_bits(settings.stop_bits.into())
            .data_bits(settings.byte_size.into())
            .timeout(settings.timeout())
            .open();

        let port = match opened {
            Ok(port) => port,
            Err(e) => {
                CHANNEL_CLAIMED.store(false, Ordering::Release);
                return Err(SerialError::DeviceUnavailable(format!(
                    "{}: {}",
                    settings.port, e
                )));
            }
        };

        log::info!(
            "Opened serial channel {} at {} baud ({:?}, {:?} stop, {:?} bits)",
            settings.port,
            settings.baud,
            settings.parity,
            settings.stop_bits,
            settings.byte_size
        );

        Ok(Self {
            port: Some(Box::new(port)),
            settings: settings.clone(),
            claimed: true,
        })
    }

    /// Wrap an already-open stream. Does not take the process-wide claim.
    pub fn from_io(io: Box<dyn PortIo>, settings: &SerialSettings) -> Self {
        Self {
            port: Some(io),
            settings: settings.clone(),
            claimed: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Release the handle. Idempotent.
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            log::info!("Closing serial channel {}", self.settings.port);
        }
        if self.claimed {
            self.claimed = false;
            CHANNEL_CLAIMED.store(false, Ordering::Release);
        }
    }

    /// Write `command` plus the terminator, then perform one bounded read.
    ///
    /// The read stops when `max_response_bytes` are captured, the stream ends,
    /// or the configured timeout elapses. Captured bytes are returned as-is.
    pub fn query(&mut self, command: &str) -> Result<QueryOutcome> {
        let port = self.port.as_mut().ok_or(SerialError::Closed)?;

        let mut frame = Vec::with_capacity(command.len() + self.settings.terminator.len());
        frame.extend_from_slice(command.as_bytes());
        frame.extend_from_slice(self.settings.terminator.as_bytes());
        port.write_all(&frame)?;
        port.flush()?;

        let mut buffer = vec![0u8; self.settings.max_response_bytes];
        let deadline = Instant::now() + self.settings.timeout();
        let mut total = 0;
        let mut timed_out = false;

        while total < buffer.len() {
            match port.read(&mut buffer[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(ref e)
                    if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock =>
                {
                    timed_out = true;
                    break;
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(SerialError::IoError(e)),
            }
            if Instant::now() >= deadline {
                timed_out = true;
                break;
            }
        }

        log::debug!(
            "{} <- {:?}: {} bytes{}",
            self.settings.port,
            command,
            total,
            if timed_out { " (read window elapsed)" } else { "" }
        );

        let outcome = if total > 0 {
            QueryOutcome::Data(String::from_utf8_lossy(&buffer[..total]).into_owned())
        } else if timed_out {
            QueryOutcome::Timeout
        } else {
            QueryOutcome::EmptyReply
        };
        Ok(outcome)
    }
}

impl Drop for SerialInterface {
    fn drop(&mut self) {
        self.close();
    }
}
