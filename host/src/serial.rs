use std::io::{Read, Write};
use std::time::Instant as StdInstant;

use embassy_time::{Duration, Instant};
use log::{debug, warn};
use tokio_serial::SerialPort;

use simtrack_common::at::transport::{Clock, Transport};
use simtrack_common::error::Error;
use simtrack_common::sim868::hw::ModemPin;

use crate::config::PowerLine;

const READ_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(10);

/// Serial connection to the SIM868.
pub struct SerialTransport {
    serial: Box<dyn SerialPort>,
    port: String,
}

impl SerialTransport {
    /// Opens `port`, e.g. `/dev/ttyS0`.
    pub fn open(port: &str, baud_rate: u32) -> crate::Result<Self> {
        let serial = tokio_serial::new(port, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|err| crate::error::Error::ConnectionError(format!("{port}: {err}")))?;
        Ok(Self {
            serial,
            port: port.to_owned(),
        })
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Second handle to the same port, used for driving the control lines.
    pub fn power_pin(&self, line: PowerLine) -> crate::Result<SerialPowerPin> {
        let serial = self
            .serial
            .try_clone()
            .map_err(|err| crate::error::Error::ConnectionError(format!("{}: {err}", self.port)))?;
        Ok(SerialPowerPin { serial, line })
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> simtrack_common::Result<()> {
        self.serial.write_all(bytes).map_err(|_| Error::UartWriteError)?;
        self.serial.flush().map_err(|_| Error::UartWriteError)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> simtrack_common::Result<usize> {
        let available = self.serial.bytes_to_read().map_err(|_| Error::UartReadError)?;
        if available == 0 {
            return Ok(0);
        }
        let len = buf.len().min(available as usize);
        self.serial.read(&mut buf[..len]).map_err(|_| Error::UartReadError)
    }
}

/// Power key wired to the DTR or RTS line of the serial port.
pub struct SerialPowerPin {
    serial: Box<dyn SerialPort>,
    line: PowerLine,
}

impl SerialPowerPin {
    fn set_level(&mut self, level: bool) {
        let result = match self.line {
            PowerLine::None => {
                debug!("Power line not connected, ignoring level {level}");
                Ok(())
            }
            PowerLine::Dtr => self.serial.write_data_terminal_ready(level),
            PowerLine::Rts => self.serial.write_request_to_send(level),
        };
        if let Err(err) = result {
            warn!("Cannot set {:?} to {level}: {err}", self.line);
        }
    }
}

impl ModemPin for SerialPowerPin {
    fn set_high(&mut self) {
        self.set_level(true);
    }

    fn set_low(&mut self) {
        self.set_level(false);
    }
}

/// Wall clock for the AT engine, sleeps the calling thread.
pub struct StdClock {
    start: StdInstant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            start: StdInstant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.start.elapsed().as_micros() as u64)
    }

    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(std::time::Duration::from_micros(duration.as_micros()));
    }
}
