//! Line configuration shared by the chipset drivers and the receive engine.

use std::time::Duration;

use crate::types::{BaudRate, DataBits, Parity, StopBits};

/// Default read/write timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// UART parameters and transfer timing for one serial port.
///
/// The configuration lives as long as the [`SerialPort`](crate::SerialPort)
/// that owns it and survives open/close cycles. Drivers read it when the
/// port is opened; the receive engine reads `receive_delay` for its
/// aggregation window.
///
/// ```
/// use uartbridge::{BaudRate, LineConfiguration, Parity};
///
/// let cfg = LineConfiguration::new()
///     .baud_rate(BaudRate::Baud115200)
///     .parity(Parity::Even);
/// assert_eq!(cfg.baud_rate, BaudRate::Baud115200);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineConfiguration {
    /// Baud rate.
    pub baud_rate: BaudRate,
    /// Data bits per character.
    pub data_bits: DataBits,
    /// Parity mode.
    pub parity: Parity,
    /// Stop bits.
    pub stop_bits: StopBits,
    /// Timeout for control and bulk IN transfers.
    pub read_timeout: Duration,
    /// Timeout for control and bulk OUT transfers.
    pub write_timeout: Duration,
    /// Window in which consecutive USB packets are merged into one chunk.
    /// Zero disables aggregation.
    pub receive_delay: Duration,
}

impl Default for LineConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: BaudRate::Baud9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            receive_delay: Duration::ZERO,
        }
    }
}

impl LineConfiguration {
    /// The default configuration: 9600 8N1, 5 s timeouts, no receive delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the baud rate.
    pub fn baud_rate(mut self, baud_rate: BaudRate) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the data bits.
    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    /// Set the parity.
    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Set the stop bits.
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Set the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the receive aggregation window.
    pub fn receive_delay(mut self, delay: Duration) -> Self {
        self.receive_delay = delay;
        self
    }
}
