//! FTDI FT232 driver.
//!
//! FTDI chips are configured with vendor `SIO_*` requests and prepend a
//! two-byte modem status to every bulk IN packet.

use std::time::Duration;

use super::control_out;
use crate::baudrate;
use crate::config::{LineConfiguration, DEFAULT_TIMEOUT};
use crate::constants::ftdi::*;
use crate::error::{Error, Result};
use crate::transport::{ControlSetup, UsbTransport};
use crate::types::{Chipset, DataBits, LineSignal};

pub(super) fn is_using(manufacturer: Option<&str>, vendor_id: u16, product_id: u16) -> bool {
    (vendor_id == VID && product_id == PID)
        || manufacturer.is_some_and(|m| m.eq_ignore_ascii_case(MANUFACTURER))
}

/// FTDI driver state.
///
/// The chip cannot report DTR/RTS back, so the last written state is
/// cached.
#[derive(Debug, Clone)]
pub struct Ftdi {
    dtr: bool,
    rts: bool,
    timeout: Duration,
}

impl Default for Ftdi {
    fn default() -> Self {
        Self {
            dtr: false,
            rts: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Ftdi {
    /// Reset the chip, then program data characteristics and the baud
    /// divisor.
    pub(super) fn open(
        &mut self,
        transport: &dyn UsbTransport,
        config: &LineConfiguration,
    ) -> Result<()> {
        if !matches!(config.data_bits, DataBits::Seven | DataBits::Eight) {
            return Err(Error::UnsupportedLineSetting {
                chipset: Chipset::Ftdi,
                setting: "data bits",
            });
        }
        let requested = config.baud_rate.value();
        let divisor = baudrate::convert_baudrate(requested)
            .filter(|r| baudrate::within_tolerance(requested, r.actual))
            .ok_or(Error::UnsupportedBaudRate {
                chipset: Chipset::Ftdi,
                baud_rate: requested,
            })?;
        self.timeout = config.write_timeout;

        self.sio(transport, SIO_RESET_REQUEST, SIO_RESET_SIO, 0)?;

        let data = config.data_bits.value() as u16
            | (config.parity.ordinal() as u16) << 8
            | (config.stop_bits.ordinal() as u16) << 11;
        self.sio(transport, SIO_SET_DATA_REQUEST, data, 0)?;

        self.sio(
            transport,
            SIO_SET_BAUDRATE_REQUEST,
            divisor.value,
            divisor.index,
        )
    }

    pub(super) fn line_signal(&self, signal: LineSignal) -> bool {
        match signal {
            LineSignal::Dtr => self.dtr,
            LineSignal::Rts => self.rts,
        }
    }

    pub(super) fn set_line_signal(
        &mut self,
        transport: &dyn UsbTransport,
        signal: LineSignal,
        value: bool,
    ) -> Result<()> {
        let usb_val = match (signal, value) {
            (LineSignal::Dtr, true) => SIO_SET_DTR_HIGH,
            (LineSignal::Dtr, false) => SIO_SET_DTR_LOW,
            (LineSignal::Rts, true) => SIO_SET_RTS_HIGH,
            (LineSignal::Rts, false) => SIO_SET_RTS_LOW,
        };
        self.sio(transport, SIO_SET_MODEM_CTRL_REQUEST, usb_val, 0)?;
        match signal {
            LineSignal::Dtr => self.dtr = value,
            LineSignal::Rts => self.rts = value,
        }
        Ok(())
    }

    fn sio(&self, transport: &dyn UsbTransport, request: u8, value: u16, index: u16) -> Result<()> {
        control_out(
            transport,
            ControlSetup::new(SIO_SET_DATA_REQUEST_TYPE, request, value, index),
            &[],
            self.timeout,
        )
    }
}

/// Strip the 2-byte modem status header from each packet in a raw USB bulk
/// read result. Returns the total number of payload bytes after stripping.
///
/// The data is compacted in-place: payload bytes are moved to fill the
/// gaps left by removed status bytes.
pub(super) fn strip_modem_status(data: &mut [u8], packet_size: usize) -> usize {
    let total = data.len();
    if total <= STATUS_LENGTH || packet_size <= STATUS_LENGTH {
        return 0;
    }

    let num_packets = total.div_ceil(packet_size);
    let mut write_pos = 0;

    for i in 0..num_packets {
        let pkt_start = i * packet_size;
        let pkt_end = (pkt_start + packet_size).min(total);
        let pkt_len = pkt_end - pkt_start;

        if pkt_len <= STATUS_LENGTH {
            // status only
            continue;
        }

        let payload_start = pkt_start + STATUS_LENGTH;
        let payload_len = pkt_len - STATUS_LENGTH;

        if write_pos != payload_start {
            data.copy_within(payload_start..payload_start + payload_len, write_pos);
        }
        write_pos += payload_len;
    }

    write_pos
}
