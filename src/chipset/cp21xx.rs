//! Silicon Labs CP210x driver.

use std::time::Duration;

use super::{control_in, control_out};
use crate::config::{LineConfiguration, DEFAULT_TIMEOUT};
use crate::constants::cp21xx::*;
use crate::error::{Error, Result};
use crate::transport::{ControlSetup, UsbTransport};
use crate::types::{Chipset, LineSignal};

pub(super) fn is_using(manufacturer: Option<&str>, vendor_id: u16, product_id: u16) -> bool {
    (vendor_id == VID && PIDS.contains(&product_id))
        || manufacturer.is_some_and(|m| m.eq_ignore_ascii_case(MANUFACTURER))
}

/// `SET_FLOW` block: DTR held active, RTS flow control replaced by the
/// static RTS line, XON/XOFF limits at 128 bytes.
const FLOW_CONTROL: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, // ulControlHandshake
    0x40, 0x00, 0x00, 0x00, // ulFlowReplace
    0x80, 0x00, 0x00, 0x00, // ulXonLimit
    0x80, 0x00, 0x00, 0x00, // ulXoffLimit
];

/// CP210x driver state.
///
/// Line signal state is read back from the chip, nothing is cached.
#[derive(Debug, Clone)]
pub struct Cp21xx {
    timeout: Duration,
}

impl Default for Cp21xx {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Cp21xx {
    pub(super) fn open(
        &mut self,
        transport: &dyn UsbTransport,
        config: &LineConfiguration,
    ) -> Result<()> {
        let baud_rate = config.baud_rate.value();
        if baud_rate > MAX_BAUD_RATE {
            return Err(Error::UnsupportedBaudRate {
                chipset: Chipset::Cp21xx,
                baud_rate,
            });
        }
        self.timeout = config.write_timeout;

        self.write(transport, IFC_ENABLE, UART_ENABLE, &[])?;
        self.write(transport, PURGE, PURGE_ALL, &[])?;
        self.write(transport, SET_BAUDRATE, 0, &baud_rate.to_le_bytes())?;

        let line_ctl = config.stop_bits.ordinal() as u16
            | (config.parity.ordinal() as u16) << 4
            | (config.data_bits.value() as u16) << 8;
        self.write(transport, SET_LINE_CTL, line_ctl, &[])?;

        self.write(transport, SET_FLOW, 0, &FLOW_CONTROL)?;
        self.write(
            transport,
            SET_MHS,
            CONTROL_WRITE_DTR | CONTROL_WRITE_RTS | CONTROL_DTR | CONTROL_RTS,
            &[],
        )
    }

    pub(super) fn line_signal(
        &self,
        transport: &dyn UsbTransport,
        signal: LineSignal,
    ) -> Result<bool> {
        let status = control_in(
            transport,
            ControlSetup::new(REQTYPE_INTERFACE_TO_HOST, GET_MDMSTS, 0, 0),
            1,
            self.timeout,
        )?;
        let byte = status.first().copied().ok_or_else(|| Error::ControlTransfer {
            request: GET_MDMSTS,
            reason: "empty modem status".into(),
        })?;
        Ok(byte as u16 & mask(signal) != 0)
    }

    pub(super) fn set_line_signal(
        &mut self,
        transport: &dyn UsbTransport,
        signal: LineSignal,
        value: bool,
    ) -> Result<()> {
        let (write, bit) = match signal {
            LineSignal::Dtr => (CONTROL_WRITE_DTR, CONTROL_DTR),
            LineSignal::Rts => (CONTROL_WRITE_RTS, CONTROL_RTS),
        };
        let value = if value { write | bit } else { write };
        self.write(transport, SET_MHS, value, &[])
    }

    fn write(
        &self,
        transport: &dyn UsbTransport,
        request: u8,
        value: u16,
        data: &[u8],
    ) -> Result<()> {
        control_out(
            transport,
            ControlSetup::new(REQTYPE_HOST_TO_INTERFACE, request, value, 0),
            data,
            self.timeout,
        )
    }
}

fn mask(signal: LineSignal) -> u16 {
    match signal {
        LineSignal::Dtr => CONTROL_DTR,
        LineSignal::Rts => CONTROL_RTS,
    }
}
