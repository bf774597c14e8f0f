//! Prolific PL2303 driver.
//!
//! Line coding uses the CDC class requests. The vendor register writes
//! that follow differ between the original PL2303 and the HX revision,
//! which is recognised by its 64-byte control endpoint.

use std::time::Duration;

use super::control_out;
use crate::config::{LineConfiguration, DEFAULT_TIMEOUT};
use crate::constants::prolific::*;
use crate::error::Result;
use crate::transport::{ControlSetup, UsbTransport};
use crate::types::LineSignal;

pub(super) fn is_using(_manufacturer: Option<&str>, vendor_id: u16, product_id: u16) -> bool {
    matches!(
        (vendor_id, product_id),
        (ATEN_VID, ATEN_UC232_PID) | (VID, PL2303_PID)
    )
}

/// PL2303 driver state.
#[derive(Debug, Clone)]
pub struct Prolific {
    /// Control line state as last written with `SET_CONTROL_REQUEST`.
    control_state: u16,
    timeout: Duration,
}

impl Default for Prolific {
    fn default() -> Self {
        Self {
            control_state: 0,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Prolific {
    pub(super) fn open(
        &mut self,
        transport: &dyn UsbTransport,
        config: &LineConfiguration,
        raw_descriptors: &[u8],
    ) -> Result<()> {
        self.timeout = config.write_timeout;

        let mut coding = [0u8; 7];
        coding[..4].copy_from_slice(&config.baud_rate.value().to_le_bytes());
        coding[4] = config.stop_bits.ordinal();
        coding[5] = config.parity.ordinal();
        coding[6] = config.data_bits.value();
        self.class(transport, SET_LINE_CODING, 0, &coding)?;
        self.class(transport, BREAK_REQUEST, 0, &[])?;

        self.vendor_write(transport, 0, 0)?;
        self.vendor_write(transport, 1, 0)?;
        self.vendor_write(transport, 2, 0x44)?;

        let state = CONTROL_DTR | CONTROL_RTS;
        self.class(transport, SET_CONTROL_REQUEST, state, &[])?;
        self.control_state = state;

        self.vendor_write(transport, 0x0404, 0)?;
        self.vendor_write(transport, 0x0404, 1)?;
        self.vendor_write(transport, 0, 1)?;
        self.vendor_write(transport, 1, 0)?;

        let hx = raw_descriptors.get(MAX_PACKET_SIZE0_OFFSET) == Some(&HX_MAX_PACKET_SIZE0);
        self.vendor_write(transport, 2, if hx { 0x44 } else { 0x24 })
    }

    pub(super) fn line_signal(&self, signal: LineSignal) -> bool {
        self.control_state & bit(signal) != 0
    }

    pub(super) fn set_line_signal(
        &mut self,
        transport: &dyn UsbTransport,
        signal: LineSignal,
        value: bool,
    ) -> Result<()> {
        let state = if value {
            self.control_state | bit(signal)
        } else {
            self.control_state & !bit(signal)
        };
        self.class(transport, SET_CONTROL_REQUEST, state, &[])?;
        self.control_state = state;
        Ok(())
    }

    fn class(
        &self,
        transport: &dyn UsbTransport,
        request: u8,
        value: u16,
        data: &[u8],
    ) -> Result<()> {
        control_out(
            transport,
            ControlSetup::new(CTRL_OUT_REQTYPE, request, value, 0),
            data,
            self.timeout,
        )
    }

    fn vendor_write(&self, transport: &dyn UsbTransport, value: u16, index: u16) -> Result<()> {
        control_out(
            transport,
            ControlSetup::new(VENDOR_OUT_REQTYPE, VENDOR_WRITE_REQUEST, value, index),
            &[],
            self.timeout,
        )
    }
}

fn bit(signal: LineSignal) -> u16 {
    match signal {
        LineSignal::Dtr => CONTROL_DTR,
        LineSignal::Rts => CONTROL_RTS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use crate::types::{BaudRate, DataBits, Parity, StopBits};

    const HX: [u8; 8] = [0x12, 0x01, 0x10, 0x01, 0, 0, 0, 0x40];
    const LEGACY: [u8; 8] = [0x12, 0x01, 0x10, 0x01, 0, 0, 0, 0x08];

    #[test]
    fn open_sequence_hx() {
        let mock = MockTransport::new();
        let mut driver = Prolific::default();
        driver
            .open(&mock, &LineConfiguration::default(), &HX)
            .unwrap();
        assert_eq!(
            mock.requests(),
            vec![
                (0x21, 0x20, 0, 0),
                (0x21, 0x23, 0, 0),
                (0x40, 0x01, 0, 0),
                (0x40, 0x01, 1, 0),
                (0x40, 0x01, 2, 0x44),
                (0x21, 0x22, 3, 0),
                (0x40, 0x01, 0x0404, 0),
                (0x40, 0x01, 0x0404, 1),
                (0x40, 0x01, 0, 1),
                (0x40, 0x01, 1, 0),
                (0x40, 0x01, 2, 0x44),
            ]
        );
        assert_eq!(mock.recorded()[0].data, [0x80, 0x25, 0, 0, 0, 0, 8]);
        assert!(driver.line_signal(LineSignal::Dtr));
        assert!(driver.line_signal(LineSignal::Rts));
    }

    #[test]
    fn legacy_chip_gets_0x24() {
        let mock = MockTransport::new();
        Prolific::default()
            .open(&mock, &LineConfiguration::default(), &LEGACY)
            .unwrap();
        assert_eq!(mock.requests().last(), Some(&(0x40, 0x01, 2, 0x24)));
    }

    #[test]
    fn short_descriptor_is_not_hx() {
        let mock = MockTransport::new();
        Prolific::default()
            .open(&mock, &LineConfiguration::default(), &[0x12, 0x01])
            .unwrap();
        assert_eq!(mock.requests().last(), Some(&(0x40, 0x01, 2, 0x24)));
    }

    #[test]
    fn line_coding_block() {
        let mock = MockTransport::new();
        let config = LineConfiguration::new()
            .baud_rate(BaudRate::Baud115200)
            .data_bits(DataBits::Seven)
            .parity(Parity::Mark)
            .stop_bits(StopBits::OnePointFive);
        Prolific::default().open(&mock, &config, &HX).unwrap();
        assert_eq!(mock.recorded()[0].data, [0x00, 0xC2, 0x01, 0x00, 1, 3, 7]);
    }

    #[test]
    fn aborts_on_failed_transfer() {
        let mock = MockTransport {
            fail_at: Some(0),
            ..MockTransport::new()
        };
        let mut driver = Prolific::default();
        assert!(driver
            .open(&mock, &LineConfiguration::default(), &HX)
            .is_err());
        assert!(mock.recorded().is_empty());
        assert!(!driver.line_signal(LineSignal::Dtr));
    }

    #[test]
    fn set_line_signal_keeps_other_bit() {
        let mock = MockTransport::new();
        let mut driver = Prolific::default();
        driver.set_line_signal(&mock, LineSignal::Rts, true).unwrap();
        driver.set_line_signal(&mock, LineSignal::Dtr, true).unwrap();
        driver.set_line_signal(&mock, LineSignal::Rts, false).unwrap();
        assert_eq!(
            mock.requests(),
            vec![(0x21, 0x22, 2, 0), (0x21, 0x22, 3, 0), (0x21, 0x22, 1, 0)]
        );
        assert!(driver.line_signal(LineSignal::Dtr));
        assert!(!driver.line_signal(LineSignal::Rts));
    }
}
