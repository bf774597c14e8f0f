//! Chipset drivers.
//!
//! Every supported bridge chip speaks its own control protocol. A
//! [`ChipsetDriver`] holds exactly one variant and exposes the operations
//! the serial layer needs:
//!
//! - [`open`](ChipsetDriver::open): program line coding, baud rate, flow
//!   control and the DTR/RTS lines with a fixed sequence of control
//!   transfers. The first failing transfer aborts the sequence.
//! - [`strip_status`](ChipsetDriver::strip_status): remove the status
//!   header some chips prepend to inbound packets.
//! - [`line_signal`](ChipsetDriver::line_signal) /
//!   [`set_line_signal`](ChipsetDriver::set_line_signal): DTR and RTS.
//!
//! [`resolve_chipset`] maps a device identity to a variant. The rules are
//! checked in declaration order and the first match wins.

mod ch34x;
mod cp21xx;
mod ftdi;
mod prolific;

use std::time::Duration;

pub use ch34x::Ch34x;
pub use cp21xx::Cp21xx;
pub use ftdi::Ftdi;
pub use prolific::Prolific;

use crate::config::LineConfiguration;
use crate::error::{Error, Result};
use crate::transport::{ControlSetup, UsbTransport};
use crate::types::{Chipset, LineSignal};

/// A classifier rule: does this identity belong to the chipset?
type MatchRule = fn(Option<&str>, u16, u16) -> bool;

/// Classifier rules in priority order.
const RULES: [(Chipset, MatchRule); 4] = [
    (Chipset::Cp21xx, cp21xx::is_using),
    (Chipset::Prolific, prolific::is_using),
    (Chipset::Ftdi, ftdi::is_using),
    (Chipset::Ch34x, ch34x::is_using),
];

/// Resolve the chipset for a device identity.
///
/// `manufacturer` is the USB manufacturer string, if the device has one.
/// Returns [`Chipset::None`] when no rule matches.
///
/// ```
/// use uartbridge::{resolve_chipset, Chipset};
///
/// assert_eq!(resolve_chipset(None, 0x1A86, 0x7523), Chipset::Ch34x);
/// assert_eq!(resolve_chipset(Some("FTDI"), 0x1234, 0x0001), Chipset::Ftdi);
/// assert_eq!(resolve_chipset(None, 0x1234, 0x0001), Chipset::None);
/// ```
pub fn resolve_chipset(manufacturer: Option<&str>, vendor_id: u16, product_id: u16) -> Chipset {
    RULES
        .iter()
        .find(|(_, rule)| rule(manufacturer, vendor_id, product_id))
        .map_or(Chipset::None, |(chipset, _)| *chipset)
}

/// The protocol driver for one bridge chipset.
#[derive(Debug, Clone)]
pub enum ChipsetDriver {
    /// Silicon Labs CP210x.
    Cp21xx(Cp21xx),
    /// Prolific PL2303.
    Prolific(Prolific),
    /// FTDI FT232.
    Ftdi(Ftdi),
    /// WCH CH34x.
    Ch34x(Ch34x),
}

impl ChipsetDriver {
    /// Create the driver for `chipset`, or `None` for [`Chipset::None`].
    pub fn new(chipset: Chipset) -> Option<Self> {
        match chipset {
            Chipset::None => None,
            Chipset::Cp21xx => Some(Self::Cp21xx(Cp21xx::default())),
            Chipset::Prolific => Some(Self::Prolific(Prolific::default())),
            Chipset::Ftdi => Some(Self::Ftdi(Ftdi::default())),
            Chipset::Ch34x => Some(Self::Ch34x(Ch34x::default())),
        }
    }

    /// Resolve and create the driver for a device identity.
    pub fn resolve(manufacturer: Option<&str>, vendor_id: u16, product_id: u16) -> Option<Self> {
        Self::new(resolve_chipset(manufacturer, vendor_id, product_id))
    }

    /// Which chipset this driver handles.
    pub fn chipset(&self) -> Chipset {
        match self {
            Self::Cp21xx(_) => Chipset::Cp21xx,
            Self::Prolific(_) => Chipset::Prolific,
            Self::Ftdi(_) => Chipset::Ftdi,
            Self::Ch34x(_) => Chipset::Ch34x,
        }
    }

    /// Program the device for `config`.
    ///
    /// `raw_descriptors` is the raw device descriptor; some chips need it
    /// to tell hardware revisions apart. Any failing transfer is returned
    /// immediately and nothing is retried.
    pub fn open(
        &mut self,
        transport: &dyn UsbTransport,
        config: &LineConfiguration,
        raw_descriptors: &[u8],
    ) -> Result<()> {
        log::debug!(
            "{}: opening at {} baud, {} data bits, parity {}, stop bits {}",
            self.chipset(),
            config.baud_rate,
            config.data_bits,
            config.parity,
            config.stop_bits
        );
        match self {
            Self::Cp21xx(d) => d.open(transport, config),
            Self::Prolific(d) => d.open(transport, config, raw_descriptors),
            Self::Ftdi(d) => d.open(transport, config),
            Self::Ch34x(d) => d.open(transport, config),
        }
    }

    /// Whether inbound packets carry a status header that must be stripped.
    pub fn filters_status(&self) -> bool {
        matches!(self, Self::Ftdi(_))
    }

    /// Remove status headers from the first `len` bytes of `buf` in place.
    ///
    /// Returns the payload length. Chipsets without a header return `len`
    /// unchanged.
    pub fn strip_status(&self, buf: &mut [u8], len: usize, max_packet_size: usize) -> usize {
        match self {
            Self::Ftdi(_) => {
                let len = len.min(buf.len());
                ftdi::strip_modem_status(&mut buf[..len], max_packet_size)
            }
            _ => len,
        }
    }

    /// Read the state of a control line.
    ///
    /// Returns [`Error::Unsupported`] when the chipset cannot drive the line.
    pub fn line_signal(&self, transport: &dyn UsbTransport, signal: LineSignal) -> Result<bool> {
        match self {
            Self::Cp21xx(d) => d.line_signal(transport, signal),
            Self::Prolific(d) => Ok(d.line_signal(signal)),
            Self::Ftdi(d) => Ok(d.line_signal(signal)),
            Self::Ch34x(_) => Err(Error::Unsupported(Chipset::Ch34x)),
        }
    }

    /// Drive a control line.
    ///
    /// Returns [`Error::Unsupported`] when the chipset cannot drive the line.
    pub fn set_line_signal(
        &mut self,
        transport: &dyn UsbTransport,
        signal: LineSignal,
        value: bool,
    ) -> Result<()> {
        match self {
            Self::Cp21xx(d) => d.set_line_signal(transport, signal, value),
            Self::Prolific(d) => d.set_line_signal(transport, signal, value),
            Self::Ftdi(d) => d.set_line_signal(transport, signal, value),
            Self::Ch34x(_) => Err(Error::Unsupported(Chipset::Ch34x)),
        }
    }
}

/// Send a host-to-device control transfer and insist that every data byte
/// was accepted.
pub(crate) fn control_out(
    transport: &dyn UsbTransport,
    setup: ControlSetup,
    data: &[u8],
    timeout: Duration,
) -> Result<()> {
    log::debug!(
        "control out type={:#04x} req={:#04x} value={:#06x} index={:#06x} len={}",
        setup.request_type,
        setup.request,
        setup.value,
        setup.index,
        data.len()
    );
    let n = transport.control_out(setup, data, timeout)?;
    if n != data.len() {
        return Err(Error::ControlTransfer {
            request: setup.request,
            reason: format!("transferred {n} of {} bytes", data.len()),
        });
    }
    Ok(())
}

/// Send a device-to-host control transfer.
pub(crate) fn control_in(
    transport: &dyn UsbTransport,
    setup: ControlSetup,
    length: u16,
    timeout: Duration,
) -> Result<Vec<u8>> {
    log::debug!(
        "control in type={:#04x} req={:#04x} value={:#06x} index={:#06x} len={}",
        setup.request_type,
        setup.request,
        setup.value,
        setup.index,
        length
    );
    transport.control_in(setup, length, timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TIMEOUT;
    use crate::constants;
    use crate::transport::mock::MockTransport;

    #[test]
    fn resolves_each_variant() {
        assert_eq!(resolve_chipset(None, 0x10C4, 0xEA60), Chipset::Cp21xx);
        assert_eq!(resolve_chipset(None, 0x067B, 0x2303), Chipset::Prolific);
        assert_eq!(resolve_chipset(None, 0x0557, 0x2008), Chipset::Prolific);
        assert_eq!(resolve_chipset(None, 0x0403, 0x5FED), Chipset::Ftdi);
        assert_eq!(resolve_chipset(Some("ftdi"), 0x0403, 0x6001), Chipset::Ftdi);
        assert_eq!(resolve_chipset(None, 0x1A86, 0x7523), Chipset::Ch34x);
        assert_eq!(resolve_chipset(None, 0x0403, 0x6001), Chipset::None);
    }

    #[test]
    fn ftdi_vendor_alone_does_not_match() {
        // The vendor id must be paired with the product id.
        assert_eq!(resolve_chipset(None, constants::ftdi::VID, 0x0000), Chipset::None);
        assert_eq!(resolve_chipset(None, 0x5FED, 0x5FED), Chipset::None);
    }

    #[test]
    fn first_declared_rule_wins() {
        // Silicon Labs vendor id plus an "FTDI" manufacturer string matches
        // both the CP21xx and the FTDI rule.
        for _ in 0..10 {
            assert_eq!(resolve_chipset(Some("FTDI"), 0x10C4, 0xEA60), Chipset::Cp21xx);
        }
        // "FTDI" manufacturer on a QinHeng vendor id: FTDI precedes CH34x.
        assert_eq!(resolve_chipset(Some("FTDI"), 0x1A86, 0x7523), Chipset::Ftdi);
    }

    #[test]
    fn driver_reports_its_chipset() {
        for chipset in [
            Chipset::Cp21xx,
            Chipset::Prolific,
            Chipset::Ftdi,
            Chipset::Ch34x,
        ] {
            assert_eq!(ChipsetDriver::new(chipset).unwrap().chipset(), chipset);
        }
        assert!(ChipsetDriver::new(Chipset::None).is_none());
    }

    #[test]
    fn strip_status_two_byte_header() {
        let driver = ChipsetDriver::new(Chipset::Ftdi).unwrap();
        assert!(driver.filters_status());
        let mut buf = [0x00, 0x00, b'H', b'I'];
        let n = driver.strip_status(&mut buf, 4, 64);
        assert_eq!(n, 2);
        assert_eq!(&buf[..n], b"HI");
    }

    #[test]
    fn strip_status_noop_without_header() {
        let driver = ChipsetDriver::new(Chipset::Prolific).unwrap();
        assert!(!driver.filters_status());
        let mut buf = [0x00, 0x00, b'H', b'I'];
        assert_eq!(driver.strip_status(&mut buf, 4, 64), 4);
        assert_eq!(buf, [0x00, 0x00, b'H', b'I']);
    }

    #[test]
    fn ch34x_line_signals_unsupported() {
        let mock = MockTransport::new();
        let mut driver = ChipsetDriver::new(Chipset::Ch34x).unwrap();
        let err = driver.line_signal(&mock, LineSignal::Dtr).unwrap_err();
        assert!(err.is_unsupported());
        let err = driver
            .set_line_signal(&mock, LineSignal::Rts, true)
            .unwrap_err();
        assert!(err.is_unsupported());
        assert!(mock.recorded().is_empty());
    }

    #[test]
    fn short_control_transfer_is_an_error() {
        struct Short;
        impl UsbTransport for Short {
            fn control_out(&self, _: ControlSetup, _: &[u8], _: Duration) -> Result<usize> {
                Ok(3)
            }
            fn control_in(&self, _: ControlSetup, _: u16, _: Duration) -> Result<Vec<u8>> {
                Ok(Vec::new())
            }
            fn bulk_read(&self, _: &mut [u8], _: Duration) -> Result<usize> {
                Ok(0)
            }
            fn bulk_write(&self, data: &[u8], _: Duration) -> Result<usize> {
                Ok(data.len())
            }
            fn max_packet_size_in(&self) -> usize {
                64
            }
            fn max_packet_size_out(&self) -> usize {
                64
            }
            fn raw_descriptors(&self) -> Vec<u8> {
                Vec::new()
            }
        }

        let err = control_out(
            &Short,
            ControlSetup::new(0x21, 0x20, 0, 0),
            &[0u8; 7],
            DEFAULT_TIMEOUT,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ControlTransfer { request: 0x20, .. }));
    }
}
