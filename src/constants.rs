//! Protocol constants for the supported bridge chipsets.
//!
//! These constants define USB vendor/product IDs, `bmRequestType` values,
//! and the vendor request codes each chipset understands. Most users
//! should not need to use these directly.

// ---- bmRequestType building blocks ----

/// Host-to-device direction.
pub const USB_DIR_OUT: u8 = 0x00;
/// Device-to-host direction.
pub const USB_DIR_IN: u8 = 0x80;
/// Standard request type.
pub const USB_TYPE_STANDARD: u8 = 0x00;
/// Class request type.
pub const USB_TYPE_CLASS: u8 = 0x20;
/// Vendor request type.
pub const USB_TYPE_VENDOR: u8 = 0x40;
/// Device recipient.
pub const USB_RECIP_DEVICE: u8 = 0x00;
/// Interface recipient.
pub const USB_RECIP_INTERFACE: u8 = 0x01;

/// Silicon Labs CP210x.
pub mod cp21xx {
    /// Silicon Labs vendor ID.
    pub const VID: u16 = 0x10C4;
    /// CP2102/CP2109, CP2105, CP2108 and CP2110 product IDs.
    pub const PIDS: [u16; 4] = [0xEA60, 0xEA70, 0xEA71, 0xEA80];
    /// Manufacturer string reported by Silicon Labs parts.
    pub const MANUFACTURER: &str = "Silicon Labs";

    /// Vendor, host-to-device, interface recipient.
    pub(crate) const REQTYPE_HOST_TO_INTERFACE: u8 = 0x41;
    /// Vendor, device-to-host, interface recipient.
    pub(crate) const REQTYPE_INTERFACE_TO_HOST: u8 = 0xC1;

    /// Enable or disable the UART.
    pub(crate) const IFC_ENABLE: u8 = 0x00;
    /// Set line control (stop bits, parity, word length).
    pub(crate) const SET_LINE_CTL: u8 = 0x03;
    /// Set modem handshaking states (DTR/RTS).
    pub(crate) const SET_MHS: u8 = 0x07;
    /// Read modem status.
    pub(crate) const GET_MDMSTS: u8 = 0x08;
    /// Purge FIFOs.
    pub(crate) const PURGE: u8 = 0x12;
    /// Set flow control / handshaking.
    pub(crate) const SET_FLOW: u8 = 0x13;
    /// Set baud rate as a 32-bit little-endian value.
    pub(crate) const SET_BAUDRATE: u8 = 0x1E;

    /// `IFC_ENABLE` value enabling the UART.
    pub(crate) const UART_ENABLE: u16 = 0x0001;
    /// `PURGE` value clearing both TX and RX queues.
    pub(crate) const PURGE_ALL: u16 = 0x000F;

    /// DTR bit in `SET_MHS` / `GET_MDMSTS`.
    pub(crate) const CONTROL_DTR: u16 = 0x0001;
    /// RTS bit in `SET_MHS` / `GET_MDMSTS`.
    pub(crate) const CONTROL_RTS: u16 = 0x0002;
    /// Write-enable mask for DTR in `SET_MHS`.
    pub(crate) const CONTROL_WRITE_DTR: u16 = 0x0100;
    /// Write-enable mask for RTS in `SET_MHS`.
    pub(crate) const CONTROL_WRITE_RTS: u16 = 0x0200;

    /// Highest rate the CP210x family produces.
    pub(crate) const MAX_BAUD_RATE: u32 = 921_600;
}

/// Prolific PL2303.
pub mod prolific {
    /// Aten UC-232 vendor ID.
    pub const ATEN_VID: u16 = 0x0557;
    /// Aten UC-232 product ID.
    pub const ATEN_UC232_PID: u16 = 0x2008;
    /// Prolific vendor ID.
    pub const VID: u16 = 0x067B;
    /// PL2303 product ID.
    pub const PL2303_PID: u16 = 0x2303;

    /// Class, host-to-device, interface recipient.
    pub(crate) const CTRL_OUT_REQTYPE: u8 = 0x21;
    /// Vendor, host-to-device, device recipient.
    pub(crate) const VENDOR_OUT_REQTYPE: u8 = 0x40;

    /// CDC SET_LINE_CODING.
    pub(crate) const SET_LINE_CODING: u8 = 0x20;
    /// CDC SET_CONTROL_LINE_STATE.
    pub(crate) const SET_CONTROL_REQUEST: u8 = 0x22;
    /// CDC SEND_BREAK.
    pub(crate) const BREAK_REQUEST: u8 = 0x23;
    /// Vendor register write.
    pub(crate) const VENDOR_WRITE_REQUEST: u8 = 0x01;

    /// DTR bit of the control line state.
    pub(crate) const CONTROL_DTR: u16 = 0x01;
    /// RTS bit of the control line state.
    pub(crate) const CONTROL_RTS: u16 = 0x02;

    /// Offset of `bMaxPacketSize0` in the device descriptor.
    pub(crate) const MAX_PACKET_SIZE0_OFFSET: usize = 7;
    /// `bMaxPacketSize0` reported by HX parts.
    pub(crate) const HX_MAX_PACKET_SIZE0: u8 = 0x40;
}

/// FTDI FT232 family.
pub mod ftdi {
    /// FTDI vendor ID.
    pub const VID: u16 = 0x0403;
    /// Product ID matched together with the FTDI vendor ID.
    pub const PID: u16 = 0x5FED;
    /// Manufacturer string reported by FTDI parts.
    pub const MANUFACTURER: &str = "FTDI";

    /// Vendor, host-to-device, device recipient.
    pub(crate) const SIO_SET_DATA_REQUEST_TYPE: u8 = 0x40;

    /// Reset the port.
    pub(crate) const SIO_RESET_REQUEST: u8 = 0x00;
    /// Set the modem control register.
    pub(crate) const SIO_SET_MODEM_CTRL_REQUEST: u8 = 0x01;
    /// Set baud rate.
    pub(crate) const SIO_SET_BAUDRATE_REQUEST: u8 = 0x03;
    /// Set data characteristics (bits, parity, stop, break).
    pub(crate) const SIO_SET_DATA_REQUEST: u8 = 0x04;

    /// SIO reset (device reset).
    pub(crate) const SIO_RESET_SIO: u16 = 0;

    /// Set DTR high.
    pub(crate) const SIO_SET_DTR_HIGH: u16 = 1 | (0x1 << 8);
    /// Set DTR low.
    pub(crate) const SIO_SET_DTR_LOW: u16 = 0x1 << 8;
    /// Set RTS high.
    pub(crate) const SIO_SET_RTS_HIGH: u16 = 2 | (0x2 << 8);
    /// Set RTS low.
    pub(crate) const SIO_SET_RTS_LOW: u16 = 0x2 << 8;

    /// Length of the modem status header on every IN packet.
    pub(crate) const STATUS_LENGTH: usize = 2;

    /// BM/R-type clock: 48 MHz.
    pub(crate) const C_CLK: u32 = 48_000_000;
}

/// WCH CH340/CH341.
pub mod ch34x {
    /// QinHeng Electronics vendor ID.
    pub const VID: u16 = 0x1A86;

    /// Vendor, host-to-device, device recipient.
    pub(crate) const OUT_REQTYPE: u8 = 0x40;
    /// Vendor, device-to-host, device recipient.
    pub(crate) const IN_REQTYPE: u8 = 0xC0;

    /// Read chip version.
    pub(crate) const READ_VERSION: u8 = 0x5F;
    /// Write register pair.
    pub(crate) const WRITE_REG: u8 = 0x9A;
    /// Serial init / line configuration.
    pub(crate) const SERIAL_INIT: u8 = 0xA1;
    /// Write modem handshake byte.
    pub(crate) const MODEM_CTRL: u8 = 0xA4;

    /// Length of the version response.
    pub(crate) const VERSION_LENGTH: u16 = 8;

    /// LCR: enable receiver.
    pub(crate) const LCR_ENABLE_RX: u16 = 0x80;
    /// LCR: enable transmitter.
    pub(crate) const LCR_ENABLE_TX: u16 = 0x40;
    /// LCR: parity bits for odd parity.
    pub(crate) const LCR_PAR_ODD: u16 = 0x08;
    /// LCR: parity bits for even parity.
    pub(crate) const LCR_PAR_EVEN: u16 = 0x18;
    /// LCR: parity bits for mark parity.
    pub(crate) const LCR_PAR_MARK: u16 = 0x28;
    /// LCR: parity bits for space parity.
    pub(crate) const LCR_PAR_SPACE: u16 = 0x38;
    /// LCR: two stop bits.
    pub(crate) const LCR_STOP_BITS_2: u16 = 0x04;
    /// Low byte of the `SERIAL_INIT` value.
    pub(crate) const SERIAL_INIT_LOW: u16 = 0x9C;
    /// Base of the `SERIAL_INIT` index.
    pub(crate) const SERIAL_INIT_INDEX: u16 = 0x88;
}
