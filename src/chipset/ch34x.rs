//! WCH CH340/CH341 driver.
//!
//! The chip has no readable line state and only a fixed set of baud rates,
//! each programmed as a prescaler/factor pair.

use std::time::Duration;

use super::{control_in, control_out};
use crate::config::{LineConfiguration, DEFAULT_TIMEOUT};
use crate::constants::ch34x::*;
use crate::error::{Error, Result};
use crate::transport::{ControlSetup, UsbTransport};
use crate::types::{BaudRate, Chipset, DataBits, Parity, StopBits};

pub(super) fn is_using(_manufacturer: Option<&str>, vendor_id: u16, _product_id: u16) -> bool {
    vendor_id == VID
}

/// `(prescaler, factor)` for each supported rate.
fn divisor(baud_rate: BaudRate) -> Option<(u16, u16)> {
    Some(match baud_rate {
        BaudRate::Baud300 => (0, 217),
        BaudRate::Baud600 => (1, 100),
        BaudRate::Baud1200 => (1, 178),
        BaudRate::Baud2400 => (1, 217),
        BaudRate::Baud4800 => (2, 100),
        BaudRate::Baud9600 => (2, 178),
        BaudRate::Baud19200 => (2, 217),
        BaudRate::Baud38400 => (3, 100),
        _ => return None,
    })
}

/// Line control register for `config`.
fn lcr(config: &LineConfiguration) -> Result<u16> {
    let mut lcr = LCR_ENABLE_RX | LCR_ENABLE_TX;
    lcr |= match config.parity {
        Parity::None => 0,
        Parity::Odd => LCR_PAR_ODD,
        Parity::Even => LCR_PAR_EVEN,
        Parity::Mark => LCR_PAR_MARK,
        Parity::Space => LCR_PAR_SPACE,
    };
    lcr |= match config.stop_bits {
        StopBits::One => 0,
        StopBits::Two => LCR_STOP_BITS_2,
        StopBits::OnePointFive => {
            return Err(Error::UnsupportedLineSetting {
                chipset: Chipset::Ch34x,
                setting: "stop bits",
            })
        }
    };
    lcr |= match config.data_bits {
        DataBits::Five => 0,
        DataBits::Six => 1,
        DataBits::Seven => 2,
        DataBits::Eight => 3,
    };
    Ok(lcr)
}

/// CH34x driver state.
#[derive(Debug, Clone)]
pub struct Ch34x {
    timeout: Duration,
}

impl Default for Ch34x {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Ch34x {
    pub(super) fn open(
        &mut self,
        transport: &dyn UsbTransport,
        config: &LineConfiguration,
    ) -> Result<()> {
        let (prescaler, factor) =
            divisor(config.baud_rate).ok_or(Error::UnsupportedBaudRate {
                chipset: Chipset::Ch34x,
                baud_rate: config.baud_rate.value(),
            })?;
        let lcr = lcr(config)?;
        self.timeout = config.write_timeout;

        self.write(transport, SERIAL_INIT, 0, 0)?;
        let version = control_in(
            transport,
            ControlSetup::new(IN_REQTYPE, READ_VERSION, 0, 0),
            VERSION_LENGTH,
            self.timeout,
        )?;
        log::debug!("CH34x version bytes {version:02x?}");
        self.write(transport, WRITE_REG, 0x1312, 0xD982)?;
        self.write(transport, WRITE_REG, 0x0F2C, 0x0004)?;
        self.write(transport, WRITE_REG, 0x2727, 0)?;
        self.write(transport, MODEM_CTRL, 0xFF, 0)?;
        self.write(
            transport,
            SERIAL_INIT,
            SERIAL_INIT_LOW | lcr << 8,
            SERIAL_INIT_INDEX | prescaler | factor << 8,
        )
    }

    fn write(&self, transport: &dyn UsbTransport, request: u8, value: u16, index: u16) -> Result<()> {
        control_out(
            transport,
            ControlSetup::new(OUT_REQTYPE, request, value, index),
            &[],
            self.timeout,
        )
    }
}
