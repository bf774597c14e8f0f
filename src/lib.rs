//! Serial ports over USB-to-serial bridge chips.
//!
//! This crate drives the UART side of common USB bridges (Silicon Labs
//! CP210x, Prolific PL2303, FTDI FT232 and WCH CH34x) directly through
//! their vendor control requests, with
//! [nusb](https://crates.io/crates/nusb) as the USB backend. No kernel
//! serial driver is involved.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use uartbridge::{BaudRate, MediaEvent, PortRegistry, SerialPort};
//!
//! let registry = Arc::new(PortRegistry::with_ports(uartbridge::usb::list_ports()?));
//! let mut port = SerialPort::with_nusb(registry);
//! port.set_port_name("1-4")?;
//! port.set_baud_rate(BaudRate::Baud115200);
//! let events = port.subscribe();
//! port.open()?;
//! port.send(b"Hello from Rust!\r\n")?;
//! for event in events.iter() {
//!     if let MediaEvent::Received { data, .. } = event {
//!         println!("{data:02X?}");
//!         break;
//!     }
//! }
//! # Ok::<(), uartbridge::Error>(())
//! ```
//!
//! # Features
//!
//! - **Chipset resolution**: [`resolve_chipset`] maps a device identity to
//!   its driver; first matching rule wins.
//! - **Line setup**: baud rate, data bits, parity, stop bits, DTR/RTS.
//! - **Receive thread**: status bytes stripped, packets merged within a
//!   configurable delay, delivered as [`MediaEvent::Received`].
//! - **Request/response**: while a [`SyncGuard`] is held, data collects in
//!   a [`FrameBuffer`] and [`SerialPort::receive`] waits for an
//!   end-of-packet marker or a byte count.
//! - **Settings**: persist the configuration as small XML fragments
//!   ([`PortSettings`]).
//! - **Pluggable USB**: everything runs over the [`UsbTransport`] and
//!   [`UsbHost`] traits; [`usb`] implements them with `nusb`.

mod baudrate;
pub mod chipset;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod frame;
pub mod port;
mod receiver;
pub mod serial;
pub mod settings;
pub mod transport;
pub mod types;
pub mod usb;

// ---- Convenience re-exports ----

pub use chipset::{resolve_chipset, ChipsetDriver};
pub use config::LineConfiguration;
pub use error::{Error, ErrorKind, Result};
pub use events::{MediaEvent, Notifier, TraceEvent, TraceKind};
pub use frame::{Eop, FrameBuffer, FrameWait, ReceiveParameters};
pub use port::{PortBuilder, PortDescriptor, PortEvent, PortRegistry};
pub use serial::{SerialPort, SyncGuard};
pub use settings::PortSettings;
pub use transport::{ControlSetup, UsbHost, UsbTransport};
pub use types::*;
