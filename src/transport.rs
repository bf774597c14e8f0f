//! The USB operations the serial layer needs from the platform.
//!
//! Chipset drivers and the receive engine only ever talk to a device
//! through [`UsbTransport`]: vendor/class control transfers for
//! configuration, and bulk transfers on one IN/OUT endpoint pair for data.
//! [`UsbHost`] turns a [`PortDescriptor`] into such a transport.
//!
//! The [`usb`](crate::usb) module provides the `nusb` implementation.
//! Tests substitute scripted transports.

use std::time::Duration;

use crate::constants::USB_DIR_IN;
use crate::error::Result;
use crate::port::PortDescriptor;

/// The setup packet of a control transfer, minus `wLength`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlSetup {
    /// `bmRequestType`: direction, type and recipient bits.
    pub request_type: u8,
    /// `bRequest`.
    pub request: u8,
    /// `wValue`.
    pub value: u16,
    /// `wIndex`.
    pub index: u16,
}

impl ControlSetup {
    /// Build a setup packet.
    pub const fn new(request_type: u8, request: u8, value: u16, index: u16) -> Self {
        Self {
            request_type,
            request,
            value,
            index,
        }
    }

    /// Whether the data stage flows device-to-host.
    pub fn is_in(&self) -> bool {
        self.request_type & USB_DIR_IN != 0
    }
}

/// A claimed USB interface with a bulk IN/OUT endpoint pair.
///
/// All methods block until the transfer completes or the timeout expires.
/// Implementations must be shareable between the caller thread and the
/// receive thread.
pub trait UsbTransport: Send + Sync {
    /// Issue a host-to-device control transfer. Returns the number of data
    /// bytes transferred.
    fn control_out(&self, setup: ControlSetup, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Issue a device-to-host control transfer reading up to `length` bytes.
    fn control_in(&self, setup: ControlSetup, length: u16, timeout: Duration) -> Result<Vec<u8>>;

    /// Read one bulk IN transfer into `buf`. A timeout with no data
    /// returns `Ok(0)`.
    fn bulk_read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Write one bulk OUT transfer. Returns the number of bytes accepted.
    fn bulk_write(&self, data: &[u8], timeout: Duration) -> Result<usize>;

    /// `wMaxPacketSize` of the bulk IN endpoint.
    fn max_packet_size_in(&self) -> usize;

    /// `wMaxPacketSize` of the bulk OUT endpoint.
    fn max_packet_size_out(&self) -> usize;

    /// The raw device descriptor bytes.
    fn raw_descriptors(&self) -> Vec<u8>;
}

/// The platform USB stack.
pub trait UsbHost: Send + Sync {
    /// Whether the host can act as a USB host at all.
    fn is_available(&self) -> bool;

    /// Open the device behind `port`, claim its serial interface, and
    /// resolve the bulk endpoint pair.
    fn open(&self, port: &PortDescriptor) -> Result<Box<dyn UsbTransport>>;
}

/// Recording transport for driver unit tests.
#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::{ControlSetup, UsbTransport};
    use crate::error::{Error, Result};

    /// One control transfer as seen by the device.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct Recorded {
        pub setup: ControlSetup,
        pub data: Vec<u8>,
    }

    /// Scripted read results; `Err(())` becomes a transfer error.
    pub(crate) type ReadStep = std::result::Result<Vec<u8>, ()>;

    #[derive(Default)]
    pub(crate) struct MockTransport {
        pub controls: Mutex<Vec<Recorded>>,
        pub control_in_reply: Mutex<Vec<u8>>,
        /// Fail the control transfer with this (zero-based) position.
        pub fail_at: Option<usize>,
        pub reads: Mutex<VecDeque<ReadStep>>,
        /// Idle reads wait out the whole timeout like a real endpoint.
        pub block_when_idle: bool,
        pub writes: Mutex<Vec<Vec<u8>>>,
        /// Accept at most this many bytes per bulk write.
        pub write_limit: Option<usize>,
        pub packet_size: usize,
        pub descriptors: Vec<u8>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self {
                packet_size: 64,
                descriptors: vec![0x12, 0x01, 0x10, 0x01, 0, 0, 0, 0x40],
                ..Default::default()
            }
        }

        pub(crate) fn with_reads(steps: impl IntoIterator<Item = ReadStep>) -> Self {
            let mock = Self::new();
            *mock.reads.lock().unwrap() = steps.into_iter().collect();
            mock
        }

        pub(crate) fn recorded(&self) -> Vec<Recorded> {
            self.controls.lock().unwrap().clone()
        }

        pub(crate) fn requests(&self) -> Vec<(u8, u8, u16, u16)> {
            self.recorded()
                .iter()
                .map(|r| {
                    (
                        r.setup.request_type,
                        r.setup.request,
                        r.setup.value,
                        r.setup.index,
                    )
                })
                .collect()
        }

        fn record(&self, setup: ControlSetup, data: &[u8]) -> Result<()> {
            let mut controls = self.controls.lock().unwrap();
            if self.fail_at == Some(controls.len()) {
                return Err(Error::ControlTransfer {
                    request: setup.request,
                    reason: "stalled".into(),
                });
            }
            controls.push(Recorded {
                setup,
                data: data.to_vec(),
            });
            Ok(())
        }
    }

    impl UsbTransport for MockTransport {
        fn control_out(&self, setup: ControlSetup, data: &[u8], _: Duration) -> Result<usize> {
            self.record(setup, data)?;
            Ok(data.len())
        }

        fn control_in(&self, setup: ControlSetup, length: u16, _: Duration) -> Result<Vec<u8>> {
            self.record(setup, &[])?;
            let mut reply = self.control_in_reply.lock().unwrap().clone();
            reply.resize(length as usize, 0);
            Ok(reply)
        }

        fn bulk_read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
            match self.reads.lock().unwrap().pop_front() {
                Some(Ok(data)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                Some(Err(())) => Err(Error::Transfer(nusb::transfer::TransferError::Stall)),
                None => {
                    let wait = if self.block_when_idle {
                        timeout
                    } else {
                        timeout.min(Duration::from_millis(5))
                    };
                    std::thread::sleep(wait);
                    Ok(0)
                }
            }
        }

        fn bulk_write(&self, data: &[u8], _: Duration) -> Result<usize> {
            let n = self.write_limit.map_or(data.len(), |l| l.min(data.len()));
            self.writes.lock().unwrap().push(data[..n].to_vec());
            Ok(n)
        }

        fn max_packet_size_in(&self) -> usize {
            self.packet_size
        }

        fn max_packet_size_out(&self) -> usize {
            self.packet_size
        }

        fn raw_descriptors(&self) -> Vec<u8> {
            self.descriptors.clone()
        }
    }
}
