//! [`UsbHost`] and [`UsbTransport`] on top of `nusb`.
//!
//! Ports are named `"<bus>-<address>"`. [`list_ports`] reports every
//! attached device with a known chipset; feed the result into a
//! [`PortRegistry`](crate::PortRegistry).

use std::sync::Mutex;
use std::time::Duration;

use nusb::descriptors::{DeviceDescriptor, TransferType};
use nusb::transfer::{Bulk, ControlIn, ControlOut, ControlType, Direction, In, Out, Recipient};
use nusb::{DeviceInfo, Endpoint, MaybeFuture};

use crate::constants::{USB_RECIP_DEVICE, USB_RECIP_INTERFACE, USB_TYPE_CLASS, USB_TYPE_VENDOR};
use crate::error::{Error, Result};
use crate::port::{lock, PortDescriptor};
use crate::transport::{ControlSetup, UsbHost, UsbTransport};
use crate::types::Chipset;

/// The interface every supported bridge exposes its UART on.
const SERIAL_INTERFACE: u8 = 0;

/// Fallback when the configuration descriptor cannot be read.
const DEFAULT_PACKET_SIZE: usize = 64;

fn port_path(info: &DeviceInfo) -> String {
    format!("{}-{}", info.bus_id(), info.device_address())
}

/// Re-encode the standard 18-byte device descriptor.
fn device_descriptor_bytes(desc: &DeviceDescriptor) -> Vec<u8> {
    let mut raw = Vec::with_capacity(18);
    raw.extend_from_slice(&[18, 0x01]);
    raw.extend_from_slice(&desc.usb_version().to_le_bytes());
    raw.extend_from_slice(&[
        desc.class(),
        desc.subclass(),
        desc.protocol(),
        desc.max_packet_size_0(),
    ]);
    raw.extend_from_slice(&desc.vendor_id().to_le_bytes());
    raw.extend_from_slice(&desc.product_id().to_le_bytes());
    raw.extend_from_slice(&desc.device_version().to_le_bytes());
    raw.extend_from_slice(&[
        desc.manufacturer_string_index().map_or(0, u8::from),
        desc.product_string_index().map_or(0, u8::from),
        desc.serial_number_string_index().map_or(0, u8::from),
        desc.num_configurations(),
    ]);
    raw
}

/// List attached USB-to-serial bridges.
///
/// Devices whose chipset does not resolve are skipped. The raw descriptor
/// is left empty for devices that cannot be opened (usually permissions).
///
/// ```no_run
/// for port in uartbridge::usb::list_ports().unwrap() {
///     println!("{}: {}", port.path(), port.chipset());
/// }
/// ```
pub fn list_ports() -> Result<Vec<PortDescriptor>> {
    let mut ports = Vec::new();
    for info in nusb::list_devices().wait()? {
        let mut builder = PortDescriptor::builder(
            port_path(&info),
            info.vendor_id(),
            info.product_id(),
        );
        if let Some(m) = info.manufacturer_string() {
            builder = builder.manufacturer(m);
        }
        if let Some(p) = info.product_string() {
            builder = builder.product(p);
        }
        if let Some(s) = info.serial_number() {
            builder = builder.serial_number(s);
        }
        match info.open().wait() {
            Ok(device) => {
                builder = builder.raw_descriptors(device_descriptor_bytes(&device.device_descriptor()))
            }
            Err(e) => log::debug!("{}: descriptor not read: {e}", port_path(&info)),
        }
        let port = builder.build();
        if port.chipset() != Chipset::None {
            ports.push(port);
        }
    }
    Ok(ports)
}

/// The platform USB host, via `nusb`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NusbHost;

impl UsbHost for NusbHost {
    fn is_available(&self) -> bool {
        nusb::list_devices().wait().is_ok()
    }

    fn open(&self, port: &PortDescriptor) -> Result<Box<dyn UsbTransport>> {
        let info = nusb::list_devices()
            .wait()?
            .find(|d| port_path(d) == port.path())
            .ok_or_else(|| Error::DeviceNotFound(port.path().to_string()))?;
        Ok(Box::new(NusbTransport::open(info)?))
    }
}

/// A claimed bridge interface with its bulk endpoint pair.
pub struct NusbTransport {
    #[allow(dead_code)] // Kept to ensure the USB device stays open
    device: nusb::Device,
    interface: nusb::Interface,
    bulk_in: Mutex<Endpoint<Bulk, In>>,
    bulk_out: Mutex<Endpoint<Bulk, Out>>,
    packet_size_in: usize,
    packet_size_out: usize,
    raw_descriptors: Vec<u8>,
}

impl std::fmt::Debug for NusbTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NusbTransport")
            .field("packet_size_in", &self.packet_size_in)
            .field("packet_size_out", &self.packet_size_out)
            .finish_non_exhaustive()
    }
}

impl NusbTransport {
    /// Open the device, detach any kernel driver, claim the serial
    /// interface and resolve its first bulk IN and OUT endpoints.
    pub fn open(info: DeviceInfo) -> Result<Self> {
        let device = info.open().wait()?;
        let interface = device
            .detach_and_claim_interface(SERIAL_INTERFACE)
            .wait()?;

        let mut ep_in = None;
        let mut ep_out = None;
        if let Ok(config) = device.active_configuration() {
            for group in config.interfaces() {
                if group.interface_number() != SERIAL_INTERFACE {
                    continue;
                }
                for alt in group.alt_settings() {
                    for ep in alt.endpoints() {
                        if ep.transfer_type() != TransferType::Bulk {
                            continue;
                        }
                        let slot = match ep.direction() {
                            Direction::In => &mut ep_in,
                            Direction::Out => &mut ep_out,
                        };
                        slot.get_or_insert((ep.address(), ep.max_packet_size()));
                    }
                }
            }
        }
        let ((in_addr, packet_size_in), (out_addr, packet_size_out)) =
            ep_in.zip(ep_out).ok_or(Error::EndpointNotFound)?;

        let raw_descriptors = device_descriptor_bytes(&device.device_descriptor());
        let bulk_in = interface.endpoint::<Bulk, In>(in_addr)?;
        let bulk_out = interface.endpoint::<Bulk, Out>(out_addr)?;
        log::info!(
            "{}: claimed interface {SERIAL_INTERFACE}, bulk in {in_addr:#04x}, out {out_addr:#04x}",
            port_path(&info)
        );

        Ok(Self {
            device,
            interface,
            bulk_in: Mutex::new(bulk_in),
            bulk_out: Mutex::new(bulk_out),
            packet_size_in: nonzero_or_default(packet_size_in),
            packet_size_out: nonzero_or_default(packet_size_out),
            raw_descriptors,
        })
    }
}

fn nonzero_or_default(size: usize) -> usize {
    if size == 0 {
        DEFAULT_PACKET_SIZE
    } else {
        size
    }
}

/// Split a raw `bmRequestType` into `nusb`'s type and recipient.
fn control_kind(request_type: u8) -> (ControlType, Recipient) {
    let control_type = match request_type & 0x60 {
        USB_TYPE_VENDOR => ControlType::Vendor,
        USB_TYPE_CLASS => ControlType::Class,
        _ => ControlType::Standard,
    };
    let recipient = match request_type & 0x1F {
        USB_RECIP_DEVICE => Recipient::Device,
        USB_RECIP_INTERFACE => Recipient::Interface,
        2 => Recipient::Endpoint,
        _ => Recipient::Other,
    };
    (control_type, recipient)
}

impl UsbTransport for NusbTransport {
    fn control_out(&self, setup: ControlSetup, data: &[u8], timeout: Duration) -> Result<usize> {
        let (control_type, recipient) = control_kind(setup.request_type);
        self.interface
            .control_out(
                ControlOut {
                    control_type,
                    recipient,
                    request: setup.request,
                    value: setup.value,
                    index: setup.index,
                    data,
                },
                timeout,
            )
            .wait()?;
        Ok(data.len())
    }

    fn control_in(&self, setup: ControlSetup, length: u16, timeout: Duration) -> Result<Vec<u8>> {
        let (control_type, recipient) = control_kind(setup.request_type);
        let data = self
            .interface
            .control_in(
                ControlIn {
                    control_type,
                    recipient,
                    request: setup.request,
                    value: setup.value,
                    index: setup.index,
                    length,
                },
                timeout,
            )
            .wait()?;
        Ok(data)
    }

    fn bulk_read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        // IN transfers must request whole packets.
        let len = buf.len() / self.packet_size_in * self.packet_size_in;
        if len == 0 {
            return Err(Error::InvalidArgument(
                "read buffer smaller than max packet size",
            ));
        }
        let completion = lock(&self.bulk_in).transfer_blocking(nusb::transfer::Buffer::new(len), timeout);
        match completion.status {
            Ok(()) | Err(nusb::transfer::TransferError::Cancelled) => {}
            Err(e) => return Err(Error::Transfer(e)),
        }
        let n = completion.actual_len.min(buf.len());
        buf[..n].copy_from_slice(&completion.buffer.into_vec()[..n]);
        Ok(n)
    }

    fn bulk_write(&self, data: &[u8], timeout: Duration) -> Result<usize> {
        let mut transfer_buf = nusb::transfer::Buffer::new(data.len());
        transfer_buf.extend_from_slice(data);
        let completion = lock(&self.bulk_out).transfer_blocking(transfer_buf, timeout);
        match completion.status {
            // A timed-out write reports what made it out; the caller
            // treats it as short.
            Ok(()) | Err(nusb::transfer::TransferError::Cancelled) => Ok(completion.actual_len),
            Err(e) => Err(Error::Transfer(e)),
        }
    }

    fn max_packet_size_in(&self) -> usize {
        self.packet_size_in
    }

    fn max_packet_size_out(&self) -> usize {
        self.packet_size_out
    }

    fn raw_descriptors(&self) -> Vec<u8> {
        self.raw_descriptors.clone()
    }
}
