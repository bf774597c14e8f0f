//! Known serial ports.
//!
//! A [`PortDescriptor`] is the identity of one attached bridge device, as
//! produced by enumeration. A [`PortRegistry`] holds the set of attached
//! ports; the enumeration side feeds it through
//! [`add_port`](PortRegistry::add_port) and
//! [`remove_port`](PortRegistry::remove_port), and serial ports and UIs
//! observe it through [`subscribe`](PortRegistry::subscribe).

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender};

use crate::chipset::resolve_chipset;
use crate::types::Chipset;

/// Identity of one attached USB-to-serial bridge.
///
/// The chipset is resolved when the descriptor is built and never changes.
///
/// # Example
///
/// ```
/// use uartbridge::{Chipset, PortDescriptor};
///
/// let port = PortDescriptor::builder("1-4", 0x1A86, 0x7523)
///     .manufacturer("QinHeng Electronics")
///     .product("USB Serial")
///     .build();
/// assert_eq!(port.chipset(), Chipset::Ch34x);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    path: String,
    vendor_id: u16,
    product_id: u16,
    serial_number: Option<String>,
    manufacturer: Option<String>,
    product: Option<String>,
    raw_descriptors: Vec<u8>,
    chipset: Chipset,
}

impl PortDescriptor {
    /// Start building a descriptor for the device at `path`.
    pub fn builder(path: impl Into<String>, vendor_id: u16, product_id: u16) -> PortBuilder {
        PortBuilder {
            path: path.into(),
            vendor_id,
            product_id,
            serial_number: None,
            manufacturer: None,
            product: None,
            raw_descriptors: Vec::new(),
        }
    }

    /// Platform path or handle name; the port's name.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// USB vendor ID.
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// USB product ID.
    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// USB serial number string.
    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    /// USB manufacturer string.
    pub fn manufacturer(&self) -> Option<&str> {
        self.manufacturer.as_deref()
    }

    /// USB product string.
    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    /// Raw device descriptor bytes, empty if they could not be read.
    pub fn raw_descriptors(&self) -> &[u8] {
        &self.raw_descriptors
    }

    /// The resolved chipset.
    pub fn chipset(&self) -> Chipset {
        self.chipset
    }

    /// Multi-line human readable summary, the same text as `Display`.
    pub fn info(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Manufacturer info: {}",
            self.manufacturer.as_deref().unwrap_or("")
        )?;
        if self.vendor_id != 0 {
            writeln!(f, "Vendor ID: {:x}", self.vendor_id)?;
        }
        writeln!(
            f,
            "Product: {} ID: {:x}",
            self.product.as_deref().unwrap_or(""),
            self.product_id
        )?;
        if let Some(serial) = &self.serial_number {
            writeln!(f, "Serial: {serial}")?;
        }
        match self.chipset {
            Chipset::None => writeln!(f, "Chipset: Unknown")?,
            chipset => writeln!(f, "Chipset: {chipset}")?,
        }
        if !self.raw_descriptors.is_empty() {
            write!(f, "Raw: ")?;
            for b in &self.raw_descriptors {
                write!(f, "{b:02X}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Builder for [`PortDescriptor`].
#[derive(Debug, Clone)]
pub struct PortBuilder {
    path: String,
    vendor_id: u16,
    product_id: u16,
    serial_number: Option<String>,
    manufacturer: Option<String>,
    product: Option<String>,
    raw_descriptors: Vec<u8>,
}

impl PortBuilder {
    /// Set the serial number string.
    pub fn serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    /// Set the manufacturer string.
    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set the product string.
    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Set the raw device descriptor bytes.
    pub fn raw_descriptors(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw_descriptors = raw.into();
        self
    }

    /// Resolve the chipset and finish the descriptor.
    pub fn build(self) -> PortDescriptor {
        let chipset = resolve_chipset(
            self.manufacturer.as_deref(),
            self.vendor_id,
            self.product_id,
        );
        PortDescriptor {
            path: self.path,
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            serial_number: self.serial_number,
            manufacturer: self.manufacturer,
            product: self.product,
            raw_descriptors: self.raw_descriptors,
            chipset,
        }
    }
}

/// A change to the set of attached ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    /// A port was attached.
    Added(PortDescriptor),
    /// A port was detached. `index` is its former position in the list.
    Removed {
        /// The detached port.
        port: PortDescriptor,
        /// Former position in [`PortRegistry::ports`].
        index: usize,
    },
}

/// The set of attached ports, shared by every serial port that uses it.
///
/// The registry is owned by whoever enumerates devices and handed to each
/// [`SerialPort`](crate::SerialPort) as an `Arc`.
#[derive(Debug, Default)]
pub struct PortRegistry {
    ports: Mutex<Vec<PortDescriptor>>,
    listeners: Mutex<Vec<Sender<PortEvent>>>,
}

impl PortRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-filled with `ports`. No events are sent.
    pub fn with_ports(ports: impl IntoIterator<Item = PortDescriptor>) -> Self {
        Self {
            ports: Mutex::new(ports.into_iter().collect()),
            listeners: Mutex::default(),
        }
    }

    /// Snapshot of the attached ports.
    pub fn ports(&self) -> Vec<PortDescriptor> {
        lock(&self.ports).clone()
    }

    /// Find a port by name, ignoring ASCII case.
    pub fn find(&self, name: &str) -> Option<PortDescriptor> {
        lock(&self.ports)
            .iter()
            .find(|p| p.path.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Record an attached port and notify listeners. A port whose path is
    /// already known is replaced without a notification.
    pub fn add_port(&self, port: PortDescriptor) {
        {
            let mut ports = lock(&self.ports);
            if let Some(existing) = ports.iter_mut().find(|p| p.path == port.path) {
                *existing = port;
                return;
            }
            ports.push(port.clone());
        }
        log::info!("port added: {}", port.path);
        self.broadcast(PortEvent::Added(port));
    }

    /// Forget a detached port and notify listeners. Returns the removed
    /// descriptor, or `None` if the path was unknown.
    pub fn remove_port(&self, path: &str) -> Option<PortDescriptor> {
        let (port, index) = {
            let mut ports = lock(&self.ports);
            let index = ports.iter().position(|p| p.path == path)?;
            (ports.remove(index), index)
        };
        log::info!("port removed: {path}");
        self.broadcast(PortEvent::Removed {
            port: port.clone(),
            index,
        });
        Some(port)
    }

    /// Receive every subsequent [`PortEvent`].
    pub fn subscribe(&self) -> Receiver<PortEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        lock(&self.listeners).push(tx);
        rx
    }

    fn broadcast(&self, event: PortEvent) {
        lock(&self.listeners).retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ftdi() -> PortDescriptor {
        PortDescriptor::builder("1-2", 0x0403, 0x5FED)
            .manufacturer("FTDI")
            .product("FT232R USB UART")
            .serial_number("A1B2C3")
            .raw_descriptors(vec![0x12, 0x01])
            .build()
    }

    #[test]
    fn builder_resolves_chipset() {
        assert_eq!(ftdi().chipset(), Chipset::Ftdi);
        let unknown = PortDescriptor::builder("1-3", 0x1234, 0x5678).build();
        assert_eq!(unknown.chipset(), Chipset::None);
    }

    #[test]
    fn info_text() {
        let info = ftdi().info();
        assert!(info.starts_with("Manufacturer info: FTDI\n"));
        assert!(info.contains("Vendor ID: 403\n"));
        assert!(info.contains("Product: FT232R USB UART ID: 5fed\n"));
        assert!(info.contains("Serial: A1B2C3\n"));
        assert!(info.contains("Chipset: FTDI\n"));
        assert!(info.contains("Raw: 1201\n"));

        let unknown = PortDescriptor::builder("x", 0, 1).build().info();
        assert!(!unknown.contains("Vendor"));
        assert!(unknown.contains("Chipset: Unknown"));
        assert!(!unknown.contains("Raw"));
    }

    #[test]
    fn find_ignores_case() {
        let registry = PortRegistry::with_ports([
            PortDescriptor::builder("/dev/bus/usb/001/004", 0x1A86, 0x7523).build(),
        ]);
        assert!(registry.find("/DEV/BUS/USB/001/004").is_some());
        assert!(registry.find("/dev/bus/usb/001/005").is_none());
    }

    #[test]
    fn add_and_remove_notify_listeners() {
        let registry = PortRegistry::new();
        let rx = registry.subscribe();

        registry.add_port(ftdi());
        registry.add_port(PortDescriptor::builder("1-5", 0x1A86, 0x7523).build());
        assert_eq!(rx.try_recv().unwrap(), PortEvent::Added(ftdi()));
        assert!(matches!(rx.try_recv().unwrap(), PortEvent::Added(_)));

        let removed = registry.remove_port("1-5").unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            PortEvent::Removed {
                port: removed,
                index: 1
            }
        );
        assert_eq!(registry.ports(), vec![ftdi()]);
        assert!(registry.remove_port("1-5").is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn re_adding_a_known_path_is_silent() {
        let registry = PortRegistry::with_ports([ftdi()]);
        let rx = registry.subscribe();
        registry.add_port(ftdi());
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.ports().len(), 1);
    }

    #[test]
    fn dropped_listener_is_pruned() {
        let registry = PortRegistry::new();
        drop(registry.subscribe());
        let rx = registry.subscribe();
        registry.add_port(ftdi());
        assert!(rx.try_recv().is_ok());
        assert_eq!(lock(&registry.listeners).len(), 1);
    }
}
