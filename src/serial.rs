//! The serial port facade.
//!
//! [`SerialPort`] owns the line configuration and, while open, the claimed
//! transport, the chipset driver and the receive thread. Everything a
//! listener may want to know is published through
//! [`subscribe`](SerialPort::subscribe).

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::chipset::ChipsetDriver;
use crate::config::LineConfiguration;
use crate::error::{Error, Result};
use crate::events::{MediaEvent, Notifier, TraceKind};
use crate::frame::{Eop, FrameBuffer, ReceiveParameters};
use crate::port::{PortDescriptor, PortEvent, PortRegistry};
use crate::receiver::{ReceiveContext, ReceiveEngine};
use crate::settings::PortSettings;
use crate::transport::{UsbHost, UsbTransport};
use crate::types::{BaudRate, DataBits, LineSignal, MediaState, Parity, StopBits, TraceLevel};
use crate::usb::NusbHost;

/// Baud rates offered for selection.
const AVAILABLE_BAUD_RATES: [BaudRate; 8] = [
    BaudRate::Baud300,
    BaudRate::Baud600,
    BaudRate::Baud1200,
    BaudRate::Baud2400,
    BaudRate::Baud4800,
    BaudRate::Baud9600,
    BaudRate::Baud19200,
    BaudRate::Baud38400,
];

/// Resources that only exist while the port is open.
struct Connection {
    transport: Arc<dyn UsbTransport>,
    driver: ChipsetDriver,
    engine: ReceiveEngine,
}

/// A serial port behind a USB-to-serial bridge.
///
/// Configuration setters may be called at any time. Changes made while the
/// port is open are stored and take effect at the next [`open`](Self::open).
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use uartbridge::{BaudRate, PortRegistry, ReceiveParameters, SerialPort};
///
/// # fn main() -> uartbridge::Result<()> {
/// let registry = Arc::new(PortRegistry::with_ports(uartbridge::usb::list_ports()?));
/// let mut port = SerialPort::with_nusb(registry);
/// port.set_port_name("1-4")?;
/// port.set_baud_rate(BaudRate::Baud115200);
/// port.set_eop(b'\n');
/// port.open()?;
///
/// let _sync = port.synchronous();
/// port.send(b"ID?\n")?;
/// let mut reply = ReceiveParameters::new().wait_time(Duration::from_secs(1));
/// if port.receive(&mut reply)? {
///     println!("{:?}", reply.reply);
/// }
/// # Ok(())
/// # }
/// ```
pub struct SerialPort {
    host: Arc<dyn UsbHost>,
    registry: Arc<PortRegistry>,
    port: Option<PortDescriptor>,
    config: LineConfiguration,
    eop: Option<Eop>,
    notifier: Arc<Notifier>,
    frames: Arc<FrameBuffer>,
    synchronous: Arc<AtomicUsize>,
    bytes_sent: AtomicU64,
    bytes_received: Arc<AtomicU64>,
    connection: Option<Connection>,
}

impl fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialPort")
            .field("port", &self.name())
            .field("config", &self.config)
            .field("eop", &self.eop)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl SerialPort {
    /// A closed port with the default configuration and no port selected.
    pub fn new(host: Arc<dyn UsbHost>, registry: Arc<PortRegistry>) -> Self {
        Self {
            host,
            registry,
            port: None,
            config: LineConfiguration::default(),
            eop: None,
            notifier: Arc::new(Notifier::new()),
            frames: Arc::new(FrameBuffer::new()),
            synchronous: Arc::new(AtomicUsize::new(0)),
            bytes_sent: AtomicU64::new(0),
            bytes_received: Arc::new(AtomicU64::new(0)),
            connection: None,
        }
    }

    /// A port on the platform USB stack.
    pub fn with_nusb(registry: Arc<PortRegistry>) -> Self {
        Self::new(Arc::new(NusbHost), registry)
    }

    /// Receive every subsequent [`MediaEvent`] of this port.
    pub fn subscribe(&self) -> Receiver<MediaEvent> {
        self.notifier.subscribe()
    }

    /// Ports currently known to the registry.
    pub fn ports(&self) -> Vec<PortDescriptor> {
        self.registry.ports()
    }

    /// Follow ports being attached and detached.
    pub fn subscribe_ports(&self) -> Receiver<PortEvent> {
        self.registry.subscribe()
    }

    /// Open the selected port.
    ///
    /// Any existing connection is closed first. On failure every partially
    /// acquired resource is released and the port stays closed.
    pub fn open(&mut self) -> Result<()> {
        self.close();
        let port = self.port.clone().ok_or(Error::PortNotSelected)?;
        if !self.host.is_available() {
            return Err(Error::UsbHostUnavailable);
        }

        self.frames.reset_last_position();
        self.notifier.state_changed(MediaState::Opening);
        self.trace_settings(&port);
        if let Err(e) = self.connect(&port) {
            log::warn!("{}: open failed: {e}", port.path());
            self.close();
            // Listeners saw Opening; leave them at Closed.
            self.notifier.state_changed(MediaState::Closing);
            self.notifier.state_changed(MediaState::Closed);
            return Err(e);
        }
        log::info!("{}: opened as {}", port.path(), port.chipset());
        self.notifier.state_changed(MediaState::Open);
        Ok(())
    }

    fn trace_settings(&self, port: &PortDescriptor) {
        if !self.notifier.traces(TraceKind::Info) {
            return;
        }
        let eop = self
            .eop
            .as_ref()
            .map_or_else(|| "None".to_string(), Eop::to_string);
        self.notifier.trace(
            TraceKind::Info,
            format!(
                "Settings: Port: {} Baud Rate: {} Data Bits: {} Parity: {} Stop Bits: {} Eop: {}",
                port.path(),
                self.config.baud_rate,
                self.config.data_bits,
                self.config.parity,
                self.config.stop_bits,
                eop
            ),
            &[],
        );
    }

    /// Claim the device, program the chipset and start receiving. Nothing
    /// is kept unless every step succeeds.
    fn connect(&mut self, port: &PortDescriptor) -> Result<()> {
        let transport: Arc<dyn UsbTransport> = Arc::from(self.host.open(port)?);
        let mut driver = ChipsetDriver::new(port.chipset()).ok_or(Error::UnknownChipset {
            vendor_id: port.vendor_id(),
            product_id: port.product_id(),
        })?;
        driver.open(transport.as_ref(), &self.config, &transport.raw_descriptors())?;

        let engine = ReceiveEngine::start(ReceiveContext {
            transport: Arc::clone(&transport),
            driver: driver.filters_status().then(|| driver.clone()),
            frames: Arc::clone(&self.frames),
            notifier: Arc::clone(&self.notifier),
            synchronous: Arc::clone(&self.synchronous),
            bytes_received: Arc::clone(&self.bytes_received),
            eop: self.eop.clone(),
            receive_delay: self.config.receive_delay,
            port: port.path().to_string(),
        })?;
        self.connection = Some(Connection {
            transport,
            driver,
            engine,
        });
        Ok(())
    }

    /// Close the port. Calling this on a closed port does nothing.
    pub fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            self.notifier.state_changed(MediaState::Closing);
            // The receive thread must be gone before the transport is released.
            connection.engine.stop();
            drop(connection);
            log::info!("{}: closed", self.name());
            self.notifier.state_changed(MediaState::Closed);
        }
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
        self.frames.reset_received_size();
    }

    /// Whether a connection is open.
    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// Connection state.
    pub fn state(&self) -> MediaState {
        if self.is_open() {
            MediaState::Open
        } else {
            MediaState::Closed
        }
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(Error::NotOpen)
    }

    /// Write `data` to the device.
    ///
    /// The data is split into chunks of the endpoint's max packet size. A
    /// chunk the device does not accept completely fails the whole send.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        let connection = self.connection()?;
        self.notifier.trace(TraceKind::Sent, "", data);
        self.frames.reset_last_position();

        let chunk_size = connection.transport.max_packet_size_out().max(1);
        for chunk in data.chunks(chunk_size) {
            let written = connection
                .transport
                .bulk_write(chunk, self.config.write_timeout)?;
            if written != chunk.len() {
                return Err(Error::ShortWrite {
                    expected: chunk.len(),
                    actual: written,
                });
            }
        }
        self.bytes_sent
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Wait for a reply matching `params`. Returns `false` on timeout.
    ///
    /// Data only reaches the frame buffer while a [`SyncGuard`] from
    /// [`synchronous`](Self::synchronous) is alive.
    pub fn receive(&self, params: &mut ReceiveParameters) -> Result<bool> {
        self.connection()?;
        if params.eop.is_none() && params.count == 0 {
            params.eop = self.eop.clone();
        }
        Ok(self.frames.receive(params))
    }

    /// Route received data to [`receive`](Self::receive) instead of
    /// [`MediaEvent::Received`] until the guard is dropped.
    pub fn synchronous(&self) -> SyncGuard {
        self.synchronous.fetch_add(1, Ordering::AcqRel);
        SyncGuard {
            count: Arc::clone(&self.synchronous),
        }
    }

    /// Whether any [`SyncGuard`] is alive.
    pub fn is_synchronous(&self) -> bool {
        self.synchronous.load(Ordering::Acquire) > 0
    }

    /// Drop everything waiting in the synchronous buffer.
    pub fn reset_synchronous_buffer(&self) {
        self.frames.reset_received_size();
    }

    /// Bytes written since open or the last counter reset.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Payload bytes received since open or the last counter reset.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Zero both byte counters.
    pub fn reset_byte_counters(&self) {
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
    }

    fn line_signal(&self, signal: LineSignal) -> Result<bool> {
        let connection = self.connection()?;
        connection
            .driver
            .line_signal(connection.transport.as_ref(), signal)
    }

    fn set_line_signal(&mut self, signal: LineSignal, value: bool, name: &'static str) -> Result<()> {
        let changed = self.line_signal(signal)? != value;
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;
        connection
            .driver
            .set_line_signal(connection.transport.as_ref(), signal, value)?;
        if changed {
            self.notifier.property_changed(name);
        }
        Ok(())
    }

    /// State of the DTR line.
    pub fn dtr_enable(&self) -> Result<bool> {
        self.line_signal(LineSignal::Dtr)
    }

    /// Drive the DTR line.
    pub fn set_dtr_enable(&mut self, value: bool) -> Result<()> {
        self.set_line_signal(LineSignal::Dtr, value, "DtrEnable")
    }

    /// State of the RTS line.
    pub fn rts_enable(&self) -> Result<bool> {
        self.line_signal(LineSignal::Rts)
    }

    /// Drive the RTS line.
    pub fn set_rts_enable(&mut self, value: bool) -> Result<()> {
        self.set_line_signal(LineSignal::Rts, value, "RtsEnable")
    }

    /// The selected port, if any.
    pub fn port(&self) -> Option<&PortDescriptor> {
        self.port.as_ref()
    }

    /// Select a port, or deselect with `None`.
    pub fn set_port(&mut self, port: Option<PortDescriptor>) {
        if self.port != port {
            self.port = port;
            self.notifier.property_changed("PortName");
        }
    }

    /// Select a known port by name, ignoring case.
    pub fn set_port_name(&mut self, name: &str) -> Result<()> {
        let port = self
            .registry
            .find(name)
            .ok_or_else(|| Error::DeviceNotFound(name.to_string()))?;
        self.set_port(Some(port));
        Ok(())
    }

    /// The selected port's name, or an empty string.
    pub fn name(&self) -> &str {
        self.port.as_ref().map_or("", PortDescriptor::path)
    }

    /// Always `"Serial"`.
    pub fn media_type(&self) -> &'static str {
        "Serial"
    }

    /// Fail when no port is selected.
    pub fn validate(&self) -> Result<()> {
        if self.port.is_none() {
            return Err(Error::PortNotSelected);
        }
        Ok(())
    }

    /// The current line configuration.
    pub fn config(&self) -> &LineConfiguration {
        &self.config
    }

    fn update<T: PartialEq>(
        notifier: &Notifier,
        field: &mut T,
        value: T,
        name: &'static str,
    ) {
        if *field != value {
            *field = value;
            notifier.property_changed(name);
        }
    }

    /// Set the baud rate.
    pub fn set_baud_rate(&mut self, value: BaudRate) {
        Self::update(&self.notifier, &mut self.config.baud_rate, value, "BaudRate");
    }

    /// Set the data bits.
    pub fn set_data_bits(&mut self, value: DataBits) {
        Self::update(&self.notifier, &mut self.config.data_bits, value, "DataBits");
    }

    /// Set the parity.
    pub fn set_parity(&mut self, value: Parity) {
        Self::update(&self.notifier, &mut self.config.parity, value, "Parity");
    }

    /// Set the stop bits.
    pub fn set_stop_bits(&mut self, value: StopBits) {
        Self::update(&self.notifier, &mut self.config.stop_bits, value, "StopBits");
    }

    /// Set the timeout for control and bulk IN transfers.
    pub fn set_read_timeout(&mut self, value: Duration) {
        Self::update(&self.notifier, &mut self.config.read_timeout, value, "ReadTimeout");
    }

    /// Set the timeout for bulk OUT transfers.
    pub fn set_write_timeout(&mut self, value: Duration) {
        Self::update(&self.notifier, &mut self.config.write_timeout, value, "WriteTimeout");
    }

    /// Set the window in which consecutive packets are merged.
    pub fn set_receive_delay(&mut self, value: Duration) {
        Self::update(&self.notifier, &mut self.config.receive_delay, value, "ReceiveDelay");
    }

    /// The end-of-packet marker for synchronous receives.
    pub fn eop(&self) -> Option<&Eop> {
        self.eop.as_ref()
    }

    /// Set the end-of-packet marker.
    pub fn set_eop(&mut self, eop: impl Into<Eop>) {
        Self::update(&self.notifier, &mut self.eop, Some(eop.into()), "Eop");
    }

    /// Remove the end-of-packet marker.
    pub fn clear_eop(&mut self) {
        Self::update(&self.notifier, &mut self.eop, None, "Eop");
    }

    /// Trace verbosity.
    pub fn trace(&self) -> TraceLevel {
        self.notifier.trace_level()
    }

    /// Set trace verbosity.
    pub fn set_trace(&mut self, level: TraceLevel) {
        if self.notifier.set_trace_level(level) {
            self.notifier.property_changed("Trace");
        }
    }

    /// Baud rates offered for selection.
    pub fn available_baud_rates() -> &'static [BaudRate] {
        &AVAILABLE_BAUD_RATES
    }

    /// Copy the port selection and line settings of `other`.
    pub fn copy_from(&mut self, other: &SerialPort) {
        self.set_port(other.port.clone());
        self.set_baud_rate(other.config.baud_rate);
        self.set_stop_bits(other.config.stop_bits);
        self.set_parity(other.config.parity);
        self.set_data_bits(other.config.data_bits);
    }

    /// Serialize the persisted settings.
    pub fn settings(&self) -> Result<String> {
        PortSettings::from_config(self.port.as_ref().map(PortDescriptor::path), &self.config)
            .to_xml()
    }

    /// Load persisted settings. Fields missing from `text` revert to their
    /// defaults; a port the registry does not know deselects the port.
    pub fn set_settings(&mut self, text: &str) -> Result<()> {
        let settings = PortSettings::parse(text)?;
        let port = settings.port.as_deref().and_then(|name| self.registry.find(name));
        if settings.port.is_some() && port.is_none() {
            log::warn!("settings name unknown port {:?}", settings.port);
        }
        self.set_port(port);
        self.set_baud_rate(settings.baud_rate);
        self.set_stop_bits(settings.stop_bits);
        self.set_parity(settings.parity);
        self.set_data_bits(settings.data_bits);
        Ok(())
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        self.close();
    }
}

/// Keeps a [`SerialPort`] in synchronous mode while alive.
#[derive(Debug)]
#[must_use = "synchronous mode ends when the guard is dropped"]
pub struct SyncGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}
