//! End-to-end tests of `SerialPort` over a scripted USB host.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::Receiver;
use uartbridge::{
    ControlSetup, Error, MediaEvent, MediaState, PortDescriptor, PortRegistry, ReceiveParameters,
    Result, SerialPort, TraceKind, TraceLevel, UsbHost, UsbTransport,
};

/// Bridge device that replays queued IN packets and records OUT packets.
#[derive(Default)]
struct ScriptedDevice {
    inbound: Mutex<VecDeque<Vec<u8>>>,
    outbound: Mutex<Vec<Vec<u8>>>,
    controls: Mutex<Vec<ControlSetup>>,
    /// Accept at most this many bytes per bulk write.
    accept: Option<usize>,
    packet_size: usize,
}

impl ScriptedDevice {
    fn new(packet_size: usize) -> Self {
        Self {
            packet_size,
            ..Default::default()
        }
    }

    fn push(&self, packet: &[u8]) {
        self.inbound.lock().unwrap().push_back(packet.to_vec());
    }
}

struct Handle(Arc<ScriptedDevice>);

impl UsbTransport for Handle {
    fn control_out(&self, setup: ControlSetup, data: &[u8], _: Duration) -> Result<usize> {
        self.0.controls.lock().unwrap().push(setup);
        Ok(data.len())
    }

    fn control_in(&self, setup: ControlSetup, length: u16, _: Duration) -> Result<Vec<u8>> {
        self.0.controls.lock().unwrap().push(setup);
        Ok(vec![0; length as usize])
    }

    fn bulk_read(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        match self.0.inbound.lock().unwrap().pop_front() {
            Some(packet) => {
                buf[..packet.len()].copy_from_slice(&packet);
                Ok(packet.len())
            }
            None => {
                std::thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(0)
            }
        }
    }

    fn bulk_write(&self, data: &[u8], _: Duration) -> Result<usize> {
        let n = self.0.accept.map_or(data.len(), |a| a.min(data.len()));
        self.0.outbound.lock().unwrap().push(data[..n].to_vec());
        Ok(n)
    }

    fn max_packet_size_in(&self) -> usize {
        self.0.packet_size
    }

    fn max_packet_size_out(&self) -> usize {
        self.0.packet_size
    }

    fn raw_descriptors(&self) -> Vec<u8> {
        vec![0x12, 0x01, 0x00, 0x02, 0, 0, 0, 0x40]
    }
}

struct ScriptedHost {
    available: bool,
    device: Option<Arc<ScriptedDevice>>,
}

impl UsbHost for ScriptedHost {
    fn is_available(&self) -> bool {
        self.available
    }

    fn open(&self, port: &PortDescriptor) -> Result<Box<dyn UsbTransport>> {
        match &self.device {
            Some(device) => Ok(Box::new(Handle(Arc::clone(device)))),
            None => Err(Error::DeviceNotFound(port.path().to_string())),
        }
    }
}

fn cp210x() -> PortDescriptor {
    PortDescriptor::builder("1-7", 0x10C4, 0xEA60)
        .manufacturer("Silicon Labs")
        .product("CP2102 USB to UART Bridge Controller")
        .build()
}

fn open_port(device: &Arc<ScriptedDevice>) -> SerialPort {
    let host = ScriptedHost {
        available: true,
        device: Some(Arc::clone(device)),
    };
    let registry = Arc::new(PortRegistry::with_ports([cp210x()]));
    let mut port = SerialPort::new(Arc::new(host), registry);
    port.set_port_name("1-7").unwrap();
    port.open().unwrap();
    port
}

fn next_data(events: &Receiver<MediaEvent>) -> Vec<u8> {
    loop {
        match events.recv_timeout(Duration::from_secs(2)) {
            Ok(MediaEvent::Received { data, port }) => {
                assert_eq!(port, "1-7");
                return data;
            }
            Ok(_) => continue,
            Err(e) => panic!("no data: {e}"),
        }
    }
}

#[test]
fn close_twice_and_before_open() {
    let device = Arc::new(ScriptedDevice::new(64));
    let mut port = open_port(&device);
    port.close();
    port.close();
    assert!(!port.is_open());
    assert_eq!(port.bytes_sent(), 0);
    assert_eq!(port.bytes_received(), 0);
}

#[test]
fn open_without_usb_host() {
    let host = ScriptedHost {
        available: false,
        device: None,
    };
    let mut port = SerialPort::new(Arc::new(host), Arc::new(PortRegistry::with_ports([cp210x()])));
    port.set_port_name("1-7").unwrap();
    let err = port.open().unwrap_err();
    assert!(matches!(err, Error::UsbHostUnavailable));
    assert!(!port.is_open());
}

#[test]
fn open_detached_device() {
    let host = ScriptedHost {
        available: true,
        device: None,
    };
    let mut port = SerialPort::new(Arc::new(host), Arc::new(PortRegistry::with_ports([cp210x()])));
    port.set_port_name("1-7").unwrap();
    let events = port.subscribe();
    assert!(matches!(port.open(), Err(Error::DeviceNotFound(_))));
    // The port never reached Open and listeners end at Closed.
    let states: Vec<_> = events
        .try_iter()
        .filter_map(|e| match e {
            MediaEvent::MediaStateChanged(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        [MediaState::Opening, MediaState::Closing, MediaState::Closed]
    );
}

#[test]
fn cp210x_is_programmed_on_open() {
    let device = Arc::new(ScriptedDevice::new(64));
    let _port = open_port(&device);
    let requests: Vec<_> = device
        .controls
        .lock()
        .unwrap()
        .iter()
        .map(|s| (s.request_type, s.request))
        .collect();
    assert_eq!(
        requests,
        [
            (0x41, 0x00),
            (0x41, 0x12),
            (0x41, 0x1E),
            (0x41, 0x03),
            (0x41, 0x13),
            (0x41, 0x07)
        ]
    );
}

#[test]
fn send_is_chunked_and_counted() {
    let device = Arc::new(ScriptedDevice::new(8));
    let port = open_port(&device);
    port.send(&[0xAA; 20]).unwrap();
    let sizes: Vec<_> = device.outbound.lock().unwrap().iter().map(Vec::len).collect();
    assert_eq!(sizes, [8, 8, 4]);
    assert_eq!(port.bytes_sent(), 20);
    port.reset_byte_counters();
    assert_eq!(port.bytes_sent(), 0);
}

#[test]
fn short_write_fails_send() {
    let device = Arc::new(ScriptedDevice {
        accept: Some(3),
        ..ScriptedDevice::new(8)
    });
    let port = open_port(&device);
    match port.send(b"hello") {
        Err(Error::ShortWrite { expected, actual }) => {
            assert_eq!(expected, 5);
            assert_eq!(actual, 3);
        }
        other => panic!("expected short write, got {other:?}"),
    }
    assert_eq!(port.bytes_sent(), 0);
}

#[test]
fn asynchronous_data_arrives_as_events() {
    let device = Arc::new(ScriptedDevice::new(64));
    let port = open_port(&device);
    let events = port.subscribe();
    device.push(b"ping");
    assert_eq!(next_data(&events), b"ping");
    assert_eq!(port.bytes_received(), 4);
}

#[test]
fn synchronous_request_response() {
    let device = Arc::new(ScriptedDevice::new(64));
    let mut port = open_port(&device);
    port.set_eop(b'\n');
    // The marker is captured at open.
    port.open().unwrap();

    let _sync = port.synchronous();
    port.send(b"ID?\n").unwrap();
    device.push(b"UART");
    device.push(b"BRIDGE\nNEXT");

    let mut params = ReceiveParameters::new().wait_time(Duration::from_secs(2));
    assert!(port.receive(&mut params).unwrap());
    assert_eq!(params.reply.as_deref(), Some(&b"UARTBRIDGE\n"[..]));

    // Trailing bytes stay for the next caller.
    let mut rest = ReceiveParameters::new()
        .count(4)
        .wait_time(Duration::from_secs(2));
    assert!(port.receive(&mut rest).unwrap());
    assert_eq!(rest.reply.as_deref(), Some(&b"NEXT"[..]));
}

#[test]
fn caller_marker_overrides_port_marker() {
    let device = Arc::new(ScriptedDevice::new(64));
    let mut port = open_port(&device);
    port.set_eop(b'\n');
    port.open().unwrap();

    let _sync = port.synchronous();
    port.send(b"GET\n").unwrap();
    device.push(b"12;34");
    device.push(b"\n");

    let mut field = ReceiveParameters::new()
        .eop(b';')
        .wait_time(Duration::from_secs(2));
    assert!(port.receive(&mut field).unwrap());
    assert_eq!(field.reply.as_deref(), Some(&b"12;"[..]));

    let mut line = ReceiveParameters::new().wait_time(Duration::from_secs(2));
    assert!(port.receive(&mut line).unwrap());
    assert_eq!(line.reply.as_deref(), Some(&b"34\n"[..]));
}

#[test]
fn synchronous_receive_times_out() {
    let device = Arc::new(ScriptedDevice::new(64));
    let port = open_port(&device);
    let _sync = port.synchronous();
    let mut params = ReceiveParameters::new()
        .eop(b'\n')
        .wait_time(Duration::from_millis(50));
    assert!(!port.receive(&mut params).unwrap());
    assert!(params.reply.is_none());
}

#[test]
fn open_traces_settings_at_info() {
    let device = Arc::new(ScriptedDevice::new(64));
    let host = ScriptedHost {
        available: true,
        device: Some(Arc::clone(&device)),
    };
    let mut port = SerialPort::new(Arc::new(host), Arc::new(PortRegistry::with_ports([cp210x()])));
    port.set_port_name("1-7").unwrap();
    port.set_trace(TraceLevel::Info);
    let events = port.subscribe();
    port.open().unwrap();

    let settings = events
        .try_iter()
        .find_map(|e| match e {
            MediaEvent::Trace(t) if t.kind == TraceKind::Info && t.message.starts_with("Settings") => {
                Some(t.message)
            }
            _ => None,
        })
        .expect("settings trace");
    assert_eq!(
        settings,
        "Settings: Port: 1-7 Baud Rate: 9600 Data Bits: 8 Parity: None Stop Bits: One Eop: None"
    );
}

#[test]
fn copy_from_takes_port_and_line() {
    let device = Arc::new(ScriptedDevice::new(64));
    let mut source = open_port(&device);
    source.set_baud_rate(uartbridge::BaudRate::Baud4800);
    let host = ScriptedHost {
        available: true,
        device: None,
    };
    let mut target = SerialPort::new(Arc::new(host), Arc::new(PortRegistry::new()));
    target.copy_from(&source);
    assert_eq!(target.name(), "1-7");
    assert_eq!(target.config().baud_rate, uartbridge::BaudRate::Baud4800);
    assert_eq!(target.media_type(), "Serial");
}
