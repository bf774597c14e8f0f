//! Notifications for listeners of a serial port.
//!
//! Every [`SerialPort`](crate::SerialPort) owns a [`Notifier`] shared with
//! its receive thread. Listeners call
//! [`subscribe`](crate::SerialPort::subscribe) and get a channel of
//! [`MediaEvent`]s. Events are sent from whichever thread raised them;
//! moving them to a UI thread is up to the listener.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crossbeam_channel::{Receiver, Sender};

use crate::error::Error;
use crate::port::lock;
use crate::types::{MediaState, TraceLevel};

/// Category of a trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceKind {
    /// An error occurred.
    Error,
    /// Something unexpected but recoverable.
    Warning,
    /// State changes and settings.
    Info,
    /// Bytes written to the device.
    Sent,
    /// Bytes read from the device.
    Received,
}

impl TraceKind {
    /// Lowest trace level at which this kind is emitted.
    pub fn level(self) -> TraceLevel {
        match self {
            Self::Error => TraceLevel::Error,
            Self::Warning => TraceLevel::Warning,
            Self::Info => TraceLevel::Info,
            Self::Sent | Self::Received => TraceLevel::Verbose,
        }
    }
}

/// Human readable diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// When the event was raised.
    pub timestamp: SystemTime,
    /// Category.
    pub kind: TraceKind,
    /// Description.
    pub message: String,
    /// Payload for `Sent`/`Received`.
    pub data: Vec<u8>,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.kind, self.message)?;
        for b in &self.data {
            write!(f, " {b:02X}")?;
        }
        Ok(())
    }
}

/// Something a listener may want to know about.
#[derive(Debug, Clone)]
pub enum MediaEvent {
    /// An error in the background, typically from the receive thread.
    Error(Arc<Error>),
    /// Data received while no synchronous caller is waiting.
    Received {
        /// Payload with status headers removed.
        data: Vec<u8>,
        /// Name of the port it came from.
        port: String,
    },
    /// Connection lifecycle change.
    MediaStateChanged(MediaState),
    /// Diagnostic text, filtered by the port's [`TraceLevel`].
    Trace(TraceEvent),
    /// A configuration property changed. Carries the property name.
    PropertyChanged(&'static str),
}

#[derive(Debug, Default)]
struct Listeners {
    senders: Vec<Sender<MediaEvent>>,
    trace: TraceLevel,
}

/// Fan-out of [`MediaEvent`]s to every subscriber.
///
/// Subscribers whose receiver was dropped are forgotten on the next send.
#[derive(Debug, Default)]
pub struct Notifier {
    inner: Mutex<Listeners>,
}

impl Notifier {
    /// A notifier with no subscribers and tracing off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every subsequent event.
    pub fn subscribe(&self) -> Receiver<MediaEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        lock(&self.inner).senders.push(tx);
        rx
    }

    /// Current trace level.
    pub fn trace_level(&self) -> TraceLevel {
        lock(&self.inner).trace
    }

    /// Change the trace level. Returns whether it changed.
    pub fn set_trace_level(&self, level: TraceLevel) -> bool {
        let mut inner = lock(&self.inner);
        let changed = inner.trace != level;
        inner.trace = level;
        changed
    }

    /// Whether traces of `kind` are currently emitted.
    pub fn traces(&self, kind: TraceKind) -> bool {
        self.trace_level() >= kind.level()
    }

    fn send(&self, event: MediaEvent) {
        lock(&self.inner)
            .senders
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Emit a trace event if the level allows it.
    pub fn trace(&self, kind: TraceKind, message: impl Into<String>, data: &[u8]) {
        if !self.traces(kind) {
            return;
        }
        self.send(MediaEvent::Trace(TraceEvent {
            timestamp: SystemTime::now(),
            kind,
            message: message.into(),
            data: data.to_vec(),
        }));
    }

    /// Report an error, with an error trace when enabled.
    pub fn error(&self, error: Error) {
        log::warn!("{error}");
        let message = error.to_string();
        self.send(MediaEvent::Error(Arc::new(error)));
        self.trace(TraceKind::Error, message, &[]);
    }

    /// Deliver received bytes.
    pub fn received(&self, data: Vec<u8>, port: &str) {
        self.trace(TraceKind::Received, "", &data);
        self.send(MediaEvent::Received {
            data,
            port: port.to_string(),
        });
    }

    /// Announce a lifecycle change.
    pub fn state_changed(&self, state: MediaState) {
        self.trace(TraceKind::Info, format!("{state:?}"), &[]);
        self.send(MediaEvent::MediaStateChanged(state));
    }

    /// Announce a changed property.
    pub fn property_changed(&self, name: &'static str) {
        self.send(MediaEvent::PropertyChanged(name));
    }
}
