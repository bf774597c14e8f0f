//! Background receive loop.
//!
//! One thread per open port polls the bulk IN endpoint. Every read is
//! stripped of chipset status bytes first. With a receive delay
//! configured, reads that follow within the delay are merged into one
//! chunk. Each chunk then goes either to the [`FrameBuffer`] (while a
//! synchronous caller holds a guard) or out as
//! [`MediaEvent::Received`](crate::MediaEvent::Received).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::chipset::ChipsetDriver;
use crate::error::{Error, Result};
use crate::events::{Notifier, TraceKind};
use crate::frame::{Eop, FrameBuffer};
use crate::transport::UsbTransport;

/// How long one idle bulk read waits before checking for a stop request.
pub(crate) const POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// Everything the receive thread needs, captured when the port opens.
pub(crate) struct ReceiveContext {
    pub transport: Arc<dyn UsbTransport>,
    /// Only set for chipsets that prepend status bytes.
    pub driver: Option<ChipsetDriver>,
    pub frames: Arc<FrameBuffer>,
    pub notifier: Arc<Notifier>,
    /// Number of live synchronous guards.
    pub synchronous: Arc<AtomicUsize>,
    pub bytes_received: Arc<AtomicU64>,
    pub eop: Option<Eop>,
    pub receive_delay: Duration,
    pub port: String,
}

/// Handle to a running receive thread. Dropping it stops the thread.
pub(crate) struct ReceiveEngine {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReceiveEngine {
    /// Spawn the receive thread.
    pub(crate) fn start(ctx: ReceiveContext) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            stop: Arc::clone(&stop),
            packet_size: ctx.transport.max_packet_size_in().max(1),
            ctx,
        };
        let handle = thread::Builder::new()
            .name(format!("uartbridge-rx {}", worker.ctx.port))
            .spawn(move || worker.run())
            .map_err(Error::Thread)?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Ask the thread to stop and wait until it has exited.
    pub(crate) fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("receive thread panicked");
            }
        }
    }
}

impl Drop for ReceiveEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    ctx: ReceiveContext,
    stop: Arc<AtomicBool>,
    packet_size: usize,
}

impl Worker {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn run(self) {
        log::debug!("{}: receive thread started", self.ctx.port);
        let mut buf = vec![0u8; self.packet_size];
        while !self.stopping() {
            match self.next_chunk(&mut buf) {
                Ok(Some(chunk)) => {
                    if self.stopping() {
                        break;
                    }
                    self.dispatch(chunk);
                }
                Ok(None) => {}
                Err(e) => {
                    if self.stopping() {
                        break;
                    }
                    let gone = e.is_disconnected();
                    self.ctx.notifier.error(e);
                    if gone {
                        break;
                    }
                    // A stuck endpoint fails every read; report once per poll.
                    thread::sleep(POLL_TIMEOUT);
                }
            }
        }
        log::debug!("{}: receive thread stopped", self.ctx.port);
    }

    /// One bulk read. Returns the raw and the post-strip length.
    fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<(usize, usize)> {
        let raw = self.ctx.transport.bulk_read(buf, timeout)?;
        let len = match &self.ctx.driver {
            Some(driver) if raw > 0 => driver.strip_status(buf, raw, self.packet_size),
            _ => raw,
        };
        Ok((raw, len))
    }

    /// Read the next chunk, merging follow-up packets within the receive
    /// delay. `None` means nothing arrived or a stop came in mid-chunk.
    fn next_chunk(&self, buf: &mut [u8]) -> Result<Option<Vec<u8>>> {
        let (_, len) = self.read(buf, POLL_TIMEOUT)?;
        if len == 0 {
            return Ok(None);
        }
        let mut chunk = buf[..len].to_vec();

        let delay = self.ctx.receive_delay;
        if !delay.is_zero() {
            let start = Instant::now();
            loop {
                if self.stopping() {
                    return Ok(None);
                }
                let remaining = delay.saturating_sub(start.elapsed());
                if remaining < Duration::from_millis(1) {
                    break;
                }
                let (raw, len) = self.read(buf, remaining)?;
                if raw == 0 {
                    break;
                }
                chunk.extend_from_slice(&buf[..len]);
            }
        }
        Ok(Some(chunk))
    }

    fn dispatch(&self, chunk: Vec<u8>) {
        self.ctx
            .bytes_received
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);

        if self.ctx.synchronous.load(Ordering::Acquire) > 0 {
            let complete = self
                .ctx
                .frames
                .append_and_search(&chunk, self.ctx.eop.as_ref());
            if complete {
                self.ctx.notifier.trace(TraceKind::Received, "", &chunk);
            }
        } else {
            self.ctx.frames.reset_received_size();
            self.ctx.notifier.received(chunk, &self.ctx.port);
        }
    }
}
