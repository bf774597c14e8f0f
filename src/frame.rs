//! Synchronous frame buffer.
//!
//! In synchronous mode the receive thread appends every chunk to a
//! [`FrameBuffer`] and flags the buffer when the chunk carries the port's
//! end-of-packet marker. A caller waiting in [`FrameBuffer::receive`] is
//! woken on every append, searches with its own marker and takes the first
//! complete frame out, leaving any trailing bytes for the next call.
//!
//! The caller's search starts at a cursor that only moves forward, so
//! bytes that were already searched are not scanned again.
//! [`FrameBuffer::reset_last_position`] moves the cursor to the end of the
//! buffer when a new request is sent: markers in data that arrived before
//! the send can no longer complete a frame.

use std::fmt;
use std::slice;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::port::lock;

/// End-of-packet marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Eop {
    /// One byte sequence.
    Single(Vec<u8>),
    /// Alternative sequences. At the same offset, the first listed wins.
    Any(Vec<Vec<u8>>),
}

impl Eop {
    /// The marker alternatives, in priority order.
    pub fn markers(&self) -> &[Vec<u8>] {
        match self {
            Self::Single(m) => slice::from_ref(m),
            Self::Any(ms) => ms,
        }
    }

    fn longest(&self) -> usize {
        self.markers().iter().map(Vec::len).max().unwrap_or(0)
    }
}

impl From<u8> for Eop {
    fn from(b: u8) -> Self {
        Self::Single(vec![b])
    }
}

impl From<&[u8]> for Eop {
    fn from(bytes: &[u8]) -> Self {
        Self::Single(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Eop {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Single(bytes)
    }
}

impl From<&str> for Eop {
    fn from(s: &str) -> Self {
        Self::Single(s.as_bytes().to_vec())
    }
}

impl fmt::Display for Eop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, marker) in self.markers().iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            for (j, b) in marker.iter().enumerate() {
                if j != 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{b:02X}")?;
            }
        }
        Ok(())
    }
}

/// Outcome of [`FrameBuffer::wait_for_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameWait {
    /// A frame is complete; the whole buffer content.
    Frame(Vec<u8>),
    /// Nothing complete before the timeout.
    Timeout,
}

/// What a synchronous receive waits for, and what it got.
///
/// ```
/// use std::time::Duration;
/// use uartbridge::ReceiveParameters;
///
/// let params = ReceiveParameters::new()
///     .eop(b'\n')
///     .wait_time(Duration::from_secs(1));
/// assert!(params.reply.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveParameters {
    /// Frame terminator. Overrides `count` when set.
    pub eop: Option<Eop>,
    /// Number of bytes to wait for when there is no terminator.
    pub count: usize,
    /// How long to wait. `None` waits forever.
    pub wait_time: Option<Duration>,
    /// Hand back everything buffered, not only the first frame.
    pub all_data: bool,
    /// Leave the bytes in the buffer.
    pub peek: bool,
    /// The received frame.
    pub reply: Option<Vec<u8>>,
}

impl ReceiveParameters {
    /// Wait forever for any data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for a terminator.
    pub fn eop(mut self, eop: impl Into<Eop>) -> Self {
        self.eop = Some(eop.into());
        self
    }

    /// Wait for `count` bytes.
    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Give up after `wait_time`.
    pub fn wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = Some(wait_time);
        self
    }

    /// Return all buffered bytes once the condition is met.
    pub fn all_data(mut self, all_data: bool) -> Self {
        self.all_data = all_data;
        self
    }

    /// Do not remove the returned bytes from the buffer.
    pub fn peek(mut self, peek: bool) -> Self {
        self.peek = peek;
        self
    }
}

#[derive(Debug, Default)]
struct FrameState {
    data: Vec<u8>,
    /// Where the caller's next search starts. Only caller-side searches
    /// and [`FrameBuffer::reset_last_position`] move it forward; it moves
    /// back only when bytes before it are taken out of the buffer.
    last_position: usize,
    /// A frame is complete.
    received: bool,
}

impl FrameState {
    /// End offset of the first marker at or after `start`. Earliest offset
    /// wins, then the first alternative.
    fn find(&self, start: usize, eop: &Eop) -> Option<usize> {
        let start = start.min(self.data.len());
        (start..self.data.len()).find_map(|pos| {
            eop.markers()
                .iter()
                .filter(|m| !m.is_empty())
                .find(|m| self.data[pos..].starts_with(m))
                .map(|m| pos + m.len())
        })
    }

    /// Search for a marker from the cursor. A miss advances the cursor.
    fn search(&mut self, eop: &Eop) -> Option<usize> {
        let found = self.find(self.last_position, eop);
        match found {
            Some(_) => self.received = true,
            None => {
                // Keep a marker split across two appends findable.
                let keep = eop.longest().saturating_sub(1);
                let next = self.data.len().saturating_sub(keep);
                self.last_position = self.last_position.max(next);
            }
        }
        found
    }

    /// Bytes that satisfy `params`, if any.
    fn ready(&mut self, params: &ReceiveParameters) -> Option<usize> {
        let end = match &params.eop {
            Some(eop) => self.search(eop)?,
            None if params.count > 0 => {
                if self.data.len() < params.count {
                    return None;
                }
                params.count
            }
            None if self.data.is_empty() => return None,
            None => self.data.len(),
        };
        Some(if params.all_data {
            self.data.len()
        } else {
            end
        })
    }

    /// Remove the first `n` bytes.
    fn consume(&mut self, n: usize) {
        self.data.drain(..n);
        self.last_position = self.last_position.saturating_sub(n);
        self.received = false;
    }
}

/// Bytes received in synchronous mode, shared between the receive thread
/// and the waiting caller.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    state: Mutex<FrameState>,
    signal: Condvar,
}

impl FrameBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FrameState> {
        lock(&self.state)
    }

    /// Append bytes without searching.
    pub fn append(&self, bytes: &[u8]) {
        self.state().data.extend_from_slice(bytes);
        self.signal.notify_all();
    }

    /// Search for `eop` from the cursor. On a match the frame is flagged
    /// complete and the end offset of the marker is returned.
    pub fn search(&self, eop: &Eop) -> Option<usize> {
        let found = self.state().search(eop);
        if found.is_some() {
            self.signal.notify_all();
        }
        found
    }

    /// Append a chunk and check whether it completes a frame, in one
    /// critical section. Only the new bytes, plus enough of the tail to
    /// catch a marker split across chunks, are checked; the caller's search
    /// cursor is left alone. Without a marker every chunk completes a
    /// frame. Returns whether this chunk completed a frame.
    pub fn append_and_search(&self, bytes: &[u8], eop: Option<&Eop>) -> bool {
        let complete = {
            let mut state = self.state();
            let old_len = state.data.len();
            state.data.extend_from_slice(bytes);
            let complete = match eop {
                Some(eop) => {
                    let tail = old_len.saturating_sub(eop.longest().saturating_sub(1));
                    let start = state.last_position.max(tail);
                    state.find(start, eop).is_some()
                }
                None => true,
            };
            if complete {
                state.received = true;
            }
            complete
        };
        self.signal.notify_all();
        complete
    }

    /// Block until a frame is complete or `timeout` passes.
    ///
    /// The buffer is not consumed; the caller extracts the frame.
    pub fn wait_for_frame(&self, timeout: Duration) -> FrameWait {
        let guard = self.state();
        let (state, _) = self
            .signal
            .wait_timeout_while(guard, timeout, |s| !s.received)
            .unwrap_or_else(|e| e.into_inner());
        if state.received {
            FrameWait::Frame(state.data.clone())
        } else {
            FrameWait::Timeout
        }
    }

    /// Wait until `params` is satisfied and store the frame in
    /// `params.reply`. Returns `false` on timeout.
    pub fn receive(&self, params: &mut ReceiveParameters) -> bool {
        let deadline = params.wait_time.map(|t| Instant::now() + t);
        let mut state = self.state();
        loop {
            if let Some(n) = state.ready(params) {
                params.reply = Some(state.data[..n].to_vec());
                if !params.peek {
                    state.consume(n);
                }
                return true;
            }
            state = match deadline {
                None => self.signal.wait(state).unwrap_or_else(|e| e.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.signal
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
            };
        }
    }

    /// Start a new request: nothing already buffered may complete a frame.
    pub fn reset_last_position(&self) {
        let mut state = self.state();
        state.last_position = state.data.len();
        state.received = false;
    }

    /// Drop everything.
    pub fn reset_received_size(&self) {
        *self.state() = FrameState::default();
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.state().data.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a frame is complete.
    pub fn is_received(&self) -> bool {
        self.state().received
    }
}
