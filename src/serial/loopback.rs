//! In-memory loopback device
//!
//! Behaves like a serial port with a loopback plug fitted: every written byte
//! comes back on the read side, DTR is wired to DSR/DCD and RTS to CTS. A
//! [`LoopbackPeer`] plays the far end. It can inject input, inspect what was
//! transmitted and count driver calls.

use crate::error::{Error, Result};
use crate::serial::attributes::{Attributes, Direction, FlushQueue, ModemBits, ModemSignal};
use crate::serial::driver::{remaining, Driver};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

#[derive(Debug, Default)]
struct State {
    rx: VecDeque<u8>,
    transmitted: Vec<u8>,
    attributes: Attributes,
    modem: ModemBits,
    echo: bool,
    calls: usize,
    disconnected: bool,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    readable: Condvar,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Loopback [`Driver`]
#[derive(Debug)]
pub struct Loopback {
    shared: Arc<Shared>,
    name: String,
}

/// Far end of a [`Loopback`]
#[derive(Debug, Clone)]
pub struct LoopbackPeer {
    shared: Arc<Shared>,
}

impl Loopback {
    /// Loopback that echoes written bytes back to the reader
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Loopback whose input only comes from [`LoopbackPeer::feed`]
    pub fn without_echo() -> Self {
        Self::build(false)
    }

    fn build(echo: bool) -> Self {
        let shared = Arc::new(Shared::default());
        shared.state().echo = echo;
        Self {
            shared,
            name: String::from("loopback"),
        }
    }

    /// Set the name reported through [`Driver::name`]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Handle on the far end
    pub fn peer(&self) -> LoopbackPeer {
        LoopbackPeer {
            shared: Arc::clone(&self.shared),
        }
    }

    fn enter(&self) -> Result<MutexGuard<'_, State>> {
        let mut state = self.shared.state();
        state.calls += 1;
        if state.disconnected {
            return Err(Error::device(
                "access loopback",
                io::Error::new(io::ErrorKind::BrokenPipe, "loopback disconnected"),
            ));
        }
        Ok(state)
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for Loopback {
    fn read(&mut self, buf: &mut [u8], deadline: Option<Instant>) -> Result<usize> {
        let mut state = self.enter()?;
        if buf.is_empty() {
            return Ok(0);
        }
        remaining(deadline)?;

        loop {
            if state.disconnected {
                return Err(Error::device(
                    "read from loopback",
                    io::Error::new(io::ErrorKind::BrokenPipe, "loopback disconnected"),
                ));
            }
            if !state.rx.is_empty() {
                let n = buf.len().min(state.rx.len());
                for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }

            state = match remaining(deadline)? {
                None => self
                    .shared
                    .readable
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(left) => {
                    self.shared
                        .readable
                        .wait_timeout(state, left)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    fn write(&mut self, buf: &[u8], deadline: Option<Instant>) -> Result<usize> {
        let mut state = self.enter()?;
        remaining(deadline)?;

        state.transmitted.extend_from_slice(buf);
        if state.echo {
            state.rx.extend(buf.iter().copied());
            self.shared.readable.notify_all();
        }
        Ok(buf.len())
    }

    fn attributes(&mut self) -> Result<Attributes> {
        Ok(self.enter()?.attributes)
    }

    fn set_attributes(&mut self, attrs: &Attributes) -> Result<()> {
        self.enter()?.attributes = *attrs;
        Ok(())
    }

    fn flush(&mut self, queue: FlushQueue) -> Result<()> {
        let mut state = self.enter()?;
        // Output is delivered on write, so only input can be pending
        if matches!(queue, FlushQueue::Input | FlushQueue::Both) {
            state.rx.clear();
        }
        Ok(())
    }

    fn bytes_waiting(&mut self, direction: Direction) -> Result<usize> {
        let state = self.enter()?;
        Ok(match direction {
            Direction::Input => state.rx.len(),
            Direction::Output => 0,
        })
    }

    fn set_modem_bit(&mut self, signal: ModemSignal, level: bool) -> Result<()> {
        let mut state = self.enter()?;
        state.modem.set(signal, level);
        if state.echo {
            match signal {
                ModemSignal::Dtr => {
                    state.modem.dsr = level;
                    state.modem.dcd = level;
                }
                ModemSignal::Rts => state.modem.cts = level,
                _ => {}
            }
        }
        Ok(())
    }

    fn modem_bits(&mut self) -> Result<ModemBits> {
        Ok(self.enter()?.modem)
    }

    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let mut state = self.shared.state();
        state.calls += 1;
        state.closed = true;
        self.shared.readable.notify_all();
        Ok(())
    }
}

impl LoopbackPeer {
    /// Make bytes available to the reader
    pub fn feed(&self, bytes: &[u8]) {
        self.shared.state().rx.extend(bytes.iter().copied());
        self.shared.readable.notify_all();
    }

    /// Everything written so far, clearing the record
    pub fn take_transmitted(&self) -> Vec<u8> {
        std::mem::take(&mut self.shared.state().transmitted)
    }

    /// Attributes as last applied by the driver side
    pub fn attributes(&self) -> Attributes {
        self.shared.state().attributes
    }

    /// Number of driver operations performed so far
    pub fn calls(&self) -> usize {
        self.shared.state().calls
    }

    /// Drive an input modem line (CTS, DSR, DCD, RI) from the far end
    pub fn set_modem_input(&self, signal: ModemSignal, level: bool) {
        self.shared.state().modem.set(signal, level);
    }

    /// Simulate the cable being pulled. Later operations fail with a device error.
    pub fn disconnect(&self) {
        self.shared.state().disconnected = true;
        self.shared.readable.notify_all();
    }

    /// Whether the driver side has been closed
    pub fn is_closed(&self) -> bool {
        self.shared.state().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_echo() {
        let mut lb = Loopback::new();
        assert_eq!(lb.write(b"abc", None).unwrap(), 3);

        let mut buf = [0u8; 8];
        assert_eq!(lb.read(&mut buf, None).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(lb.peer().take_transmitted(), b"abc");
    }

    #[test]
    fn test_without_echo_only_reads_fed_bytes() {
        let mut lb = Loopback::without_echo();
        let peer = lb.peer();
        lb.write(b"cmd", None).unwrap();
        assert_eq!(lb.bytes_waiting(Direction::Input).unwrap(), 0);

        peer.feed(b"ok");
        let mut buf = [0u8; 1];
        assert_eq!(lb.read(&mut buf, None).unwrap(), 1);
        assert_eq!(buf[0], b'o');
        assert_eq!(lb.bytes_waiting(Direction::Input).unwrap(), 1);
    }

    #[test]
    fn test_read_times_out() {
        let mut lb = Loopback::new();
        let mut buf = [0u8; 1];
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(lb.read(&mut buf, Some(deadline)).unwrap_err().is_timeout());
    }

    #[test]
    fn test_expired_deadline_leaves_input_buffered() {
        let mut lb = Loopback::without_echo();
        lb.peer().feed(b"late");
        let mut buf = [0u8; 4];
        let past = Instant::now() - Duration::from_millis(5);
        assert!(lb.read(&mut buf, Some(past)).unwrap_err().is_timeout());
        assert_eq!(lb.bytes_waiting(Direction::Input).unwrap(), 4);
    }

    #[test]
    fn test_blocked_read_wakes_on_feed() {
        let mut lb = Loopback::without_echo();
        let peer = lb.peer();
        let feeder = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            peer.feed(b"x");
        });

        let mut buf = [0u8; 1];
        let deadline = Instant::now() + Duration::from_secs(5);
        assert_eq!(lb.read(&mut buf, Some(deadline)).unwrap(), 1);
        assert_eq!(buf[0], b'x');
        feeder.join().unwrap();
    }

    #[test]
    fn test_flush_input() {
        let mut lb = Loopback::new();
        lb.write(b"stale", None).unwrap();
        lb.flush(FlushQueue::Output).unwrap();
        assert_eq!(lb.bytes_waiting(Direction::Input).unwrap(), 5);
        lb.flush(FlushQueue::Both).unwrap();
        assert_eq!(lb.bytes_waiting(Direction::Input).unwrap(), 0);
    }

    #[test]
    fn test_modem_lines_wired() {
        let mut lb = Loopback::new();
        lb.set_modem_bit(ModemSignal::Rts, true).unwrap();
        let bits = lb.modem_bits().unwrap();
        assert!(bits.rts && bits.cts);
        assert!(!bits.dtr && !bits.dsr);

        lb.peer().set_modem_input(ModemSignal::Ri, true);
        assert!(lb.modem_bits().unwrap().ri);
    }

    #[test]
    fn test_disconnect() {
        let mut lb = Loopback::new();
        lb.peer().disconnect();
        let mut buf = [0u8; 1];
        assert!(matches!(
            lb.read(&mut buf, None),
            Err(Error::Device { .. })
        ));
    }

    #[test]
    fn test_close() {
        let lb = Loopback::new();
        let peer = lb.peer();
        Box::new(lb).close().unwrap();
        assert!(peer.is_closed());
    }
}
