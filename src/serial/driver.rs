//! Device driver interface
//!
//! A [`SerialSession`](crate::SerialSession) never talks to the OS directly.
//! Everything device specific goes through a [`Driver`], which lets the
//! session run on real hardware ([`NativePort`](crate::serial::NativePort))
//! or against the in-memory [`Loopback`](crate::serial::Loopback).

use crate::error::Result;
use crate::serial::attributes::{Attributes, Direction, FlushQueue, ModemBits, ModemSignal};
use std::time::Instant;

/// Operations a serial device must provide.
///
/// `deadline` of `None` means block until the operation can make progress.
/// A deadline that has already passed must fail with
/// [`Error::Timeout`](crate::Error::Timeout) without blocking.
pub trait Driver: Send {
    /// Read up to `buf.len()` bytes
    fn read(&mut self, buf: &mut [u8], deadline: Option<Instant>) -> Result<usize>;

    /// Write some prefix of `buf`, returning how many bytes were accepted
    fn write(&mut self, buf: &[u8], deadline: Option<Instant>) -> Result<usize>;

    /// Current line discipline
    fn attributes(&mut self) -> Result<Attributes>;

    /// Replace the whole line discipline. Inputs are already validated.
    fn set_attributes(&mut self, attrs: &Attributes) -> Result<()>;

    /// Discard buffered data
    fn flush(&mut self, queue: FlushQueue) -> Result<()>;

    /// Number of bytes buffered in one direction
    fn bytes_waiting(&mut self, direction: Direction) -> Result<usize>;

    /// Drive an output modem line. Only called with DTR or RTS.
    fn set_modem_bit(&mut self, signal: ModemSignal, level: bool) -> Result<()>;

    /// Sample every modem line
    fn modem_bits(&mut self) -> Result<ModemBits>;

    /// Device name, if it has one
    fn name(&self) -> Option<String> {
        None
    }

    /// Release the device
    fn close(self: Box<Self>) -> Result<()>;
}

/// Time left until `deadline`, `Ok(None)` for no deadline, `Err(Timeout)` if
/// it already passed.
pub fn remaining(deadline: Option<Instant>) -> Result<Option<std::time::Duration>> {
    match deadline {
        None => Ok(None),
        Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => Ok(Some(left)),
            _ => Err(crate::Error::Timeout),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_remaining() {
        assert!(remaining(None).unwrap().is_none());

        let left = remaining(Some(Instant::now() + Duration::from_secs(5)))
            .unwrap()
            .unwrap();
        assert!(left <= Duration::from_secs(5));

        let past = Instant::now() - Duration::from_millis(50);
        assert!(remaining(Some(past)).unwrap_err().is_timeout());
    }
}
