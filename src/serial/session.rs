//! Serial session: ownership of the device and deadline-bounded I/O
//!
//! A [`SerialSession`] owns exactly one [`Driver`]. Closing the session
//! releases the driver for good; every later operation returns
//! [`Error::Closed`].
//!
//! Reads and writes are bounded two ways. A deadline is an absolute instant
//! shared by every later call until it is changed. A timeout is relative and
//! is re-armed at the start of each call. When both are set the earlier
//! bound wins.

use crate::error::{Error, Result};
use crate::serial::attributes::Attributes;
use crate::serial::driver::{remaining, Driver};
use crate::serial::lines::{ByteSource, LineAssembler, LineDelimiters};
use log::{debug, trace, warn};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An open (or closed) serial device with line framing state
pub struct SerialSession {
    pub(crate) driver: Option<Box<dyn Driver>>,
    delimiters: Arc<LineDelimiters>,
    read_deadline: Option<Instant>,
    write_deadline: Option<Instant>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl SerialSession {
    /// Open the serial device at `path` with the default line discipline
    /// (9600 8N1, flow control off, see [`Attributes::default`])
    #[cfg(feature = "serial")]
    pub fn open(path: &str) -> Result<Self> {
        let port = crate::serial::port::NativePort::open(path)?;
        Self::with_driver(Box::new(port))
    }

    /// Open `config.path` and apply the rest of `config`
    #[cfg(feature = "serial")]
    pub fn open_with(config: &crate::config::SessionConfig) -> Result<Self> {
        let mut session = Self::open(&config.path)?;
        config.apply(&mut session)?;
        Ok(session)
    }

    /// Start a session on an already opened driver. The default line
    /// discipline is applied as for [`SerialSession::open`].
    pub fn with_driver(mut driver: Box<dyn Driver>) -> Result<Self> {
        let attrs = Attributes::default();
        driver.set_attributes(&attrs)?;
        debug!(
            "serial session started on {} ({})",
            driver.name().as_deref().unwrap_or("<unnamed>"),
            attrs
        );

        Ok(Self {
            driver: Some(driver),
            delimiters: Arc::new(LineDelimiters::default()),
            read_deadline: None,
            write_deadline: None,
            read_timeout: None,
            write_timeout: None,
        })
    }

    pub(crate) fn driver(&mut self) -> Result<&mut dyn Driver> {
        match self.driver.as_mut() {
            Some(driver) => Ok(driver.as_mut()),
            None => Err(Error::Closed),
        }
    }

    /// Release the device. Closing again returns [`Error::Closed`].
    pub fn close(&mut self) -> Result<()> {
        let driver = self.driver.take().ok_or(Error::Closed)?;
        let name = driver.name();
        driver.close().map_err(|e| {
            warn!("closing {:?} failed: {}", name, e);
            e
        })?;
        debug!("serial session on {:?} closed", name);
        Ok(())
    }

    /// Whether the session still holds its device
    pub fn is_open(&self) -> bool {
        self.driver.is_some()
    }

    /// Device name reported by the driver
    pub fn name(&self) -> Option<String> {
        self.driver.as_ref().and_then(|d| d.name())
    }

    /// Read up to `buf.len()` bytes, bounded by the read deadline and
    /// timeout. An expired bound fails even when input is already buffered.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let deadline = effective_deadline(self.read_deadline, self.read_timeout);
        let driver = self.driver()?;
        if buf.is_empty() {
            return Ok(0);
        }
        remaining(deadline)?;
        let n = driver.read(buf, deadline)?;
        trace_bytes("rx", &buf[..n]);
        Ok(n)
    }

    /// Write some prefix of `buf`, bounded by the write deadline and timeout
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let deadline = effective_deadline(self.write_deadline, self.write_timeout);
        let driver = self.driver()?;
        remaining(deadline)?;
        let n = driver.write(buf, deadline)?;
        trace_bytes("tx", &buf[..n]);
        Ok(n)
    }

    /// Write a string
    pub fn write_str(&mut self, s: &str) -> Result<usize> {
        self.write(s.as_bytes())
    }

    /// Read exactly one byte. A read that returns nothing without an error is
    /// [`Error::ShortRead`], never a zero byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        match self.read(&mut buf)? {
            1 => Ok(buf[0]),
            _ => Err(Error::ShortRead),
        }
    }

    /// Write exactly one byte
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        match self.write(&[byte])? {
            1 => Ok(()),
            _ => Err(Error::ShortRead),
        }
    }

    /// Set both deadlines. `None` blocks indefinitely.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.driver()?;
        self.read_deadline = deadline;
        self.write_deadline = deadline;
        Ok(())
    }

    /// Deadline for subsequent reads
    pub fn set_read_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.driver()?;
        self.read_deadline = deadline;
        Ok(())
    }

    /// Deadline for subsequent writes
    pub fn set_write_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.driver()?;
        self.write_deadline = deadline;
        Ok(())
    }

    /// Current read deadline
    pub fn read_deadline(&self) -> Option<Instant> {
        self.read_deadline
    }

    /// Current write deadline
    pub fn write_deadline(&self) -> Option<Instant> {
        self.write_deadline
    }

    /// Set both per-call timeouts. `None` removes the bound.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.driver()?;
        self.read_timeout = timeout;
        self.write_timeout = timeout;
        Ok(())
    }

    /// Bound each later read to `timeout` from the moment it starts. Since
    /// [`read_line`](Self::read_line) reads byte by byte, this limits the gap
    /// between bytes rather than the whole line.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.driver()?;
        self.read_timeout = timeout;
        Ok(())
    }

    /// Bound each later write to `timeout` from the moment it starts
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.driver()?;
        self.write_timeout = timeout;
        Ok(())
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    /// Characters ignored and characters ending a line in [`read_line`](Self::read_line)
    pub fn line_delimiters(&self) -> &LineDelimiters {
        &self.delimiters
    }

    /// Replace the line delimiters. Applies from the next [`read_line`](Self::read_line).
    pub fn set_line_delimiters(&mut self, delimiters: LineDelimiters) {
        self.delimiters = Arc::new(delimiters);
    }

    /// Read one complete line. A failed read discards the partial line.
    pub fn read_line(&mut self) -> Result<String> {
        LineAssembler::new(Arc::clone(&self.delimiters)).read_line(self)
    }
}

impl ByteSource for SerialSession {
    fn read_byte(&mut self) -> Result<u8> {
        SerialSession::read_byte(self)
    }

    fn read_line(&mut self) -> Result<String> {
        SerialSession::read_line(self)
    }
}

impl Drop for SerialSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.close() {
                warn!("closing serial device on drop failed: {}", e);
            }
        }
    }
}

impl io::Read for SerialSession {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        SerialSession::read(self, buf).map_err(Into::into)
    }
}

impl io::Write for SerialSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        SerialSession::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Writes go straight to the driver; there is nothing buffered here
        self.driver()?;
        Ok(())
    }
}

/// The earlier of an absolute deadline and a timeout armed now
fn effective_deadline(deadline: Option<Instant>, timeout: Option<Duration>) -> Option<Instant> {
    let armed = timeout.map(|t| Instant::now() + t);
    match (deadline, armed) {
        (Some(d), Some(a)) => Some(d.min(a)),
        (d, a) => d.or(a),
    }
}

fn trace_bytes(direction: &str, bytes: &[u8]) {
    if log::log_enabled!(log::Level::Trace) && !bytes.is_empty() {
        trace!("{} {} bytes", direction, bytes.len());
        for line in hexdump::hexdump_iter(bytes) {
            trace!("{} {}", direction, line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::loopback::Loopback;
    use std::io::{Read as _, Write as _};
    use std::thread;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn loopback_session() -> (SerialSession, crate::serial::loopback::LoopbackPeer) {
        init_logging();
        let lb = Loopback::new();
        let peer = lb.peer();
        (SerialSession::with_driver(Box::new(lb)).unwrap(), peer)
    }

    #[test]
    fn test_open_applies_defaults() {
        let (session, peer) = loopback_session();
        assert!(session.is_open());
        assert_eq!(session.name().as_deref(), Some("loopback"));
        assert_eq!(peer.attributes(), Attributes::default());
    }

    #[test]
    fn test_byte_roundtrip() {
        let (mut session, _peer) = loopback_session();
        session.write_byte(24).unwrap();
        assert_eq!(session.read_byte().unwrap(), 24);
    }

    #[test]
    fn test_buffer_io() {
        let (mut session, peer) = loopback_session();
        assert_eq!(session.write_str("hello").unwrap(), 5);
        assert_eq!(peer.take_transmitted(), b"hello");

        let mut buf = [0u8; 16];
        let n = session.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(session.read(&mut []).unwrap(), 0);
    }

    #[test]
    fn test_close_twice() {
        let (mut session, peer) = loopback_session();
        session.close().unwrap();
        assert!(peer.is_closed());
        assert!(!session.is_open());
        assert!(matches!(session.close(), Err(Error::Closed)));
        assert!(matches!(session.close(), Err(Error::Closed)));
    }

    #[test]
    fn test_operations_after_close() {
        let (mut session, peer) = loopback_session();
        session.close().unwrap();
        let calls = peer.calls();

        assert!(matches!(session.read_byte(), Err(Error::Closed)));
        assert!(matches!(session.write_byte(1), Err(Error::Closed)));
        assert!(matches!(session.read(&mut []), Err(Error::Closed)));
        assert!(matches!(session.read_line(), Err(Error::Closed)));
        assert!(matches!(session.set_deadline(None), Err(Error::Closed)));
        assert!(matches!(session.set_timeout(None), Err(Error::Closed)));
        assert!(session.name().is_none());
        assert_eq!(peer.calls(), calls);
    }

    #[test]
    fn test_past_read_deadline_times_out() {
        let (mut session, peer) = loopback_session();
        peer.feed(b"x");
        session
            .set_read_deadline(Some(Instant::now() - Duration::from_millis(50)))
            .unwrap();

        let started = Instant::now();
        assert!(session.read_byte().unwrap_err().is_timeout());
        assert!(started.elapsed() < Duration::from_secs(1));

        // The session stays usable once the deadline is cleared
        session.set_read_deadline(None).unwrap();
        assert_eq!(session.read_byte().unwrap(), b'x');
    }

    #[test]
    fn test_timeout_rearms_per_read() {
        let (mut session, peer) = loopback_session();
        session
            .set_read_timeout(Some(Duration::from_millis(30)))
            .unwrap();

        thread::sleep(Duration::from_millis(60));
        peer.feed(b"ok");
        assert_eq!(session.read_byte().unwrap(), b'o');
        thread::sleep(Duration::from_millis(60));
        assert_eq!(session.read_byte().unwrap(), b'k');

        assert!(session.read_byte().unwrap_err().is_timeout());
        assert!(session.read_deadline().is_none());
    }

    #[test]
    fn test_earlier_bound_wins() {
        let (mut session, peer) = loopback_session();
        peer.feed(b"x");
        session.set_timeout(Some(Duration::from_secs(60))).unwrap();
        session
            .set_read_deadline(Some(Instant::now() - Duration::from_millis(1)))
            .unwrap();
        assert!(session.read_byte().unwrap_err().is_timeout());

        session.set_read_deadline(None).unwrap();
        assert_eq!(session.read_byte().unwrap(), b'x');
        assert_eq!(session.write_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_write_deadline() {
        let (mut session, _peer) = loopback_session();
        session
            .set_deadline(Some(Instant::now() - Duration::from_millis(1)))
            .unwrap();
        assert!(session.write_byte(1).unwrap_err().is_timeout());

        session.set_write_deadline(None).unwrap();
        session.write_byte(1).unwrap();
        assert!(session.read_deadline().is_some());
        assert!(session.write_deadline().is_none());
    }

    #[test]
    fn test_read_line_defaults() {
        let (mut session, peer) = loopback_session();
        peer.feed(b"A\rB\n");
        assert_eq!(session.read_line().unwrap(), "AB");
    }

    #[test]
    fn test_read_line_without_terminator_times_out() {
        let (mut session, peer) = loopback_session();
        peer.feed(b"no newline\r");
        session
            .set_read_deadline(Some(Instant::now() + Duration::from_millis(30)))
            .unwrap();
        assert!(session.read_line().unwrap_err().is_timeout());
        assert!(session.is_open());
    }

    #[test]
    fn test_delimiter_change_applies_to_next_line() {
        let (mut session, peer) = loopback_session();
        peer.feed(b"one\ntwo;");
        assert_eq!(session.read_line().unwrap(), "one");
        session.set_line_delimiters(LineDelimiters::new("", ";"));
        assert_eq!(session.line_delimiters().end, ";");
        assert_eq!(session.read_line().unwrap(), "two");
    }

    #[test]
    fn test_device_error_keeps_session_open() {
        let (mut session, peer) = loopback_session();
        peer.disconnect();
        assert!(matches!(session.read_byte(), Err(Error::Device { .. })));
        assert!(session.is_open());
    }

    #[test]
    fn test_std_io_traits() {
        let (mut session, _peer) = loopback_session();
        session.write_all(b"abc").unwrap();
        io::Write::flush(&mut session).unwrap();

        let mut buf = [0u8; 3];
        session.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        session
            .set_read_deadline(Some(Instant::now() - Duration::from_millis(1)))
            .unwrap();
        let err = io::Read::read(&mut session, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
