//! Native serial port driver
//!
//! Opens a device node through the `serialport` crate. Speed, framing and
//! parity go through its portable API; on Unix the flags it does not cover
//! (local mode, hangup-on-close, combined flow control) and the modem line
//! readback are handled with termios and ioctl calls from `libc`.

use crate::error::{Error, Result};
use crate::serial::attributes::{
    Attributes, DataBits, Direction, FlushQueue, ModemBits, ModemSignal, Parity, StopBits,
    DEFAULT_SPEED,
};
use crate::serial::driver::{remaining, Driver};
use log::debug;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Timeout armed when no deadline is set. Operations that hit it are retried.
const BLOCKING_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[cfg(unix)]
type NativeInner = serialport::TTYPort;
#[cfg(windows)]
type NativeInner = serialport::COMPort;

/// Serial port backed by the operating system
pub struct NativePort {
    port: NativeInner,
    path: String,
    #[cfg(not(unix))]
    extra: NonUnixState,
}

/// Settings Windows has no control-block field for, kept so they read back
#[cfg(not(unix))]
#[derive(Debug, Default)]
struct NonUnixState {
    local: bool,
    hangup: bool,
    dtr: bool,
    rts: bool,
}

impl NativePort {
    /// Open the device at `path` with the default line discipline
    pub fn open(path: &str) -> Result<Self> {
        let port = serialport::new(path, DEFAULT_SPEED)
            .timeout(BLOCKING_TIMEOUT)
            .open_native()
            .map_err(|e| {
                let e = io::Error::from(e);
                let e = io::Error::new(e.kind(), format!("{}: {}", path, e));
                Error::device("open serial port", e)
            })?;

        debug!("opened serial port {}", path);
        Ok(Self {
            port,
            path: path.to_string(),
            #[cfg(not(unix))]
            extra: NonUnixState::default(),
        })
    }

    fn arm_timeout(&mut self, deadline: Option<Instant>) -> Result<()> {
        let timeout = remaining(deadline)?.unwrap_or(BLOCKING_TIMEOUT);
        self.port
            .set_timeout(timeout)
            .map_err(|e| Error::device("set timeout", e.into()))
    }
}

fn port_error(operation: &'static str) -> impl FnOnce(serialport::Error) -> Error {
    move |e| Error::device(operation, e.into())
}

impl Driver for NativePort {
    fn read(&mut self, buf: &mut [u8], deadline: Option<Instant>) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            self.arm_timeout(deadline)?;
            match self.port.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::TimedOut && deadline.is_none() => continue,
                result => return result.map_err(|e| Error::device("read from serial port", e)),
            }
        }
    }

    fn write(&mut self, buf: &[u8], deadline: Option<Instant>) -> Result<usize> {
        loop {
            self.arm_timeout(deadline)?;
            match self.port.write(buf) {
                Err(e) if e.kind() == io::ErrorKind::TimedOut && deadline.is_none() => continue,
                result => return result.map_err(|e| Error::device("write to serial port", e)),
            }
        }
    }

    fn attributes(&mut self) -> Result<Attributes> {
        let speed = self.port.baud_rate().map_err(port_error("read speed"))?;
        let data_bits = match self.port.data_bits().map_err(port_error("read data bits"))? {
            serialport::DataBits::Five => DataBits::Five,
            serialport::DataBits::Six => DataBits::Six,
            serialport::DataBits::Seven => DataBits::Seven,
            serialport::DataBits::Eight => DataBits::Eight,
        };
        let parity = match self.port.parity().map_err(port_error("read parity"))? {
            serialport::Parity::None => Parity::None,
            serialport::Parity::Even => Parity::Even,
            serialport::Parity::Odd => Parity::Odd,
        };
        let stop_bits = match self.port.stop_bits().map_err(port_error("read stop bits"))? {
            serialport::StopBits::One => StopBits::One,
            serialport::StopBits::Two => StopBits::Two,
        };

        let mut attrs = Attributes {
            speed,
            data_bits,
            parity,
            stop_bits,
            ..Attributes::default()
        };
        self.read_flags(&mut attrs)?;
        Ok(attrs)
    }

    fn set_attributes(&mut self, attrs: &Attributes) -> Result<()> {
        self.port
            .set_baud_rate(attrs.speed)
            .map_err(port_error("set speed"))?;
        self.port
            .set_data_bits(match attrs.data_bits {
                DataBits::Five => serialport::DataBits::Five,
                DataBits::Six => serialport::DataBits::Six,
                DataBits::Seven => serialport::DataBits::Seven,
                DataBits::Eight => serialport::DataBits::Eight,
            })
            .map_err(port_error("set data bits"))?;
        self.port
            .set_parity(match attrs.parity {
                Parity::None => serialport::Parity::None,
                Parity::Even => serialport::Parity::Even,
                Parity::Odd => serialport::Parity::Odd,
            })
            .map_err(port_error("set parity"))?;
        self.port
            .set_stop_bits(match attrs.stop_bits {
                StopBits::One => serialport::StopBits::One,
                StopBits::Two => serialport::StopBits::Two,
            })
            .map_err(port_error("set stop bits"))?;
        self.write_flags(attrs)
    }

    fn flush(&mut self, queue: FlushQueue) -> Result<()> {
        let which = match queue {
            FlushQueue::Input => serialport::ClearBuffer::Input,
            FlushQueue::Output => serialport::ClearBuffer::Output,
            FlushQueue::Both => serialport::ClearBuffer::All,
        };
        self.port.clear(which).map_err(port_error("flush buffers"))
    }

    fn bytes_waiting(&mut self, direction: Direction) -> Result<usize> {
        let n = match direction {
            Direction::Input => self.port.bytes_to_read(),
            Direction::Output => self.port.bytes_to_write(),
        }
        .map_err(port_error("query buffer occupancy"))?;
        Ok(n as usize)
    }

    fn set_modem_bit(&mut self, signal: ModemSignal, level: bool) -> Result<()> {
        match signal {
            ModemSignal::Dtr => self
                .port
                .write_data_terminal_ready(level)
                .map_err(port_error("set DTR"))?,
            ModemSignal::Rts => self
                .port
                .write_request_to_send(level)
                .map_err(port_error("set RTS"))?,
            other => return Err(Error::invalid("output signal", other)),
        }
        #[cfg(not(unix))]
        match signal {
            ModemSignal::Dtr => self.extra.dtr = level,
            _ => self.extra.rts = level,
        }
        Ok(())
    }

    fn modem_bits(&mut self) -> Result<ModemBits> {
        self.read_modem_bits()
    }

    fn name(&self) -> Option<String> {
        Some(self.path.clone())
    }

    fn close(self: Box<Self>) -> Result<()> {
        debug!("closing serial port {}", self.path);
        drop(self);
        Ok(())
    }
}

#[cfg(unix)]
impl NativePort {
    fn termios(&self) -> Result<libc::termios> {
        use std::os::unix::io::AsRawFd;

        let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();
        // SAFETY: tcgetattr fully initializes the struct when it returns 0
        if unsafe { libc::tcgetattr(self.port.as_raw_fd(), termios.as_mut_ptr()) } != 0 {
            return Err(Error::device("read termios", io::Error::last_os_error()));
        }
        Ok(unsafe { termios.assume_init() })
    }

    fn read_flags(&mut self, attrs: &mut Attributes) -> Result<()> {
        let t = self.termios()?;
        attrs.hw_flow_control = t.c_cflag & libc::CRTSCTS != 0;
        attrs.sw_flow_control = t.c_iflag & (libc::IXON | libc::IXOFF) != 0;
        attrs.local = t.c_cflag & libc::CLOCAL != 0;
        attrs.hangup = t.c_cflag & libc::HUPCL != 0;
        Ok(())
    }

    fn write_flags(&mut self, attrs: &Attributes) -> Result<()> {
        use std::os::unix::io::AsRawFd;

        let mut t = self.termios()?;
        let set = |flags: &mut libc::tcflag_t, mask: libc::tcflag_t, on: bool| {
            if on {
                *flags |= mask;
            } else {
                *flags &= !mask;
            }
        };
        set(&mut t.c_cflag, libc::CRTSCTS, attrs.hw_flow_control);
        set(&mut t.c_iflag, libc::IXON | libc::IXOFF, attrs.sw_flow_control);
        set(&mut t.c_cflag, libc::CLOCAL, attrs.local);
        set(&mut t.c_cflag, libc::HUPCL, attrs.hangup);

        // SAFETY: `t` came from tcgetattr on the same descriptor
        if unsafe { libc::tcsetattr(self.port.as_raw_fd(), libc::TCSANOW, &t) } != 0 {
            return Err(Error::device("write termios", io::Error::last_os_error()));
        }
        Ok(())
    }

    fn read_modem_bits(&mut self) -> Result<ModemBits> {
        use std::os::unix::io::AsRawFd;

        let mut raw: libc::c_int = 0;
        let fd = self.port.as_raw_fd();
        // SAFETY: TIOCMGET writes a single c_int
        if unsafe { libc::ioctl(fd, libc::TIOCMGET, &mut raw as *mut libc::c_int) } != 0 {
            return Err(Error::device("read modem bits", io::Error::last_os_error()));
        }
        Ok(ModemBits {
            dtr: raw & libc::TIOCM_DTR != 0,
            rts: raw & libc::TIOCM_RTS != 0,
            cts: raw & libc::TIOCM_CTS != 0,
            dsr: raw & libc::TIOCM_DSR != 0,
            dcd: raw & libc::TIOCM_CAR != 0,
            ri: raw & libc::TIOCM_RNG != 0,
        })
    }
}

#[cfg(not(unix))]
impl NativePort {
    fn read_flags(&mut self, attrs: &mut Attributes) -> Result<()> {
        let flow = self
            .port
            .flow_control()
            .map_err(port_error("read flow control"))?;
        attrs.hw_flow_control = flow == serialport::FlowControl::Hardware;
        attrs.sw_flow_control = flow == serialport::FlowControl::Software;
        attrs.local = self.extra.local;
        attrs.hangup = self.extra.hangup;
        Ok(())
    }

    fn write_flags(&mut self, attrs: &Attributes) -> Result<()> {
        let flow = match (attrs.hw_flow_control, attrs.sw_flow_control) {
            (false, false) => serialport::FlowControl::None,
            (true, false) => serialport::FlowControl::Hardware,
            (false, true) => serialport::FlowControl::Software,
            (true, true) => return Err(Error::invalid("flow control", "hardware and software")),
        };
        self.port
            .set_flow_control(flow)
            .map_err(port_error("set flow control"))?;
        self.extra.local = attrs.local;
        self.extra.hangup = attrs.hangup;
        Ok(())
    }

    fn read_modem_bits(&mut self) -> Result<ModemBits> {
        Ok(ModemBits {
            dtr: self.extra.dtr,
            rts: self.extra.rts,
            cts: self.port.read_clear_to_send().map_err(port_error("read CTS"))?,
            dsr: self.port.read_data_set_ready().map_err(port_error("read DSR"))?,
            dcd: self.port.read_carrier_detect().map_err(port_error("read DCD"))?,
            ri: self.port.read_ring_indicator().map_err(port_error("read RI"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device() {
        let err = NativePort::open("/dev/serial-session-does-not-exist").err().unwrap();
        assert!(matches!(err, Error::Device { operation: "open serial port", .. }));
        assert!(err.to_string().contains("/dev/serial-session-does-not-exist"));
    }
}
