//! Serial Session
//!
//! Drive interactive hardware over a serial line: configure the port, read
//! and write with deadlines, split the input into text lines and wait for
//! the line a device answers with.
//!
//! # Features
//!
//! - **Line discipline**: speed, frame bits, parity, stop bits, flow control,
//!   local and hangup modes, with save/restore snapshots
//! - **Deadlines**: every blocking read or write fails with a timeout
//!   instead of hanging once its deadline passes
//! - **Line assembly**: configurable ignored and terminating characters
//! - **Response matching**: wait for the first line matching one of an
//!   ordered list of regular expressions
//! - **Native port** (requires the `serial` feature and libudev on Linux)
//!   and an in-memory **loopback** for tests
//!
//! # Usage
//!
//! ```no_run
//! use serial_session::{FlushQueue, Loopback, Parity, SerialSession};
//! use std::time::Duration;
//!
//! # fn main() -> serial_session::Result<()> {
//! // With the `serial` feature: SerialSession::open("/dev/ttyUSB0")?
//! let mut session = SerialSession::with_driver(Box::new(Loopback::new()))?;
//! session.set_speed(115200)?;
//! session.set_parity(Parity::None)?;
//! session.flush(FlushQueue::Both)?;
//!
//! session.write_str("AT\r\n")?;
//! let reply = session.wait_for_re_within(&["^OK$", "^ERROR"], Duration::from_secs(2))?;
//! println!("pattern #{} matched {:?}", reply.index, reply.line);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod serial;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use serial::{
    Attributes, ByteSource, DataBits, Direction, Driver, FlushQueue, LineAssembler,
    LineDelimiters, Loopback, LoopbackPeer, ModemBits, ModemSignal, Parity, PatternWaiter,
    SerialSession, StopBits, WaitMatch,
};
#[cfg(feature = "serial")]
pub use serial::NativePort;
