//! Serial device sessions
//!
//! This module provides:
//! - The device driver interface and its native and loopback implementations
//! - Line discipline configuration
//! - Deadline-bounded byte I/O
//! - Line assembly and waiting for expected response lines

pub mod attributes;
mod configure;
pub mod driver;
pub mod lines;
pub mod loopback;
#[cfg(feature = "serial")]
pub mod port;
pub mod session;
pub mod wait;

pub use attributes::{
    Attributes, DataBits, Direction, FlushQueue, ModemBits, ModemSignal, Parity, StopBits,
    DEFAULT_SPEED, SUPPORTED_SPEEDS,
};
pub use driver::Driver;
pub use lines::{ByteSource, LineAssembler, LineDelimiters, Step};
pub use loopback::{Loopback, LoopbackPeer};
#[cfg(feature = "serial")]
pub use port::NativePort;
pub use session::SerialSession;
pub use wait::{PatternWaiter, WaitMatch};
