//! Line discipline operations on a session
//!
//! Every setter validates its argument, then reads the current snapshot,
//! changes one field and writes the snapshot back through
//! [`Driver::set_attributes`](crate::serial::Driver::set_attributes).
//! Rejected values never reach the device.

use crate::error::{Error, Result};
use crate::serial::attributes::{
    validate_speed, Attributes, DataBits, Direction, FlushQueue, ModemBits, ModemSignal, Parity,
    StopBits,
};
use crate::serial::session::SerialSession;
use log::debug;

impl SerialSession {
    fn update(&mut self, change: impl FnOnce(&mut Attributes)) -> Result<()> {
        let driver = self.driver()?;
        let mut attrs = driver.attributes()?;
        change(&mut attrs);
        driver.set_attributes(&attrs)?;
        debug!("line discipline now {:?}", attrs);
        Ok(())
    }

    /// Set the baud rate. Must be one of
    /// [`SUPPORTED_SPEEDS`](crate::serial::SUPPORTED_SPEEDS).
    pub fn set_speed(&mut self, speed: u32) -> Result<()> {
        let speed = validate_speed(speed)?;
        self.update(|a| a.speed = speed)
    }

    /// Set the number of stop bits, 1 or 2
    pub fn set_stop_bits(&mut self, stop_bits: u8) -> Result<()> {
        let stop_bits = StopBits::try_from(stop_bits)?;
        self.update(|a| a.stop_bits = stop_bits)
    }

    /// Set the parity mode
    pub fn set_parity(&mut self, parity: Parity) -> Result<()> {
        self.update(|a| a.parity = parity)
    }

    /// Set the frame size, 5 to 8 bits
    pub fn set_bits(&mut self, bits: u8) -> Result<()> {
        let bits = DataBits::try_from(bits)?;
        self.update(|a| a.data_bits = bits)
    }

    /// Enable or disable RTS/CTS flow control
    pub fn set_hw_flow_control(&mut self, on: bool) -> Result<()> {
        self.update(|a| a.hw_flow_control = on)
    }

    /// Enable or disable XON/XOFF flow control
    pub fn set_sw_flow_control(&mut self, on: bool) -> Result<()> {
        self.update(|a| a.sw_flow_control = on)
    }

    /// In local mode the modem control lines are ignored
    pub fn set_local(&mut self, local: bool) -> Result<()> {
        self.update(|a| a.local = local)
    }

    /// Whether DTR/RTS drop when the device is closed
    pub fn set_hangup(&mut self, hangup: bool) -> Result<()> {
        self.update(|a| a.hangup = hangup)
    }

    /// Snapshot of the current line discipline
    pub fn attributes(&mut self) -> Result<Attributes> {
        self.driver()?.attributes()
    }

    /// Replace the whole line discipline, e.g. to restore a snapshot taken
    /// with [`attributes`](Self::attributes)
    pub fn set_attributes(&mut self, attrs: &Attributes) -> Result<()> {
        attrs.validate()?;
        self.driver()?.set_attributes(attrs)?;
        debug!("line discipline set to {:?}", attrs);
        Ok(())
    }

    /// Discard buffered input, output or both. Use after reconfiguring when
    /// stale bytes could desynchronize a line protocol.
    pub fn flush(&mut self, queue: FlushQueue) -> Result<()> {
        self.driver()?.flush(queue)?;
        debug!("flushed {:?}", queue);
        Ok(())
    }

    /// Bytes buffered in one direction
    pub fn bytes_waiting(&mut self, direction: Direction) -> Result<usize> {
        self.driver()?.bytes_waiting(direction)
    }

    /// Bytes received but not yet read
    pub fn input_waiting(&mut self) -> Result<usize> {
        self.bytes_waiting(Direction::Input)
    }

    /// Bytes written but not yet transmitted
    pub fn output_waiting(&mut self) -> Result<usize> {
        self.bytes_waiting(Direction::Output)
    }

    /// Drive DTR or RTS. Input lines cannot be set.
    pub fn set_modem_bit(&mut self, signal: ModemSignal, level: bool) -> Result<()> {
        if !signal.is_output() {
            return Err(Error::invalid("output signal", signal));
        }
        self.driver()?.set_modem_bit(signal, level)?;
        debug!("{} {}", signal, if level { "on" } else { "off" });
        Ok(())
    }

    /// Sample every modem control line
    pub fn modem_bits(&mut self) -> Result<ModemBits> {
        self.driver()?.modem_bits()
    }

    /// Drive DTR and RTS from `bits`. The input fields are ignored.
    pub fn set_modem_bits(&mut self, bits: ModemBits) -> Result<()> {
        for signal in [ModemSignal::Dtr, ModemSignal::Rts] {
            self.set_modem_bit(signal, bits.get(signal))?;
        }
        Ok(())
    }
}
