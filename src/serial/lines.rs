//! Line assembly
//!
//! Turns a byte stream into text lines. Bytes in the ignore set are dropped,
//! a byte in the end set terminates the line, anything else is appended as
//! the character with the same code point.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Characters ignored while assembling a line, and characters ending one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineDelimiters {
    /// Dropped wherever they appear (default: `"\r"`)
    pub ignore: String,
    /// Terminate the line and are not part of it (default: `"\n"`)
    pub end: String,
}

impl Default for LineDelimiters {
    fn default() -> Self {
        Self {
            ignore: String::from("\r"),
            end: String::from("\n"),
        }
    }
}

impl LineDelimiters {
    pub fn new(ignore: &str, end: &str) -> Self {
        Self {
            ignore: ignore.to_string(),
            end: end.to_string(),
        }
    }

    fn ignores(&self, c: char) -> bool {
        self.ignore.contains(c)
    }

    fn ends(&self, c: char) -> bool {
        self.end.contains(c)
    }
}

/// Anything that can hand out bytes one at a time
pub trait ByteSource {
    /// Next byte, or the error that prevented reading it
    fn read_byte(&mut self) -> Result<u8>;

    /// Next complete line using default delimiters. Sources with their own
    /// delimiter configuration override this.
    fn read_line(&mut self) -> Result<String> {
        LineAssembler::new(Arc::new(LineDelimiters::default())).read_line(self)
    }
}

/// Outcome of feeding one byte to a [`LineAssembler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Still collecting; the byte was appended or ignored
    Collecting,
    /// The byte ended the line
    Terminated(String),
}

/// Byte-at-a-time line framing state machine
#[derive(Debug)]
pub struct LineAssembler {
    delimiters: Arc<LineDelimiters>,
    line: String,
}

impl LineAssembler {
    pub fn new(delimiters: Arc<LineDelimiters>) -> Self {
        Self {
            delimiters,
            line: String::new(),
        }
    }

    /// Feed one byte
    pub fn push(&mut self, byte: u8) -> Step {
        let c = char::from(byte);
        if self.delimiters.ignores(c) {
            Step::Collecting
        } else if self.delimiters.ends(c) {
            Step::Terminated(std::mem::take(&mut self.line))
        } else {
            self.line.push(c);
            Step::Collecting
        }
    }

    /// Characters collected since the last terminator
    pub fn pending(&self) -> &str {
        &self.line
    }

    /// Drop whatever has been collected
    pub fn reset(&mut self) {
        self.line.clear();
    }

    /// Pull bytes from `source` until a line terminates. On a read error the
    /// partial line is discarded and the error returned.
    pub fn read_line<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<String> {
        loop {
            let byte = match source.read_byte() {
                Ok(byte) => byte,
                Err(e) => {
                    self.reset();
                    return Err(e);
                }
            };
            if let Step::Terminated(line) = self.push(byte) {
                return Ok(line);
            }
        }
    }
}
