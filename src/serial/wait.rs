//! Waiting for an expected response line
//!
//! [`PatternWaiter`] reads lines until one matches one of an ordered list of
//! regular expressions. Patterns are tried in list order and the first match
//! wins, so put the more specific pattern first when two can match the same
//! line.

use crate::error::{Error, Result};
use crate::serial::lines::ByteSource;
use crate::serial::session::SerialSession;
use log::{debug, trace};
use regex::Regex;
use std::time::{Duration, Instant};

/// The line that ended a wait and which pattern it matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitMatch {
    /// Index into the pattern list
    pub index: usize,
    /// The matching line, delimiters removed
    pub line: String,
}

/// Compiled, ordered set of response patterns
#[derive(Debug, Clone)]
pub struct PatternWaiter {
    patterns: Vec<Regex>,
}

impl PatternWaiter {
    /// Compile every pattern. The first one that fails aborts with
    /// [`Error::MalformedPattern`].
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .enumerate()
            .map(|(index, pattern)| {
                Regex::new(pattern.as_ref()).map_err(|source| Error::MalformedPattern {
                    index,
                    pattern: pattern.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Index of the first pattern matching `line`
    pub fn match_line(&self, line: &str) -> Option<usize> {
        self.patterns.iter().position(|re| re.is_match(line))
    }

    /// Read lines from `source` until one matches. Read errors, timeouts
    /// included, end the wait unchanged. Without a deadline on the source
    /// this blocks until a matching line arrives.
    pub fn wait<S: ByteSource + ?Sized>(&self, source: &mut S) -> Result<WaitMatch> {
        loop {
            let line = source.read_line()?;
            match self.match_line(&line) {
                Some(index) => {
                    debug!(
                        "line {:?} matched pattern #{} ({})",
                        line, index, self.patterns[index]
                    );
                    return Ok(WaitMatch { index, line });
                }
                None => trace!("skipping unmatched line {:?}", line),
            }
        }
    }
}

impl SerialSession {
    /// Read lines until one matches one of `patterns`.
    ///
    /// Set a read deadline first if the device might never answer, or use
    /// [`wait_for_re_within`](Self::wait_for_re_within).
    pub fn wait_for_re<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<WaitMatch> {
        PatternWaiter::new(patterns)?.wait(self)
    }

    /// [`wait_for_re`](Self::wait_for_re) with the read deadline set to
    /// `timeout` from now. The previous read deadline is restored afterwards.
    pub fn wait_for_re_within<S: AsRef<str>>(
        &mut self,
        patterns: &[S],
        timeout: Duration,
    ) -> Result<WaitMatch> {
        let waiter = PatternWaiter::new(patterns)?;
        let previous = self.read_deadline();
        self.set_read_deadline(Some(Instant::now() + timeout))?;
        let result = waiter.wait(self);
        self.set_read_deadline(previous)?;
        result
    }
}
