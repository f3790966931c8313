//! Session configuration files
//!
//! A TOML description of how to open and set up a session:
//!
//! ```toml
//! path = "/dev/ttyUSB0"
//! speed = 115200
//! data_bits = 8
//! parity = "none"
//! stop_bits = 1
//! read_timeout_ms = 500
//!
//! [line]
//! ignore = "\r"
//! end = "\n"
//! ```
//!
//! Everything but `path` is optional and defaults to the settings applied on
//! open (9600 8N1, no flow control).

use crate::error::Result as SessionResult;
use crate::serial::{Attributes, LineDelimiters, SerialSession};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Parsed session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, /dev/ttyACM0)
    pub path: String,
    /// Line discipline
    #[serde(flatten)]
    pub attributes: Attributes,
    /// Per-read timeout, re-armed at the start of every read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
    /// Per-write timeout, re-armed at the start of every write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_timeout_ms: Option<u64>,
    /// Line delimiters for `read_line` and pattern waits. Kept last so the
    /// `[line]` table serializes after the plain keys.
    #[serde(default)]
    pub line: LineDelimiters,
}

impl SessionConfig {
    /// Configuration with default settings for `path`
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            attributes: Attributes::default(),
            read_timeout_ms: None,
            write_timeout_ms: None,
            line: LineDelimiters::default(),
        }
    }

    /// Parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session config: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid session config: {}", path.display()))
    }

    /// Parse configuration content
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config
            .attributes
            .validate()
            .context("Invalid line discipline")?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).context("Failed to serialize session config")
    }

    /// Push attributes, delimiters and timeouts into an open session
    pub fn apply(&self, session: &mut SerialSession) -> SessionResult<()> {
        session.set_attributes(&self.attributes)?;
        session.set_line_delimiters(self.line.clone());
        session.set_read_timeout(self.read_timeout_ms.map(Duration::from_millis))?;
        session.set_write_timeout(self.write_timeout_ms.map(Duration::from_millis))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::{DataBits, Loopback, Parity, StopBits};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_minimal_config() {
        let config = SessionConfig::from_toml_str(r#"path = "/dev/ttyACM0""#).unwrap();
        assert_eq!(config, SessionConfig::new("/dev/ttyACM0"));
        assert_eq!(config.attributes.speed, 9600);
        assert_eq!(config.line.end, "\n");
    }

    #[test]
    fn test_full_config() {
        let config = SessionConfig::from_toml_str(
            r#"
            path = "/dev/ttyUSB1"
            speed = 115200
            data_bits = 7
            parity = "even"
            stop_bits = 2
            hw_flow_control = true
            local = false
            read_timeout_ms = 250

            [line]
            ignore = ""
            end = "\r"
            "#,
        )
        .unwrap();

        assert_eq!(config.attributes.speed, 115200);
        assert_eq!(config.attributes.data_bits, DataBits::Seven);
        assert_eq!(config.attributes.parity, Parity::Even);
        assert_eq!(config.attributes.stop_bits, StopBits::Two);
        assert!(config.attributes.hw_flow_control);
        assert!(!config.attributes.sw_flow_control);
        assert!(!config.attributes.local);
        assert!(config.attributes.hangup);
        assert_eq!(config.line, LineDelimiters::new("", "\r"));
        assert_eq!(config.read_timeout_ms, Some(250));
        assert_eq!(config.write_timeout_ms, None);
    }

    #[test]
    fn test_rejects_bad_values() {
        for bad in [
            "path = \"/dev/x\"\nstop_bits = 3",
            "path = \"/dev/x\"\ndata_bits = 9",
            "path = \"/dev/x\"\nparity = \"mark\"",
            "path = \"/dev/x\"\nspeed = 12345",
            "speed = 9600",
        ] {
            assert!(SessionConfig::from_toml_str(bad).is_err(), "accepted: {}", bad);
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = SessionConfig::new("/dev/ttyS0");
        config.attributes.speed = 57600;
        config.attributes.stop_bits = StopBits::Two;
        config.write_timeout_ms = Some(10);

        let text = config.to_toml_string().unwrap();
        assert!(text.contains("stop_bits = 2"));
        assert_eq!(SessionConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "path = \"/dev/ttyUSB0\"\nspeed = 230400").unwrap();

        let config = SessionConfig::load(file.path()).unwrap();
        assert_eq!(config.attributes.speed, 230400);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SessionConfig::load(Path::new("/nonexistent/session.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/session.toml"));
    }

    #[test]
    fn test_apply() {
        let lb = Loopback::without_echo();
        let peer = lb.peer();
        let mut session = SerialSession::with_driver(Box::new(lb)).unwrap();

        let mut config = SessionConfig::new("loopback");
        config.attributes.speed = 19200;
        config.line = LineDelimiters::new("", ";");
        config.read_timeout_ms = Some(60_000);
        config.apply(&mut session).unwrap();

        assert_eq!(peer.attributes().speed, 19200);
        assert_eq!(session.read_timeout(), Some(Duration::from_secs(60)));
        assert!(session.write_timeout().is_none());
        assert!(session.read_deadline().is_none());

        peer.feed(b"a\rb;");
        assert_eq!(session.read_line().unwrap(), "a\rb");
    }

    #[test]
    fn test_applied_timeout_outlives_first_interval() {
        let lb = Loopback::without_echo();
        let peer = lb.peer();
        let mut session = SerialSession::with_driver(Box::new(lb)).unwrap();

        let mut config = SessionConfig::new("loopback");
        config.read_timeout_ms = Some(30);
        config.apply(&mut session).unwrap();

        std::thread::sleep(Duration::from_millis(60));
        peer.feed(b"ready\n");
        assert_eq!(session.read_line().unwrap(), "ready");
        assert!(session.read_line().unwrap_err().is_timeout());
    }

    #[test]
    fn test_parity_letters() {
        let config =
            SessionConfig::from_toml_str("path = \"/dev/x\"\nparity = \"O\"").unwrap();
        assert_eq!(config.attributes.parity, Parity::Odd);
        assert!(config.to_toml_string().unwrap().contains("parity = \"odd\""));
    }
}
