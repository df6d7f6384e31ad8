use chrono::DateTime;
use chrono::Local;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::SensorcapError;
use crate::platform::DEFAULT_RECORD_DIR;

/// Device type that turns the run into a one-off discovery capture.
pub const DISCOVERY_TAG: &str = "find_ip";
#[cfg(not(windows))]
pub const DISCOVERY_PATH: &str = "./pcap/find_ip.pcap";
#[cfg(windows)]
pub const DISCOVERY_PATH: &str = ".\\pcap\\find_ip.pcap";

pub const DEFAULT_DEVICE_TYPE: &str = "HDL32";
pub const DEFAULT_NAME: &str = "usi";

pub fn is_discovery(device_type: &str) -> bool {
    device_type == DISCOVERY_TAG
}

/// `<name>_<YYYYMMDDHHMMSS>[<device_type>].pcap`
pub fn file_name(device_type: &str, name: &str, now: &DateTime<Local>) -> String {
    format!(
        "{}_{}[{}].pcap",
        name,
        now.format("%Y%m%d%H%M%S"),
        device_type
    )
}

/// Output path under the default recording directory.
pub fn compute_output_path(device_type: &str, name: &str, now: &DateTime<Local>) -> PathBuf {
    NamingPolicy::default().output_path(device_type, name, now)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPolicy {
    pub record_dir: PathBuf,
    pub discovery_path: PathBuf,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        NamingPolicy {
            record_dir: PathBuf::from(DEFAULT_RECORD_DIR),
            discovery_path: PathBuf::from(DISCOVERY_PATH),
        }
    }
}

impl NamingPolicy {
    pub fn new<P: AsRef<Path>>(record_dir: P) -> NamingPolicy {
        NamingPolicy {
            record_dir: record_dir.as_ref().to_path_buf(),
            ..NamingPolicy::default()
        }
    }
    pub fn with_discovery_path<P: AsRef<Path>>(mut self, path: P) -> NamingPolicy {
        self.discovery_path = path.as_ref().to_path_buf();
        self
    }
    /// Deterministic in its inputs, touches nothing on disk.
    pub fn output_path(&self, device_type: &str, name: &str, now: &DateTime<Local>) -> PathBuf {
        if is_discovery(device_type) {
            self.discovery_path.clone()
        } else {
            self.record_dir.join(file_name(device_type, name, now))
        }
    }
}

/// When to close the current file and start the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitRule {
    /// One file for the whole run.
    #[default]
    None,
    ByCount(u64),
    BySecs(u64),
}

impl SplitRule {
    pub fn due(&self, records_in_file: u64, secs_in_file: u64) -> bool {
        match *self {
            SplitRule::None => false,
            SplitRule::ByCount(n) => records_in_file >= n,
            SplitRule::BySecs(n) => secs_in_file >= n,
        }
    }
}

impl FromStr for SplitRule {
    type Err = SensorcapError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SensorcapError::InvalidConfig {
            key: String::from("split"),
            value: s.to_string(),
        };
        let s_trim = s.trim();
        if s_trim.is_empty() || s_trim.eq_ignore_ascii_case("none") {
            return Ok(SplitRule::None);
        }
        let (kind, num) = s_trim.split_once(':').ok_or_else(invalid)?;
        let n: u64 = num.trim().parse().map_err(|_| invalid())?;
        if n == 0 {
            return Err(invalid());
        }
        match kind.trim() {
            "count" => Ok(SplitRule::ByCount(n)),
            "secs" => Ok(SplitRule::BySecs(n)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for SplitRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SplitRule::None => write!(f, "none"),
            SplitRule::ByCount(n) => write!(f, "count:{}", n),
            SplitRule::BySecs(n) => write!(f, "secs:{}", n),
        }
    }
}
