use std::path::PathBuf;

use crate::endpoint::ProtocolCheck;
use crate::error::SensorcapError;
use crate::naming::NamingPolicy;
use crate::naming::SplitRule;
use crate::naming::is_discovery;
use crate::pcap::DEFAULT_FILE_SNAPLEN;
use crate::pcap::FLUSH_PKT_NUM;
use crate::platform::DEFAULT_RECORD_DIR;
use crate::session::DEFAULT_SNAPLEN;
use crate::session::RecordOptions;
use crate::session::SessionConfig;

pub const ENV_IFACE: &str = "SENSORCAP_IFACE";
pub const ENV_RECORD_DIR: &str = "SENSORCAP_RECORD_DIR";
pub const ENV_FILTER: &str = "SENSORCAP_FILTER";
pub const ENV_SNAPLEN: &str = "SENSORCAP_SNAPLEN";
pub const ENV_PROMISC: &str = "SENSORCAP_PROMISC";
pub const ENV_TIMEOUT_MS: &str = "SENSORCAP_TIMEOUT_MS";
pub const ENV_SPLIT: &str = "SENSORCAP_SPLIT";
pub const ENV_STRICT: &str = "SENSORCAP_STRICT";

const DEFAULT_IFACE: &str = "eth0";
/// LiDAR data packets from the factory-default sensor address.
pub const DEFAULT_FILTER: &str = "src 192.168.1.201 and port 2368";
const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Everything a recording run needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub device_type: String,
    pub name: String,
    pub iface: String,
    pub record_dir: PathBuf,
    pub filter: String,
    pub snaplen: u32,
    pub promiscuous: bool,
    pub timeout_ms: u64,
    pub split: SplitRule,
    pub check: ProtocolCheck,
}

fn invalid(key: &str, value: &str) -> SensorcapError {
    SensorcapError::InvalidConfig {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, SensorcapError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

impl Settings {
    /// Resolve settings from the positional tags and the process environment.
    pub fn load(device_type: &str, name: &str) -> Result<Settings, SensorcapError> {
        Self::from_lookup(device_type, name, |key| std::env::var(key).ok())
    }
    pub fn from_lookup<F>(device_type: &str, name: &str, lookup: F) -> Result<Settings, SensorcapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings {
            device_type: device_type.to_string(),
            name: name.to_string(),
            iface: DEFAULT_IFACE.to_string(),
            record_dir: PathBuf::from(DEFAULT_RECORD_DIR),
            // discovery records everything the interface sees
            filter: if is_discovery(device_type) {
                String::new()
            } else {
                DEFAULT_FILTER.to_string()
            },
            snaplen: DEFAULT_SNAPLEN,
            promiscuous: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            split: SplitRule::None,
            check: ProtocolCheck::Permissive,
        };

        // Allow environment variable overrides
        if let Some(val) = lookup(ENV_IFACE) {
            if val.trim().is_empty() {
                return Err(invalid(ENV_IFACE, &val));
            }
            settings.iface = val;
        }
        if let Some(val) = lookup(ENV_RECORD_DIR) {
            if val.trim().is_empty() {
                return Err(invalid(ENV_RECORD_DIR, &val));
            }
            settings.record_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup(ENV_FILTER) {
            settings.filter = val;
        }
        if let Some(val) = lookup(ENV_SNAPLEN) {
            let snaplen: u32 = val.trim().parse().map_err(|_| invalid(ENV_SNAPLEN, &val))?;
            if snaplen == 0 || snaplen > DEFAULT_FILE_SNAPLEN {
                return Err(invalid(ENV_SNAPLEN, &val));
            }
            settings.snaplen = snaplen;
        }
        if let Some(val) = lookup(ENV_PROMISC) {
            settings.promiscuous = parse_flag(ENV_PROMISC, &val)?;
        }
        if let Some(val) = lookup(ENV_TIMEOUT_MS) {
            settings.timeout_ms = val.trim().parse().map_err(|_| invalid(ENV_TIMEOUT_MS, &val))?;
        }
        if let Some(val) = lookup(ENV_SPLIT) {
            settings.split = val.parse().map_err(|_| invalid(ENV_SPLIT, &val))?;
        }
        if let Some(val) = lookup(ENV_STRICT) {
            if parse_flag(ENV_STRICT, &val)? {
                settings.check = ProtocolCheck::Strict;
            }
        }
        Ok(settings)
    }
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            snaplen: self.snaplen,
            filter: self.filter.clone(),
        }
    }
    pub fn record_options(&self) -> RecordOptions {
        RecordOptions {
            device_type: self.device_type.clone(),
            name: self.name.clone(),
            check: self.check,
            split: self.split,
            file_snaplen: DEFAULT_FILE_SNAPLEN,
            flush_interval: FLUSH_PKT_NUM,
        }
    }
    pub fn naming_policy(&self) -> NamingPolicy {
        NamingPolicy::new(&self.record_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let s = Settings::from_lookup("HDL32", "usi", with_env(&[])).unwrap();
        assert_eq!(s.iface, "eth0");
        assert_eq!(s.filter, DEFAULT_FILTER);
        assert_eq!(s.snaplen, 65536);
        assert!(!s.promiscuous);
        assert_eq!(s.timeout_ms, 1000);
        assert_eq!(s.split, SplitRule::None);
        assert_eq!(s.check, ProtocolCheck::Permissive);
        assert_eq!(s.record_dir, PathBuf::from(DEFAULT_RECORD_DIR));
        assert_eq!(s.record_options().file_snaplen, 102400);
    }

    #[test]
    fn discovery_has_no_filter() {
        let s = Settings::from_lookup("find_ip", "usi", with_env(&[])).unwrap();
        assert!(s.filter.is_empty());
    }

    #[test]
    fn overrides() {
        let s = Settings::from_lookup(
            "VLP16",
            "site",
            with_env(&[
                (ENV_IFACE, "enp3s0"),
                (ENV_RECORD_DIR, "/data/pcap"),
                (ENV_FILTER, "udp port 2368"),
                (ENV_SNAPLEN, "1500"),
                (ENV_PROMISC, "1"),
                (ENV_TIMEOUT_MS, "250"),
                (ENV_SPLIT, "secs:600"),
                (ENV_STRICT, "true"),
            ]),
        )
        .unwrap();
        assert_eq!(s.iface, "enp3s0");
        assert_eq!(s.naming_policy().record_dir, PathBuf::from("/data/pcap"));
        assert_eq!(s.session_config().filter, "udp port 2368");
        assert_eq!(s.session_config().snaplen, 1500);
        assert!(s.promiscuous);
        assert_eq!(s.timeout_ms, 250);
        assert_eq!(s.split, SplitRule::BySecs(600));
        assert_eq!(s.check, ProtocolCheck::Strict);
    }

    #[test]
    fn invalid_values() {
        for (key, val) in [
            (ENV_SNAPLEN, "102401"),
            (ENV_SNAPLEN, "0"),
            (ENV_SNAPLEN, "big"),
            (ENV_PROMISC, "maybe"),
            (ENV_TIMEOUT_MS, "-1"),
            (ENV_SPLIT, "count:"),
            (ENV_IFACE, " "),
        ] {
            let ret = Settings::from_lookup("HDL32", "usi", with_env(&[(key, val)]));
            assert!(
                matches!(ret, Err(SensorcapError::InvalidConfig { ref key, .. }) if key.starts_with("SENSORCAP_")),
                "{}={}",
                key,
                val
            );
        }
    }
}
