use thiserror::Error;

use crate::session::SessionState;

#[derive(Error, Debug)]
pub enum SensorcapError {
    #[error("unable to open device {iface}: {e}")]
    DeviceUnavailable { iface: String, e: String },
    #[error("device {iface} is not an ethernet device")]
    UnsupportedLinkLayer { iface: String },
    #[error("unable to compile the packet filter: {msg}")]
    FilterSyntax { msg: String },
    #[error("error setting the filter: {msg}")]
    FilterInstall { msg: String },
    #[error("can not convert {parameter} to {target}: {e}")]
    ValueError {
        parameter: String,
        target: String,
        e: String,
    },
    #[error("captured length {captured} exceeds snaplen {snaplen}")]
    SnaplenExceeded { captured: u32, snaplen: u32 },
    #[error("invalid pcap file: {msg}")]
    InvalidPcapFile { msg: String },
    #[error("invalid session transition from {from:?} to {to:?}")]
    InvalidState { from: SessionState, to: SessionState },
    #[error("invalid config value for {key}: {value}")]
    InvalidConfig { key: String, value: String },
    #[error("capture the packet error: {e}")]
    CapturePacketError { e: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SensorcapError {
    /// Filter literal errors surface to the operator as compile failures.
    pub(crate) fn into_filter_syntax(self) -> SensorcapError {
        match self {
            SensorcapError::ValueError {
                parameter,
                target,
                e,
            } => SensorcapError::FilterSyntax {
                msg: format!("can not convert {} to {}: {}", parameter, target, e),
            },
            other => other,
        }
    }
}
