//! Unattended recorder for LiDAR-class UDP sensor traffic.
//!
//! Frames from a live interface pass a pcap-filter style expression, are
//! appended to a timestamped pcap file with a periodic forced flush, and a
//! sampled source/destination summary is printed for the operator.
//!
//! ```rust,no_run
//! use sensorcap::capture::PnetEngine;
//! use sensorcap::naming::NamingPolicy;
//! use sensorcap::platform::SystemPlatform;
//! use sensorcap::report::ConsoleReporter;
//! use sensorcap::session::{RecordOptions, Recorder, Session, SessionConfig, record};
//! use std::sync::atomic::AtomicBool;
//!
//! fn main() -> sensorcap::Result<()> {
//!     let engine = PnetEngine::open("eth0", false, 1000)?;
//!     let config = SessionConfig {
//!         filter: String::from("src 192.168.1.201 and port 2368"),
//!         ..SessionConfig::default()
//!     };
//!     let mut session = Session::open(engine, &config)?;
//!     let mut recorder = Recorder::create(
//!         RecordOptions::default(),
//!         NamingPolicy::new("/media/usb/pcap"),
//!         SystemPlatform,
//!         ConsoleReporter::new(),
//!     )?;
//!     let stop = AtomicBool::new(false);
//!     let ret = record(&mut session, &mut recorder, &stop);
//!     recorder.finish()?;
//!     session.close()?;
//!     ret
//! }
//! ```

use std::result;

pub mod capture;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod filter;
pub mod naming;
pub mod pcap;
pub mod platform;
pub mod report;
pub mod session;

pub use capture::CaptureEngine;
pub use capture::Device;
pub use capture::RawFrame;
pub use endpoint::EndpointSummary;
pub use endpoint::ProtocolCheck;
pub use error::SensorcapError;
pub use pcap::PcapReader;
pub use pcap::PcapWriter;
pub use session::Recorder;
pub use session::Session;
pub use session::SessionState;

pub type Result<T, E = error::SensorcapError> = result::Result<T, E>;
