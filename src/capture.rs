use pnet::datalink;
use pnet::datalink::Channel::Ethernet;
use pnet::datalink::ChannelType;
use pnet::datalink::Config;
use pnet::datalink::DataLinkReceiver;
use pnet::datalink::MacAddr;
use pnet::datalink::NetworkInterface;
use pnet::ipnetwork::IpNetwork;
use std::fmt;
use std::io::ErrorKind;
use std::time::Duration;
use std::time::SystemTime;

use crate::error::SensorcapError;
use crate::pcap::LinkType;

static DEFAULT_BUFFER_SIZE: usize = 65535;

// ARPHRD_ETHER and ARPHRD_LOOPBACK, both framed as ethernet on a packet socket
const ARPHRD_ETHER: u32 = 1;
const ARPHRD_LOOPBACK: u32 = 772;

/// One frame as delivered by a capture engine.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub ts: SystemTime,
    /// Bytes the engine handed over, possibly already cut by the engine.
    pub data: &'a [u8],
    /// Length of the frame on the wire.
    pub original_len: usize,
}

/// The live capture handle the session pulls frames from.
pub trait CaptureEngine {
    /// Wait for the next frame. `Ok(None)` means the read timeout expired
    /// without delivery, so the caller can look at its stop flag.
    fn next_frame(&mut self) -> Result<Option<RawFrame<'_>>, SensorcapError>;
    fn interface_name(&self) -> &str;
    fn link_type(&self) -> LinkType {
        LinkType::ETHERNET
    }
}

#[derive(Debug, Clone)]
pub struct Device {
    // Interface name.
    pub name: String,
    /// Interface description.
    pub desc: Option<String>,
    // All ip address (include IPv6 if exists).
    pub ips: Vec<IpNetwork>,
    // Mac address.
    pub mac: Option<MacAddr>,
    pub up: bool,
}

impl Device {
    /// Returns all interfaces in the system.
    pub fn list() -> Vec<Device> {
        datalink::interfaces()
            .into_iter()
            .map(|n| Device {
                up: n.is_up(),
                desc: if n.description.is_empty() {
                    None
                } else {
                    Some(n.description)
                },
                name: n.name,
                ips: n.ips,
                mac: n.mac,
            })
            .collect()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let status = if self.up { "UP" } else { "DOWN" };
        let ips: Vec<String> = self.ips.iter().map(|ip| ip.to_string()).collect();
        write!(f, "{}: {} [", self.name, status)?;
        if ips.is_empty() {
            write!(f, "no IP")?;
        } else {
            write!(f, "{}", ips.join(", "))?;
        }
        write!(f, "]")?;
        if let Some(desc) = &self.desc {
            write!(f, " {}", desc)?;
        }
        Ok(())
    }
}

/// Map a kernel `ARPHRD_*` hardware type to the link type its frames carry.
fn link_type_of_arphrd(arphrd: u32) -> LinkType {
    match arphrd {
        ARPHRD_ETHER | ARPHRD_LOOPBACK => LinkType::ETHERNET,
        // tun, ppp, wireguard and friends hand over bare IP packets
        _ => LinkType::RAW,
    }
}

#[cfg(target_os = "linux")]
fn sysfs_arphrd(iface: &str) -> Option<u32> {
    let path = format!("/sys/class/net/{}/type", iface);
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(not(target_os = "linux"))]
fn sysfs_arphrd(_iface: &str) -> Option<u32> {
    None
}

/// Link layer of the frames `interface` delivers.
///
/// The kernel hardware type is used when it can be read, otherwise the
/// interface flags decide: point to point links and links without a hardware
/// address (loopback aside) carry no ethernet header.
pub fn link_type_of(interface: &NetworkInterface) -> LinkType {
    if let Some(arphrd) = sysfs_arphrd(&interface.name) {
        return link_type_of_arphrd(arphrd);
    }
    link_type_from_flags(interface)
}

fn link_type_from_flags(interface: &NetworkInterface) -> LinkType {
    if interface.is_point_to_point() || (interface.mac.is_none() && !interface.is_loopback()) {
        LinkType::RAW
    } else {
        LinkType::ETHERNET
    }
}

/// Live capture on one interface through a pnet layer 2 channel.
pub struct PnetEngine {
    iface: String,
    link: LinkType,
    rx: Box<dyn DataLinkReceiver>,
}

impl PnetEngine {
    pub fn open(iface: &str, promiscuous: bool, timeout_ms: u64) -> Result<PnetEngine, SensorcapError> {
        let interface = match datalink::interfaces().into_iter().find(|i| i.name == iface) {
            Some(interface) => interface,
            None => {
                for device in Device::list() {
                    tracing::info!("available device: {}", device);
                }
                return Err(SensorcapError::DeviceUnavailable {
                    iface: iface.to_string(),
                    e: String::from("no such device"),
                });
            }
        };

        let link = link_type_of(&interface);
        if link != LinkType::ETHERNET {
            tracing::warn!("{} is not an ethernet interface ({:?})", iface, link);
        }

        let timeout = Duration::from_millis(timeout_ms);
        let config = Config {
            write_buffer_size: DEFAULT_BUFFER_SIZE,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            read_timeout: Some(timeout),
            write_timeout: Some(timeout),
            channel_type: ChannelType::Layer2,
            promiscuous,
            ..Config::default()
        };

        let rx = match datalink::channel(&interface, config) {
            Ok(Ethernet(_tx, rx)) => rx,
            Ok(_) => {
                return Err(SensorcapError::UnsupportedLinkLayer {
                    iface: iface.to_string(),
                });
            }
            Err(e) => {
                return Err(SensorcapError::DeviceUnavailable {
                    iface: iface.to_string(),
                    e: e.to_string(),
                });
            }
        };
        tracing::debug!(iface, promiscuous, timeout_ms, "channel opened");
        Ok(PnetEngine {
            iface: iface.to_string(),
            link,
            rx,
        })
    }
}

impl CaptureEngine for PnetEngine {
    fn next_frame(&mut self) -> Result<Option<RawFrame<'_>>, SensorcapError> {
        match self.rx.next() {
            Ok(data) => Ok(Some(RawFrame {
                ts: SystemTime::now(),
                data,
                original_len: data.len(),
            })),
            Err(e) => match e.kind() {
                // no data captured try next loop
                ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock => Ok(None),
                _ => Err(SensorcapError::CapturePacketError { e: e.to_string() }),
            },
        }
    }
    fn interface_name(&self) -> &str {
        &self.iface
    }
    fn link_type(&self) -> LinkType {
        self.link
    }
}
