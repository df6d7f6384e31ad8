use pnet::datalink::MacAddr;
use pnet::packet::Packet;
use pnet::packet::ethernet::EtherType;
use pnet::packet::ethernet::EtherTypes;
use pnet::packet::ethernet::EthernetPacket;
use pnet::packet::ip::IpNextHeaderProtocol;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;

use crate::error::SensorcapError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Protocol {
    Layer3(EtherType),
    Layer4(IpNextHeaderProtocol),
}

impl Protocol {
    fn convert(name: &str) -> Option<Self> {
        let p = match name {
            "ip" => Protocol::Layer3(EtherTypes::Ipv4),
            "ip6" | "ipv6" => Protocol::Layer3(EtherTypes::Ipv6),
            "arp" => Protocol::Layer3(EtherTypes::Arp),
            "rarp" => Protocol::Layer3(EtherTypes::Rarp),
            "vlan" => Protocol::Layer3(EtherTypes::Vlan),
            "tcp" => Protocol::Layer4(IpNextHeaderProtocols::Tcp),
            "udp" => Protocol::Layer4(IpNextHeaderProtocols::Udp),
            "icmp" => Protocol::Layer4(IpNextHeaderProtocols::Icmp),
            "icmp6" => Protocol::Layer4(IpNextHeaderProtocols::Icmpv6),
            "igmp" => Protocol::Layer4(IpNextHeaderProtocols::Igmp),
            "sctp" => Protocol::Layer4(IpNextHeaderProtocols::Sctp),
            _ => return None,
        };
        Some(p)
    }
}

/// Which side of the packet a qualifier looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Src,
    Dst,
    Any,
}

impl Direction {
    fn matches<T: Copy>(self, src: T, dst: T, pred: impl Fn(T) -> bool) -> bool {
        match self {
            Direction::Src => pred(src),
            Direction::Dst => pred(dst),
            Direction::Any => pred(src) || pred(dst),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterElem {
    Mac(Direction, MacAddr),
    Broadcast,
    Multicast,
    Host(Direction, IpAddr),
    Net(Direction, IpAddr, u8),
    Port(Direction, u16),
    PortRange(Direction, u16, u16),
    Protocol(Protocol),
    Less(usize),
    Greater(usize),
}

/// Fields of one frame the filter can look at, decoded once per packet.
struct PacketView {
    len: usize,
    macs: Option<(MacAddr, MacAddr)>,
    ethertype: Option<EtherType>,
    addrs: Option<(IpAddr, IpAddr)>,
    next_proto: Option<IpNextHeaderProtocol>,
    ports: Option<(u16, u16)>,
}

impl PacketView {
    fn new(packet: &[u8]) -> PacketView {
        let mut view = PacketView {
            len: packet.len(),
            macs: None,
            ethertype: None,
            addrs: None,
            next_proto: None,
            ports: None,
        };
        let ethernet_packet = match EthernetPacket::new(packet) {
            Some(ethernet_packet) => ethernet_packet,
            None => return view,
        };
        view.macs = Some((ethernet_packet.get_source(), ethernet_packet.get_destination()));
        view.ethertype = Some(ethernet_packet.get_ethertype());
        match ethernet_packet.get_ethertype() {
            EtherTypes::Ipv4 => {
                if let Some(ipv4_packet) = Ipv4Packet::new(ethernet_packet.payload()) {
                    let proto = ipv4_packet.get_next_level_protocol();
                    view.addrs = Some((
                        IpAddr::V4(ipv4_packet.get_source()),
                        IpAddr::V4(ipv4_packet.get_destination()),
                    ));
                    view.next_proto = Some(proto);
                    view.ports = transport_ports(proto, ipv4_packet.payload());
                }
            }
            EtherTypes::Ipv6 => {
                if let Some(ipv6_packet) = Ipv6Packet::new(ethernet_packet.payload()) {
                    let proto = ipv6_packet.get_next_header();
                    view.addrs = Some((
                        IpAddr::V6(ipv6_packet.get_source()),
                        IpAddr::V6(ipv6_packet.get_destination()),
                    ));
                    view.next_proto = Some(proto);
                    view.ports = transport_ports(proto, ipv6_packet.payload());
                }
            }
            _ => (),
        }
        view
    }
}

fn transport_ports(proto: IpNextHeaderProtocol, payload: &[u8]) -> Option<(u16, u16)> {
    match proto {
        IpNextHeaderProtocols::Tcp => {
            TcpPacket::new(payload).map(|p| (p.get_source(), p.get_destination()))
        }
        IpNextHeaderProtocols::Udp => {
            UdpPacket::new(payload).map(|p| (p.get_source(), p.get_destination()))
        }
        _ => None,
    }
}

impl FilterElem {
    fn check(&self, view: &PacketView) -> bool {
        match *self {
            FilterElem::Mac(dir, mac) => match view.macs {
                Some((src, dst)) => dir.matches(src, dst, |m| m == mac),
                None => false,
            },
            FilterElem::Broadcast => match view.macs {
                Some((_, dst)) => dst == MacAddr::broadcast(),
                None => false,
            },
            FilterElem::Multicast => match view.macs {
                Some((_, dst)) => dst.octets()[0] & 1 == 1 && dst != MacAddr::broadcast(),
                None => false,
            },
            FilterElem::Host(dir, addr) => match view.addrs {
                Some((src, dst)) => dir.matches(src, dst, |a| a == addr),
                None => false,
            },
            FilterElem::Net(dir, net, prefix) => match view.addrs {
                Some((src, dst)) => dir.matches(src, dst, |a| ip_in_net(a, net, prefix)),
                None => false,
            },
            FilterElem::Port(dir, port) => match view.ports {
                Some((src, dst)) => dir.matches(src, dst, |p| p == port),
                None => false,
            },
            FilterElem::PortRange(dir, start, end) => match view.ports {
                Some((src, dst)) => dir.matches(src, dst, |p| p >= start && p <= end),
                None => false,
            },
            FilterElem::Protocol(Protocol::Layer3(et)) => view.ethertype == Some(et),
            FilterElem::Protocol(Protocol::Layer4(p)) => view.next_proto == Some(p),
            FilterElem::Less(len) => view.len <= len,
            FilterElem::Greater(len) => view.len >= len,
        }
    }
}

fn ip_in_net(ip: IpAddr, net: IpAddr, prefix: u8) -> bool {
    match (ip, net) {
        (IpAddr::V4(ip), IpAddr::V4(net)) => ip_in_net_v4(ip, net, prefix),
        (IpAddr::V6(ip), IpAddr::V6(net)) => ip_in_net_v6(ip, net, prefix),
        _ => false,
    }
}

fn ip_in_net_v4(ip: Ipv4Addr, net: Ipv4Addr, prefix: u8) -> bool {
    let mask = if prefix == 0 {
        0u32
    } else {
        u32::MAX.checked_shl(32 - prefix as u32).unwrap_or(0)
    };
    (u32::from(ip) & mask) == (u32::from(net) & mask)
}

fn ip_in_net_v6(ip: Ipv6Addr, net: Ipv6Addr, prefix: u8) -> bool {
    let mask: u128 = if prefix == 0 {
        0
    } else {
        (!0u128) << (128 - prefix as u32)
    };
    (u128::from(ip) & mask) == (u128::from(net) & mask)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
    LeftBracket,
}

impl Operator {
    // pcap-filter: negation binds tightest, `and` and `or` share one level
    // and associate left to right
    fn prec(self) -> u8 {
        match self {
            Operator::Not => 2,
            Operator::And | Operator::Or => 1,
            Operator::LeftBracket => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShuntingYardElem {
    Filter(FilterElem),
    Operator(Operator),
}

/// A compiled filter expression in postfix order (shunting yard alg.).
#[derive(Debug, Clone)]
pub struct Filter {
    pub input_str: String,
    pub output_queue: Vec<ShuntingYardElem>,
}

fn syntax(msg: impl Into<String>) -> SensorcapError {
    SensorcapError::FilterSyntax { msg: msg.into() }
}

fn value<'a>(tokens: &'a [String], idx: usize, what: &str) -> Result<&'a str, SensorcapError> {
    match tokens.get(idx) {
        Some(t) => Ok(t.as_str()),
        None => Err(syntax(format!("{} requires a value", what))),
    }
}

fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    for ch in input.chars() {
        match ch {
            '(' | ')' => {
                if !buf.is_empty() {
                    tokens.push(std::mem::take(&mut buf));
                }
                tokens.push(ch.to_string());
            }
            c if c.is_whitespace() => {
                if !buf.is_empty() {
                    tokens.push(std::mem::take(&mut buf));
                }
            }
            _ => buf.push(ch),
        }
    }
    if !buf.is_empty() {
        tokens.push(buf);
    }
    tokens
}

fn push_binary(op: Operator, op_stack: &mut Vec<Operator>, output_queue: &mut Vec<ShuntingYardElem>) {
    while let Some(&top) = op_stack.last() {
        if top == Operator::LeftBracket || top.prec() < op.prec() {
            break;
        }
        op_stack.pop();
        output_queue.push(ShuntingYardElem::Operator(top));
    }
    op_stack.push(op);
}

/// Parse `[host|net|port|portrange] <value>` or a bare address after a
/// direction qualifier. Returns the number of tokens consumed.
fn parse_directed(
    dir: Direction,
    tokens: &[String],
    out: &mut Vec<ShuntingYardElem>,
    ctx: &str,
) -> Result<usize, SensorcapError> {
    let kind = value(tokens, 0, ctx)?.to_lowercase();
    let (elem, used) = match kind.as_str() {
        "host" => (FilterElem::Host(dir, parse_ip(value(tokens, 1, "host")?)?), 2),
        "net" => {
            let v = value(tokens, 1, "net")?;
            if let Some((ip, prefix)) = parse_cidr(v)? {
                (FilterElem::Net(dir, ip, prefix), 2)
            } else if tokens.get(2).is_some_and(|t| t.eq_ignore_ascii_case("mask")) {
                let (ip, prefix) = parse_ip_mask(v, value(tokens, 3, "mask")?)?;
                (FilterElem::Net(dir, ip, prefix), 4)
            } else {
                let ip = parse_ip(v)?;
                let prefix = if ip.is_ipv4() { 32 } else { 128 };
                (FilterElem::Net(dir, ip, prefix), 2)
            }
        }
        "port" => (FilterElem::Port(dir, parse_u16_num(value(tokens, 1, "port")?)?), 2),
        "portrange" => {
            let (start, end) = parse_port_range(value(tokens, 1, "portrange")?)?;
            (FilterElem::PortRange(dir, start, end), 2)
        }
        // an id without a type is a host, or a net when it carries a prefix
        literal => match parse_cidr(literal)? {
            Some((ip, prefix)) => (FilterElem::Net(dir, ip, prefix), 1),
            None => match literal.parse::<IpAddr>() {
                Ok(ip) => (FilterElem::Host(dir, ip), 1),
                Err(_) => return Err(syntax(format!("unexpected token: {}", literal))),
            },
        },
    };
    out.push(ShuntingYardElem::Filter(elem));
    Ok(used)
}

fn parse_ether(tokens: &[String], out: &mut Vec<ShuntingYardElem>) -> Result<usize, SensorcapError> {
    let qual = value(tokens, 1, "ether")?.to_lowercase();
    let (elem, used) = match qual.as_str() {
        "src" | "dst" | "host" => {
            let dir = match qual.as_str() {
                "src" => Direction::Src,
                "dst" => Direction::Dst,
                _ => Direction::Any,
            };
            let mac_str = value(tokens, 2, "ether address")?;
            let mac = mac_str
                .parse::<MacAddr>()
                .map_err(|e| SensorcapError::ValueError {
                    parameter: mac_str.to_string(),
                    target: "MacAddr".into(),
                    e: e.to_string(),
                })?;
            (FilterElem::Mac(dir, mac), 3)
        }
        "broadcast" => (FilterElem::Broadcast, 2),
        "multicast" => (FilterElem::Multicast, 2),
        "proto" => {
            let tok = value(tokens, 2, "ether proto")?.to_lowercase();
            let et = match parse_u16_num(&tok) {
                Ok(v) => EtherType(v),
                Err(_) => match Protocol::convert(&tok) {
                    Some(Protocol::Layer3(et)) => et,
                    _ => return Err(syntax(format!("unsupported ether proto: {}", tok))),
                },
            };
            (FilterElem::Protocol(Protocol::Layer3(et)), 3)
        }
        _ => return Err(syntax(format!("unsupported ether qualifier: {}", qual))),
    };
    out.push(ShuntingYardElem::Filter(elem));
    Ok(used)
}

/// `ip`, `udp`, ... optionally followed by `src|dst|host <addr>` or
/// `proto <name|num>` for the network layer protocols.
fn parse_protocol(
    proto: Protocol,
    tokens: &[String],
    out: &mut Vec<ShuntingYardElem>,
) -> Result<usize, SensorcapError> {
    out.push(ShuntingYardElem::Filter(FilterElem::Protocol(proto)));
    let is_ip = matches!(proto, Protocol::Layer3(et) if et == EtherTypes::Ipv4 || et == EtherTypes::Ipv6);
    let next = tokens.get(1).map(|t| t.to_lowercase());
    let used = match next.as_deref() {
        Some("src") if is_ip => 2 + parse_directed(Direction::Src, &tokens[2..], out, "src")?,
        Some("dst") if is_ip => 2 + parse_directed(Direction::Dst, &tokens[2..], out, "dst")?,
        Some("host") if is_ip => 1 + parse_directed(Direction::Any, &tokens[1..], out, "host")?,
        Some("proto") if is_ip => {
            let tok = value(tokens, 2, "proto")?.to_lowercase();
            let nh = match tok.parse::<u8>() {
                Ok(n) => IpNextHeaderProtocol(n),
                Err(_) => match Protocol::convert(&tok) {
                    Some(Protocol::Layer4(nh)) => nh,
                    _ => return Err(syntax(format!("unsupported ip proto: {}", tok))),
                },
            };
            out.push(ShuntingYardElem::Filter(FilterElem::Protocol(Protocol::Layer4(nh))));
            3
        }
        _ => return Ok(1),
    };
    // the qualifier applies on top of the protocol
    out.push(ShuntingYardElem::Operator(Operator::And));
    Ok(used)
}

/// Parse one primitive starting at `tokens[0]` into postfix form.
fn parse_primitive(
    tokens: &[String],
    out: &mut Vec<ShuntingYardElem>,
) -> Result<usize, SensorcapError> {
    let head = tokens[0].to_lowercase();
    match head.as_str() {
        "ether" => parse_ether(tokens, out),
        "broadcast" => {
            out.push(ShuntingYardElem::Filter(FilterElem::Broadcast));
            Ok(1)
        }
        "multicast" => {
            out.push(ShuntingYardElem::Filter(FilterElem::Multicast));
            Ok(1)
        }
        "less" | "greater" => {
            let len_str = value(tokens, 1, &head)?;
            let len = len_str
                .parse::<usize>()
                .map_err(|e| SensorcapError::ValueError {
                    parameter: len_str.to_string(),
                    target: "usize".into(),
                    e: e.to_string(),
                })?;
            let elem = if head == "less" {
                FilterElem::Less(len)
            } else {
                FilterElem::Greater(len)
            };
            out.push(ShuntingYardElem::Filter(elem));
            Ok(2)
        }
        "src" => Ok(1 + parse_directed(Direction::Src, &tokens[1..], out, "src")?),
        "dst" => Ok(1 + parse_directed(Direction::Dst, &tokens[1..], out, "dst")?),
        _ => match Protocol::convert(&head) {
            Some(proto) => parse_protocol(proto, tokens, out),
            None => parse_directed(Direction::Any, tokens, out, &head),
        },
    }
}

impl Filter {
    /// Compile a pcap-filter style expression.
    ///
    /// An empty (or blank) expression compiles to `None`, which accepts
    /// every packet.
    pub fn parser(input: &str) -> Result<Option<Self>, SensorcapError> {
        if input.trim().is_empty() {
            return Ok(None);
        }
        let tokens = tokenize(input);

        let mut output_queue: Vec<ShuntingYardElem> = Vec::new();
        let mut op_stack: Vec<Operator> = Vec::new();
        // adjacent operands are joined with an implicit `and` ("udp port 53")
        let mut prev_operand = false;

        let mut i = 0;
        while i < tokens.len() {
            let t = tokens[i].to_lowercase();
            match t.as_str() {
                "and" | "&&" => {
                    push_binary(Operator::And, &mut op_stack, &mut output_queue);
                    prev_operand = false;
                    i += 1;
                }
                "or" | "||" => {
                    push_binary(Operator::Or, &mut op_stack, &mut output_queue);
                    prev_operand = false;
                    i += 1;
                }
                "not" | "!" => {
                    if prev_operand {
                        push_binary(Operator::And, &mut op_stack, &mut output_queue);
                    }
                    op_stack.push(Operator::Not);
                    prev_operand = false;
                    i += 1;
                }
                "(" => {
                    if prev_operand {
                        push_binary(Operator::And, &mut op_stack, &mut output_queue);
                    }
                    op_stack.push(Operator::LeftBracket);
                    prev_operand = false;
                    i += 1;
                }
                ")" => {
                    // pop until LeftBracket
                    loop {
                        match op_stack.pop() {
                            Some(Operator::LeftBracket) => break,
                            Some(op) => output_queue.push(ShuntingYardElem::Operator(op)),
                            None => return Err(syntax("unbalanced parenthesis")),
                        }
                    }
                    prev_operand = true;
                    i += 1;
                }
                _ => {
                    if prev_operand {
                        push_binary(Operator::And, &mut op_stack, &mut output_queue);
                    }
                    let used = parse_primitive(&tokens[i..], &mut output_queue)
                        .map_err(SensorcapError::into_filter_syntax)?;
                    prev_operand = true;
                    i += used;
                }
            }
        }

        // pop remaining operators
        while let Some(op) = op_stack.pop() {
            if op == Operator::LeftBracket {
                return Err(syntax("unbalanced parenthesis"));
            }
            output_queue.push(ShuntingYardElem::Operator(op));
        }

        Ok(Some(Self {
            input_str: input.to_string(),
            output_queue,
        }))
    }
    /// Check that the postfix program leaves exactly one result, which is
    /// what attaching the filter to a session requires.
    pub fn validate(&self) -> Result<(), SensorcapError> {
        let mut depth = 0usize;
        for sye in &self.output_queue {
            match sye {
                ShuntingYardElem::Filter(_) => depth += 1,
                ShuntingYardElem::Operator(Operator::Not) => {
                    if depth < 1 {
                        return Err(SensorcapError::FilterInstall {
                            msg: format!("operator not missing operand in '{}'", self.input_str),
                        });
                    }
                }
                ShuntingYardElem::Operator(Operator::And | Operator::Or) => {
                    if depth < 2 {
                        return Err(SensorcapError::FilterInstall {
                            msg: format!(
                                "binary operator missing operand in '{}'",
                                self.input_str
                            ),
                        });
                    }
                    depth -= 1;
                }
                ShuntingYardElem::Operator(Operator::LeftBracket) => (),
            }
        }
        if depth != 1 {
            return Err(SensorcapError::FilterInstall {
                msg: format!("incomplete filter '{}'", self.input_str),
            });
        }
        Ok(())
    }
    /// Evaluate the filter against one frame. A malformed program never matches.
    pub fn check(&self, packet_data: &[u8]) -> bool {
        let view = PacketView::new(packet_data);
        let mut calc_stack: Vec<bool> = Vec::with_capacity(self.output_queue.len());
        for sye in &self.output_queue {
            match sye {
                ShuntingYardElem::Filter(f) => calc_stack.push(f.check(&view)),
                ShuntingYardElem::Operator(Operator::Not) => match calc_stack.pop() {
                    Some(b) => calc_stack.push(!b),
                    None => return false,
                },
                ShuntingYardElem::Operator(op @ (Operator::And | Operator::Or)) => {
                    let (b2, b1) = match (calc_stack.pop(), calc_stack.pop()) {
                        (Some(b2), Some(b1)) => (b2, b1),
                        _ => return false,
                    };
                    calc_stack.push(if *op == Operator::And { b1 && b2 } else { b1 || b2 });
                }
                ShuntingYardElem::Operator(Operator::LeftBracket) => (),
            }
        }
        calc_stack.len() == 1 && calc_stack[0]
    }
}

fn parse_ip(s: &str) -> Result<IpAddr, SensorcapError> {
    s.parse::<IpAddr>()
        .map_err(|e| SensorcapError::ValueError {
            parameter: s.to_string(),
            target: "IpAddr".into(),
            e: e.to_string(),
        })
}

fn parse_cidr(s: &str) -> Result<Option<(IpAddr, u8)>, SensorcapError> {
    if let Some((ip_part, prefix_part)) = s.split_once('/') {
        let ip = parse_ip(ip_part)?;
        let prefix: u8 = prefix_part
            .parse::<u8>()
            .map_err(|e| SensorcapError::ValueError {
                parameter: prefix_part.to_string(),
                target: "u8".into(),
                e: e.to_string(),
            })?;
        let max = if ip.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(syntax(format!("prefix /{} too long for {}", prefix, ip)));
        }
        Ok(Some((ip, prefix)))
    } else {
        Ok(None)
    }
}

fn parse_ip_mask(ip_str: &str, mask_str: &str) -> Result<(IpAddr, u8), SensorcapError> {
    let ip = parse_ip(ip_str)?;
    match (ip, parse_ip(mask_str)?) {
        (IpAddr::V4(ipv4), IpAddr::V4(mask_v4)) => {
            let m = u32::from(mask_v4);
            let prefix = m.leading_ones() as u8;
            // mask must be contiguous ones
            if m.checked_shl(prefix as u32).unwrap_or(0) != 0 {
                return Err(syntax("non-contiguous IPv4 mask"));
            }
            Ok((IpAddr::V4(ipv4), prefix))
        }
        _ => Err(syntax("mask form only supported for IPv4")),
    }
}

fn parse_port_range(s: &str) -> Result<(u16, u16), SensorcapError> {
    match s.split_once('-') {
        Some((a, b)) => {
            let start = parse_u16_num(a)?;
            let end = parse_u16_num(b)?;
            if start <= end {
                Ok((start, end))
            } else {
                Err(syntax("portrange start > end"))
            }
        }
        None => Err(syntax("portrange requires a-b")),
    }
}

fn parse_u16_num(s: &str) -> Result<u16, SensorcapError> {
    let ret = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    ret.map_err(|e| SensorcapError::ValueError {
        parameter: s.to_string(),
        target: "u16".into(),
        e: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::tests::udp_frame;

    fn compile(ex: &str) -> Filter {
        let filter = Filter::parser(ex).unwrap().unwrap();
        filter.validate().unwrap();
        filter
    }

    fn lidar_frame() -> Vec<u8> {
        udp_frame([192, 168, 1, 201], 2368, [255, 255, 255, 255], 2368, &[0u8; 32])
    }

    #[test]
    fn test_filters_parser() {
        let exs = vec![
            "src 192.168.1.201 and port 2368",
            "src host 192.168.1.201 and dst port 2368",
            "udp port 2368",
            "udp and (host 192.168.1.1 and port 80)",
            "host 192.168.1.1",
            "not host 192.168.1.1",
            "not host 192.168.1.1 and tcp",
            "(host 192.168.1.1 and not tcp) or port 80",
            "src net 192.168.1.0/24 and portrange 80-8080",
            "dst net 2001:db8::/32 and udp",
            "net 10.0.0.0 mask 255.0.0.0 and not icmp",
            "ether broadcast",
            "ether multicast",
            "ether proto ip6",
            "ether src 60:76:88:00:00:01",
            "ip host 192.168.1.2",
            "ip src 192.168.1.3",
            "ip proto udp",
            "ip6 dst 2001:db8::2",
            "less 1248 && greater 64",
            "192.168.1.201 || ! arp",
        ];
        for ex in exs {
            compile(ex);
        }
    }

    #[test]
    fn empty_expression_accepts_everything() {
        assert!(Filter::parser("").unwrap().is_none());
        assert!(Filter::parser("   ").unwrap().is_none());
    }

    #[test]
    fn syntax_errors() {
        let bad = vec![
            "src",
            "port",
            "port http",
            "src 300.1.1.1",
            "host 192.168.1.1 and (port 80",
            "port 80)",
            "portrange 90-80",
            "net 10.0.0.0/40",
            "net 10.0.0.0 mask 255.0.255.0",
            "ether src zz:zz",
            "foo",
        ];
        for ex in bad {
            let ret = Filter::parser(ex);
            assert!(
                matches!(ret, Err(SensorcapError::FilterSyntax { .. })),
                "{} -> {:?}",
                ex,
                ret
            );
        }
    }

    #[test]
    fn dangling_operator_fails_validation() {
        for ex in ["port 80 and", "not", "and port 80", "()"] {
            let filter = Filter::parser(ex).unwrap().unwrap();
            assert!(matches!(
                filter.validate(),
                Err(SensorcapError::FilterInstall { .. })
            ));
            assert!(!filter.check(&lidar_frame()));
        }
    }

    #[test]
    fn lidar_filter_matches_sensor_only() {
        let filter = compile("src 192.168.1.201 and port 2368");
        assert!(filter.check(&lidar_frame()));

        let other_src = udp_frame([192, 168, 1, 77], 2368, [255, 255, 255, 255], 2368, &[]);
        assert!(!filter.check(&other_src));

        let other_port = udp_frame([192, 168, 1, 201], 8308, [255, 255, 255, 255], 8308, &[]);
        assert!(!filter.check(&other_port));

        assert!(!filter.check(&[0u8; 10]));
    }

    #[test]
    fn and_or_share_precedence() {
        // (tcp or udp) and port 80, not tcp or (udp and port 80)
        let filter = compile("udp or tcp and port 80");
        assert!(!filter.check(&lidar_frame()));
        let filter = compile("udp or (tcp and port 80)");
        assert!(filter.check(&lidar_frame()));
    }

    #[test]
    fn negation_and_groups() {
        let frame = lidar_frame();
        assert!(compile("not tcp").check(&frame));
        assert!(!compile("not (udp and port 2368)").check(&frame));
        assert!(compile("not not udp").check(&frame));
        assert!(compile("ether broadcast").check(&frame));
        assert!(!compile("ether multicast").check(&frame));
        assert!(compile("ether src 60:76:88:00:00:01").check(&frame));
        assert!(compile("src net 192.168.1.0/24").check(&frame));
        assert!(!compile("dst net 192.168.1.0 mask 255.255.255.0").check(&frame));
        assert!(compile("portrange 2000-3000").check(&frame));
        assert!(compile("ip proto 17").check(&frame));
        assert!(compile("greater 64").check(&frame));
        assert!(!compile("less 64").check(&frame));
    }

    #[test]
    fn test_filter_with_tcp_data() {
        let packet_data = vec![
            0x0, 0xc, 0x29, 0x82, 0x7f, 0x58, 0x0, 0x50, 0x56, 0xc0, 0x0, 0x8, 0x8, 0x0, 0x45, 0x0,
            0x0, 0x34, 0xed, 0x3f, 0x40, 0x0, 0x80, 0x6, 0x81, 0x9a, 0xc0, 0xa8, 0x5, 0x1, 0xc0,
            0xa8, 0x5, 0x98, 0xd0, 0x4d, 0x0, 0x50, 0x6e, 0x85, 0x6d, 0xe6, 0x0, 0x0, 0x0, 0x0,
            0x80, 0x2, 0xff, 0xff, 0x36, 0x1d, 0x0, 0x0, 0x2, 0x4, 0x5, 0xb4, 0x1, 0x3, 0x3, 0x8,
            0x1, 0x1, 0x4, 0x2,
        ];
        assert!(compile("tcp and (host 192.168.5.152 and port 80)").check(&packet_data));
        assert!(compile("tcp dst port 80").check(&packet_data));
        assert!(!compile("udp").check(&packet_data));
        assert!(!compile("src 192.168.5.152").check(&packet_data));
    }
}
