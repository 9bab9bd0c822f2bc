use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Correlation key shared by the capture side and the request side of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionIdentity {
    pub src_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl ConnectionIdentity {
    pub fn new(src_ip: IpAddr, src_port: u16, dst_port: u16) -> Self {
        Self { src_ip, src_port, dst_port }
    }
}

impl fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.src_ip {
            IpAddr::V4(ip) => write!(f, "{ip}:{}->{}", self.src_port, self.dst_port),
            IpAddr::V6(ip) => write!(f, "[{ip}]:{}->{}", self.src_port, self.dst_port),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IpVersion::V4 => "4",
            IpVersion::V6 => "6",
        })
    }
}

/// IP layer of a captured segment.
///
/// IPv4-only fields (identification, type of service) live on the `V4` variant; the
/// accessors below give a uniform view over both versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "ip_version")]
pub enum IpDetails {
    #[serde(rename = "4")]
    V4 {
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        ttl: u8,
        id: u16,
        tos: u8,
    },
    #[serde(rename = "6")]
    V6 {
        src_ip: Ipv6Addr,
        dst_ip: Ipv6Addr,
        hop_limit: u8,
        traffic_class: u8,
        flow_label: u32,
    },
}

impl IpDetails {
    pub fn version(&self) -> IpVersion {
        match self {
            IpDetails::V4 { .. } => IpVersion::V4,
            IpDetails::V6 { .. } => IpVersion::V6,
        }
    }

    pub fn src_ip(&self) -> IpAddr {
        match self {
            IpDetails::V4 { src_ip, .. } => IpAddr::V4(*src_ip),
            IpDetails::V6 { src_ip, .. } => IpAddr::V6(*src_ip),
        }
    }

    pub fn dst_ip(&self) -> IpAddr {
        match self {
            IpDetails::V4 { dst_ip, .. } => IpAddr::V4(*dst_ip),
            IpDetails::V6 { dst_ip, .. } => IpAddr::V6(*dst_ip),
        }
    }

    /// TTL for IPv4, hop limit for IPv6.
    pub fn ttl(&self) -> u8 {
        match self {
            IpDetails::V4 { ttl, .. } => *ttl,
            IpDetails::V6 { hop_limit, .. } => *hop_limit,
        }
    }

    pub fn id(&self) -> Option<u16> {
        match self {
            IpDetails::V4 { id, .. } => Some(*id),
            IpDetails::V6 { .. } => None,
        }
    }

    pub fn tos(&self) -> Option<u8> {
        match self {
            IpDetails::V4 { tos, .. } => Some(*tos),
            IpDetails::V6 { .. } => None,
        }
    }
}

/// A TCP option as it appeared on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TcpOption {
    Eol,
    Nop,
    Mss(u16),
    WindowScale(u8),
    SackPermitted,
    Sack,
    Timestamps { value: u32, echo: u32 },
    Unknown(u8),
}

impl TcpOption {
    /// Option kind number (RFC 9293 registry).
    pub fn kind(&self) -> u8 {
        match self {
            TcpOption::Eol => 0,
            TcpOption::Nop => 1,
            TcpOption::Mss(_) => 2,
            TcpOption::WindowScale(_) => 3,
            TcpOption::SackPermitted => 4,
            TcpOption::Sack => 5,
            TcpOption::Timestamps { .. } => 8,
            TcpOption::Unknown(kind) => *kind,
        }
    }
}

impl fmt::Display for TcpOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TcpOption::*;

        match self {
            Eol => f.write_str("eol"),
            Nop => f.write_str("nop"),
            Mss(mss) => write!(f, "mss={mss}"),
            WindowScale(shift) => write!(f, "ws={shift}"),
            SackPermitted => f.write_str("sok"),
            Sack => f.write_str("sack"),
            Timestamps { value, echo } => write!(f, "ts={value}/{echo}"),
            Unknown(kind) => write!(f, "?{kind}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TcpDetails {
    pub seq: u32,
    pub ack: u32,
    pub checksum: u16,
    pub window: u16,
    pub flags: u8,
    /// Options in observed order.
    pub options: Vec<TcpOption>,
    /// Comma-joined option kinds, e.g. `2,1,3,1,1,4`.
    pub options_order: String,
}

impl TcpDetails {
    pub fn new(
        seq: u32,
        ack: u32,
        checksum: u16,
        window: u16,
        flags: u8,
        options: Vec<TcpOption>,
    ) -> Self {
        let options_order = options
            .iter()
            .map(|o| o.kind().to_string())
            .collect::<Vec<String>>()
            .join(",");
        Self { seq, ack, checksum, window, flags, options, options_order }
    }
}

/// TCP/IP features of the segment that matched the capture filter for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TcpIpRecord {
    pub cap_length: usize,
    pub src_port: u16,
    pub dst_port: u16,
    pub ip: IpDetails,
    pub tcp: TcpDetails,
}

impl TcpIpRecord {
    pub fn identity(&self) -> ConnectionIdentity {
        ConnectionIdentity::new(self.ip.src_ip(), self.src_port, self.dst_port)
    }

    pub fn option_kinds(&self) -> Vec<u8> {
        self.tcp.options.iter().map(TcpOption::kind).collect()
    }

    pub fn option_kind_set(&self) -> BTreeSet<u8> {
        self.tcp.options.iter().map(TcpOption::kind).collect()
    }
}

impl fmt::Display for TcpIpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options = self
            .tcp
            .options
            .iter()
            .map(|o| o.to_string())
            .collect::<Vec<String>>()
            .join(",");
        write!(
            f,
            "{} ipv{} ttl={} win={} opts=[{}] len={}",
            self.identity(),
            self.ip.version(),
            self.ip.ttl(),
            self.tcp.window,
            options,
            self.cap_length
        )
    }
}
