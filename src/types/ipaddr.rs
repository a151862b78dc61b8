//! IP address extension values.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::net::{self, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::EvalError;

/// An IPv4 or IPv6 address with a prefix length.
///
/// Addresses parsed without an explicit prefix are single hosts (`/32` or
/// `/128`), so equality and range checks never need to special-case them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpAddr {
    addr: net::IpAddr,
    prefix: u8,
}

impl IpAddr {
    /// Build an address, returning `None` when the prefix exceeds the family width.
    pub fn new(addr: net::IpAddr, prefix: u8) -> Option<Self> {
        (prefix <= max_prefix(&addr)).then_some(Self { addr, prefix })
    }

    pub fn host(addr: net::IpAddr) -> Self {
        Self {
            addr,
            prefix: max_prefix(&addr),
        }
    }

    pub fn addr(&self) -> net::IpAddr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn is_ipv4(&self) -> bool {
        self.addr.is_ipv4()
    }

    pub fn is_ipv6(&self) -> bool {
        self.addr.is_ipv6()
    }

    /// Checks the address only; the prefix is ignored.
    pub fn is_loopback(&self) -> bool {
        self.addr.is_loopback()
    }

    /// True when the whole range lies in 224.0.0.0/4 or ff00::/8.
    pub fn is_multicast(&self) -> bool {
        let range = match self.addr {
            net::IpAddr::V4(_) => IpAddr {
                addr: Ipv4Addr::new(224, 0, 0, 0).into(),
                prefix: 4,
            },
            net::IpAddr::V6(_) => IpAddr {
                addr: Ipv6Addr::new(0xff00, 0, 0, 0, 0, 0, 0, 0).into(),
                prefix: 8,
            },
        };
        self.is_in_range(&range)
    }

    /// True when every address covered by `self` is also covered by `range`.
    /// Addresses of different families are never in range of each other.
    pub fn is_in_range(&self, range: &IpAddr) -> bool {
        if self.is_ipv4() != range.is_ipv4() || range.prefix > self.prefix {
            return false;
        }
        network_bits(self, range.prefix) == network_bits(range, range.prefix)
    }
}

fn max_prefix(addr: &net::IpAddr) -> u8 {
    match addr {
        net::IpAddr::V4(_) => 32,
        net::IpAddr::V6(_) => 128,
    }
}

/// The leading `prefix` bits of the address.
fn network_bits(ip: &IpAddr, prefix: u8) -> u128 {
    let (value, width) = match ip.addr {
        net::IpAddr::V4(v4) => (u128::from(u32::from(v4)), 32u8),
        net::IpAddr::V6(v6) => (u128::from(v6), 128u8),
    };
    if prefix == 0 {
        0
    } else {
        value >> (width - prefix)
    }
}

impl FromStr for IpAddr {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(':') && s.contains('.') {
            return Err(EvalError::IpParse(format!(
                "`{s}`: IPv4 embedded in IPv6 is not allowed"
            )));
        }

        let (addr_part, prefix_part) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let addr: net::IpAddr = addr_part
            .parse()
            .map_err(|e| EvalError::IpParse(format!("`{s}`: {e}")))?;

        let Some(prefix) = prefix_part else {
            return Ok(IpAddr::host(addr));
        };

        let well_formed = !prefix.is_empty()
            && prefix.len() <= 3
            && prefix.bytes().all(|b| b.is_ascii_digit())
            && (prefix == "0" || !prefix.starts_with('0'));
        if !well_formed {
            return Err(EvalError::IpParse(format!("`{s}`: invalid prefix `{prefix}`")));
        }

        prefix
            .parse::<u8>()
            .ok()
            .and_then(|prefix| IpAddr::new(addr, prefix))
            .ok_or_else(|| EvalError::IpParse(format!("`{s}`: prefix `{prefix}` is out of range")))
    }
}

impl Display for IpAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.prefix == max_prefix(&self.addr) {
            write!(f, "{}", self.addr)
        } else {
            write!(f, "{}/{}", self.addr, self.prefix)
        }
    }
}
