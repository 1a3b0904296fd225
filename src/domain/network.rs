//! Network range types
//!
//! Allow-list entries are written as CIDR strings in configuration. A bare
//! address is accepted too and treated as a single-host range.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::errors::{EdgeplaneError, Result};

/// Address family of a network range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IpVersion {
    Ipv4,
    Ipv6,
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::Ipv4 => write!(f, "IPV4"),
            IpVersion::Ipv6 => write!(f, "IPV6"),
        }
    }
}

/// A parsed network range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr(IpNet);

impl Cidr {
    /// Range covering every IPv4 address
    pub fn any_ipv4() -> Self {
        Self(IpNet::V4(Ipv4Net::default()))
    }

    /// Range covering every IPv6 address
    pub fn any_ipv6() -> Self {
        Self(IpNet::V6(Ipv6Net::default()))
    }

    pub fn version(&self) -> IpVersion {
        match self.0 {
            IpNet::V4(_) => IpVersion::Ipv4,
            IpNet::V6(_) => IpVersion::Ipv6,
        }
    }

    #[inline]
    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.0.contains(addr)
    }

    /// Parse a range and require it to be of the given family.
    pub fn parse_as(s: &str, version: IpVersion) -> Result<Self> {
        let cidr: Cidr = s.parse()?;
        if cidr.version() != version {
            return Err(EdgeplaneError::validation(format!(
                "'{}' is an {} range where an {} range was expected",
                s,
                cidr.version(),
                version
            )));
        }
        Ok(cidr)
    }
}

impl FromStr for Cidr {
    type Err = EdgeplaneError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(net) = s.parse::<IpNet>() {
            return Ok(Self(net));
        }

        if let Ok(addr) = s.parse::<IpAddr>() {
            return Ok(Self(IpNet::from(addr)));
        }

        Err(EdgeplaneError::validation(format!("not a valid CIDR or IP address: {}", s)))
    }
}

impl TryFrom<String> for Cidr {
    type Error = EdgeplaneError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Cidr> for String {
    fn from(cidr: Cidr) -> Self {
        cidr.to_string()
    }
}

impl From<IpNet> for Cidr {
    fn from(net: IpNet) -> Self {
        Self(net)
    }
}

impl From<Ipv4Net> for Cidr {
    fn from(net: Ipv4Net) -> Self {
        Self(net.into())
    }
}

impl From<Ipv6Net> for Cidr {
    fn from(net: Ipv6Net) -> Self {
        Self(net.into())
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
