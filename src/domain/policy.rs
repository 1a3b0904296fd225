//! Access policy domain types
//!
//! An [`AccessPolicy`] is the declarative allow-list a deployment is
//! configured with. It is compiled into network ingress rules (direct
//! topology) or web firewall rules (CDN-fronted topology).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::network::{Cidr, IpVersion};
use crate::errors::{EdgeplaneError, Result};

static COUNTRY_CODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("static regex"));

/// ISO 3166-1 alpha-2 country code, e.g. `US` or `JP`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CountryCode {
    type Err = EdgeplaneError;

    fn from_str(s: &str) -> Result<Self> {
        if !COUNTRY_CODE_REGEX.is_match(s) {
            return Err(EdgeplaneError::validation_field(
                format!("'{}' is not a two-letter upper-case ISO country code", s),
                "allowed_country_codes",
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for CountryCode {
    type Error = EdgeplaneError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declarative allow-list.
///
/// Every field is independently optional; an empty set and an absent field
/// mean the same thing. Sets are ordered so that compiled output is
/// deterministic regardless of configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(default)]
    pub allowed_ipv4: BTreeSet<Cidr>,

    #[serde(default)]
    pub allowed_ipv6: BTreeSet<Cidr>,

    #[serde(default)]
    pub allowed_country_codes: BTreeSet<CountryCode>,
}

impl AccessPolicy {
    /// Build a policy from raw configuration strings, checking address
    /// families and country code syntax.
    pub fn from_lists(
        ipv4: Option<&[String]>,
        ipv6: Option<&[String]>,
        countries: Option<&[String]>,
    ) -> Result<Self> {
        let allowed_ipv4 = ipv4
            .unwrap_or_default()
            .iter()
            .map(|s| {
                Cidr::parse_as(s, IpVersion::Ipv4).map_err(|e| with_field(e, "allowed_ipv4_cidrs"))
            })
            .collect::<Result<BTreeSet<_>>>()?;

        let allowed_ipv6 = ipv6
            .unwrap_or_default()
            .iter()
            .map(|s| {
                Cidr::parse_as(s, IpVersion::Ipv6).map_err(|e| with_field(e, "allowed_ipv6_cidrs"))
            })
            .collect::<Result<BTreeSet<_>>>()?;

        let allowed_country_codes = countries
            .unwrap_or_default()
            .iter()
            .map(|s| s.parse::<CountryCode>())
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(Self { allowed_ipv4, allowed_ipv6, allowed_country_codes })
    }

    pub fn with_ipv4(mut self, cidr: &str) -> Result<Self> {
        self.allowed_ipv4.insert(Cidr::parse_as(cidr, IpVersion::Ipv4)?);
        Ok(self)
    }

    pub fn with_ipv6(mut self, cidr: &str) -> Result<Self> {
        self.allowed_ipv6.insert(Cidr::parse_as(cidr, IpVersion::Ipv6)?);
        Ok(self)
    }

    pub fn with_country(mut self, code: &str) -> Result<Self> {
        self.allowed_country_codes.insert(code.parse()?);
        Ok(self)
    }

    pub fn has_ipv4(&self) -> bool {
        !self.allowed_ipv4.is_empty()
    }

    pub fn has_ipv6(&self) -> bool {
        !self.allowed_ipv6.is_empty()
    }

    pub fn has_countries(&self) -> bool {
        !self.allowed_country_codes.is_empty()
    }

    /// True when no field restricts anything.
    pub fn is_empty(&self) -> bool {
        !self.has_ipv4() && !self.has_ipv6() && !self.has_countries()
    }

    /// Ranges admitted at the network layer of a direct load balancer.
    ///
    /// With both lists empty every address of both families is admitted.
    /// Otherwise only the configured ranges are, and a family with no list
    /// of its own admits nothing.
    pub fn network_ingress_ranges(&self) -> Vec<Cidr> {
        if !self.has_ipv4() && !self.has_ipv6() {
            return vec![Cidr::any_ipv4(), Cidr::any_ipv6()];
        }
        self.allowed_ipv4.iter().chain(self.allowed_ipv6.iter()).copied().collect()
    }
}

fn with_field(error: EdgeplaneError, field: &str) -> EdgeplaneError {
    match error {
        EdgeplaneError::Validation { message, .. } => {
            EdgeplaneError::validation_field(message, field)
        }
        other => other,
    }
}
