//! CIDR parsing with family and canonical-form checks.
//!
//! Checks that depend on a parsed network are skipped when parsing failed,
//! so an unparsable CIDR yields exactly one error.

use std::fmt;

use ipnet::IpNet;

use super::field::{ErrorList, FieldError, Path};

pub const IPV4_FAMILY: &str = "IPv4";
pub const IPV6_FAMILY: &str = "IPv6";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IpFamily {
    IPv4,
    IPv6,
}

impl IpFamily {
    /// Bits in an address of this family.
    pub fn address_bits(&self) -> u32 {
        match self {
            IpFamily::IPv4 => 32,
            IpFamily::IPv6 => 128,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IpFamily::IPv4 => IPV4_FAMILY,
            IpFamily::IPv6 => IPV6_FAMILY,
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first listed family is primary; an empty list means IPv4.
pub fn primary_ip_family(ip_families: &[String]) -> IpFamily {
    match ip_families.first().map(String::as_str) {
        Some(IPV6_FAMILY) => IpFamily::IPv6,
        _ => IpFamily::IPv4,
    }
}

pub fn is_ipv6_single_stack(ip_families: &[String]) -> bool {
    matches!(ip_families, [only] if only == IPV6_FAMILY)
}

pub fn is_ipv4_single_stack(ip_families: &[String]) -> bool {
    matches!(ip_families, [] | [_]) && primary_ip_family(ip_families) == IpFamily::IPv4
}

/// A CIDR string bound to the field it came from.
#[derive(Clone, Debug)]
pub struct Cidr {
    raw: String,
    path: Path,
    parsed: Result<IpNet, String>,
}

impl Cidr {
    pub fn new(raw: &str, path: Path) -> Self {
        let parsed = raw
            .parse::<IpNet>()
            .map_err(|_| format!("invalid CIDR address: {}", raw));
        Self {
            raw: raw.to_string(),
            path,
            parsed,
        }
    }

    pub fn net(&self) -> Option<&IpNet> {
        self.parsed.as_ref().ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn validate_parse(&self) -> ErrorList {
        match &self.parsed {
            Ok(_) => ErrorList::new(),
            Err(msg) => vec![FieldError::invalid(self.path.clone(), &self.raw, msg.clone())],
        }
    }

    pub fn validate_ip_family(&self, family: IpFamily) -> ErrorList {
        let Some(net) = self.net() else {
            return ErrorList::new();
        };
        let mismatch = match family {
            IpFamily::IPv4 => !matches!(net, IpNet::V4(_)),
            IpFamily::IPv6 => !matches!(net, IpNet::V6(_)),
        };
        if mismatch {
            return vec![FieldError::invalid(
                self.path.clone(),
                &self.raw,
                format!("must be a valid {} address", family),
            )];
        }
        ErrorList::new()
    }

    /// The written form must equal the network address form, e.g. `10.0.0.0/8` not `10.0.0.1/8`.
    pub fn validate_canonical(&self) -> ErrorList {
        let Some(net) = self.net() else {
            return ErrorList::new();
        };
        if net.trunc().to_string() != self.raw {
            return vec![FieldError::invalid(
                self.path.clone(),
                &self.raw,
                "must be valid canonical CIDR",
            )];
        }
        ErrorList::new()
    }
}
