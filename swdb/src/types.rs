// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use of_common::net::MacAddr;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 network in prefix notation. Serializes as `"a.b.c.d/len"`.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Net {
    pub value: Ipv4Addr,
    pub length: u8,
}

impl JsonSchema for Ipv4Net {
    fn schema_name() -> String {
        "Ipv4Net".to_string()
    }

    fn json_schema(
        gen: &mut schemars::gen::SchemaGenerator,
    ) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

impl Ipv4Net {
    pub fn new(value: Ipv4Addr, length: u8) -> Self {
        Self { value, length }
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        if self.length == 0 {
            return true;
        }
        let mask = !0u32 << (32 - u32::from(self.length.min(32)));
        (u32::from(self.value) & mask) == (u32::from(ip) & mask)
    }
}

impl Display for Ipv4Net {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.length)
    }
}

impl FromStr for Ipv4Net {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| format!("expected addr/len, got {s:?}"))?;
        let value: Ipv4Addr =
            addr.parse().map_err(|e| format!("{s:?}: {e}"))?;
        let length: u8 = len.parse().map_err(|e| format!("{s:?}: {e}"))?;
        if length > 32 {
            return Err(format!("{s:?}: prefix length out of range"));
        }
        Ok(Self { value, length })
    }
}

impl TryFrom<String> for Ipv4Net {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv4Net> for String {
    fn from(n: Ipv4Net) -> String {
        n.to_string()
    }
}

/// Parameters for registering a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SwitchInfo {
    pub dpid: u64,
    pub n_ports: u16,
    pub first_port: u16,
    #[serde(default)]
    pub description: String,
}

/// A registered switch with its database-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SwitchRecord {
    pub id: u64,
    pub dpid: u64,
    pub n_ports: u16,
    pub first_port: u16,
    pub description: String,
}

/// An IP lease bound to a switch port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HostRecord {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub dpid: u64,
    pub port: u32,
    #[serde(default)]
    pub description: String,
    pub registered: chrono::DateTime<chrono::Utc>,
}

/// An upstream router the fabric can hand outgoing traffic to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GatewayRecord {
    pub mac: MacAddr,
    #[serde(default)]
    pub description: String,
}

/// A virtual IP fronted by an active/standby host pair. The addresses
/// reference host records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VipRecord {
    pub ip: Ipv4Addr,
    pub active: Ipv4Addr,
    pub standby: Ipv4Addr,
}

/// Firewall allowlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AclRecord {
    pub network: Ipv4Net,
}

/// An haproxy instance registered for L7 load balancing, running on a
/// host record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HaproxyRecord {
    pub host: Ipv4Addr,
    pub backend_name: String,
    pub frontend_port: u16,
}

/// A backend server behind a registered haproxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BackendRecord {
    pub haproxy: Ipv4Addr,
    pub server: Ipv4Addr,
    pub port: u16,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ipv4_net_parse_and_contains() {
        let net: Ipv4Net = "192.168.1.0/24".parse().unwrap();
        assert!(net.contains(Ipv4Addr::new(192, 168, 1, 5)));
        assert!(!net.contains(Ipv4Addr::new(192, 168, 2, 5)));
        assert_eq!(net.to_string(), "192.168.1.0/24");

        assert!("192.168.1.0".parse::<Ipv4Net>().is_err());
        assert!("192.168.1.0/33".parse::<Ipv4Net>().is_err());

        let all: Ipv4Net = "0.0.0.0/0".parse().unwrap();
        assert!(all.contains(Ipv4Addr::new(8, 8, 8, 8)));
    }
}
