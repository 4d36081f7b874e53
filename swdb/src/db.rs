// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::Error;
use crate::types::*;
use of_common::net::MacAddr;
use slog::{error, Logger};
use std::net::Ipv4Addr;

/// The handle used to open the persistent tree of registered switches,
/// keyed by assigned id.
const SWITCH: &str = "switch";

/// Secondary index from datapath id to assigned switch id.
const SWITCH_DPID: &str = "switch_dpid";

/// Layer-3 networks the fabric routes for.
const NETWORK: &str = "network";

/// Host records, keyed by IP.
const HOST: &str = "host";

/// Gateway records, keyed by MAC.
const GATEWAY: &str = "gateway";

/// VIP records, keyed by IP.
const VIP: &str = "vip";

/// Addresses the router answers for directly.
const ROUTER_IP: &str = "router_ip";

/// Firewall allowlist.
const ACL: &str = "acl";

/// L7 load balancer registrations, keyed by host IP.
const HAPROXY: &str = "haproxy";

/// Backend servers, keyed by (haproxy IP, server IP).
const BACKEND: &str = "backend";

/// Handle to the switch administrative database. Cheap to clone; every
/// clone shares the same underlying store.
#[derive(Clone)]
pub struct Db {
    persistent: sled::Db,
    log: Logger,
}

impl Db {
    pub fn new(path: &str, log: Logger) -> Result<Self, Error> {
        Ok(Self {
            persistent: sled::open(path)?,
            log,
        })
    }

    fn tree(&self, name: &str) -> Result<sled::Tree, Error> {
        Ok(self.persistent.open_tree(name)?)
    }

    /// Register a switch, assigning it a fresh id. Fails when the datapath
    /// id is already registered.
    pub fn add_switch(&self, info: SwitchInfo) -> Result<SwitchRecord, Error> {
        let dpid_idx = self.tree(SWITCH_DPID)?;
        if dpid_idx.contains_key(info.dpid.to_be_bytes())? {
            return Err(Error::DuplicateDpid(info.dpid));
        }
        let id = self.persistent.generate_id()?;
        let record = SwitchRecord {
            id,
            dpid: info.dpid,
            n_ports: info.n_ports,
            first_port: info.first_port,
            description: info.description,
        };
        self.tree(SWITCH)?
            .insert(id.to_be_bytes(), serde_json::to_vec(&record)?)?;
        dpid_idx
            .insert(info.dpid.to_be_bytes(), id.to_be_bytes().to_vec())?;
        Ok(record)
    }

    /// Deregister a switch by assigned id, returning the removed record if
    /// it existed.
    pub fn remove_switch(
        &self,
        id: u64,
    ) -> Result<Option<SwitchRecord>, Error> {
        let Some(value) = self.tree(SWITCH)?.remove(id.to_be_bytes())? else {
            return Ok(None);
        };
        let record: SwitchRecord = serde_json::from_slice(&value)?;
        self.tree(SWITCH_DPID)?.remove(record.dpid.to_be_bytes())?;
        Ok(Some(record))
    }

    /// Look up a registered switch by datapath id.
    pub fn switch(&self, dpid: u64) -> Result<Option<SwitchRecord>, Error> {
        let Some(id) = self.tree(SWITCH_DPID)?.get(dpid.to_be_bytes())?
        else {
            return Ok(None);
        };
        let Some(value) = self.tree(SWITCH)?.get(&id)? else {
            // Index said yes but the record is gone; self-heal the index.
            error!(self.log, "dangling switch index for dpid {dpid:#x}");
            self.tree(SWITCH_DPID)?.remove(dpid.to_be_bytes())?;
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&value)?))
    }

    pub fn switches(&self) -> Result<Vec<SwitchRecord>, Error> {
        let mut result = Vec::new();
        for item in self.tree(SWITCH)?.iter() {
            let (_, value) = item?;
            result.push(serde_json::from_slice(&value)?);
        }
        Ok(result)
    }

    pub fn add_network(&self, net: Ipv4Net) -> Result<(), Error> {
        self.tree(NETWORK)?
            .insert(net.to_string().as_bytes(), serde_json::to_vec(&net)?)?;
        Ok(())
    }

    pub fn networks(&self) -> Result<Vec<Ipv4Net>, Error> {
        let mut result = Vec::new();
        for item in self.tree(NETWORK)?.iter() {
            let (_, value) = item?;
            result.push(serde_json::from_slice(&value)?);
        }
        Ok(result)
    }

    pub fn add_host(&self, host: HostRecord) -> Result<(), Error> {
        self.tree(HOST)?
            .insert(host.ip.octets(), serde_json::to_vec(&host)?)?;
        Ok(())
    }

    pub fn remove_host(&self, ip: Ipv4Addr) -> Result<bool, Error> {
        Ok(self.tree(HOST)?.remove(ip.octets())?.is_some())
    }

    fn host(&self, ip: Ipv4Addr) -> Result<Option<HostRecord>, Error> {
        match self.tree(HOST)?.get(ip.octets())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Resolve an IP to the MAC traffic for it should be addressed to. A
    /// VIP resolves through its active host.
    pub fn find_mac(&self, ip: Ipv4Addr) -> Result<Option<MacAddr>, Error> {
        if let Some(host) = self.host(ip)? {
            return Ok(Some(host.mac));
        }
        if let Some(value) = self.tree(VIP)?.get(ip.octets())? {
            let vip: VipRecord = serde_json::from_slice(&value)?;
            return Ok(self.host(vip.active)?.map(|h| h.mac));
        }
        Ok(None)
    }

    /// Where a host was registered: `(dpid, port)`.
    pub fn location(
        &self,
        mac: MacAddr,
    ) -> Result<Option<(u64, u32)>, Error> {
        for item in self.tree(HOST)?.iter() {
            let (_, value) = item?;
            let host: HostRecord = serde_json::from_slice(&value)?;
            if host.mac == mac {
                return Ok(Some((host.dpid, host.port)));
            }
        }
        Ok(None)
    }

    pub fn add_gateway(&self, gw: GatewayRecord) -> Result<(), Error> {
        self.tree(GATEWAY)?
            .insert(gw.mac.octets(), serde_json::to_vec(&gw)?)?;
        Ok(())
    }

    /// All gateway MACs, ascending. The stable order matters to callers
    /// that select among them with a seeded RNG.
    pub fn gateways(&self) -> Result<Vec<MacAddr>, Error> {
        let mut result = Vec::new();
        for item in self.tree(GATEWAY)?.iter() {
            let (_, value) = item?;
            let gw: GatewayRecord = serde_json::from_slice(&value)?;
            result.push(gw.mac);
        }
        result.sort();
        Ok(result)
    }

    pub fn is_gateway(&self, mac: MacAddr) -> Result<bool, Error> {
        Ok(self.tree(GATEWAY)?.contains_key(mac.octets())?)
    }

    pub fn add_vip(&self, vip: VipRecord) -> Result<(), Error> {
        self.tree(VIP)?
            .insert(vip.ip.octets(), serde_json::to_vec(&vip)?)?;
        Ok(())
    }

    pub fn add_router_ip(&self, ip: Ipv4Addr) -> Result<(), Error> {
        self.tree(ROUTER_IP)?.insert(ip.octets(), Vec::<u8>::new())?;
        Ok(())
    }

    /// Whether `ip` is an address the router itself answers for, either an
    /// explicitly registered router address or a VIP.
    pub fn is_router(&self, ip: Ipv4Addr) -> Result<bool, Error> {
        Ok(self.tree(ROUTER_IP)?.contains_key(ip.octets())?
            || self.tree(VIP)?.contains_key(ip.octets())?)
    }

    pub fn add_acl(&self, acl: AclRecord) -> Result<(), Error> {
        self.tree(ACL)?.insert(
            acl.network.to_string().as_bytes(),
            serde_json::to_vec(&acl)?,
        )?;
        Ok(())
    }

    pub fn acls(&self) -> Result<Vec<AclRecord>, Error> {
        let mut result = Vec::new();
        for item in self.tree(ACL)?.iter() {
            let (_, value) = item?;
            result.push(serde_json::from_slice(&value)?);
        }
        Ok(result)
    }

    pub fn add_haproxy(&self, hap: HaproxyRecord) -> Result<(), Error> {
        self.tree(HAPROXY)?
            .insert(hap.host.octets(), serde_json::to_vec(&hap)?)?;
        Ok(())
    }

    pub fn haproxies(&self) -> Result<Vec<HaproxyRecord>, Error> {
        let mut result = Vec::new();
        for item in self.tree(HAPROXY)?.iter() {
            let (_, value) = item?;
            result.push(serde_json::from_slice(&value)?);
        }
        Ok(result)
    }

    pub fn add_backend(&self, be: BackendRecord) -> Result<(), Error> {
        let mut key = be.haproxy.octets().to_vec();
        key.extend_from_slice(&be.server.octets());
        self.tree(BACKEND)?.insert(key, serde_json::to_vec(&be)?)?;
        Ok(())
    }

    /// Backends registered behind one haproxy instance.
    pub fn backends(
        &self,
        haproxy: Ipv4Addr,
    ) -> Result<Vec<BackendRecord>, Error> {
        let mut result = Vec::new();
        for item in self.tree(BACKEND)?.scan_prefix(haproxy.octets()) {
            let (_, value) = item?;
            result.push(serde_json::from_slice(&value)?);
        }
        Ok(result)
    }
}
