// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The in-memory model of one switch and its ports. Both types are
//! concurrency-safe value holders: getters take the read lock, setters the
//! write lock, and only the owning session mutates. Nothing here is held
//! across a socket write.

use crate::connection::SwitchConnection;
use crate::topology::Topology;
use of_common::net::MacAddr;
use of_common::{read_lock, write_lock};
use openflow::messages::{Message, PortDesc, SwitchDescription};
use openflow::Factory;
use slog::Logger;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock, Weak};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Features {
    pub dpid: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
}

#[derive(Default)]
struct DeviceInner {
    dpid: Option<u64>,
    descriptions: SwitchDescription,
    features: Features,
    ports: BTreeMap<u32, Arc<Port>>,
    flow_table_id: u8,
    factory: Option<Arc<dyn Factory>>,
}

pub struct Device {
    inner: RwLock<DeviceInner>,
    conn: Arc<dyn SwitchConnection>,
    topology: Weak<Topology>,
    xid: AtomicU32,
    log: Logger,
}

impl Device {
    pub(crate) fn new(
        conn: Arc<dyn SwitchConnection>,
        topology: &Arc<Topology>,
        log: Logger,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(DeviceInner::default()),
            conn,
            topology: Arc::downgrade(topology),
            xid: AtomicU32::new(1),
            log,
        })
    }

    /// The datapath id, once the handshake has produced one.
    pub fn dpid(&self) -> Option<u64> {
        read_lock!(self.inner).dpid
    }

    /// A device is valid once its handshake named it. Only valid devices
    /// appear in the topology.
    pub fn is_valid(&self) -> bool {
        read_lock!(self.inner).dpid.is_some()
    }

    pub(crate) fn set_dpid(&self, dpid: u64) {
        write_lock!(self.inner).dpid = Some(dpid);
    }

    /// Identity for log lines: the hex dpid, or the peer address while
    /// still unnamed.
    pub fn id(&self) -> String {
        match self.dpid() {
            Some(dpid) => format!("{dpid:#018x}"),
            None => format!("unnamed({})", self.conn.peer()),
        }
    }

    pub fn descriptions(&self) -> SwitchDescription {
        read_lock!(self.inner).descriptions.clone()
    }

    pub(crate) fn set_descriptions(&self, d: SwitchDescription) {
        write_lock!(self.inner).descriptions = d;
    }

    pub fn features(&self) -> Features {
        read_lock!(self.inner).features
    }

    pub(crate) fn set_features(&self, f: Features) {
        write_lock!(self.inner).features = f;
    }

    /// May return None when no port with this number exists.
    pub fn port(&self, number: u32) -> Option<Arc<Port>> {
        read_lock!(self.inner).ports.get(&number).cloned()
    }

    /// Snapshot of the port set, ascending by port number.
    pub fn ports(&self) -> Vec<Arc<Port>> {
        read_lock!(self.inner).ports.values().cloned().collect()
    }

    /// Install or refresh a port from a port descriptor. Returns the port
    /// and whether it already existed.
    pub(crate) fn update_port(
        self: &Arc<Self>,
        desc: PortDesc,
    ) -> (Arc<Port>, bool) {
        let mut inner = write_lock!(self.inner);
        match inner.ports.get(&desc.number) {
            Some(port) => {
                port.set_value(desc);
                (Arc::clone(port), true)
            }
            None => {
                let port = Arc::new(Port::new(self, desc.number));
                port.set_value(desc);
                inner.ports.insert(port.number(), Arc::clone(&port));
                (port, false)
            }
        }
    }

    pub(crate) fn remove_port(&self, number: u32) -> Option<Arc<Port>> {
        write_lock!(self.inner).ports.remove(&number)
    }

    /// The table the controller installs forwarding rules into.
    pub fn flow_table_id(&self) -> u8 {
        read_lock!(self.inner).flow_table_id
    }

    pub(crate) fn set_flow_table_id(&self, id: u8) {
        write_lock!(self.inner).flow_table_id = id;
    }

    pub fn factory(&self) -> Option<Arc<dyn Factory>> {
        read_lock!(self.inner).factory.clone()
    }

    pub(crate) fn set_factory(&self, f: Arc<dyn Factory>) {
        write_lock!(self.inner).factory = Some(f);
    }

    pub(crate) fn topology(&self) -> Option<Arc<Topology>> {
        self.topology.upgrade()
    }

    pub(crate) fn next_xid(&self) -> u32 {
        self.xid.fetch_add(1, Ordering::Relaxed)
    }

    /// The sole egress path: serialize through the negotiated factory and
    /// hand the frame to the connection. The device lock is dropped before
    /// the write.
    pub fn send_message(&self, msg: &Message) -> Result<(), crate::Error> {
        // A send before version negotiation is a controller bug, not a
        // runtime condition.
        let factory = self
            .factory()
            .expect("send_message before factory negotiation");
        let frame = factory.encode(self.next_xid(), msg)?;
        self.conn.send(&frame)
    }

    pub fn log(&self) -> &Logger {
        &self.log
    }
}

pub struct Port {
    device: Weak<Device>,
    number: u32,
    value: RwLock<PortDesc>,
    /// Immutable snapshot, replaced under the write lock, so readers on
    /// the packet-in path never contend.
    nodes: RwLock<Arc<Vec<MacAddr>>>,
}

impl Port {
    fn new(device: &Arc<Device>, number: u32) -> Self {
        Self {
            device: Arc::downgrade(device),
            number,
            value: RwLock::new(PortDesc {
                number,
                hw_addr: MacAddr::ZERO,
                name: String::new(),
                admin_down: false,
                link_down: false,
            }),
            nodes: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// The owning device. None only when the device was torn down while
    /// the caller still held the port.
    pub fn device(&self) -> Option<Arc<Device>> {
        self.device.upgrade()
    }

    pub fn dpid(&self) -> Option<u64> {
        self.device()?.dpid()
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Identity for log lines, `dpid:port`.
    pub fn id(&self) -> String {
        match self.device() {
            Some(d) => format!("{}:{}", d.id(), self.number),
            None => format!("?:{}", self.number),
        }
    }

    /// The last observed port descriptor.
    pub fn value(&self) -> PortDesc {
        read_lock!(self.value).clone()
    }

    pub(crate) fn set_value(&self, desc: PortDesc) {
        *write_lock!(self.value) = desc;
    }

    pub fn is_up(&self) -> bool {
        read_lock!(self.value).is_up()
    }

    /// Host MACs learned on this port.
    pub fn nodes(&self) -> Arc<Vec<MacAddr>> {
        read_lock!(self.nodes).clone()
    }

    /// Learn a source MAC on this port. Routed through the topology so a
    /// MAC seen on a different port moves instead of duplicating; learning
    /// the same MAC here again is a no-op.
    pub fn add_node(&self, mac: MacAddr) {
        let Some(device) = self.device() else {
            return;
        };
        let (Some(topology), Some(dpid)) = (device.topology(), device.dpid())
        else {
            return;
        };
        topology.learn_node(mac, dpid, self.number);
    }

    /// Forget a MAC learned on this port.
    pub fn remove_node(&self, mac: MacAddr) {
        let Some(device) = self.device() else {
            return;
        };
        let (Some(topology), Some(dpid)) = (device.topology(), device.dpid())
        else {
            return;
        };
        topology.forget_node_on(mac, dpid, self.number);
    }

    /// Port-local list update. Uniqueness across ports is the topology's
    /// job; this only maintains the snapshot.
    pub(crate) fn attach_node(&self, mac: MacAddr) {
        let mut nodes = write_lock!(self.nodes);
        if nodes.contains(&mac) {
            return;
        }
        let mut next = nodes.as_ref().clone();
        next.push(mac);
        *nodes = Arc::new(next);
    }

    pub(crate) fn detach_node(&self, mac: MacAddr) {
        let mut nodes = write_lock!(self.nodes);
        if !nodes.contains(&mac) {
            return;
        }
        let next: Vec<MacAddr> =
            nodes.iter().copied().filter(|m| *m != mac).collect();
        *nodes = Arc::new(next);
    }
}
