// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The concurrent fabric graph: devices as vertices, discovered
//! inter-switch links as edges, plus the host-location index. Link
//! discovery feeds in LLDP probe observations; a spanning-tree pass marks
//! redundant links blocked so path queries never produce a forwarding
//! loop.

use crate::device::{Device, Port};
use crate::finder::{EventListener, Finder};
use crate::{dbg, inf, wrn};
use of_common::net::MacAddr;
use of_common::{read_lock, write_lock};
use packet::LldpProbe;
use slog::Logger;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// A link expires when no probe has refreshed it for this long.
pub const LINK_TTL: Duration = Duration::from_secs(30);

const UNIT: &str = "topology";

/// One side of an inter-switch link.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinkEnd {
    pub dpid: u64,
    pub port: u32,
}

/// An undirected link, normalized so the lesser end comes first. The
/// ordering doubles as the deterministic tie-break for spanning-tree
/// construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinkKey {
    a: LinkEnd,
    b: LinkEnd,
}

impl LinkKey {
    fn new(x: LinkEnd, y: LinkEnd) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    pub fn ends(&self) -> (LinkEnd, LinkEnd) {
        (self.a, self.b)
    }

    fn touches_device(&self, dpid: u64) -> bool {
        self.a.dpid == dpid || self.b.dpid == dpid
    }

    fn touches_port(&self, dpid: u64, port: u32) -> bool {
        (self.a.dpid == dpid && self.a.port == port)
            || (self.b.dpid == dpid && self.b.port == port)
    }

    /// The end sitting on `dpid`, and the far end.
    fn oriented(&self, dpid: u64) -> (LinkEnd, LinkEnd) {
        if self.a.dpid == dpid {
            (self.a, self.b)
        } else {
            (self.b, self.a)
        }
    }
}

/// A host location: a MAC and the switch port it was last seen on. At most
/// one node exists per MAC across the whole fabric.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Node {
    pub mac: MacAddr,
    pub dpid: u64,
    pub port: u32,
}

impl Node {
    pub fn resolve(&self, finder: &dyn Finder) -> Option<Arc<Port>> {
        finder.device(self.dpid)?.port(self.port)
    }
}

/// One step of a computed path: the port to transmit on and the peer port
/// the frame arrives at.
#[derive(Clone)]
pub struct PathHop {
    pub egress: Arc<Port>,
    pub ingress: Arc<Port>,
}

pub struct Topology {
    devices: RwLock<BTreeMap<u64, Arc<Device>>>,
    nodes: RwLock<BTreeMap<MacAddr, Node>>,
    links: RwLock<BTreeMap<LinkKey, Instant>>,
    blocked: RwLock<BTreeSet<LinkKey>>,
    generation: AtomicU64,
    listener: RwLock<Option<Arc<dyn EventListener>>>,
    log: Logger,
}

impl Topology {
    pub fn new(log: Logger) -> Arc<Self> {
        Arc::new(Self {
            devices: RwLock::new(BTreeMap::new()),
            nodes: RwLock::new(BTreeMap::new()),
            links: RwLock::new(BTreeMap::new()),
            blocked: RwLock::new(BTreeSet::new()),
            generation: AtomicU64::new(0),
            listener: RwLock::new(None),
            log,
        })
    }

    pub fn set_event_listener(&self, listener: Arc<dyn EventListener>) {
        *write_lock!(self.listener) = Some(listener);
    }

    /// The change generation counter. Bumped by every structural change.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    fn changed(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
        let listener = read_lock!(self.listener).clone();
        if let Some(listener) = listener {
            listener.on_topology_change(self);
        }
    }

    /// Insert a device that completed its handshake. Replaces a stale
    /// entry left by a dead session for the same datapath id.
    pub(crate) fn add_device(&self, dpid: u64, device: Arc<Device>) {
        let previous = write_lock!(self.devices).insert(dpid, device);
        if previous.is_some() {
            wrn!(self.log, UNIT, "replaced stale device {dpid:#x}");
        }
        inf!(self.log, UNIT, "device {dpid:#x} joined");
        self.changed();
    }

    /// Remove a device and everything hanging off it: its learned nodes
    /// and every link it terminates. Idempotent.
    pub(crate) fn remove_device(&self, dpid: u64) {
        if write_lock!(self.devices).remove(&dpid).is_none() {
            return;
        }
        write_lock!(self.nodes).retain(|_, n| n.dpid != dpid);
        write_lock!(self.links).retain(|k, _| !k.touches_device(dpid));
        self.recompute_spanning_tree();
        inf!(self.log, UNIT, "device {dpid:#x} left");
        self.changed();
    }

    /// Drop state tied to a deleted port: nodes learned there and the
    /// link behind it, if any.
    pub(crate) fn remove_port(&self, dpid: u64, port: u32) {
        let macs: Vec<MacAddr> = {
            let mut nodes = write_lock!(self.nodes);
            let macs = nodes
                .values()
                .filter(|n| n.dpid == dpid && n.port == port)
                .map(|n| n.mac)
                .collect::<Vec<_>>();
            nodes.retain(|_, n| !(n.dpid == dpid && n.port == port));
            macs
        };
        let links_removed = {
            let mut links = write_lock!(self.links);
            let before = links.len();
            links.retain(|k, _| !k.touches_port(dpid, port));
            before != links.len()
        };
        if macs.is_empty() && !links_removed {
            return;
        }
        if let Some(p) = self.resolve_port(dpid, port) {
            for mac in macs {
                p.detach_node(mac);
            }
        }
        if links_removed {
            self.recompute_spanning_tree();
        }
        self.changed();
    }

    fn resolve_port(&self, dpid: u64, port: u32) -> Option<Arc<Port>> {
        read_lock!(self.devices).get(&dpid)?.port(port)
    }

    /// Learn (or re-learn) a host MAC on a switch port. A MAC observed on
    /// a new port moves: the old association is removed first, and exactly
    /// one change event fires. Returns whether anything changed.
    pub fn learn_node(&self, mac: MacAddr, dpid: u64, port: u32) -> bool {
        let previous = {
            let mut nodes = write_lock!(self.nodes);
            let previous = match nodes.get(&mac) {
                Some(n) if n.dpid == dpid && n.port == port => return false,
                other => other.copied(),
            };
            nodes.insert(mac, Node { mac, dpid, port });
            previous
        };
        if let Some(old) = previous {
            if let Some(p) = self.resolve_port(old.dpid, old.port) {
                p.detach_node(mac);
            }
            dbg!(
                self.log,
                UNIT,
                "node {mac} moved {}:{} -> {dpid}:{port}",
                old.dpid,
                old.port
            );
        }
        if let Some(p) = self.resolve_port(dpid, port) {
            p.attach_node(mac);
        }
        self.changed();
        true
    }

    /// Forget a node, but only if it is still learned at this location.
    pub fn forget_node_on(&self, mac: MacAddr, dpid: u64, port: u32) {
        {
            let mut nodes = write_lock!(self.nodes);
            match nodes.get(&mac) {
                Some(n) if n.dpid == dpid && n.port == port => {
                    nodes.remove(&mac);
                }
                _ => return,
            }
        }
        if let Some(p) = self.resolve_port(dpid, port) {
            p.detach_node(mac);
        }
        self.changed();
    }

    /// Feed one observed LLDP probe: the probe names the emitting
    /// (chassis, port), the arguments name where it was received. Both
    /// devices must be connected for the link to register.
    pub(crate) fn process_lldp(
        &self,
        dpid: u64,
        port: u32,
        probe: &LldpProbe,
    ) {
        let local = LinkEnd { dpid, port };
        let peer = LinkEnd {
            dpid: probe.chassis_id,
            port: probe.port_id,
        };
        if local == peer {
            return;
        }
        {
            let devices = read_lock!(self.devices);
            if !devices.contains_key(&local.dpid)
                || !devices.contains_key(&peer.dpid)
            {
                dbg!(
                    self.log,
                    UNIT,
                    "probe between unknown devices {local:?} {peer:?}"
                );
                return;
            }
        }
        let key = LinkKey::new(local, peer);
        let is_new =
            write_lock!(self.links).insert(key, Instant::now()).is_none();
        if is_new {
            inf!(
                self.log,
                UNIT,
                "link {}:{} <-> {}:{}",
                key.a.dpid,
                key.a.port,
                key.b.dpid,
                key.b.port
            );
            self.recompute_spanning_tree();
            self.changed();
        }
    }

    /// Expire links not refreshed within `ttl`. Returns how many were
    /// dropped.
    pub fn expire_links(&self, ttl: Duration) -> usize {
        let expired = {
            let mut links = write_lock!(self.links);
            let before = links.len();
            links.retain(|_, seen| seen.elapsed() < ttl);
            before - links.len()
        };
        if expired > 0 {
            inf!(self.log, UNIT, "{expired} links expired");
            self.recompute_spanning_tree();
            self.changed();
        }
        expired
    }

    /// Recompute which links forwarding may use. Kruskal over the link
    /// set, edge weight = BFS hop count of the nearer endpoint from the
    /// highest-degree device (ties by ascending link key). Links outside
    /// the tree stay discovered but are marked blocked.
    fn recompute_spanning_tree(&self) {
        let links: Vec<LinkKey> =
            read_lock!(self.links).keys().copied().collect();
        let mut blocked = BTreeSet::new();
        if !links.is_empty() {
            let mut degree: BTreeMap<u64, usize> = BTreeMap::new();
            let mut adjacency: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();
            for k in &links {
                *degree.entry(k.a.dpid).or_default() += 1;
                *degree.entry(k.b.dpid).or_default() += 1;
                adjacency.entry(k.a.dpid).or_default().insert(k.b.dpid);
                adjacency.entry(k.b.dpid).or_default().insert(k.a.dpid);
            }
            // Highest degree wins, lowest dpid on ties. BTreeMap iteration
            // order makes this stable.
            let root = degree
                .iter()
                .max_by(|(da, ca), (db, cb)| {
                    ca.cmp(cb).then(db.cmp(da))
                })
                .map(|(dpid, _)| *dpid)
                .unwrap();
            let hops = bfs_hops(&adjacency, root);
            let far = u64::MAX;
            let mut edges = links.clone();
            edges.sort_by_key(|k| {
                let ha = hops.get(&k.a.dpid).copied().unwrap_or(far);
                let hb = hops.get(&k.b.dpid).copied().unwrap_or(far);
                (ha.min(hb), *k)
            });
            let mut dsu = Dsu::new();
            for k in edges {
                if !dsu.union(k.a.dpid, k.b.dpid) {
                    blocked.insert(k);
                }
            }
        }
        *write_lock!(self.blocked) = blocked;
    }

    /// Adjacency over unblocked links: dpid -> peer dpid -> link. Parallel
    /// links collapse to the least link key.
    fn forwarding_adjacency(&self) -> BTreeMap<u64, BTreeMap<u64, LinkKey>> {
        let blocked = read_lock!(self.blocked).clone();
        let links = read_lock!(self.links);
        let mut adjacency: BTreeMap<u64, BTreeMap<u64, LinkKey>> =
            BTreeMap::new();
        for k in links.keys().filter(|k| !blocked.contains(k)) {
            adjacency
                .entry(k.a.dpid)
                .or_default()
                .entry(k.b.dpid)
                .or_insert(*k);
            adjacency
                .entry(k.b.dpid)
                .or_default()
                .entry(k.a.dpid)
                .or_insert(*k);
        }
        adjacency
    }
}

fn bfs_hops(
    adjacency: &BTreeMap<u64, BTreeSet<u64>>,
    root: u64,
) -> BTreeMap<u64, u64> {
    let mut hops = BTreeMap::new();
    hops.insert(root, 0);
    let mut queue = VecDeque::from([root]);
    while let Some(u) = queue.pop_front() {
        let d = hops[&u];
        if let Some(nbrs) = adjacency.get(&u) {
            for v in nbrs {
                hops.entry(*v).or_insert_with(|| {
                    queue.push_back(*v);
                    d + 1
                });
            }
        }
    }
    hops
}

/// Union-find over datapath ids.
struct Dsu {
    parent: BTreeMap<u64, u64>,
}

impl Dsu {
    fn new() -> Self {
        Self {
            parent: BTreeMap::new(),
        }
    }

    fn find(&mut self, x: u64) -> u64 {
        let p = *self.parent.entry(x).or_insert(x);
        if p == x {
            return x;
        }
        let root = self.find(p);
        self.parent.insert(x, root);
        root
    }

    /// Returns false when both were already connected.
    fn union(&mut self, a: u64, b: u64) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        self.parent.insert(ra.max(rb), ra.min(rb));
        true
    }
}

impl Finder for Topology {
    fn device(&self, dpid: u64) -> Option<Arc<Device>> {
        read_lock!(self.devices)
            .get(&dpid)
            .filter(|d| d.is_valid())
            .cloned()
    }

    fn devices(&self) -> Vec<Arc<Device>> {
        read_lock!(self.devices)
            .values()
            .filter(|d| d.is_valid())
            .cloned()
            .collect()
    }

    fn node(&self, mac: MacAddr) -> Option<Node> {
        read_lock!(self.nodes).get(&mac).copied()
    }

    fn path(&self, src: u64, dst: u64) -> Vec<PathHop> {
        if src == dst {
            return Vec::new();
        }
        let adjacency = self.forwarding_adjacency();

        // BFS with neighbors visited in ascending dpid order, so equal
        // length paths resolve the same way every time.
        let mut prev: BTreeMap<u64, (u64, LinkKey)> = BTreeMap::new();
        let mut seen = BTreeSet::from([src]);
        let mut queue = VecDeque::from([src]);
        'outer: while let Some(u) = queue.pop_front() {
            let Some(nbrs) = adjacency.get(&u) else {
                continue;
            };
            for (v, key) in nbrs {
                if !seen.insert(*v) {
                    continue;
                }
                prev.insert(*v, (u, *key));
                if *v == dst {
                    break 'outer;
                }
                queue.push_back(*v);
            }
        }
        if !prev.contains_key(&dst) {
            return Vec::new();
        }

        let mut spine = Vec::new();
        let mut cur = dst;
        while cur != src {
            let (p, key) = prev[&cur];
            spine.push((p, key));
            cur = p;
        }
        spine.reverse();

        let devices = read_lock!(self.devices);
        let mut hops = Vec::with_capacity(spine.len());
        for (u, key) in spine {
            let (near, farther) = key.oriented(u);
            let resolved = devices
                .get(&near.dpid)
                .and_then(|d| d.port(near.port))
                .zip(
                    devices
                        .get(&farther.dpid)
                        .and_then(|d| d.port(farther.port)),
                );
            match resolved {
                Some((egress, ingress)) => {
                    hops.push(PathHop { egress, ingress })
                }
                // A device raced out from under us; callers treat an empty
                // path as unreachable-for-now.
                None => return Vec::new(),
            }
        }
        hops
    }

    fn is_inter_switch(&self, dpid: u64, port: u32) -> bool {
        read_lock!(self.links)
            .keys()
            .any(|k| k.touches_port(dpid, port))
    }

    fn is_blocked(&self, dpid: u64, port: u32) -> bool {
        read_lock!(self.blocked)
            .iter()
            .any(|k| k.touches_port(dpid, port))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::connection::test::switch_conn_pair;
    use openflow::messages::PortDesc;
    use openflow::{factory_for, OFP13_VERSION};
    use std::sync::Mutex;

    pub struct CountingListener {
        pub changes: Mutex<u64>,
    }

    impl CountingListener {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                changes: Mutex::new(0),
            })
        }
    }

    impl EventListener for CountingListener {
        fn on_device_up(&self, _: &dyn Finder, _: &Arc<Device>) {}
        fn on_device_down(&self, _: &dyn Finder, _: &Arc<Device>) {}
        fn on_port_up(&self, _: &dyn Finder, _: &Arc<Port>) {}
        fn on_port_down(&self, _: &dyn Finder, _: &Arc<Port>) {}
        fn on_packet_in(
            &self,
            _: &dyn Finder,
            _: &Arc<Port>,
            _: &mut packet::EthernetFrame,
        ) {
        }
        fn on_topology_change(&self, _: &dyn Finder) {
            *self.changes.lock().unwrap() += 1;
        }
    }

    fn port_desc(number: u32) -> PortDesc {
        PortDesc {
            number,
            hw_addr: MacAddr([0x02, 0, 0, 0, 0, number as u8]),
            name: format!("eth{number}"),
            admin_down: false,
            link_down: false,
        }
    }

    fn add_test_device(
        topo: &Arc<Topology>,
        dpid: u64,
        n_ports: u32,
    ) -> Arc<Device> {
        let log = of_common::log::init_logger();
        let (conn, _switch_side) =
            switch_conn_pair(format!("127.0.0.1:{}", 6000 + dpid)
                .parse()
                .unwrap());
        let device = Device::new(conn, topo, log);
        device.set_factory(factory_for(OFP13_VERSION).unwrap());
        device.set_dpid(dpid);
        for n in 1..=n_ports {
            device.update_port(port_desc(n));
        }
        topo.add_device(dpid, device.clone());
        device
    }

    fn link(topo: &Topology, a: (u64, u32), b: (u64, u32)) {
        topo.process_lldp(a.0, a.1, &LldpProbe::new(b.0, b.1));
    }

    fn new_topo() -> Arc<Topology> {
        Topology::new(of_common::log::init_logger())
    }

    #[test]
    fn node_moves_between_ports() {
        let topo = new_topo();
        let listener = CountingListener::new();
        topo.set_event_listener(listener.clone());
        let d1 = add_test_device(&topo, 1, 4);

        let mac: MacAddr = "aa:aa:aa:aa:aa:01".parse().unwrap();
        assert!(topo.learn_node(mac, 1, 1));
        let learned = *listener.changes.lock().unwrap();
        assert_eq!(topo.node(mac).unwrap().port, 1);
        assert!(d1.port(1).unwrap().nodes().contains(&mac));

        // Same place again: no event, no change.
        assert!(!topo.learn_node(mac, 1, 1));
        assert_eq!(*listener.changes.lock().unwrap(), learned);

        // Different port: the node moves and exactly one event fires.
        assert!(topo.learn_node(mac, 1, 2));
        assert_eq!(*listener.changes.lock().unwrap(), learned + 1);
        assert_eq!(topo.node(mac).unwrap().port, 2);
        assert!(!d1.port(1).unwrap().nodes().contains(&mac));
        assert!(d1.port(2).unwrap().nodes().contains(&mac));
    }

    #[test]
    fn port_add_node_goes_through_topology() {
        let topo = new_topo();
        let d1 = add_test_device(&topo, 1, 2);
        let mac: MacAddr = "aa:aa:aa:aa:aa:07".parse().unwrap();

        d1.port(1).unwrap().add_node(mac);
        assert_eq!(topo.node(mac).unwrap().port, 1);

        d1.port(2).unwrap().add_node(mac);
        assert!(!d1.port(1).unwrap().nodes().contains(&mac));

        d1.port(2).unwrap().remove_node(mac);
        assert!(topo.node(mac).is_none());
        assert!(d1.port(2).unwrap().nodes().is_empty());
    }

    #[test]
    fn hub_triangle_blocks_far_edge() {
        let topo = new_topo();
        for dpid in 1..=4 {
            add_test_device(&topo, dpid, 4);
        }
        // Triangle 1-2-3 with an extra leaf on 2, making 2 the
        // highest-degree device; the 1-3 edge is then the costliest in
        // the cycle and must be the one blocked.
        link(&topo, (1, 1), (2, 1));
        link(&topo, (2, 2), (3, 1));
        link(&topo, (1, 2), (3, 2));
        link(&topo, (2, 3), (4, 1));

        assert!(topo.is_blocked(1, 2));
        assert!(topo.is_blocked(3, 2));
        assert!(!topo.is_blocked(1, 1));
        assert!(!topo.is_blocked(2, 2));

        // The path between 1 and 3 crosses the hub, never the blocked
        // link.
        let path = topo.path(1, 3);
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].egress.id(), topo.device(1).unwrap().port(1).unwrap().id());
        assert_eq!(path[0].ingress.number(), 1);
        assert_eq!(path[1].egress.number(), 2);
        assert_eq!(path[1].ingress.number(), 1);
        assert_eq!(path[1].ingress.dpid(), Some(3));
    }

    #[test]
    fn plain_triangle_is_deterministic() {
        let topo = new_topo();
        for dpid in 1..=3 {
            add_test_device(&topo, dpid, 4);
        }
        link(&topo, (1, 1), (2, 1));
        link(&topo, (2, 2), (3, 1));
        link(&topo, (1, 2), (3, 2));

        // All degrees tie; the lowest dpid roots the tree, so the 2-3
        // edge is the redundant one.
        assert!(topo.is_blocked(2, 2));
        assert!(topo.is_blocked(3, 1));

        let path = topo.path(2, 3);
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].ingress.dpid(), Some(1));
        assert_eq!(path[1].ingress.dpid(), Some(3));
    }

    #[test]
    fn equal_cost_paths_resolve_identically() {
        let topo = new_topo();
        for dpid in 1..=4 {
            add_test_device(&topo, dpid, 4);
        }
        // Diamond: 1-2-4 and 1-3-4.
        link(&topo, (1, 1), (2, 1));
        link(&topo, (1, 2), (3, 1));
        link(&topo, (2, 2), (4, 1));
        link(&topo, (3, 2), (4, 2));

        let reference: Vec<String> = topo
            .path(1, 4)
            .iter()
            .map(|h| format!("{}>{}", h.egress.id(), h.ingress.id()))
            .collect();
        assert!(!reference.is_empty());
        for _ in 0..5 {
            let again: Vec<String> = topo
                .path(1, 4)
                .iter()
                .map(|h| format!("{}>{}", h.egress.id(), h.ingress.id()))
                .collect();
            assert_eq!(again, reference);
        }
    }

    #[test]
    fn unreachable_pairs_return_empty() {
        let topo = new_topo();
        add_test_device(&topo, 1, 2);
        add_test_device(&topo, 2, 2);
        assert!(topo.path(1, 2).is_empty());
        assert!(topo.path(1, 99).is_empty());
    }

    #[test]
    fn links_expire() {
        let topo = new_topo();
        add_test_device(&topo, 1, 2);
        add_test_device(&topo, 2, 2);
        link(&topo, (1, 1), (2, 1));
        assert!(topo.is_inter_switch(1, 1));
        assert_eq!(topo.path(1, 2).len(), 1);

        assert_eq!(topo.expire_links(Duration::ZERO), 1);
        assert!(!topo.is_inter_switch(1, 1));
        assert!(topo.path(1, 2).is_empty());

        // Refreshing keeps a link alive.
        link(&topo, (1, 1), (2, 1));
        link(&topo, (1, 1), (2, 1));
        assert_eq!(topo.expire_links(Duration::from_secs(30)), 0);
    }

    #[test]
    fn probes_from_unknown_devices_are_ignored() {
        let topo = new_topo();
        add_test_device(&topo, 1, 2);
        link(&topo, (1, 1), (9, 1));
        assert!(!topo.is_inter_switch(1, 1));
    }

    #[test]
    fn device_removal_drops_nodes_and_links() {
        let topo = new_topo();
        add_test_device(&topo, 1, 2);
        add_test_device(&topo, 2, 2);
        link(&topo, (1, 1), (2, 1));
        let mac: MacAddr = "bb:bb:bb:bb:bb:02".parse().unwrap();
        topo.learn_node(mac, 2, 2);

        topo.remove_device(2);
        assert!(topo.node(mac).is_none());
        assert!(topo.device(2).is_none());
        assert!(!topo.is_inter_switch(1, 1));
        assert!(topo.path(1, 2).is_empty());
    }

    #[test]
    fn port_removal_drops_link_state() {
        let topo = new_topo();
        add_test_device(&topo, 1, 2);
        add_test_device(&topo, 2, 2);
        link(&topo, (1, 1), (2, 1));

        topo.remove_port(2, 1);
        assert!(!topo.is_inter_switch(1, 1));
    }
}
