// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::device::{Device, Port};
use crate::topology::{Node, PathHop};
use of_common::net::MacAddr;
use packet::EthernetFrame;
use std::sync::Arc;

/// The read-only view of the fabric the app chain is given. Implemented by
/// the topology; processors never mutate forwarding state through it.
pub trait Finder: Send + Sync {
    /// The device with this datapath id, if connected and valid.
    fn device(&self, dpid: u64) -> Option<Arc<Device>>;

    /// Every valid device, ascending by datapath id.
    fn devices(&self) -> Vec<Arc<Device>>;

    /// Where a host MAC was last seen.
    fn node(&self, mac: MacAddr) -> Option<Node>;

    /// Hop list from `src` to `dst` over unblocked inter-switch links.
    /// Empty when unreachable.
    fn path(&self, src: u64, dst: u64) -> Vec<PathHop>;

    /// Whether a discovered neighbor switch sits behind this port.
    fn is_inter_switch(&self, dpid: u64, port: u32) -> bool;

    /// Whether loop prevention currently forbids forwarding over this
    /// port.
    fn is_blocked(&self, dpid: u64, port: u32) -> bool;
}

/// Callbacks delivered to the head of the app chain. Sessions fire the
/// device, port and packet events; the topology fires change events.
/// Implementations must not block: they run on session threads.
pub trait EventListener: Send + Sync {
    fn on_device_up(&self, finder: &dyn Finder, device: &Arc<Device>);
    fn on_device_down(&self, finder: &dyn Finder, device: &Arc<Device>);
    fn on_port_up(&self, finder: &dyn Finder, port: &Arc<Port>);
    fn on_port_down(&self, finder: &dyn Finder, port: &Arc<Port>);
    fn on_packet_in(
        &self,
        finder: &dyn Finder,
        ingress: &Arc<Port>,
        eth: &mut EthernetFrame,
    );
    fn on_topology_change(&self, finder: &dyn Finder);
}
