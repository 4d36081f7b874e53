// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::apps::{Disposition, Processor};
use crate::device::Port;
use crate::error::Error;
use crate::finder::Finder;
use crate::flow::{
    install_flow, packet_out, FlowParam, PRIORITY_L2,
};
use crate::topology::Node;
use crate::{dbg, trc};
use packet::EthernetFrame;
use slog::Logger;
use std::sync::Arc;

const NAME: &str = "l2switch";

/// The transparent learning switch. Learns source MACs onto their ingress
/// ports, installs exact-match forwarding rules along the discovered path
/// for known destinations, and floods edge ports for unknown ones.
pub struct L2Switch {
    log: Logger,
}

impl L2Switch {
    pub fn new(log: Logger) -> Self {
        Self { log }
    }

    fn forward_known(
        &self,
        finder: &dyn Finder,
        ingress: &Arc<Port>,
        eth: &EthernetFrame,
        node: Node,
    ) -> Result<Disposition, Error> {
        let device = ingress.device().ok_or(Error::Stale)?;
        let src_dpid = device.dpid().ok_or(Error::Stale)?;

        if src_dpid == node.dpid {
            if node.port == ingress.number() {
                // Source and destination share a port; nothing to install.
                return Ok(Disposition::Consumed);
            }
            install_flow(&FlowParam {
                device: &device,
                ether_type: eth.ethertype,
                in_port: ingress.number(),
                out_port: node.port,
                src_mac: eth.src,
                dst_mac: eth.dst,
                target_mac: eth.dst,
                dst_ip: None,
                priority: PRIORITY_L2,
            })?;
            let egress = node.resolve(finder).ok_or(Error::Stale)?;
            packet_out(&egress, eth.to_bytes())?;
            return Ok(Disposition::Consumed);
        }

        let path = finder.path(src_dpid, node.dpid);
        if path.is_empty() {
            // Stale view of the fabric; drop and let the next miss retry.
            dbg!(
                self.log,
                NAME,
                "no path {src_dpid:#x} -> {:#x}, dropping",
                node.dpid
            );
            return Ok(Disposition::Consumed);
        }

        // One rule per device along the path, then one on the destination
        // device toward the host port.
        let mut in_port = ingress.number();
        for hop in &path {
            let hop_device = hop.egress.device().ok_or(Error::Stale)?;
            install_flow(&FlowParam {
                device: &hop_device,
                ether_type: eth.ethertype,
                in_port,
                out_port: hop.egress.number(),
                src_mac: eth.src,
                dst_mac: eth.dst,
                target_mac: eth.dst,
                dst_ip: None,
                priority: PRIORITY_L2,
            })?;
            in_port = hop.ingress.number();
        }
        let last = path.last().unwrap();
        let dst_device = last.ingress.device().ok_or(Error::Stale)?;
        install_flow(&FlowParam {
            device: &dst_device,
            ether_type: eth.ethertype,
            in_port,
            out_port: node.port,
            src_mac: eth.src,
            dst_mac: eth.dst,
            target_mac: eth.dst,
            dst_ip: None,
            priority: PRIORITY_L2,
        })?;

        let egress = node.resolve(finder).ok_or(Error::Stale)?;
        packet_out(&egress, eth.to_bytes())?;
        Ok(Disposition::Consumed)
    }

    /// Unknown destination: emit on every live edge port of the ingress
    /// device except the one the frame came from. Flooding across the
    /// fabric happens switch by switch as learning propagates; no flow is
    /// installed.
    fn flood(
        &self,
        finder: &dyn Finder,
        ingress: &Arc<Port>,
        eth: &EthernetFrame,
    ) -> Result<Disposition, Error> {
        let device = ingress.device().ok_or(Error::Stale)?;
        let dpid = device.dpid().ok_or(Error::Stale)?;
        let payload = eth.to_bytes();
        for port in device.ports() {
            let n = port.number();
            if n == ingress.number()
                || !port.is_up()
                || finder.is_inter_switch(dpid, n)
                || finder.is_blocked(dpid, n)
            {
                continue;
            }
            packet_out(&port, payload.clone())?;
        }
        Ok(Disposition::Consumed)
    }
}

impl Processor for L2Switch {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_packet_in(
        &self,
        finder: &dyn Finder,
        ingress: &Arc<Port>,
        eth: &mut EthernetFrame,
    ) -> Result<Disposition, Error> {
        trc!(
            self.log,
            NAME,
            "packet in {} {} -> {}",
            ingress.id(),
            eth.src,
            eth.dst
        );

        if !eth.src.is_multicast() && !eth.src.is_zero() {
            ingress.add_node(eth.src);
        }

        if !eth.dst.is_multicast() {
            if let Some(node) = finder.node(eth.dst) {
                return self.forward_known(finder, ingress, eth, node);
            }
        }
        self.flood(finder, ingress, eth)
    }
}
