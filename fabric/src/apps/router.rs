// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::apps::{Disposition, Processor};
use crate::device::Port;
use crate::error::Error;
use crate::finder::Finder;
use crate::flow::{install_flow, packet_out, FlowParam, PRIORITY_ROUTER};
use crate::{dbg, err, inf, wrn};
use of_common::lock;
use of_common::net::MacAddr;
use packet::{
    EtherType, EthernetFrame, IcmpEcho, Ipv4Packet, IPPROTO_ICMP,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slog::Logger;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

const NAME: &str = "router";

/// A static default-routing virtual router. It owns one virtual MAC;
/// frames addressed anywhere else pass down the chain. Traffic into the
/// configured networks is rewritten toward the owning host, traffic out is
/// handed to a randomly chosen gateway, and ICMP echo against the
/// router's own addresses is answered in place.
pub struct Router {
    /// The virtual MAC hosts use as their default-gateway address.
    mac: MacAddr,
    db: swdb::Db,
    rng: Mutex<StdRng>,
    log: Logger,
}

impl Router {
    pub fn new(mac: MacAddr, db: swdb::Db, log: Logger) -> Self {
        Self::with_rng(mac, db, StdRng::from_entropy(), log)
    }

    /// Construct with a caller-supplied RNG so gateway selection can be
    /// seeded.
    pub fn with_rng(
        mac: MacAddr,
        db: swdb::Db,
        rng: StdRng,
        log: Logger,
    ) -> Self {
        Self {
            mac,
            db,
            rng: Mutex::new(rng),
            log,
        }
    }

    fn in_local_networks(&self, ip: Ipv4Addr) -> Result<bool, Error> {
        Ok(self.db.networks()?.iter().any(|n| n.contains(ip)))
    }

    /// Answer ICMP echo against one of the router's own addresses. Any
    /// other ICMP aimed at the router is ignored.
    fn send_echo_reply(
        &self,
        ingress: &Arc<Port>,
        eth: &EthernetFrame,
        ipv4: &Ipv4Packet,
    ) -> Result<Disposition, Error> {
        let echo = match IcmpEcho::from_bytes(&ipv4.payload) {
            Ok(echo) if echo.is_echo_request() => echo,
            _ => {
                dbg!(self.log, NAME, "ignoring non-echo icmp to the router");
                return Ok(Disposition::Consumed);
            }
        };
        let reply = Ipv4Packet::new(
            ipv4.dst,
            ipv4.src,
            IPPROTO_ICMP,
            echo.reply().to_bytes(),
        );
        let frame = EthernetFrame::new(
            eth.src,
            eth.dst,
            EtherType::IPV4,
            reply.to_bytes(),
        );
        dbg!(self.log, NAME, "echo reply to {}", ipv4.src);
        packet_out(ingress, frame.to_bytes())?;
        Ok(Disposition::Consumed)
    }

    /// Install the rewrite rule toward `target` and emit the frame. When
    /// the target's location is unknown the frame is rewritten and handed
    /// down the chain so the learning switch can flood for it.
    fn route(
        &self,
        finder: &dyn Finder,
        ingress: &Arc<Port>,
        eth: &mut EthernetFrame,
        ipv4: &Ipv4Packet,
        target: MacAddr,
    ) -> Result<Disposition, Error> {
        let Some(node) = finder.node(target) else {
            dbg!(self.log, NAME, "location of {target} unknown, flooding");
            eth.dst = target;
            return Ok(Disposition::Forward);
        };
        let device = ingress.device().ok_or(Error::Stale)?;
        let dpid = device.dpid().ok_or(Error::Stale)?;

        let egress = if dpid == node.dpid {
            node.resolve(finder).ok_or(Error::Stale)?
        } else {
            let path = finder.path(dpid, node.dpid);
            let Some(first) = path.first() else {
                inf!(
                    self.log,
                    NAME,
                    "no path {dpid:#x} -> {:#x}, dropping",
                    node.dpid
                );
                return Ok(Disposition::Consumed);
            };
            first.egress.clone()
        };

        // The rule matches the frame as received, destination MAC still
        // the router's own.
        install_flow(&FlowParam {
            device: &device,
            ether_type: eth.ethertype,
            in_port: ingress.number(),
            out_port: egress.number(),
            src_mac: eth.src,
            dst_mac: eth.dst,
            target_mac: target,
            dst_ip: Some((ipv4.dst, 32)),
            priority: PRIORITY_ROUTER,
        })?;

        eth.dst = target;
        packet_out(&egress, eth.to_bytes())?;
        Ok(Disposition::Consumed)
    }

    fn pick_gateway(&self, gateways: &[MacAddr]) -> MacAddr {
        if gateways.len() == 1 {
            return gateways[0];
        }
        let mut rng = lock!(self.rng);
        gateways[rng.gen_range(0..gateways.len())]
    }
}

impl Processor for Router {
    fn name(&self) -> &'static str {
        NAME
    }

    fn init(&self) -> Result<(), Error> {
        inf!(self.log, NAME, "virtual mac {}", self.mac);
        Ok(())
    }

    fn on_packet_in(
        &self,
        finder: &dyn Finder,
        ingress: &Arc<Port>,
        eth: &mut EthernetFrame,
    ) -> Result<Disposition, Error> {
        if eth.dst != self.mac {
            return Ok(Disposition::Forward);
        }
        if eth.ethertype != EtherType::IPV4 {
            dbg!(
                self.log,
                NAME,
                "dropping non-ipv4 frame {:#06x} to the router",
                eth.ethertype
            );
            return Ok(Disposition::Consumed);
        }
        let ipv4 = Ipv4Packet::from_bytes(&eth.payload)?;

        if self.db.is_router(ipv4.dst)? {
            if ipv4.protocol == IPPROTO_ICMP {
                return self.send_echo_reply(ingress, eth, &ipv4);
            }
            return Ok(Disposition::Consumed);
        }

        if self.in_local_networks(ipv4.dst)? {
            match self.db.find_mac(ipv4.dst)? {
                Some(mac) => self.route(finder, ingress, eth, &ipv4, mac),
                None => {
                    dbg!(
                        self.log,
                        NAME,
                        "no host owns {}, dropping",
                        ipv4.dst
                    );
                    Ok(Disposition::Consumed)
                }
            }
        } else {
            if self.db.is_gateway(eth.src)? {
                err!(
                    self.log,
                    NAME,
                    "routing loop: gateway-originated frame for {}",
                    ipv4.dst
                );
                return Ok(Disposition::Consumed);
            }
            if !self.in_local_networks(ipv4.src)? {
                wrn!(
                    self.log,
                    NAME,
                    "spoofed source {} -> {}, dropping",
                    ipv4.src,
                    ipv4.dst
                );
                return Ok(Disposition::Consumed);
            }
            let gateways = self.db.gateways()?;
            if gateways.is_empty() {
                err!(self.log, NAME, "no gateway for outgoing traffic");
                return Ok(Disposition::Consumed);
            }
            let target = self.pick_gateway(&gateways);
            self.route(finder, ingress, eth, &ipv4, target)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::apps::l2switch::test::add_device;
    use crate::topology::Topology;
    use openflow::messages::{Action, Message, OutputPort};
    use swdb::{Db, GatewayRecord};
    use tempfile::TempDir;

    const ROUTER_MAC: &str = "00:11:22:33:44:55";

    fn test_db() -> (Db, TempDir) {
        let dir = TempDir::new().unwrap();
        let db =
            Db::new(dir.path().to_str().unwrap(), of_common::log::init_logger())
                .unwrap();
        (db, dir)
    }

    fn mac(s: &str) -> MacAddr {
        s.parse().unwrap()
    }

    fn icmp_echo_frame(
        src_mac: MacAddr,
        src_ip: [u8; 4],
        dst_ip: [u8; 4],
    ) -> EthernetFrame {
        let echo = IcmpEcho {
            icmp_type: IcmpEcho::ECHO_REQUEST,
            code: 0,
            ident: 0x42,
            sequence: 3,
            payload: b"abcdefgh".to_vec(),
        };
        let ip = Ipv4Packet::new(
            src_ip.into(),
            dst_ip.into(),
            IPPROTO_ICMP,
            echo.to_bytes(),
        );
        EthernetFrame::new(
            mac(ROUTER_MAC),
            src_mac,
            EtherType::IPV4,
            ip.to_bytes(),
        )
    }

    #[test]
    fn echo_request_to_router_ip_is_answered_in_place() {
        let (db, _dir) = test_db();
        db.add_router_ip([10, 0, 0, 1].into()).unwrap();

        let topo = Topology::new(of_common::log::init_logger());
        let (d1, s1) = add_device(&topo, 1, &[1, 2]);
        let router = Router::new(
            mac(ROUTER_MAC),
            db,
            of_common::log::init_logger(),
        );

        let host = mac("aa:aa:aa:aa:aa:01");
        let mut eth = icmp_echo_frame(host, [192, 168, 1, 5], [10, 0, 0, 1]);
        let ingress = d1.port(1).unwrap();
        let disposition = router
            .on_packet_in(topo.as_ref(), &ingress, &mut eth)
            .unwrap();
        assert_eq!(disposition, Disposition::Consumed);

        let Message::PacketOut(po) = s1.recv() else {
            panic!("expected packet out");
        };
        assert_eq!(
            po.actions,
            vec![Action::Output(OutputPort::Physical(1))]
        );
        let reply = EthernetFrame::from_bytes(&po.payload).unwrap();
        assert_eq!(reply.src, mac(ROUTER_MAC));
        assert_eq!(reply.dst, host);
        let ip = Ipv4Packet::from_bytes(&reply.payload).unwrap();
        assert_eq!(ip.src, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(ip.dst, Ipv4Addr::new(192, 168, 1, 5));
        let echo = IcmpEcho::from_bytes(&ip.payload).unwrap();
        assert_eq!(echo.icmp_type, IcmpEcho::ECHO_REPLY);
        assert_eq!(echo.ident, 0x42);
        assert_eq!(echo.sequence, 3);
        assert_eq!(echo.payload, b"abcdefgh");

        // Replay: identical reply, and never a flow.
        let mut again =
            icmp_echo_frame(host, [192, 168, 1, 5], [10, 0, 0, 1]);
        router
            .on_packet_in(topo.as_ref(), &ingress, &mut again)
            .unwrap();
        let Message::PacketOut(po2) = s1.recv() else {
            panic!("expected packet out");
        };
        assert_eq!(po2.payload, po.payload);
        assert!(s1.ep.rx.try_recv().is_err());
    }

    #[test]
    fn frames_for_other_macs_pass_through() {
        let (db, _dir) = test_db();
        let topo = Topology::new(of_common::log::init_logger());
        let (d1, s1) = add_device(&topo, 1, &[1]);
        let router = Router::new(
            mac(ROUTER_MAC),
            db,
            of_common::log::init_logger(),
        );

        let mut eth = EthernetFrame::new(
            mac("bb:bb:bb:bb:bb:02"),
            mac("aa:aa:aa:aa:aa:01"),
            EtherType::IPV4,
            vec![0; 20],
        );
        let ingress = d1.port(1).unwrap();
        let disposition = router
            .on_packet_in(topo.as_ref(), &ingress, &mut eth)
            .unwrap();
        assert_eq!(disposition, Disposition::Forward);
        assert!(s1.ep.rx.try_recv().is_err());
    }

    #[test]
    fn outgoing_traffic_picks_seeded_gateway() {
        let (db, _dir) = test_db();
        db.add_network("192.168.1.0/24".parse().unwrap()).unwrap();
        let gw1 = mac("0a:00:00:00:00:01");
        let gw2 = mac("0a:00:00:00:00:02");
        for gw in [gw1, gw2] {
            db.add_gateway(GatewayRecord {
                mac: gw,
                description: String::new(),
            })
            .unwrap();
        }

        let topo = Topology::new(of_common::log::init_logger());
        let (d1, s1) = add_device(&topo, 1, &[1, 2, 3]);
        // Both gateways have known locations on this device.
        topo.learn_node(gw1, 1, 2);
        topo.learn_node(gw2, 1, 3);

        const SEED: u64 = 7;
        let expected = {
            let mut rng = StdRng::seed_from_u64(SEED);
            [gw1, gw2][rng.gen_range(0..2)]
        };
        let router = Router::with_rng(
            mac(ROUTER_MAC),
            db,
            StdRng::seed_from_u64(SEED),
            of_common::log::init_logger(),
        );

        let host = mac("aa:aa:aa:aa:aa:01");
        let ip = Ipv4Packet::new(
            [192, 168, 1, 5].into(),
            [8, 8, 8, 8].into(),
            6,
            vec![0; 20],
        );
        let mut eth = EthernetFrame::new(
            mac(ROUTER_MAC),
            host,
            EtherType::IPV4,
            ip.to_bytes(),
        );
        let ingress = d1.port(1).unwrap();
        let disposition = router
            .on_packet_in(topo.as_ref(), &ingress, &mut eth)
            .unwrap();
        assert_eq!(disposition, Disposition::Consumed);

        let expected_port =
            topo.node(expected).unwrap().port;
        let Message::FlowMod(fm) = s1.recv() else {
            panic!("expected flow mod");
        };
        assert_eq!(fm.priority, PRIORITY_ROUTER);
        assert_eq!(fm.fields.eth_dst, Some(mac(ROUTER_MAC)));
        assert_eq!(
            fm.fields.ipv4_dst,
            Some((Ipv4Addr::new(8, 8, 8, 8), 32))
        );
        assert_eq!(
            fm.actions,
            vec![
                Action::SetEthDst(expected),
                Action::Output(OutputPort::Physical(expected_port)),
            ]
        );

        let Message::PacketOut(po) = s1.recv() else {
            panic!("expected packet out");
        };
        let sent = EthernetFrame::from_bytes(&po.payload).unwrap();
        assert_eq!(sent.dst, expected);
    }

    #[test]
    fn spoofed_sources_are_dropped() {
        let (db, _dir) = test_db();
        db.add_network("192.168.1.0/24".parse().unwrap()).unwrap();
        db.add_gateway(GatewayRecord {
            mac: mac("0a:00:00:00:00:01"),
            description: String::new(),
        })
        .unwrap();

        let topo = Topology::new(of_common::log::init_logger());
        let (d1, s1) = add_device(&topo, 1, &[1]);
        let router = Router::new(
            mac(ROUTER_MAC),
            db,
            of_common::log::init_logger(),
        );

        let ip = Ipv4Packet::new(
            [10, 9, 9, 9].into(),
            [8, 8, 8, 8].into(),
            6,
            vec![0; 20],
        );
        let mut eth = EthernetFrame::new(
            mac(ROUTER_MAC),
            mac("aa:aa:aa:aa:aa:01"),
            EtherType::IPV4,
            ip.to_bytes(),
        );
        let ingress = d1.port(1).unwrap();
        let disposition = router
            .on_packet_in(topo.as_ref(), &ingress, &mut eth)
            .unwrap();
        assert_eq!(disposition, Disposition::Consumed);
        assert!(s1.ep.rx.try_recv().is_err());
    }

    #[test]
    fn non_ipv4_to_router_is_dropped() {
        let (db, _dir) = test_db();
        let topo = Topology::new(of_common::log::init_logger());
        let (d1, s1) = add_device(&topo, 1, &[1]);
        let router = Router::new(
            mac(ROUTER_MAC),
            db,
            of_common::log::init_logger(),
        );

        let mut eth = EthernetFrame::new(
            mac(ROUTER_MAC),
            mac("aa:aa:aa:aa:aa:01"),
            EtherType::ARP,
            vec![0; 28],
        );
        let ingress = d1.port(1).unwrap();
        let disposition = router
            .on_packet_in(topo.as_ref(), &ingress, &mut eth)
            .unwrap();
        assert_eq!(disposition, Disposition::Consumed);
        assert!(s1.ep.rx.try_recv().is_err());
    }
}
