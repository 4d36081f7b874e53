// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The periodic link-discovery sweep. One thread walks every valid
//! device every ten seconds, emitting an LLDP probe out of each live
//! port, and lets stale links age out of the topology.

use crate::flow::packet_out_on;
use crate::topology::{Topology, LINK_TTL};
use crate::{finder::Finder, wrn};
use of_common::lock;
use of_common::net::MacAddr;
use packet::{EtherType, EthernetFrame, LldpProbe};
use slog::Logger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{sleep, spawn, JoinHandle};
use std::time::Duration;

pub const LLDP_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

const RESOLUTION: Duration = Duration::from_millis(500);

const UNIT: &str = "sweeper";

pub struct Sweeper {
    topology: Arc<Topology>,
    probe_timer: Timer,
    shutdown: Arc<AtomicBool>,
    log: Logger,
}

impl Sweeper {
    pub fn new(
        topology: Arc<Topology>,
        shutdown: Arc<AtomicBool>,
        log: Logger,
    ) -> Self {
        let probe_timer = Timer::new(LLDP_SWEEP_INTERVAL);
        probe_timer.enable();
        Self {
            topology,
            probe_timer,
            shutdown,
            log,
        }
    }

    pub fn run(self) -> JoinHandle<()> {
        spawn(move || loop {
            if self.shutdown.load(Ordering::Acquire) {
                return;
            }
            self.probe_timer.tick(RESOLUTION);
            if self.probe_timer.expired() {
                self.sweep();
                self.probe_timer.reset();
            }
            self.topology.expire_links(LINK_TTL);
            sleep(RESOLUTION);
        })
    }

    /// One probe out of every live physical port of every valid device.
    /// The probe names the emitting (dpid, port); whoever receives it on
    /// the far side reports the link.
    pub fn sweep(&self) {
        for device in self.topology.devices() {
            let Some(dpid) = device.dpid() else {
                continue;
            };
            for port in device.ports() {
                let n = port.number();
                if !port.is_up() || is_reserved_port(n) {
                    continue;
                }
                let probe = LldpProbe::new(dpid, n);
                let frame = EthernetFrame::new(
                    MacAddr::LLDP_MULTICAST,
                    port.value().hw_addr,
                    EtherType::LLDP,
                    probe.to_bytes(),
                );
                if let Err(e) =
                    packet_out_on(&device, n, frame.to_bytes())
                {
                    wrn!(self.log, UNIT, "probe {}: {e}", port.id());
                }
            }
        }
    }
}

/// Reserved port numbers (local, controller, ...) in either protocol
/// version's encoding never carry discovery traffic.
fn is_reserved_port(n: u32) -> bool {
    (0xff00..=0xffff).contains(&n) || n >= 0xffff_ff00
}

/// A countdown timer stepped by the sweep loop.
#[derive(Clone)]
pub struct Timer {
    pub interval: Duration,

    /// Timer state. The first value indicates if the timer is enabled.
    /// The second value indicates how much time is left.
    value: Arc<Mutex<(bool, Duration)>>,
}

impl Timer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            value: Arc::new(Mutex::new((false, interval))),
        }
    }

    /// Make the timer tick, decrementing the value by the specified
    /// resolution. Saturating, so ticking an expired timer is a no-op.
    pub fn tick(&self, resolution: Duration) {
        let mut value = lock!(self.value);
        if value.0 {
            value.1 = value.1.saturating_sub(resolution);
        }
    }

    pub fn enable(&self) {
        lock!(self.value).0 = true;
    }

    pub fn disable(&self) {
        lock!(self.value).0 = false;
    }

    /// True once an enabled timer has ticked down to zero.
    pub fn expired(&self) -> bool {
        let v = lock!(self.value);
        v.0 && v.1.is_zero()
    }

    pub fn reset(&self) {
        lock!(self.value).1 = self.interval;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::apps::l2switch::test::add_device;
    use openflow::messages::{Message, PortDesc};

    #[test]
    fn timer_counts_down_only_when_enabled() {
        let t = Timer::new(Duration::from_millis(100));
        t.tick(Duration::from_millis(200));
        assert!(!t.expired());

        t.enable();
        t.tick(Duration::from_millis(60));
        assert!(!t.expired());
        t.tick(Duration::from_millis(60));
        assert!(t.expired());

        t.reset();
        assert!(!t.expired());
    }

    #[test]
    fn sweep_probes_live_ports_only() {
        let topo = Topology::new(of_common::log::init_logger());
        let (device, switch) = add_device(&topo, 3, &[1, 2]);
        // Take port 2 down and add a reserved-numbered local port.
        let mut down = device.port(2).unwrap().value();
        down.link_down = true;
        device.update_port(down);
        device.update_port(PortDesc {
            number: 0xffff_fffe,
            hw_addr: MacAddr([2, 0, 0, 3, 0, 0]),
            name: "local".into(),
            admin_down: false,
            link_down: false,
        });

        let sweeper = Sweeper::new(
            Arc::clone(&topo),
            Arc::new(AtomicBool::new(false)),
            of_common::log::init_logger(),
        );
        sweeper.sweep();

        let Message::PacketOut(po) = switch.recv() else {
            panic!("expected lldp packet out");
        };
        let frame = EthernetFrame::from_bytes(&po.payload).unwrap();
        assert_eq!(frame.ethertype, EtherType::LLDP);
        assert_eq!(frame.dst, MacAddr::LLDP_MULTICAST);
        let probe = LldpProbe::from_bytes(&frame.payload).unwrap();
        assert_eq!(probe.chassis_id, 3);
        assert_eq!(probe.port_id, 1);

        // Nothing for the downed or reserved ports.
        assert!(switch.ep.rx.try_recv().is_err());
    }
}
