// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-switch protocol session. One runner thread per connection
//! drives a state machine from HELLO to the steady event loop, with a
//! reader thread feeding framed messages through an mpsc channel. Message
//! handling within a session is strictly sequential; anything the session
//! installs is on the wire before the next message is read.

use crate::connection::SwitchConnection;
use crate::device::{Device, Features};
use crate::finder::EventListener;
use crate::flow::{
    install_baseline_drop, install_table_miss, send_barrier,
};
use crate::topology::Topology;
use crate::{dbg, err, inf, trc, wrn};
use of_common::{lock, read_lock, write_lock};
use openflow::factory::{decode_hello, factory_for, negotiate};
use openflow::messages::{
    action_type, oxm, Hello, Message, PacketIn, PortChange, PortStatus,
    TableFeature,
};
use openflow::{
    Factory, Header, OFP10_VERSION, OFP13_VERSION, SUPPORTED_VERSIONS,
};
use packet::{EtherType, EthernetFrame, LldpProbe};
use slog::Logger;
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// How long a peer may sit silent inside the handshake before the session
/// is torn down as a protocol failure.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Granularity at which blocked receives notice the shutdown flag.
const RESOLUTION: Duration = Duration::from_millis(50);

/// Events feeding the session state machine.
pub enum FsmEvent {
    /// One framed message off the wire, not yet decoded.
    Frame(Header, Vec<u8>),
    /// The transport is gone.
    ConnectionClosed,
}

/// Session states. Each names what the handshake has accomplished so far.
enum FsmState {
    /// Connection accepted, nothing sent yet.
    Opened,
    /// Our HELLO is out; negotiating and waiting for FEATURES_REPLY.
    HelloSent,
    /// The device has its datapath id.
    Featured,
    /// Switch descriptions recorded.
    Described,
    /// The port inventory is populated.
    PortsQueried,
    /// Flow tables prepared: miss rule and baseline drops installed.
    Configured,
    /// Steady state.
    Established,
    /// Terminal.
    Closed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FsmStateKind {
    Opened,
    HelloSent,
    Featured,
    Described,
    PortsQueried,
    Configured,
    Established,
    Closed,
}

impl FsmState {
    fn kind(&self) -> FsmStateKind {
        match self {
            FsmState::Opened => FsmStateKind::Opened,
            FsmState::HelloSent => FsmStateKind::HelloSent,
            FsmState::Featured => FsmStateKind::Featured,
            FsmState::Described => FsmStateKind::Described,
            FsmState::PortsQueried => FsmStateKind::PortsQueried,
            FsmState::Configured => FsmStateKind::Configured,
            FsmState::Established => FsmStateKind::Established,
            FsmState::Closed => FsmStateKind::Closed,
        }
    }
}

impl Display for FsmStateKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsmStateKind::Opened => "opened",
            FsmStateKind::HelloSent => "hello sent",
            FsmStateKind::Featured => "featured",
            FsmStateKind::Described => "described",
            FsmStateKind::PortsQueried => "ports queried",
            FsmStateKind::Configured => "configured",
            FsmStateKind::Established => "established",
            FsmStateKind::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

enum Recv {
    Event(FsmEvent),
    TimedOut,
    ShuttingDown,
}

pub struct SessionRunner {
    conn: Arc<dyn SwitchConnection>,
    device: Arc<Device>,
    topology: Arc<Topology>,
    listener: Arc<dyn EventListener>,
    event_tx: Sender<FsmEvent>,
    event_rx: Receiver<FsmEvent>,
    factory: RwLock<Option<Arc<dyn Factory>>>,
    state: Mutex<FsmStateKind>,
    running: AtomicBool,
    shutdown: AtomicBool,
    closed: AtomicBool,
    up_announced: AtomicBool,
    log: Logger,
}

// The receiver is only ever touched by the runner thread; everything else
// behind the Arc is synchronized.
unsafe impl Send for SessionRunner {}
unsafe impl Sync for SessionRunner {}

impl SessionRunner {
    pub fn new(
        conn: Arc<dyn SwitchConnection>,
        topology: Arc<Topology>,
        listener: Arc<dyn EventListener>,
        log: Logger,
    ) -> Arc<Self> {
        let (event_tx, event_rx) = channel();
        let device = Device::new(Arc::clone(&conn), &topology, log.clone());
        Arc::new(Self {
            conn,
            device,
            topology,
            listener,
            event_tx,
            event_rx,
            factory: RwLock::new(None),
            state: Mutex::new(FsmStateKind::Opened),
            running: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            up_announced: AtomicBool::new(false),
            log,
        })
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn state(&self) -> FsmStateKind {
        *lock!(self.state)
    }

    /// Flag the session for teardown. The runner notices at its next
    /// receive step, finishes the message in hand, and closes.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    fn unit(&self) -> String {
        self.device.id()
    }

    /// Run the state machine to completion. Returns when the session
    /// closes.
    pub fn start(self: &Arc<Self>) {
        if self
            .running
            .compare_exchange(
                false,
                true,
                Ordering::SeqCst,
                Ordering::Relaxed,
            )
            .is_err()
        {
            return;
        }
        if let Err(e) = self.conn.start_recv(self.event_tx.clone()) {
            err!(self.log, self.unit(), "start receive loop: {e}");
            return;
        }

        let mut current = FsmState::Opened;
        loop {
            let previous = current.kind();
            current = match current {
                FsmState::Opened => self.fsm_opened(),
                FsmState::HelloSent => self.fsm_hello_sent(),
                FsmState::Featured => self.fsm_featured(),
                FsmState::Described => self.fsm_described(),
                FsmState::PortsQueried => self.fsm_ports_queried(),
                FsmState::Configured => self.fsm_configured(),
                FsmState::Established => self.fsm_established(),
                FsmState::Closed => {
                    self.on_closed();
                    return;
                }
            };
            if current.kind() != previous {
                inf!(
                    self.log,
                    self.unit(),
                    "fsm transition {previous} -> {}",
                    current.kind()
                );
                *lock!(self.state) = current.kind();
            }
        }
    }

    fn recv_step(&self, deadline: Option<Instant>) -> Recv {
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return Recv::ShuttingDown;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Recv::TimedOut;
                }
            }
            match self.event_rx.recv_timeout(RESOLUTION) {
                Ok(ev) => return Recv::Event(ev),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Recv::Event(FsmEvent::ConnectionClosed)
                }
            }
        }
    }

    fn factory(&self) -> Option<Arc<dyn Factory>> {
        read_lock!(self.factory).clone()
    }

    fn decode(&self, header: &Header, body: &[u8]) -> Option<Message> {
        let Some(factory) = self.factory() else {
            wrn!(
                self.log,
                self.unit(),
                "frame type {} before version negotiation",
                header.msg_type
            );
            return None;
        };
        match factory.decode(header, body) {
            Ok(msg) => Some(msg),
            Err(e) => {
                err!(self.log, self.unit(), "decode: {e}");
                None
            }
        }
    }

    /// Replies the session owes regardless of state. Returns the message
    /// back when the caller should keep dispatching it.
    fn handle_common(&self, msg: Message) -> Option<Message> {
        match msg {
            Message::EchoRequest(data) => {
                if let Err(e) =
                    self.device.send_message(&Message::EchoReply(data))
                {
                    wrn!(self.log, self.unit(), "echo reply: {e}");
                }
                None
            }
            Message::EchoReply(_) => None,
            Message::Hello(_) => None,
            Message::Unsupported { msg_type } => {
                dbg!(
                    self.log,
                    self.unit(),
                    "skipping unsupported frame type {msg_type}"
                );
                None
            }
            other => Some(other),
        }
    }

    /// Opened: send HELLO advertising everything we speak, newest version
    /// in the header.
    fn fsm_opened(&self) -> FsmState {
        let factory = factory_for(OFP13_VERSION).expect("1.3 factory");
        let hello = Message::Hello(Hello {
            versions: SUPPORTED_VERSIONS.to_vec(),
        });
        let frame = match factory.encode(self.device.next_xid(), &hello) {
            Ok(frame) => frame,
            Err(e) => {
                err!(self.log, self.unit(), "encode hello: {e}");
                return FsmState::Closed;
            }
        };
        if let Err(e) = self.conn.send(&frame) {
            err!(self.log, self.unit(), "send hello: {e}");
            return FsmState::Closed;
        }
        FsmState::HelloSent
    }

    /// HelloSent: negotiate the version off the peer HELLO, then wait for
    /// FEATURES_REPLY to name the device.
    fn fsm_hello_sent(&self) -> FsmState {
        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        loop {
            let (header, body) = match self.recv_step(Some(deadline)) {
                Recv::Event(FsmEvent::Frame(h, b)) => (h, b),
                Recv::Event(FsmEvent::ConnectionClosed) => {
                    return FsmState::Closed
                }
                Recv::TimedOut => {
                    err!(self.log, self.unit(), "handshake timed out");
                    return FsmState::Closed;
                }
                Recv::ShuttingDown => return FsmState::Closed,
            };

            if self.factory().is_none() {
                // First frame must be the peer's HELLO. HELLO is message
                // type 0 in every protocol version.
                if header.msg_type != 0 {
                    err!(
                        self.log,
                        self.unit(),
                        "frame type {} before hello",
                        header.msg_type
                    );
                    return FsmState::Closed;
                }
                let hello = match decode_hello(&header, &body) {
                    Ok(h) => h,
                    Err(e) => {
                        err!(self.log, self.unit(), "peer hello: {e}");
                        return FsmState::Closed;
                    }
                };
                let factory = match negotiate(&hello) {
                    Ok(f) => f,
                    Err(e) => {
                        err!(self.log, self.unit(), "negotiation: {e}");
                        return FsmState::Closed;
                    }
                };
                dbg!(
                    self.log,
                    self.unit(),
                    "negotiated version {:#04x}",
                    factory.version()
                );
                *write_lock!(self.factory) = Some(Arc::clone(&factory));
                self.device.set_factory(factory);
                if let Err(e) =
                    self.device.send_message(&Message::FeaturesRequest)
                {
                    err!(self.log, self.unit(), "features request: {e}");
                    return FsmState::Closed;
                }
                continue;
            }

            let Some(msg) = self.decode(&header, &body) else {
                return FsmState::Closed;
            };
            match self.handle_common(msg) {
                Some(Message::FeaturesReply(features)) => {
                    self.device.set_features(Features {
                        dpid: features.dpid,
                        n_buffers: features.n_buffers,
                        n_tables: features.n_tables,
                    });
                    self.device.set_dpid(features.dpid);
                    for desc in features.ports {
                        self.device.update_port(desc);
                    }
                    self.topology
                        .add_device(features.dpid, Arc::clone(&self.device));
                    if let Err(e) =
                        self.device.send_message(&Message::DescRequest)
                    {
                        err!(
                            self.log,
                            self.unit(),
                            "description request: {e}"
                        );
                        return FsmState::Closed;
                    }
                    return FsmState::Featured;
                }
                Some(Message::Error(e)) => {
                    err!(
                        self.log,
                        self.unit(),
                        "switch error {}/{} during handshake",
                        e.err_type,
                        e.code
                    );
                    return FsmState::Closed;
                }
                Some(other) => {
                    dbg!(
                        self.log,
                        self.unit(),
                        "ignoring {} before features",
                        other.title()
                    );
                }
                None => {}
            }
        }
    }

    /// Featured: record descriptions.
    fn fsm_featured(&self) -> FsmState {
        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        loop {
            match self.wait_message(deadline) {
                Ok(Message::DescReply(desc)) => {
                    self.device.set_descriptions(desc);
                    return FsmState::Described;
                }
                Ok(Message::Error(e)) => {
                    err!(
                        self.log,
                        self.unit(),
                        "switch error {}/{} awaiting descriptions",
                        e.err_type,
                        e.code
                    );
                    return FsmState::Closed;
                }
                Ok(other) => {
                    dbg!(
                        self.log,
                        self.unit(),
                        "ignoring {} awaiting descriptions",
                        other.title()
                    );
                }
                Err(state) => return state,
            }
        }
    }

    /// Described: 1.3 asks for the port inventory; 1.0 already delivered
    /// it inside FEATURES_REPLY.
    fn fsm_described(&self) -> FsmState {
        let version =
            self.factory().map(|f| f.version()).unwrap_or(OFP10_VERSION);
        if version == OFP10_VERSION {
            return FsmState::PortsQueried;
        }
        if let Err(e) = self.device.send_message(&Message::PortDescRequest) {
            err!(self.log, self.unit(), "port description request: {e}");
            return FsmState::Closed;
        }
        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        loop {
            match self.wait_message(deadline) {
                Ok(Message::PortDescReply(ports)) => {
                    for desc in ports {
                        self.device.update_port(desc);
                    }
                    return FsmState::PortsQueried;
                }
                Ok(Message::Error(e)) => {
                    err!(
                        self.log,
                        self.unit(),
                        "switch error {}/{} awaiting ports",
                        e.err_type,
                        e.code
                    );
                    return FsmState::Closed;
                }
                Ok(other) => {
                    dbg!(
                        self.log,
                        self.unit(),
                        "ignoring {} awaiting ports",
                        other.title()
                    );
                }
                Err(state) => return state,
            }
        }
    }

    /// PortsQueried: choose the flow table, lay down the baseline rules,
    /// and barrier so nothing forwards until they are in place.
    fn fsm_ports_queried(&self) -> FsmState {
        let version =
            self.factory().map(|f| f.version()).unwrap_or(OFP10_VERSION);
        if version == OFP10_VERSION {
            // A single implicit table.
            return self.configure_tables(0, false);
        }

        if let Err(e) =
            self.device.send_message(&Message::TableFeaturesRequest)
        {
            err!(self.log, self.unit(), "table features request: {e}");
            return FsmState::Closed;
        }
        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        loop {
            match self.wait_message(deadline) {
                Ok(Message::TableFeaturesReply(tables)) => {
                    return match pick_flow_table(&tables) {
                        Some(table) => self.configure_tables(table, false),
                        None => {
                            wrn!(
                                self.log,
                                self.unit(),
                                "no table advertises the required \
                                 capabilities, falling back to table 0"
                            );
                            self.configure_tables(0, true)
                        }
                    };
                }
                Ok(Message::Error(e)) => {
                    // The switch cannot answer capability probes; try
                    // table 0 and keep 1 in reserve.
                    dbg!(
                        self.log,
                        self.unit(),
                        "table probing unavailable ({}/{})",
                        e.err_type,
                        e.code
                    );
                    return self.configure_tables(0, true);
                }
                Ok(other) => {
                    dbg!(
                        self.log,
                        self.unit(),
                        "ignoring {} awaiting table features",
                        other.title()
                    );
                }
                Err(state) => return state,
            }
        }
    }

    /// Install the baseline rules around `table` and wait for the
    /// barrier. With `retry` set, an error from the switch shifts the
    /// whole arrangement to table 1 once.
    fn configure_tables(&self, table: u8, retry: bool) -> FsmState {
        self.device.set_flow_table_id(table);
        let n_tables = self.device.features().n_tables;
        for t in (table + 1)..n_tables {
            if let Err(e) = install_baseline_drop(&self.device, t) {
                err!(self.log, self.unit(), "baseline drop table {t}: {e}");
                return FsmState::Closed;
            }
        }
        if let Err(e) = install_table_miss(&self.device, table) {
            err!(self.log, self.unit(), "table miss rule: {e}");
            return FsmState::Closed;
        }
        if let Err(e) = send_barrier(&self.device) {
            err!(self.log, self.unit(), "barrier: {e}");
            return FsmState::Closed;
        }
        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        loop {
            match self.wait_message(deadline) {
                Ok(Message::BarrierReply) => {
                    inf!(
                        self.log,
                        self.unit(),
                        "flow table {table} configured"
                    );
                    return FsmState::Configured;
                }
                Ok(Message::Error(e)) if retry && table == 0 => {
                    wrn!(
                        self.log,
                        self.unit(),
                        "table 0 rejected the baseline ({}/{}), \
                         retrying on table 1",
                        e.err_type,
                        e.code
                    );
                    return self.configure_tables(1, false);
                }
                Ok(Message::Error(e)) => {
                    err!(
                        self.log,
                        self.unit(),
                        "switch error {}/{} configuring tables",
                        e.err_type,
                        e.code
                    );
                    return FsmState::Closed;
                }
                Ok(other) => {
                    dbg!(
                        self.log,
                        self.unit(),
                        "ignoring {} awaiting barrier",
                        other.title()
                    );
                }
                Err(state) => return state,
            }
        }
    }

    /// Configured: the device is usable; announce it once.
    fn fsm_configured(&self) -> FsmState {
        self.up_announced.store(true, Ordering::Release);
        self.listener
            .on_device_up(self.topology.as_ref(), &self.device);
        FsmState::Established
    }

    /// Established: multiplex the steady event stream.
    fn fsm_established(&self) -> FsmState {
        loop {
            let (header, body) = match self.recv_step(None) {
                Recv::Event(FsmEvent::Frame(h, b)) => (h, b),
                Recv::Event(FsmEvent::ConnectionClosed) => {
                    return FsmState::Closed
                }
                Recv::TimedOut => continue,
                Recv::ShuttingDown => return FsmState::Closed,
            };
            let Some(msg) = self.decode(&header, &body) else {
                return FsmState::Closed;
            };
            match self.handle_common(msg) {
                Some(Message::PacketIn(pi)) => self.handle_packet_in(pi),
                Some(Message::PortStatus(ps)) => {
                    self.handle_port_status(ps)
                }
                Some(Message::FlowRemoved(fr)) => {
                    dbg!(
                        self.log,
                        self.unit(),
                        "flow removed: table {} priority {} reason {}",
                        fr.table_id,
                        fr.priority,
                        fr.reason
                    );
                }
                Some(Message::Error(e)) => {
                    wrn!(
                        self.log,
                        self.unit(),
                        "switch error {}/{}",
                        e.err_type,
                        e.code
                    );
                }
                Some(Message::BarrierReply) => {}
                Some(other) => {
                    dbg!(
                        self.log,
                        self.unit(),
                        "ignoring {}",
                        other.title()
                    );
                }
                None => {}
            }
        }
    }

    /// Wait for the next decodable message within the handshake deadline.
    /// Common replies are handled inline.
    fn wait_message(&self, deadline: Instant) -> Result<Message, FsmState> {
        loop {
            match self.recv_step(Some(deadline)) {
                Recv::Event(FsmEvent::Frame(h, b)) => {
                    let Some(msg) = self.decode(&h, &b) else {
                        return Err(FsmState::Closed);
                    };
                    if let Some(msg) = self.handle_common(msg) {
                        return Ok(msg);
                    }
                }
                Recv::Event(FsmEvent::ConnectionClosed) => {
                    return Err(FsmState::Closed)
                }
                Recv::TimedOut => {
                    err!(self.log, self.unit(), "handshake timed out");
                    return Err(FsmState::Closed);
                }
                Recv::ShuttingDown => return Err(FsmState::Closed),
            }
        }
    }

    fn handle_packet_in(&self, pi: PacketIn) {
        let eth = match EthernetFrame::from_bytes(&pi.payload) {
            Ok(eth) => eth,
            Err(e) => {
                wrn!(self.log, self.unit(), "packet in: {e}");
                return;
            }
        };

        // Link discovery traffic belongs to the topology and never
        // reaches the app chain.
        if eth.ethertype == EtherType::LLDP {
            match LldpProbe::from_bytes(&eth.payload) {
                Ok(probe) => {
                    if let Some(dpid) = self.device.dpid() {
                        self.topology.process_lldp(dpid, pi.in_port, &probe);
                    }
                }
                Err(e) => {
                    trc!(self.log, self.unit(), "foreign lldp dropped: {e}");
                }
            }
            return;
        }

        let Some(port) = self.device.port(pi.in_port) else {
            dbg!(
                self.log,
                self.unit(),
                "packet in on unknown port {}",
                pi.in_port
            );
            return;
        };
        let mut eth = eth;
        self.listener
            .on_packet_in(self.topology.as_ref(), &port, &mut eth);
    }

    fn handle_port_status(&self, ps: PortStatus) {
        let number = ps.desc.number;
        match ps.reason {
            PortChange::Add | PortChange::Modify => {
                let (port, _) = self.device.update_port(ps.desc);
                if port.is_up() {
                    self.listener.on_port_up(self.topology.as_ref(), &port);
                } else {
                    self.listener
                        .on_port_down(self.topology.as_ref(), &port);
                }
            }
            PortChange::Delete => {
                let Some(port) = self.device.remove_port(number) else {
                    return;
                };
                if let Some(dpid) = self.device.dpid() {
                    self.topology.remove_port(dpid, number);
                }
                self.listener.on_port_down(self.topology.as_ref(), &port);
            }
        }
    }

    /// Idempotent teardown: close the transport, pull the device out of
    /// the topology, and announce the loss if the device had been
    /// announced.
    fn on_closed(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        inf!(self.log, self.unit(), "session closed");
        self.conn.close();
        if let Some(dpid) = self.device.dpid() {
            self.topology.remove_device(dpid);
        }
        if self.up_announced.load(Ordering::Acquire) {
            self.listener
                .on_device_down(self.topology.as_ref(), &self.device);
        }
        *lock!(self.state) = FsmStateKind::Closed;
    }
}

/// The lowest-numbered table advertising what forwarding needs: matching
/// on in-port and the Ethernet triple, applying an output action.
fn pick_flow_table(tables: &[TableFeature]) -> Option<u8> {
    let mut capable: Vec<&TableFeature> = tables
        .iter()
        .filter(|t| {
            [oxm::IN_PORT, oxm::ETH_SRC, oxm::ETH_DST, oxm::ETH_TYPE]
                .iter()
                .all(|f| t.matches.contains(f))
                && t.apply_actions.contains(&action_type::OUTPUT)
        })
        .collect();
    capable.sort_by_key(|t| t.table_id);
    capable.first().map(|t| t.table_id)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::connection::test::{switch_conn_pair, TestSwitch};
    use crate::device::Port;
    use crate::finder::Finder;
    use crate::topology::Topology;
    use of_common::net::MacAddr;
    use openflow::messages::{
        FlowModCommand, OutputPort, PortDesc, SwitchDescription,
        SwitchFeatures,
    };
    use openflow::messages::Action;
    use std::sync::atomic::AtomicUsize;
    use std::thread::{sleep, spawn, JoinHandle};

    #[derive(Default)]
    pub struct RecordingListener {
        pub device_up: AtomicUsize,
        pub device_down: AtomicUsize,
        pub port_up: AtomicUsize,
        pub port_down: AtomicUsize,
        pub packet_in: AtomicUsize,
    }

    impl EventListener for RecordingListener {
        fn on_device_up(&self, _: &dyn Finder, _: &Arc<Device>) {
            self.device_up.fetch_add(1, Ordering::Relaxed);
        }
        fn on_device_down(&self, _: &dyn Finder, _: &Arc<Device>) {
            self.device_down.fetch_add(1, Ordering::Relaxed);
        }
        fn on_port_up(&self, _: &dyn Finder, _: &Arc<Port>) {
            self.port_up.fetch_add(1, Ordering::Relaxed);
        }
        fn on_port_down(&self, _: &dyn Finder, _: &Arc<Port>) {
            self.port_down.fetch_add(1, Ordering::Relaxed);
        }
        fn on_packet_in(
            &self,
            _: &dyn Finder,
            _: &Arc<Port>,
            _: &mut EthernetFrame,
        ) {
            self.packet_in.fetch_add(1, Ordering::Relaxed);
        }
        fn on_topology_change(&self, _: &dyn Finder) {}
    }

    struct Harness {
        session: Arc<SessionRunner>,
        topology: Arc<Topology>,
        listener: Arc<RecordingListener>,
        runner: JoinHandle<()>,
        raw: crate::bidi::Endpoint<Vec<u8>>,
    }

    fn start_session() -> Harness {
        let log = of_common::log::init_logger();
        let topology = Topology::new(log.clone());
        let listener = Arc::new(RecordingListener::default());
        let (conn, raw) =
            switch_conn_pair("127.0.0.1:9653".parse().unwrap());
        let session = SessionRunner::new(
            conn,
            Arc::clone(&topology),
            listener.clone(),
            log,
        );
        let runner = {
            let session = Arc::clone(&session);
            spawn(move || session.start())
        };
        Harness {
            session,
            topology,
            listener,
            runner,
            raw,
        }
    }

    fn wait_until(what: &str, mut pred: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !pred() {
            if Instant::now() > deadline {
                panic!("timed out waiting for {what}");
            }
            sleep(Duration::from_millis(10));
        }
    }

    fn port_desc(number: u32) -> PortDesc {
        PortDesc {
            number,
            hw_addr: MacAddr([2, 0, 0, 0, 0, number as u8]),
            name: format!("eth{number}"),
            admin_down: false,
            link_down: false,
        }
    }

    fn capable_table(table_id: u8) -> TableFeature {
        TableFeature {
            table_id,
            name: format!("table{table_id}"),
            matches: vec![
                oxm::IN_PORT,
                oxm::ETH_DST,
                oxm::ETH_SRC,
                oxm::ETH_TYPE,
                oxm::IPV4_DST,
            ],
            apply_actions: vec![
                action_type::OUTPUT,
                action_type::SET_FIELD,
            ],
        }
    }

    /// Drive a 1.3 switch through the whole handshake; the capable table
    /// is table 1, so the baseline drop lands on table 2.
    fn handshake_13(switch: &TestSwitch) {
        let Message::Hello(hello) = switch.recv() else {
            panic!("expected hello first");
        };
        assert_eq!(hello.versions, SUPPORTED_VERSIONS);
        switch.send(
            1,
            &Message::Hello(Hello {
                versions: vec![OFP10_VERSION, OFP13_VERSION],
            }),
        );

        assert_eq!(switch.recv(), Message::FeaturesRequest);
        switch.send(
            2,
            &Message::FeaturesReply(SwitchFeatures {
                dpid: 5,
                n_buffers: 256,
                n_tables: 3,
                ports: Vec::new(),
            }),
        );

        assert_eq!(switch.recv(), Message::DescRequest);
        switch.send(
            3,
            &Message::DescReply(SwitchDescription {
                manufacturer: "test vendor".into(),
                hardware: "soft switch".into(),
                software: "1.0".into(),
                serial: "42".into(),
                description: "unit test switch".into(),
            }),
        );

        assert_eq!(switch.recv(), Message::PortDescRequest);
        switch.send(
            4,
            &Message::PortDescReply(vec![port_desc(1), port_desc(2)]),
        );

        assert_eq!(switch.recv(), Message::TableFeaturesRequest);
        switch.send(
            5,
            &Message::TableFeaturesReply(vec![
                TableFeature {
                    table_id: 0,
                    name: "acl".into(),
                    matches: vec![oxm::ETH_TYPE],
                    apply_actions: Vec::new(),
                },
                capable_table(1),
            ]),
        );

        // Baseline drop above the chosen table, then the miss rule on it.
        let Message::FlowMod(drop) = switch.recv() else {
            panic!("expected baseline drop");
        };
        assert_eq!(drop.table_id, 2);
        assert!(drop.actions.is_empty());
        let Message::FlowMod(miss) = switch.recv() else {
            panic!("expected table miss rule");
        };
        assert_eq!(miss.table_id, 1);
        assert_eq!(miss.priority, 0);
        assert_eq!(
            miss.actions,
            vec![Action::Output(OutputPort::Controller)]
        );
        assert_eq!(switch.recv(), Message::BarrierRequest);
        switch.send(6, &Message::BarrierReply);
    }

    #[test]
    fn of13_handshake_reaches_established() {
        let h = start_session();
        let factory = factory_for(OFP13_VERSION).unwrap();
        let switch = TestSwitch::new(h.raw, factory);

        handshake_13(&switch);
        wait_until("established", || {
            h.session.state() == FsmStateKind::Established
        });

        assert!(h.session.device().is_valid());
        assert_eq!(h.session.device().flow_table_id(), 1);
        assert!(h.topology.device(5).is_some());
        assert_eq!(h.listener.device_up.load(Ordering::Relaxed), 1);
        assert_eq!(
            h.session.device().descriptions().manufacturer,
            "test vendor"
        );
        assert_eq!(h.session.device().ports().len(), 2);

        // Echo is answered in-band.
        switch.send(7, &Message::EchoRequest(b"keepalive".to_vec()));
        assert_eq!(
            switch.recv(),
            Message::EchoReply(b"keepalive".to_vec())
        );

        // A data frame reaches the app chain.
        let frame = EthernetFrame::new(
            MacAddr::BROADCAST,
            MacAddr([0xaa; 6]),
            EtherType::ARP,
            vec![0; 28],
        );
        switch.send(
            8,
            &Message::PacketIn(PacketIn {
                buffer_id: None,
                in_port: 1,
                table_id: 1,
                reason: 0,
                payload: frame.to_bytes(),
            }),
        );
        wait_until("packet in dispatch", || {
            h.listener.packet_in.load(Ordering::Relaxed) == 1
        });

        // Clean shutdown deregisters and announces the loss once.
        h.session.shutdown();
        h.runner.join().unwrap();
        assert!(h.topology.device(5).is_none());
        assert_eq!(h.listener.device_down.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn lldp_is_intercepted_before_the_apps() {
        let h = start_session();
        let factory = factory_for(OFP13_VERSION).unwrap();
        let switch = TestSwitch::new(h.raw, factory);
        handshake_13(&switch);
        wait_until("established", || {
            h.session.state() == FsmStateKind::Established
        });

        let probe = LldpProbe::new(77, 4);
        let frame = EthernetFrame::new(
            MacAddr::LLDP_MULTICAST,
            MacAddr([2, 0, 0, 0, 0, 1]),
            EtherType::LLDP,
            probe.to_bytes(),
        );
        switch.send(
            9,
            &Message::PacketIn(PacketIn {
                buffer_id: None,
                in_port: 1,
                table_id: 1,
                reason: 0,
                payload: frame.to_bytes(),
            }),
        );

        // The peer dpid is unknown so no link registers, and the frame
        // must never reach the chain.
        switch.send(10, &Message::EchoRequest(b"sync".to_vec()));
        assert_eq!(switch.recv(), Message::EchoReply(b"sync".to_vec()));
        assert_eq!(h.listener.packet_in.load(Ordering::Relaxed), 0);
        assert!(!h.topology.is_inter_switch(5, 1));

        h.session.shutdown();
        h.runner.join().unwrap();
    }

    #[test]
    fn port_status_fires_port_events() {
        let h = start_session();
        let factory = factory_for(OFP13_VERSION).unwrap();
        let switch = TestSwitch::new(h.raw, factory);
        handshake_13(&switch);
        wait_until("established", || {
            h.session.state() == FsmStateKind::Established
        });

        switch.send(
            11,
            &Message::PortStatus(PortStatus {
                reason: PortChange::Add,
                desc: port_desc(3),
            }),
        );
        wait_until("port add", || {
            h.listener.port_up.load(Ordering::Relaxed) == 1
        });
        assert!(h.session.device().port(3).is_some());

        let mut down = port_desc(3);
        down.link_down = true;
        switch.send(
            12,
            &Message::PortStatus(PortStatus {
                reason: PortChange::Modify,
                desc: down,
            }),
        );
        wait_until("port down", || {
            h.listener.port_down.load(Ordering::Relaxed) == 1
        });

        switch.send(
            13,
            &Message::PortStatus(PortStatus {
                reason: PortChange::Delete,
                desc: port_desc(3),
            }),
        );
        wait_until("port delete", || {
            h.session.device().port(3).is_none()
        });

        h.session.shutdown();
        h.runner.join().unwrap();
    }

    #[test]
    fn of10_handshake_takes_ports_from_features() {
        let h = start_session();
        let factory = factory_for(OFP10_VERSION).unwrap();
        let switch = TestSwitch::new(h.raw, factory);

        // Our hello goes out as 1.3 with a bitmap; a 1.0 peer answers
        // with a bare hello and the session downgrades.
        let first = switch.ep.rx.recv_timeout(Duration::from_secs(5))
            .expect("hello");
        let header = Header::from_bytes(&first).unwrap();
        assert_eq!(header.version, OFP13_VERSION);
        assert_eq!(header.msg_type, 0);
        switch.send(1, &Message::Hello(Hello { versions: vec![] }));

        assert_eq!(switch.recv(), Message::FeaturesRequest);
        switch.send(
            2,
            &Message::FeaturesReply(SwitchFeatures {
                dpid: 9,
                n_buffers: 64,
                n_tables: 1,
                ports: vec![port_desc(1), port_desc(2)],
            }),
        );

        assert_eq!(switch.recv(), Message::DescRequest);
        switch.send(3, &Message::DescReply(SwitchDescription::default()));

        // No port or table query on 1.0: straight to the miss rule on
        // table 0.
        let Message::FlowMod(miss) = switch.recv() else {
            panic!("expected miss rule");
        };
        assert_eq!(miss.command, FlowModCommand::Add);
        assert_eq!(miss.priority, 0);
        assert_eq!(switch.recv(), Message::BarrierRequest);
        switch.send(4, &Message::BarrierReply);

        wait_until("established", || {
            h.session.state() == FsmStateKind::Established
        });
        assert_eq!(h.session.device().flow_table_id(), 0);
        assert_eq!(h.session.device().ports().len(), 2);
        assert!(h.topology.device(9).is_some());

        h.session.shutdown();
        h.runner.join().unwrap();
    }

    #[test]
    fn no_common_version_closes_the_session() {
        let h = start_session();
        // Hand-craft a hello advertising only version 0x05.
        let mut frame =
            Header::new(0x05, 0, 8, 1).to_bytes().to_vec();
        frame.extend_from_slice(&1u16.to_be_bytes()); // versionbitmap
        frame.extend_from_slice(&8u16.to_be_bytes());
        frame.extend_from_slice(&(1u32 << 5).to_be_bytes());
        // Swallow our own hello first.
        let _ = h.raw.rx.recv_timeout(Duration::from_secs(5)).unwrap();
        h.raw.tx.send(frame).unwrap();

        h.runner.join().unwrap();
        assert_eq!(h.session.state(), FsmStateKind::Closed);
        assert!(!h.session.device().is_valid());
        assert_eq!(h.listener.device_up.load(Ordering::Relaxed), 0);
        assert_eq!(h.listener.device_down.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn table_probe_error_falls_back_to_table_zero() {
        let h = start_session();
        let factory = factory_for(OFP13_VERSION).unwrap();
        let switch = TestSwitch::new(h.raw, factory);

        let Message::Hello(_) = switch.recv() else {
            panic!("expected hello");
        };
        switch.send(
            1,
            &Message::Hello(Hello {
                versions: vec![OFP13_VERSION],
            }),
        );
        assert_eq!(switch.recv(), Message::FeaturesRequest);
        switch.send(
            2,
            &Message::FeaturesReply(SwitchFeatures {
                dpid: 6,
                n_buffers: 0,
                n_tables: 2,
                ports: Vec::new(),
            }),
        );
        assert_eq!(switch.recv(), Message::DescRequest);
        switch.send(3, &Message::DescReply(SwitchDescription::default()));
        assert_eq!(switch.recv(), Message::PortDescRequest);
        switch.send(4, &Message::PortDescReply(vec![port_desc(1)]));

        assert_eq!(switch.recv(), Message::TableFeaturesRequest);
        switch.send(
            5,
            &Message::Error(openflow::messages::ErrorMessage {
                err_type: 1, // bad request
                code: 5,     // bad multipart type
                data: Vec::new(),
            }),
        );

        // Fallback: drop above table 0, miss on table 0.
        let Message::FlowMod(drop) = switch.recv() else {
            panic!("expected baseline drop");
        };
        assert_eq!(drop.table_id, 1);
        let Message::FlowMod(miss) = switch.recv() else {
            panic!("expected miss rule");
        };
        assert_eq!(miss.table_id, 0);
        assert_eq!(switch.recv(), Message::BarrierRequest);
        switch.send(6, &Message::BarrierReply);

        wait_until("established", || {
            h.session.state() == FsmStateKind::Established
        });
        assert_eq!(h.session.device().flow_table_id(), 0);

        h.session.shutdown();
        h.runner.join().unwrap();
    }
}
