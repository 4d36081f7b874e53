// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accepts switch connections and fans each one out to its own session
//! thread. Shutdown is cooperative: the flag is observed by the accept
//! loop, the sweeper, and every session.

use crate::connection::{SwitchConnection, SwitchListener};
use crate::finder::{EventListener, Finder};
use crate::flow::remove_all_flows;
use crate::session::{FsmStateKind, SessionRunner};
use crate::topology::Topology;
use crate::{err, inf, wrn};
use of_common::lock;
use slog::Logger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::Builder;

const UNIT: &str = "controller";

pub struct Controller {
    topology: Arc<Topology>,
    listener: Arc<dyn EventListener>,
    sessions: Mutex<Vec<Arc<SessionRunner>>>,
    shutdown: Arc<AtomicBool>,
    log: Logger,
}

impl Controller {
    pub fn new(
        topology: Arc<Topology>,
        listener: Arc<dyn EventListener>,
        log: Logger,
    ) -> Arc<Self> {
        Arc::new(Self {
            topology,
            listener,
            sessions: Mutex::new(Vec::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            log,
        })
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Accept until shutdown. Each connection gets a session thread.
    pub fn run<L: SwitchListener>(&self, listener: L) {
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return;
            }
            match listener.accept() {
                Ok(conn) => {
                    inf!(
                        self.log,
                        UNIT,
                        "connection from {}",
                        conn.peer()
                    );
                    self.add_connection(conn);
                }
                Err(e) => {
                    if self.shutdown.load(Ordering::Acquire) {
                        return;
                    }
                    err!(self.log, UNIT, "accept: {e}");
                }
            }
        }
    }

    pub fn add_connection(
        &self,
        conn: Arc<dyn SwitchConnection>,
    ) -> Arc<SessionRunner> {
        let session = SessionRunner::new(
            conn,
            Arc::clone(&self.topology),
            Arc::clone(&self.listener),
            self.log.clone(),
        );
        {
            let mut sessions = lock!(self.sessions);
            // Closed sessions have fully deregistered; drop our handles.
            sessions.retain(|s| s.state() != FsmStateKind::Closed);
            sessions.push(Arc::clone(&session));
        }
        let runner = Arc::clone(&session);
        Builder::new()
            .name(format!("session-{}", runner.device().id()))
            .spawn(move || runner.start())
            .expect("spawn session thread");
        session
    }

    /// Flag every running piece for teardown. Sessions finish the message
    /// in hand, stop writing, and deregister themselves.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        for session in lock!(self.sessions).iter() {
            session.shutdown();
        }
    }

    /// Issue a delete-all-flows to every connected device. Failures are
    /// logged and skipped; a dead session cleans itself up.
    pub fn clear_all_flows(&self) {
        for device in self.topology.devices() {
            if let Err(e) = remove_all_flows(&device) {
                wrn!(
                    self.log,
                    UNIT,
                    "flow clear on {} failed: {e}",
                    device.id()
                );
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::apps::l2switch::test::add_device;
    use crate::apps::AppChain;
    use crate::connection::test::switch_conn_pair;
    use openflow::messages::{FlowModCommand, Message};
    use openflow::HEADER_LEN;
    use std::time::Duration;

    fn test_controller() -> Arc<Controller> {
        let log = of_common::log::init_logger();
        let topology = Topology::new(log.clone());
        let chain = Arc::new(AppChain::new(log.clone()));
        Controller::new(topology, chain, log)
    }

    #[test]
    fn clear_all_flows_reaches_every_device() {
        let controller = test_controller();
        let (_d1, s1) = add_device(controller.topology(), 1, &[1]);
        let (_d2, s2) = add_device(controller.topology(), 2, &[1]);

        controller.clear_all_flows();
        for switch in [&s1, &s2] {
            let Message::FlowMod(fm) = switch.recv() else {
                panic!("expected flow mod");
            };
            assert_eq!(fm.command, FlowModCommand::DeleteAll);
        }
    }

    #[test]
    fn connections_get_sessions_and_shut_down() {
        let controller = test_controller();
        let (conn, raw) =
            switch_conn_pair("127.0.0.1:9001".parse().unwrap());
        let session = controller.add_connection(conn);

        // The session thread opens with a HELLO.
        let frame =
            raw.rx.recv_timeout(Duration::from_secs(5)).expect("hello");
        assert!(frame.len() >= HEADER_LEN);
        assert_eq!(frame[1], 0);

        controller.shutdown();
        let deadline =
            std::time::Instant::now() + Duration::from_secs(5);
        while session.state() != FsmStateKind::Closed {
            assert!(
                std::time::Instant::now() < deadline,
                "session did not close"
            );
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}
