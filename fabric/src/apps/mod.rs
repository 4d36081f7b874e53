// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The northbound app chain. Processors are walked head-to-tail in
//! configured order; each callback decides whether the event keeps
//! flowing. Default implementations forward, so a processor only writes
//! the callbacks it cares about.

mod firewall;
pub(crate) mod l2switch;
mod router;

pub use firewall::Firewall;
pub use l2switch::L2Switch;
pub use router::Router;

use crate::device::{Device, Port};
use crate::error::Error;
use crate::finder::{EventListener, Finder};
use crate::{err, wrn};
use packet::EthernetFrame;
use slog::Logger;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// What a processor wants done with the event it was just shown.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Hand the event to the next processor in the chain.
    Forward,
    /// The event is fully handled; stop the walk.
    Consumed,
}

pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-time setup after configuration, before any events.
    fn init(&self) -> Result<(), Error> {
        Ok(())
    }

    fn on_packet_in(
        &self,
        _finder: &dyn Finder,
        _ingress: &Arc<Port>,
        _eth: &mut EthernetFrame,
    ) -> Result<Disposition, Error> {
        Ok(Disposition::Forward)
    }

    fn on_port_up(
        &self,
        _finder: &dyn Finder,
        _port: &Arc<Port>,
    ) -> Result<Disposition, Error> {
        Ok(Disposition::Forward)
    }

    fn on_port_down(
        &self,
        _finder: &dyn Finder,
        _port: &Arc<Port>,
    ) -> Result<Disposition, Error> {
        Ok(Disposition::Forward)
    }

    fn on_device_up(
        &self,
        _finder: &dyn Finder,
        _device: &Arc<Device>,
    ) -> Result<Disposition, Error> {
        Ok(Disposition::Forward)
    }

    fn on_device_down(
        &self,
        _finder: &dyn Finder,
        _device: &Arc<Device>,
    ) -> Result<Disposition, Error> {
        Ok(Disposition::Forward)
    }

    fn on_topology_change(
        &self,
        _finder: &dyn Finder,
    ) -> Result<Disposition, Error> {
        Ok(Disposition::Forward)
    }
}

/// The ordered pipeline of processors. Implements [`EventListener`] so
/// sessions and the topology talk to the chain head without knowing what
/// is behind it.
pub struct AppChain {
    apps: Vec<Arc<dyn Processor>>,
    log: Logger,
}

impl AppChain {
    pub fn new(log: Logger) -> Self {
        Self {
            apps: Vec::new(),
            log,
        }
    }

    /// Append a processor and run its init hook.
    pub fn register(&mut self, app: Arc<dyn Processor>) -> Result<(), Error> {
        app.init()?;
        self.apps.push(app);
        Ok(())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.apps.iter().map(|a| a.name()).collect()
    }

    /// Walk the chain until a processor consumes the event. A processor
    /// error is logged and the walk continues, unless the error is fatal.
    fn walk(
        &self,
        event: &str,
        mut f: impl FnMut(&dyn Processor) -> Result<Disposition, Error>,
    ) {
        for app in &self.apps {
            match f(app.as_ref()) {
                Ok(Disposition::Forward) => continue,
                Ok(Disposition::Consumed) => break,
                Err(e) if e.is_fatal() => {
                    err!(
                        self.log,
                        app.name(),
                        "fatal error handling {event}: {e}"
                    );
                    break;
                }
                Err(e) => {
                    wrn!(self.log, app.name(), "error handling {event}: {e}");
                }
            }
        }
    }
}

impl Display for AppChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(" -> "))
    }
}

impl EventListener for AppChain {
    fn on_device_up(&self, finder: &dyn Finder, device: &Arc<Device>) {
        self.walk("device up", |app| app.on_device_up(finder, device));
    }

    fn on_device_down(&self, finder: &dyn Finder, device: &Arc<Device>) {
        self.walk("device down", |app| app.on_device_down(finder, device));
    }

    fn on_port_up(&self, finder: &dyn Finder, port: &Arc<Port>) {
        self.walk("port up", |app| app.on_port_up(finder, port));
    }

    fn on_port_down(&self, finder: &dyn Finder, port: &Arc<Port>) {
        self.walk("port down", |app| app.on_port_down(finder, port));
    }

    fn on_packet_in(
        &self,
        finder: &dyn Finder,
        ingress: &Arc<Port>,
        eth: &mut EthernetFrame,
    ) {
        self.walk("packet in", |app| app.on_packet_in(finder, ingress, eth));
    }

    fn on_topology_change(&self, finder: &dyn Finder) {
        self.walk("topology change", |app| app.on_topology_change(finder));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Probe {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        result: fn() -> Result<Disposition, Error>,
    }

    impl Processor for Probe {
        fn name(&self) -> &'static str {
            self.name
        }

        fn on_topology_change(
            &self,
            _finder: &dyn Finder,
        ) -> Result<Disposition, Error> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            (self.result)()
        }
    }

    fn chain_with(
        results: &[(&'static str, fn() -> Result<Disposition, Error>)],
    ) -> (AppChain, Vec<Arc<AtomicUsize>>) {
        let mut chain = AppChain::new(of_common::log::init_logger());
        let mut counters = Vec::new();
        for (name, result) in results {
            let calls = Arc::new(AtomicUsize::new(0));
            counters.push(calls.clone());
            chain
                .register(Arc::new(Probe {
                    name: *name,
                    calls,
                    result: *result,
                }))
                .unwrap();
        }
        (chain, counters)
    }

    struct NullFinder;
    impl Finder for NullFinder {
        fn device(&self, _: u64) -> Option<Arc<Device>> {
            None
        }
        fn devices(&self) -> Vec<Arc<Device>> {
            Vec::new()
        }
        fn node(
            &self,
            _: of_common::net::MacAddr,
        ) -> Option<crate::topology::Node> {
            None
        }
        fn path(&self, _: u64, _: u64) -> Vec<crate::topology::PathHop> {
            Vec::new()
        }
        fn is_inter_switch(&self, _: u64, _: u32) -> bool {
            false
        }
        fn is_blocked(&self, _: u64, _: u32) -> bool {
            false
        }
    }

    #[test]
    fn consumed_stops_the_walk() {
        let (chain, counters) = chain_with(&[
            ("a", || Ok(Disposition::Forward)),
            ("b", || Ok(Disposition::Consumed)),
            ("c", || Ok(Disposition::Forward)),
        ]);
        chain.on_topology_change(&NullFinder);
        assert_eq!(counters[0].load(Ordering::Relaxed), 1);
        assert_eq!(counters[1].load(Ordering::Relaxed), 1);
        assert_eq!(counters[2].load(Ordering::Relaxed), 0);
    }

    #[test]
    fn errors_are_skipped_unless_fatal() {
        let (chain, counters) = chain_with(&[
            ("a", || Err(Error::Protocol("boom".into()))),
            ("b", || Ok(Disposition::Forward)),
        ]);
        chain.on_topology_change(&NullFinder);
        assert_eq!(counters[1].load(Ordering::Relaxed), 1);

        let (chain, counters) = chain_with(&[
            ("a", || Err(Error::Fatal("stop".into()))),
            ("b", || Ok(Disposition::Forward)),
        ]);
        chain.on_topology_change(&NullFinder);
        assert_eq!(counters[1].load(Ordering::Relaxed), 0);
    }
}
