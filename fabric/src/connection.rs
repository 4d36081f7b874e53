// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::Error;
use crate::session::FsmEvent;
use crate::{dbg, err};
use of_common::lock;
use openflow::{Header, HEADER_LEN};
use slog::Logger;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Mutex;
use std::sync::Arc;
use std::thread::spawn;

/// An accepted switch connection. Frames cross this seam as raw
/// header+body byte pairs: the session owns the factory that interprets
/// them, because the protocol version is not known until HELLO completes.
pub trait SwitchConnection: Send + Sync {
    /// Spawn the receive loop. Every framed message arrives on `event_tx`
    /// as [`FsmEvent::Frame`]; EOF and read errors arrive as
    /// [`FsmEvent::ConnectionClosed`]. Call at most once.
    fn start_recv(&self, event_tx: Sender<FsmEvent>) -> Result<(), Error>;

    /// Write one already-encoded frame. Serialized internally; safe to
    /// call from any thread.
    fn send(&self, frame: &[u8]) -> Result<(), Error>;

    fn peer(&self) -> SocketAddr;

    /// Idempotent. Unblocks the receive loop.
    fn close(&self);
}

pub trait SwitchListener: Send {
    fn bind<A: ToSocketAddrs>(addr: A, log: Logger) -> Result<Self, Error>
    where
        Self: Sized;

    fn accept(&self) -> Result<Arc<dyn SwitchConnection>, Error>;
}

pub struct SwitchListenerTcp {
    listener: TcpListener,
    log: Logger,
}

impl SwitchListener for SwitchListenerTcp {
    fn bind<A: ToSocketAddrs>(addr: A, log: Logger) -> Result<Self, Error> {
        Ok(Self {
            listener: TcpListener::bind(addr)?,
            log,
        })
    }

    fn accept(&self) -> Result<Arc<dyn SwitchConnection>, Error> {
        let (conn, peer) = self.listener.accept()?;
        conn.set_nodelay(true)?;
        Ok(Arc::new(SwitchConnectionTcp::new(conn, peer, self.log.clone())))
    }
}

pub struct SwitchConnectionTcp {
    peer: SocketAddr,
    conn: Mutex<TcpStream>,
    closed: AtomicBool,
    log: Logger,
}

impl SwitchConnectionTcp {
    fn new(conn: TcpStream, peer: SocketAddr, log: Logger) -> Self {
        Self {
            peer,
            conn: Mutex::new(conn),
            closed: AtomicBool::new(false),
            log,
        }
    }

    fn recv_loop(
        mut stream: TcpStream,
        peer: SocketAddr,
        event_tx: Sender<FsmEvent>,
        log: Logger,
    ) {
        loop {
            let mut hbuf = [0u8; HEADER_LEN];
            if let Err(e) = stream.read_exact(&mut hbuf) {
                dbg!(log, peer, "read header: {e}");
                break;
            }
            let header = match Header::from_bytes(&hbuf) {
                Ok(h) => h,
                Err(e) => {
                    err!(log, peer, "frame header: {e}");
                    break;
                }
            };
            let mut body = vec![0u8; header.body_len()];
            if let Err(e) = stream.read_exact(&mut body) {
                dbg!(log, peer, "read body: {e}");
                break;
            }
            if event_tx.send(FsmEvent::Frame(header, body)).is_err() {
                // Session is gone; nothing left to deliver to.
                return;
            }
        }
        let _ = event_tx.send(FsmEvent::ConnectionClosed);
    }
}

impl SwitchConnection for SwitchConnectionTcp {
    fn start_recv(&self, event_tx: Sender<FsmEvent>) -> Result<(), Error> {
        let stream = lock!(self.conn).try_clone()?;
        let peer = self.peer;
        let log = self.log.clone();
        spawn(move || Self::recv_loop(stream, peer, event_tx, log));
        Ok(())
    }

    fn send(&self, frame: &[u8]) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Disconnected);
        }
        let mut conn = lock!(self.conn);
        conn.write_all(frame)?;
        Ok(())
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = lock!(self.conn).shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
pub mod test {
    //! A process-local switch network backed by channels, so session and
    //! app tests can drive both ends of a connection without sockets.

    use super::*;
    use crate::bidi::{endpoint_pair, Endpoint};

    /// Create a connected (controller side, switch side) pair. The switch
    /// side sends and receives raw frames.
    pub fn switch_conn_pair(
        peer: SocketAddr,
    ) -> (Arc<SwitchConnectionChannel>, Endpoint<Vec<u8>>) {
        let (local, remote) = endpoint_pair();
        (Arc::new(SwitchConnectionChannel::new(peer, local)), remote)
    }

    pub struct SwitchConnectionChannel {
        peer: SocketAddr,
        tx: Sender<Vec<u8>>,
        rx: Mutex<Option<std::sync::mpsc::Receiver<Vec<u8>>>>,
        closed: AtomicBool,
    }

    impl SwitchConnectionChannel {
        fn new(peer: SocketAddr, ep: Endpoint<Vec<u8>>) -> Self {
            Self {
                peer,
                tx: ep.tx,
                rx: Mutex::new(Some(ep.rx)),
                closed: AtomicBool::new(false),
            }
        }
    }

    impl SwitchConnection for SwitchConnectionChannel {
        fn start_recv(&self, event_tx: Sender<FsmEvent>) -> Result<(), Error> {
            let rx = lock!(self.rx)
                .take()
                .expect("receive loop started twice");
            spawn(move || {
                while let Ok(frame) = rx.recv() {
                    let Ok(header) = Header::from_bytes(&frame) else {
                        break;
                    };
                    if event_tx
                        .send(FsmEvent::Frame(
                            header,
                            frame[HEADER_LEN..].to_vec(),
                        ))
                        .is_err()
                    {
                        return;
                    }
                }
                let _ = event_tx.send(FsmEvent::ConnectionClosed);
            });
            Ok(())
        }

        fn send(&self, frame: &[u8]) -> Result<(), Error> {
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::Disconnected);
            }
            self.tx
                .send(frame.to_vec())
                .map_err(|e| Error::ChannelSend(e.to_string()))
        }

        fn peer(&self) -> SocketAddr {
            self.peer
        }

        fn close(&self) {
            self.closed.store(true, Ordering::Release);
            // Dropping the sender would end the peer's recv loop, but the
            // sender lives in self; tests drop the whole connection.
        }
    }

    /// Switch-side helper: speak parsed messages over a raw endpoint.
    pub struct TestSwitch {
        pub ep: Endpoint<Vec<u8>>,
        pub factory: Arc<dyn openflow::Factory>,
    }

    impl TestSwitch {
        pub fn new(
            ep: Endpoint<Vec<u8>>,
            factory: Arc<dyn openflow::Factory>,
        ) -> Self {
            Self { ep, factory }
        }

        pub fn send(&self, xid: u32, msg: &openflow::messages::Message) {
            let frame = self.factory.encode(xid, msg).expect("encode");
            self.ep.tx.send(frame).expect("send frame");
        }

        pub fn recv(&self) -> openflow::messages::Message {
            let frame = self
                .ep
                .rx
                .recv_timeout(std::time::Duration::from_secs(5))
                .expect("switch read timeout");
            let header = Header::from_bytes(&frame).expect("frame header");
            self.factory
                .decode(&header, &frame[HEADER_LEN..])
                .expect("decode")
        }
    }
}
