// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("codec error: {0}")]
    Codec(#[from] openflow::Error),

    #[error("packet error: {0}")]
    Packet(#[from] packet::Error),

    #[error("database error: {0}")]
    Database(#[from] swdb::Error),

    #[error("channel send error: {0}")]
    ChannelSend(String),

    #[error("connection closed")]
    Disconnected,

    #[error("peer disappeared from the topology")]
    Stale,

    #[error("fatal application error: {0}")]
    Fatal(String),
}

impl Error {
    /// A fatal application error stops the processor chain for the event
    /// being dispatched; everything else is logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }
}
