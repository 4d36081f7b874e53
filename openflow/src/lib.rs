// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A parsed-frame model for the OpenFlow 1.0 and 1.3 subsets the controller
//! speaks, together with one codec ("factory") per protocol version. The
//! session layer frames bytes off the wire, hands `(Header, body)` pairs to
//! the factory negotiated at HELLO time, and gets back version-agnostic
//! [`messages::Message`] values. Everything version-specific lives behind
//! the [`factory::Factory`] trait.

pub mod factory;
pub mod messages;
mod v10;
mod v13;
mod wire;

pub use factory::{decode_hello, factory_for, negotiate, Factory};

use thiserror::Error;

pub const OFP10_VERSION: u8 = 0x01;
pub const OFP13_VERSION: u8 = 0x04;

/// Versions this controller is willing to speak, ascending.
pub const SUPPORTED_VERSIONS: &[u8] = &[OFP10_VERSION, OFP13_VERSION];

pub const HEADER_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} too short: {1} bytes")]
    TooShort(&'static str, usize),

    #[error("no common protocol version, peer offers {0:?}")]
    NoCommonVersion(Vec<u8>),

    #[error("{0} not supported in protocol version {1:#04x}")]
    Unsupported(&'static str, u8),

    #[error("unknown protocol version {0:#04x}")]
    UnknownVersion(u8),

    #[error("malformed {0}: {1}")]
    Malformed(&'static str, String),
}

/// The fixed 8-byte header every OpenFlow message starts with.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    version    |     type      |            length             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                              xid                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub msg_type: u8,
    pub length: u16,
    pub xid: u32,
}

impl Header {
    pub fn new(version: u8, msg_type: u8, body_len: usize, xid: u32) -> Self {
        Self {
            version,
            msg_type,
            length: (HEADER_LEN + body_len) as u16,
            xid,
        }
    }

    pub fn from_bytes(d: &[u8]) -> Result<Self, Error> {
        if d.len() < HEADER_LEN {
            return Err(Error::TooShort("header", d.len()));
        }
        let h = Self {
            version: d[0],
            msg_type: d[1],
            length: u16::from_be_bytes([d[2], d[3]]),
            xid: u32::from_be_bytes([d[4], d[5], d[6], d[7]]),
        };
        if usize::from(h.length) < HEADER_LEN {
            return Err(Error::Malformed(
                "header",
                format!("length field {}", h.length),
            ));
        }
        Ok(h)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut d = [0u8; HEADER_LEN];
        d[0] = self.version;
        d[1] = self.msg_type;
        d[2..4].copy_from_slice(&self.length.to_be_bytes());
        d[4..8].copy_from_slice(&self.xid.to_be_bytes());
        d
    }

    /// Bytes remaining on the wire after the header.
    pub fn body_len(&self) -> usize {
        usize::from(self.length) - HEADER_LEN
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let h = Header::new(OFP13_VERSION, 14, 48, 0xdeadbeef);
        assert_eq!(h.length, 56);
        let back = Header::from_bytes(&h.to_bytes()).unwrap();
        assert_eq!(back, h);
        assert_eq!(back.body_len(), 48);
    }

    #[test]
    fn header_rejects_short_length() {
        let mut d = Header::new(OFP10_VERSION, 0, 0, 1).to_bytes();
        d[3] = 4;
        assert!(Header::from_bytes(&d).is_err());
    }
}
