// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::Error;
use of_common::net::MacAddr;

/// Ethertypes the controller cares about. Anything else passes through the
/// app chain as an opaque payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EtherType;

impl EtherType {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const LLDP: u16 = 0x88cc;
}

/// An Ethernet II frame.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                      destination address                      |
/// +                               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                               |                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+        source address         |
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           ethertype           |            payload...         :
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// 802.1Q tags are not interpreted; a tagged frame decodes with the TPID as
/// its ethertype and the tag in the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
    pub payload: Vec<u8>,
}

const ETH_HEADER_LEN: usize = 14;

impl EthernetFrame {
    pub fn new(
        dst: MacAddr,
        src: MacAddr,
        ethertype: u16,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            dst,
            src,
            ethertype,
            payload,
        }
    }

    pub fn from_bytes(d: &[u8]) -> Result<Self, Error> {
        if d.len() < ETH_HEADER_LEN {
            return Err(Error::TooShort("ethernet frame", d.len()));
        }
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&d[0..6]);
        src.copy_from_slice(&d[6..12]);
        Ok(Self {
            dst: MacAddr(dst),
            src: MacAddr(src),
            ethertype: u16::from_be_bytes([d[12], d[13]]),
            payload: d[ETH_HEADER_LEN..].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(ETH_HEADER_LEN + self.payload.len());
        v.extend_from_slice(&self.dst.octets());
        v.extend_from_slice(&self.src.octets());
        v.extend_from_slice(&self.ethertype.to_be_bytes());
        v.extend_from_slice(&self.payload);
        v
    }
}
