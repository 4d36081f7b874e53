// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{inet_checksum, Error};
use std::net::Ipv4Addr;

pub const IPPROTO_ICMP: u8 = 1;

/// An IPv4 packet. Options are not carried across a decode/encode cycle;
/// the header checksum is computed on emit and not verified on parse (the
/// switch already did).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Packet {
    pub ttl: u8,
    pub protocol: u8,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub payload: Vec<u8>,
}

const IPV4_MIN_HEADER_LEN: usize = 20;

impl Ipv4Packet {
    pub fn new(
        src: Ipv4Addr,
        dst: Ipv4Addr,
        protocol: u8,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            ttl: 64,
            protocol,
            src,
            dst,
            payload,
        }
    }

    pub fn from_bytes(d: &[u8]) -> Result<Self, Error> {
        if d.len() < IPV4_MIN_HEADER_LEN {
            return Err(Error::TooShort("ipv4 packet", d.len()));
        }
        let version = d[0] >> 4;
        if version != 4 {
            return Err(Error::BadVersion("ipv4", version));
        }
        let ihl = usize::from(d[0] & 0x0f) * 4;
        if ihl < IPV4_MIN_HEADER_LEN || d.len() < ihl {
            return Err(Error::Malformed(
                "ipv4",
                format!("header length {ihl}"),
            ));
        }
        let total_len = usize::from(u16::from_be_bytes([d[2], d[3]]));
        let end = if total_len >= ihl && total_len <= d.len() {
            total_len
        } else {
            d.len()
        };
        Ok(Self {
            ttl: d[8],
            protocol: d[9],
            src: Ipv4Addr::new(d[12], d[13], d[14], d[15]),
            dst: Ipv4Addr::new(d[16], d[17], d[18], d[19]),
            payload: d[ihl..end].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let total_len = (IPV4_MIN_HEADER_LEN + self.payload.len()) as u16;
        let mut v = Vec::with_capacity(usize::from(total_len));
        v.push(0x45); // version 4, ihl 5
        v.push(0); // dscp/ecn
        v.extend_from_slice(&total_len.to_be_bytes());
        v.extend_from_slice(&[0, 0]); // identification
        v.extend_from_slice(&[0, 0]); // flags/fragment offset
        v.push(self.ttl);
        v.push(self.protocol);
        v.extend_from_slice(&[0, 0]); // checksum placeholder
        v.extend_from_slice(&self.src.octets());
        v.extend_from_slice(&self.dst.octets());
        let csum = inet_checksum(&v);
        v[10..12].copy_from_slice(&csum.to_be_bytes());
        v.extend_from_slice(&self.payload);
        v
    }
}

/// An ICMP echo request or reply.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     type      |     code      |           checksum            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |          identifier           |        sequence number        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           payload...                          :
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpEcho {
    pub icmp_type: u8,
    pub code: u8,
    pub ident: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

impl IcmpEcho {
    pub const ECHO_REQUEST: u8 = 8;
    pub const ECHO_REPLY: u8 = 0;

    pub fn from_bytes(d: &[u8]) -> Result<Self, Error> {
        if d.len() < 8 {
            return Err(Error::TooShort("icmp echo", d.len()));
        }
        Ok(Self {
            icmp_type: d[0],
            code: d[1],
            ident: u16::from_be_bytes([d[4], d[5]]),
            sequence: u16::from_be_bytes([d[6], d[7]]),
            payload: d[8..].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(8 + self.payload.len());
        v.push(self.icmp_type);
        v.push(self.code);
        v.extend_from_slice(&[0, 0]); // checksum placeholder
        v.extend_from_slice(&self.ident.to_be_bytes());
        v.extend_from_slice(&self.sequence.to_be_bytes());
        v.extend_from_slice(&self.payload);
        let csum = inet_checksum(&v);
        v[2..4].copy_from_slice(&csum.to_be_bytes());
        v
    }

    pub fn is_echo_request(&self) -> bool {
        self.icmp_type == Self::ECHO_REQUEST
    }

    /// Build the reply to this echo request, carrying the identifier,
    /// sequence number and payload back unchanged.
    pub fn reply(&self) -> Self {
        Self {
            icmp_type: Self::ECHO_REPLY,
            code: 0,
            ident: self.ident,
            sequence: self.sequence,
            payload: self.payload.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ipv4_roundtrip() {
        let pkt = Ipv4Packet::new(
            Ipv4Addr::new(192, 168, 1, 5),
            Ipv4Addr::new(8, 8, 8, 8),
            IPPROTO_ICMP,
            vec![0xde, 0xad],
        );
        let wire = pkt.to_bytes();
        assert_eq!(wire.len(), 22);
        // Emitted headers carry a valid checksum.
        assert_eq!(inet_checksum(&wire[..20]), 0);
        let back = Ipv4Packet::from_bytes(&wire).unwrap();
        assert_eq!(back, pkt);
    }

    #[test]
    fn ipv4_rejects_v6() {
        let mut wire = Ipv4Packet::new(
            Ipv4Addr::LOCALHOST,
            Ipv4Addr::LOCALHOST,
            0,
            vec![],
        )
        .to_bytes();
        wire[0] = 0x65;
        assert!(Ipv4Packet::from_bytes(&wire).is_err());
    }

    #[test]
    fn icmp_echo_reply_mirrors_request() {
        let req = IcmpEcho {
            icmp_type: IcmpEcho::ECHO_REQUEST,
            code: 0,
            ident: 0x1234,
            sequence: 7,
            payload: b"ping".to_vec(),
        };
        let rep = req.reply();
        assert_eq!(rep.icmp_type, IcmpEcho::ECHO_REPLY);
        assert_eq!(rep.ident, req.ident);
        assert_eq!(rep.sequence, req.sequence);
        assert_eq!(rep.payload, req.payload);

        let back = IcmpEcho::from_bytes(&rep.to_bytes()).unwrap();
        assert_eq!(back, rep);
    }
}
