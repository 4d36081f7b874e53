// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::messages::{Hello, Message};
use crate::{
    v10::Of10Factory, v13::Of13Factory, Error, Header, OFP10_VERSION,
    OFP13_VERSION, SUPPORTED_VERSIONS,
};
use std::sync::Arc;

/// One codec per negotiated protocol version. A factory owns every
/// version-specific byte: the session layer feeds it framed `(header,
/// body)` pairs and sends whatever `encode` hands back.
pub trait Factory: Send + Sync {
    fn version(&self) -> u8;

    fn encode(&self, xid: u32, msg: &Message) -> Result<Vec<u8>, Error>;

    fn decode(&self, header: &Header, body: &[u8]) -> Result<Message, Error>;
}

pub fn factory_for(version: u8) -> Result<Arc<dyn Factory>, Error> {
    match version {
        OFP10_VERSION => Ok(Arc::new(Of10Factory)),
        OFP13_VERSION => Ok(Arc::new(Of13Factory)),
        v => Err(Error::UnknownVersion(v)),
    }
}

/// Pick the highest protocol version both sides speak, or fail the
/// handshake.
pub fn negotiate(peer: &Hello) -> Result<Arc<dyn Factory>, Error> {
    let common = SUPPORTED_VERSIONS
        .iter()
        .rev()
        .find(|v| peer.versions.contains(v))
        .copied()
        .ok_or_else(|| Error::NoCommonVersion(peer.versions.clone()))?;
    factory_for(common)
}

const HELLO_ELEM_VERSIONBITMAP: u16 = 1;

/// Decode a HELLO body. This predates version negotiation so it cannot go
/// through a factory: a plain hello (1.0, or a 1.3 speaker that sends no
/// elements) advertises exactly its header version, while a version-bitmap
/// element enumerates everything the peer speaks.
pub fn decode_hello(header: &Header, body: &[u8]) -> Result<Hello, Error> {
    let mut versions = Vec::new();
    let mut off = 0;
    while off + 4 <= body.len() {
        let elem_type = u16::from_be_bytes([body[off], body[off + 1]]);
        let elem_len =
            usize::from(u16::from_be_bytes([body[off + 2], body[off + 3]]));
        if elem_len < 4 || off + elem_len > body.len() {
            return Err(Error::Malformed(
                "hello",
                format!("element length {elem_len}"),
            ));
        }
        if elem_type == HELLO_ELEM_VERSIONBITMAP {
            for (word, chunk) in body[off + 4..off + elem_len]
                .chunks_exact(4)
                .enumerate()
            {
                let bitmap = u32::from_be_bytes(chunk.try_into().unwrap());
                for bit in 0..32 {
                    if bitmap & (1 << bit) != 0 {
                        versions.push((word * 32 + bit) as u8);
                    }
                }
            }
        }
        // Elements are padded to 8 bytes on the wire.
        off += elem_len.next_multiple_of(8);
    }
    if versions.is_empty() {
        versions.push(header.version);
    }
    Ok(Hello { versions })
}

/// Encode the version bitmap element for an outgoing HELLO.
pub(crate) fn encode_version_bitmap(versions: &[u8]) -> Vec<u8> {
    let mut bitmap = 0u32;
    for v in versions {
        bitmap |= 1 << v;
    }
    let mut body = Vec::with_capacity(8);
    body.extend_from_slice(&HELLO_ELEM_VERSIONBITMAP.to_be_bytes());
    body.extend_from_slice(&8u16.to_be_bytes());
    body.extend_from_slice(&bitmap.to_be_bytes());
    body
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn negotiate_prefers_highest_common() {
        let f = negotiate(&Hello {
            versions: vec![OFP10_VERSION, OFP13_VERSION],
        })
        .unwrap();
        assert_eq!(f.version(), OFP13_VERSION);

        let f = negotiate(&Hello {
            versions: vec![OFP10_VERSION],
        })
        .unwrap();
        assert_eq!(f.version(), OFP10_VERSION);
    }

    #[test]
    fn negotiate_fails_without_common_version() {
        // Peer only speaks 1.2.
        let err = negotiate(&Hello {
            versions: vec![0x03],
        });
        assert!(matches!(err, Err(Error::NoCommonVersion(_))));
    }

    #[test]
    fn plain_hello_advertises_header_version() {
        let header = Header::new(OFP10_VERSION, 0, 0, 1);
        let hello = decode_hello(&header, &[]).unwrap();
        assert_eq!(hello.versions, vec![OFP10_VERSION]);
    }

    #[test]
    fn bitmap_hello_roundtrip() {
        let body = encode_version_bitmap(SUPPORTED_VERSIONS);
        let header = Header::new(OFP13_VERSION, 0, body.len(), 1);
        let hello = decode_hello(&header, &body).unwrap();
        assert_eq!(hello.versions, SUPPORTED_VERSIONS);
    }
}
