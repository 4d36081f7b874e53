// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::Error;

/// The discovery probe the controller floods out of every switch port. The
/// chassis-id TLV carries the emitting switch's datapath id and the port-id
/// TLV carries the emitting port number, both locally-assigned subtypes with
/// fixed-width big-endian values. Only probes of this shape need to parse;
/// LLDP from foreign equipment decodes as `Malformed` and is dropped by the
/// topology layer.
///
/// ```text
/// +---------+---------+---------+---------+
/// | chassis | port    | ttl     | end     |
/// | id TLV  | id TLV  | TLV     | TLV     |
/// +---------+---------+---------+---------+
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LldpProbe {
    pub chassis_id: u64,
    pub port_id: u32,
}

const TLV_END: u8 = 0;
const TLV_CHASSIS_ID: u8 = 1;
const TLV_PORT_ID: u8 = 2;
const TLV_TTL: u8 = 3;

// Locally assigned chassis/port subtypes.
const SUBTYPE_LOCAL: u8 = 7;

const PROBE_TTL_SECONDS: u16 = 120;

impl LldpProbe {
    pub fn new(chassis_id: u64, port_id: u32) -> Self {
        Self {
            chassis_id,
            port_id,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(26);
        push_tlv(&mut v, TLV_CHASSIS_ID, &{
            let mut d = vec![SUBTYPE_LOCAL];
            d.extend_from_slice(&self.chassis_id.to_be_bytes());
            d
        });
        push_tlv(&mut v, TLV_PORT_ID, &{
            let mut d = vec![SUBTYPE_LOCAL];
            d.extend_from_slice(&self.port_id.to_be_bytes());
            d
        });
        push_tlv(&mut v, TLV_TTL, &PROBE_TTL_SECONDS.to_be_bytes());
        push_tlv(&mut v, TLV_END, &[]);
        v
    }

    pub fn from_bytes(d: &[u8]) -> Result<Self, Error> {
        let mut chassis_id = None;
        let mut port_id = None;
        let mut off = 0;
        while off + 2 <= d.len() {
            let header = u16::from_be_bytes([d[off], d[off + 1]]);
            let tlv_type = (header >> 9) as u8;
            let tlv_len = usize::from(header & 0x1ff);
            off += 2;
            if off + tlv_len > d.len() {
                return Err(Error::Malformed(
                    "lldp",
                    format!("tlv length {tlv_len} overruns frame"),
                ));
            }
            let value = &d[off..off + tlv_len];
            off += tlv_len;
            match tlv_type {
                TLV_END => break,
                TLV_CHASSIS_ID if tlv_len == 9 && value[0] == SUBTYPE_LOCAL => {
                    chassis_id = Some(u64::from_be_bytes(
                        value[1..9].try_into().unwrap(),
                    ));
                }
                TLV_PORT_ID if tlv_len == 5 && value[0] == SUBTYPE_LOCAL => {
                    port_id = Some(u32::from_be_bytes(
                        value[1..5].try_into().unwrap(),
                    ));
                }
                _ => {}
            }
        }
        match (chassis_id, port_id) {
            (Some(chassis_id), Some(port_id)) => Ok(Self {
                chassis_id,
                port_id,
            }),
            _ => Err(Error::Malformed(
                "lldp",
                "missing chassis or port id".into(),
            )),
        }
    }
}

fn push_tlv(v: &mut Vec<u8>, tlv_type: u8, value: &[u8]) {
    let header = (u16::from(tlv_type) << 9) | (value.len() as u16 & 0x1ff);
    v.extend_from_slice(&header.to_be_bytes());
    v.extend_from_slice(value);
}
