// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OpenFlow 1.3 codec: OXM TLV matches, instruction-wrapped actions,
//! multipart stats, 32-bit port numbers.

use crate::factory::{decode_hello, encode_version_bitmap, Factory};
use crate::messages::*;
use crate::wire::*;
use crate::{Error, Header, OFP13_VERSION};
use of_common::net::MacAddr;
use std::net::Ipv4Addr;

mod msg_type {
    pub const HELLO: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const ECHO_REQUEST: u8 = 2;
    pub const ECHO_REPLY: u8 = 3;
    pub const FEATURES_REQUEST: u8 = 5;
    pub const FEATURES_REPLY: u8 = 6;
    pub const PACKET_IN: u8 = 10;
    pub const FLOW_REMOVED: u8 = 11;
    pub const PORT_STATUS: u8 = 12;
    pub const PACKET_OUT: u8 = 13;
    pub const FLOW_MOD: u8 = 14;
    pub const MULTIPART_REQUEST: u8 = 18;
    pub const MULTIPART_REPLY: u8 = 19;
    pub const BARRIER_REQUEST: u8 = 20;
    pub const BARRIER_REPLY: u8 = 21;
}

const MULTIPART_DESC: u16 = 0;
const MULTIPART_TABLE_FEATURES: u16 = 12;
const MULTIPART_PORT_DESC: u16 = 13;

const OFPP_CONTROLLER: u32 = 0xffff_fffd;
const OFPP_ANY: u32 = 0xffff_ffff;
const OFPG_ANY: u32 = 0xffff_ffff;
const OFPTT_ALL: u8 = 0xff;

const FLOW_ADD: u8 = 0;
const FLOW_DELETE: u8 = 3;

const NO_BUFFER: u32 = 0xffff_ffff;
const MAX_LEN_NO_BUFFER: u16 = 0xffff;

const OXM_CLASS_BASIC: u16 = 0x8000;

const INSTRUCTION_APPLY_ACTIONS: u16 = 4;

const PROP_APPLY_ACTIONS: u16 = 6;
const PROP_MATCH: u16 = 8;

const PORT_LEN: usize = 64;

const OFPPC_PORT_DOWN: u32 = 1 << 0;
const OFPPS_LINK_DOWN: u32 = 1 << 0;

pub struct Of13Factory;

impl Factory for Of13Factory {
    fn version(&self) -> u8 {
        OFP13_VERSION
    }

    fn encode(&self, xid: u32, msg: &Message) -> Result<Vec<u8>, Error> {
        let (msg_type, body) = match msg {
            Message::Hello(h) => {
                (msg_type::HELLO, encode_version_bitmap(&h.versions))
            }
            Message::Error(e) => (msg_type::ERROR, encode_error(e)),
            Message::EchoRequest(d) => (msg_type::ECHO_REQUEST, d.clone()),
            Message::EchoReply(d) => (msg_type::ECHO_REPLY, d.clone()),
            Message::FeaturesRequest => {
                (msg_type::FEATURES_REQUEST, Vec::new())
            }
            Message::FeaturesReply(f) => {
                (msg_type::FEATURES_REPLY, encode_features(f))
            }
            Message::DescRequest => (
                msg_type::MULTIPART_REQUEST,
                encode_multipart_header(MULTIPART_DESC),
            ),
            Message::DescReply(d) => {
                let mut body = encode_multipart_header(MULTIPART_DESC);
                encode_desc(&mut body, d);
                (msg_type::MULTIPART_REPLY, body)
            }
            Message::PortDescRequest => (
                msg_type::MULTIPART_REQUEST,
                encode_multipart_header(MULTIPART_PORT_DESC),
            ),
            Message::PortDescReply(ports) => {
                let mut body = encode_multipart_header(MULTIPART_PORT_DESC);
                for p in ports {
                    encode_port(&mut body, p);
                }
                (msg_type::MULTIPART_REPLY, body)
            }
            Message::TableFeaturesRequest => (
                msg_type::MULTIPART_REQUEST,
                encode_multipart_header(MULTIPART_TABLE_FEATURES),
            ),
            Message::TableFeaturesReply(tables) => {
                let mut body =
                    encode_multipart_header(MULTIPART_TABLE_FEATURES);
                for t in tables {
                    encode_table_feature(&mut body, t);
                }
                (msg_type::MULTIPART_REPLY, body)
            }
            Message::FlowMod(fm) => (msg_type::FLOW_MOD, encode_flow_mod(fm)),
            Message::PacketIn(pi) => {
                (msg_type::PACKET_IN, encode_packet_in(pi))
            }
            Message::PacketOut(po) => {
                (msg_type::PACKET_OUT, encode_packet_out(po))
            }
            Message::PortStatus(ps) => {
                (msg_type::PORT_STATUS, encode_port_status(ps))
            }
            Message::FlowRemoved(fr) => {
                (msg_type::FLOW_REMOVED, encode_flow_removed(fr))
            }
            Message::BarrierRequest => {
                (msg_type::BARRIER_REQUEST, Vec::new())
            }
            Message::BarrierReply => (msg_type::BARRIER_REPLY, Vec::new()),
            Message::Unsupported { msg_type } => {
                return Err(Error::Malformed(
                    "message",
                    format!("cannot encode unsupported type {msg_type}"),
                ))
            }
        };
        let mut frame =
            Header::new(OFP13_VERSION, msg_type, body.len(), xid)
                .to_bytes()
                .to_vec();
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    fn decode(&self, header: &Header, body: &[u8]) -> Result<Message, Error> {
        Ok(match header.msg_type {
            msg_type::HELLO => Message::Hello(decode_hello(header, body)?),
            msg_type::ERROR => Message::Error(decode_error(body)?),
            msg_type::ECHO_REQUEST => Message::EchoRequest(body.to_vec()),
            msg_type::ECHO_REPLY => Message::EchoReply(body.to_vec()),
            msg_type::FEATURES_REQUEST => Message::FeaturesRequest,
            msg_type::FEATURES_REPLY => {
                need("features reply", body, 24)?;
                Message::FeaturesReply(SwitchFeatures {
                    dpid: u64_at(body, 0),
                    n_buffers: u32_at(body, 8),
                    n_tables: body[12],
                    ports: Vec::new(),
                })
            }
            msg_type::MULTIPART_REQUEST => {
                need("multipart request", body, 8)?;
                match u16_at(body, 0) {
                    MULTIPART_DESC => Message::DescRequest,
                    MULTIPART_PORT_DESC => Message::PortDescRequest,
                    MULTIPART_TABLE_FEATURES => Message::TableFeaturesRequest,
                    _ => Message::Unsupported {
                        msg_type: header.msg_type,
                    },
                }
            }
            msg_type::MULTIPART_REPLY => {
                need("multipart reply", body, 8)?;
                let content = &body[8..];
                match u16_at(body, 0) {
                    MULTIPART_DESC => {
                        Message::DescReply(decode_desc(content)?)
                    }
                    MULTIPART_PORT_DESC => {
                        Message::PortDescReply(decode_ports(content)?)
                    }
                    MULTIPART_TABLE_FEATURES => Message::TableFeaturesReply(
                        decode_table_features(content)?,
                    ),
                    _ => Message::Unsupported {
                        msg_type: header.msg_type,
                    },
                }
            }
            msg_type::FLOW_MOD => Message::FlowMod(decode_flow_mod(body)?),
            msg_type::PACKET_IN => Message::PacketIn(decode_packet_in(body)?),
            msg_type::PACKET_OUT => {
                Message::PacketOut(decode_packet_out(body)?)
            }
            msg_type::PORT_STATUS => {
                Message::PortStatus(decode_port_status(body)?)
            }
            msg_type::FLOW_REMOVED => {
                Message::FlowRemoved(decode_flow_removed(body)?)
            }
            msg_type::BARRIER_REQUEST => Message::BarrierRequest,
            msg_type::BARRIER_REPLY => Message::BarrierReply,
            t => Message::Unsupported { msg_type: t },
        })
    }
}

fn encode_error(e: &ErrorMessage) -> Vec<u8> {
    let mut v = Vec::with_capacity(4 + e.data.len());
    v.extend_from_slice(&e.err_type.to_be_bytes());
    v.extend_from_slice(&e.code.to_be_bytes());
    v.extend_from_slice(&e.data);
    v
}

fn decode_error(d: &[u8]) -> Result<ErrorMessage, Error> {
    need("error message", d, 4)?;
    Ok(ErrorMessage {
        err_type: u16_at(d, 0),
        code: u16_at(d, 2),
        data: d[4..].to_vec(),
    })
}

fn encode_multipart_header(mp_type: u16) -> Vec<u8> {
    let mut v = Vec::with_capacity(8);
    v.extend_from_slice(&mp_type.to_be_bytes());
    v.extend_from_slice(&0u16.to_be_bytes()); // flags
    v.extend_from_slice(&[0; 4]);
    v
}

fn encode_features(f: &SwitchFeatures) -> Vec<u8> {
    let mut v = Vec::with_capacity(24);
    v.extend_from_slice(&f.dpid.to_be_bytes());
    v.extend_from_slice(&f.n_buffers.to_be_bytes());
    v.push(f.n_tables);
    v.push(0); // auxiliary id
    v.extend_from_slice(&[0; 2]);
    v.extend_from_slice(&0u32.to_be_bytes()); // capabilities
    v.extend_from_slice(&0u32.to_be_bytes()); // reserved
    v
}

fn encode_desc(v: &mut Vec<u8>, d: &SwitchDescription) {
    put_fixed_str(v, &d.manufacturer, 256);
    put_fixed_str(v, &d.hardware, 256);
    put_fixed_str(v, &d.software, 256);
    put_fixed_str(v, &d.serial, 32);
    put_fixed_str(v, &d.description, 256);
}

fn decode_desc(d: &[u8]) -> Result<SwitchDescription, Error> {
    need("description stats", d, 1056)?;
    Ok(SwitchDescription {
        manufacturer: get_fixed_str(&d[0..256]),
        hardware: get_fixed_str(&d[256..512]),
        software: get_fixed_str(&d[512..768]),
        serial: get_fixed_str(&d[768..800]),
        description: get_fixed_str(&d[800..1056]),
    })
}

fn encode_port(v: &mut Vec<u8>, p: &PortDesc) {
    v.extend_from_slice(&p.number.to_be_bytes());
    v.extend_from_slice(&[0; 4]);
    v.extend_from_slice(&p.hw_addr.octets());
    v.extend_from_slice(&[0; 2]);
    put_fixed_str(v, &p.name, 16);
    let config = if p.admin_down { OFPPC_PORT_DOWN } else { 0 };
    let state = if p.link_down { OFPPS_LINK_DOWN } else { 0 };
    v.extend_from_slice(&config.to_be_bytes());
    v.extend_from_slice(&state.to_be_bytes());
    v.extend_from_slice(&[0; 24]); // curr/advertised/supported/peer/speeds
}

fn decode_port(d: &[u8]) -> PortDesc {
    PortDesc {
        number: u32_at(d, 0),
        hw_addr: MacAddr(mac_at(d, 8)),
        name: get_fixed_str(&d[16..32]),
        admin_down: u32_at(d, 32) & OFPPC_PORT_DOWN != 0,
        link_down: u32_at(d, 36) & OFPPS_LINK_DOWN != 0,
    }
}

fn decode_ports(d: &[u8]) -> Result<Vec<PortDesc>, Error> {
    let mut ports = Vec::new();
    let mut off = 0;
    while off + PORT_LEN <= d.len() {
        ports.push(decode_port(&d[off..off + PORT_LEN]));
        off += PORT_LEN;
    }
    Ok(ports)
}

fn oxm_header(field: u8, has_mask: bool, len: u8) -> u32 {
    (u32::from(OXM_CLASS_BASIC) << 16)
        | (u32::from(field) << 9)
        | (u32::from(has_mask as u8) << 8)
        | u32::from(len)
}

fn oxm_payload_len(field: u8) -> u8 {
    match field {
        oxm::IN_PORT => 4,
        oxm::ETH_DST | oxm::ETH_SRC => 6,
        oxm::ETH_TYPE => 2,
        oxm::IPV4_DST => 4,
        _ => 0,
    }
}

/// Encode a match structure, returning its padded on-wire size.
fn encode_match(v: &mut Vec<u8>, m: &Match) -> usize {
    let mut fields = Vec::new();
    if let Some(p) = m.in_port {
        fields.extend_from_slice(
            &oxm_header(oxm::IN_PORT, false, 4).to_be_bytes(),
        );
        fields.extend_from_slice(&p.to_be_bytes());
    }
    if let Some(mac) = m.eth_src {
        fields.extend_from_slice(
            &oxm_header(oxm::ETH_SRC, false, 6).to_be_bytes(),
        );
        fields.extend_from_slice(&mac.octets());
    }
    if let Some(mac) = m.eth_dst {
        fields.extend_from_slice(
            &oxm_header(oxm::ETH_DST, false, 6).to_be_bytes(),
        );
        fields.extend_from_slice(&mac.octets());
    }
    if let Some(t) = m.eth_type {
        fields.extend_from_slice(
            &oxm_header(oxm::ETH_TYPE, false, 2).to_be_bytes(),
        );
        fields.extend_from_slice(&t.to_be_bytes());
    }
    if let Some((ip, prefix)) = m.ipv4_dst {
        if prefix >= 32 {
            fields.extend_from_slice(
                &oxm_header(oxm::IPV4_DST, false, 4).to_be_bytes(),
            );
            fields.extend_from_slice(&ip.octets());
        } else {
            let mask = !0u32 << (32 - u32::from(prefix));
            fields.extend_from_slice(
                &oxm_header(oxm::IPV4_DST, true, 8).to_be_bytes(),
            );
            fields.extend_from_slice(&ip.octets());
            fields.extend_from_slice(&mask.to_be_bytes());
        }
    }
    let length = 4 + fields.len();
    let padded = length.next_multiple_of(8);
    v.extend_from_slice(&1u16.to_be_bytes()); // OFPMT_OXM
    v.extend_from_slice(&(length as u16).to_be_bytes());
    v.extend_from_slice(&fields);
    v.resize(v.len() + (padded - length), 0);
    padded
}

/// Decode a match structure, returning it and its padded on-wire size.
fn decode_match(d: &[u8]) -> Result<(Match, usize), Error> {
    need("match", d, 4)?;
    let length = usize::from(u16_at(d, 2));
    let padded = length.next_multiple_of(8);
    if length < 4 || d.len() < padded {
        return Err(Error::Malformed("match", format!("length {length}")));
    }
    let mut m = Match::default();
    let mut off = 4;
    while off + 4 <= length {
        let header = u32_at(d, off);
        let field = ((header >> 9) & 0x7f) as u8;
        let has_mask = header & 0x100 != 0;
        let len = usize::from(header as u8);
        off += 4;
        if off + len > length {
            return Err(Error::Malformed(
                "match",
                format!("oxm field overruns structure"),
            ));
        }
        match field {
            oxm::IN_PORT => m.in_port = Some(u32_at(d, off)),
            oxm::ETH_SRC => m.eth_src = Some(MacAddr(mac_at(d, off))),
            oxm::ETH_DST => m.eth_dst = Some(MacAddr(mac_at(d, off))),
            oxm::ETH_TYPE => m.eth_type = Some(u16_at(d, off)),
            oxm::IPV4_DST => {
                let ip = Ipv4Addr::from(u32_at(d, off));
                let prefix = if has_mask {
                    u32_at(d, off + 4).count_ones() as u8
                } else {
                    32
                };
                m.ipv4_dst = Some((ip, prefix));
            }
            _ => {}
        }
        off += len;
    }
    Ok((m, padded))
}

fn encode_actions(v: &mut Vec<u8>, actions: &[Action]) {
    for a in actions {
        match a {
            Action::Output(port) => {
                let port = match port {
                    OutputPort::Physical(p) => *p,
                    OutputPort::Controller => OFPP_CONTROLLER,
                };
                v.extend_from_slice(&action_type::OUTPUT.to_be_bytes());
                v.extend_from_slice(&16u16.to_be_bytes());
                v.extend_from_slice(&port.to_be_bytes());
                v.extend_from_slice(&MAX_LEN_NO_BUFFER.to_be_bytes());
                v.extend_from_slice(&[0; 6]);
            }
            Action::SetEthDst(mac) => {
                // 4 byte action header + 10 byte oxm field, padded to 16
                v.extend_from_slice(&action_type::SET_FIELD.to_be_bytes());
                v.extend_from_slice(&16u16.to_be_bytes());
                v.extend_from_slice(
                    &oxm_header(oxm::ETH_DST, false, 6).to_be_bytes(),
                );
                v.extend_from_slice(&mac.octets());
                v.extend_from_slice(&[0; 2]);
            }
        }
    }
}

fn decode_actions(d: &[u8]) -> Result<Vec<Action>, Error> {
    let mut actions = Vec::new();
    let mut off = 0;
    while off + 4 <= d.len() {
        let atype = u16_at(d, off);
        let alen = usize::from(u16_at(d, off + 2));
        if alen < 8 || off + alen > d.len() {
            return Err(Error::Malformed(
                "action",
                format!("length {alen}"),
            ));
        }
        match atype {
            action_type::OUTPUT => {
                let port = u32_at(d, off + 4);
                actions.push(Action::Output(if port == OFPP_CONTROLLER {
                    OutputPort::Controller
                } else {
                    OutputPort::Physical(port)
                }));
            }
            action_type::SET_FIELD => {
                let header = u32_at(d, off + 4);
                let field = ((header >> 9) & 0x7f) as u8;
                if field == oxm::ETH_DST {
                    actions
                        .push(Action::SetEthDst(MacAddr(mac_at(d, off + 8))));
                }
            }
            _ => {}
        }
        off += alen;
    }
    Ok(actions)
}

fn encode_flow_mod(fm: &FlowMod) -> Vec<u8> {
    let mut v = Vec::with_capacity(56);
    v.extend_from_slice(&0u64.to_be_bytes()); // cookie
    v.extend_from_slice(&0u64.to_be_bytes()); // cookie mask
    match fm.command {
        FlowModCommand::Add => {
            v.push(fm.table_id);
            v.push(FLOW_ADD);
        }
        FlowModCommand::DeleteAll => {
            v.push(OFPTT_ALL);
            v.push(FLOW_DELETE);
        }
    }
    v.extend_from_slice(&fm.idle_timeout.to_be_bytes());
    v.extend_from_slice(&0u16.to_be_bytes()); // hard timeout
    v.extend_from_slice(&fm.priority.to_be_bytes());
    v.extend_from_slice(&NO_BUFFER.to_be_bytes());
    v.extend_from_slice(&OFPP_ANY.to_be_bytes());
    v.extend_from_slice(&OFPG_ANY.to_be_bytes());
    v.extend_from_slice(&0u16.to_be_bytes()); // flags
    v.extend_from_slice(&[0; 2]);
    let fields = match fm.command {
        FlowModCommand::Add => fm.fields.clone(),
        FlowModCommand::DeleteAll => Match::default(),
    };
    encode_match(&mut v, &fields);
    if !fm.actions.is_empty() {
        let mut actions = Vec::new();
        encode_actions(&mut actions, &fm.actions);
        v.extend_from_slice(&INSTRUCTION_APPLY_ACTIONS.to_be_bytes());
        v.extend_from_slice(&((8 + actions.len()) as u16).to_be_bytes());
        v.extend_from_slice(&[0; 4]);
        v.extend_from_slice(&actions);
    }
    v
}

fn decode_flow_mod(d: &[u8]) -> Result<FlowMod, Error> {
    need("flow mod", d, 48)?;
    let table_id = d[16];
    let command = match d[17] {
        FLOW_ADD => FlowModCommand::Add,
        FLOW_DELETE => FlowModCommand::DeleteAll,
        c => {
            return Err(Error::Malformed(
                "flow mod",
                format!("command {c}"),
            ))
        }
    };
    let (fields, match_len) = decode_match(&d[40..])?;
    let mut actions = Vec::new();
    let mut off = 40 + match_len;
    while off + 8 <= d.len() {
        let itype = u16_at(d, off);
        let ilen = usize::from(u16_at(d, off + 2));
        if ilen < 8 || off + ilen > d.len() {
            return Err(Error::Malformed(
                "instruction",
                format!("length {ilen}"),
            ));
        }
        if itype == INSTRUCTION_APPLY_ACTIONS {
            actions.extend(decode_actions(&d[off + 8..off + ilen])?);
        }
        off += ilen;
    }
    Ok(FlowMod {
        command,
        table_id: if table_id == OFPTT_ALL { 0 } else { table_id },
        priority: u16_at(d, 22),
        idle_timeout: u16_at(d, 18),
        fields,
        actions,
    })
}

fn encode_packet_in(pi: &PacketIn) -> Vec<u8> {
    let mut v = Vec::with_capacity(34 + pi.payload.len());
    v.extend_from_slice(&pi.buffer_id.unwrap_or(NO_BUFFER).to_be_bytes());
    v.extend_from_slice(&(pi.payload.len() as u16).to_be_bytes());
    v.push(pi.reason);
    v.push(pi.table_id);
    v.extend_from_slice(&0u64.to_be_bytes()); // cookie
    encode_match(
        &mut v,
        &Match {
            in_port: Some(pi.in_port),
            ..Default::default()
        },
    );
    v.extend_from_slice(&[0; 2]);
    v.extend_from_slice(&pi.payload);
    v
}

fn decode_packet_in(d: &[u8]) -> Result<PacketIn, Error> {
    need("packet in", d, 16)?;
    let buffer_id = match u32_at(d, 0) {
        NO_BUFFER => None,
        id => Some(id),
    };
    let (fields, match_len) = decode_match(&d[16..])?;
    let in_port = fields.in_port.ok_or_else(|| {
        Error::Malformed("packet in", "missing in_port".into())
    })?;
    let off = 16 + match_len + 2;
    need("packet in", d, off)?;
    Ok(PacketIn {
        buffer_id,
        in_port,
        table_id: d[7],
        reason: d[6],
        payload: d[off..].to_vec(),
    })
}

fn encode_packet_out(po: &PacketOut) -> Vec<u8> {
    let mut actions = Vec::new();
    encode_actions(&mut actions, &po.actions);
    let mut v = Vec::with_capacity(16 + actions.len() + po.payload.len());
    v.extend_from_slice(&NO_BUFFER.to_be_bytes());
    v.extend_from_slice(
        &po.in_port.unwrap_or(OFPP_CONTROLLER).to_be_bytes(),
    );
    v.extend_from_slice(&(actions.len() as u16).to_be_bytes());
    v.extend_from_slice(&[0; 6]);
    v.extend_from_slice(&actions);
    v.extend_from_slice(&po.payload);
    v
}

fn decode_packet_out(d: &[u8]) -> Result<PacketOut, Error> {
    need("packet out", d, 16)?;
    let actions_len = usize::from(u16_at(d, 8));
    need("packet out", d, 16 + actions_len)?;
    let in_port = match u32_at(d, 4) {
        OFPP_CONTROLLER => None,
        p => Some(p),
    };
    Ok(PacketOut {
        in_port,
        actions: decode_actions(&d[16..16 + actions_len])?,
        payload: d[16 + actions_len..].to_vec(),
    })
}

fn encode_port_status(ps: &PortStatus) -> Vec<u8> {
    let mut v = Vec::with_capacity(8 + PORT_LEN);
    v.push(match ps.reason {
        PortChange::Add => 0,
        PortChange::Delete => 1,
        PortChange::Modify => 2,
    });
    v.extend_from_slice(&[0; 7]);
    encode_port(&mut v, &ps.desc);
    v
}

fn decode_port_status(d: &[u8]) -> Result<PortStatus, Error> {
    need("port status", d, 8 + PORT_LEN)?;
    let reason = match d[0] {
        0 => PortChange::Add,
        1 => PortChange::Delete,
        2 => PortChange::Modify,
        r => {
            return Err(Error::Malformed(
                "port status",
                format!("reason {r}"),
            ))
        }
    };
    Ok(PortStatus {
        reason,
        desc: decode_port(&d[8..8 + PORT_LEN]),
    })
}

fn encode_flow_removed(fr: &FlowRemoved) -> Vec<u8> {
    let mut v = Vec::with_capacity(48);
    v.extend_from_slice(&0u64.to_be_bytes()); // cookie
    v.extend_from_slice(&fr.priority.to_be_bytes());
    v.push(fr.reason);
    v.push(fr.table_id);
    v.extend_from_slice(&0u32.to_be_bytes()); // duration sec
    v.extend_from_slice(&0u32.to_be_bytes()); // duration nsec
    v.extend_from_slice(&fr.idle_timeout.to_be_bytes());
    v.extend_from_slice(&0u16.to_be_bytes()); // hard timeout
    v.extend_from_slice(&0u64.to_be_bytes()); // packet count
    v.extend_from_slice(&0u64.to_be_bytes()); // byte count
    encode_match(&mut v, &Match::default());
    v
}

fn decode_flow_removed(d: &[u8]) -> Result<FlowRemoved, Error> {
    need("flow removed", d, 40)?;
    Ok(FlowRemoved {
        table_id: d[11],
        priority: u16_at(d, 8),
        reason: d[10],
        idle_timeout: u16_at(d, 20),
    })
}

fn encode_table_feature(v: &mut Vec<u8>, t: &TableFeature) {
    let mut props = Vec::new();

    let match_payload_len = 4 + t.matches.len() * 4;
    props.extend_from_slice(&PROP_MATCH.to_be_bytes());
    props.extend_from_slice(&(match_payload_len as u16).to_be_bytes());
    for field in &t.matches {
        props.extend_from_slice(
            &oxm_header(*field, false, oxm_payload_len(*field)).to_be_bytes(),
        );
    }
    props.resize(props.len() + pad_to8(match_payload_len), 0);

    let apply_payload_len = 4 + t.apply_actions.len() * 4;
    props.extend_from_slice(&PROP_APPLY_ACTIONS.to_be_bytes());
    props.extend_from_slice(&(apply_payload_len as u16).to_be_bytes());
    for atype in &t.apply_actions {
        props.extend_from_slice(&atype.to_be_bytes());
        props.extend_from_slice(&4u16.to_be_bytes());
    }
    props.resize(props.len() + pad_to8(apply_payload_len), 0);

    let length = 64 + props.len();
    v.extend_from_slice(&(length as u16).to_be_bytes());
    v.push(t.table_id);
    v.extend_from_slice(&[0; 5]);
    put_fixed_str(v, &t.name, 32);
    v.extend_from_slice(&0u64.to_be_bytes()); // metadata match
    v.extend_from_slice(&0u64.to_be_bytes()); // metadata write
    v.extend_from_slice(&0u32.to_be_bytes()); // config
    v.extend_from_slice(&0u32.to_be_bytes()); // max entries
    v.extend_from_slice(&props);
}

fn pad_to8(len: usize) -> usize {
    len.next_multiple_of(8) - len
}

fn decode_table_features(d: &[u8]) -> Result<Vec<TableFeature>, Error> {
    let mut tables = Vec::new();
    let mut off = 0;
    while off + 64 <= d.len() {
        let length = usize::from(u16_at(d, off));
        if length < 64 || off + length > d.len() {
            return Err(Error::Malformed(
                "table features",
                format!("entry length {length}"),
            ));
        }
        let mut t = TableFeature {
            table_id: d[off + 2],
            name: get_fixed_str(&d[off + 8..off + 40]),
            ..Default::default()
        };
        let mut poff = off + 64;
        let end = off + length;
        while poff + 4 <= end {
            let ptype = u16_at(d, poff);
            let plen = usize::from(u16_at(d, poff + 2));
            if plen < 4 || poff + plen > end {
                return Err(Error::Malformed(
                    "table feature property",
                    format!("length {plen}"),
                ));
            }
            match ptype {
                PROP_MATCH => {
                    for chunk in d[poff + 4..poff + plen].chunks_exact(4) {
                        let header =
                            u32::from_be_bytes(chunk.try_into().unwrap());
                        t.matches.push(((header >> 9) & 0x7f) as u8);
                    }
                }
                PROP_APPLY_ACTIONS => {
                    for chunk in d[poff + 4..poff + plen].chunks_exact(4) {
                        t.apply_actions.push(u16::from_be_bytes([
                            chunk[0], chunk[1],
                        ]));
                    }
                }
                _ => {}
            }
            poff += plen.next_multiple_of(8);
        }
        tables.push(t);
        off += length.next_multiple_of(8);
    }
    Ok(tables)
}
