// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OpenFlow 1.0 codec. 1.0 has a single flow table addressed implicitly,
//! a 40-byte wildcard-bitmap match structure, and 16-bit port numbers.

use crate::factory::Factory;
use crate::messages::*;
use crate::wire::*;
use crate::{Error, Header, OFP10_VERSION};
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
    pub const STATS_REQUEST: u8 = 16;
    pub const STATS_REPLY: u8 = 17;
    pub const BARRIER_REQUEST: u8 = 18;
    pub const BARRIER_REPLY: u8 = 19;
}

const STATS_DESC: u16 = 0;

const OFPP_CONTROLLER: u16 = 0xfffd;
const OFPP_NONE: u16 = 0xffff;

const FLOW_ADD: u16 = 0;
const FLOW_DELETE: u16 = 3;

const NO_BUFFER: u32 = 0xffff_ffff;
const MAX_LEN_ALL: u16 = 0xffff;

const ACTION_OUTPUT: u16 = 0;
const ACTION_SET_DL_DST: u16 = 5;

// ofp_match wildcard bits.
const OFPFW_IN_PORT: u32 = 1 << 0;
const OFPFW_DL_SRC: u32 = 1 << 2;
const OFPFW_DL_DST: u32 = 1 << 3;
const OFPFW_DL_TYPE: u32 = 1 << 4;
const OFPFW_NW_DST_SHIFT: u32 = 14;
const OFPFW_NW_DST_MASK: u32 = 0x3f << OFPFW_NW_DST_SHIFT;
const OFPFW_ALL: u32 = (1 << 22) - 1;

const MATCH_LEN: usize = 40;
const PHY_PORT_LEN: usize = 48;

const OFPPC_PORT_DOWN: u32 = 1 << 0;
const OFPPS_LINK_DOWN: u32 = 1 << 0;

pub struct Of10Factory;

impl Factory for Of10Factory {
    fn version(&self) -> u8 {
        OFP10_VERSION
    }

    fn encode(&self, xid: u32, msg: &Message) -> Result<Vec<u8>, Error> {
        let (msg_type, body) = match msg {
            Message::Hello(_) => (msg_type::HELLO, Vec::new()),
            Message::Error(e) => (msg_type::ERROR, encode_error(e)),
            Message::EchoRequest(d) => (msg_type::ECHO_REQUEST, d.clone()),
            Message::EchoReply(d) => (msg_type::ECHO_REPLY, d.clone()),
            Message::FeaturesRequest => {
                (msg_type::FEATURES_REQUEST, Vec::new())
            }
            Message::FeaturesReply(f) => {
                (msg_type::FEATURES_REPLY, encode_features(f))
            }
            Message::DescRequest => {
                (msg_type::STATS_REQUEST, encode_stats_header(STATS_DESC))
            }
            Message::DescReply(d) => {
                let mut body = encode_stats_header(STATS_DESC);
                encode_desc(&mut body, d);
                (msg_type::STATS_REPLY, body)
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
            Message::PortDescRequest
            | Message::PortDescReply(_)
            | Message::TableFeaturesRequest
            | Message::TableFeaturesReply(_) => {
                return Err(Error::Unsupported(
                    "port/table multipart",
                    OFP10_VERSION,
                ))
            }
            Message::Unsupported { msg_type } => {
                return Err(Error::Malformed(
                    "message",
                    format!("cannot encode unsupported type {msg_type}"),
                ))
            }
        };
        let mut frame =
            Header::new(OFP10_VERSION, msg_type, body.len(), xid)
                .to_bytes()
                .to_vec();
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    fn decode(&self, header: &Header, body: &[u8]) -> Result<Message, Error> {
        Ok(match header.msg_type {
            msg_type::HELLO => {
                Message::Hello(crate::factory::decode_hello(header, body)?)
            }
            msg_type::ERROR => Message::Error(decode_error(body)?),
            msg_type::ECHO_REQUEST => Message::EchoRequest(body.to_vec()),
            msg_type::ECHO_REPLY => Message::EchoReply(body.to_vec()),
            msg_type::FEATURES_REQUEST => Message::FeaturesRequest,
            msg_type::FEATURES_REPLY => {
                Message::FeaturesReply(decode_features(body)?)
            }
            msg_type::STATS_REQUEST => {
                need("stats request", body, 4)?;
                match u16_at(body, 0) {
                    STATS_DESC => Message::DescRequest,
                    _ => Message::Unsupported {
                        msg_type: header.msg_type,
                    },
                }
            }
            msg_type::STATS_REPLY => {
                need("stats reply", body, 4)?;
                match u16_at(body, 0) {
                    STATS_DESC => Message::DescReply(decode_desc(&body[4..])?),
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

fn encode_stats_header(stats_type: u16) -> Vec<u8> {
    let mut v = Vec::with_capacity(4);
    v.extend_from_slice(&stats_type.to_be_bytes());
    v.extend_from_slice(&0u16.to_be_bytes()); // flags
    v
}

fn encode_features(f: &SwitchFeatures) -> Vec<u8> {
    let mut v = Vec::with_capacity(24 + f.ports.len() * PHY_PORT_LEN);
    v.extend_from_slice(&f.dpid.to_be_bytes());
    v.extend_from_slice(&f.n_buffers.to_be_bytes());
    v.push(f.n_tables);
    v.extend_from_slice(&[0; 3]);
    v.extend_from_slice(&0u32.to_be_bytes()); // capabilities
    v.extend_from_slice(&0u32.to_be_bytes()); // actions
    for p in &f.ports {
        encode_phy_port(&mut v, p);
    }
    v
}

fn decode_features(d: &[u8]) -> Result<SwitchFeatures, Error> {
    need("features reply", d, 24)?;
    let mut ports = Vec::new();
    let mut off = 24;
    while off + PHY_PORT_LEN <= d.len() {
        ports.push(decode_phy_port(&d[off..off + PHY_PORT_LEN]));
        off += PHY_PORT_LEN;
    }
    Ok(SwitchFeatures {
        dpid: u64_at(d, 0),
        n_buffers: u32_at(d, 8),
        n_tables: d[12],
        ports,
    })
}

fn encode_phy_port(v: &mut Vec<u8>, p: &PortDesc) {
    v.extend_from_slice(&(p.number as u16).to_be_bytes());
    v.extend_from_slice(&p.hw_addr.octets());
    put_fixed_str(v, &p.name, 16);
    let config = if p.admin_down { OFPPC_PORT_DOWN } else { 0 };
    let state = if p.link_down { OFPPS_LINK_DOWN } else { 0 };
    v.extend_from_slice(&config.to_be_bytes());
    v.extend_from_slice(&state.to_be_bytes());
    v.extend_from_slice(&[0; 16]); // curr/advertised/supported/peer
}

fn decode_phy_port(d: &[u8]) -> PortDesc {
    PortDesc {
        number: u32::from(u16_at(d, 0)),
        hw_addr: MacAddr(mac_at(d, 2)),
        name: get_fixed_str(&d[8..24]),
        admin_down: u32_at(d, 24) & OFPPC_PORT_DOWN != 0,
        link_down: u32_at(d, 28) & OFPPS_LINK_DOWN != 0,
    }
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

fn encode_match(v: &mut Vec<u8>, m: &Match) {
    let mut wildcards = OFPFW_ALL;
    let mut in_port = 0u16;
    let mut dl_src = [0u8; 6];
    let mut dl_dst = [0u8; 6];
    let mut dl_type = 0u16;
    let mut nw_dst = 0u32;
    if let Some(p) = m.in_port {
        wildcards &= !OFPFW_IN_PORT;
        in_port = p as u16;
    }
    if let Some(mac) = m.eth_src {
        wildcards &= !OFPFW_DL_SRC;
        dl_src = mac.octets();
    }
    if let Some(mac) = m.eth_dst {
        wildcards &= !OFPFW_DL_DST;
        dl_dst = mac.octets();
    }
    if let Some(t) = m.eth_type {
        wildcards &= !OFPFW_DL_TYPE;
        dl_type = t;
    }
    if let Some((ip, prefix)) = m.ipv4_dst {
        let free_bits = u32::from(32 - prefix.min(32));
        wildcards = (wildcards & !OFPFW_NW_DST_MASK)
            | (free_bits << OFPFW_NW_DST_SHIFT);
        nw_dst = u32::from(ip);
    }
    v.extend_from_slice(&wildcards.to_be_bytes());
    v.extend_from_slice(&in_port.to_be_bytes());
    v.extend_from_slice(&dl_src);
    v.extend_from_slice(&dl_dst);
    v.extend_from_slice(&0u16.to_be_bytes()); // dl_vlan
    v.push(0); // dl_vlan_pcp
    v.push(0); // pad
    v.extend_from_slice(&dl_type.to_be_bytes());
    v.push(0); // nw_tos
    v.push(0); // nw_proto
    v.extend_from_slice(&[0; 2]); // pad
    v.extend_from_slice(&0u32.to_be_bytes()); // nw_src
    v.extend_from_slice(&nw_dst.to_be_bytes());
    v.extend_from_slice(&0u16.to_be_bytes()); // tp_src
    v.extend_from_slice(&0u16.to_be_bytes()); // tp_dst
}

fn decode_match(d: &[u8]) -> Match {
    let wildcards = u32_at(d, 0);
    let mut m = Match::default();
    if wildcards & OFPFW_IN_PORT == 0 {
        m.in_port = Some(u32::from(u16_at(d, 4)));
    }
    if wildcards & OFPFW_DL_SRC == 0 {
        m.eth_src = Some(MacAddr(mac_at(d, 6)));
    }
    if wildcards & OFPFW_DL_DST == 0 {
        m.eth_dst = Some(MacAddr(mac_at(d, 12)));
    }
    if wildcards & OFPFW_DL_TYPE == 0 {
        m.eth_type = Some(u16_at(d, 22));
    }
    let free_bits = (wildcards & OFPFW_NW_DST_MASK) >> OFPFW_NW_DST_SHIFT;
    if free_bits < 32 {
        m.ipv4_dst = Some((
            Ipv4Addr::from(u32_at(d, 32)),
            (32 - free_bits) as u8,
        ));
    }
    m
}

fn encode_actions(v: &mut Vec<u8>, actions: &[Action]) {
    for a in actions {
        match a {
            Action::Output(port) => {
                let port = match port {
                    OutputPort::Physical(p) => *p as u16,
                    OutputPort::Controller => OFPP_CONTROLLER,
                };
                v.extend_from_slice(&ACTION_OUTPUT.to_be_bytes());
                v.extend_from_slice(&8u16.to_be_bytes());
                v.extend_from_slice(&port.to_be_bytes());
                v.extend_from_slice(&MAX_LEN_ALL.to_be_bytes());
            }
            Action::SetEthDst(mac) => {
                v.extend_from_slice(&ACTION_SET_DL_DST.to_be_bytes());
                v.extend_from_slice(&16u16.to_be_bytes());
                v.extend_from_slice(&mac.octets());
                v.extend_from_slice(&[0; 6]);
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
            ACTION_OUTPUT => {
                let port = u16_at(d, off + 4);
                actions.push(Action::Output(if port == OFPP_CONTROLLER {
                    OutputPort::Controller
                } else {
                    OutputPort::Physical(u32::from(port))
                }));
            }
            ACTION_SET_DL_DST => {
                actions.push(Action::SetEthDst(MacAddr(mac_at(d, off + 4))));
            }
            _ => {}
        }
        off += alen;
    }
    Ok(actions)
}

fn encode_flow_mod(fm: &FlowMod) -> Vec<u8> {
    let mut v = Vec::with_capacity(MATCH_LEN + 24);
    let (command, fields, out_port) = match fm.command {
        FlowModCommand::Add => (FLOW_ADD, fm.fields.clone(), OFPP_NONE),
        FlowModCommand::DeleteAll => {
            (FLOW_DELETE, Match::default(), OFPP_NONE)
        }
    };
    encode_match(&mut v, &fields);
    v.extend_from_slice(&0u64.to_be_bytes()); // cookie
    v.extend_from_slice(&command.to_be_bytes());
    v.extend_from_slice(&fm.idle_timeout.to_be_bytes());
    v.extend_from_slice(&0u16.to_be_bytes()); // hard timeout
    v.extend_from_slice(&fm.priority.to_be_bytes());
    v.extend_from_slice(&NO_BUFFER.to_be_bytes());
    v.extend_from_slice(&out_port.to_be_bytes());
    v.extend_from_slice(&0u16.to_be_bytes()); // flags
    encode_actions(&mut v, &fm.actions);
    v
}

fn decode_flow_mod(d: &[u8]) -> Result<FlowMod, Error> {
    need("flow mod", d, MATCH_LEN + 24)?;
    let fields = decode_match(d);
    let command = match u16_at(d, MATCH_LEN + 8) {
        FLOW_ADD => FlowModCommand::Add,
        FLOW_DELETE => FlowModCommand::DeleteAll,
        c => {
            return Err(Error::Malformed(
                "flow mod",
                format!("command {c}"),
            ))
        }
    };
    Ok(FlowMod {
        command,
        table_id: 0,
        priority: u16_at(d, MATCH_LEN + 14),
        idle_timeout: u16_at(d, MATCH_LEN + 10),
        fields,
        actions: decode_actions(&d[MATCH_LEN + 24..])?,
    })
}

fn encode_packet_in(pi: &PacketIn) -> Vec<u8> {
    let mut v = Vec::with_capacity(10 + pi.payload.len());
    v.extend_from_slice(&pi.buffer_id.unwrap_or(NO_BUFFER).to_be_bytes());
    v.extend_from_slice(&(pi.payload.len() as u16).to_be_bytes());
    v.extend_from_slice(&(pi.in_port as u16).to_be_bytes());
    v.push(pi.reason);
    v.push(0);
    v.extend_from_slice(&pi.payload);
    v
}

fn decode_packet_in(d: &[u8]) -> Result<PacketIn, Error> {
    need("packet in", d, 10)?;
    let buffer_id = match u32_at(d, 0) {
        NO_BUFFER => None,
        id => Some(id),
    };
    Ok(PacketIn {
        buffer_id,
        in_port: u32::from(u16_at(d, 6)),
        table_id: 0,
        reason: d[8],
        payload: d[10..].to_vec(),
    })
}

fn encode_packet_out(po: &PacketOut) -> Vec<u8> {
    let mut actions = Vec::new();
    encode_actions(&mut actions, &po.actions);
    let mut v = Vec::with_capacity(8 + actions.len() + po.payload.len());
    v.extend_from_slice(&NO_BUFFER.to_be_bytes());
    let in_port = po.in_port.map(|p| p as u16).unwrap_or(OFPP_NONE);
    v.extend_from_slice(&in_port.to_be_bytes());
    v.extend_from_slice(&(actions.len() as u16).to_be_bytes());
    v.extend_from_slice(&actions);
    v.extend_from_slice(&po.payload);
    v
}

fn decode_packet_out(d: &[u8]) -> Result<PacketOut, Error> {
    need("packet out", d, 8)?;
    let actions_len = usize::from(u16_at(d, 6));
    need("packet out", d, 8 + actions_len)?;
    let in_port = match u16_at(d, 4) {
        OFPP_NONE => None,
        p => Some(u32::from(p)),
    };
    Ok(PacketOut {
        in_port,
        actions: decode_actions(&d[8..8 + actions_len])?,
        payload: d[8 + actions_len..].to_vec(),
    })
}

fn encode_port_status(ps: &PortStatus) -> Vec<u8> {
    let mut v = Vec::with_capacity(8 + PHY_PORT_LEN);
    v.push(match ps.reason {
        PortChange::Add => 0,
        PortChange::Delete => 1,
        PortChange::Modify => 2,
    });
    v.extend_from_slice(&[0; 7]);
    encode_phy_port(&mut v, &ps.desc);
    v
}

fn decode_port_status(d: &[u8]) -> Result<PortStatus, Error> {
    need("port status", d, 8 + PHY_PORT_LEN)?;
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
        desc: decode_phy_port(&d[8..8 + PHY_PORT_LEN]),
    })
}

fn encode_flow_removed(fr: &FlowRemoved) -> Vec<u8> {
    let mut v = Vec::with_capacity(MATCH_LEN + 48);
    encode_match(&mut v, &Match::default());
    v.extend_from_slice(&0u64.to_be_bytes()); // cookie
    v.extend_from_slice(&fr.priority.to_be_bytes());
    v.push(fr.reason);
    v.push(0);
    v.extend_from_slice(&0u32.to_be_bytes()); // duration sec
    v.extend_from_slice(&0u32.to_be_bytes()); // duration nsec
    v.extend_from_slice(&fr.idle_timeout.to_be_bytes());
    v.extend_from_slice(&[0; 2]);
    v.extend_from_slice(&0u64.to_be_bytes()); // packet count
    v.extend_from_slice(&0u64.to_be_bytes()); // byte count
    v
}

fn decode_flow_removed(d: &[u8]) -> Result<FlowRemoved, Error> {
    need("flow removed", d, MATCH_LEN + 40)?;
    Ok(FlowRemoved {
        table_id: 0,
        priority: u16_at(d, MATCH_LEN + 8),
        reason: d[MATCH_LEN + 10],
        idle_timeout: u16_at(d, MATCH_LEN + 20),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip(msg: Message) -> Message {
        let f = Of10Factory;
        let frame = f.encode(7, &msg).unwrap();
        let header = Header::from_bytes(&frame[..8]).unwrap();
        assert_eq!(header.version, OFP10_VERSION);
        assert_eq!(usize::from(header.length), frame.len());
        assert_eq!(header.xid, 7);
        f.decode(&header, &frame[8..]).unwrap()
    }

    #[test]
    fn flow_mod_roundtrip() {
        let fm = FlowMod {
            command: FlowModCommand::Add,
            table_id: 0,
            priority: 20,
            idle_timeout: 30,
            fields: Match {
                in_port: Some(1),
                eth_type: Some(0x0800),
                eth_src: Some("aa:aa:aa:aa:aa:01".parse().unwrap()),
                eth_dst: Some("bb:bb:bb:bb:bb:02".parse().unwrap()),
                ipv4_dst: Some((Ipv4Addr::new(10, 0, 0, 1), 32)),
            },
            actions: vec![
                Action::SetEthDst("00:11:22:33:44:55".parse().unwrap()),
                Action::Output(OutputPort::Physical(2)),
            ],
        };
        assert_eq!(roundtrip(Message::FlowMod(fm.clone())), Message::FlowMod(fm));
    }

    #[test]
    fn features_reply_carries_ports() {
        let f = SwitchFeatures {
            dpid: 0x01,
            n_buffers: 256,
            n_tables: 1,
            ports: vec![PortDesc {
                number: 1,
                hw_addr: "02:00:00:00:00:01".parse().unwrap(),
                name: "eth1".into(),
                admin_down: false,
                link_down: false,
            }],
        };
        match roundtrip(Message::FeaturesReply(f.clone())) {
            Message::FeaturesReply(back) => assert_eq!(back, f),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn packet_in_roundtrip() {
        let pi = PacketIn {
            buffer_id: None,
            in_port: 3,
            table_id: 0,
            reason: 0,
            payload: vec![1, 2, 3],
        };
        assert_eq!(
            roundtrip(Message::PacketIn(pi.clone())),
            Message::PacketIn(pi)
        );
    }

    #[test]
    fn packet_out_roundtrip() {
        let po = PacketOut::single(9, vec![0xab; 20]);
        assert_eq!(
            roundtrip(Message::PacketOut(po.clone())),
            Message::PacketOut(po)
        );
    }

    #[test]
    fn delete_all_uses_delete_command() {
        let f = Of10Factory;
        let frame = f
            .encode(1, &Message::FlowMod(FlowMod::delete_all()))
            .unwrap();
        // command lives right after the header and 40-byte match + cookie
        let off = 8 + MATCH_LEN + 8;
        assert_eq!(u16_at(&frame, off), FLOW_DELETE);
    }

    #[test]
    fn desc_roundtrip() {
        let d = SwitchDescription {
            manufacturer: "ovs".into(),
            hardware: "virtual".into(),
            software: "2.17".into(),
            serial: "none".into(),
            description: "test bridge".into(),
        };
        assert_eq!(
            roundtrip(Message::DescReply(d.clone())),
            Message::DescReply(d)
        );
    }

    #[test]
    fn table_multipart_unsupported() {
        let f = Of10Factory;
        assert!(f.encode(1, &Message::TableFeaturesRequest).is_err());
        assert!(f.encode(1, &Message::PortDescRequest).is_err());
    }
}
