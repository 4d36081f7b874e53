// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Version-agnostic message values. The factories translate these to and
//! from each protocol version's wire layout; the rest of the controller
//! never sees a version-specific byte.

use of_common::net::MacAddr;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello(Hello),
    Error(ErrorMessage),
    EchoRequest(Vec<u8>),
    EchoReply(Vec<u8>),
    FeaturesRequest,
    FeaturesReply(SwitchFeatures),
    DescRequest,
    DescReply(SwitchDescription),
    PortDescRequest,
    PortDescReply(Vec<PortDesc>),
    TableFeaturesRequest,
    TableFeaturesReply(Vec<TableFeature>),
    FlowMod(FlowMod),
    PacketIn(PacketIn),
    PacketOut(PacketOut),
    PortStatus(PortStatus),
    FlowRemoved(FlowRemoved),
    BarrierRequest,
    BarrierReply,
    /// A frame type the controller has no use for. Decoded losslessly enough
    /// to log and skip.
    Unsupported { msg_type: u8 },
}

impl Message {
    /// Short name for log lines.
    pub fn title(&self) -> &'static str {
        match self {
            Message::Hello(_) => "hello",
            Message::Error(_) => "error",
            Message::EchoRequest(_) => "echo request",
            Message::EchoReply(_) => "echo reply",
            Message::FeaturesRequest => "features request",
            Message::FeaturesReply(_) => "features reply",
            Message::DescRequest => "description request",
            Message::DescReply(_) => "description reply",
            Message::PortDescRequest => "port description request",
            Message::PortDescReply(_) => "port description reply",
            Message::TableFeaturesRequest => "table features request",
            Message::TableFeaturesReply(_) => "table features reply",
            Message::FlowMod(_) => "flow mod",
            Message::PacketIn(_) => "packet in",
            Message::PacketOut(_) => "packet out",
            Message::PortStatus(_) => "port status",
            Message::FlowRemoved(_) => "flow removed",
            Message::BarrierRequest => "barrier request",
            Message::BarrierReply => "barrier reply",
            Message::Unsupported { .. } => "unsupported",
        }
    }
}

/// HELLO payload: the set of protocol versions the sender can speak. A 1.0
/// peer sends no version bitmap; its hello decodes to the singleton list of
/// its header version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub versions: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub err_type: u16,
    pub code: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchFeatures {
    pub dpid: u64,
    pub n_buffers: u32,
    pub n_tables: u8,
    /// Populated for 1.0, which carries the port list here; 1.3 reports
    /// ports through a PORT_DESC multipart exchange instead.
    pub ports: Vec<PortDesc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchDescription {
    pub manufacturer: String,
    pub hardware: String,
    pub software: String,
    pub serial: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDesc {
    pub number: u32,
    pub hw_addr: MacAddr,
    pub name: String,
    pub admin_down: bool,
    pub link_down: bool,
}

impl PortDesc {
    pub fn is_up(&self) -> bool {
        !self.admin_down && !self.link_down
    }
}

/// One table's advertised capabilities, reduced to the OXM field ids it can
/// match and the action type ids it can apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFeature {
    pub table_id: u8,
    pub name: String,
    pub matches: Vec<u8>,
    pub apply_actions: Vec<u16>,
}

pub mod oxm {
    //! OXM field ids from the OFPXMC_OPENFLOW_BASIC class.
    pub const IN_PORT: u8 = 0;
    pub const ETH_DST: u8 = 3;
    pub const ETH_SRC: u8 = 4;
    pub const ETH_TYPE: u8 = 5;
    pub const IPV4_DST: u8 = 12;
}

pub mod action_type {
    pub const OUTPUT: u16 = 0;
    pub const SET_FIELD: u16 = 25;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    pub in_port: Option<u32>,
    pub eth_type: Option<u16>,
    pub eth_src: Option<MacAddr>,
    pub eth_dst: Option<MacAddr>,
    /// Destination address with prefix length. `/32` for host routes.
    pub ipv4_dst: Option<(Ipv4Addr, u8)>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputPort {
    Physical(u32),
    Controller,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetEthDst(MacAddr),
    Output(OutputPort),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlowModCommand {
    Add,
    /// Delete every flow in every table.
    DeleteAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    pub command: FlowModCommand,
    pub table_id: u8,
    pub priority: u16,
    pub idle_timeout: u16,
    pub fields: Match,
    pub actions: Vec<Action>,
}

impl FlowMod {
    pub fn delete_all() -> Self {
        Self {
            command: FlowModCommand::DeleteAll,
            table_id: 0,
            priority: 0,
            idle_timeout: 0,
            fields: Match::default(),
            actions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub buffer_id: Option<u32>,
    pub in_port: u32,
    pub table_id: u8,
    pub reason: u8,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    pub in_port: Option<u32>,
    pub actions: Vec<Action>,
    pub payload: Vec<u8>,
}

impl PacketOut {
    /// The common case: emit `payload` on one physical port.
    pub fn single(port: u32, payload: Vec<u8>) -> Self {
        Self {
            in_port: None,
            actions: vec![Action::Output(OutputPort::Physical(port))],
            payload,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PortChange {
    Add,
    Modify,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStatus {
    pub reason: PortChange,
    pub desc: PortDesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRemoved {
    pub table_id: u8,
    pub priority: u16,
    pub reason: u8,
    pub idle_timeout: u16,
}
