// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builders for the flow-mod and packet-out messages the controller
//! installs. Priorities are layered so the router's rewrite rules beat the
//! learning switch, which beats the table-miss rule.

use crate::device::{Device, Port};
use crate::error::Error;
use of_common::net::MacAddr;
use openflow::messages::{
    Action, FlowMod, FlowModCommand, Match, OutputPort, PacketOut,
};
use std::net::Ipv4Addr;
use std::sync::Arc;

pub const PRIORITY_TABLE_MISS: u16 = 0;
pub const PRIORITY_L2: u16 = 20;
pub const PRIORITY_ROUTER: u16 = 30;

/// Idle timeout for learned and routed flows. A quiet flow ages out and
/// the next miss re-learns it.
pub const FLOW_IDLE_TIMEOUT: u16 = 30;

/// Everything needed to build one forwarding rule. When `target_mac`
/// differs from `dst_mac` the rule also rewrites the destination MAC
/// before output.
pub struct FlowParam<'a> {
    pub device: &'a Arc<Device>,
    pub ether_type: u16,
    pub in_port: u32,
    pub out_port: u32,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub target_mac: MacAddr,
    pub dst_ip: Option<(Ipv4Addr, u8)>,
    pub priority: u16,
}

pub fn install_flow(p: &FlowParam) -> Result<(), Error> {
    let mut actions = Vec::with_capacity(2);
    if p.target_mac != p.dst_mac {
        actions.push(Action::SetEthDst(p.target_mac));
    }
    actions.push(Action::Output(OutputPort::Physical(p.out_port)));
    p.device.send_message(&openflow::messages::Message::FlowMod(FlowMod {
        command: FlowModCommand::Add,
        table_id: p.device.flow_table_id(),
        priority: p.priority,
        idle_timeout: FLOW_IDLE_TIMEOUT,
        fields: Match {
            in_port: Some(p.in_port),
            eth_type: Some(p.ether_type),
            eth_src: Some(p.src_mac),
            eth_dst: Some(p.dst_mac),
            ipv4_dst: p.dst_ip,
        },
        actions,
    }))
}

/// Emit a frame on one port of a device.
pub fn packet_out_on(
    device: &Arc<Device>,
    port: u32,
    payload: Vec<u8>,
) -> Result<(), Error> {
    device.send_message(&openflow::messages::Message::PacketOut(
        PacketOut::single(port, payload),
    ))
}

/// Emit a frame on a port handle, resolving its device.
pub fn packet_out(port: &Arc<Port>, payload: Vec<u8>) -> Result<(), Error> {
    let device = port.device().ok_or(Error::Stale)?;
    packet_out_on(&device, port.number(), payload)
}

/// Clear every flow in every table of a device.
pub fn remove_all_flows(device: &Arc<Device>) -> Result<(), Error> {
    device.send_message(&openflow::messages::Message::FlowMod(
        FlowMod::delete_all(),
    ))
}

/// The rule that punts unmatched packets to the controller, at the bottom
/// of the chosen table.
pub fn install_table_miss(
    device: &Arc<Device>,
    table_id: u8,
) -> Result<(), Error> {
    device.send_message(&openflow::messages::Message::FlowMod(FlowMod {
        command: FlowModCommand::Add,
        table_id,
        priority: PRIORITY_TABLE_MISS,
        idle_timeout: 0,
        fields: Match::default(),
        actions: vec![Action::Output(OutputPort::Controller)],
    }))
}

/// A match-everything drop rule, installed on tables above the chosen
/// one so stray table jumps never forward.
pub fn install_baseline_drop(
    device: &Arc<Device>,
    table_id: u8,
) -> Result<(), Error> {
    device.send_message(&openflow::messages::Message::FlowMod(FlowMod {
        command: FlowModCommand::Add,
        table_id,
        priority: PRIORITY_TABLE_MISS,
        idle_timeout: 0,
        fields: Match::default(),
        actions: Vec::new(),
    }))
}

pub fn send_barrier(device: &Arc<Device>) -> Result<(), Error> {
    device.send_message(&openflow::messages::Message::BarrierRequest)
}
