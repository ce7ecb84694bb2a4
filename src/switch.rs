//! The switch node kind: a reactive handler with no multi-step state.
//!
//! Data packets are forwarded hop-by-hop using only the locally stored
//! next-hop table; control packets are the table's only mutator. The
//! switch never consults global topology when forwarding.

use crate::{
    error::SimError,
    packet::{Packet, CTRL_PACKET, DATA_PACKET},
    protocol,
    quantities::NodeId,
    registry::KindName,
    simulation::{Kinds, Simulation},
    topology::NodeProto,
};

pub const SWITCH: KindName = "switch";

/// Registers the switch node kind.
pub fn register(kinds: &mut Kinds) {
    kinds.nodes.register(SWITCH, NodeProto { on_recv });
}

/// Parses a control message of the form `"<dest> <next>"`.
fn parse_update(msg: &str) -> Result<(NodeId, NodeId), SimError> {
    let mut parts = msg.split_whitespace();
    let dest = parts.next().and_then(|t| t.parse().ok());
    let next = parts.next().and_then(|t| t.parse().ok());
    match (dest, next, parts.next()) {
        (Some(dest), Some(next), None) => Ok((dest, next)),
        _ => Err(SimError::MalformedControl(msg.to_owned())),
    }
}

fn on_recv(sim: &mut Simulation, id: NodeId, packet: &mut Packet) {
    if packet.kind() == DATA_PACKET {
        let dst = packet.header().dst;
        if dst == id {
            // end of the journey
            return;
        }
        let Some(next) = sim.topology().node(id).and_then(|node| node.next_hop(dst)) else {
            // unreachable destination, drop silently
            return;
        };
        let header = packet.header_mut();
        header.pre = id;
        header.nex = next;
        protocol::send_intent(sim, packet);
    } else if packet.kind() == CTRL_PACKET {
        match parse_update(&packet.payload().msg) {
            Ok((dest, next)) => {
                if let Some(node) = sim.topology_mut().node_mut(id) {
                    node.set_next_hop(dest, next);
                }
            }
            Err(e) => sim.log(&format!("switch {id}: {e}")),
        }
    } else {
        sim.log(&format!(
            "switch {id}: cannot handle `{}` packet",
            packet.kind()
        ));
    }
}
