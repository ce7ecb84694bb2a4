//! The send/receive event chain that moves packets between nodes.
//!
//! A node's intent to send becomes a `send` event at the current clock;
//! its trigger fans the packet out to the addressed neighbor (or all of
//! them, for a broadcast next-hop) as `recv` events delayed by the link
//! latency. The two-step chain keeps queuing delay distinct from link
//! delay.

use crate::{
    error::SimError,
    packet::{Packet, CTRL_PACKET, DATA_PACKET},
    quantities::{NodeId, Time},
    registry::KindName,
    simulation::{Event, EventProto, Kinds, Simulation},
    topology::Node,
};

pub const SEND_EVENT: KindName = "send";
pub const RECV_EVENT: KindName = "recv";

/// Registers the send and receive event kinds.
pub fn register(kinds: &mut Kinds) {
    kinds
        .events
        .register(SEND_EVENT, EventProto { on_trigger: on_send });
    kinds
        .events
        .register(RECV_EVENT, EventProto { on_trigger: on_recv });
}

/// Turns a node's "send" intent into a `send` event at the current
/// clock, addressed from the header's previous-hop to its next-hop. The
/// caller keeps ownership of `packet`; the event carries a replica.
pub fn send_intent(sim: &mut Simulation, packet: &Packet) {
    let copy = match sim.replicate(packet) {
        Ok(copy) => copy,
        Err(e) => {
            sim.log(&format!("send intent error: {e}"));
            return;
        }
    };
    let sender = copy.header().pre;
    let receiver = copy.header().nex;
    let now = sim.clock();
    if let Err(e) = sim.schedule(SEND_EVENT, now, sender, receiver, copy) {
        sim.log(&format!("send intent error: {e}"));
    }
}

/// `send` trigger: one `recv` per addressed neighbor, each delayed by its
/// own link latency and carrying an independently replicated packet. The
/// input packet is released after the fan-out.
fn on_send(sim: &mut Simulation, event: Event) {
    let Event { sender, packet, .. } = event;
    if !sim.topology().contains(sender) {
        sim.log(&format!("send event error: {}", SimError::NoSuchNode(sender)));
        sim.discard(packet);
        return;
    }
    let nex = packet.header().nex;
    let targets: Vec<NodeId> = sim
        .topology()
        .neighbors(sender)
        .filter(|&nb| nex.is_broadcast() || nb == nex)
        .collect();
    for nb in targets {
        let Some(latency) = sim.topology().link(sender, nb).map(|link| link.latency) else {
            sim.log(&format!(
                "send event error: {}",
                SimError::NoSuchLink(sender, nb)
            ));
            continue;
        };
        let arrival = sim.clock() + latency;
        match sim.replicate(&packet) {
            Ok(copy) => {
                if let Err(e) = sim.schedule(RECV_EVENT, arrival, sender, nb, copy) {
                    sim.log(&format!("send event error: {e}"));
                }
            }
            Err(e) => sim.log(&format!("send event error: {e}")),
        }
    }
    sim.discard(packet);
}

/// `recv` trigger: hand the packet to the receiving node's kind handler,
/// then release it unconditionally. A missing receiver drops the packet
/// with a report and nothing else happens.
fn on_recv(sim: &mut Simulation, event: Event) {
    let Event {
        receiver,
        mut packet,
        ..
    } = event;
    let Some(kind) = sim.topology().node(receiver).map(Node::kind) else {
        sim.log(&format!(
            "recv event error: {}",
            SimError::NoSuchNode(receiver)
        ));
        sim.discard(packet);
        return;
    };
    let proto = match sim.kinds().nodes.get(kind) {
        Ok(proto) => *proto,
        Err(e) => {
            sim.log(&format!("recv event error: {e}"));
            sim.discard(packet);
            return;
        }
    };
    (proto.on_recv)(sim, receiver, &mut packet);
    sim.discard(packet);
}

/// Injects an externally requested data packet: a self-delivery at the
/// source, from where normal forwarding takes over.
pub fn inject_data(
    sim: &mut Simulation,
    time: Time,
    src: NodeId,
    dst: NodeId,
    msg: &str,
) -> Result<(), SimError> {
    if !sim.topology().contains(src) {
        return Err(SimError::NoSuchNode(src));
    }
    if !dst.is_broadcast() && !sim.topology().contains(dst) {
        return Err(SimError::NoSuchNode(dst));
    }
    let mut packet = sim.create_packet(DATA_PACKET)?;
    let header = packet.header_mut();
    header.src = src;
    header.dst = dst;
    header.pre = src;
    header.nex = src;
    packet.payload_mut().msg = msg.to_owned();
    sim.schedule(RECV_EVENT, time, src, src, packet)
}

/// Injects a forwarding-table update from the controller straight at the
/// target switch. The controller is out-of-band; its id is one past the
/// largest switch id.
pub fn inject_control(
    sim: &mut Simulation,
    time: Time,
    target: NodeId,
    msg: &str,
) -> Result<(), SimError> {
    if target.is_broadcast() {
        return Err(SimError::ReservedId);
    }
    if !sim.topology().contains(target) {
        return Err(SimError::NoSuchNode(target));
    }
    let controller = NodeId::new(sim.topology().node_count() as u32);
    let mut packet = sim.create_packet(CTRL_PACKET)?;
    let header = packet.header_mut();
    header.src = controller;
    header.dst = target;
    header.pre = controller;
    header.nex = target;
    packet.payload_mut().msg = msg.to_owned();
    sim.schedule(RECV_EVENT, time, controller, target, packet)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{RECV_EVENT, SEND_EVENT};
    use crate::{
        logging::{NothingLogger, VecTrace},
        packet::DATA_PACKET,
        quantities::{NodeId, Time},
        simulation::Simulation,
        switch,
        topology::SIMPLE_LINK,
    };

    fn star(n: u32) -> (Simulation, std::rc::Rc<std::cell::RefCell<Vec<crate::logging::TraceRecord>>>)
    {
        let trace = VecTrace::new();
        let handle = trace.handle();
        let mut sim = Simulation::new(
            Time::from_ticks(1_000),
            Box::new(NothingLogger),
            Box::new(trace),
        );
        crate::packet::register(sim.kinds_mut());
        crate::topology::register(sim.kinds_mut());
        super::register(sim.kinds_mut());
        switch::register(sim.kinds_mut());
        for id in 0..n {
            sim.create_node(switch::SWITCH, NodeId::new(id)).unwrap();
        }
        for id in 1..n {
            sim.connect(NodeId::new(0), NodeId::new(id), SIMPLE_LINK)
                .unwrap();
            sim.connect(NodeId::new(id), NodeId::new(0), SIMPLE_LINK)
                .unwrap();
        }
        (sim, handle)
    }

    #[test]
    fn broadcast_fans_out_to_every_neighbor() {
        let (mut sim, trace) = star(4);
        let mut packet = sim.create_packet(DATA_PACKET).unwrap();
        let header = packet.header_mut();
        header.src = NodeId::new(0);
        header.pre = NodeId::new(0);
        header.nex = NodeId::BROADCAST;
        let id = packet.id();
        sim.schedule(SEND_EVENT, Time::ZERO, NodeId::new(0), NodeId::BROADCAST, packet)
            .unwrap();
        sim.run().unwrap();

        let trace = trace.borrow();
        let recvs: Vec<_> = trace.iter().filter(|r| r.event == RECV_EVENT).collect();
        assert_eq!(recvs.len(), 3);
        let receivers: Vec<_> = recvs.iter().map(|r| r.receiver).collect();
        assert_eq!(
            receivers.len(),
            receivers
                .iter()
                .collect::<std::collections::BTreeSet<_>>()
                .len()
        );
        assert!(recvs.iter().all(|r| r.packet == id));
        assert!(recvs.iter().all(|r| r.time == Time::from_ticks(10)));
        assert_eq!(sim.live_packets(), 0);
    }

    #[test]
    fn unicast_arrives_after_the_link_latency() {
        let (mut sim, trace) = star(2);
        let mut packet = sim.create_packet(DATA_PACKET).unwrap();
        let header = packet.header_mut();
        header.src = NodeId::new(0);
        header.dst = NodeId::new(1);
        header.pre = NodeId::new(0);
        header.nex = NodeId::new(1);
        sim.schedule(SEND_EVENT, Time::ZERO, NodeId::new(0), NodeId::new(1), packet)
            .unwrap();
        sim.run().unwrap();

        let trace = trace.borrow();
        let recvs: Vec<_> = trace.iter().filter(|r| r.event == RECV_EVENT).collect();
        assert_eq!(recvs.len(), 1);
        assert_eq!(recvs[0].receiver, NodeId::new(1));
        assert_eq!(recvs[0].time, Time::from_ticks(10));
    }

    #[test]
    fn receive_at_a_missing_node_drops_the_packet() {
        let (mut sim, trace) = star(2);
        let packet = sim.create_packet(DATA_PACKET).unwrap();
        sim.schedule(
            RECV_EVENT,
            Time::from_ticks(5),
            NodeId::new(0),
            NodeId::new(9),
            packet,
        )
        .unwrap();
        sim.run().unwrap();
        assert_eq!(sim.live_packets(), 0);
        // the event fired (and was traced) but had no further effect
        assert_eq!(trace.borrow().len(), 1);
    }

    #[test]
    fn injection_rejects_unknown_endpoints() {
        let (mut sim, _) = star(2);
        assert!(super::inject_data(
            &mut sim,
            Time::ZERO,
            NodeId::new(7),
            NodeId::new(1),
            "default"
        )
        .is_err());
        assert!(super::inject_control(&mut sim, Time::ZERO, NodeId::new(7), "1 0").is_err());
        assert_eq!(sim.live_packets(), 0);
        assert_eq!(sim.pending_events(), 0);
    }
}
