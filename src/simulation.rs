use std::{
    cmp::Reverse,
    hash::{BuildHasherDefault, Hasher},
};

use priority_queue::PriorityQueue;
use rustc_hash::{FxHashMap, FxHasher};

use crate::{
    error::SimError,
    logging::{Logger, TraceRecord, TraceSink},
    packet::{Header, Packet, PacketProto, Payload},
    quantities::{NodeId, PacketId, Time},
    registry::{KindName, Registry},
    topology::{Link, LinkProto, Node, NodeProto, Topology},
};

pub type HeaderCtor = fn() -> Header;
pub type PayloadCtor = fn() -> Payload;

/// A scheduled occurrence: at `time`, hand `packet` to the handler of
/// `kind`. Events are consumed exactly once; the handler takes ownership
/// of the packet and must discard it.
#[derive(Debug)]
pub struct Event {
    pub kind: KindName,
    pub time: Time,
    pub sender: NodeId,
    pub receiver: NodeId,
    pub packet: Packet,
}

/// Prototype of an event kind: what happens when it fires.
#[derive(Clone, Copy)]
pub struct EventProto {
    pub on_trigger: fn(&mut Simulation, Event),
}

/// The registries of every open variant family. New kinds are added by
/// registering a prototype; none of the dispatching code changes.
pub struct Kinds {
    pub headers: Registry<HeaderCtor>,
    pub payloads: Registry<PayloadCtor>,
    pub packets: Registry<PacketProto>,
    pub nodes: Registry<NodeProto>,
    pub links: Registry<LinkProto>,
    pub events: Registry<EventProto>,
}

impl Kinds {
    #[must_use]
    fn new() -> Kinds {
        Kinds {
            headers: Registry::new("header"),
            payloads: Registry::new("payload"),
            packets: Registry::new("packet"),
            nodes: Registry::new("node"),
            links: Registry::new("link"),
            events: Registry::new("event"),
        }
    }
}

/// Deterministic order among events sharing a trigger time: hash of a
/// canonical string, reproducible across runs with identical input.
fn tie_break(time: Time, sender: NodeId, receiver: NodeId, packet: PacketId) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(format!("{time} {sender} {receiver} {packet}").as_bytes());
    hasher.finish()
}

/// Time-ordered event queue. Entries are keyed by an opaque handle so the
/// priority structure stays cheap to hash; ordering is (trigger time,
/// tie-break hash) ascending.
struct EventQueue {
    waiting: FxHashMap<u64, Event>,
    queue: PriorityQueue<u64, Reverse<(u64, u64)>, BuildHasherDefault<FxHasher>>,
    next_handle: u64,
}

impl EventQueue {
    fn new() -> EventQueue {
        EventQueue {
            waiting: FxHashMap::default(),
            queue: PriorityQueue::<_, _, BuildHasherDefault<FxHasher>>::with_default_hasher(),
            next_handle: 0,
        }
    }

    fn push(&mut self, event: Event) {
        let tie = tie_break(event.time, event.sender, event.receiver, event.packet.id());
        let handle = self.next_handle;
        self.next_handle += 1;
        self.queue.push(handle, Reverse((event.time.ticks(), tie)));
        self.waiting.insert(handle, event);
    }

    fn next_time(&self) -> Option<Time> {
        self.queue
            .peek()
            .map(|(_, Reverse((t, _)))| Time::from_ticks(*t))
    }

    fn pop_next(&mut self) -> Option<Event> {
        let (handle, _) = self.queue.pop()?;
        self.waiting.remove(&handle)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// One self-contained simulation run.
///
/// Owns every piece of state the run touches: the kind registries, the
/// topology, the event queue, the clock and the packet counters. Nothing
/// is process-global, so independent runs cannot observe each other.
pub struct Simulation {
    kinds: Kinds,
    topology: Topology,
    queue: EventQueue,
    clock: Time,
    end_time: Time,
    next_packet_id: u64,
    live_packets: i64,
    logger: Box<dyn Logger>,
    trace: Box<dyn TraceSink>,
}

impl Simulation {
    #[must_use]
    pub fn new(end_time: Time, logger: Box<dyn Logger>, trace: Box<dyn TraceSink>) -> Simulation {
        Simulation {
            kinds: Kinds::new(),
            topology: Topology::default(),
            queue: EventQueue::new(),
            clock: Time::ZERO,
            end_time,
            next_packet_id: 0,
            live_packets: 0,
            logger,
            trace,
        }
    }

    #[must_use]
    pub const fn kinds(&self) -> &Kinds {
        &self.kinds
    }

    pub fn kinds_mut(&mut self) -> &mut Kinds {
        &mut self.kinds
    }

    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    #[must_use]
    pub const fn clock(&self) -> Time {
        self.clock
    }

    #[must_use]
    pub const fn end_time(&self) -> Time {
        self.end_time
    }

    /// Packets constructed minus packets discarded. Zero after a
    /// completed run.
    #[must_use]
    pub const fn live_packets(&self) -> i64 {
        self.live_packets
    }

    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn log(&mut self, msg: &str) {
        self.logger.log(msg);
    }

    /// Creates a node of a registered kind. The operation is a no-op on
    /// error; the caller decides whether to report it.
    pub fn create_node(&mut self, kind: &str, id: NodeId) -> Result<(), SimError> {
        if id.is_broadcast() {
            return Err(SimError::ReservedId);
        }
        if self.topology.contains(id) {
            return Err(SimError::DuplicateNode(id));
        }
        let (kind, _) = self.kinds.nodes.lookup(kind)?;
        self.topology.insert_node(Node::new(kind, id));
        Ok(())
    }

    /// Registers a directed link of a registered kind and records the
    /// neighbor relation. No-op on error.
    pub fn connect(&mut self, from: NodeId, to: NodeId, kind: &str) -> Result<(), SimError> {
        if from.is_broadcast() || to.is_broadcast() {
            return Err(SimError::ReservedId);
        }
        if from == to {
            return Err(SimError::SelfLink(from));
        }
        for end in [from, to] {
            if !self.topology.contains(end) {
                return Err(SimError::NoSuchNode(end));
            }
        }
        if self.topology.link(from, to).is_some() {
            return Err(SimError::DuplicateLink(from, to));
        }
        let (kind, proto) = self.kinds.links.lookup(kind)?;
        let latency = (proto.latency)(from, to);
        self.topology.insert_link(Link {
            kind,
            from,
            to,
            latency,
        });
        Ok(())
    }

    /// Builds a fresh packet of a registered kind, with a new identity
    /// and an unaddressed header.
    pub fn create_packet(&mut self, kind: &str) -> Result<Packet, SimError> {
        let (kind, proto) = self.kinds.packets.lookup(kind)?;
        let proto = *proto;
        let header = (*self.kinds.headers.get(proto.header)?)();
        let payload = (*self.kinds.payloads.get(proto.payload)?)();
        let id = PacketId(self.next_packet_id);
        self.next_packet_id += 1;
        self.live_packets += 1;
        Ok(Packet::assemble(kind, id, header, payload))
    }

    /// Value copy of a packet, sharing its identity: the same logical
    /// packet continuing across a hop or fan-out.
    pub fn replicate(&mut self, packet: &Packet) -> Result<Packet, SimError> {
        self.kinds.packets.get(packet.kind())?;
        self.live_packets += 1;
        Ok(packet.value_copy())
    }

    /// Releases a packet. Consuming it by value makes double-discard
    /// unrepresentable.
    pub fn discard(&mut self, packet: Packet) {
        self.live_packets -= 1;
        drop(packet);
    }

    /// Enqueues an event of a registered kind carrying `packet`.
    /// Scheduling behind the clock is a caller error; the packet is
    /// released either way on failure.
    pub fn schedule(
        &mut self,
        kind: &str,
        time: Time,
        sender: NodeId,
        receiver: NodeId,
        packet: Packet,
    ) -> Result<(), SimError> {
        if time < self.clock {
            self.discard(packet);
            return Err(SimError::CausalityViolation {
                scheduled: time,
                clock: self.clock,
            });
        }
        let kind = match self.kinds.events.lookup(kind) {
            Ok((kind, _)) => kind,
            Err(e) => {
                self.discard(packet);
                return Err(e);
            }
        };
        self.queue.push(Event {
            kind,
            time,
            sender,
            receiver,
            packet,
        });
        Ok(())
    }

    /// Runs the event loop to completion: pop the next event, advance the
    /// clock, emit a trace record, invoke the kind's handler. Stops when
    /// the queue is empty or the next trigger time passes the configured
    /// end time; whatever is still queued is then flushed and its packets
    /// released.
    ///
    /// A popped trigger time behind the clock is a scheduler invariant
    /// violation and aborts the run.
    pub fn run(&mut self) -> Result<(), SimError> {
        while let Some(time) = self.queue.next_time() {
            if time > self.end_time {
                break;
            }
            let Some(event) = self.queue.pop_next() else {
                break;
            };
            if event.time < self.clock {
                let err = SimError::CausalityViolation {
                    scheduled: event.time,
                    clock: self.clock,
                };
                self.logger.log(&format!("fatal: {err}"));
                self.discard(event.packet);
                self.flush();
                return Err(err);
            }
            self.clock = event.time;
            self.trace.record(&TraceRecord::of(self.clock, &event));
            let proto = match self.kinds.events.get(event.kind) {
                Ok(proto) => *proto,
                Err(e) => {
                    self.logger.log(&format!("dropping event: {e}"));
                    self.discard(event.packet);
                    continue;
                }
            };
            (proto.on_trigger)(self, event);
        }
        self.flush();
        Ok(())
    }

    /// Releases the packets of any events that never fired.
    fn flush(&mut self) {
        while let Some(event) = self.queue.pop_next() {
            self.discard(event.packet);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Simulation;
    use crate::{
        error::SimError,
        logging::{NothingLogger, NothingTrace},
        packet::{self, DATA_PACKET},
        protocol,
        quantities::{NodeId, Time},
    };

    fn sim(end: u64) -> Simulation {
        let mut sim = Simulation::new(
            Time::from_ticks(end),
            Box::new(NothingLogger),
            Box::new(NothingTrace),
        );
        packet::register(sim.kinds_mut());
        protocol::register(sim.kinds_mut());
        sim
    }

    #[test]
    fn replicate_and_discard_balance_the_live_count() {
        let mut sim = sim(100);
        let packet = sim.create_packet(DATA_PACKET).unwrap();
        assert_eq!(sim.live_packets(), 1);
        let copy = sim.replicate(&packet).unwrap();
        assert_eq!(copy.id(), packet.id());
        assert_eq!(sim.live_packets(), 2);
        sim.discard(copy);
        assert_eq!(sim.live_packets(), 1);
        sim.discard(packet);
        assert_eq!(sim.live_packets(), 0);
    }

    #[test]
    fn unknown_kinds_are_reported_not_fatal() {
        let mut sim = sim(100);
        assert_eq!(
            sim.create_packet("carrier_pigeon").unwrap_err(),
            SimError::UnknownKind {
                family: "packet",
                name: "carrier_pigeon".to_owned(),
            }
        );
        let packet = sim.create_packet(DATA_PACKET).unwrap();
        let err = sim
            .schedule(
                "teleport",
                Time::from_ticks(1),
                NodeId::new(0),
                NodeId::new(1),
                packet,
            )
            .unwrap_err();
        assert!(matches!(err, SimError::UnknownKind { family: "event", .. }));
        // the packet was released despite the failure
        assert_eq!(sim.live_packets(), 0);
    }

    #[test]
    fn scheduling_behind_the_clock_is_rejected() {
        let mut sim = sim(100);
        let packet = sim.create_packet(DATA_PACKET).unwrap();
        // empty queue: the run ends immediately, clock stays at zero
        sim.run().unwrap();
        let packet2 = sim.create_packet(DATA_PACKET).unwrap();
        sim.discard(packet2);
        let err = sim.schedule(
            protocol::RECV_EVENT,
            Time::ZERO,
            NodeId::new(0),
            NodeId::new(0),
            packet,
        );
        assert_eq!(err, Ok(()));
        sim.run().unwrap();

        let mut sim = sim_with_clock_at_ten();
        let packet = sim.create_packet(DATA_PACKET).unwrap();
        let err = sim
            .schedule(
                protocol::RECV_EVENT,
                Time::from_ticks(5),
                NodeId::new(0),
                NodeId::new(0),
                packet,
            )
            .unwrap_err();
        assert_eq!(
            err,
            SimError::CausalityViolation {
                scheduled: Time::from_ticks(5),
                clock: Time::from_ticks(10),
            }
        );
        assert_eq!(sim.live_packets(), 0);
    }

    // run a single recv event addressed to a missing node, leaving the
    // clock at tick 10
    fn sim_with_clock_at_ten() -> Simulation {
        let mut sim = sim(100);
        let packet = sim.create_packet(DATA_PACKET).unwrap();
        sim.schedule(
            protocol::RECV_EVENT,
            Time::from_ticks(10),
            NodeId::new(0),
            NodeId::new(0),
            packet,
        )
        .unwrap();
        sim.run().unwrap();
        assert_eq!(sim.clock(), Time::from_ticks(10));
        sim
    }

    #[test]
    fn shutdown_flushes_unfired_events() {
        let mut sim = sim(10);
        let packet = sim.create_packet(DATA_PACKET).unwrap();
        // beyond the end time: never fires, flushed at shutdown
        sim.schedule(
            protocol::RECV_EVENT,
            Time::from_ticks(50),
            NodeId::new(0),
            NodeId::new(0),
            packet,
        )
        .unwrap();
        assert_eq!(sim.pending_events(), 1);
        sim.run().unwrap();
        assert_eq!(sim.pending_events(), 0);
        assert_eq!(sim.live_packets(), 0);
        assert_eq!(sim.clock(), Time::ZERO);
    }
}
